use recurve_error::{RecurveResult, recurve_err};

/// In-place slice activation: `f(x, alpha, beta)`. Most functions ignore
/// `alpha`/`beta`; the parameterized ones (Affine, LeakyRelu, ...) use them.
pub type GateActivationFn = fn(&mut [f32], f32, f32);

/// Output projection `out = o_gate (*) h(cell)`, where `h` runs on a
/// scratch copy so the live cell state is left untouched.
#[derive(Copy, Clone)]
pub struct CellOutput {
    act: GateActivationFn,
}

impl CellOutput {
    pub fn apply(
        &self,
        cell: &[f32],
        scratch: &mut [f32],
        o_gate: &[f32],
        out: &mut [f32],
        alpha: f32,
        beta: f32,
    ) {
        let n = cell.len();
        scratch[..n].copy_from_slice(cell);
        (self.act)(&mut scratch[..n], alpha, beta);

        for j in 0..n {
            out[j] = o_gate[j] * scratch[j];
        }
    }
}

/// Resolve the input/forget/output gate activation by its ONNX name.
pub fn resolve_f(name: &str) -> RecurveResult<GateActivationFn> {
    lookup(name)
}

/// Resolve the cell candidate activation by its ONNX name.
pub fn resolve_g(name: &str) -> RecurveResult<GateActivationFn> {
    lookup(name)
}

/// Resolve the hidden-output activation by its ONNX name.
pub fn resolve_h(name: &str) -> RecurveResult<CellOutput> {
    Ok(CellOutput { act: lookup(name)? })
}

/// ONNX default `alpha` for a named activation.
pub fn default_alpha(name: &str) -> f32 {
    match normalized(name).as_str() {
        "affine" => 1.0,
        "leakyrelu" => 0.01,
        "thresholdedrelu" => 1.0,
        "scaledtanh" => 1.0,
        "hardsigmoid" => 0.2,
        "elu" => 1.0,
        _ => 0.0,
    }
}

/// ONNX default `beta` for a named activation.
pub fn default_beta(name: &str) -> f32 {
    match normalized(name).as_str() {
        "scaledtanh" => 1.0,
        "hardsigmoid" => 0.5,
        _ => 0.0,
    }
}

fn normalized(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn lookup(name: &str) -> RecurveResult<GateActivationFn> {
    let func: GateActivationFn = match normalized(name).as_str() {
        "sigmoid" => sigmoid,
        "tanh" => tanh,
        "relu" => relu,
        "affine" => affine,
        "leakyrelu" => leaky_relu,
        "thresholdedrelu" => thresholded_relu,
        "scaledtanh" => scaled_tanh,
        "hardsigmoid" => hard_sigmoid,
        "elu" => elu,
        "softsign" => softsign,
        "softplus" => softplus,
        _ => return Err(recurve_err!(InvalidArgument: "unknown activation '{}'", name)),
    };

    Ok(func)
}

fn sigmoid(x: &mut [f32], _alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        *v = 1.0 / (1.0 + (-*v).exp());
    }
}

fn tanh(x: &mut [f32], _alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        *v = v.tanh();
    }
}

fn relu(x: &mut [f32], _alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        *v = v.max(0.0);
    }
}

fn affine(x: &mut [f32], alpha: f32, beta: f32) {
    for v in x.iter_mut() {
        *v = alpha * *v + beta;
    }
}

fn leaky_relu(x: &mut [f32], alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        if *v < 0.0 {
            *v *= alpha;
        }
    }
}

fn thresholded_relu(x: &mut [f32], alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        if *v <= alpha {
            *v = 0.0;
        }
    }
}

fn scaled_tanh(x: &mut [f32], alpha: f32, beta: f32) {
    for v in x.iter_mut() {
        *v = alpha * (beta * *v).tanh();
    }
}

fn hard_sigmoid(x: &mut [f32], alpha: f32, beta: f32) {
    for v in x.iter_mut() {
        *v = (alpha * *v + beta).clamp(0.0, 1.0);
    }
}

fn elu(x: &mut [f32], alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        if *v < 0.0 {
            *v = alpha * (v.exp() - 1.0);
        }
    }
}

fn softsign(x: &mut [f32], _alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        *v = *v / (1.0 + v.abs());
    }
}

fn softplus(x: &mut [f32], _alpha: f32, _beta: f32) {
    for v in x.iter_mut() {
        *v = v.exp().ln_1p();
    }
}
