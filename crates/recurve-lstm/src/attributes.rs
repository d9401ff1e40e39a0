use crate::Direction;
use recurve_core::activations::{self, CellOutput, GateActivationFn};
use recurve_error::{RecurveResult, ensure};

/// Static operator attributes, mirroring the ONNX `LSTM` node attributes.
///
/// `activations` holds `3 * num_directions` names in `[f, g, h]` order
/// (forward triple first for bidirectional nodes); `activation_alpha` /
/// `activation_beta` optionally override the per-activation defaults,
/// aligned index-for-index with `activations`.
#[derive(Clone, Debug)]
pub struct LstmAttributes {
    pub hidden_size: usize,
    pub direction: Direction,
    pub activations: Vec<String>,
    pub activation_alpha: Vec<f32>,
    pub activation_beta: Vec<f32>,
    pub clip: f32,
    pub input_forget: bool,
}

impl LstmAttributes {
    pub fn new(hidden_size: usize) -> Self {
        Self {
            hidden_size,
            direction: Direction::Forward,
            activations: Vec::new(),
            activation_alpha: Vec::new(),
            activation_beta: Vec::new(),
            clip: 0.0,
            input_forget: false,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_activations(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.activations = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_activation_alpha(mut self, alpha: impl IntoIterator<Item = f32>) -> Self {
        self.activation_alpha = alpha.into_iter().collect();
        self
    }

    pub fn with_activation_beta(mut self, beta: impl IntoIterator<Item = f32>) -> Self {
        self.activation_beta = beta.into_iter().collect();
        self
    }

    /// Gate clipping threshold. Values `<= 0` disable clipping.
    pub fn with_clip(mut self, clip: f32) -> Self {
        self.clip = clip;
        self
    }

    /// Couple the forget gate to the input gate (`f = 1 - i`).
    pub fn with_input_forget(mut self, input_forget: bool) -> Self {
        self.input_forget = input_forget;
        self
    }

    /// Resolve the name lists into one [ActivationSet] per direction.
    pub fn resolve_activations(&self) -> RecurveResult<Vec<ActivationSet>> {
        let dirs = self.direction.num_directions();

        if self.activations.is_empty() {
            return Ok(vec![ActivationSet::standard(); dirs]);
        }

        ensure!(
            self.activations.len() == 3 * dirs,
            InvalidArgument: "expected {} activation names for {:?}, got {}",
            3 * dirs,
            self.direction,
            self.activations.len()
        );

        (0..dirs)
            .map(|d| {
                ActivationSet::resolve(
                    &self.activations[d * 3..d * 3 + 3],
                    &self.activation_alpha,
                    &self.activation_beta,
                    d * 3,
                )
            })
            .collect()
    }
}

/// The resolved `(f, g, h)` activation triple for one direction, with the
/// alpha/beta each function was configured with. Plain function pointers
/// and scalars, so the set is freely copied into dispatched kernels.
#[derive(Copy, Clone)]
pub struct ActivationSet {
    pub f: GateActivationFn,
    pub f_alpha: f32,
    pub f_beta: f32,
    pub g: GateActivationFn,
    pub g_alpha: f32,
    pub g_beta: f32,
    pub h: CellOutput,
    pub h_alpha: f32,
    pub h_beta: f32,
}

impl ActivationSet {
    /// The ONNX default triple: `(Sigmoid, Tanh, Tanh)`.
    pub fn standard() -> Self {
        Self::resolve(
            &[
                "Sigmoid".to_string(),
                "Tanh".to_string(),
                "Tanh".to_string(),
            ],
            &[],
            &[],
            0,
        )
        .expect("default activations always resolve")
    }

    fn resolve(
        names: &[String],
        alphas: &[f32],
        betas: &[f32],
        base: usize,
    ) -> RecurveResult<Self> {
        let param = |list: &[f32], offset: usize, default: f32| -> f32 {
            list.get(base + offset).copied().unwrap_or(default)
        };

        Ok(Self {
            f: activations::resolve_f(&names[0])?,
            f_alpha: param(alphas, 0, activations::default_alpha(&names[0])),
            f_beta: param(betas, 0, activations::default_beta(&names[0])),
            g: activations::resolve_g(&names[1])?,
            g_alpha: param(alphas, 1, activations::default_alpha(&names[1])),
            g_beta: param(betas, 1, activations::default_beta(&names[1])),
            h: activations::resolve_h(&names[2])?,
            h_alpha: param(alphas, 2, activations::default_alpha(&names[2])),
            h_beta: param(betas, 2, activations::default_beta(&names[2])),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attributes_resolve_to_one_standard_set() {
        let attrs = LstmAttributes::new(4);
        let sets = attrs.resolve_activations().unwrap();
        assert_eq!(sets.len(), 1);
    }

    #[test]
    fn bidirectional_needs_six_names() {
        let attrs = LstmAttributes::new(4)
            .with_direction(Direction::Bidirectional)
            .with_activations(["Sigmoid", "Tanh", "Tanh"]);

        assert!(attrs.resolve_activations().is_err());

        let attrs = LstmAttributes::new(4)
            .with_direction(Direction::Bidirectional)
            .with_activations(["Sigmoid", "Tanh", "Tanh", "Sigmoid", "Tanh", "Tanh"]);

        assert_eq!(attrs.resolve_activations().unwrap().len(), 2);
    }

    #[test]
    fn alpha_overrides_align_with_activation_list() {
        let attrs = LstmAttributes::new(4)
            .with_activations(["LeakyRelu", "Tanh", "Tanh"])
            .with_activation_alpha([0.5]);

        let sets = attrs.resolve_activations().unwrap();
        assert_eq!(sets[0].f_alpha, 0.5);
    }

    #[test]
    fn unknown_activation_fails_resolution() {
        let attrs = LstmAttributes::new(4).with_activations(["Bogus", "Tanh", "Tanh"]);
        assert!(attrs.resolve_activations().is_err());
    }
}
