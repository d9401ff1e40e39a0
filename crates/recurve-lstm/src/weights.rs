use crate::alloc_f32;
use recurve_error::{RecurveResult, ensure};
use recurve_utils::Tensor;

pub(crate) const NUM_GATES: usize = 4;

/// Source slabs arrive in ONNX gate order `[i, o, f, c]`; the fused layout
/// is `[i, f, o, c]` so the kernel indexes gates as `i=0, f=1, o=2, c=3`.
const SRC_GATE_FOR_FUSED: [usize; NUM_GATES] = [0, 2, 1, 3];

/// Per-direction weight state built once at orchestrator construction:
/// transposed fused-gate weight matrices, fused `Wb + Rb` bias vectors, and
/// borrowed peephole slices.
pub struct GateWeights<'a> {
    input_size: usize,
    hidden_size: usize,
    w_fused: Tensor<f32>,
    r_fused: Tensor<f32>,
    bias: Option<GateBias>,
    peepholes: Option<Peepholes<'a>>,
}

impl<'a> GateWeights<'a> {
    /// Build the fused weight state for one direction.
    ///
    /// `input_weights` is the `[4H, I]` slab, `recurrent_weights` the
    /// `[4H, H]` slab, `bias` the `8H` vector, `peephole_weights` the `3H`
    /// vector; the first two are re-packed, the bias is fused, and the
    /// peepholes are aliased without a copy.
    pub fn load(
        input_weights: &[f32],
        recurrent_weights: &[f32],
        bias: Option<&[f32]>,
        peephole_weights: Option<&'a [f32]>,
        input_size: usize,
        hidden_size: usize,
    ) -> RecurveResult<Self> {
        let w_fused = fuse_slab(input_weights, input_size, hidden_size)?;
        let r_fused = fuse_slab(recurrent_weights, hidden_size, hidden_size)?;
        let bias = bias.map(|b| GateBias::fuse(b, hidden_size)).transpose()?;
        let peepholes = peephole_weights
            .map(|p| Peepholes::bind(p, hidden_size))
            .transpose()?;

        Ok(Self {
            input_size,
            hidden_size,
            w_fused,
            r_fused,
            bias,
            peepholes,
        })
    }

    /// Fused input weights, shape `[I, 4H]`.
    pub fn input_fused(&self) -> &[f32] {
        self.w_fused.data()
    }

    /// Fused recurrent weights, shape `[H, 4H]`.
    pub fn recurrent_fused(&self) -> &[f32] {
        self.r_fused.data()
    }

    pub fn bias(&self) -> Option<&GateBias> {
        self.bias.as_ref()
    }

    pub fn peepholes(&self) -> Option<&Peepholes<'a>> {
        self.peepholes.as_ref()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

/// Transpose one `[4H, in_dim]` slab into `[in_dim, 4H]`, reordering the
/// gate blocks from `[i, o, f, c]` to `[i, f, o, c]`. Pure copy, no
/// accumulation.
fn fuse_slab(src: &[f32], in_dim: usize, hidden_size: usize) -> RecurveResult<Tensor<f32>> {
    let expected = NUM_GATES * hidden_size * in_dim;
    ensure!(
        src.len() == expected,
        InvalidArgument: "weight slab has {} elements, expected {} (4 * {} * {})",
        src.len(),
        expected,
        hidden_size,
        in_dim
    );

    let fused_width = NUM_GATES * hidden_size;
    let mut fused = alloc_f32((in_dim, fused_width))?;
    let dst = fused.data_mut();

    for (fused_gate, &src_gate) in SRC_GATE_FOR_FUSED.iter().enumerate() {
        for h in 0..hidden_size {
            let src_row = (src_gate * hidden_size + h) * in_dim;
            let dst_col = fused_gate * hidden_size + h;

            for r in 0..in_dim {
                dst[r * fused_width + dst_col] = src[src_row + r];
            }
        }
    }

    Ok(fused)
}

/// Fused `Wb + Rb` bias, one `H`-length vector per gate. Fields are named
/// rather than ordered so gate lookups can never be confused between the
/// source `[i, o, f, c]` and fused `[i, f, o, c]` orderings.
pub struct GateBias {
    pub input: Vec<f32>,
    pub output: Vec<f32>,
    pub forget: Vec<f32>,
    pub cell: Vec<f32>,
}

impl GateBias {
    /// `src` is the `8H` ONNX bias vector
    /// `[Wb_i, Wb_o, Wb_f, Wb_c, Rb_i, Rb_o, Rb_f, Rb_c]`.
    pub fn fuse(src: &[f32], hidden_size: usize) -> RecurveResult<Self> {
        let h = hidden_size;
        ensure!(
            src.len() == 8 * h,
            InvalidArgument: "bias has {} elements, expected {}",
            src.len(),
            8 * h
        );

        let fuse_gate = |gate: usize| -> Vec<f32> {
            (0..h)
                .map(|k| src[gate * h + k] + src[(4 + gate) * h + k])
                .collect()
        };

        Ok(Self {
            input: fuse_gate(0),
            output: fuse_gate(1),
            forget: fuse_gate(2),
            cell: fuse_gate(3),
        })
    }
}

/// Borrowed views of the `[P_i, P_o, P_f]` peephole vector. Read-only for
/// the orchestrator's lifetime; never copied.
pub struct Peepholes<'a> {
    pub input: &'a [f32],
    pub output: &'a [f32],
    pub forget: &'a [f32],
}

impl<'a> Peepholes<'a> {
    pub fn bind(src: &'a [f32], hidden_size: usize) -> RecurveResult<Self> {
        let h = hidden_size;
        ensure!(
            src.len() == 3 * h,
            InvalidArgument: "peepholes have {} elements, expected {}",
            src.len(),
            3 * h
        );

        Ok(Self {
            input: &src[..h],
            output: &src[h..2 * h],
            forget: &src[2 * h..3 * h],
        })
    }
}
