//! CPU implementation of the ONNX one-layer LSTM operator.
//!
//! The engine consumes a packed, optionally padded time-major input
//! sequence plus weight/bias/peephole/initial-state tensors and produces
//! per-step hidden outputs, the final hidden state, and the final cell
//! state, honoring per-batch variable sequence lengths in forward,
//! reverse, and bidirectional modes.

mod attributes;
mod bidirectional;
mod direction;
mod op;
mod reverse;
mod threading;
mod unidirectional;
mod validate;
mod weights;

pub use attributes::{ActivationSet, LstmAttributes};
pub use bidirectional::BidirectionalLstm;
pub use direction::Direction;
pub use op::{LstmOp, OpKernelContext, SessionContext, TensorValue, inputs, outputs};
pub use reverse::reverse_sequence;
pub use threading::ThreadPlan;
pub use unidirectional::{CellShape, UniDirectionalLstm};
pub use validate::validate_inputs;
pub use weights::{GateBias, GateWeights, Peepholes};

use recurve_error::{RecurveResult, recurve_err};
use recurve_utils::{Shape, Tensor, TensorError};

/// Zero-filled f32 buffer with kernel-level error mapping: reservation
/// failures surface as `OutOfMemory`, impossible shapes as
/// `InvalidArgument`.
pub(crate) fn alloc_f32(shape: impl Into<Shape>) -> RecurveResult<Tensor<f32>> {
    Tensor::try_zeros(shape).map_err(|err| match err {
        TensorError::AllocFailed { elements } => {
            recurve_err!(OutOfMemory: "failed to allocate a buffer of {} elements", elements)
        }
        other => recurve_err!(InvalidArgument: "{}", other),
    })
}
