//! Facade crate re-exporting the recurve public API.
//!
//! ```rust
//! use recurve::*;
//!
//! let attrs = LstmAttributes::new(4).with_direction(Direction::Forward);
//! let op = LstmOp::new(attrs).unwrap();
//!
//! let mut ctx = SessionContext::new()
//!     .with_input(inputs::X, Tensor::new(vec![1.0f32; 6], vec![3, 2, 1]))
//!     .with_input(inputs::W, Tensor::new(vec![0.1f32; 16], vec![1, 16, 1]))
//!     .with_input(inputs::R, Tensor::new(vec![0.1f32; 64], vec![1, 16, 4]));
//!
//! op.compute(&mut ctx, &Executor::serial()).unwrap();
//! assert_eq!(ctx.output(outputs::Y).unwrap().dims(), &[3, 1, 2, 4]);
//! ```

pub use recurve_core::{
    Executor, SharedSlice, SharedTile, ThreadPool, WaitGroup, gemm, random_provider,
};
pub use recurve_error::{ErrorCode, RecurveError, RecurveResult, ResultExt};
pub use recurve_lstm::{
    ActivationSet, BidirectionalLstm, CellShape, Direction, GateWeights, LstmAttributes, LstmOp,
    OpKernelContext, Peepholes, SessionContext, TensorValue, ThreadPlan, UniDirectionalLstm,
    inputs, outputs, reverse_sequence, validate_inputs,
};
pub use recurve_utils::{Shape, Strides, Tensor, TensorError};
