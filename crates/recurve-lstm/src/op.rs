use crate::attributes::{ActivationSet, LstmAttributes};
use crate::bidirectional::BidirectionalLstm;
use crate::unidirectional::UniDirectionalLstm;
use crate::validate::validate_inputs;
use crate::{Direction, ThreadPlan, alloc_f32};
use recurve_core::Executor;
use recurve_error::{RecurveResult, ensure, recurve_err};
use recurve_utils::Tensor;

/// Operator input indices, following the ONNX LSTM signature.
pub mod inputs {
    pub const X: usize = 0;
    pub const W: usize = 1;
    pub const R: usize = 2;
    pub const B: usize = 3;
    pub const SEQUENCE_LENS: usize = 4;
    pub const INITIAL_H: usize = 5;
    pub const INITIAL_C: usize = 6;
    pub const P: usize = 7;
}

/// Operator output indices.
pub mod outputs {
    pub const Y: usize = 0;
    pub const Y_H: usize = 1;
    pub const Y_C: usize = 2;
}

/// Element-type-tagged tensor crossing the operator boundary.
#[derive(Debug, Clone)]
pub enum TensorValue {
    F32(Tensor<f32>),
    F64(Tensor<f64>),
    I32(Tensor<i32>),
}

impl TensorValue {
    pub fn dtype(&self) -> &'static str {
        match self {
            TensorValue::F32(_) => "f32",
            TensorValue::F64(_) => "f64",
            TensorValue::I32(_) => "i32",
        }
    }

    pub fn dims(&self) -> &[usize] {
        match self {
            TensorValue::F32(t) => t.dims(),
            TensorValue::F64(t) => t.dims(),
            TensorValue::I32(t) => t.dims(),
        }
    }

    pub fn as_f32(&self) -> Option<&Tensor<f32>> {
        match self {
            TensorValue::F32(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&Tensor<i32>> {
        match self {
            TensorValue::I32(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Tensor<f32>> for TensorValue {
    fn from(t: Tensor<f32>) -> Self {
        TensorValue::F32(t)
    }
}

impl From<Tensor<i32>> for TensorValue {
    fn from(t: Tensor<i32>) -> Self {
        TensorValue::I32(t)
    }
}

/// What the surrounding graph hands an operator: inputs by index, plus
/// which of the optional outputs the session actually wants. The operator
/// allocates the outputs it produces and hands them back through
/// `set_output`.
pub trait OpKernelContext {
    fn input(&self, index: usize) -> Option<&TensorValue>;
    fn wants_output(&self, index: usize) -> bool;
    fn set_output(&mut self, index: usize, value: TensorValue);
}

/// Plain owned implementation of [OpKernelContext] for tests and
/// single-shot invocations.
#[derive(Default)]
pub struct SessionContext {
    inputs: Vec<Option<TensorValue>>,
    requested: [bool; 3],
    outputs: [Option<TensorValue>; 3],
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            requested: [true; 3],
            outputs: [None, None, None],
        }
    }

    pub fn with_input(mut self, index: usize, value: impl Into<TensorValue>) -> Self {
        if self.inputs.len() <= index {
            self.inputs.resize_with(index + 1, || None);
        }
        self.inputs[index] = Some(value.into());
        self
    }

    pub fn request_output(mut self, index: usize, wanted: bool) -> Self {
        self.requested[index] = wanted;
        self
    }

    pub fn output(&self, index: usize) -> Option<&TensorValue> {
        self.outputs.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn take_output(&mut self, index: usize) -> Option<TensorValue> {
        self.outputs.get_mut(index).and_then(|slot| slot.take())
    }
}

impl OpKernelContext for SessionContext {
    fn input(&self, index: usize) -> Option<&TensorValue> {
        self.inputs.get(index).and_then(|slot| slot.as_ref())
    }

    fn wants_output(&self, index: usize) -> bool {
        self.requested.get(index).copied().unwrap_or(false)
    }

    fn set_output(&mut self, index: usize, value: TensorValue) {
        if index < self.outputs.len() {
            self.outputs[index] = Some(value);
        }
    }
}

/// The LSTM operator: attribute resolution at build time, validation and
/// engine dispatch per invocation.
pub struct LstmOp {
    attrs: LstmAttributes,
    acts: Vec<ActivationSet>,
}

impl LstmOp {
    pub fn new(attrs: LstmAttributes) -> RecurveResult<Self> {
        ensure!(
            attrs.hidden_size > 0,
            InvalidArgument: "hidden_size must be positive"
        );

        let acts = attrs.resolve_activations()?;
        Ok(Self { attrs, acts })
    }

    pub fn attributes(&self) -> &LstmAttributes {
        &self.attrs
    }

    /// Validate the context's inputs, run one or two direction engines on
    /// the executor, and hand the requested outputs back to the context.
    /// On any error no output is produced.
    pub fn compute(
        &self,
        ctx: &mut dyn OpKernelContext,
        executor: &Executor,
    ) -> RecurveResult<()> {
        let dirs = self.attrs.direction.num_directions();
        let hidden_size = self.attrs.hidden_size;

        let wants_y = ctx.wants_output(outputs::Y);
        let wants_y_h = ctx.wants_output(outputs::Y_H);
        let wants_y_c = ctx.wants_output(outputs::Y_C);

        let (y, y_h, y_c) = {
            let x = require_f32(ctx, inputs::X, "X")?;
            let w = require_f32(ctx, inputs::W, "W")?;
            let r = require_f32(ctx, inputs::R, "R")?;
            let b = optional_f32(ctx, inputs::B, "B")?;
            let seq_lens = optional_i32(ctx, inputs::SEQUENCE_LENS, "sequence_lens")?;
            let initial_h = optional_f32(ctx, inputs::INITIAL_H, "initial_h")?;
            let initial_c = optional_f32(ctx, inputs::INITIAL_C, "initial_c")?;
            let p = optional_f32(ctx, inputs::P, "P")?;

            let shape = validate_inputs(
                x,
                w,
                r,
                b,
                seq_lens,
                initial_h,
                initial_c,
                p,
                dirs,
                hidden_size,
            )?;

            tracing::debug!(
                seq_length = shape.seq_length,
                batch_size = shape.batch_size,
                input_size = shape.input_size,
                hidden_size,
                direction = ?self.attrs.direction,
                plan = ?ThreadPlan::for_host(shape.batch_size, hidden_size),
                "computing lstm"
            );

            let mut y = if wants_y {
                Some(alloc_f32((
                    shape.seq_length,
                    dirs,
                    shape.batch_size,
                    hidden_size,
                ))?)
            } else {
                None
            };
            let mut y_h = if wants_y_h {
                Some(alloc_f32((dirs, shape.batch_size, hidden_size))?)
            } else {
                None
            };
            let mut y_c = if wants_y_c {
                Some(alloc_f32((dirs, shape.batch_size, hidden_size))?)
            } else {
                None
            };

            let seq_lens_data = seq_lens.map(|t| t.data());

            match self.attrs.direction {
                Direction::Bidirectional => {
                    let mut engine = BidirectionalLstm::new(
                        executor,
                        shape,
                        &self.acts,
                        self.attrs.clip,
                        self.attrs.input_forget,
                        w.data(),
                        r.data(),
                        b.map(|t| t.data()),
                        p.map(|t| t.data()),
                        initial_h.map(|t| t.data()),
                        initial_c.map(|t| t.data()),
                    )?;

                    engine.compute(
                        x.data(),
                        seq_lens_data,
                        y.as_mut().map(|t| t.data_mut()),
                        y_h.as_mut().map(|t| t.data_mut()),
                        y_c.as_mut().map(|t| t.data_mut()),
                    )?;
                }
                direction => {
                    let mut engine = UniDirectionalLstm::new(
                        executor,
                        direction,
                        shape,
                        self.acts[0],
                        self.attrs.clip,
                        self.attrs.input_forget,
                        w.data(),
                        r.data(),
                        b.map(|t| t.data()),
                        p.map(|t| t.data()),
                        initial_h.map(|t| t.data()),
                        initial_c.map(|t| t.data()),
                    )?;

                    engine.compute(
                        x.data(),
                        seq_lens_data,
                        1,
                        y.as_mut().map(|t| t.data_mut()),
                        0,
                        y_h.as_mut().map(|t| t.data_mut()),
                        y_c.as_mut().map(|t| t.data_mut()),
                    )?;
                }
            }

            (y, y_h, y_c)
        };

        if let Some(y) = y {
            ctx.set_output(outputs::Y, TensorValue::F32(y));
        }
        if let Some(y_h) = y_h {
            ctx.set_output(outputs::Y_H, TensorValue::F32(y_h));
        }
        if let Some(y_c) = y_c {
            ctx.set_output(outputs::Y_C, TensorValue::F32(y_c));
        }

        Ok(())
    }
}

fn require_f32<'c>(
    ctx: &'c dyn OpKernelContext,
    index: usize,
    name: &str,
) -> RecurveResult<&'c Tensor<f32>> {
    match ctx.input(index) {
        Some(TensorValue::F32(t)) => Ok(t),
        Some(TensorValue::F64(_)) => {
            Err(recurve_err!(NotImplemented: "tensor {}: f64 is not implemented", name))
        }
        Some(other) => {
            Err(recurve_err!(InvalidArgument: "tensor {}: expected f32, got {}", name, other.dtype()))
        }
        None => Err(recurve_err!(InvalidArgument: "tensor {} is required", name)),
    }
}

fn optional_f32<'c>(
    ctx: &'c dyn OpKernelContext,
    index: usize,
    name: &str,
) -> RecurveResult<Option<&'c Tensor<f32>>> {
    match ctx.input(index) {
        None => Ok(None),
        Some(_) => require_f32(ctx, index, name).map(Some),
    }
}

fn optional_i32<'c>(
    ctx: &'c dyn OpKernelContext,
    index: usize,
    name: &str,
) -> RecurveResult<Option<&'c Tensor<i32>>> {
    match ctx.input(index) {
        None => Ok(None),
        Some(TensorValue::I32(t)) => Ok(Some(t)),
        Some(other) => {
            Err(recurve_err!(InvalidArgument: "tensor {}: expected i32, got {}", name, other.dtype()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recurve_error::ErrorCode;

    fn minimal_ctx() -> SessionContext {
        let x = Tensor::new(vec![1.0f32], vec![1usize, 1, 1]);
        let w = Tensor::new(vec![0.1f32, 0.2, 0.3, 0.4], vec![1usize, 4, 1]);
        let r = Tensor::new(vec![0.0f32; 4], vec![1usize, 4, 1]);

        SessionContext::new()
            .with_input(inputs::X, x)
            .with_input(inputs::W, w)
            .with_input(inputs::R, r)
    }

    #[test]
    fn compute_produces_requested_outputs_only() {
        let op = LstmOp::new(LstmAttributes::new(1)).unwrap();
        let executor = Executor::serial();

        let mut ctx = minimal_ctx().request_output(outputs::Y, false);
        op.compute(&mut ctx, &executor).unwrap();

        assert!(ctx.output(outputs::Y).is_none());
        assert!(ctx.output(outputs::Y_H).is_some());
        assert!(ctx.output(outputs::Y_C).is_some());
    }

    #[test]
    fn output_shapes_follow_the_direction_count() {
        let op = LstmOp::new(
            LstmAttributes::new(1).with_direction(Direction::Bidirectional),
        )
        .unwrap();
        let executor = Executor::serial();

        let x = Tensor::new(vec![1.0f32, 2.0], vec![2usize, 1, 1]);
        let w = Tensor::new(vec![0.1f32; 8], vec![2usize, 4, 1]);
        let r = Tensor::new(vec![0.0f32; 8], vec![2usize, 4, 1]);
        let mut ctx = SessionContext::new()
            .with_input(inputs::X, x)
            .with_input(inputs::W, w)
            .with_input(inputs::R, r);

        op.compute(&mut ctx, &executor).unwrap();

        assert_eq!(ctx.output(outputs::Y).unwrap().dims(), &[2, 2, 1, 1]);
        assert_eq!(ctx.output(outputs::Y_H).unwrap().dims(), &[2, 1, 1]);
        assert_eq!(ctx.output(outputs::Y_C).unwrap().dims(), &[2, 1, 1]);
    }

    #[test]
    fn f64_input_is_not_implemented() {
        let op = LstmOp::new(LstmAttributes::new(1)).unwrap();
        let executor = Executor::serial();

        let mut ctx = minimal_ctx();
        ctx = ctx.with_input(
            inputs::X,
            TensorValue::F64(Tensor::new(vec![1.0f64], vec![1usize, 1, 1])),
        );

        let err = op.compute(&mut ctx, &executor).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotImplemented);
        assert!(ctx.output(outputs::Y).is_none());
    }

    #[test]
    fn missing_required_input_is_invalid_argument() {
        let op = LstmOp::new(LstmAttributes::new(1)).unwrap();
        let executor = Executor::serial();

        let mut ctx = SessionContext::new();
        let err = op.compute(&mut ctx, &executor).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.to_string().contains("tensor X"));
    }

    #[test]
    fn wrong_seq_lens_dtype_is_invalid_argument() {
        let op = LstmOp::new(LstmAttributes::new(1)).unwrap();
        let executor = Executor::serial();

        let mut ctx = minimal_ctx().with_input(
            inputs::SEQUENCE_LENS,
            Tensor::new(vec![1.0f32], vec![1usize]),
        );

        let err = op.compute(&mut ctx, &executor).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.to_string().contains("sequence_lens"));
    }
}
