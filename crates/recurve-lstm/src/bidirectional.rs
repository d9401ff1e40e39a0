use crate::attributes::ActivationSet;
use crate::unidirectional::{CellShape, UniDirectionalLstm};
use crate::weights::NUM_GATES;
use crate::Direction;
use recurve_core::Executor;
use recurve_error::{RecurveResult, ensure};

/// Two single-direction engines over per-direction halves of the packed
/// weight tensors, writing into slot 0 (forward) and slot 1 (reverse) of
/// the interleaved `[S, 2, B, H]` output.
pub struct BidirectionalLstm<'a, 'e> {
    forward: UniDirectionalLstm<'a, 'e>,
    reverse: UniDirectionalLstm<'a, 'e>,
    batch_size: usize,
    hidden_size: usize,
}

impl<'a, 'e> BidirectionalLstm<'a, 'e> {
    /// Slice the `[2, ...]` weight slabs into per-direction halves and
    /// build both engines. Argument order matches the unidirectional
    /// constructor: `(input_weights, recurrent_weights, bias,
    /// peephole_weights)` followed by the initial states, each covering
    /// both directions.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executor: &'e Executor,
        shape: CellShape,
        acts: &[ActivationSet],
        clip: f32,
        input_forget: bool,
        input_weights: &'a [f32],
        recurrent_weights: &'a [f32],
        bias: Option<&'a [f32]>,
        peephole_weights: Option<&'a [f32]>,
        initial_h: Option<&[f32]>,
        initial_c: Option<&[f32]>,
    ) -> RecurveResult<Self> {
        ensure!(
            acts.len() == 2,
            InvalidArgument: "bidirectional engines need one activation triple per direction, got {}",
            acts.len()
        );

        let w_len = NUM_GATES * shape.hidden_size * shape.input_size;
        let r_len = NUM_GATES * shape.hidden_size * shape.hidden_size;
        let b_len = 8 * shape.hidden_size;
        let p_len = 3 * shape.hidden_size;
        let state_len = shape.batch_size * shape.hidden_size;

        ensure!(
            input_weights.len() == 2 * w_len,
            InvalidArgument: "W has {} elements, expected {}",
            input_weights.len(),
            2 * w_len
        );
        ensure!(
            recurrent_weights.len() == 2 * r_len,
            InvalidArgument: "R has {} elements, expected {}",
            recurrent_weights.len(),
            2 * r_len
        );

        let bias_halves = slice_half(bias, b_len, "B")?;
        let peephole_halves = slice_half(peephole_weights, p_len, "P")?;

        let initial_h_halves = match initial_h {
            Some(buf) => {
                ensure!(
                    buf.len() == 2 * state_len,
                    InvalidArgument: "initial_h has {} elements, expected {}",
                    buf.len(),
                    2 * state_len
                );
                [Some(&buf[..state_len]), Some(&buf[state_len..])]
            }
            None => [None, None],
        };

        let initial_c_halves = match initial_c {
            Some(buf) => {
                ensure!(
                    buf.len() == 2 * state_len,
                    InvalidArgument: "initial_c has {} elements, expected {}",
                    buf.len(),
                    2 * state_len
                );
                [Some(&buf[..state_len]), Some(&buf[state_len..])]
            }
            None => [None, None],
        };

        let forward = UniDirectionalLstm::new(
            executor,
            Direction::Forward,
            shape,
            acts[0],
            clip,
            input_forget,
            &input_weights[..w_len],
            &recurrent_weights[..r_len],
            bias_halves[0],
            peephole_halves[0],
            initial_h_halves[0],
            initial_c_halves[0],
        )?;

        let reverse = UniDirectionalLstm::new(
            executor,
            Direction::Reverse,
            shape,
            acts[1],
            clip,
            input_forget,
            &input_weights[w_len..],
            &recurrent_weights[r_len..],
            bias_halves[1],
            peephole_halves[1],
            initial_h_halves[1],
            initial_c_halves[1],
        )?;

        Ok(Self {
            forward,
            reverse,
            batch_size: shape.batch_size,
            hidden_size: shape.hidden_size,
        })
    }

    /// Run both directions over the shared input. `y` is the whole
    /// `[S, 2, B, H]` buffer; `y_h` / `y_c` are `[2, B, H]`.
    pub fn compute(
        &mut self,
        input: &[f32],
        seq_lens: Option<&[i32]>,
        mut y: Option<&mut [f32]>,
        y_h: Option<&mut [f32]>,
        y_c: Option<&mut [f32]>,
    ) -> RecurveResult<()> {
        let state_len = self.batch_size * self.hidden_size;

        let (y_h_fwd, y_h_rev) = split_state(y_h, state_len)?;
        let (y_c_fwd, y_c_rev) = split_state(y_c, state_len)?;

        self.forward
            .compute(input, seq_lens, 2, y.as_deref_mut(), 0, y_h_fwd, y_c_fwd)?;
        self.reverse
            .compute(input, seq_lens, 2, y.as_deref_mut(), 1, y_h_rev, y_c_rev)?;

        Ok(())
    }
}

type StateHalves<'b> = (Option<&'b mut [f32]>, Option<&'b mut [f32]>);

fn split_state(buf: Option<&mut [f32]>, state_len: usize) -> RecurveResult<StateHalves<'_>> {
    match buf {
        Some(buf) => {
            ensure!(
                buf.len() == 2 * state_len,
                InvalidArgument: "final-state buffer has {} elements, expected {}",
                buf.len(),
                2 * state_len
            );
            let (fwd, rev) = buf.split_at_mut(state_len);
            Ok((Some(fwd), Some(rev)))
        }
        None => Ok((None, None)),
    }
}

fn slice_half<'b>(
    buf: Option<&'b [f32]>,
    len: usize,
    name: &str,
) -> RecurveResult<[Option<&'b [f32]>; 2]> {
    match buf {
        Some(buf) => {
            ensure!(
                buf.len() == 2 * len,
                InvalidArgument: "{} has {} elements, expected {}",
                name,
                buf.len(),
                2 * len
            );
            Ok([Some(&buf[..len]), Some(&buf[len..])])
        }
        None => Ok([None, None]),
    }
}
