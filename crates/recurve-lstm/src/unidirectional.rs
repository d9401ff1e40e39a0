use crate::attributes::ActivationSet;
use crate::reverse::reverse_sequence;
use crate::threading::ThreadPlan;
use crate::weights::{GateBias, GateWeights, NUM_GATES, Peepholes};
use crate::{Direction, alloc_f32};
use recurve_core::kernels::{
    clip_add_bias, clip_ignore_bias, elementwise_product, merge_lstm_gates_to_memory,
};
use recurve_core::{Executor, SharedSlice, SharedTile, gemm_into_tile};
use recurve_error::{RecurveResult, ensure};
use recurve_utils::Tensor;

/// Problem dimensions for one operator invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellShape {
    pub seq_length: usize,
    pub batch_size: usize,
    pub input_size: usize,
    pub hidden_size: usize,
}

/// Single-direction LSTM compute engine.
///
/// Construction re-packs the weights into the fused `[i, f, o, c]` layout,
/// fuses the bias, binds the peephole slices, and allocates every scratch
/// buffer. `compute` then runs the whole-sequence input GEMM followed by
/// the sequential step loop (hidden GEMM + gate kernel per step), writing
/// hidden outputs directly into their final positions.
///
/// One engine serves one invocation; it is not reused.
pub struct UniDirectionalLstm<'a, 'e> {
    executor: &'e Executor,
    direction: Direction,
    shape: CellShape,
    acts: ActivationSet,
    clip: f32,
    input_forget: bool,
    plan: ThreadPlan,
    weights: GateWeights<'a>,

    /// `[B, H]` hidden state fed into step 0.
    initial_hidden: Tensor<f32>,
    /// `[S, B, 4H]` fused gate pre-activation accumulator.
    output_ifog: Tensor<f32>,
    /// `[B, H]` cell state buffers: previous, current, and the activation
    /// scratch the output projection works in.
    cell_prev: Tensor<f32>,
    cell_cur: Tensor<f32>,
    cell_scratch: Tensor<f32>,
    /// `[B, H]` step target when the caller does not want the `Y` sequence.
    /// Rows freeze at each row's last valid step.
    hidden_scratch: Tensor<f32>,
    /// Reverse direction only: `[S, B, I]` reversed-time input view and the
    /// `[S, B, H]` staging buffer that is re-reversed into the caller's `Y`.
    reversed_input: Tensor<f32>,
    reversed_output: Tensor<f32>,
}

impl<'a, 'e> UniDirectionalLstm<'a, 'e> {
    /// Build the engine for one direction.
    ///
    /// Weight arguments follow the declaration order
    /// `(input_weights, recurrent_weights, bias, peephole_weights)`:
    /// `input_weights` is the `[4H, I]` slab, `recurrent_weights` the
    /// `[4H, H]` slab, `bias` the `8H` vector, and `peephole_weights` the
    /// `3H` vector, all in source gate order. `initial_h` / `initial_c`
    /// are `[B, H]` and default to zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executor: &'e Executor,
        direction: Direction,
        shape: CellShape,
        acts: ActivationSet,
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
            !matches!(direction, Direction::Bidirectional),
            InvalidArgument: "the unidirectional engine runs a single direction; use BidirectionalLstm"
        );

        let CellShape {
            seq_length,
            batch_size,
            input_size,
            hidden_size,
        } = shape;

        let weights = GateWeights::load(
            input_weights,
            recurrent_weights,
            bias,
            peephole_weights,
            input_size,
            hidden_size,
        )?;

        let state_len = batch_size * hidden_size;

        let mut initial_hidden = alloc_f32((batch_size, hidden_size))?;
        if let Some(h0) = initial_h {
            ensure!(
                h0.len() == state_len,
                InvalidArgument: "initial_h slice has {} elements, expected {}",
                h0.len(),
                state_len
            );
            initial_hidden.data_mut().copy_from_slice(h0);
        }

        let mut cell_prev = alloc_f32((batch_size, hidden_size))?;
        if let Some(c0) = initial_c {
            ensure!(
                c0.len() == state_len,
                InvalidArgument: "initial_c slice has {} elements, expected {}",
                c0.len(),
                state_len
            );
            cell_prev.data_mut().copy_from_slice(c0);
        }

        let mut hidden_scratch = alloc_f32((batch_size, hidden_size))?;
        hidden_scratch
            .data_mut()
            .copy_from_slice(initial_hidden.data());

        let (rev_in, rev_out) = if direction.is_reverse() {
            (
                alloc_f32((seq_length, batch_size, input_size))?,
                alloc_f32((seq_length, batch_size, hidden_size))?,
            )
        } else {
            (alloc_f32((0, 0, 0))?, alloc_f32((0, 0, 0))?)
        };

        Ok(Self {
            executor,
            direction,
            shape,
            acts,
            clip,
            input_forget,
            plan: ThreadPlan::for_host(batch_size, hidden_size),
            weights,
            initial_hidden,
            output_ifog: alloc_f32((seq_length, batch_size, NUM_GATES * hidden_size))?,
            cell_prev,
            cell_cur: alloc_f32((batch_size, hidden_size))?,
            cell_scratch: alloc_f32((batch_size, hidden_size))?,
            hidden_scratch,
            reversed_input: rev_in,
            reversed_output: rev_out,
        })
    }

    /// Override the shape-derived parallelization plan. Useful for pinning
    /// the batch-parallel or column-parallel path regardless of host width.
    pub fn with_thread_plan(mut self, plan: ThreadPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn thread_plan(&self) -> ThreadPlan {
        self.plan
    }

    /// Run the full pass over `input` (`[S, B, I]`).
    ///
    /// `y` is the caller's whole `[S, D, B, H]` sequence output;
    /// `y_slot` selects this direction's slot within it. `y_h` / `y_c`
    /// are this direction's `[B, H]` final-state outputs. Every output is
    /// optional.
    ///
    /// An empty or absent `seq_lens` is treated as "every row runs the
    /// full `S` steps".
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &mut self,
        input: &[f32],
        seq_lens: Option<&[i32]>,
        num_directions: usize,
        mut y: Option<&mut [f32]>,
        y_slot: usize,
        mut y_h: Option<&mut [f32]>,
        mut y_c: Option<&mut [f32]>,
    ) -> RecurveResult<()> {
        let CellShape {
            seq_length,
            batch_size,
            input_size,
            hidden_size,
        } = self.shape;
        let state_len = batch_size * hidden_size;
        let gate_width = NUM_GATES * hidden_size;

        ensure!(
            input.len() == seq_length * batch_size * input_size,
            InvalidArgument: "input slice has {} elements, expected {}",
            input.len(),
            seq_length * batch_size * input_size
        );
        ensure!(
            num_directions == 1 || num_directions == 2,
            InvalidArgument: "num_directions must be 1 or 2, got {}",
            num_directions
        );
        ensure!(
            y_slot < num_directions,
            InvalidArgument: "output slot {} is outside {} directions",
            y_slot,
            num_directions
        );
        if let Some(buf) = y.as_deref() {
            ensure!(
                buf.len() == seq_length * num_directions * state_len,
                InvalidArgument: "Y buffer has {} elements, expected {}",
                buf.len(),
                seq_length * num_directions * state_len
            );
        }
        for (name, buf) in [("Y_h", y_h.as_deref()), ("Y_c", y_c.as_deref())] {
            if let Some(buf) = buf {
                ensure!(
                    buf.len() == state_len,
                    InvalidArgument: "{} slice has {} elements, expected {}",
                    name,
                    buf.len(),
                    state_len
                );
            }
        }

        let default_lens: Vec<i32>;
        let seq_lens: &[i32] = match seq_lens {
            Some(lens) if !lens.is_empty() => {
                ensure!(
                    lens.len() == batch_size,
                    InvalidArgument: "sequence_lens has {} rows, expected {}",
                    lens.len(),
                    batch_size
                );
                for (row, &len) in lens.iter().enumerate() {
                    ensure!(
                        len >= 0 && len as usize <= seq_length,
                        InvalidArgument: "sequence_lens[{}] = {} is outside [0, {}]",
                        row,
                        len,
                        seq_length
                    );
                }
                lens
            }
            _ => {
                default_lens = vec![seq_length as i32; batch_size];
                &default_lens
            }
        };

        let max_len = seq_lens.iter().copied().max().unwrap_or(0).max(0) as usize;
        let min_len = seq_lens
            .iter()
            .copied()
            .min()
            .unwrap_or(seq_length as i32)
            .max(0) as usize;

        tracing::trace!(
            direction = ?self.direction,
            max_len,
            min_len,
            batch_parallel = self.plan.batch_parallel,
            "lstm pass"
        );

        let is_reverse = self.direction.is_reverse();
        if is_reverse {
            reverse_sequence(
                input,
                self.reversed_input.data_mut(),
                seq_lens,
                seq_length,
                batch_size,
                input_size,
                1,
            );
        }

        // Erased views for the striped workers: stripes run as owned
        // 'static pool jobs, so every buffer they touch crosses over as a
        // SharedTile/SharedSlice. Stripes address disjoint row or column
        // regions and every dispatch joins before the next phase starts.
        let ifog_tile = SharedTile::new(self.output_ifog.data_mut());
        let cell_prev_tile = SharedTile::new(self.cell_prev.data_mut());
        let cell_cur_tile = SharedTile::new(self.cell_cur.data_mut());
        let cell_scratch_tile = SharedTile::new(self.cell_scratch.data_mut());

        // The step target is the caller's Y slot, the reversed-output
        // staging buffer, or the frozen single-step scratch. A stride of
        // zero means "every step overwrites the same [B, H] block".
        let (target_tile, target_base, target_stride) = match y.as_deref_mut() {
            Some(_) if is_reverse => (
                SharedTile::new(self.reversed_output.data_mut()),
                0,
                state_len,
            ),
            Some(buf) => (
                SharedTile::new(buf),
                y_slot * state_len,
                num_directions * state_len,
            ),
            None => (SharedTile::new(self.hidden_scratch.data_mut()), 0, 0),
        };

        // Pre-fill the final-cell output with the initial cell state so
        // zero-length rows report it untouched; per-row snapshots overwrite
        // the rest at each row's last valid step.
        let out_c_tile = match y_c.as_deref_mut() {
            Some(buf) => {
                buf.copy_from_slice(self.cell_prev.data());
                Some(SharedTile::new(buf))
            }
            None => None,
        };

        let x_view = if is_reverse {
            SharedSlice::new(self.reversed_input.data())
        } else {
            SharedSlice::new(input)
        };
        let w_view = SharedSlice::new(self.weights.input_fused());
        let r_view = SharedSlice::new(self.weights.recurrent_fused());
        let init_view = SharedSlice::new(self.initial_hidden.data());
        let executor = self.executor;
        let plan = self.plan;

        // Input GEMM, once over every step up to the longest row.
        let input_rows = max_len * batch_size;
        let input_stripe = ThreadPlan::stripe(input_rows, plan.input_threads);
        executor.dispatch_stripes(input_rows, input_stripe, move |r0, r1| {
            let x = unsafe { x_view.as_slice() };
            gemm_into_tile(
                r1 - r0,
                gate_width,
                input_size,
                1.0,
                &x[r0 * input_size..],
                input_size,
                unsafe { w_view.as_slice() },
                gate_width,
                0.0,
                &ifog_tile,
                r0 * gate_width,
                gate_width,
            );
            Ok(())
        })?;

        let kernel = StepKernel {
            hidden_size,
            clip: self.clip,
            input_forget: self.input_forget,
            zero_masked: target_stride != 0,
            acts: self.acts,
            bias: self.weights.bias().map(|bias| BiasViews::new(bias)),
            peepholes: self.weights.peepholes().map(|peep| PeepholeViews::new(peep)),
            seq_lens: SharedSlice::new(seq_lens),
            ifog: ifog_tile,
            cell_prev: cell_prev_tile,
            cell_cur: cell_cur_tile,
            cell_scratch: cell_scratch_tile,
            out: target_tile,
            out_c: out_c_tile,
        };

        for t in 0..max_len {
            // Hidden state from the previous step: the initial hidden for
            // t = 0, otherwise the just-written step t-1 block.
            let (prev_view, prev_base) = if t == 0 {
                (init_view, 0)
            } else {
                (
                    target_tile.read_only(),
                    target_base + (t - 1) * target_stride,
                )
            };

            let ifog_step = t * batch_size * gate_width;

            if plan.batch_parallel {
                let stripe = ThreadPlan::stripe(batch_size, plan.hidden_threads);
                executor.dispatch_stripes(batch_size, stripe, move |r0, r1| {
                    let prev = unsafe { prev_view.slice(prev_base, state_len) };
                    gemm_into_tile(
                        r1 - r0,
                        gate_width,
                        hidden_size,
                        1.0,
                        &prev[r0 * hidden_size..],
                        hidden_size,
                        unsafe { r_view.as_slice() },
                        gate_width,
                        1.0,
                        &ifog_tile,
                        ifog_step + r0 * gate_width,
                        gate_width,
                    );
                    Ok(())
                })?;
            } else {
                let stripe = ThreadPlan::stripe(gate_width, plan.hidden_threads);
                executor.dispatch_stripes(gate_width, stripe, move |c0, c1| {
                    let prev = unsafe { prev_view.slice(prev_base, state_len) };
                    let r_fused = unsafe { r_view.as_slice() };
                    gemm_into_tile(
                        batch_size,
                        c1 - c0,
                        hidden_size,
                        1.0,
                        prev,
                        hidden_size,
                        &r_fused[c0..],
                        gate_width,
                        1.0,
                        &ifog_tile,
                        ifog_step + c0,
                        gate_width,
                    );
                    Ok(())
                })?;
            }

            let out_step = target_base + t * target_stride;

            if plan.batch_parallel {
                let stripe = ThreadPlan::stripe(batch_size, plan.hidden_threads);
                executor.dispatch_stripes(batch_size, stripe, move |r0, r1| {
                    kernel.run_rows(t, ifog_step, out_step, r0, r1);
                    Ok(())
                })?;
            } else {
                kernel.run_rows(t, ifog_step, out_step, 0, batch_size);
            }
        }

        // Per-row final hidden state.
        if let Some(buf) = y_h.as_deref_mut() {
            for row in 0..batch_size {
                let len = seq_lens[row].max(0) as usize;
                let dst = &mut buf[row * hidden_size..(row + 1) * hidden_size];

                if target_stride == 0 {
                    // Frozen scratch rows already hold each row's last
                    // valid hidden value (or the initial one).
                    let src = unsafe { target_tile.slice(row * hidden_size, hidden_size) };
                    dst.copy_from_slice(src);
                } else if len == 0 {
                    dst.copy_from_slice(
                        &self.initial_hidden.data()[row * hidden_size..(row + 1) * hidden_size],
                    );
                } else {
                    let src = unsafe {
                        target_tile.slice(
                            target_base + (len - 1) * target_stride + row * hidden_size,
                            hidden_size,
                        )
                    };
                    dst.copy_from_slice(src);
                }
            }
        }

        if let Some(buf) = y.as_deref_mut() {
            if is_reverse {
                // Staged reversed-time outputs land in the caller's slot
                // with the step index matching the input again; padded
                // steps come out zeroed.
                reverse_sequence(
                    self.reversed_output.data(),
                    &mut buf[y_slot * state_len..],
                    seq_lens,
                    seq_length,
                    batch_size,
                    hidden_size,
                    num_directions,
                );
            } else {
                for t in max_len..seq_length {
                    let start = (t * num_directions + y_slot) * state_len;
                    buf[start..start + state_len].fill(0.0);
                }
            }
        }

        Ok(())
    }
}

/// Erased views of the fused per-gate bias vectors, which live in the
/// engine's `GateWeights` for the whole invocation.
#[derive(Copy, Clone)]
struct BiasViews {
    input: SharedSlice<f32>,
    output: SharedSlice<f32>,
    forget: SharedSlice<f32>,
    cell: SharedSlice<f32>,
}

impl BiasViews {
    fn new(bias: &GateBias) -> Self {
        Self {
            input: SharedSlice::new(&bias.input),
            output: SharedSlice::new(&bias.output),
            forget: SharedSlice::new(&bias.forget),
            cell: SharedSlice::new(&bias.cell),
        }
    }
}

/// Erased views of the borrowed peephole slices. Still no copy of the
/// weights themselves, only of the view handles.
#[derive(Copy, Clone)]
struct PeepholeViews {
    input: SharedSlice<f32>,
    output: SharedSlice<f32>,
    forget: SharedSlice<f32>,
}

impl PeepholeViews {
    fn new(peepholes: &Peepholes<'_>) -> Self {
        Self {
            input: SharedSlice::new(peepholes.input),
            output: SharedSlice::new(peepholes.output),
            forget: SharedSlice::new(peepholes.forget),
        }
    }
}

/// Per-step element-wise gate math over a range of batch rows. Fully
/// owned (`Copy` handles and scalars only) so row stripes can be
/// dispatched as `'static` pool jobs; the backing buffers outlive every
/// dispatch join per the shared-view contract.
#[derive(Copy, Clone)]
struct StepKernel {
    hidden_size: usize,
    clip: f32,
    input_forget: bool,
    /// Whether masked rows must be zeroed in the step target (true when a
    /// sequence output is being emitted; the frozen scratch is left alone).
    zero_masked: bool,
    acts: ActivationSet,
    bias: Option<BiasViews>,
    peepholes: Option<PeepholeViews>,
    seq_lens: SharedSlice<i32>,
    ifog: SharedTile<f32>,
    cell_prev: SharedTile<f32>,
    cell_cur: SharedTile<f32>,
    cell_scratch: SharedTile<f32>,
    out: SharedTile<f32>,
    out_c: Option<SharedTile<f32>>,
}

impl StepKernel {
    /// Process rows `[r0, r1)` of step `t`. `ifog_base` / `out_base` are
    /// the flat offsets of the step's first row in the gate accumulator
    /// and the step target.
    fn run_rows(&self, t: usize, ifog_base: usize, out_base: usize, r0: usize, r1: usize) {
        let h = self.hidden_size;
        let gate_width = NUM_GATES * h;
        let clip = self.clip;
        let seq_lens = unsafe { self.seq_lens.as_slice() };

        let squash = |bias: Option<&[f32]>, x: &mut [f32]| match bias {
            Some(bias) => clip_add_bias(clip, bias, x),
            None => clip_ignore_bias(clip, &[], x),
        };

        for row in r0..r1 {
            let len = seq_lens[row].max(0) as usize;
            let out_start = out_base + row * h;

            if t >= len {
                // Past this row's length: no arithmetic, no state updates.
                if self.zero_masked {
                    unsafe { self.out.slice_mut(out_start, h) }.fill(0.0);
                }
                continue;
            }

            let gates = unsafe { self.ifog.slice_mut(ifog_base + row * gate_width, gate_width) };
            let (i_raw, rest) = gates.split_at_mut(h);
            let (f_raw, rest) = rest.split_at_mut(h);
            let (o_raw, c_raw) = rest.split_at_mut(h);

            let c_prev = unsafe { self.cell_prev.slice_mut(row * h, h) };
            let c_cur = unsafe { self.cell_cur.slice_mut(row * h, h) };
            let c_scratch = unsafe { self.cell_scratch.slice_mut(row * h, h) };

            if let Some(peep) = &self.peepholes {
                elementwise_product(unsafe { peep.input.as_slice() }, c_prev, i_raw);
            }
            squash(self.bias.as_ref().map(|b| unsafe { b.input.as_slice() }), i_raw);
            (self.acts.f)(i_raw, self.acts.f_alpha, self.acts.f_beta);

            if self.input_forget {
                for j in 0..h {
                    f_raw[j] = 1.0 - i_raw[j];
                }
            } else {
                if let Some(peep) = &self.peepholes {
                    elementwise_product(unsafe { peep.forget.as_slice() }, c_prev, f_raw);
                }
                squash(self.bias.as_ref().map(|b| unsafe { b.forget.as_slice() }), f_raw);
                (self.acts.f)(f_raw, self.acts.f_alpha, self.acts.f_beta);
            }

            squash(self.bias.as_ref().map(|b| unsafe { b.cell.as_slice() }), c_raw);
            (self.acts.g)(c_raw, self.acts.g_alpha, self.acts.g_beta);

            merge_lstm_gates_to_memory(c_prev, i_raw, f_raw, c_raw, c_cur);

            // The output gate peeks at the cell state written this step.
            if let Some(peep) = &self.peepholes {
                elementwise_product(unsafe { peep.output.as_slice() }, c_cur, o_raw);
            }
            squash(self.bias.as_ref().map(|b| unsafe { b.output.as_slice() }), o_raw);
            (self.acts.f)(o_raw, self.acts.f_alpha, self.acts.f_beta);

            let out_row = unsafe { self.out.slice_mut(out_start, h) };
            self.acts
                .h
                .apply(c_cur, c_scratch, o_raw, out_row, self.acts.h_alpha, self.acts.h_beta);

            c_prev.copy_from_slice(c_cur);

            if t + 1 == len {
                if let Some(out_c) = &self.out_c {
                    unsafe { out_c.slice_mut(row * h, h) }.copy_from_slice(c_cur);
                }
            }
        }
    }
}
