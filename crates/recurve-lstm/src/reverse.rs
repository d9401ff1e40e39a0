/// Reverse a time-major `[S, B, feat]` buffer along the time axis,
/// honoring per-batch sequence lengths: for each row `r`, step `t` of the
/// valid prefix lands at step `seq_lens[r] - 1 - t`, and steps at or past
/// `seq_lens[r]` are zeroed in the destination.
///
/// `dst_stride_factor` spaces destination steps `factor * B * feat`
/// elements apart: 1 reverses into a plain `[S, B, feat]` buffer, while
/// `num_directions` re-reverses a finished pass into its slot of the
/// interleaved `[S, D, B, feat]` output (pass `dst` already offset to the
/// slot).
pub fn reverse_sequence(
    src: &[f32],
    dst: &mut [f32],
    seq_lens: &[i32],
    seq_length: usize,
    batch_size: usize,
    feature_size: usize,
    dst_stride_factor: usize,
) {
    for row in 0..batch_size {
        let len = (seq_lens[row].max(0) as usize).min(seq_length);

        for t in 0..len {
            let from = (t * batch_size + row) * feature_size;
            let to = ((len - 1 - t) * dst_stride_factor * batch_size + row) * feature_size;
            dst[to..to + feature_size].copy_from_slice(&src[from..from + feature_size]);
        }

        for t in len..seq_length {
            let to = (t * dst_stride_factor * batch_size + row) * feature_size;
            dst[to..to + feature_size].fill(0.0);
        }
    }
}
