use crate::SharedTile;
use num_traits::Float;

/// Row-major general matrix multiply:
///
/// `C[m,n] = alpha * A[m,k] * B[k,n] + beta * C[m,n]`
///
/// Neither operand is transposed; callers that need `A * B^T` are expected
/// to pre-pack `B` (the fused-gate weight layout does exactly that).
/// `lda`/`ldb`/`ldc` are row strides in elements, which lets a caller hand
/// in column sub-tiles of a wider matrix.
///
/// The loop order keeps the innermost walk contiguous over `B` and `C`
/// rows, with the current `A` element held in a register.
pub fn gemm<T: Float>(
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) {
    if m == 0 || n == 0 {
        return;
    }

    for i in 0..m {
        let a_row = &a[i * lda..i * lda + k];
        let c_row = &mut c[i * ldc..i * ldc + n];

        if beta == T::zero() {
            c_row.fill(T::zero());
        } else if beta != T::one() {
            for value in c_row.iter_mut() {
                *value = *value * beta;
            }
        }

        for (l, &a_val) in a_row.iter().enumerate() {
            let scaled = alpha * a_val;
            if scaled == T::zero() {
                continue;
            }

            let b_row = &b[l * ldb..l * ldb + n];
            for (c_val, &b_val) in c_row.iter_mut().zip(b_row.iter()) {
                *c_val = *c_val + scaled * b_val;
            }
        }
    }
}

/// [gemm] variant that accumulates into a [SharedTile] owned jointly by
/// parallel workers. Row and column stripes of one output matrix interleave
/// in memory, so workers cannot hold long-lived `&mut` slices of it; this
/// variant materializes each output row only for the duration of its
/// update.
///
/// Safety is inherited from the tile contract: concurrent callers must
/// write disjoint `(row, column)` regions, which both striping modes
/// guarantee by construction.
pub fn gemm_into_tile<T: Float + Send>(
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &SharedTile<T>,
    c_offset: usize,
    ldc: usize,
) {
    if m == 0 || n == 0 {
        return;
    }

    for i in 0..m {
        let a_row = &a[i * lda..i * lda + k];
        let c_row = unsafe { c.slice_mut(c_offset + i * ldc, n) };

        if beta == T::zero() {
            c_row.fill(T::zero());
        } else if beta != T::one() {
            for value in c_row.iter_mut() {
                *value = *value * beta;
            }
        }

        for (l, &a_val) in a_row.iter().enumerate() {
            let scaled = alpha * a_val;
            if scaled == T::zero() {
                continue;
            }

            let b_row = &b[l * ldb..l * ldb + n];
            for (c_val, &b_val) in c_row.iter_mut().zip(b_row.iter()) {
                *c_val = *c_val + scaled * b_val;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_times_matrix_is_matrix() {
        let a = vec![1.0f32, 0.0, 0.0, 1.0];
        let b = vec![5.0f32, 6.0, 7.0, 8.0];
        let mut c = vec![0.0f32; 4];

        gemm(2, 2, 2, 1.0, &a, 2, &b, 2, 0.0, &mut c, 2);
        assert_eq!(c, b);
    }

    #[test]
    fn beta_one_accumulates_into_c() {
        let a = vec![1.0f32, 2.0];
        let b = vec![3.0f32, 4.0];
        let mut c = vec![10.0f32];

        // c = 1*3 + 2*4 + c = 21
        gemm(1, 1, 2, 1.0, &a, 2, &b, 1, 1.0, &mut c, 1);
        assert_eq!(c, vec![21.0]);
    }

    #[test]
    fn beta_zero_overwrites_stale_values() {
        let a = vec![2.0f32];
        let b = vec![3.0f32];
        let mut c = vec![f32::NAN];

        gemm(1, 1, 1, 1.0, &a, 1, &b, 1, 0.0, &mut c, 1);
        assert_eq!(c, vec![6.0]);
    }

    #[test]
    fn column_subtile_with_leading_dimensions() {
        // B is 2x4; compute only its last two columns into a 1x2 tile.
        let a = vec![1.0f32, 1.0];
        let b = vec![
            1.0f32, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0,
        ];
        let mut c = vec![0.0f32; 2];

        gemm(1, 2, 2, 1.0, &a, 2, &b[2..], 4, 0.0, &mut c, 2);
        assert_eq!(c, vec![3.0 + 7.0, 4.0 + 8.0]);
    }

    #[test]
    fn alpha_scales_the_product() {
        let a = vec![1.0f32, 2.0, 3.0, 4.0];
        let b = vec![1.0f32, 1.0, 1.0, 1.0];
        let mut c = vec![0.0f32; 4];

        gemm(2, 2, 2, 0.5, &a, 2, &b, 2, 0.0, &mut c, 2);
        assert_eq!(c, vec![1.5, 1.5, 3.5, 3.5]);
    }

    #[test]
    fn tile_variant_matches_the_slice_variant() {
        let a = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = vec![0.5f32, -1.0, 2.0, 1.5, 0.0, -0.5];
        let mut expected = vec![1.0f32; 4];
        let mut actual = expected.clone();

        gemm(2, 2, 3, 1.0, &a, 3, &b, 2, 1.0, &mut expected, 2);

        let tile = SharedTile::new(&mut actual);
        gemm_into_tile(2, 2, 3, 1.0, &a, 3, &b, 2, 1.0, &tile, 0, 2);

        assert_eq!(actual, expected);
    }

    #[test]
    fn tile_variant_writes_interleaved_column_stripes() {
        // One 2x4 output computed as two 2x2 column stripes.
        let a = vec![1.0f32, 2.0, 3.0, 4.0];
        let b = vec![
            1.0f32, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0,
        ];
        let mut full = vec![0.0f32; 8];
        gemm(2, 4, 2, 1.0, &a, 2, &b, 4, 0.0, &mut full, 4);

        let mut striped = vec![0.0f32; 8];
        let tile = SharedTile::new(&mut striped);
        gemm_into_tile(2, 2, 2, 1.0, &a, 2, &b[0..], 4, 0.0, &tile, 0, 4);
        gemm_into_tile(2, 2, 2, 1.0, &a, 2, &b[2..], 4, 0.0, &tile, 2, 4);

        assert_eq!(striped, full);
    }
}
