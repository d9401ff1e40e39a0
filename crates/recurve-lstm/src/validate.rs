use crate::unidirectional::CellShape;
use recurve_error::{RecurveResult, ensure, recurve_bail};
use recurve_utils::Tensor;

/// Check every operator input against the declared `num_directions` and
/// `hidden_size` before any buffer is allocated. Failures name the
/// offending tensor with both the expected and the actual shape.
#[allow(clippy::too_many_arguments)]
pub fn validate_inputs(
    x: &Tensor<f32>,
    w: &Tensor<f32>,
    r: &Tensor<f32>,
    b: Option<&Tensor<f32>>,
    seq_lens: Option<&Tensor<i32>>,
    initial_h: Option<&Tensor<f32>>,
    initial_c: Option<&Tensor<f32>>,
    p: Option<&Tensor<f32>>,
    num_directions: usize,
    hidden_size: usize,
) -> RecurveResult<CellShape> {
    ensure!(
        x.rank() == 3,
        InvalidArgument: "tensor X: expected rank 3 [seq_length, batch_size, input_size], got shape {:?}",
        x.dims()
    );

    let shape = CellShape {
        seq_length: x.dim_at(0),
        batch_size: x.dim_at(1),
        input_size: x.dim_at(2),
        hidden_size,
    };

    expect_dims(
        "W",
        w.dims(),
        &[num_directions, 4 * hidden_size, shape.input_size],
    )?;
    expect_dims(
        "R",
        r.dims(),
        &[num_directions, 4 * hidden_size, hidden_size],
    )?;

    if let Some(b) = b {
        expect_dims("B", b.dims(), &[num_directions, 8 * hidden_size])?;
    }

    if let Some(seq_lens) = seq_lens {
        expect_dims("sequence_lens", seq_lens.dims(), &[shape.batch_size])?;

        for (row, &len) in seq_lens.data().iter().enumerate() {
            ensure!(
                len >= 0 && len as usize <= shape.seq_length,
                InvalidArgument: "sequence_lens[{}] = {} is outside [0, {}]",
                row,
                len,
                shape.seq_length
            );
        }
    }

    if let Some(initial_h) = initial_h {
        expect_dims(
            "initial_h",
            initial_h.dims(),
            &[num_directions, shape.batch_size, hidden_size],
        )?;
    }

    if let Some(initial_c) = initial_c {
        expect_dims(
            "initial_c",
            initial_c.dims(),
            &[num_directions, shape.batch_size, hidden_size],
        )?;
    }

    if let Some(p) = p {
        expect_dims("P", p.dims(), &[num_directions, 3 * hidden_size])?;
    }

    Ok(shape)
}

fn expect_dims(name: &str, actual: &[usize], expected: &[usize]) -> RecurveResult<()> {
    if actual != expected {
        recurve_bail!(InvalidArgument: "tensor {}: expected shape {:?}, got {:?}", name, expected, actual);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_tensor(dims: &[usize]) -> Tensor<f32> {
        Tensor::zeros(dims)
    }

    #[test]
    fn accepts_a_consistent_forward_shape_set() {
        let x = f32_tensor(&[3, 2, 5]);
        let w = f32_tensor(&[1, 16, 5]);
        let r = f32_tensor(&[1, 16, 4]);
        let b = f32_tensor(&[1, 32]);
        let seq = Tensor::new(vec![3i32, 1], vec![2usize]);
        let h0 = f32_tensor(&[1, 2, 4]);
        let p = f32_tensor(&[1, 12]);

        let shape = validate_inputs(
            &x,
            &w,
            &r,
            Some(&b),
            Some(&seq),
            Some(&h0),
            Some(&h0),
            Some(&p),
            1,
            4,
        )
        .unwrap();

        assert_eq!(shape.seq_length, 3);
        assert_eq!(shape.batch_size, 2);
        assert_eq!(shape.input_size, 5);
        assert_eq!(shape.hidden_size, 4);
    }

    #[test]
    fn rejects_wrong_recurrent_shape_with_named_tensor() {
        let x = f32_tensor(&[3, 2, 5]);
        let w = f32_tensor(&[1, 16, 5]);
        let r = f32_tensor(&[1, 16, 5]);

        let err = validate_inputs(&x, &w, &r, None, None, None, None, None, 1, 4).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("tensor R"));
        assert!(message.contains("[1, 16, 4]"));
        assert!(message.contains("[1, 16, 5]"));
    }

    #[test]
    fn rejects_rank_2_input() {
        let x = f32_tensor(&[6, 5]);
        let w = f32_tensor(&[1, 16, 5]);
        let r = f32_tensor(&[1, 16, 4]);

        let err = validate_inputs(&x, &w, &r, None, None, None, None, None, 1, 4).unwrap_err();
        assert!(err.to_string().contains("tensor X"));
    }

    #[test]
    fn rejects_directions_mismatch() {
        let x = f32_tensor(&[3, 2, 5]);
        let w = f32_tensor(&[1, 16, 5]);
        let r = f32_tensor(&[1, 16, 4]);

        let err = validate_inputs(&x, &w, &r, None, None, None, None, None, 2, 4).unwrap_err();
        assert!(err.to_string().contains("tensor W"));
    }

    #[test]
    fn rejects_out_of_range_sequence_lengths() {
        let x = f32_tensor(&[3, 2, 5]);
        let w = f32_tensor(&[1, 16, 5]);
        let r = f32_tensor(&[1, 16, 4]);
        let seq = Tensor::new(vec![3i32, 4], vec![2usize]);

        let err =
            validate_inputs(&x, &w, &r, None, Some(&seq), None, None, None, 1, 4).unwrap_err();
        assert!(err.to_string().contains("sequence_lens[1]"));

        let negative = Tensor::new(vec![-1i32, 2], vec![2usize]);
        assert!(validate_inputs(&x, &w, &r, None, Some(&negative), None, None, None, 1, 4).is_err());
    }
}
