use approx::assert_abs_diff_eq;
use blockforge_layers::{apply_rotation, Linear, RotaryEmbedding, SwiGlu};
use ndarray::{s, Array, Array2, Array4, Dimension, Ix3, ShapeBuilder};

fn random_array<Sh, D>(shape: Sh, seed: u64) -> Array<f32, D>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
{
    fastrand::seed(seed);
    Array::from_shape_fn(shape, |_| fastrand::f32() * 2.0 - 1.0)
}

#[test]
fn inverse_frequencies_follow_closed_form() {
    for dim in [2usize, 4, 16, 64, 128] {
        let rope = RotaryEmbedding::with_dim(dim).unwrap();
        assert_eq!(rope.inv_freq().len(), dim / 2);
        for (i, &freq) in rope.inv_freq().iter().enumerate() {
            let expected = 1.0 / 10_000f64.powf(2.0 * i as f64 / dim as f64);
            assert_abs_diff_eq!(freq as f64, expected, epsilon = expected * 1e-5);
        }
    }
}

#[test]
fn first_row_is_identity_rotation() {
    let rope = RotaryEmbedding::new(32, 64).unwrap();
    for n in [1usize, 2, 17, 64] {
        let reference = Array2::<f32>::zeros((n, 32));
        let (cos, sin) = rope.compute_angles(&reference, None).unwrap();
        assert_eq!(cos.dim(), (n, 16));
        assert_eq!(sin.dim(), (n, 16));
        assert!(cos.row(0).iter().all(|&c| c == 1.0));
        assert!(sin.row(0).iter().all(|&v| v == 0.0));
    }
}

#[test]
fn offset_tables_match_tail_of_full_table() {
    let rope = RotaryEmbedding::new(16, 32).unwrap();
    let (full_cos, full_sin) = rope.angles_for_positions(0, 12).unwrap();
    let (tail_cos, tail_sin) = rope.angles_for_positions(7, 5).unwrap();
    assert_eq!(tail_cos, full_cos.slice(s![7.., ..]));
    assert_eq!(tail_sin, full_sin.slice(s![7.., ..]));
}

#[test]
fn rotating_back_restores_input() {
    let rope = RotaryEmbedding::new(16, 64).unwrap();
    let x = random_array((2, 3, 10, 16), 42);
    let (cos, sin) = rope.compute_angles(&x, None).unwrap();

    let rotated = apply_rotation(&x, &cos, &sin).unwrap();
    assert_eq!(rotated.shape(), x.shape());
    let restored = apply_rotation(&rotated, &cos, &sin.mapv(|v| -v)).unwrap();

    for (a, b) in restored.iter().zip(x.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn rotation_preserves_pair_norms() {
    let rope = RotaryEmbedding::new(8, 16).unwrap();
    let x = random_array((6, 8), 5);
    let rotated = rope.rotate(&x, 3).unwrap();

    for (before, after) in x.outer_iter().zip(rotated.outer_iter()) {
        for i in 0..4 {
            let norm_before = before[i].hypot(before[i + 4]);
            let norm_after = after[i].hypot(after[i + 4]);
            assert_abs_diff_eq!(norm_before, norm_after, epsilon = 1e-5);
        }
    }
}

#[test]
fn rotation_is_linear_in_input() {
    let rope = RotaryEmbedding::new(8, 16).unwrap();
    let x = random_array((5, 8), 9);
    let (cos, sin) = rope.compute_angles(&x, None).unwrap();

    let scale = -2.5f32;
    let scaled_first = apply_rotation(&x.mapv(|v| v * scale), &cos, &sin).unwrap();
    let rotated_then_scaled = apply_rotation(&x, &cos, &sin).unwrap().mapv(|v| v * scale);

    for (a, b) in scaled_first.iter().zip(rotated_then_scaled.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn tables_broadcast_over_batch_and_heads() {
    let rope = RotaryEmbedding::new(8, 16).unwrap();
    let x = Array4::from_shape_fn((2, 3, 4, 8), |(b, h, t, c)| {
        (b * 100 + h * 10 + t) as f32 * 0.01 + c as f32
    });
    let (cos, sin) = rope.compute_angles(&x, None).unwrap();
    let rotated = apply_rotation(&x, &cos, &sin).unwrap();

    // Every (batch, head) slice is rotated exactly like a standalone 2-D input.
    let single = x.slice(s![1, 2, .., ..]).to_owned();
    let expected = apply_rotation(&single, &cos, &sin).unwrap();
    assert_eq!(rotated.slice(s![1, 2, .., ..]), expected);
}

#[test]
fn zero_input_without_bias_yields_zero() {
    fastrand::seed(1);
    let ffn = SwiGlu::new(16, 48, 8, false).unwrap();
    let out = ffn.forward(&Array2::<f32>::zeros((3, 16))).unwrap();
    assert_eq!(out.shape(), &[3, 8]);
    assert!(out.iter().all(|&v| v == 0.0));
}

#[test]
fn example_feed_forward_shape() {
    let ffn = SwiGlu::new(4, 8, 4, true).unwrap();
    let out = ffn.forward(&random_array((1, 4), 2)).unwrap();
    assert_eq!(out.shape(), &[1, 4]);
}

#[test]
fn feed_forward_rows_are_independent() {
    fastrand::seed(21);
    let ffn = SwiGlu::new(6, 12, 5, true).unwrap();
    let batch = random_array((2, 4, 6), 77);
    let out = ffn.forward(&batch).unwrap();
    assert_eq!(out.shape(), &[2, 4, 5]);
    let out = out.into_dimensionality::<Ix3>().unwrap();

    let row = batch.slice(s![1, 2, ..]).to_owned();
    let single = ffn.forward(&row).unwrap();
    for (a, b) in single.iter().zip(out.slice(s![1, 2, ..]).iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn feed_forward_matches_composed_projections() {
    fastrand::seed(13);
    let gate = Linear::new(4, 6, true).unwrap();
    let up = Linear::new(4, 6, true).unwrap();
    let down = Linear::new(6, 3, true).unwrap();

    let x = random_array((5, 4), 8);
    let g = gate.forward(&x).unwrap();
    let u = up.forward(&x).unwrap();
    let hidden = g.mapv(|v| v / (1.0 + (-v).exp())) * &u;
    let expected = down.forward(&hidden).unwrap();

    let ffn = SwiGlu::from_projections(gate, up, down).unwrap();
    let out = ffn.forward(&x).unwrap();
    for (a, b) in out.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}
