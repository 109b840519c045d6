use burn::prelude::*;

/// Mean squared error over every element.
pub fn mse<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = predictions - targets;
    (diff.clone() * diff).mean()
}

/// Binary cross-entropy on raw logits.
///
/// Uses `max(z, 0) - z * y + ln(1 + exp(-|z|))`, which stays finite for large `|z|`.
pub fn binary_cross_entropy_with_logits<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let positive = logits.clone().clamp_min(0.0);
    let softplus = logits.clone().abs().neg().exp().add_scalar(1.0).log();
    (positive - logits * targets + softplus).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBackend;

    fn column(values: &[f32]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [values.len(), 1]),
            &Default::default(),
        )
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_mse() {
        let loss = mse(column(&[1.0, 2.0, 4.0]), column(&[1.0, 0.0, 1.0]));
        assert!((scalar(loss) - 13.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let loss = binary_cross_entropy_with_logits(column(&[0.0, 2.0]), column(&[1.0, 0.0]));
        let expected = (2.0f32.ln() + (1.0 + 2.0f32.exp()).ln()) / 2.0;
        assert!((scalar(loss) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_bce_is_finite_for_extreme_logits() {
        let loss = binary_cross_entropy_with_logits(column(&[80.0, -80.0]), column(&[0.0, 1.0]));
        let value = scalar(loss);
        assert!(value.is_finite());
        assert!((value - 80.0).abs() < 1e-3);
    }
}
