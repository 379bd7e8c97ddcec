//! Fitness of a mapped model: L1 norm of its residual.

use ndarray::Array1;

use crate::model::SynthesisModel;

/// Recompute the model and return the sum of absolute residual components.
///
/// The model must already hold a mapped state.
pub fn evaluate<M: SynthesisModel + ?Sized>(model: &mut M) -> f64 {
    let mut fvec = Array1::zeros(model.residual_dim());
    evaluate_into(model, &mut fvec)
}

/// Same as [`evaluate`], reusing `fvec` as the residual buffer.
///
/// `fvec` is resized when its length does not match the model.
pub fn evaluate_into<M: SynthesisModel + ?Sized>(model: &mut M, fvec: &mut Array1<f64>) -> f64 {
    let m = model.residual_dim();
    if fvec.len() != m {
        *fvec = Array1::zeros(m);
    }
    model.calc();
    model.map_to_fvec(fvec);
    fvec.iter().map(|v| v.abs()).sum()
}

/// `true` for values the strategy cannot rank (NaN or infinite).
pub fn is_degenerate(fitness: f64) -> bool {
    !fitness.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuadraticModel;
    use ndarray::array;

    #[test]
    fn test_l1_norm() {
        let mut model = QuadraticModel::new(array![1.0, 1.0]);
        model.map_from_x(array![3.0, -1.0].view());
        // residual (2, -2)
        assert_eq!(evaluate(&mut model), 4.0);
    }

    #[test]
    fn test_buffer_is_resized() {
        let mut model = QuadraticModel::new(array![0.0, 0.0, 0.0]);
        model.map_from_x(array![1.0, -2.0, 0.5].view());
        let mut fvec = Array1::zeros(1);
        assert_eq!(evaluate_into(&mut model, &mut fvec), 3.5);
        assert_eq!(fvec.len(), 3);
    }

    #[test]
    fn test_degenerate() {
        assert!(is_degenerate(f64::NAN));
        assert!(is_degenerate(f64::INFINITY));
        assert!(!is_degenerate(1e300));
    }
}
