use crate::{
    Cmaes, CmaesConfigBuilder, CmaesError, EvolutionStrategy, Metric, StrategyInit,
    TerminationReason, Which,
};
use approx::assert_relative_eq;
use ndarray::{Array1, ArrayView1, array};

fn sphere(x: ArrayView1<f64>) -> f64 {
    x.iter().map(|&xi| xi * xi).sum()
}

fn rosenbrock(x: ArrayView1<f64>) -> f64 {
    (0..x.len() - 1)
        .map(|i| 100.0 * (x[i + 1] - x[i] * x[i]).powi(2) + (1.0 - x[i]).powi(2))
        .sum()
}

/// Drive the ask/tell loop until the strategy terminates.
fn run<F: Fn(ArrayView1<f64>) -> f64>(es: &mut Cmaes, f: F) -> TerminationReason {
    loop {
        if let Some(reason) = es.test_for_termination() {
            return reason;
        }
        es.sample_population().expect("sample");
        let fitness: Vec<f64> = es.population().rows().into_iter().map(&f).collect();
        es.update_distribution(&fitness).expect("update");
    }
}

fn init(x0: Array1<f64>, sigma: f64, seed: u64, max_iter: usize) -> Cmaes {
    let n = x0.len();
    let config = CmaesConfigBuilder::new()
        .seed(seed)
        .stop_max_iter(max_iter)
        .build()
        .expect("valid config");
    Cmaes::init(StrategyInit::new(x0, Array1::from_elem(n, sigma), config)).expect("init")
}

#[cfg(test)]
mod convergence_tests {
    use super::*;

    #[test]
    fn test_sphere_convergence() {
        let mut es = init(array![3.0, -2.0, 1.0, 4.0], 2.0, 42, 2000);
        let reason = run(&mut es, sphere);

        assert!(
            !matches!(reason, TerminationReason::MaxIter(_)),
            "sphere should converge before the budget: {}",
            reason
        );
        assert!(
            es.get(Metric::BestFitnessEver) < 1e-10,
            "f={}",
            es.get(Metric::BestFitnessEver)
        );
    }

    #[test]
    fn test_rosenbrock_convergence() {
        let mut es = init(array![0.0, 0.0], 0.5, 123, 3000);
        run(&mut es, rosenbrock);

        let best = es.best_vector(Which::Ever);
        assert!(
            es.get(Metric::BestFitnessEver) < 1e-6,
            "f={}",
            es.get(Metric::BestFitnessEver)
        );
        assert!((best[0] - 1.0).abs() < 1e-2 && (best[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = init(array![1.0, 1.0, 1.0], 0.5, 9, 50);
        let mut b = init(array![1.0, 1.0, 1.0], 0.5, 9, 50);
        run(&mut a, sphere);
        run(&mut b, sphere);
        assert_eq!(a.best_vector(Which::Ever), b.best_vector(Which::Ever));
        assert_eq!(
            a.get(Metric::BestFitnessEver),
            b.get(Metric::BestFitnessEver)
        );
    }

    #[test]
    fn test_best_ever_is_monotone() {
        let mut es = init(array![2.0, 2.0], 1.0, 5, 60);
        let mut previous = f64::INFINITY;
        while es.test_for_termination().is_none() {
            es.sample_population().unwrap();
            let fitness: Vec<f64> = es.population().rows().into_iter().map(sphere).collect();
            es.update_distribution(&fitness).unwrap();
            let best = es.get(Metric::BestFitnessEver);
            assert!(best <= previous);
            assert!(best <= es.get(Metric::CurrentFitness));
            previous = best;
        }
    }
}

#[cfg(test)]
mod termination_tests {
    use super::*;

    #[test]
    fn test_max_iter() {
        let mut es = init(array![5.0, 5.0], 1.0, 1, 7);
        let reason = run(&mut es, sphere);
        assert_eq!(reason, TerminationReason::MaxIter(7));
        assert_eq!(es.get(Metric::Generation), 7.0);
    }

    #[test]
    fn test_max_fun_evals() {
        let config = CmaesConfigBuilder::new()
            .seed(3)
            .lambda(10)
            .stop_max_fun_evals(35)
            .build()
            .unwrap();
        let mut es = Cmaes::init(StrategyInit::new(
            array![5.0, 5.0],
            array![1.0, 1.0],
            config,
        ))
        .unwrap();
        let reason = run(&mut es, sphere);
        assert_eq!(reason, TerminationReason::MaxFunEvals(35));
        // budget is checked between generations
        assert_eq!(es.get(Metric::Evaluations), 40.0);
    }

    #[test]
    fn test_flat_function_hits_tolfun() {
        let mut es = init(array![0.0, 0.0, 0.0], 1.0, 11, 500);
        let reason = run(&mut es, |_| 1.0);
        assert!(matches!(reason, TerminationReason::TolFun(_)));
        assert_eq!(es.get(Metric::Generation), 1.0);
    }

    #[test]
    fn test_no_termination_before_first_generation() {
        let es = init(array![0.0], 1.0, 1, 0);
        assert!(es.test_for_termination().is_none());
    }

    #[test]
    fn test_reason_display() {
        let reason = TerminationReason::MaxIter(12);
        assert_eq!(reason.to_string(), "MaxIter: reached 12 iterations");
    }
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_init_rejects_zero_dimension() {
        let err = Cmaes::init(StrategyInit::new(
            Array1::zeros(0),
            Array1::zeros(0),
            Default::default(),
        ))
        .err()
        .expect("must fail");
        assert!(matches!(err, CmaesError::InvalidDimension { dim: 0 }));
    }

    #[test]
    fn test_init_rejects_non_positive_spread() {
        let err = Cmaes::init(StrategyInit::new(
            array![0.0, 0.0],
            array![1.0, 0.0],
            Default::default(),
        ))
        .err()
        .expect("must fail");
        assert!(matches!(err, CmaesError::NonPositiveSpread { index: 1, .. }));
    }

    #[test]
    fn test_update_requires_sample() {
        let mut es = init(array![0.0, 0.0], 1.0, 1, 0);
        let lambda = es.get(Metric::PopulationSize) as usize;
        let err = es.update_distribution(&vec![1.0; lambda]).unwrap_err();
        assert!(matches!(err, CmaesError::NotSampled));
    }

    #[test]
    fn test_update_checks_length_and_values() {
        let mut es = init(array![0.0, 0.0], 1.0, 1, 0);
        es.sample_population().unwrap();
        let lambda = es.get(Metric::PopulationSize) as usize;

        let err = es.update_distribution(&vec![1.0; lambda - 1]).unwrap_err();
        assert!(matches!(err, CmaesError::FitnessLengthMismatch { .. }));

        let mut fitness = vec![1.0; lambda];
        fitness[2] = f64::NAN;
        let err = es.update_distribution(&fitness).unwrap_err();
        assert!(matches!(err, CmaesError::NonFiniteFitness { index: 2, .. }));

        // the population is still pending after a rejected update
        fitness[2] = 0.5;
        es.update_distribution(&fitness).unwrap();
        assert_eq!(es.get(Metric::CurrentFitness), 0.5);
    }

    #[test]
    fn test_population_shape_and_default_lambda() {
        let mut es = init(Array1::zeros(10), 1.0, 1, 0);
        es.sample_population().unwrap();
        let pop = es.population();
        assert_eq!(pop.nrows(), 10);
        assert_eq!(pop.ncols(), 10);
        assert_eq!(es.get(Metric::PopulationSize), 10.0);
    }

    #[test]
    fn test_per_coordinate_spread() {
        let config = CmaesConfigBuilder::new().seed(2).build().unwrap();
        let es = Cmaes::init(StrategyInit::new(
            array![0.0, 0.0],
            array![3.0, 0.5],
            config,
        ))
        .unwrap();
        let sd = es.std_devs();
        assert_relative_eq!(sd[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(sd[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut es = init(array![0.0, 0.0], 1.0, 1, 0);
        es.shutdown();
        es.shutdown();
        assert!(matches!(
            es.sample_population().unwrap_err(),
            CmaesError::ShutDown
        ));
        assert!(es.test_for_termination().is_none());
    }

    #[test]
    fn test_snapshot_resume() {
        let mut es = init(array![3.0, 3.0], 1.0, 17, 30);
        run(&mut es, sphere);
        let snap = es.snapshot();

        let config = CmaesConfigBuilder::new().seed(18).stop_max_iter(60).build().unwrap();
        let resumed = Cmaes::init(
            StrategyInit::new(array![3.0, 3.0], array![1.0, 1.0], config).resume_from(snap.clone()),
        )
        .unwrap();

        assert_eq!(resumed.mean(), &snap.mean);
        assert_eq!(resumed.get(Metric::Generation), 30.0);
        assert_eq!(resumed.get(Metric::BestFitnessEver), snap.best_f);
        assert_eq!(resumed.best_vector(Which::Ever), snap.best_x);
    }
}
