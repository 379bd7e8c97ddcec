//! The hybrid search loop: CMA-ES proposes, Levenberg-Marquardt refines.

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use ndarray::{Array1, ArrayView1, ArrayView2};

use math_synthesis_cmaes::{
    Cmaes, CmaesConfig, EvolutionStrategy, Metric, StrategyInit, TerminationReason, Which,
};

use crate::error::{Result, SynthesisError};
use crate::fitness;
use crate::info::{SolverInfo, StopReason};
use crate::model::{Bounds, SynthesisModel};
use crate::options::{CallbackAction, SolverOptions};
use crate::parallel_eval;
use crate::refine::{LevenbergMarquardtRefiner, LocalRefiner};
use crate::stopping;

/// Spread of every coordinate when the model has no bounds.
const UNBOUNDED_SPREAD: f64 = 0.5;

/// Where the main loop stands.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RunState {
    Running,
    StoppedByStrategy(TerminationReason),
    StoppedByPolicy(StopReason),
}

impl RunState {
    fn stop_reason(self) -> Option<StopReason> {
        match self {
            RunState::Running => None,
            RunState::StoppedByStrategy(reason) => Some(StopReason::Strategy(reason)),
            RunState::StoppedByPolicy(reason) => Some(reason),
        }
    }
}

/// Owns the strategy for one run and shuts it down exactly once.
struct StrategyGuard<S: EvolutionStrategy>(S);

impl<S: EvolutionStrategy> Deref for StrategyGuard<S> {
    type Target = S;
    fn deref(&self) -> &S {
        &self.0
    }
}

impl<S: EvolutionStrategy> DerefMut for StrategyGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.0
    }
}

impl<S: EvolutionStrategy> Drop for StrategyGuard<S> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

/// Per-run constants used while scoring candidates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scoring<'a> {
    pub(crate) converge: bool,
    pub(crate) clip: Option<&'a Bounds>,
    pub(crate) degenerate_fitness: f64,
}

/// Counters of one scored generation.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Tally {
    pub(crate) refinements: usize,
    pub(crate) refinement_failures: usize,
    pub(crate) degenerate: usize,
    pub(crate) sum: f64,
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Tally) {
        self.refinements += other.refinements;
        self.refinement_failures += other.refinement_failures;
        self.degenerate += other.degenerate;
        self.sum += other.sum;
    }
}

/// Clip the model's current state onto `bounds`.
///
/// The refiner is unbounded, so a refined state can leave the box.
fn project_onto<M: SynthesisModel + ?Sized>(model: &mut M, bounds: &Bounds) {
    let mut x = Array1::zeros(model.dim());
    model.map_to_x(&mut x);
    if !bounds.contains(x.view()) {
        model.map_from_x(bounds.clip(x.view()).view());
    }
}

/// Map one candidate into the model, refine it if asked, and score it.
pub(crate) fn score_candidate<M, R>(
    ctx: &Scoring<'_>,
    refiner: &mut R,
    model: &mut M,
    x: ArrayView1<'_, f64>,
    fvec: &mut Array1<f64>,
) -> (f64, Tally)
where
    M: SynthesisModel + ?Sized,
    R: LocalRefiner<M> + ?Sized,
{
    match ctx.clip {
        Some(bounds) => model.map_from_x(bounds.clip(x).view()),
        None => model.map_from_x(x),
    }

    let mut tally = Tally::default();
    if ctx.converge {
        model.sync_params();
        tally.refinements = 1;
        if let Err(e) = refiner.refine(model) {
            tally.refinement_failures = 1;
            log::debug!("refinement failed, scoring the unrefined state: {}", e);
        }
        if let Some(bounds) = ctx.clip {
            project_onto(model, bounds);
        }
    }

    let mut f = fitness::evaluate_into(model, fvec);
    if fitness::is_degenerate(f) {
        log::warn!(
            "degenerate fitness {} replaced by {:.3e}",
            f,
            ctx.degenerate_fitness
        );
        f = ctx.degenerate_fitness;
        tally.degenerate = 1;
    }
    tally.sum = f;
    (f, tally)
}

/// Score a population in order on the single shared model.
pub(crate) fn score_population<M, R>(
    ctx: &Scoring<'_>,
    refiner: &mut R,
    model: &mut M,
    population: ArrayView2<'_, f64>,
    fitness: &mut [f64],
) -> Tally
where
    M: SynthesisModel + ?Sized,
    R: LocalRefiner<M> + ?Sized,
{
    let mut fvec = Array1::zeros(model.residual_dim());
    let mut tally = Tally::default();
    for (slot, x) in fitness.iter_mut().zip(population.rows()) {
        let (f, t) = score_candidate(ctx, refiner, model, x, &mut fvec);
        *slot = f;
        tally += t;
    }
    tally
}

/// Initial mean and spread of the search distribution.
///
/// Bounded models start at the centre of their box with half its width as
/// spread; unbounded ones start at the origin.
fn initial_distribution(n: usize, bounds: Option<&Bounds>) -> (Array1<f64>, Array1<f64>) {
    match bounds {
        Some(b) => (b.centre(), b.half_width()),
        None => (Array1::zeros(n), Array1::from_elem(n, UNBOUNDED_SPREAD)),
    }
}

/// Hybrid CMA-ES / local-refinement driver.
///
/// # Example
///
/// ```rust
/// use math_synthesis::{Bounds, QuadraticModel, SolverOptionsBuilder, Synthesizer};
/// use ndarray::array;
///
/// let bounds = Bounds::uniform(2, -5.0, 5.0).unwrap();
/// let mut model = QuadraticModel::new(array![1.0, 1.0]).with_bounds(bounds);
/// let options = SolverOptionsBuilder::new()
///     .converge(false)
///     .stop_fitness(1e-6)
///     .stop_iter(2000)
///     .seed(1)
///     .build()
///     .unwrap();
///
/// let info = Synthesizer::new(options).solve(&mut model).unwrap();
/// assert!(info.minf < 1e-6);
/// ```
pub struct Synthesizer<R = LevenbergMarquardtRefiner> {
    options: SolverOptions,
    refiner: R,
}

impl Synthesizer<LevenbergMarquardtRefiner> {
    /// Driver with the default Levenberg-Marquardt refiner configured from
    /// `options.lm`.
    pub fn new(options: SolverOptions) -> Self {
        let refiner = LevenbergMarquardtRefiner::new(options.lm.clone());
        Self { options, refiner }
    }
}

impl<R> Synthesizer<R> {
    /// Driver with a custom refiner.
    pub fn with_refiner(options: SolverOptions, refiner: R) -> Self {
        Self { options, refiner }
    }

    /// Options of the runs.
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Mutable options, e.g. to swap the callback between runs.
    pub fn options_mut(&mut self) -> &mut SolverOptions {
        &mut self.options
    }

    /// The refiner.
    pub fn refiner(&self) -> &R {
        &self.refiner
    }

    /// Run a search on `model` with CMA-ES.
    ///
    /// On success the model is mapped at the best vector found (refined once
    /// more when `converge` is set) and its visible parameters are synced.
    ///
    /// # Errors
    ///
    /// Initialization errors (no parameters or residuals, bounds that do not
    /// match the model, a zero spread, invalid options) are returned before
    /// the model is touched.
    pub fn solve<M>(&mut self, model: &mut M) -> Result<SolverInfo>
    where
        M: SynthesisModel + ?Sized,
        R: LocalRefiner<M>,
    {
        self.solve_with_strategy::<Cmaes, M>(model)
    }

    /// Same as [`solve`](Self::solve) with any ask/tell strategy.
    pub fn solve_with_strategy<S, M>(&mut self, model: &mut M) -> Result<SolverInfo>
    where
        S: EvolutionStrategy,
        M: SynthesisModel + ?Sized,
        R: LocalRefiner<M>,
    {
        self.drive::<S, M, _>(model, score_population)
    }

    /// Same as [`solve`](Self::solve), scoring each generation with rayon.
    ///
    /// Every candidate gets its own clone of the model and of the refiner and
    /// writes only its own fitness slot. The caller's model is only used for
    /// finalization. Small populations and a disabled `options.parallel` fall
    /// back to sequential scoring.
    pub fn solve_parallel<M>(&mut self, model: &mut M) -> Result<SolverInfo>
    where
        M: SynthesisModel + Clone + Send + Sync,
        R: LocalRefiner<M> + Clone + Send + Sync,
    {
        let parallel = self.options.parallel.clone();
        parallel_eval::configure_thread_pool(&parallel);
        self.drive::<Cmaes, M, _>(model, move |ctx, refiner, model, population, fitness| {
            if parallel.enabled && population.nrows() >= parallel_eval::MIN_PARALLEL_POPULATION {
                parallel_eval::score_population_parallel(ctx, refiner, model, population, fitness)
            } else {
                score_population(ctx, refiner, model, population, fitness)
            }
        })
    }

    fn drive<S, M, F>(&mut self, model: &mut M, mut score: F) -> Result<SolverInfo>
    where
        S: EvolutionStrategy,
        M: SynthesisModel + ?Sized,
        R: LocalRefiner<M>,
        F: FnMut(&Scoring<'_>, &mut R, &mut M, ArrayView2<'_, f64>, &mut [f64]) -> Tally,
    {
        self.options.validate()?;

        let n = model.dim();
        let m = model.residual_dim();
        if n == 0 || m == 0 {
            return Err(SynthesisError::EmptyModel { dim: n, residuals: m });
        }
        let bounds = model.bounds();
        if let Some(b) = &bounds {
            if b.len() != n {
                return Err(SynthesisError::BoundsMismatch {
                    lower_len: b.len(),
                    upper_len: n,
                });
            }
        }

        let (x0, sigma0) = initial_distribution(n, bounds.as_ref());
        let config = CmaesConfig {
            lambda: Some(self.options.population_size(n)),
            seed: self.options.seed,
            stop_max_fun_evals: self.options.stop_evals,
            stop_max_iter: self.options.stop_iter,
            ..CmaesConfig::default()
        };
        let mut strategy = StrategyGuard(S::init(StrategyInit::new(x0, sigma0, config))?);

        log::info!(
            "synthesis: {} parameters, {} residuals, population {}, refinement {}",
            n,
            m,
            strategy.get(Metric::PopulationSize),
            if self.options.converge { "on" } else { "off" }
        );

        let scoring = Scoring {
            converge: self.options.converge,
            clip: if self.options.clip_to_bounds {
                bounds.as_ref()
            } else {
                None
            },
            degenerate_fitness: self.options.degenerate_fitness,
        };

        let mut info = SolverInfo::default();
        let mut fitness: Vec<f64> = Vec::new();
        let start = Instant::now();
        let mut state = RunState::Running;

        while state == RunState::Running {
            if let Some(reason) = strategy.test_for_termination() {
                state = RunState::StoppedByStrategy(reason);
                break;
            }

            strategy.sample_population()?;
            let npop = strategy.get(Metric::PopulationSize) as usize;
            fitness.clear();
            fitness.resize(npop, 0.0);

            let tally = score(
                &scoring,
                &mut self.refiner,
                &mut *model,
                strategy.population(),
                &mut fitness,
            );
            strategy.update_distribution(&fitness)?;

            info.iterations += 1;
            info.evaluations += npop;
            info.refinements += tally.refinements;
            info.refinement_failures += tally.refinement_failures;
            info.degenerate += tally.degenerate;
            info.minf = strategy.get(Metric::BestFitnessEver);
            info.current = strategy.get(Metric::CurrentFitness);
            info.mean = tally.sum / npop as f64;
            info.elapsed = start.elapsed().as_secs_f64();

            let line = format!(
                "iter {:>5} | best = {:>12.6e} | current = {:>12.6e} | mean = {:>12.6e}",
                info.iterations, info.minf, info.current, info.mean
            );
            if self.options.disp {
                log::info!("{}", line);
            } else {
                log::debug!("{}", line);
            }

            let cancelled = match self.options.callback.as_mut() {
                Some(cb) => cb(&info) == CallbackAction::Stop,
                None => false,
            };
            state = if cancelled {
                RunState::StoppedByPolicy(StopReason::Callback)
            } else {
                match stopping::stop_cause(&self.options, &info) {
                    Some(cause) => RunState::StoppedByPolicy(cause),
                    None => RunState::Running,
                }
            };
        }

        info.stop = state.stop_reason();
        if let Some(stop) = &info.stop {
            if stop.is_policy() {
                log::info!("stopped after {} generations: {}", info.iterations, stop);
            } else {
                log::info!("strategy terminated after {} generations: {}", info.iterations, stop);
            }
        }

        // best-ever, not the last generation's best
        let best = strategy.best_vector(Which::Ever);
        match scoring.clip {
            Some(b) => model.map_from_x(b.clip(best.view()).view()),
            None => model.map_from_x(best.view()),
        }
        if self.options.converge {
            model.sync_params();
            info.refinements += 1;
            if let Err(e) = self.refiner.refine(model) {
                info.refinement_failures += 1;
                log::debug!("final refinement failed: {}", e);
            }
            if let Some(b) = scoring.clip {
                project_onto(model, b);
            }
        }
        model.sync_params();
        info.final_fitness = fitness::evaluate(model);
        info.elapsed = start.elapsed().as_secs_f64();
        drop(strategy);

        log::info!("synthesis finished: {}", info);
        Ok(info)
    }
}

/// Run a search with the default refiner; `None` uses default options.
///
/// ```rust
/// use math_synthesis::{PlanarTree, SolverOptionsBuilder, solve_cmaes};
///
/// let mut tree = PlanarTree::two_branch_demo();
/// let options = SolverOptionsBuilder::new().stop_iter(3).seed(5).build().unwrap();
/// let info = solve_cmaes(&mut tree, Some(options)).unwrap();
/// assert!(info.iterations <= 3);
/// assert_eq!(info.evaluations, info.iterations * 10);
/// assert!(info.final_fitness.is_finite());
/// ```
pub fn solve_cmaes<M>(model: &mut M, options: Option<SolverOptions>) -> Result<SolverInfo>
where
    M: SynthesisModel + ?Sized,
{
    Synthesizer::new(options.unwrap_or_default()).solve(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::error::RefineError;
    use crate::models::QuadraticModel;
    use crate::options::SolverOptionsBuilder;
    use crate::refine::RefineReport;
    use math_synthesis_cmaes::Result as CmaesResult;
    use math_synthesis_least_squares::LmTermination;
    use ndarray::{Array2, array};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    thread_local! {
        static SHUTDOWNS: Cell<usize> = const { Cell::new(0) };
    }

    /// CMA-ES that counts how often the driver shuts it down.
    struct CountingCmaes(Cmaes);

    impl EvolutionStrategy for CountingCmaes {
        fn init(init: StrategyInit) -> CmaesResult<Self> {
            SHUTDOWNS.with(|c| c.set(0));
            Ok(Self(Cmaes::init(init)?))
        }
        fn sample_population(&mut self) -> CmaesResult<()> {
            self.0.sample_population()
        }
        fn population(&self) -> ArrayView2<'_, f64> {
            self.0.population()
        }
        fn get(&self, metric: Metric) -> f64 {
            self.0.get(metric)
        }
        fn update_distribution(&mut self, fitness: &[f64]) -> CmaesResult<()> {
            self.0.update_distribution(fitness)
        }
        fn test_for_termination(&self) -> Option<TerminationReason> {
            self.0.test_for_termination()
        }
        fn best_vector(&self, which: Which) -> Array1<f64> {
            self.0.best_vector(which)
        }
        fn shutdown(&mut self) {
            SHUTDOWNS.with(|c| c.set(c.get() + 1));
            self.0.shutdown();
        }
    }

    #[derive(Debug, Clone, Default)]
    struct CountingRefiner {
        calls: usize,
        fail: bool,
    }

    impl<M: SynthesisModel + ?Sized> LocalRefiner<M> for CountingRefiner {
        fn refine(&mut self, _model: &mut M) -> std::result::Result<RefineReport, RefineError> {
            self.calls += 1;
            if self.fail {
                return Err(RefineError::NotConverged {
                    termination: LmTermination::MaxIterations,
                    cost: 1.0,
                });
            }
            Ok(RefineReport {
                cost: 0.0,
                iterations: 0,
                evaluations: 0,
            })
        }
    }

    /// Model whose residual is never finite.
    #[derive(Debug, Clone)]
    struct NanModel {
        x: Array1<f64>,
        params: Array1<f64>,
    }

    impl SynthesisModel for NanModel {
        fn dim(&self) -> usize {
            self.x.len()
        }
        fn residual_dim(&self) -> usize {
            1
        }
        fn map_to_x(&self, x: &mut Array1<f64>) {
            x.assign(&self.x);
        }
        fn map_from_x(&mut self, x: ArrayView1<f64>) {
            self.x.assign(&x);
        }
        fn map_to_fvec(&self, fvec: &mut Array1<f64>) {
            fvec.fill(f64::NAN);
        }
        fn calc(&mut self) {}
        fn params(&self) -> &Array1<f64> {
            &self.params
        }
        fn params_mut(&mut self) -> &mut Array1<f64> {
            &mut self.params
        }
    }

    fn bounded_quadratic() -> QuadraticModel {
        QuadraticModel::new(array![1.0, 1.0]).with_bounds(Bounds::uniform(2, -5.0, 5.0).unwrap())
    }

    fn options(stop_iter: usize) -> SolverOptionsBuilder {
        SolverOptionsBuilder::new()
            .stop_iter(stop_iter)
            .stop_fitness(0.0)
            .seed(11)
    }

    #[test]
    fn test_shutdown_exactly_once() {
        let mut model = bounded_quadratic();
        let mut synth = Synthesizer::new(options(4).converge(false).build().unwrap());
        let info = synth
            .solve_with_strategy::<CountingCmaes, _>(&mut model)
            .unwrap();
        assert_eq!(info.iterations, 4);
        assert!(!info.stop.unwrap().is_policy());
        assert_eq!(SHUTDOWNS.with(|c| c.get()), 1);
    }

    #[test]
    fn test_shutdown_after_callback_stop() {
        let mut model = bounded_quadratic();
        let opts = options(50)
            .converge(false)
            .callback(Box::new(|info: &SolverInfo| {
                if info.iterations >= 2 {
                    CallbackAction::Stop
                } else {
                    CallbackAction::Continue
                }
            }))
            .build()
            .unwrap();
        let info = Synthesizer::new(opts)
            .solve_with_strategy::<CountingCmaes, _>(&mut model)
            .unwrap();
        assert_eq!(info.iterations, 2);
        assert_eq!(info.stop, Some(StopReason::Callback));
        assert!(info.stop.unwrap().is_policy());
        assert_eq!(SHUTDOWNS.with(|c| c.get()), 1);
    }

    #[test]
    fn test_refiner_called_per_candidate_and_once_at_the_end() {
        let mut model = bounded_quadratic();
        let opts = options(3).lambda(6).build().unwrap();
        let mut synth = Synthesizer::with_refiner(opts, CountingRefiner::default());
        let info = synth.solve(&mut model).unwrap();

        assert_eq!(info.iterations, 3);
        assert_eq!(info.evaluations, 18);
        assert_eq!(synth.refiner().calls, 6 * 3 + 1);
        assert_eq!(info.refinements, 6 * 3 + 1);
        assert_eq!(info.refinement_failures, 0);
    }

    #[test]
    fn test_no_refinement_without_converge() {
        let mut model = bounded_quadratic();
        let opts = options(3).converge(false).build().unwrap();
        let mut synth = Synthesizer::with_refiner(opts, CountingRefiner::default());
        let info = synth.solve(&mut model).unwrap();
        assert_eq!(synth.refiner().calls, 0);
        assert_eq!(info.refinements, 0);
    }

    #[test]
    fn test_refinement_failures_do_not_abort() {
        let mut model = bounded_quadratic();
        let opts = options(2).lambda(5).build().unwrap();
        let refiner = CountingRefiner {
            calls: 0,
            fail: true,
        };
        let mut synth = Synthesizer::with_refiner(opts, refiner);
        let info = synth.solve(&mut model).unwrap();
        assert_eq!(info.iterations, 2);
        assert_eq!(info.refinement_failures, 11);
        assert_eq!(info.refinement_failures, info.refinements);
        assert!(info.final_fitness.is_finite());
    }

    #[test]
    fn test_degenerate_fitness_is_replaced() {
        let mut model = NanModel {
            x: Array1::zeros(3),
            params: Array1::zeros(3),
        };
        let opts = options(3)
            .converge(false)
            .degenerate_fitness(1e12)
            .build()
            .unwrap();
        let info = Synthesizer::new(opts).solve(&mut model).unwrap();
        assert!(info.iterations >= 1);
        assert_eq!(info.degenerate, info.evaluations);
        assert_eq!(info.minf, 1e12);
        assert!(info.final_fitness.is_nan());
    }

    #[test]
    fn test_minf_is_monotone() {
        let history = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&history);
        let opts = options(30)
            .converge(false)
            .callback(Box::new(move |info: &SolverInfo| {
                sink.borrow_mut().push(info.minf);
                CallbackAction::Continue
            }))
            .build()
            .unwrap();
        let mut model = bounded_quadratic();
        let info = Synthesizer::new(opts).solve(&mut model).unwrap();

        let history = history.borrow();
        assert_eq!(history.len(), info.iterations);
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*history.last().unwrap(), info.minf);
    }

    #[test]
    fn test_clip_keeps_final_model_inside_bounds() {
        let bounds = Bounds::uniform(2, 2.0, 3.0).unwrap();
        // optimum outside the box
        let mut model = QuadraticModel::new(array![0.0, 0.0]).with_bounds(bounds.clone());
        let opts = options(20)
            .converge(false)
            .clip_to_bounds(true)
            .build()
            .unwrap();
        Synthesizer::new(opts).solve(&mut model).unwrap();
        assert!(bounds.contains(model.params().view()));
    }

    #[test]
    fn test_clip_holds_when_refinement_is_on() {
        let bounds = Bounds::uniform(2, 2.0, 3.0).unwrap();
        // the unbounded refiner would jump to the origin
        let mut model = QuadraticModel::new(array![0.0, 0.0]).with_bounds(bounds.clone());
        let opts = options(5).clip_to_bounds(true).build().unwrap();
        let info = Synthesizer::new(opts).solve(&mut model).unwrap();

        assert!(info.refinements > 0);
        assert!(bounds.contains(model.params().view()));
        // best reachable point is the corner (2, 2)
        assert_abs_diff_eq!(info.minf, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(info.final_fitness, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_projection_after_refinement() {
        let bounds = Bounds::uniform(1, 2.0, 3.0).unwrap();
        let ctx = Scoring {
            converge: true,
            clip: Some(&bounds),
            degenerate_fitness: 1e30,
        };
        let mut model = QuadraticModel::new(array![0.0]).with_bounds(bounds.clone());
        let mut refiner = LevenbergMarquardtRefiner::default();
        let mut fvec = Array1::zeros(1);
        let (f, tally) = score_candidate(
            &ctx,
            &mut refiner,
            &mut model,
            array![2.5].view(),
            &mut fvec,
        );
        assert_eq!(tally.refinements, 1);
        assert_abs_diff_eq!(f, 2.0, epsilon = 1e-12);
        let mut x = Array1::zeros(1);
        model.map_to_x(&mut x);
        assert!(bounds.contains(x.view()));
    }

    #[test]
    fn test_init_errors() {
        let mut empty = QuadraticModel::new(Array1::zeros(0));
        let err = solve_cmaes(&mut empty, None).unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyModel { dim: 0, .. }));

        let mut mismatched =
            QuadraticModel::new(array![1.0, 2.0]).with_bounds(Bounds::uniform(3, 0.0, 1.0).unwrap());
        let err = solve_cmaes(&mut mismatched, None).unwrap_err();
        assert!(err.is_bounds_error());

        let mut model = bounded_quadratic();
        let bad = SolverOptions {
            lambda: 1,
            ..Default::default()
        };
        let err = solve_cmaes(&mut model, Some(bad)).unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidOption { name: "lambda", .. }));
        assert!(err.is_init_error());
    }

    #[test]
    fn test_zero_spread_leaves_model_untouched() {
        let bounds = Bounds::from_pairs(&[(0.0, 1.0), (2.0, 2.0)]).unwrap();
        let mut model = QuadraticModel::new(array![0.5, 2.0]).with_bounds(bounds);
        model.map_from_x(array![0.25, 0.75].view());
        model.sync_params();

        let mut synth = Synthesizer::with_refiner(SolverOptions::default(), CountingRefiner::default());
        let err = synth
            .solve_with_strategy::<CountingCmaes, _>(&mut model)
            .unwrap_err();
        assert!(err.is_init_error());
        assert_eq!(synth.refiner().calls, 0);
        assert_eq!(model.params(), &array![0.25, 0.75]);
        let mut x = Array1::zeros(2);
        model.map_to_x(&mut x);
        assert_eq!(x, array![0.25, 0.75]);
    }

    #[test]
    fn test_run_state_reasons() {
        assert_eq!(RunState::Running.stop_reason(), None);
        assert_eq!(
            RunState::StoppedByStrategy(TerminationReason::MaxIter(3)).stop_reason(),
            Some(StopReason::Strategy(TerminationReason::MaxIter(3)))
        );
        assert_eq!(
            RunState::StoppedByPolicy(StopReason::Fitness).stop_reason(),
            Some(StopReason::Fitness)
        );
    }

    #[test]
    fn test_score_population_order() {
        let ctx = Scoring {
            converge: false,
            clip: None,
            degenerate_fitness: 1e30,
        };
        let mut model = QuadraticModel::new(array![0.0]);
        let pop: Array2<f64> = array![[1.0], [-2.0], [0.5]];
        let mut fitness = vec![0.0; 3];
        let tally = score_population(
            &ctx,
            &mut CountingRefiner::default(),
            &mut model,
            pop.view(),
            &mut fitness,
        );
        assert_eq!(fitness, vec![1.0, 2.0, 0.5]);
        assert_eq!(tally.sum, 3.5);
        assert_eq!(tally.degenerate, 0);
    }
}
