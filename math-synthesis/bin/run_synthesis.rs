use clap::{Parser, ValueEnum};
use math_synthesis::{
    Bounds, CallbackAction, GenerationRecorder, ParallelConfig, PlanarTree, QuadraticModel,
    SolverInfo, SolverOptionsBuilder, SynthesisModel, Synthesizer,
};
use ndarray::Array1;
use std::fmt::Write as FmtWrite;
use std::process;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "run_synthesis",
    about = "Run the hybrid CMA-ES / Levenberg-Marquardt synthesis on a demo model"
)]
struct Cli {
    /// Model to synthesize
    #[arg(long, value_enum, default_value_t = ModelChoice::PlanarTree)]
    model: ModelChoice,

    /// Dimension of the quadratic model
    #[arg(long, default_value_t = 4)]
    dim: usize,

    /// Population size (0 = max(5, 4 + 3 ln n))
    #[arg(long, default_value_t = 0)]
    lambda: usize,

    /// Skip the local refinement of candidates
    #[arg(long)]
    no_converge: bool,

    /// Stop once the best fitness drops below this value (0 = disabled)
    #[arg(long, default_value_t = 1e-8)]
    stop_fitness: f64,

    /// Maximum number of fitness evaluations (0 = unbounded)
    #[arg(long, default_value_t = 0)]
    stop_evals: usize,

    /// Maximum number of generations (0 = unbounded)
    #[arg(long, default_value_t = 500)]
    stop_iter: usize,

    /// Stop the run after this many seconds (0 = unbounded)
    #[arg(long, default_value_t = 0.0)]
    stop_elapsed: f64,

    /// Project candidates onto the model bounds
    #[arg(long)]
    clip: bool,

    /// Optional random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Print progress every N generations (>= 1)
    #[arg(long, default_value_t = 10)]
    progress_every: usize,

    /// Score each generation in parallel
    #[arg(long)]
    parallel: bool,

    /// Number of threads for parallel evaluation (0 = use all available cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Record every generation to CSV under this run name
    #[arg(long)]
    record: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModelChoice {
    /// Residual `x - 1` in `dim` dimensions, bounds [-5, 5]
    Quadratic,
    /// Two-branch planar tree with analytic Jacobian
    PlanarTree,
    /// Two-branch planar tree, finite-difference Jacobian
    PlanarTreeFd,
}

fn format_vector(x: &Array1<f64>) -> String {
    let mut buffer = String::new();
    for (idx, value) in x.iter().enumerate() {
        if idx > 0 {
            buffer.push_str(", ");
        }
        let _ = write!(&mut buffer, "{value:.6}");
    }
    buffer
}

fn run<M>(model: &mut M, args: &Cli, recorder: Option<&GenerationRecorder>) -> SolverInfo
where
    M: SynthesisModel + Clone + Send + Sync,
{
    let parallel = ParallelConfig {
        enabled: args.parallel,
        num_threads: if args.threads == 0 {
            None
        } else {
            Some(args.threads)
        },
    };

    let mut builder = SolverOptionsBuilder::new()
        .lambda(args.lambda)
        .converge(!args.no_converge)
        .stop_fitness(args.stop_fitness)
        .stop_evals(args.stop_evals)
        .stop_iter(args.stop_iter)
        .stop_elapsed(args.stop_elapsed)
        .clip_to_bounds(args.clip)
        .parallel(parallel);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }

    let progress_every = args.progress_every;
    let recorder = recorder.cloned();
    builder = builder.callback(Box::new(move |info: &SolverInfo| {
        if let Some(rec) = &recorder {
            rec.record(info);
        }
        if info.iterations == 1 || info.iterations % progress_every == 0 {
            println!(
                "iter {:>5} | best = {:>12.6e} | current = {:>12.6e} | mean = {:>12.6e} | evals = {}",
                info.iterations, info.minf, info.current, info.mean, info.evaluations
            );
        }
        CallbackAction::Continue
    }));

    let options = match builder.build() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let mut synth = Synthesizer::new(options);
    let result = if args.parallel {
        synth.solve_parallel(model)
    } else {
        synth.solve(model)
    };
    match result {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Error: synthesis failed: {}", e);
            process::exit(2);
        }
    }
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    if args.progress_every == 0 {
        eprintln!("Error: --progress-every must be at least 1.");
        process::exit(2);
    }
    if args.dim == 0 {
        eprintln!("Error: --dim must be greater than zero.");
        process::exit(2);
    }

    let recorder = match &args.record {
        Some(name) => match GenerationRecorder::new(name.clone()) {
            Ok(r) => Some(r),
            Err(e) => {
                eprintln!("Error: cannot set up recording: {}", e);
                process::exit(2);
            }
        },
        None => None,
    };

    println!("Running synthesis on {:?}...", args.model);
    let start = Instant::now();

    let (info, params) = match args.model {
        ModelChoice::Quadratic => {
            let bounds = match Bounds::uniform(args.dim, -5.0, 5.0) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(2);
                }
            };
            let mut model = QuadraticModel::new(Array1::ones(args.dim)).with_bounds(bounds);
            let info = run(&mut model, &args, recorder.as_ref());
            (info, model.params().clone())
        }
        ModelChoice::PlanarTree | ModelChoice::PlanarTreeFd => {
            let mut tree = PlanarTree::two_branch_demo();
            if matches!(args.model, ModelChoice::PlanarTreeFd) {
                tree = tree.without_jacobian();
            }
            println!("Reference solution: [{}]", format_vector(&PlanarTree::demo_solution()));
            let info = run(&mut tree, &args, recorder.as_ref());
            (info, tree.params().clone())
        }
    };

    println!("\nSynthesis completed in {:.2?}", start.elapsed());
    match &info.stop {
        Some(stop) => println!("Status: {}", stop),
        None => println!("Status: unknown"),
    }
    println!(
        "Iterations: {} | Evaluations: {} | Refinements: {} ({} failed) | Degenerate: {}",
        info.iterations,
        info.evaluations,
        info.refinements,
        info.refinement_failures,
        info.degenerate
    );
    println!("Best fitness: {:.6e}", info.minf);
    println!("Final fitness: {:.6e}", info.final_fitness);
    println!("Best parameters: [{}]", format_vector(&params));

    if let Some(rec) = &recorder {
        match rec.finalize(&info) {
            Ok(path) => println!("Generations recorded to {}", path.display()),
            Err(e) => eprintln!("Warning: failed to write records: {}", e),
        }
    }
}
