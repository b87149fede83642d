//! OxiMax CLI - command-line driver for the MaxSAT solver.
//!
//! Reads a WCNF instance, runs the PMRES search, prints the conventional
//! MaxSAT output (`o` / `c` / `s` / `v` lines) and exits with the matching
//! status code.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use oximax_solver::{
    parse_wcnf, PbEncoding, PmresSolver, SearchMode, SolverConfig, WeightStrategy,
};

const EXIT_ERROR: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WeightStrategyArg {
    None,
    Normal,
    Diversify,
}

impl From<WeightStrategyArg> for WeightStrategy {
    fn from(arg: WeightStrategyArg) -> Self {
        match arg {
            WeightStrategyArg::None => WeightStrategy::None,
            WeightStrategyArg::Normal => WeightStrategy::Normal,
            WeightStrategyArg::Diversify => WeightStrategy::Diversify,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PbEncArg {
    Gte,
}

impl From<PbEncArg> for PbEncoding {
    fn from(arg: PbEncArg) -> Self {
        match arg {
            PbEncArg::Gte => PbEncoding::GeneralizedTotalizer,
        }
    }
}

/// Core-guided weighted MaxSAT solver.
#[derive(Debug, Parser)]
#[command(name = "oximax", version, about)]
struct Args {
    /// WCNF instance (classic `p wcnf` or 2022 format).
    file: PathBuf,

    /// Search strategy: 0 core-guided, 1 core-guided then linear, 2 linear.
    #[arg(long, default_value_t = 1)]
    lins: u32,

    /// Stratification strategy for the core-guided phase.
    #[arg(long, value_enum, default_value_t = WeightStrategyArg::Diversify)]
    weight_strategy: WeightStrategyArg,

    /// Geometric weight schedule in the core-guided phase.
    #[arg(long)]
    varying_res_cg: bool,

    /// Geometric weight schedule in the linear phase.
    #[arg(long)]
    varying_res: bool,

    /// Base of the geometric weight schedules.
    #[arg(long, default_value_t = 2)]
    varres_factor: u64,

    /// Time budget in seconds per core-phase oracle call; negative disables.
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    time_limit_cores: f64,

    /// Reset the SAT oracle when switching to the linear phase.
    #[arg(long)]
    delete_before_lin: bool,

    /// Resync the oracle before advancing the weight in the core phase.
    #[arg(long)]
    relax_before_strat: bool,

    /// Tighten the objective bound through assumptions only.
    #[arg(long)]
    incremental_varres: bool,

    /// Pseudo-Boolean encoding family.
    #[arg(long, value_enum, default_value_t = PbEncArg::Gte)]
    pb_enc: PbEncArg,

    /// Diagnostic verbosity (`c` lines).
    #[arg(short, long, default_value_t = 0)]
    verbosity: u32,
}

fn init_tracing(verbosity: u32) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbosity);

    let Some(mode) = SearchMode::from_lins(args.lins) else {
        eprintln!("c ERROR: invalid lins value {} (expected 0, 1 or 2)", args.lins);
        println!("s UNKNOWN");
        return ExitCode::from(EXIT_ERROR);
    };

    let file = match File::open(&args.file) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("c ERROR: cannot open {}: {err}", args.file.display());
            println!("s UNKNOWN");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let formula = match parse_wcnf(BufReader::new(file)) {
        Ok(formula) => formula,
        Err(err) => {
            eprintln!("c ERROR: {err}");
            println!("s UNKNOWN");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    debug!(
        vars = formula.num_vars(),
        hard = formula.n_hard(),
        soft = formula.n_soft(),
        "instance loaded"
    );

    let config = SolverConfig {
        mode,
        weight_strategy: args.weight_strategy.into(),
        varying_res_cg: args.varying_res_cg,
        varying_res: args.varying_res,
        varres_factor: args.varres_factor,
        time_limit_cores: (args.time_limit_cores > 0.0)
            .then(|| Duration::from_secs_f64(args.time_limit_cores)),
        delete_before_lin: args.delete_before_lin,
        relax_before_strat: args.relax_before_strat,
        incremental_varres: args.incremental_varres,
        pb_encoding: args.pb_enc.into(),
        verbosity: args.verbosity,
        print_answers: true,
    };

    let mut solver = PmresSolver::new(formula, config);
    match solver.solve() {
        Ok(status) => ExitCode::from(status.exit_code() as u8),
        Err(err) => {
            eprintln!("c ERROR: {err}");
            println!("s UNKNOWN");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
