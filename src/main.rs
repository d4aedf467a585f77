use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, ValueEnum};
use log::debug;

use tbdd_mc::model::{load_model, Model, ModelError};
use tbdd_mc::prep;
use tbdd_mc::reach::{Reach, Strategy};
use tbdd_mc::report::{group_thousands, stats_lines, Reporter};
use tbdd_mc::tbdd::{Tbdd, TbddConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Bfs,
    Par,
    Sat,
    Chaining,
}

impl From<StrategyArg> for Strategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Bfs => Strategy::Bfs,
            StrategyArg::Par => Strategy::Par,
            StrategyArg::Sat => Strategy::Sat,
            StrategyArg::Chaining => Strategy::Chaining,
        }
    }
}

impl StrategyArg {
    fn name(self) -> &'static str {
        match self {
            StrategyArg::Bfs => "BFS",
            StrategyArg::Par => "PAR",
            StrategyArg::Sat => "SAT",
            StrategyArg::Chaining => "CHAINING",
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Symbolic reachability analysis on tagged BDDs")]
struct Cli {
    /// Binary model file
    model: PathBuf,

    /// Number of workers (0 = autodetect)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Strategy for reachability
    #[arg(short, long, value_enum, default_value = "sat")]
    strategy: StrategyArg,

    /// Check for deadlocks (bfs and par only)
    #[arg(long)]
    deadlocks: bool,

    /// Report #states at each level
    #[arg(long)]
    count_states: bool,

    /// Report table usage at each level
    #[arg(long)]
    count_table: bool,

    /// Report #nodes for TBDDs
    #[arg(long)]
    count_nodes: bool,

    /// Merge transition relations into one transition relation
    #[arg(long)]
    merge_relations: bool,

    /// Print transition matrix
    #[arg(long)]
    print_matrix: bool,

    /// Write manager statistics to a file after the run
    #[arg(short = 'p', long, value_name = "FILE")]
    profile: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Cli::parse();

    if matches!(args.strategy, StrategyArg::Sat | StrategyArg::Chaining) && args.deadlocks {
        Cli::command()
            .error(
                clap::error::ErrorKind::ArgumentConflict,
                "--deadlocks is only supported with the bfs and par strategies",
            )
            .exit();
    }

    if let Err(e) = simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Cannot initialize logging: {}", e);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<(), ModelError> {
    if args.workers > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
        {
            debug!("thread pool already initialized ({})", e);
        }
    }

    let reporter = Reporter::new(args.count_states, args.count_table);
    let tbdd = Tbdd::new(TbddConfig::default());

    let file = File::open(&args.model)
        .map_err(|e| ModelError::Format(format!("Cannot open file '{}': {}", args.model.display(), e)))?;
    let mut model = load_model(&tbdd, &mut BufReader::new(file))?;

    let strategy: Strategy = args.strategy.into();
    if matches!(strategy, Strategy::Sat | Strategy::Chaining) {
        prep::sort_partitions(&tbdd, &mut model);
    }

    reporter.info(&format!("Read file '{}'", args.model.display()));
    reporter.info(&format!(
        "{} integers per state, {} bits per state, {} transition groups",
        model.domain.vectorsize,
        model.domain.totalbits,
        model.next.len()
    ));

    if args.print_matrix {
        for rel in &model.next {
            reporter.info(&prep::matrix_row(rel, model.domain.vectorsize));
        }
    }

    if args.merge_relations && !model.next.is_empty() {
        prep::merge_relations(&tbdd, &mut model);
    }

    if args.count_nodes {
        report_nodes(&tbdd, &reporter, &model);
    }

    reporter.memory_usage();

    let Model { domain, initial: mut states, next } = model;
    let mut reach = Reach::new(&tbdd, &domain, &reporter);
    if args.deadlocks {
        reach = reach.with_deadlock_check();
    }

    let t1 = reporter.elapsed();
    reach.run(strategy, &mut states, &next);
    let t2 = reporter.elapsed();
    reporter.info(&format!("{} Time: {:.6}", args.strategy.name(), t2 - t1));

    let count = tbdd.satcount(states.bdd, states.variables);
    reporter.info(&format!("Final states: {} states", group_thousands(&count)));
    if args.count_nodes {
        reporter.info(&format!(
            "Final states: {} TBDD nodes",
            group_thousands(&tbdd.nodecount(states.bdd).into())
        ));
    }

    reporter.memory_usage();
    reporter.stats_report(&tbdd);

    if let Some(path) = &args.profile {
        let mut out = File::create(path)?;
        for line in stats_lines(&tbdd) {
            writeln!(out, "{}", line)?;
        }
    }

    Ok(())
}

fn report_nodes(tbdd: &Tbdd, reporter: &Reporter, model: &Model) {
    reporter.info("TBDD nodes:");
    reporter.info(&format!(
        "Initial states: {} TBDD nodes",
        group_thousands(&tbdd.nodecount(model.initial.bdd).into())
    ));
    for (i, rel) in model.next.iter().enumerate() {
        reporter.info(&format!(
            "Transition {}: {} TBDD nodes",
            i,
            group_thousands(&tbdd.nodecount(rel.bdd).into())
        ));
    }
}
