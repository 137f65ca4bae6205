//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads or preprocesses the per-state datasets
//! - runs the estimators
//! - writes the report and optional artifacts

use std::time::Instant;

use clap::Parser;
use tracing::info;

use crate::cli::{AnalyzeArgs, Command, OverlapArgs, SynthArgs};
use crate::domain::AnalyzeConfig;
use crate::error::AnalysisError;
use crate::report::{ReportContext, format_report, format_results, write_report};

pub mod pipeline;

/// Entry point for the `remd-fe` binary.
pub fn run() -> Result<(), AnalysisError> {
    // We want `remd-fe` and `remd-fe -d data` to behave like
    // `remd-fe analyze ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of
    // the argv list before parsing. This keeps the clap structure clean while
    // still accepting the bare flag-only invocation.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_tracing(cli.quiet);

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Overlap(args) => handle_overlap(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AnalysisError> {
    let started = Instant::now();
    let config = analyze_config_from_args(&args);
    let run = pipeline::run_analysis(&config)?;

    println!("{}", format_results(&run.ti, &run.bar, &run.mbar));

    let ctx = ReportContext {
        config: &config,
        dataset: &run.dataset,
        ti: &run.ti,
        bar: &run.bar,
        mbar: &run.mbar,
        wl_weights: &run.wl_weights,
        from_cache: run.from_cache,
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    write_report(&config.output, &format_report(&ctx))?;
    info!("wrote results report to '{}'", config.output.display());

    if let Some(path) = &config.export {
        crate::io::export::write_dataset_csv(path, &run.dataset)?;
        info!("exported finalized datasets to '{}'", path.display());
    }
    if config.plot {
        crate::plot::render_overlap_svg(&run.mbar.overlap, &config.plot_file)?;
        info!("wrote overlap heat map to '{}'", config.plot_file.display());
    }

    Ok(())
}

fn handle_overlap(args: OverlapArgs) -> Result<(), AnalysisError> {
    let dataset = crate::io::cache::read_cache(&args.cache)?;
    let mbar = crate::estimators::fit_mbar(&dataset)?;
    crate::plot::render_overlap_svg(&mbar.overlap, &args.out)?;
    info!("wrote overlap heat map to '{}'", args.out.display());
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AnalysisError> {
    let config = crate::synth::SynthConfig {
        dir: args.dir,
        states: args.states,
        files_per_state: args.files_per_state,
        rows_per_file: args.rows,
        overlap_rows: args.overlap,
        dt: args.dt,
        temp: args.temp,
        seed: args.seed,
    };
    let files = crate::synth::generate_dhdl_files(&config)?;
    info!(
        "wrote {} synthetic dhdl files under '{}'",
        files.len(),
        config.dir.display()
    );
    Ok(())
}

pub fn analyze_config_from_args(args: &AnalyzeArgs) -> AnalyzeConfig {
    AnalyzeConfig {
        dir: args.dir.clone(),
        temp: args.temp,
        dt: args.dt,
        output: args.output.clone(),
        cache: args.cache.clone(),
        refresh: args.refresh,
        export: args.export.clone(),
        plot: args.plot,
        plot_file: args.plot_file.clone(),
    }
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Rewrite argv so `remd-fe` defaults to `remd-fe analyze`.
///
/// Rules:
/// - `remd-fe`                      -> `remd-fe analyze`
/// - `remd-fe -d data ...`          -> `remd-fe analyze -d data ...`
/// - `remd-fe --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("analyze".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "analyze" | "overlap" | "synth");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "analyze flags".
    if arg1.starts_with('-') {
        argv.insert(1, "analyze".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
