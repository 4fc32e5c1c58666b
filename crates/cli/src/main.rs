use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use log::info;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wgmode_core::{
    cache::ModeCache,
    error::SolverResult,
    export,
    group_index::{GroupIndexResult, solve_group_index},
    io::JobConfig,
    mode::{ModeProfile, ModeSet},
    solver::{JobContext, ModeSolver},
    sweep::{SweepOptions, SweepResult, sweep_widths},
};

#[derive(Parser, Debug)]
#[command(name = "wgmode", about = "Finite-difference waveguide mode solver")]
struct Cli {
    /// Path to a TOML job file
    #[arg(short, long)]
    config: PathBuf,
    /// What to compute
    #[arg(short, long, value_enum, default_value_t = Task::Solve)]
    task: Task,
    /// Directory for field dumps and tables; overrides `[output] dir`
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write the summary table here instead of stdout
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Summary table format
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,
    /// Ignore cached results and replace them
    #[arg(long)]
    overwrite: bool,
    /// Worker threads for sweeps; overrides `[sweep] threads`
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    threads: Option<u64>,
    /// Only log warnings and errors (stderr)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Task {
    /// Modes of the configured waveguide
    Solve,
    /// Group index by a centred difference in wavelength
    GroupIndex,
    /// Effective indices over `[sweep] widths`
    Sweep,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    info!("[cli] loading config {}", cli.config.display());
    let mut config = JobConfig::load(&cli.config)?;
    if let Some(dir) = cli.output.clone() {
        config.output.dir = Some(dir);
    }
    if let Some(threads) = cli.threads {
        config.sweep.threads = Some(usize::try_from(threads)?);
    }
    config.validate()?;

    let solver = ModeSolver::new(config.solver.clone())?;
    let cache = config.cache.build();
    let recorder = config.metrics.build_recorder()?;
    let ctx = JobContext {
        cache: cache.as_ref().map(|c| c as &dyn ModeCache),
        overwrite: cli.overwrite || config.cache.overwrite,
        metrics: recorder.as_ref(),
    };

    let mut writer: Box<dyn Write> = match cli.summary.as_deref() {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    match cli.task {
        Task::Solve => {
            let structure = config.waveguide.build()?;
            let fingerprint = solver.config().fingerprint(config.waveguide.fingerprint());
            let set = solver.solve_with(&structure, &ctx.options(&fingerprint, None))?;
            if let Some(dir) = config.output.dir.as_deref() {
                export_modes(dir, &config, &set)?;
            }
            emit_modes(&mut writer, &set, cli.format)?;
        }
        Task::GroupIndex => {
            let result = solve_group_index(
                &config.waveguide,
                &solver,
                config.group_index.wavelength_step,
                &ctx,
            )?;
            if let Some(dir) = config.output.dir.as_deref() {
                let path = export::write_group_index(dir, &config.name, &result)?;
                info!("[cli] wrote {}", path.display());
            }
            emit_group_index(&mut writer, &result, cli.format)?;
        }
        Task::Sweep => {
            if config.sweep.widths.is_empty() {
                return Err("the sweep task needs `[sweep] widths` in the job file".into());
            }
            let opts = SweepOptions {
                threads: config.sweep.threads,
                progress: !cli.quiet,
            };
            let result =
                sweep_widths(&config.waveguide, &config.sweep.widths, &solver, &ctx, opts)?;
            if let Some(dir) = config.output.dir.as_deref() {
                for path in export::write_sweep(dir, &config.name, &result)? {
                    info!("[cli] wrote {}", path.display());
                }
            }
            emit_sweep(&mut writer, &result, cli.format)?;
        }
    }
    writer.flush()?;

    match cli.summary {
        Some(path) => info!("[cli] summary written to {}", path.display()),
        None => info!("[cli] summary written to stdout"),
    }
    Ok(())
}

fn export_modes(dir: &Path, config: &JobConfig, set: &ModeSet) -> SolverResult<()> {
    let info_path = export::write_mode_info(dir, set)?;
    let fields = export::write_mode_fields(dir, &config.output.stem, set, &config.output.fields)?;
    info!(
        "[cli] wrote {} and {} field files under {}",
        info_path.display(),
        fields.len(),
        dir.display()
    );
    Ok(())
}

fn emit_modes(writer: &mut dyn Write, set: &ModeSet, format: Format) -> io::Result<()> {
    match format {
        Format::Csv => {
            writeln!(writer, "mode,n_eff_re,n_eff_im,label,percentage,fraction_te,fraction_tm")?;
            for (idx, mode) in set.modes().iter().enumerate() {
                let n = mode.n_eff();
                writeln!(
                    writer,
                    "{idx},{},{},{},{:.2},{},{}",
                    n.re,
                    n.im,
                    mode.mode_type(),
                    mode.percentage(),
                    mode.fraction_te(),
                    mode.fraction_tm()
                )?;
            }
        }
        Format::Json => {
            let modes: Vec<_> = set
                .modes()
                .iter()
                .map(|mode| {
                    json!({
                        "n_eff": [mode.n_eff().re, mode.n_eff().im],
                        "type": mode.mode_type(),
                        "percentage": mode.percentage(),
                        "fraction_te": mode.fraction_te(),
                        "fraction_tm": mode.fraction_tm(),
                    })
                })
                .collect();
            let doc = json!({
                "method": set.method,
                "wavelength": set.wavelength,
                "modes": modes,
            });
            serde_json::to_writer_pretty(&mut *writer, &doc)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn emit_group_index(
    writer: &mut dyn Write,
    result: &GroupIndexResult,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Csv => {
            writeln!(writer, "mode,n_eff,group_index")?;
            for (idx, (n, ng)) in result.n_effs.iter().zip(&result.group_indices).enumerate() {
                writeln!(writer, "{idx},{n},{ng}")?;
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *writer, result)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn emit_sweep(writer: &mut dyn Write, result: &SweepResult, format: Format) -> io::Result<()> {
    match format {
        Format::Csv => {
            let max_modes = result.n_effs.iter().map(Vec::len).max().unwrap_or(0);
            write!(writer, "param")?;
            for idx in 0..max_modes {
                write!(writer, ",mode{idx}")?;
            }
            writeln!(writer)?;
            for (param, n_effs) in result.params.iter().zip(&result.n_effs) {
                write!(writer, "{param}")?;
                for n in n_effs {
                    write!(writer, ",{n}")?;
                }
                for _ in n_effs.len()..max_modes {
                    write!(writer, ",")?;
                }
                writeln!(writer)?;
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *writer, result)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
