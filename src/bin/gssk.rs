//! GSSK command-line runner
//!
//! Loads a model document, steps it to `t_end` and writes the trajectory as CSV.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gssk_core::{Kernel, KernelError, ModelSpec, Phase};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gssk")]
#[command(about = "Run a GSSK model to completion and print its trajectory as CSV", long_about = None)]
struct Args {
    /// Model document (JSON)
    model: PathBuf,

    /// Write the CSV here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Step size to request on every step (defaults to the model's dt)
    #[arg(long)]
    dt: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// `time` followed by one column per State Vector slot.
fn header(kernel: &Kernel) -> String {
    let mut columns = vec!["time".to_string()];
    for node in kernel.graph().nodes() {
        if node.state_width() == 1 {
            columns.push(node.external_id.clone());
        } else {
            columns.extend((0..node.state_width()).map(|slot| format!("{}[{}]", node.external_id, slot)));
        }
    }
    columns.join(",")
}

fn write_row(out: &mut impl Write, kernel: &Kernel) -> io::Result<()> {
    write!(out, "{:.4}", kernel.t_current())?;
    for v in kernel.state() {
        write!(out, ",{:.6}", v)?;
    }
    writeln!(out)
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn run(args: &Args) -> Result<u64, RunError> {
    let mut kernel = ModelSpec::from_path(&args.model)?.build()?;
    info!(
        model = %args.model.display(),
        nodes = kernel.node_count(),
        edges = kernel.edge_count(),
        method = ?kernel.method(),
        "model loaded"
    );

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);

    writeln!(out, "{}", header(&kernel))?;
    write_row(&mut out, &kernel)?;

    let dt = args.dt.unwrap_or_else(|| kernel.dt());
    let mut steps = 0;
    while kernel.phase() == Phase::Ready {
        if let Err(e) = kernel.step(dt) {
            // Keep what was computed so far.
            out.flush()?;
            return Err(e.into());
        }
        write_row(&mut out, &kernel)?;
        steps += 1;
        debug!(t = kernel.t_current(), "row written");
    }
    out.flush()?;
    Ok(steps)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    match run(&args) {
        Ok(steps) => {
            info!(steps, "simulation complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
