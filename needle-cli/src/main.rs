//! needle — compile declarative repo specs into data-access modules.
//!
//! ```bash
//! # Emit a starter spec for an Order repo
//! needle -t Order -o orders.xml
//!
//! # Compile a spec; write the module next to it
//! needle -f orders.xml -o ordersrepo.go
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;

#[derive(Parser)]
#[command(name = "needle")]
#[command(version)]
#[command(about = "Compile a declarative repo spec into a typed data-access module", long_about = None)]
struct Cli {
    /// Input spec file to compile
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Output path; stdout when absent
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Emit a starter spec for the given object type instead of compiling
    #[arg(short = 't', long = "template")]
    template: Option<String>,

    /// Raise log verbosity to debug
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);
    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    tracing::info!("needle version: {}", env!("CARGO_PKG_VERSION"));

    if let Some(obj_name) = &cli.template {
        let Some(output) = &cli.output else {
            bail!("-o template filepath not provided");
        };
        let tmpl = needle_core::config::gen_template(obj_name)?;
        std::fs::write(output, tmpl)
            .with_context(|| format!("writing template to {}", output.display()))?;
        return Ok(());
    }

    let Some(file) = &cli.file else {
        bail!("filepath not provided, pass -f <input.xml> or -t <Name>");
    };

    let code = needle_core::compile_file(file)
        .with_context(|| format!("compiling {}", file.display()))?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, code)
                .with_context(|| format!("writing output to {}", path.display()))?;
        }
        None => {
            std::io::stdout()
                .write_all(code.as_bytes())
                .context("writing output to stdout")?;
        }
    }
    Ok(())
}
