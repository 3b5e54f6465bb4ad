//! Agrifood Run
//!
//! Checks, measures and transforms food balance sheets stored as JSON or
//! YAML files.
//!
//! Usage:
//!   `agrifood-run check <sheet>`
//!   `agrifood-run metric <sheet> --metric ssr [--per-item] [--item 2731|beef]`
//!   `agrifood-run apply <sheet> <intervention.yaml> [--out result.json]`
//!   `agrifood-run compare <sheet> [<intervention.yaml>...] [--dir DIR]`

use std::path::PathBuf;
use std::process;

use agrifood_food::{Intervention, Metric, compare, scenario};
use agrifood_foundation::Label;
use agrifood_run::{format_outcomes, format_rows, init_logging, read_sheet, write_sheet};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "agrifood-run")]
#[command(about = "Check food balance sheets and simulate interventions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify supply equals utilization in every cell
    Check {
        sheet: PathBuf,

        /// Relative tolerance
        #[arg(long, default_value = "1e-9")]
        tolerance: f64,
    },

    /// Compute an indicator
    Metric {
        sheet: PathBuf,

        #[arg(long, value_enum, default_value = "ssr")]
        metric: MetricArg,

        /// Keep one value per item instead of aggregating
        #[arg(long)]
        per_item: bool,

        /// Restrict to these items (repeatable; codes or names)
        #[arg(long = "item")]
        items: Vec<Label>,
    },

    /// Apply one intervention
    Apply {
        sheet: PathBuf,
        intervention: PathBuf,

        /// Write the resulting sheet here (.json or .yaml)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Apply several interventions in parallel and report their metrics
    Compare {
        sheet: PathBuf,
        interventions: Vec<PathBuf>,

        /// Load every intervention in this directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MetricArg {
    Ssr,
    Idr,
    Residual,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Ssr => Metric::Ssr,
            MetricArg::Idr => Metric::Idr,
            MetricArg::Residual => Metric::Residual,
        }
    }
}

fn main() {
    init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { sheet, tolerance } => check(sheet, tolerance),
        Commands::Metric {
            sheet,
            metric,
            per_item,
            items,
        } => metric_cmd(sheet, metric.into(), per_item, items),
        Commands::Apply {
            sheet,
            intervention,
            out,
        } => apply(sheet, intervention, out),
        Commands::Compare {
            sheet,
            interventions,
            dir,
        } => compare_cmd(sheet, interventions, dir),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn check(path: PathBuf, tolerance: f64) -> anyhow::Result<()> {
    let sheet = read_sheet(&path)?;
    if !sheet.is_accounting() {
        warn!("sheet populates only one side of the identity; nothing to check");
    }
    sheet.check_balance(tolerance)?;
    info!(
        "Balanced: {} cells, {} elements",
        sheet.cell_count(),
        sheet.elements().count()
    );
    Ok(())
}

fn metric_cmd(
    path: PathBuf,
    metric: Metric,
    per_item: bool,
    items: Vec<Label>,
) -> anyhow::Result<()> {
    let sheet = read_sheet(&path)?;
    let filter = (!items.is_empty()).then_some(items.as_slice());
    let values = metric.compute(&sheet, filter, per_item)?;
    for row in format_rows(&values) {
        println!("{metric} {row}");
    }
    Ok(())
}

fn apply(path: PathBuf, intervention: PathBuf, out: Option<PathBuf>) -> anyhow::Result<()> {
    let sheet = read_sheet(&path)?;
    let intervention = Intervention::load(&intervention)
        .with_context(|| format!("failed to load '{}'", intervention.display()))?;

    info!(
        "Applying '{}' ({} steps)",
        intervention.metadata.name,
        intervention.steps.len()
    );
    let result = intervention.apply(&sheet)?;

    for metric in &intervention.metrics {
        for row in format_rows(&metric.compute(&result, None, false)?) {
            println!("{metric} {row}");
        }
    }
    if let Some(out) = out {
        write_sheet(&out, &result)?;
        info!("Wrote {}", out.display());
    }
    Ok(())
}

fn compare_cmd(
    path: PathBuf,
    files: Vec<PathBuf>,
    dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let sheet = read_sheet(&path)?;

    let mut interventions = Vec::new();
    for file in &files {
        interventions.push(
            Intervention::load(file)
                .with_context(|| format!("failed to load '{}'", file.display()))?,
        );
    }
    if let Some(dir) = dir {
        interventions.extend(scenario::load_scenarios(&dir).into_values());
    }
    if interventions.is_empty() {
        bail!("no interventions given");
    }

    info!("Comparing {} interventions", interventions.len());
    let outcomes = compare(&sheet, &interventions);
    print!("{}", format_outcomes(&outcomes));

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        bail!("{failed} of {} interventions failed", outcomes.len());
    }
    Ok(())
}
