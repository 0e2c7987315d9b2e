//! shiftplan CLI - availability-driven shift assignment
//!
//! Reads a poll snapshot (JSON) and an optional bounds file (TOML), builds the
//! assignment problem and solves it, printing a calendar and diagnostics.

mod config;
mod diagnostics;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::RunConfig;
use diagnostics::{DiagnosticConfig, ExitCode, JsonDiagnostic, JsonEmitter, TerminalEmitter};
use serde::Serialize;
use shiftplan_core::{
    BoundsInput, Calendar, DiagnosticEmitter, PersonLoad, PollSnapshot, Renderer, SolveStatus,
    Variant,
};
use shiftplan_render::{ExcelRenderer, TextRenderer};
use shiftplan_solver::{
    BuildOptions, EngineKind, PlanError, PlanOptions, PlanReport, Planner, SolveOptions, Strategy,
    DEFAULT_NODE_LIMIT,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "shiftplan")]
#[command(author, version, about = "Availability-driven shift assignment", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Treat warnings as errors
    #[arg(long, global = true)]
    strict: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Poll snapshot (JSON)
    #[arg(value_name = "SNAPSHOT")]
    snapshot: PathBuf,

    /// Bounds and settings file (TOML)
    #[arg(short, long, value_name = "FILE")]
    bounds: Option<PathBuf>,

    /// Max shifts per person on the same day (overrides the bounds file)
    #[arg(long, value_name = "N")]
    max_shifts_per_day: Option<i64>,

    /// Minutes east of UTC for epoch timestamps (overrides the bounds file)
    #[arg(long, value_name = "MINUTES", allow_hyphen_values = true)]
    utc_offset: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Balanced,
    MinimizeTrips,
    /// Both variants, one after the other
    Both,
}

impl VariantArg {
    fn variants(self) -> Vec<Variant> {
        match self {
            VariantArg::Balanced => vec![Variant::Balanced],
            VariantArg::MinimizeTrips => vec![Variant::MinimizeTrips],
            VariantArg::Both => Variant::ALL.to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Satisfy,
    Optimize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineArg {
    Native,
    Cp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the inputs and report coverage gaps
    Check {
        #[command(flatten)]
        input: InputArgs,

        /// Variant whose bound defaults are shown
        #[arg(long, value_enum, default_value_t = VariantArg::Balanced)]
        variant: VariantArg,
    },

    /// Solve the assignment and print the calendar
    Solve {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, value_enum, default_value_t = VariantArg::Balanced)]
        variant: VariantArg,

        #[arg(long, value_enum, default_value_t = StrategyArg::Optimize)]
        strategy: StrategyArg,

        #[arg(long, value_enum, default_value_t = EngineArg::Native)]
        engine: EngineArg,

        /// Search node budget (native engine)
        #[arg(long, value_name = "N", default_value_t = DEFAULT_NODE_LIMIT)]
        node_limit: u64,

        /// Wall-clock budget in milliseconds
        #[arg(long, value_name = "MS")]
        time_limit_ms: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write an Excel workbook
        #[arg(long, value_name = "FILE")]
        xlsx: Option<PathBuf>,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let config = DiagnosticConfig {
        strict: cli.strict,
        quiet: cli.quiet,
    };
    let result = match cli.command {
        Commands::Check { input, variant } => cmd_check(&input, variant, config),
        Commands::Solve {
            input,
            variant,
            strategy,
            engine,
            node_limit,
            time_limit_ms,
            format,
            output,
            xlsx,
        } => {
            let solve = SolveOptions {
                strategy: match strategy {
                    StrategyArg::Satisfy => Strategy::Satisfy,
                    StrategyArg::Optimize => Strategy::Optimize,
                },
                node_limit: Some(node_limit),
                time_limit: time_limit_ms.map(Duration::from_millis),
            };
            let engine = match engine {
                EngineArg::Native => EngineKind::Native,
                EngineArg::Cp => EngineKind::Cp,
            };
            let outputs = Outputs {
                format,
                output,
                xlsx,
                multiple: variant == VariantArg::Both,
            };
            cmd_solve(&input, variant, engine, solve, &outputs, config)
        }
    };

    match result {
        Ok(code) => code.into(),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::Failure.into()
        }
    }
}

/// Parsed inputs shared by both commands
struct Inputs {
    snapshot: PollSnapshot,
    bounds: BoundsInput,
    build: BuildOptions,
}

fn load_inputs(args: &InputArgs) -> Result<Inputs> {
    let text = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("Failed to read poll snapshot: {}", args.snapshot.display()))?;
    let mut snapshot: PollSnapshot = serde_json::from_str(&text)
        .with_context(|| format!("Invalid poll snapshot: {}", args.snapshot.display()))?;

    let config = match &args.bounds {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(name) = &config.name {
        snapshot.title = Some(name.clone());
    }

    let mut bounds = config.bounds();
    if let Some(cap) = args.max_shifts_per_day {
        bounds.max_shifts_per_day = Some(cap);
    }
    let offset = args.utc_offset.or(config.utc_offset_minutes).unwrap_or(0);
    let build = BuildOptions::with_offset_minutes(offset)?;

    Ok(Inputs {
        snapshot,
        bounds,
        build,
    })
}

fn cmd_check(args: &InputArgs, variant: VariantArg, config: DiagnosticConfig) -> Result<ExitCode> {
    let inputs = load_inputs(args)?;
    let mut emitter = TerminalEmitter::new(std::io::stderr(), config);

    for variant in variant.variants() {
        let planner = Planner::new(PlanOptions {
            variant,
            build: inputs.build,
            ..PlanOptions::default()
        });
        match planner.check(&inputs.snapshot, &inputs.bounds) {
            Ok(report) => {
                println!("Poll: {}", report.title.as_deref().unwrap_or("-"));
                println!(
                    "People: {}  Days: {}  Shifts: {}  Assignable: {}  Max per day: {}",
                    report.people,
                    report.days,
                    report.shifts,
                    report.variables,
                    report.max_shifts_per_day
                );
                println!("Bounds ({variant}):");
                for (person, bound) in &report.bounds {
                    println!("  {person}: min {} max {}", bound.min, bound.max);
                }
                println!();
                emitter.emit_all(&report.diagnostics);
            }
            Err(err) => emitter.emit_all(err.diagnostics()),
        }
    }

    Ok(emitter.exit_code())
}

/// Where solve results go
struct Outputs {
    format: OutputFormat,
    output: Option<PathBuf>,
    xlsx: Option<PathBuf>,
    /// More than one variant: file names get a variant suffix
    multiple: bool,
}

impl Outputs {
    fn path_for(&self, path: &Path, variant: Variant) -> PathBuf {
        if self.multiple {
            suffixed(path, variant.as_str())
        } else {
            path.to_path_buf()
        }
    }
}

/// `plan.xlsx` → `plan-balanced.xlsx`
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{suffix}"),
    };
    path.with_file_name(name)
}

/// Machine-readable result of one variant
#[derive(Serialize)]
struct JsonReport {
    variant: Variant,
    /// `None` when the input was rejected before solving
    status: Option<SolveStatus>,
    objective: Option<i64>,
    proven_optimal: bool,
    nodes: u64,
    elapsed_ms: u64,
    calendar: Option<Calendar>,
    loads: Vec<PersonLoad>,
    error: Option<String>,
    diagnostics: Vec<JsonDiagnostic>,
}

impl JsonReport {
    fn solved(variant: Variant, report: &PlanReport, diagnostics: Vec<JsonDiagnostic>) -> Self {
        Self {
            variant,
            status: Some(report.status),
            objective: report.objective,
            proven_optimal: report.proven_optimal,
            nodes: report.stats.nodes,
            elapsed_ms: report.stats.elapsed.as_millis() as u64,
            calendar: Some(report.calendar.clone()),
            loads: report.calendar.loads(),
            error: None,
            diagnostics,
        }
    }

    fn failed(variant: Variant, err: &PlanError, diagnostics: Vec<JsonDiagnostic>) -> Self {
        let status = match err {
            PlanError::Unsolved { error, .. } => Some(error.status()),
            PlanError::Rejected { .. } => None,
        };
        Self {
            variant,
            status,
            objective: None,
            proven_optimal: false,
            nodes: 0,
            elapsed_ms: 0,
            calendar: None,
            loads: Vec::new(),
            error: Some(err.to_string()),
            diagnostics,
        }
    }
}

fn cmd_solve(
    args: &InputArgs,
    variant: VariantArg,
    engine: EngineKind,
    solve: SolveOptions,
    outputs: &Outputs,
    config: DiagnosticConfig,
) -> Result<ExitCode> {
    let inputs = load_inputs(args)?;
    let mut terminal = TerminalEmitter::new(std::io::stderr(), config);
    let mut json = JsonEmitter::new(config);
    let mut json_reports = Vec::new();
    let mut text_blocks = Vec::new();

    for variant in variant.variants() {
        let planner = Planner::new(PlanOptions {
            variant,
            engine,
            solve: solve.clone(),
            max_shifts_per_day: None,
            build: inputs.build,
        });
        let result = planner.plan(&inputs.snapshot, &inputs.bounds);
        let diagnostics = match &result {
            Ok(report) => &report.diagnostics,
            Err(err) => err.diagnostics(),
        };

        match outputs.format {
            OutputFormat::Text => terminal.emit_all(diagnostics),
            OutputFormat::Json => json.emit_all(diagnostics),
        }

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                if outputs.format == OutputFormat::Json {
                    json_reports.push((variant, JsonReport::failed(variant, &err, json.take())));
                }
                continue;
            }
        };

        match outputs.format {
            OutputFormat::Text => {
                let text = TextRenderer::new().render(&report.calendar)?;
                text_blocks.push((variant, text));
            }
            OutputFormat::Json => {
                json_reports.push((variant, JsonReport::solved(variant, &report, json.take())));
            }
        }

        if let Some(path) = &outputs.xlsx {
            let path = outputs.path_for(path, variant);
            ExcelRenderer::new()
                .write_to(&report.calendar, &path)
                .with_context(|| format!("Failed to write workbook: {}", path.display()))?;
            tracing::info!(path = %path.display(), "workbook written");
        }
    }

    match &outputs.output {
        Some(path) => {
            let rendered: Vec<(Variant, String)> = match outputs.format {
                OutputFormat::Text => text_blocks,
                OutputFormat::Json => json_reports
                    .iter()
                    .map(|(v, r)| Ok((*v, serde_json::to_string_pretty(r)?)))
                    .collect::<Result<_>>()?,
            };
            for (variant, content) in rendered {
                let path = outputs.path_for(path, variant);
                std::fs::write(&path, content)
                    .with_context(|| format!("Failed to write output: {}", path.display()))?;
            }
        }
        None => match outputs.format {
            OutputFormat::Text => {
                let blocks: Vec<String> = text_blocks.into_iter().map(|(_, t)| t).collect();
                print!("{}", blocks.join("\n"));
            }
            OutputFormat::Json => {
                let reports: Vec<&JsonReport> = json_reports.iter().map(|(_, r)| r).collect();
                let json_text = if outputs.multiple {
                    serde_json::to_string_pretty(&reports)?
                } else {
                    match reports.first() {
                        Some(report) => serde_json::to_string_pretty(report)?,
                        None => "null".to_string(),
                    }
                };
                println!("{json_text}");
            }
        },
    }

    Ok(match outputs.format {
        OutputFormat::Text => terminal.exit_code(),
        OutputFormat::Json => json.exit_code(),
    })
}
