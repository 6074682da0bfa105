use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use projectlens_lib::config::{self, AnalyzerConfig, ConfigError};
use projectlens_lib::core_state::{CoreError, CoreState};
use projectlens_lib::dashboard::{
    self, average_progress, dashboard_title, format_amount, FlowGraph, InvestmentSplit,
};
use projectlens_lib::pipeline::processor::{build_processor, ProcessingError};
use projectlens_lib::pipeline::structuring::{
    check_report, normalize_with, sanitize, BalanceCheck, CanonicalReport, StructuringError,
};
use projectlens_lib::report_cache::{CacheError, ReportCache};

#[derive(Parser)]
#[command(
    name = "projectlens",
    version,
    about = "Turn project progress reports into dashboard data"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a report file (PDF, DOCX or TXT) with the configured model
    Analyze {
        file: PathBuf,
        /// Print the canonical report as JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// Do not replace the cached last report
        #[arg(long)]
        no_cache: bool,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Sanitize and normalize a saved raw model response, without calling the model
    Normalize {
        response_file: PathBuf,
        /// Print the canonical report as JSON instead of a summary
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Show the last analyzed report
    Last {
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Forget the last analyzed report
    Clear,
}

/// How the text summary is drawn.
#[derive(Args)]
struct ViewArgs {
    /// Share of the investment shown as special funds
    #[arg(long, default_value_t = dashboard::DEFAULT_SPECIAL_FUND_RATIO)]
    special_ratio: f64,
    /// Only show fund flows into or out of this node
    #[arg(long, value_name = "NODE")]
    focus: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    State(#[from] CoreError),
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No cached report yet; run `projectlens analyze <file>` first")]
    NoCachedReport,
    #[error("Cannot render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Processing(ProcessingError::Structuring(StructuringError::MissingApiKey)) => 2,
            Self::Processing(ProcessingError::Import(_) | ProcessingError::Extraction(_))
            | Self::Read { .. } => 3,
            Self::Processing(ProcessingError::Structuring(_)) => 4,
            _ => 1,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_filter = match cli.verbose {
        0 => config::default_log_filter(),
        1 => "debug",
        _ => "trace",
    };
    projectlens_lib::init_tracing(log_filter, !cli.no_color);
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let result = match cli.command {
        Commands::Analyze {
            file,
            json,
            no_cache,
            view,
        } => handle_analyze(&file, json, no_cache, &view),
        Commands::Normalize {
            response_file,
            json,
            view,
        } => handle_normalize(&response_file, json, &view),
        Commands::Last { json, view } => handle_last(json, &view),
        Commands::Clear => handle_clear(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn handle_analyze(
    file: &Path,
    json: bool,
    no_cache: bool,
    view: &ViewArgs,
) -> Result<(), CliError> {
    let config = AnalyzerConfig::from_env()?;
    let processor = build_processor(&config)?;

    let state = CoreState::new();
    let _guard = state.begin_processing()?;
    let outcome = processor.process_file(file)?;

    if !no_cache {
        // Cache failures are logged, not fatal.
        if let Err(e) =
            ReportCache::open_default().and_then(|c| c.save(&outcome.file_name, &outcome.report))
        {
            tracing::warn!(error = %e, "Could not cache report");
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome.report, &outcome.balance, &outcome.warnings, view);
    }
    Ok(())
}

fn handle_normalize(response_file: &Path, json: bool, view: &ViewArgs) -> Result<(), CliError> {
    let config = AnalyzerConfig::from_env()?;
    let raw = std::fs::read_to_string(response_file).map_err(|source| CliError::Read {
        path: response_file.to_path_buf(),
        source,
    })?;

    let parsed: Value = serde_json::from_str(&sanitize(&raw)).unwrap_or(Value::Null);
    let normalized = normalize_with(&parsed, &config.balance);

    if json {
        println!("{}", serde_json::to_string_pretty(&normalized)?);
    } else {
        print_summary(&normalized.report, &normalized.balance, &normalized.warnings, view);
    }
    Ok(())
}

fn handle_last(json: bool, view: &ViewArgs) -> Result<(), CliError> {
    let cache = ReportCache::open_default()?;
    let cached = cache.load().ok_or(CliError::NoCachedReport)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cached)?);
    } else {
        let config = AnalyzerConfig::from_env()?;
        let balance = check_report(&cached.report, &config.balance);
        println!(
            "{} (saved {})\n",
            cached.file_name,
            cached.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        print_summary(&cached.report, &balance, &[], view);
    }
    Ok(())
}

fn handle_clear() -> Result<(), CliError> {
    let cache = ReportCache::open_default()?;
    cache.clear()?;
    println!("Cleared {}", cache.path().display());
    Ok(())
}

fn print_summary(
    report: &CanonicalReport,
    balance: &BalanceCheck,
    warnings: &[String],
    view: &ViewArgs,
) {
    let unit = dashboard::DEFAULT_AMOUNT_UNIT;
    let info = &report.project_info;

    println!("{}", dashboard_title(report));
    println!("  承担单位: {}", info.company);
    println!("  建设地点: {}", info.location);
    println!(
        "  投资规模: {}",
        InvestmentSplit::with_ratio(info.investment, view.special_ratio).describe(unit)
    );

    if !report.progress_indicators.is_empty() {
        println!("\n进度指标 (平均 {}%)", average_progress(report));
        for item in &report.progress_indicators {
            println!("  {:<20} {:>6}% / {}", item.name, item.value, item.total);
        }
    }

    if !report.research_progress.is_empty() {
        println!("\n研发进展");
        for item in &report.research_progress {
            println!("  {} {}%: {}", item.title, item.value, item.description);
        }
    }

    if !report.risks.is_empty() {
        println!("\n风险");
        for risk in &report.risks {
            println!("  [{}] {}: {}", risk.level.as_str(), risk.title, risk.description);
            println!("        应对: {}", risk.solution);
        }
    }

    let mut graph = FlowGraph::from_records(&report.financial_data.flow_details);
    if let Some(node) = view.focus.as_deref() {
        graph = graph.focus(node);
        if graph.is_empty() {
            println!("\n资金流向: 未找到节点 {node}");
        }
    }
    if !graph.is_empty() {
        println!("\n资金流向");
        for link in &graph.links {
            println!("  {} → {}: {}", link.source, link.target, format_amount(link.value, unit));
        }
    }

    if !balance.errors.is_empty() {
        println!("\n资金核对");
        for issue in &balance.errors {
            println!("  [{:?}] {}", issue.severity, issue.message);
        }
    }
    for warning in warnings {
        println!("! {warning}");
    }
}
