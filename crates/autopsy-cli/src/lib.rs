//! Autopsy command line
//!
//! `autopsy analyze` reads a trace document (plus optional contracts and
//! engine configuration), runs one analysis pass and prints the bundle.
//! `autopsy config` prints the effective engine configuration as TOML.
//!
//! Exit codes: `0` when a bundle was produced, `2` when the trace itself is
//! malformed, `1` for every other failure.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use anyhow::Context;
use autopsy_contract::ContractRegistry;
use autopsy_engine::{AnalysisEngine, AnalysisError, Bundle, EngineConfig};
use autopsy_model::TraceDocument;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for a malformed trace
pub const EXIT_INVALID_TRACE: i32 = 2;
/// Exit code for I/O, parse and configuration failures
pub const EXIT_FAILURE: i32 = 1;

/// Build the argument parser
#[must_use]
pub fn command() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Engine configuration (TOML)");

    Command::new("autopsy")
        .version(autopsy_engine::VERSION)
        .about("Deterministic failure-pattern detection for agent traces")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Analyze one trace document")
                .arg(
                    Arg::new("trace")
                        .long("trace")
                        .short('t')
                        .required(true)
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Trace document (JSON)"),
                )
                .arg(
                    Arg::new("contracts")
                        .long("contracts")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Tool contract registry (JSON array)"),
                )
                .arg(config_arg.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full bundle as JSON"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective engine configuration")
                .arg(config_arg),
        )
}

/// Parsed `analyze` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeArgs {
    /// Trace document path
    pub trace: PathBuf,
    /// Contract registry path
    pub contracts: Option<PathBuf>,
    /// Engine configuration path
    pub config: Option<PathBuf>,
    /// Print JSON instead of the text report
    pub json: bool,
}

impl AnalyzeArgs {
    fn from_matches(args: &ArgMatches) -> Option<Self> {
        Some(Self {
            trace: args.get_one::<PathBuf>("trace")?.clone(),
            contracts: args.get_one::<PathBuf>("contracts").cloned(),
            config: args.get_one::<PathBuf>("config").cloned(),
            json: args.get_flag("json"),
        })
    }
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Analyze a trace
    Analyze(AnalyzeArgs),
    /// Print configuration
    PrintConfig {
        /// Configuration path, defaults when absent
        config: Option<PathBuf>,
    },
}

impl Action {
    /// Map parsed matches to an action
    #[must_use]
    pub fn from_matches(matches: &ArgMatches) -> Option<Self> {
        match matches.subcommand() {
            Some(("analyze", args)) => AnalyzeArgs::from_matches(args).map(Self::Analyze),
            Some(("config", args)) => Some(Self::PrintConfig {
                config: args.get_one::<PathBuf>("config").cloned(),
            }),
            _ => None,
        }
    }
}

/// Install the stderr log subscriber
///
/// `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
            .init();
    }
}

/// Execute an action and return what should go to stdout
///
/// # Errors
/// Any I/O, parse, configuration or trace validation failure
pub fn run(action: &Action) -> anyhow::Result<String> {
    match action {
        Action::Analyze(args) => {
            let bundle = analyze(args)?;
            if args.json {
                Ok(bundle.to_json_pretty()?)
            } else {
                Ok(render_text(&bundle))
            }
        }
        Action::PrintConfig { config } => Ok(load_config(config.as_deref())?.to_toml_string()?),
    }
}

/// Load inputs and run one analysis pass
///
/// # Errors
/// Unreadable files, malformed JSON/TOML, invalid configuration, or a trace
/// whose events are out of order
pub fn analyze(args: &AnalyzeArgs) -> anyhow::Result<Bundle> {
    let config = load_config(args.config.as_deref())?;
    let engine = AnalysisEngine::new(config)?;
    let registry = load_contracts(args.contracts.as_deref())?;

    let raw = fs::read_to_string(&args.trace)
        .with_context(|| format!("failed to read trace {}", args.trace.display()))?;
    let document: TraceDocument = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse trace {}", args.trace.display()))?;
    debug!(events = document.events.len(), contracts = registry.len(), "inputs loaded");

    let bundle = engine
        .analyze_document(document, &registry)
        .with_context(|| format!("invalid trace {}", args.trace.display()))?;
    Ok(bundle)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_contracts(path: Option<&Path>) -> anyhow::Result<ContractRegistry> {
    let Some(path) = path else {
        return Ok(ContractRegistry::new());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read contracts {}", path.display()))?;
    ContractRegistry::from_json_str(&raw)
        .with_context(|| format!("invalid contracts {}", path.display()))
}

/// Human-readable report
#[must_use]
pub fn render_text(bundle: &Bundle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status: {}", bundle.status());
    let _ = writeln!(out, "{}", bundle.summary());

    if !bundle.hypotheses().is_empty() {
        let _ = writeln!(out, "\nHypotheses:");
        for (rank, h) in bundle.hypotheses().iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. [{}] {} ({})",
                rank + 1,
                h.category(),
                h.description(),
                h.confidence()
            );
            for fix in h.suggested_fixes() {
                let _ = writeln!(out, "       fix: {fix}");
            }
        }
    }

    if !bundle.signals().is_empty() {
        let _ = writeln!(out, "\nSignals:");
        for s in bundle.signals() {
            let ids: Vec<String> = s.event_ids().iter().map(ToString::to_string).collect();
            let _ = writeln!(
                out,
                "  {:<8} {:<18} {} [events {}]",
                s.severity().as_str(),
                s.pattern().as_str(),
                s.evidence_text(),
                ids.join(", ")
            );
        }
    }

    if !bundle.violations().is_empty() {
        let _ = writeln!(out, "\nContract violations:");
        for v in bundle.violations() {
            let _ = writeln!(
                out,
                "  {:<8} event {} {}",
                v.severity().as_str(),
                v.event_id(),
                v.signal().evidence_text()
            );
        }
    }
    out
}

/// Exit code for a failed run
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AnalysisError>() {
        Some(e) if e.is_invalid_input() => EXIT_INVALID_TRACE,
        _ => EXIT_FAILURE,
    }
}
