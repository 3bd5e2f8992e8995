use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use glob::glob;
use sipflow_core::{
    Attribute, CallReport, FilterKind, MatchExpression, Matcher, ReportOptions, SortOptions,
    StoreConfig, build_call_report, load_pcap_file,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXAMPLES: &str = "Examples:\n  sipflow pcap calls capture.pcapng -o calls.json\n  sipflow pcap calls capture.pcap --stdout --calls --sort-by msgcnt --desc\n  sipflow pcap calls capture.pcapng --stdout --filter method=INVITE --filter from=alice";

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("SIPFLOW_BUILD_COMMIT"),
    ", built ",
    env!("SIPFLOW_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "sipflow")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Offline SIP dialog analyzer for network captures.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Operations on PCAP/PCAPNG inputs.
    Pcap {
        #[command(subcommand)]
        command: PcapCommands,
    },
}

#[derive(Subcommand, Debug)]
enum PcapCommands {
    /// Group SIP messages into calls and write a JSON call report.
    #[command(alias = "dialogs")]
    #[command(after_help = EXAMPLES)]
    Calls(CallsArgs),
}

#[derive(Args, Debug)]
struct CallsArgs {
    /// Path to a .pcap or .pcapng file
    input: PathBuf,

    /// Output report path (JSON); defaults to capture.outfile from --config
    #[arg(short = 'o', long)]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// JSON store configuration; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of stored calls (0 = unbounded)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Evict the oldest call when the limit is reached
    #[arg(short = 'R', long)]
    rotate: bool,

    /// Count RTP packets towards SDP media endpoints
    #[arg(short = 'r', long)]
    rtp: bool,

    /// Only keep dialogs starting with INVITE
    #[arg(short = 'c', long = "calls")]
    invite_only: bool,

    /// Only keep dialogs starting with an initial request (no To tag)
    #[arg(short = 'n', long = "no-incomplete")]
    complete_only: bool,

    /// Expression the first message of a dialog must match
    #[arg(long = "match", value_name = "EXPR")]
    match_expr: Option<String>,

    /// Match expression ignores case
    #[arg(short = 'i', long = "icase")]
    ignore_case: bool,

    /// Keep dialogs NOT matching the match expression
    #[arg(long)]
    invert: bool,

    /// View filter as KIND=EXPR (from, to, source, destination, method, payload, line)
    #[arg(long = "filter", value_name = "KIND=EXPR")]
    filters: Vec<String>,

    /// Sort attribute (index, callid, msgcnt, state, sipfrom, ...)
    #[arg(long, value_name = "ATTR")]
    sort_by: Option<String>,

    /// Sort in descending order
    #[arg(long)]
    desc: bool,

    /// Only report calls still in setup or in conversation
    #[arg(long)]
    active: bool,

    /// Leave per-message details out of the report
    #[arg(long)]
    no_messages: bool,

    /// Exit with a non-zero code when no call is visible
    #[arg(long)]
    strict: bool,

    /// List visible calls on stderr after loading
    #[arg(long)]
    list_calls: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Pcap { command } => match command {
            PcapCommands::Calls(args) => {
                init_tracing(cli.verbose, args.quiet);
                cmd_pcap_calls(args)
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_pcap_calls(args: CallsArgs) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;

    let config = build_config(&args)?;
    let report_path = if args.stdout {
        None
    } else {
        let path = args
            .report
            .clone()
            .or_else(|| config.capture.outfile.clone())
            .ok_or_else(|| {
                CliError::new(
                    "missing output path",
                    Some("use -o/--report, --stdout or capture.outfile in --config".to_string()),
                )
            })?;
        ensure_distinct_output(&path, &input_abs)?;
        Some(path)
    };

    let meta = fs::metadata(&resolved_input)
        .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;
    if !meta.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", args.input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }

    debug!(?config, "store configuration");
    let (store, summary) = load_pcap_file(&resolved_input, config)
        .context("PCAP/PCAPNG loading failed")?;
    let options = ReportOptions {
        active_only: args.active,
        omit_messages: args.no_messages,
    };
    let rep = build_call_report(
        &resolved_input.display().to_string(),
        meta.len(),
        &store,
        Some(summary),
        options,
    );
    let json = serialize_report(&rep, args.pretty, args.compact)?;

    match &report_path {
        None => print!("{}", json),
        Some(path) => {
            write_report(path, &json)?;
        }
    }

    if args.list_calls && !args.quiet {
        print_calls(&rep);
    }
    if let Some(path) = &report_path {
        if !args.quiet {
            eprintln!("OK: report written -> {}", path.display());
        }
    }
    if args.strict && rep.calls.is_empty() {
        return Err(CliError::new(
            "no calls matched",
            Some("relax --filter/--match or drop --strict".to_string()),
        ));
    }
    Ok(())
}

/// Config file first, then flags on top.
fn build_config(args: &CallsArgs) -> Result<StoreConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_json_file(path).map_err(|err| {
            CliError::new(
                format!("cannot load config {}: {err}", path.display()),
                Some("the config file must be a JSON store configuration".to_string()),
            )
        })?,
        None => StoreConfig::default(),
    };

    if let Some(limit) = args.limit {
        config.capture.limit = limit;
    }
    config.capture.rotate |= args.rotate;
    config.capture.rtp |= args.rtp;
    config.match_opts.invite |= args.invite_only;
    config.match_opts.complete |= args.complete_only;
    config.match_opts.ignore_case |= args.ignore_case;
    config.match_opts.invert |= args.invert;
    if let Some(expr) = &args.match_expr {
        config.match_opts.expression = Some(expr.clone());
    }

    if let Some(name) = &args.sort_by {
        let by = name.parse::<Attribute>().map_err(|err| {
            CliError::new(
                err.to_string(),
                Some(format!(
                    "known attributes: {}",
                    Attribute::ALL.map(Attribute::name).join(", ")
                )),
            )
        })?;
        config.sort = SortOptions {
            by,
            ascending: config.sort.ascending,
        };
    }
    if args.desc {
        config.sort.ascending = false;
    }

    for raw in &args.filters {
        let (kind, expr) = parse_filter_arg(raw)?;
        config.filters.insert(kind, expr);
    }
    check_expressions(&config)?;
    Ok(config)
}

/// Compile every expression up front so a typo is reported before the
/// capture is read.
fn check_expressions(config: &StoreConfig) -> Result<(), CliError> {
    let opts = &config.match_opts;
    if let Some(expr) = opts.expression.as_deref().filter(|e| !e.is_empty()) {
        MatchExpression::new(expr, opts.ignore_case, opts.invert).map_err(|err| {
            CliError::new(
                format!("invalid match expression: {err}"),
                Some(format!("fix the regular expression in --match '{expr}'")),
            )
        })?;
    }
    for (kind, expr) in &config.filters {
        if expr.is_empty() {
            continue;
        }
        Matcher::compile(expr, true).map_err(|err| {
            CliError::new(
                format!("invalid {kind} filter: {err}"),
                Some(format!("fix the regular expression in --filter {kind}={expr}")),
            )
        })?;
    }
    Ok(())
}

fn parse_filter_arg(raw: &str) -> Result<(FilterKind, String), CliError> {
    let hint = || {
        Some(format!(
            "use KIND=EXPR with KIND one of: {}",
            FilterKind::ALL.map(FilterKind::name).join(", ")
        ))
    };
    let Some((kind, expr)) = raw.split_once('=') else {
        return Err(CliError::new(format!("invalid filter '{raw}'"), hint()));
    };
    let kind = kind
        .trim()
        .parse::<FilterKind>()
        .map_err(|err| CliError::new(err.to_string(), hint()))?;
    Ok((kind, expr.to_string()))
}

fn ensure_distinct_output(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let report_dir = report_path
        .parent()
        .map(|parent| {
            if parent.as_os_str().is_empty() {
                fs::canonicalize(".")
            } else {
                fs::canonicalize(parent)
            }
        })
        .transpose();
    // A missing output directory is created later; it cannot be the input.
    let Ok(Some(report_dir)) = report_dir else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path: {}", report_path.display()))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!(
                "report path must differ from input: {}",
                report_path.display()
            ),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn write_report(report: &Path, json: &str) -> Result<(), CliError> {
    if let Some(parent) = report.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(report, json)
        .with_context(|| format!("Failed to write report: {}", report.display()))?;
    Ok(())
}

fn serialize_report(rep: &CallReport, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    let json = if pretty {
        serde_json::to_string_pretty(rep)
    } else {
        serde_json::to_string(rep)
    };
    json.context("JSON serialization failed").map_err(Into::into)
}

fn print_calls(rep: &CallReport) {
    eprintln!(
        "Calls: {} shown of {} ({} active)",
        rep.calls.len(),
        rep.stats.total,
        rep.stats.active
    );
    for call in &rep.calls {
        eprintln!(
            "  {:>4} {:<12} {:<24} {:<24} {:>4} {}",
            call.index,
            call.method,
            call.from.as_deref().unwrap_or("-"),
            call.to.as_deref().unwrap_or("-"),
            call.message_count,
            call.state.as_deref().unwrap_or("")
        );
    }
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if count > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({count} matches); matches: {listed}"),
                Some("pass a single capture file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
