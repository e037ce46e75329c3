//! Structured logging setup for triagebox
//!
//! Installs one `tracing` subscriber per process. Everything is written to
//! stderr: `triagebox analyze` prints its records on stdout and must stay
//! pipeable into `jq` or another tool.
//!
//! Level resolution, highest first:
//!
//! - `RUST_LOG`, which replaces the whole filter
//! - `--log-level`, `--verbose` or `--quiet` on the command line
//! - `TRIAGEBOX_LOG_LEVEL`
//! - INFO
//!
//! # Example
//!
//! ```no_run
//! use triagebox::util::logging;
//!
//! // With environment: TRIAGEBOX_LOG_LEVEL=debug TRIAGEBOX_LOG_JSON=true
//! logging::init_from_env();
//!
//! tracing::info!(candidates = 10, top_fraction = 0.4, "Starting triage");
//! tracing::debug!(candidate = "c3", role = "security", "Cache miss");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Provider SDK crates that are chatty at our debug level
const QUIET_DEPENDENCIES: [&str; 3] = ["hyper", "reqwest", "genai"];

/// Configuration for logging initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level for triagebox's own targets
    pub level: Level,

    /// One JSON object per line instead of the human format
    pub use_json: bool,

    /// Include the module target (e.g. `triagebox::pipeline::orchestrator`)
    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,

    /// Include thread id and name; useful when specialists interleave
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    /// INFO, human-readable, with targets and nothing else
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// Creates a default configuration at the given level
    ///
    /// # Arguments
    ///
    /// * `level` - Minimum level for triagebox targets
    ///
    /// # Example
    ///
    /// ```
    /// use triagebox::util::LoggingConfig;
    /// use tracing::Level;
    ///
    /// let config = LoggingConfig::with_level(Level::DEBUG);
    /// assert!(!config.use_json);
    /// ```
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON with location and thread metadata, for batch runs whose logs are
    /// collected by a log shipper
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            ..Default::default()
        }
    }

    pub fn json(mut self, use_json: bool) -> Self {
        self.use_json = use_json;
        self
    }

    /// Applies the global command-line logging flags on top of this config
    ///
    /// # Arguments
    ///
    /// * `level` - Value of `--log-level`; wins over the other two switches
    /// * `verbose` - `--verbose`, raises the level to DEBUG
    /// * `quiet` - `--quiet`, lowers the level to ERROR
    /// * `json` - `--log-json`; only ever turns JSON on
    ///
    /// # Example
    ///
    /// ```
    /// use triagebox::util::LoggingConfig;
    /// use tracing::Level;
    ///
    /// let config = LoggingConfig::default().with_cli_flags(None, false, true, false);
    /// assert_eq!(config.level, Level::ERROR);
    ///
    /// let config = LoggingConfig::default().with_cli_flags(Some("trace"), false, true, true);
    /// assert_eq!(config.level, Level::TRACE);
    /// assert!(config.use_json);
    /// ```
    pub fn with_cli_flags(mut self, level: Option<&str>, verbose: bool, quiet: bool, json: bool) -> Self {
        if let Some(level) = level {
            self.level = parse_level(level);
        } else if verbose {
            self.level = Level::DEBUG;
        } else if quiet {
            self.level = Level::ERROR;
        }
        self.use_json |= json;
        self
    }
}

/// Parses a log level from a string
///
/// # Arguments
///
/// * `level_str` - Level name, case-insensitive
///
/// # Returns
///
/// The matching `Level`, or `Level::INFO` with a note on stderr when the name
/// is unknown. The subscriber is not installed yet at this point, so the note
/// cannot go through `tracing`.
///
/// # Example
///
/// ```
/// use triagebox::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Warn"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Filter directives used when `RUST_LOG` is unset
fn default_directives(level: Level) -> Vec<String> {
    let mut directives = vec![format!("triagebox={}", level)];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|krate| format!("{}=warn", krate)));
    directives
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var_os("RUST_LOG").is_some() {
        return EnvFilter::from_default_env();
    }
    default_directives(level)
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), |filter, directive| filter.add_directive(directive))
}

/// Installs the global subscriber
///
/// Only the first call in a process has an effect; later calls return
/// without touching the installed subscriber, so tests and the binary can
/// both call it freely.
///
/// # Arguments
///
/// * `config` - Level, format and metadata switches
///
/// # Example
///
/// ```no_run
/// use triagebox::util::{init_logging, LoggingConfig};
/// use tracing::Level;
///
/// init_logging(LoggingConfig::with_level(Level::DEBUG).json(true));
/// ```
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let (json_layer, text_layer) = if config.use_json {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(config.include_target)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_ids)
                .with_thread_names(config.include_thread_ids);
            (Some(layer), None)
        } else {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.include_target)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_ids)
                .with_thread_names(config.include_thread_ids);
            (None, Some(layer))
        };

        // A subscriber installed by an embedding application takes precedence
        let _ = tracing_subscriber::registry()
            .with(build_filter(config.level))
            .with(json_layer)
            .with(text_layer)
            .try_init();
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes logging from `TRIAGEBOX_LOG_LEVEL` and `TRIAGEBOX_LOG_JSON`
pub fn init_from_env() {
    init_logging(config_from_env());
}

/// Reads `TRIAGEBOX_LOG_LEVEL` (default `info`) and `TRIAGEBOX_LOG_JSON`
/// (`true`/`false`, anything else counts as unset)
pub fn config_from_env() -> LoggingConfig {
    let level_str = env::var("TRIAGEBOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let use_json = env::var("TRIAGEBOX_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    LoggingConfig {
        level: parse_level(&level_str),
        use_json,
        ..Default::default()
    }
}
