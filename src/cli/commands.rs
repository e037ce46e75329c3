use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cost-bounded triage and multi-stage LLM analysis of candidate work items
#[derive(Parser, Debug)]
#[command(
    name = "triagebox",
    about = "Cost-bounded triage and multi-stage LLM analysis of candidate work items",
    version,
    author,
    long_about = "triagebox ranks a batch of candidates, collapses near-duplicates, and runs \
                  the top fraction through concurrent specialist reviews followed by a \
                  synthesis pass. Parsed results are cached by content fingerprint so repeat \
                  runs cost nothing."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Triage candidates and analyse the selected ones",
        long_about = "Reads a JSON array of candidate records, selects the top fraction of \
                      unique candidates and prints one analysis record per selection.\n\n\
                      Examples:\n  \
                      triagebox analyze --candidates batch.json\n  \
                      triagebox analyze --candidates batch.json --config triagebox.yaml\n  \
                      triagebox analyze --candidates - --triage-only --format human"
    )]
    Analyze(AnalyzeArgs),

    #[command(about = "Inspect or clear the result cache")]
    Cache(CacheArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        help = "JSON file with an array of candidate records ('-' for stdin)"
    )]
    pub candidates: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, value_name = "FRACTION", help = "Override top_fraction from the config")]
    pub top_fraction: Option<f64>,

    #[arg(long, help = "Print the admission outcome without calling any model")]
    pub triage_only: bool,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    #[command(about = "Show entry counts and hit statistics")]
    Stats(CommonArgs),

    #[command(about = "Delete cached results")]
    Clear(ClearArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClearArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, help = "Only delete entries past their TTL")]
    pub expired_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, value_name = "FILE", help = "YAML pipeline configuration")]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
