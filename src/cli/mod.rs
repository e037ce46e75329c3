//! Command-line interface: argument definitions, handlers and output rendering

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{
    AnalyzeArgs, CacheAction, CacheArgs, CliArgs, ClearArgs, Commands, CommonArgs, OutputFormatArg,
};
pub use handlers::{handle_analyze, handle_cache};
pub use output::{OutputFormat, OutputFormatter};
