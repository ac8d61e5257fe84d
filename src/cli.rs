use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Also write a detailed (debug level) log to this file.
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Split(SplitArgs),
    Detect(DetectArgs),
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Novel text file, or a directory searched recursively for novels.
    pub path: String,

    /// Output root (`splitdata/` and `metadata/` are created below it).
    #[arg(long, default_value = "results")]
    pub out: String,

    /// Skip the interactive review and split immediately.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// File extension picked up when PATH is a directory.
    #[arg(long, default_value = "txt")]
    pub extension: String,

    /// Extra structural keyword treated as a chapter marker (repeatable).
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// OpenAI-compatible API base URL (overrides NOVEL_SPLITTER_LLM_BASE_URL).
    #[arg(long)]
    pub llm_base_url: Option<String>,

    /// Model name (overrides NOVEL_SPLITTER_LLM_MODEL).
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Retries per classification request (overrides NOVEL_SPLITTER_LLM_RETRIES).
    #[arg(long)]
    pub llm_retries: Option<usize>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Novel text file.
    pub file: String,

    /// Extra structural keyword treated as a chapter marker (repeatable).
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,
}
