use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hypersight_config::{AssistantProviderKind, StoreBackendKind};
use hypersight_core::{DepartmentFilter, FilterSelection, SortDirection};
use hypersight_infer::AssistantMode;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid output format '{other}', expected one of: text, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Args)]
pub struct FilterArgs {
    #[arg(long, help = "Only tickets from this report period")]
    pub period: Option<String>,

    #[arg(long, help = "Only tickets in this category")]
    pub category: Option<String>,

    #[arg(long, help = "Only tickets with this theme (subcategory)")]
    pub theme: Option<String>,

    #[arg(
        long,
        help = "Only tickets owned by this department; \"All\" disables the filter and \"undefined\" selects tickets with no department"
    )]
    pub department: Option<String>,

    #[arg(long, help = "Sort groups and themes by ticket volume, smallest first")]
    pub ascending: bool,
}

impl FilterArgs {
    pub fn selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::default();
        if let Some(period) = &self.period {
            selection = selection.with_period(period.as_str());
        }
        if let Some(category) = &self.category {
            selection = selection.with_category(category.as_str());
        }
        if let Some(theme) = &self.theme {
            selection = selection.with_subcategory(theme.as_str());
        }
        if let Some(department) = &self.department {
            selection = selection.with_department(DepartmentFilter::from_label(department));
        }
        selection
    }

    pub fn sort(&self) -> SortDirection {
        SortDirection::from_ascending(self.ascending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct TableArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(
        long,
        value_name = "ISSUE",
        help = "Toggle expansion of a common-issue group; repeat a key to collapse it again"
    )]
    pub expand: Vec<String>,

    #[arg(long, help = "Expand every group")]
    pub expand_all: bool,

    #[arg(
        long,
        default_value = "text",
        value_parser = parse_output_format,
        help = "Output format: text or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct OptionsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(
        long,
        default_value = "text",
        value_parser = parse_output_format,
        help = "Output format: text or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct CategoriesArgs {
    #[arg(long, help = "Number of categories to show (defaults to dashboard.top_categories_limit)")]
    pub limit: Option<usize>,

    #[arg(
        long,
        value_name = "CATEGORY",
        help = "Focus this category, re-reading its issues from the store"
    )]
    pub select: Option<String>,

    #[arg(
        long,
        default_value = "text",
        value_parser = parse_output_format,
        help = "Output format: text or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct DistributionArgs {
    #[arg(
        long,
        default_value = "text",
        value_parser = parse_output_format,
        help = "Output format: text or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AskArgs {
    #[arg(help = "Question about the ticket data")]
    pub question: String,

    #[arg(
        long,
        default_value = "insights",
        value_parser = parse_assistant_mode,
        help = "Assistant mode: insights or charts"
    )]
    pub mode: AssistantMode,

    #[arg(long, help = "Do not send ticket rows as context")]
    pub no_context: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ChatArgs {
    #[arg(
        long,
        default_value = "charts",
        value_parser = parse_assistant_mode,
        help = "Assistant mode: insights or charts"
    )]
    pub mode: AssistantMode,

    #[arg(long, help = "Do not send ticket rows as context")]
    pub no_context: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = DEFAULT_BIND_ADDR, help = "Address to listen on")]
    pub bind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Show tickets grouped by common issue
    Table(TableArgs),
    /// List the values each filter can take
    Options(OptionsArgs),
    /// Show the largest categories and focus one of them
    Categories(CategoriesArgs),
    /// Show every category's share of the tickets
    Distribution(DistributionArgs),
    /// Ask the assistant one question
    Ask(AskArgs),
    /// Chat with the assistant over stdin
    Chat(ChatArgs),
    /// Serve the analyze-tickets HTTP endpoint
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "HyperSight ticket analysis dashboard")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .hypersight/config.toml"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[arg(
        long,
        global = true,
        value_parser = parse_store_backend,
        help = "Override store.backend: postgrest, sqlite, or json"
    )]
    pub store_backend: Option<StoreBackendKind>,

    #[arg(
        long,
        global = true,
        value_parser = parse_assistant_provider,
        help = "Override assistant.provider: auto, mock, or openai"
    )]
    pub assistant_provider: Option<AssistantProviderKind>,

    #[arg(long, global = true, help = "Override assistant.model")]
    pub assistant_model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_assistant_mode(value: &str) -> Result<AssistantMode, String> {
    value.parse()
}

fn parse_store_backend(value: &str) -> Result<StoreBackendKind, String> {
    value.parse()
}

fn parse_assistant_provider(value: &str) -> Result<AssistantProviderKind, String> {
    value.parse()
}
