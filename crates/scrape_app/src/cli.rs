use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use scrape_engine::ExportFormat;

#[derive(Debug, Parser)]
#[command(
    name = "scrape",
    version,
    about = "Preview, approve and collect scrape runs from the terminal"
)]
pub struct Cli {
    /// Origin the client pretends to be served from; loopback hosts use mock data.
    #[arg(
        long,
        env = "SCRAPE_ORIGIN",
        value_name = "URL",
        default_value = "http://localhost:3000",
        global = true
    )]
    pub origin: String,

    #[arg(long, env = "SCRAPE_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// `local` selects the local backend regardless of origin. `SCRAPE_MODE` is honoured too.
    #[arg(long, value_name = "MODE", global = true)]
    pub mode: Option<String>,

    /// Directory holding `.scrape_settings.ron`.
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    pub settings_dir: PathBuf,

    /// Also write logs to this file.
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Preview a page, confirm, then stream the extracted records.
    Run(RunArgs),
    /// Queue a background job through the REST endpoint.
    Submit(SubmitArgs),
    Status {
        #[arg(value_name = "JOB")]
        job_id: String,
    },
    Results {
        #[arg(value_name = "JOB")]
        job_id: String,
    },
    /// List previously scraped origins.
    Urls,
    /// Show or persist the local-backend flag.
    LocalMode {
        #[arg(value_enum, default_value_t = Toggle::Show)]
        action: Toggle,
    },
}

#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// What to extract, e.g. `prices` or `articles`.
    #[arg(long, value_name = "TARGET")]
    pub target: String,

    #[arg(long, value_name = "TYPE")]
    pub parse_type: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Approve the preview without asking.
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,

    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Export format; guessed from the extension when omitted.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
}

#[derive(Debug, Clone, Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Poll until the job finishes and print its results.
    #[arg(long, default_value_t = false)]
    pub wait: bool,

    #[arg(long, value_name = "MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,

    #[arg(long, value_name = "SECS", default_value_t = 600)]
    pub wait_ceiling_secs: u64,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
    Show,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

impl TargetArgs {
    pub fn to_request(&self) -> scrape_core::ScrapeRequest {
        let request = scrape_core::ScrapeRequest::new(self.url.trim(), self.target.trim());
        match self.parse_type.as_deref().map(str::trim) {
            Some(parse_type) if !parse_type.is_empty() => request.with_parse_type(parse_type),
            _ => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_target_and_export_flags() {
        let cli = Cli::try_parse_from([
            "scrape",
            "run",
            "--url",
            " https://example.com ",
            "--target",
            "prices",
            "--parse-type",
            "rss",
            "--yes",
            "--export",
            "out.csv",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.yes);
        assert_eq!(args.export, Some(PathBuf::from("out.csv")));
        let request = args.target.to_request();
        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.parse_type.as_deref(), Some("rss"));
    }

    #[test]
    fn blank_parse_type_is_dropped() {
        let args = TargetArgs {
            url: "https://example.com".into(),
            target: "prices".into(),
            parse_type: Some("  ".into()),
        };
        assert_eq!(args.to_request().parse_type, None);
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::try_parse_from(["scrape", "urls", "--mode", "local", "-vv"]).unwrap();
        assert_eq!(cli.mode.as_deref(), Some("local"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn local_mode_defaults_to_show() {
        let cli = Cli::try_parse_from(["scrape", "local-mode"]).unwrap();
        assert!(matches!(cli.command, Command::LocalMode { action: Toggle::Show }));
    }
}
