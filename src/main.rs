use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skip_review::config::{Config, Credentials, FileConfig, OracleKind};
use skip_review::context::PrRef;
use skip_review::diff::parse_unified_diff;
use skip_review::error::{Result, SkipReviewError};
use skip_review::github::GhHost;
use skip_review::oracle;
use skip_review::output::{build_error_summary, build_summary, write_ci_outputs, write_json_stdout};
use skip_review::run::{analyze_pr, evaluate, RunOutcome};

mod init;

#[derive(Parser, Debug)]
#[command(name = "skip-review")]
#[command(about = "Label pull requests that are safe to merge without review")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Repository name (e.g., "owner/repo")
    #[arg(short, long, env = "GITHUB_REPOSITORY")]
    repo: Option<String>,

    /// Pull request number (defaults to the one in the CI event payload)
    #[arg(short, long)]
    pr: Option<u64>,

    /// Model used by the LLM oracle
    #[arg(long, env = "SKIP_REVIEW_MODEL")]
    model: Option<String>,

    /// Minimum confidence (0-100) required to apply the label
    #[arg(long, env = "SKIP_REVIEW_CONFIDENCE_THRESHOLD")]
    confidence_threshold: Option<u8>,

    /// Label added to eligible pull requests
    #[arg(long, env = "SKIP_REVIEW_LABEL")]
    label: Option<String>,

    /// Rendered diff size limit in characters
    #[arg(long, env = "SKIP_REVIEW_MAX_DIFF_SIZE")]
    max_diff_size: Option<usize>,

    /// Post an explanatory comment after labeling (true/false)
    #[arg(long, env = "SKIP_REVIEW_ADD_COMMENT", action = ArgAction::Set)]
    comment: Option<bool>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "SKIP_REVIEW_API_BASE")]
    api_base: Option<String>,

    /// Which oracle judges the diff
    #[arg(long, value_enum)]
    oracle: Option<OracleKind>,

    /// Compute the verdict but do not label or comment
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Classify a local unified diff (`git diff` output) instead of a pull request
    #[arg(long)]
    diff_file: Option<PathBuf>,

    /// Config file used instead of the project-local .skip-review.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging (SKIP_REVIEW_LOG takes precedence)
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config and the rubric prompt for customization
    Init {
        /// Write into the current project instead of ~/.config/skip-review
        #[arg(long, default_value = "false")]
        local: bool,

        /// Overwrite existing files
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

impl Args {
    /// Flags and their environment fallbacks form the highest config layer.
    fn overrides(&self) -> FileConfig {
        FileConfig {
            model: self.model.clone(),
            confidence_threshold: self.confidence_threshold,
            label: self.label.clone(),
            max_diff_size: self.max_diff_size,
            add_comment: self.comment,
            api_base: self.api_base.clone(),
            oracle: self.oracle,
            ..Default::default()
        }
    }
}

fn credentials_from_env() -> Credentials {
    let var = |name: &str| std::env::var(name).ok();
    Credentials {
        oracle_api_key: var("OPENAI_API_KEY"),
        hosting_token: var("GITHUB_TOKEN").or_else(|| var("GH_TOKEN")),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("SKIP_REVIEW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(Command::Init { local, force }) = args.command {
        return match init::run_init(force, local) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:?}", e);
                ExitCode::from(1)
            }
        };
    }

    match run(&args).await {
        Ok((outcome, pr)) => {
            write_json_stdout(&build_summary(&outcome, pr.as_ref(), Utc::now()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), "{e}");
            eprintln!("Error: {:?}", e);
            write_json_stdout(&build_error_summary(&e, Utc::now()));
            ExitCode::from(1)
        }
    }
}

async fn run(args: &Args) -> Result<(RunOutcome, Option<PrRef>)> {
    let config = Config::load(
        args.config.as_deref(),
        args.overrides(),
        credentials_from_env(),
    )?;
    config.require_credentials(args.diff_file.is_none())?;
    let oracle = oracle::from_config(&config)?;

    if let Some(path) = &args.diff_file {
        let files = parse_unified_diff(&read_diff_file(path)?);
        info!(path = %path.display(), files = files.len(), "Classifying local diff");
        let outcome = evaluate(oracle.as_ref(), &config, &files).await?;
        write_ci_outputs(&outcome.verdict)?;
        return Ok((outcome, None));
    }

    let pr = PrRef::resolve(args.repo.as_deref(), args.pr)?;
    let host = GhHost::new(config.hosting_token()?);
    let outcome = analyze_pr(&host, oracle.as_ref(), &config, &pr, args.dry_run).await?;
    Ok((outcome, Some(pr)))
}

fn read_diff_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        SkipReviewError::Configuration(format!(
            "failed to read diff file {}: {e}",
            path.display()
        ))
    })
}
