use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use skip_review::config::{find_project_root, LOCAL_CONFIG_FILE};
use skip_review::policy::rubric::DEFAULT_RUBRIC;
use skip_review::prompt_loader::CLASSIFIER_PROMPT_FILE;

/// Default config.toml content
const DEFAULT_CONFIG: &str = r#"# skip-review configuration.
# Every key is optional. CLI flags and environment variables override these.

# Model used by the LLM oracle (chat-completions API)
# model = "gpt-4o-mini"

# OpenAI-compatible API base URL
# api_base = "https://api.openai.com/v1"

# Which oracle judges the diff: "llm" or "rules"
# oracle = "llm"

# Minimum confidence (0-100) required before the label is applied
# confidence_threshold = 80

# Label added to eligible pull requests
# label = "skip-review"

# Rendered diff size limit in characters
# max_diff_size = 50000

# Post an explanatory comment after labeling
# add_comment = true

# Request timeout for the LLM oracle
# timeout_secs = 120

# prompt_dir = "/custom/path/to/prompts"  # Optional: custom prompt directory
"#;

/// Default local config content
const DEFAULT_LOCAL_CONFIG: &str = r#"# Project-local skip-review configuration.
# Values here override the global config (~/.config/skip-review/config.toml).
# Only specify values you want to override.

# confidence_threshold = 90
# label = "skip-review"
# add_comment = true
"#;

/// Run the init command
pub fn run_init(force: bool, local: bool) -> Result<()> {
    if local {
        let project_root = find_project_root();
        return run_init_local(&project_root, force);
    }
    let base_dirs =
        BaseDirectories::with_prefix("skip-review").context("Failed to get config directory")?;
    let config_home = base_dirs.get_config_home();
    init_global(&config_home, force)?;

    println!();
    println!("Initialization complete!");
    println!();
    println!(
        "You can customize the classification rubric by editing {}",
        config_home.join("prompts").join(CLASSIFIER_PROMPT_FILE).display()
    );
    println!("Available template variables: {{{{max_categories}}}}");

    Ok(())
}

fn init_global(config_home: &Path, force: bool) -> Result<()> {
    // Create config directory if needed
    if !config_home.exists() {
        println!(
            "Creating configuration directory: {}",
            config_home.display()
        );
        fs::create_dir_all(config_home).context("Failed to create config directory")?;
    }

    let config_path = config_home.join("config.toml");
    write_file_if_needed(&config_path, DEFAULT_CONFIG, force, "config.toml")?;

    write_prompt(&config_home.join("prompts"), force)
}

fn write_prompt(prompts_dir: &Path, force: bool) -> Result<()> {
    if !prompts_dir.exists() {
        println!("Creating prompts directory: {}", prompts_dir.display());
        fs::create_dir_all(prompts_dir).context("Failed to create prompts directory")?;
    }
    write_file_if_needed(
        &prompts_dir.join(CLASSIFIER_PROMPT_FILE),
        DEFAULT_RUBRIC,
        force,
        CLASSIFIER_PROMPT_FILE,
    )
}

/// Write a file if it doesn't exist or force is true
fn write_file_if_needed(path: &PathBuf, content: &str, force: bool, name: &str) -> Result<()> {
    if path.exists() && !force {
        println!(
            "Skipping {} (already exists, use --force to overwrite)",
            name
        );
        return Ok(());
    }

    println!("Writing {}...", name);
    fs::write(path, content).with_context(|| format!("Failed to write {}", name))?;
    Ok(())
}

/// Run init for the project: `.skip-review.toml` plus `.skip-review/prompts/`
fn run_init_local(project_root: &Path, force: bool) -> Result<()> {
    let config_path = project_root.join(LOCAL_CONFIG_FILE);
    write_file_if_needed(&config_path, DEFAULT_LOCAL_CONFIG, force, LOCAL_CONFIG_FILE)?;

    let prompts_dir = project_root.join(".skip-review").join("prompts");
    write_prompt(&prompts_dir, force)?;

    println!();
    println!("Local initialization complete!");
    println!("Project-local config: {}", config_path.display());
    println!("Project-local prompts: {}", prompts_dir.display());
    println!();
    println!("Tip: Commit .skip-review.toml and .skip-review/ so CI uses the same rubric.");

    Ok(())
}
