use anyhow::{Context, Result};
use serde_json::Value;
use std::process::Command;

/// Execute gh CLI command and return stdout
/// Uses spawn_blocking to avoid blocking the tokio runtime
pub async fn gh_command(token: &str, args: &[&str]) -> Result<String> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let output = Command::new("gh")
            .args(&args)
            .env("GH_TOKEN", &token)
            .env("GH_PROMPT_DISABLED", "1")
            .output()
            .context("Failed to execute gh CLI - is it installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("gh command failed: {}", stderr.trim());
        }

        String::from_utf8(output.stdout).context("gh output contains invalid UTF-8")
    })
    .await
    .context("spawn_blocking task panicked")?
}

/// `gh api --paginate` for list endpoints, flattened into one list.
pub async fn gh_api_paginate(token: &str, endpoint: &str) -> Result<Vec<Value>> {
    let output = gh_command(token, &["api", "--paginate", endpoint]).await?;
    concat_pages(&output)
}

/// `--paginate` prints one JSON array per page back to back (`[...][...]`).
fn concat_pages(output: &str) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    for page in serde_json::Deserializer::from_str(output).into_iter::<Value>() {
        match page.context("Failed to parse gh api response as JSON")? {
            Value::Array(values) => items.extend(values),
            other => anyhow::bail!("expected a JSON array page, got: {}", other),
        }
    }
    Ok(items)
}

/// `gh api --method POST` with string fields (`-f key=value`)
pub async fn gh_api_post(token: &str, endpoint: &str, fields: &[(&str, &str)]) -> Result<Value> {
    let mut args = vec![
        "api".to_string(),
        "--method".to_string(),
        "POST".to_string(),
        endpoint.to_string(),
    ];
    for (key, value) in fields {
        args.push("-f".to_string());
        args.push(format!("{}={}", key, value));
    }
    let args_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = gh_command(token, &args_refs).await?;
    serde_json::from_str(&output).context("Failed to parse gh api response as JSON")
}
