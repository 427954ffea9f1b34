use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::Config;
use crate::policy::rubric::DEFAULT_RUBRIC;
use crate::policy::verdict::MAX_CATEGORIES;

pub const CLASSIFIER_PROMPT_FILE: &str = "classifier.md";

/// Source of a resolved prompt template
#[derive(Debug, Clone, PartialEq)]
pub enum PromptSource {
    /// .skip-review/prompts/ (project-local)
    Local(PathBuf),
    /// config.prompt_dir (explicit path)
    PromptDir(PathBuf),
    /// ~/.config/skip-review/prompts/ (global)
    Global(PathBuf),
    /// Binary-embedded default
    Embedded,
}

/// Prompt loader that reads the rubric from files or uses the default.
///
/// Resolution order (highest priority first):
/// 1. `.skip-review/prompts/classifier.md`: project-local
/// 2. `config.prompt_dir`: explicit path from merged config
/// 3. `~/.config/skip-review/prompts/classifier.md`: global default
/// 4. Binary-embedded default: fallback
pub struct PromptLoader {
    prompt_dir: Option<PathBuf>,
    local_prompts_dir: Option<PathBuf>,
    global_prompts_dir: Option<PathBuf>,
}

impl PromptLoader {
    pub fn new(config: &Config) -> Self {
        let global_prompts_dir = xdg::BaseDirectories::with_prefix("skip-review")
            .ok()
            .map(|dirs| dirs.get_config_home().join("prompts"));
        Self::with_dirs(
            config.prompt_dir.clone(),
            &config.project_root,
            global_prompts_dir,
        )
    }

    fn with_dirs(
        prompt_dir: Option<PathBuf>,
        project_root: &Path,
        global_prompts_dir: Option<PathBuf>,
    ) -> Self {
        let local_prompts_dir = {
            let path = project_root.join(".skip-review/prompts");
            if path.is_dir() {
                Some(path)
            } else {
                None
            }
        };

        Self {
            prompt_dir,
            local_prompts_dir,
            global_prompts_dir,
        }
    }

    /// Resolve which source would be used for a given prompt filename.
    pub fn resolve_source(&self, filename: &str) -> PromptSource {
        if let Some(ref dir) = self.local_prompts_dir {
            let path = dir.join(filename);
            if path.exists() {
                return PromptSource::Local(path);
            }
        }
        if let Some(ref dir) = self.prompt_dir {
            let path = dir.join(filename);
            if path.exists() {
                return PromptSource::PromptDir(path);
            }
        }
        if let Some(ref dir) = self.global_prompts_dir {
            let path = dir.join(filename);
            if path.exists() {
                return PromptSource::Global(path);
            }
        }
        PromptSource::Embedded
    }

    /// The system instruction sent to the oracle.
    pub fn load_classifier_prompt(&self) -> String {
        let template = self.load_template(CLASSIFIER_PROMPT_FILE, DEFAULT_RUBRIC);

        let mut vars = HashMap::new();
        vars.insert("max_categories", MAX_CATEGORIES.to_string());

        render_template(&template, &vars)
    }

    fn load_template(&self, filename: &str, default: &str) -> String {
        [
            &self.local_prompts_dir,
            &self.prompt_dir,
            &self.global_prompts_dir,
        ]
        .into_iter()
        .find_map(|dir| Self::try_load_from(dir, filename))
        .unwrap_or_else(|| default.to_string())
    }

    /// Returns None for NotFound; logs a warning and returns None for other errors.
    fn try_load_from(dir: &Option<PathBuf>, filename: &str) -> Option<String> {
        let path = dir.as_ref()?.join(filename);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read prompt override");
                None
            }
        }
    }
}

pub(crate) fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
