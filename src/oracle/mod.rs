//! Oracle implementations.

pub mod llm;
pub mod rules;

pub use llm::LlmOracle;
pub use rules::RuleOracle;

use tracing::info;

use crate::config::{Config, OracleKind};
use crate::error::Result;
use crate::policy::Oracle;
use crate::prompt_loader::{PromptLoader, CLASSIFIER_PROMPT_FILE};

/// Build the oracle the configuration selects.
pub fn from_config(config: &Config) -> Result<Box<dyn Oracle>> {
    match config.oracle {
        OracleKind::Llm => {
            let loader = PromptLoader::new(config);
            info!(
                model = %config.model,
                prompt = ?loader.resolve_source(CLASSIFIER_PROMPT_FILE),
                "Using LLM oracle"
            );
            let oracle = LlmOracle::new(config, loader.load_classifier_prompt())?;
            Ok(Box::new(oracle))
        }
        OracleKind::Rules => {
            info!("Using rule oracle");
            Ok(Box::new(RuleOracle::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, FileConfig};
    use crate::error::SkipReviewError;
    use std::path::PathBuf;

    #[test]
    fn test_rules_need_no_credentials() {
        let layer = FileConfig {
            oracle: Some(OracleKind::Rules),
            ..Default::default()
        };
        let config =
            Config::from_layers(vec![layer], Credentials::default(), PathBuf::from(".")).unwrap();
        assert_eq!(from_config(&config).unwrap().name(), "rules");
    }

    #[test]
    fn test_llm_needs_key() {
        let config =
            Config::from_layers(vec![], Credentials::default(), PathBuf::from(".")).unwrap();
        assert!(matches!(
            from_config(&config),
            Err(SkipReviewError::Configuration(_))
        ));
    }
}
