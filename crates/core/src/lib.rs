pub mod batch;
pub mod domain;
pub mod engine;
pub mod explain;
pub mod report;

pub mod config {
    use crate::engine::{RecommendationEngine, RuleSet};
    use anyhow::Context;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub rules_path: Option<PathBuf>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                rules_path: std::env::var("CHURNWATCH_RULES_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
                sentry_dsn: std::env::var("SENTRY_DSN")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            })
        }

        /// Explicit path wins over `CHURNWATCH_RULES_PATH`; without either, the built-in table.
        pub fn load_rules(&self, override_path: Option<&Path>) -> anyhow::Result<RuleSet> {
            match override_path.or(self.rules_path.as_deref()) {
                Some(path) => {
                    let rules = RuleSet::from_json_file(path)?;
                    tracing::info!(
                        path = %path.display(),
                        triggers = rules.triggers.len(),
                        "loaded rule table"
                    );
                    Ok(rules)
                }
                None => {
                    tracing::info!("using built-in rule table");
                    Ok(RuleSet::default())
                }
            }
        }

        pub fn build_engine(&self, override_path: Option<&Path>) -> anyhow::Result<RecommendationEngine> {
            let rules = self.load_rules(override_path)?;
            RecommendationEngine::new(rules).context("rule table failed validation")
        }
    }

}
