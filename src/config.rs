//! Selection rules from a YAML or JSON file.
//!
//! ```yaml
//! selectors:
//!   - match: { prefix: "app get" }
//!     inherited_flags: { allow: [namespace] }
//!   - match: { exact: "app get secrets" }
//!     deny: true
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::selection::{InheritedFlagRule, PathPredicate, Polarity, SelectionRule};

/// Environment fallback for `--rules`.
pub const RULES_ENV: &str = "MCP_BRIDGE_RULES";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    #[serde(default)]
    pub selectors: Vec<SelectorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    // `{ prefix: "app get" }` rather than YAML's `!prefix app get`
    #[serde(rename = "match", with = "serde_yaml::with::singleton_map")]
    pub predicate: PathPredicate,
    #[serde(default)]
    pub deny: bool,
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub inherited_flags: InheritedFlagRule,
}

impl SelectionConfig {
    /// Read a rules file; `.yaml`/`.yml` is parsed as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file: {}", path.display()))?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let config = if is_yaml {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse YAML rules file: {}", path.display()))?
        } else {
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse JSON rules file: {}", path.display()))?
        };
        tracing::debug!(path = %path.display(), "loaded selection rules");
        Ok(config)
    }

    /// Compile the selectors in file order. Malformed entries are fatal.
    pub fn into_rules(self) -> Result<Vec<SelectionRule>, BridgeError> {
        self.selectors
            .into_iter()
            .map(|s| {
                let polarity = if s.deny { Polarity::Deny } else { Polarity::Allow };
                SelectionRule::new(s.predicate, polarity, s.inherited_flags)
            })
            .collect()
    }
}
