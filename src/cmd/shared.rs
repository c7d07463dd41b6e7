/*!
shared.rs - helpers used by more than one `mcp` subcommand.

  - RulesArgs: `--rules FILE` with the MCP_BRIDGE_RULES env fallback
  - resolve_rules: file rules, else host defaults, else allow-all; the
    `<root> mcp` group is always denied
  - build_bridge: tree + resolved rules -> Bridge
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{RULES_ENV, SelectionConfig};
use crate::mcp::Bridge;
use crate::selection::{PathPredicate, SelectionRule};
use crate::tree::CommandTree;

use super::MCP_COMMAND;

#[derive(Args, Debug, Clone, Default)]
pub struct RulesArgs {
    /// Selection rules file (YAML or JSON); falls back to MCP_BRIDGE_RULES
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,
}

impl RulesArgs {
    /// `--rules`, else the environment fallback when set and non-empty.
    pub fn path(&self) -> Option<PathBuf> {
        self.rules.clone().or_else(|| {
            std::env::var(RULES_ENV)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        })
    }
}

/// Rules the bridge is built with.
pub fn resolve_rules(
    path: Option<&Path>,
    root: &str,
    defaults: &[SelectionRule],
) -> Result<Vec<SelectionRule>> {
    let mut rules = match path {
        Some(path) => SelectionConfig::load(path)?
            .into_rules()
            .with_context(|| format!("invalid rules in {}", path.display()))?,
        None => defaults.to_vec(),
    };
    if rules.is_empty() {
        rules.push(SelectionRule::allow_all());
    }
    rules.push(SelectionRule::deny(PathPredicate::Prefix(format!(
        "{root} {MCP_COMMAND}"
    )))?);
    Ok(rules)
}

pub fn build_bridge(tree: CommandTree, args: &RulesArgs, defaults: &[SelectionRule]) -> Result<Bridge> {
    let rules = resolve_rules(args.path().as_deref(), tree.root_name(), defaults)?;
    Bridge::new(tree, &rules).context("failed to build the tool set")
}
