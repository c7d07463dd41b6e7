//! Selection engine.
//!
//! Decides, per command-tree node, whether the node becomes a tool and which
//! of its inherited flags survive.
//!
//! Evaluation order (declaration order of the rule list):
//!   1. Any matching deny rule excludes the node, wherever it sits in the list.
//!   2. Otherwise the first matching allow rule includes the node and its
//!      inherited-flag policy is the one applied.
//!   3. Grouping nodes (no action) are never included.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::tree::CommandNode;

/// How a rule matches a command path (`"app get pods"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPredicate {
    /// Whole path equals the string.
    Exact(String),
    /// Path equals the prefix or continues it with further segments
    /// (`"app get"` matches `"app get pods"`, not `"app getter"`).
    Prefix(String),
    /// Shell-style pattern over the whole path (`"app * pods"`).
    Glob(String),
    /// Path equals any listed entry.
    List(Vec<String>),
}

/// Which ancestor flags a selected node keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritedFlagRule {
    #[default]
    All,
    None,
    /// Only these names; names no ancestor defines are ignored.
    Allow(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Exact(String),
    Prefix(String),
    Glob(glob::Pattern),
    List(Vec<String>),
}

impl Matcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Exact(p) => p == path,
            Matcher::Prefix(p) => {
                path == p
                    || path
                        .strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.starts_with(' '))
            }
            Matcher::Glob(pattern) => pattern.matches(path),
            Matcher::List(entries) => entries.iter().any(|e| e == path),
        }
    }
}

/// One compiled selection rule.
#[derive(Debug, Clone)]
pub struct SelectionRule {
    predicate: PathPredicate,
    matcher: Matcher,
    polarity: Polarity,
    inherited_flags: InheritedFlagRule,
}

impl SelectionRule {
    /// Compile a rule. Empty paths and malformed globs are rejected.
    pub fn new(
        predicate: PathPredicate,
        polarity: Polarity,
        inherited_flags: InheritedFlagRule,
    ) -> Result<Self, BridgeError> {
        let matcher = match &predicate {
            PathPredicate::Exact(p) => Matcher::Exact(non_empty(p)?),
            PathPredicate::Prefix(p) => Matcher::Prefix(non_empty(p)?),
            PathPredicate::Glob(p) => {
                let p = non_empty(p)?;
                Matcher::Glob(
                    glob::Pattern::new(&p)
                        .map_err(|e| BridgeError::InvalidRule(format!("glob '{p}': {e}")))?,
                )
            }
            PathPredicate::List(entries) => {
                if entries.is_empty() {
                    return Err(BridgeError::InvalidRule("empty path list".into()));
                }
                Matcher::List(entries.iter().map(|e| non_empty(e)).collect::<Result<_, _>>()?)
            }
        };
        Ok(SelectionRule {
            predicate,
            matcher,
            polarity,
            inherited_flags,
        })
    }

    pub fn allow(predicate: PathPredicate) -> Result<Self, BridgeError> {
        Self::new(predicate, Polarity::Allow, InheritedFlagRule::All)
    }

    pub fn deny(predicate: PathPredicate) -> Result<Self, BridgeError> {
        Self::new(predicate, Polarity::Deny, InheritedFlagRule::All)
    }

    /// Every runnable node, all inherited flags. Used when no rules are given.
    pub fn allow_all() -> Self {
        SelectionRule {
            predicate: PathPredicate::Glob("*".into()),
            matcher: Matcher::Any,
            polarity: Polarity::Allow,
            inherited_flags: InheritedFlagRule::All,
        }
    }

    /// Replace the inherited-flag policy (meaningless on deny rules).
    pub fn with_inherited_flags(mut self, rule: InheritedFlagRule) -> Self {
        self.inherited_flags = rule;
        self
    }

    pub fn predicate(&self) -> &PathPredicate {
        &self.predicate
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn inherited_flags(&self) -> &InheritedFlagRule {
        &self.inherited_flags
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }
}

fn non_empty(p: &str) -> Result<String, BridgeError> {
    let normalized = crate::tree::normalize_path(p);
    if normalized.is_empty() {
        return Err(BridgeError::InvalidRule("empty command path".into()));
    }
    Ok(normalized)
}

/// Outcome of evaluating the rules against one node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub included: bool,
    /// Names of inherited flags to keep. Empty when not included.
    pub inherited_flags: BTreeSet<String>,
}

impl Selection {
    fn excluded() -> Self {
        Selection::default()
    }
}

/// Evaluate `rules` against `node`.
pub fn select(node: &dyn CommandNode, rules: &[SelectionRule]) -> Selection {
    let path = node.path();

    if rules
        .iter()
        .any(|r| r.polarity == Polarity::Deny && r.matches(path))
    {
        tracing::debug!(path, "denied by rule");
        return Selection::excluded();
    }

    let Some(rule) = rules
        .iter()
        .find(|r| r.polarity == Polarity::Allow && r.matches(path))
    else {
        return Selection::excluded();
    };

    if !node.is_runnable() {
        tracing::debug!(path, "matched but has no action; skipped");
        return Selection::excluded();
    }

    let upstream = node.inherited_flags().iter().map(|f| f.name.clone());
    let inherited_flags = match &rule.inherited_flags {
        InheritedFlagRule::All => upstream.collect(),
        InheritedFlagRule::None => BTreeSet::new(),
        InheritedFlagRule::Allow(names) => upstream.filter(|n| names.contains(n)).collect(),
    };

    Selection {
        included: true,
        inherited_flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{FlagKind, FlagSpec, PositionalSpec};

    struct FakeNode {
        path: String,
        runnable: bool,
        inherited: Vec<FlagSpec>,
    }

    fn flag(name: &str) -> FlagSpec {
        FlagSpec {
            id: name.into(),
            name: name.into(),
            long: Some(name.into()),
            short: None,
            help: None,
            kind: FlagKind::String,
            required: false,
            global: true,
            defaults: Vec::new(),
            possible_values: Vec::new(),
            allow_hyphen_values: false,
        }
    }

    impl CommandNode for FakeNode {
        fn name(&self) -> &str {
            self.path.rsplit(' ').next().unwrap_or_default()
        }
        fn path(&self) -> &str {
            &self.path
        }
        fn short_help(&self) -> Option<String> {
            None
        }
        fn long_help(&self) -> Option<String> {
            None
        }
        fn local_flags(&self) -> &[FlagSpec] {
            &[]
        }
        fn inherited_flags(&self) -> &[FlagSpec] {
            &self.inherited
        }
        fn positionals(&self) -> Option<&PositionalSpec> {
            None
        }
        fn is_runnable(&self) -> bool {
            self.runnable
        }
        fn children(&self) -> Vec<Box<dyn CommandNode + '_>> {
            Vec::new()
        }
    }

    fn node(path: &str) -> FakeNode {
        FakeNode {
            path: path.into(),
            runnable: true,
            inherited: vec![flag("namespace"), flag("context")],
        }
    }

    fn names(sel: &Selection) -> Vec<&str> {
        sel.inherited_flags.iter().map(String::as_str).collect()
    }

    #[test]
    fn exact_and_prefix_matching() {
        let exact = SelectionRule::allow(PathPredicate::Exact("app get".into())).unwrap();
        assert!(exact.matches("app get"));
        assert!(!exact.matches("app get pods"));

        let prefix = SelectionRule::allow(PathPredicate::Prefix("app get".into())).unwrap();
        assert!(prefix.matches("app get"));
        assert!(prefix.matches("app get pods"));
        assert!(!prefix.matches("app getter"));
    }

    #[test]
    fn glob_and_list_matching() {
        let glob = SelectionRule::allow(PathPredicate::Glob("app * pods".into())).unwrap();
        assert!(glob.matches("app get pods"));
        assert!(!glob.matches("app get services"));

        let list = SelectionRule::allow(PathPredicate::List(vec![
            "app a".into(),
            "app b".into(),
        ]))
        .unwrap();
        assert!(list.matches("app b"));
        assert!(!list.matches("app c"));
    }

    #[test]
    fn allow_all_matches_everything() {
        let rule = SelectionRule::allow_all();
        assert!(rule.matches("app"));
        assert!(rule.matches("app get pods"));
        assert_eq!(rule.polarity(), Polarity::Allow);
    }

    #[test]
    fn malformed_rules_rejected() {
        assert!(SelectionRule::allow(PathPredicate::Glob("app [".into())).is_err());
        assert!(SelectionRule::allow(PathPredicate::Exact("   ".into())).is_err());
        assert!(SelectionRule::allow(PathPredicate::List(vec![])).is_err());
    }

    #[test]
    fn unmatched_node_excluded() {
        let rules = vec![SelectionRule::allow(PathPredicate::Exact("app a".into())).unwrap()];
        assert!(!select(&node("app b"), &rules).included);
    }

    #[test]
    fn deny_wins_regardless_of_order() {
        let allow = SelectionRule::allow(PathPredicate::Prefix("app".into())).unwrap();
        let deny = SelectionRule::deny(PathPredicate::Exact("app secret".into())).unwrap();

        let before = vec![deny.clone(), allow.clone()];
        let after = vec![allow, deny];
        assert!(!select(&node("app secret"), &before).included);
        assert!(!select(&node("app secret"), &after).included);
        assert!(select(&node("app public"), &after).included);
    }

    #[test]
    fn grouping_node_never_included() {
        let rules = vec![SelectionRule::allow(PathPredicate::Prefix("app".into())).unwrap()];
        let mut group = node("app get");
        group.runnable = false;
        assert!(!select(&group, &rules).included);
    }

    #[test]
    fn flag_policies() {
        let all = SelectionRule::allow(PathPredicate::Exact("app x".into())).unwrap();
        assert_eq!(names(&select(&node("app x"), &[all])), vec!["context", "namespace"]);

        let none = SelectionRule::allow(PathPredicate::Exact("app x".into()))
            .unwrap()
            .with_inherited_flags(InheritedFlagRule::None);
        let sel = select(&node("app x"), &[none]);
        assert!(sel.included);
        assert!(sel.inherited_flags.is_empty());

        let named = SelectionRule::allow(PathPredicate::Exact("app x".into()))
            .unwrap()
            .with_inherited_flags(InheritedFlagRule::Allow(vec![
                "namespace".into(),
                "not-upstream".into(),
            ]));
        assert_eq!(names(&select(&node("app x"), &[named])), vec!["namespace"]);
    }

    #[test]
    fn first_matching_allow_sets_flag_policy() {
        let first = SelectionRule::allow(PathPredicate::Prefix("app".into()))
            .unwrap()
            .with_inherited_flags(InheritedFlagRule::None);
        let second = SelectionRule::allow(PathPredicate::Exact("app x".into())).unwrap();
        let sel = select(&node("app x"), &[first, second]);
        assert!(sel.included);
        assert!(sel.inherited_flags.is_empty());
    }

    fn from_yaml<T: serde::de::DeserializeOwned>(raw: &str) -> T {
        serde_yaml::with::singleton_map::deserialize(serde_yaml::Deserializer::from_str(raw)).unwrap()
    }

    #[test]
    fn policies_deserialize_from_yaml() {
        let rule: InheritedFlagRule = from_yaml("none");
        assert_eq!(rule, InheritedFlagRule::None);
        let rule: InheritedFlagRule = from_yaml("allow: [namespace]");
        assert_eq!(rule, InheritedFlagRule::Allow(vec!["namespace".into()]));
        let pred: PathPredicate = from_yaml("glob: 'app *'");
        assert_eq!(pred, PathPredicate::Glob("app *".into()));
        let pred: PathPredicate = from_yaml("list: [app a, app b]");
        assert_eq!(pred, PathPredicate::List(vec!["app a".into(), "app b".into()]));
    }
}
