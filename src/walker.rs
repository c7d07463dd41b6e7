//! Tree walker: depth-first, pre-order traversal applying the selection
//! engine at every node.

use crate::selection::{SelectionRule, select};
use crate::tree::{CommandNode, FlagSpec, PositionalSpec};

/// A node chosen to become a tool, detached from the tree it came from.
#[derive(Debug, Clone)]
pub struct SelectedNode {
    pub name: String,
    pub path: String,
    pub short_help: Option<String>,
    pub long_help: Option<String>,
    pub local_flags: Vec<FlagSpec>,
    /// Inherited flags that survived the node's inherited-flag policy,
    /// in ancestor declaration order.
    pub inherited_flags: Vec<FlagSpec>,
    pub positionals: Option<PositionalSpec>,
}

impl SelectedNode {
    /// Local flags followed by retained inherited flags.
    pub fn flags(&self) -> impl Iterator<Item = &FlagSpec> {
        self.local_flags.iter().chain(self.inherited_flags.iter())
    }
}

/// Visit `root` and every descendant; return the selected ones in pre-order
/// (parent before children, children in declaration order).
///
/// Exclusion never prunes traversal: children of an excluded node are still
/// judged on their own path.
pub fn walk(root: &dyn CommandNode, rules: &[SelectionRule]) -> Vec<SelectedNode> {
    let mut selected = Vec::new();
    visit(root, rules, &mut selected);
    selected
}

fn visit(node: &dyn CommandNode, rules: &[SelectionRule], out: &mut Vec<SelectedNode>) {
    let selection = select(node, rules);
    if selection.included {
        tracing::debug!(path = node.path(), "selected");
        out.push(SelectedNode {
            name: node.name().to_string(),
            path: node.path().to_string(),
            short_help: node.short_help(),
            long_help: node.long_help(),
            local_flags: node.local_flags().to_vec(),
            inherited_flags: node
                .inherited_flags()
                .iter()
                .filter(|f| selection.inherited_flags.contains(&f.name))
                .cloned()
                .collect(),
            positionals: node.positionals().cloned(),
        });
    }

    for child in node.children() {
        visit(child.as_ref(), rules, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{InheritedFlagRule, PathPredicate};
    use crate::tree::CommandTree;
    use clap::{Arg, Command};

    fn tree() -> CommandTree {
        CommandTree::new(|| {
            Command::new("app")
                .disable_help_subcommand(true)
                .arg(Arg::new("namespace").long("namespace").global(true))
                .arg(Arg::new("context").long("context").global(true))
                .subcommand(
                    Command::new("get")
                        .subcommand(Command::new("pods").arg(Arg::new("watch").long("watch")))
                        .subcommand(Command::new("services")),
                )
                .subcommand(Command::new("version"))
        })
        .action("app get pods", |_| Ok(()))
        .action("app get services", |_| Ok(()))
        .action("app version", |_| Ok(()))
    }

    fn paths(nodes: &[SelectedNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.path.as_str()).collect()
    }

    #[test]
    fn pre_order_and_grouping_nodes_skipped() {
        let rules = vec![SelectionRule::allow(PathPredicate::Prefix("app".into())).unwrap()];
        let selected = tree().with_root(|root| walk(root, &rules));
        assert_eq!(
            paths(&selected),
            vec!["app get pods", "app get services", "app version"]
        );
    }

    #[test]
    fn excluded_parent_does_not_prune_children() {
        let rules = vec![
            SelectionRule::deny(PathPredicate::Exact("app get".into())).unwrap(),
            SelectionRule::allow(PathPredicate::Exact("app get pods".into())).unwrap(),
        ];
        let selected = tree().with_root(|root| walk(root, &rules));
        assert_eq!(paths(&selected), vec!["app get pods"]);
    }

    #[test]
    fn included_parent_does_not_include_children() {
        let rules = vec![SelectionRule::allow(PathPredicate::Exact("app version".into())).unwrap()];
        let selected = tree().with_root(|root| walk(root, &rules));
        assert_eq!(paths(&selected), vec!["app version"]);
    }

    #[test]
    fn resolved_flags_follow_policy() {
        let rules = vec![
            SelectionRule::allow(PathPredicate::Exact("app get pods".into()))
                .unwrap()
                .with_inherited_flags(InheritedFlagRule::Allow(vec!["namespace".into()])),
            SelectionRule::allow(PathPredicate::Exact("app version".into()))
                .unwrap()
                .with_inherited_flags(InheritedFlagRule::None),
        ];
        let selected = tree().with_root(|root| walk(root, &rules));

        let pods = &selected[0];
        let flag_names: Vec<&str> = pods.flags().map(|f| f.name.as_str()).collect();
        assert_eq!(flag_names, vec!["watch", "namespace"]);

        let version = &selected[1];
        assert_eq!(version.flags().count(), 0);
    }
}
