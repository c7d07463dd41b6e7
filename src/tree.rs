//! Command tree model.
//!
//! The bridge never hard-codes a command type. The walker, selection engine
//! and schema generator read nodes through [`CommandNode`]; the production
//! implementation, [`ClapNode`], reads a built `clap::Command`.
//!
//! [`CommandTree`] couples a factory that produces a brand-new `clap::Command`
//! with the actions registered per command path. Each execution asks the
//! factory for a fresh tree, so parsed flag values never outlive a call.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tokio_util::sync::CancellationToken;

/* ---- Flag model ---- */

/// Value shape of a flag as far as tool schemas are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagKind {
    /// Presence flag (`SetTrue` / `SetFalse`); `presence` is the value it sets.
    Switch { presence: bool },
    /// Boolean taking an explicit value (`--flag=false`).
    Bool,
    /// Occurrence counter (`-vvv`).
    Count,
    String,
    Integer,
    Float,
    /// Multi-valued flag. `append` flags repeat once per value; the others take
    /// every value after a single occurrence.
    StringList { append: bool },
    /// Typed value with no schema representation.
    Unsupported,
}

/// A single flag as read from the command framework.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    /// Framework id (what `ArgMatches` is keyed by).
    pub id: String,
    /// Public name: long name, else short, else id.
    pub name: String,
    pub long: Option<String>,
    pub short: Option<char>,
    pub help: Option<String>,
    pub kind: FlagKind,
    pub required: bool,
    /// Defined with `global = true`, i.e. visible to every descendant.
    pub global: bool,
    pub defaults: Vec<String>,
    pub possible_values: Vec<String>,
    /// Values may start with `-` without being read as another flag.
    pub allow_hyphen_values: bool,
}

impl FlagSpec {
    /// Read a clap argument. Positionals and clap's own help/version flags
    /// yield `None`.
    pub fn from_arg(arg: &Arg) -> Option<Self> {
        if arg.is_positional() {
            return None;
        }
        if matches!(
            arg.get_action(),
            ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
        ) {
            return None;
        }

        let id = arg.get_id().as_str().to_string();
        let long = arg.get_long().map(str::to_string);
        let short = arg.get_short();
        let name = long
            .clone()
            .or_else(|| short.map(|c| c.to_string()))
            .unwrap_or_else(|| id.clone());

        Some(FlagSpec {
            id,
            name,
            long,
            short,
            help: arg
                .get_help()
                .or_else(|| arg.get_long_help())
                .map(|s| s.to_string()),
            kind: flag_kind(arg),
            required: arg.is_required_set(),
            global: arg.is_global_set(),
            defaults: arg
                .get_default_values()
                .iter()
                .map(|v| v.to_string_lossy().into_owned())
                .collect(),
            possible_values: arg
                .get_possible_values()
                .into_iter()
                .filter(|p| !p.is_hide_set())
                .map(|p| p.get_name().to_string())
                .collect(),
            allow_hyphen_values: arg.is_allow_hyphen_values_set(),
        })
    }
}

fn parses_to<T: 'static>(arg: &Arg) -> bool {
    arg.get_value_parser().type_id() == TypeId::of::<T>()
}

fn flag_kind(arg: &Arg) -> FlagKind {
    match arg.get_action() {
        ArgAction::SetTrue => return FlagKind::Switch { presence: true },
        ArgAction::SetFalse => return FlagKind::Switch { presence: false },
        ArgAction::Count => return FlagKind::Count,
        ArgAction::Append => return FlagKind::StringList { append: true },
        _ => {}
    }
    if arg.get_num_args().is_some_and(|r| r.max_values() > 1) {
        return FlagKind::StringList { append: false };
    }

    if parses_to::<bool>(arg) {
        FlagKind::Bool
    } else if parses_to::<i8>(arg)
        || parses_to::<i16>(arg)
        || parses_to::<i32>(arg)
        || parses_to::<i64>(arg)
        || parses_to::<isize>(arg)
        || parses_to::<u8>(arg)
        || parses_to::<u16>(arg)
        || parses_to::<u32>(arg)
        || parses_to::<u64>(arg)
        || parses_to::<usize>(arg)
    {
        FlagKind::Integer
    } else if parses_to::<f32>(arg) || parses_to::<f64>(arg) {
        FlagKind::Float
    } else if parses_to::<String>(arg)
        || parses_to::<OsString>(arg)
        || parses_to::<PathBuf>(arg)
        || !arg.get_possible_values().is_empty()
    {
        FlagKind::String
    } else {
        FlagKind::Unsupported
    }
}

/// Positional (non-flag) arguments a command accepts, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PositionalSpec {
    pub value_names: Vec<String>,
    pub help: Option<String>,
}

impl PositionalSpec {
    fn from_command(cmd: &Command) -> Option<Self> {
        let positionals: Vec<&Arg> = cmd.get_positionals().collect();
        if positionals.is_empty() {
            return None;
        }
        let help = positionals
            .iter()
            .filter_map(|a| a.get_help().map(|h| format!("{}: {}", a.get_id(), h)))
            .collect::<Vec<_>>();
        Some(PositionalSpec {
            value_names: positionals
                .iter()
                .map(|a| a.get_id().as_str().to_string())
                .collect(),
            help: (!help.is_empty()).then(|| help.join("; ")),
        })
    }
}

/* ---- Node capability ---- */

/// What the bridge needs to know about one node of a command tree.
pub trait CommandNode {
    fn name(&self) -> &str;
    /// Space-separated path from the root, root included (`"app get pods"`).
    fn path(&self) -> &str;
    fn short_help(&self) -> Option<String>;
    fn long_help(&self) -> Option<String>;
    /// Flags the node defines itself.
    fn local_flags(&self) -> &[FlagSpec];
    /// Global flags defined by ancestors and visible at this node.
    fn inherited_flags(&self) -> &[FlagSpec];
    fn positionals(&self) -> Option<&PositionalSpec>;
    /// Whether the node has an action; grouping nodes do not.
    fn is_runnable(&self) -> bool;
    fn children(&self) -> Vec<Box<dyn CommandNode + '_>>;
}

/// [`CommandNode`] over a built `clap::Command`.
pub struct ClapNode<'a> {
    cmd: &'a Command,
    path: String,
    local: Vec<FlagSpec>,
    inherited: Vec<FlagSpec>,
    positionals: Option<PositionalSpec>,
    actions: &'a HashMap<String, Action>,
}

impl<'a> ClapNode<'a> {
    /// Root node. `cmd` should have been through `Command::build` so that
    /// global flags are propagated and actions are final.
    pub fn root(cmd: &'a Command, actions: &'a HashMap<String, Action>) -> Self {
        Self::new(cmd, cmd.get_name().to_string(), Vec::new(), actions)
    }

    fn new(
        cmd: &'a Command,
        path: String,
        inherited: Vec<FlagSpec>,
        actions: &'a HashMap<String, Action>,
    ) -> Self {
        // Built subcommands carry copies of their ancestors' globals.
        let local = {
            let inherited_ids: HashSet<&str> = inherited.iter().map(|f| f.id.as_str()).collect();
            cmd.get_arguments()
                .filter(|a| !inherited_ids.contains(a.get_id().as_str()))
                .filter_map(FlagSpec::from_arg)
                .collect()
        };
        ClapNode {
            cmd,
            path,
            local,
            inherited,
            positionals: PositionalSpec::from_command(cmd),
            actions,
        }
    }
}

impl CommandNode for ClapNode<'_> {
    fn name(&self) -> &str {
        self.cmd.get_name()
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn short_help(&self) -> Option<String> {
        self.cmd.get_about().map(|s| s.to_string())
    }

    fn long_help(&self) -> Option<String> {
        self.cmd.get_long_about().map(|s| s.to_string())
    }

    fn local_flags(&self) -> &[FlagSpec] {
        &self.local
    }

    fn inherited_flags(&self) -> &[FlagSpec] {
        &self.inherited
    }

    fn positionals(&self) -> Option<&PositionalSpec> {
        self.positionals.as_ref()
    }

    fn is_runnable(&self) -> bool {
        self.actions.contains_key(&self.path)
    }

    fn children(&self) -> Vec<Box<dyn CommandNode + '_>> {
        let mut visible = self.inherited.clone();
        visible.extend(self.local.iter().filter(|f| f.global).cloned());

        self.cmd
            .get_subcommands()
            .map(|sub| {
                let path = format!("{} {}", self.path, sub.get_name());
                Box::new(ClapNode::new(sub, path, visible.clone(), self.actions))
                    as Box<dyn CommandNode + '_>
            })
            .collect()
    }
}

/* ---- Actions ---- */

/// Handler run for one command path.
pub type Action = Arc<dyn Fn(&mut Invocation<'_>) -> Result<()> + Send + Sync>;

/// Everything an action sees for one run.
///
/// Standard output and standard error share one sink: whatever the action
/// writes through [`Invocation::out`] or [`Invocation::err`] ends up in the
/// same place, in write order.
pub struct Invocation<'a> {
    path: &'a str,
    matches: &'a ArgMatches,
    out: &'a mut dyn Write,
    cancel: CancellationToken,
}

impl Invocation<'_> {
    pub fn path(&self) -> &str {
        self.path
    }

    /// Matches of the command being run (globals from ancestors included).
    pub fn matches(&self) -> &ArgMatches {
        self.matches
    }

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    pub fn err(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/* ---- Command tree ---- */

type Factory = dyn Fn() -> Command + Send + Sync;

/// A command tree definition plus its actions.
pub struct CommandTree {
    factory: Box<Factory>,
    actions: HashMap<String, Action>,
    root_name: String,
}

impl CommandTree {
    /// `factory` must return an equivalent, independent `Command` on every call.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Command + Send + Sync + 'static,
    {
        let root_name = factory().get_name().to_string();
        CommandTree {
            factory: Box::new(factory),
            actions: HashMap::new(),
            root_name,
        }
    }

    /// Register the action for `path` (root name included, e.g. `"app hello"`).
    pub fn action<F>(mut self, path: &str, f: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.actions.insert(normalize_path(path), Arc::new(f));
        self
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// A new, unshared instance of the full command tree.
    pub fn command(&self) -> Command {
        (self.factory)()
    }

    /// Build a fresh tree and hand its root node to `f`.
    pub fn with_root<R>(&self, f: impl FnOnce(&dyn CommandNode) -> R) -> R {
        let mut cmd = self.command();
        cmd.build();
        let root = ClapNode::root(&cmd, &self.actions);
        f(&root)
    }

    /// Parse `argv` (program name first) against a fresh tree and run the
    /// action of the command it reaches.
    pub fn run<I, T>(&self, argv: I, out: &mut dyn Write, cancel: CancellationToken) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self
            .command()
            .try_get_matches_from(argv)
            .map_err(|e| anyhow!("{}", e.render().to_string().trim_end()))?;
        self.dispatch(&matches, out, cancel)
    }

    /// Run the action for already-parsed root matches.
    pub fn dispatch(
        &self,
        matches: &ArgMatches,
        out: &mut dyn Write,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut path = self.root_name.clone();
        let mut leaf = matches;
        while let Some((name, sub)) = leaf.subcommand() {
            path.push(' ');
            path.push_str(name);
            leaf = sub;
        }

        let action = self
            .actions
            .get(&path)
            .with_context(|| format!("`{path}` has no action; pick a subcommand"))?;

        let mut invocation = Invocation {
            path: &path,
            matches: leaf,
            out,
            cancel,
        };
        action(&mut invocation)
    }
}

/// Collapse any whitespace run in a command path to one space.
pub fn normalize_path(path: &str) -> String {
    path.split_whitespace().collect::<Vec<_>>().join(" ")
}
