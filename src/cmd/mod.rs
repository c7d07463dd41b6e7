/*!
The `mcp` subcommand a host application grafts onto its own clap tree.

  mcp start  [--rules FILE]            serve the tree as MCP tools on stdio
  mcp tools  [--rules FILE] [--json]   print the tools that would be served
  mcp claude enable|disable|list       manage the Claude Desktop registration

Host wiring:

```ignore
let app = || my_cli().subcommand(cmd::mcp_command());
let tree = CommandTree::new(app).action("my-cli run", run);
let matches = tree.command().get_matches();
if let Some((cmd::MCP_COMMAND, sub)) = matches.subcommand() {
    return cmd::execute_mcp(sub, tree, &[]);
}
```

Each subcommand module exposes one `execute_*` function returning
`anyhow::Result<()>`; argument structs derive `clap::Args`.
*/

pub mod claude;
pub mod format;
pub mod shared;
pub mod start;
pub mod tools;

use anyhow::Result;
use clap::{ArgMatches, Command, FromArgMatches, Subcommand};

use crate::selection::SelectionRule;
use crate::tree::CommandTree;

pub use claude::{ClaudeCommand, execute_claude};
pub use start::{StartArgs, execute_start};
pub use tools::{ToolsArgs, execute_tools};

/// Name of the grafted subcommand; `<root> mcp` is never exposed as tools.
pub const MCP_COMMAND: &str = "mcp";

#[derive(Subcommand, Debug, Clone)]
pub enum McpCommand {
    /// Serve this CLI's commands as MCP tools over stdio
    Start(StartArgs),

    /// List the tools `mcp start` would serve
    Tools(ToolsArgs),

    /// Register or unregister with Claude Desktop
    #[command(subcommand)]
    Claude(ClaudeCommand),
}

pub fn mcp_command() -> Command {
    McpCommand::augment_subcommands(
        Command::new(MCP_COMMAND)
            .about("Expose this CLI to MCP clients")
            .subcommand_required(true)
            .arg_required_else_help(true),
    )
}

/// Run `mcp …` from the matches of the `mcp` subcommand itself.
///
/// `defaults` apply when no rules file is given; an empty list exposes every
/// runnable command.
pub fn execute_mcp(matches: &ArgMatches, tree: CommandTree, defaults: &[SelectionRule]) -> Result<()> {
    let app_name = tree.root_name().to_string();
    match McpCommand::from_arg_matches(matches)? {
        McpCommand::Start(args) => execute_start(args, tree, defaults),
        McpCommand::Tools(args) => execute_tools(args, tree, defaults),
        McpCommand::Claude(cmd) => execute_claude(cmd, &app_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn host() -> Command {
        Command::new("app")
            .subcommand(Command::new("hello"))
            .subcommand(mcp_command())
    }

    fn parse(argv: &[&str]) -> McpCommand {
        let matches = host().try_get_matches_from(argv).unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, MCP_COMMAND);
        McpCommand::from_arg_matches(sub).unwrap()
    }

    #[test]
    fn parses_start_with_rules() {
        match parse(&["app", "mcp", "start", "--rules", "r.yaml"]) {
            McpCommand::Start(a) => assert_eq!(a.rules.rules, Some(PathBuf::from("r.yaml"))),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_tools_json() {
        assert!(matches!(
            parse(&["app", "mcp", "tools", "--json"]),
            McpCommand::Tools(ToolsArgs { json: true, .. })
        ));
    }

    #[test]
    fn parses_claude_disable() {
        match parse(&["app", "mcp", "claude", "disable", "--server-name", "demo"]) {
            McpCommand::Claude(ClaudeCommand::Disable(a)) => {
                assert_eq!(a.server_name.as_deref(), Some("demo"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bare_mcp_requires_subcommand() {
        assert!(host().try_get_matches_from(["app", "mcp"]).is_err());
    }

    #[test]
    fn mcp_group_never_becomes_tools() {
        let tree = CommandTree::new(host)
            .action("app hello", |_| Ok(()))
            // even with an action, the grafted group stays hidden
            .action("app mcp tools", |_| Ok(()));
        let rules = shared::resolve_rules(None, tree.root_name(), &[]).unwrap();
        let bridge = crate::mcp::Bridge::new(tree, &rules).unwrap();
        let names: Vec<&str> = bridge.registry().list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["app_hello"]);
    }
}
