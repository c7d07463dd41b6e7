/*!
start.rs - `mcp start`: serve the command tree over stdio.

Runs until the client closes the session. Logs go to stderr only.
*/

use anyhow::{Context, Result};
use clap::Args;

use crate::cmd::shared::{RulesArgs, build_bridge};
use crate::mcp::{BridgeServer, serve_stdio};
use crate::selection::SelectionRule;
use crate::tree::CommandTree;

#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    #[command(flatten)]
    pub rules: RulesArgs,
}

pub fn execute_start(args: StartArgs, tree: CommandTree, defaults: &[SelectionRule]) -> Result<()> {
    let bridge = build_bridge(tree, &args.rules, defaults)?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(serve_stdio(BridgeServer::new(bridge)))
}
