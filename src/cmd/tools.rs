/*!
tools.rs - `mcp tools`: print the tools the bridge would expose.

JSON shape:

```json
{
  "status": "ok",
  "root": "<root command>",
  "elapsed_ms": 1,
  "count": 2,
  "tools": [
    { "name": "app_hello", "command": "app hello", "description": "...", "inputSchema": {...} }
  ]
}
```
*/

use std::io::Write;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use serde_json::{Value, json};

use crate::cmd::format::{Role, StyleOptions, box_header, color, emoji, table, truncate_ellipsis};
use crate::cmd::shared::{RulesArgs, build_bridge};
use crate::mcp::Bridge;
use crate::selection::SelectionRule;
use crate::tree::CommandTree;

const MAX_PARAMS_SHOWN: usize = 8;

#[derive(Args, Debug, Clone, Default)]
pub struct ToolsArgs {
    #[command(flatten)]
    pub rules: RulesArgs,

    /// Output JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn execute_tools(args: ToolsArgs, tree: CommandTree, defaults: &[SelectionRule]) -> Result<()> {
    let started = Instant::now();
    let bridge = build_bridge(tree, &args.rules, defaults)?;
    let elapsed_ms = started.elapsed().as_millis();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&tools_json(&bridge, elapsed_ms))?)?;
    } else {
        writeln!(out, "{}", render_tools(&bridge, elapsed_ms, &StyleOptions::detect()))?;
    }
    Ok(())
}

pub fn tools_json(bridge: &Bridge, elapsed_ms: u128) -> Value {
    let tools: Vec<Value> = bridge
        .registry()
        .list()
        .iter()
        .map(|def| {
            json!({
                "name": def.name,
                "command": def.path,
                "description": def.description,
                "inputSchema": def.input_schema(),
            })
        })
        .collect();
    json!({
        "status": "ok",
        "root": bridge.root_name(),
        "elapsed_ms": elapsed_ms,
        "count": tools.len(),
        "tools": tools,
    })
}

pub fn render_tools(bridge: &Bridge, elapsed_ms: u128, style: &StyleOptions) -> String {
    let defs = bridge.registry().list();
    let header = box_header(
        &format!("{} Tools ({})", emoji("list", style), defs.len()),
        Some(format!("root={} • {elapsed_ms}ms", bridge.root_name()).as_str()),
        style,
    );
    if defs.is_empty() {
        let note = color(Role::Dim, format!("{} (none selected)", emoji("info", style)), style);
        return format!("{header}\n{note}");
    }

    let rows: Vec<Vec<String>> = defs
        .iter()
        .enumerate()
        .map(|(i, def)| {
            let mut params: Vec<String> = def
                .params
                .iter()
                .take(MAX_PARAMS_SHOWN)
                .map(|p| {
                    let marker = if p.required { "*" } else { "" };
                    format!("{}{marker}:{}", p.name, p.ty.as_str())
                })
                .collect();
            if def.params.len() > MAX_PARAMS_SHOWN {
                params.push("…".into());
            }
            let params = if params.is_empty() {
                "-".to_string()
            } else {
                params.join(", ")
            };
            vec![
                (i + 1).to_string(),
                def.name.clone(),
                params,
                truncate_ellipsis(&def.description.replace('\n', " "), 90),
            ]
        })
        .collect();

    let body = table(&["#", "NAME", "PARAMS", "DESCRIPTION"], &rows, style);
    format!("{header}\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, Command};

    fn bridge() -> Bridge {
        let tree = CommandTree::new(|| {
            Command::new("app")
                .subcommand(
                    Command::new("hello")
                        .about("Say hello")
                        .arg(Arg::new("greeting").long("greeting").default_value("Hello")),
                )
                .subcommand(
                    Command::new("purge")
                        .about("Delete everything")
                        .arg(Arg::new("yes").long("yes").action(ArgAction::SetTrue))
                        .arg(Arg::new("target").long("target").required(true)),
                )
        })
        .action("app hello", |_| Ok(()))
        .action("app purge", |_| Ok(()));
        Bridge::new(tree, &[]).unwrap()
    }

    #[test]
    fn json_lists_tools_in_order() {
        let v = tools_json(&bridge(), 3);
        assert_eq!(v["count"], 2);
        assert_eq!(v["root"], "app");
        assert_eq!(v["tools"][0]["name"], "app_hello");
        assert_eq!(v["tools"][0]["command"], "app hello");
        assert_eq!(v["tools"][1]["inputSchema"]["required"], json!(["target"]));
    }

    #[test]
    fn table_summarizes_params() {
        let out = render_tools(&bridge(), 0, &StyleOptions::plain(120));
        assert!(out.contains("Tools (2)"));
        assert!(out.contains("greeting:string"));
        assert!(out.contains("yes:boolean, target*:string"));
        assert!(out.contains("Delete everything"));
    }
}
