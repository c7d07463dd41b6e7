/*!
claude.rs - `mcp claude enable|disable|list`.

Registers this executable (launched as `<exe> mcp start`) in the Claude
Desktop configuration, removes it again, or lists what is registered.
`--config-path` overrides the platform default location.
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};

use crate::cmd::MCP_COMMAND;
use crate::cmd::format::{Role, StyleOptions, box_header, color, emoji, table};
use crate::cmd::shared::RulesArgs;
use crate::desktop::{DesktopConfig, ServerEntry};

#[derive(Subcommand, Debug, Clone)]
pub enum ClaudeCommand {
    /// Register this executable as an MCP server in Claude Desktop
    Enable(EnableArgs),
    /// Remove the registration
    Disable(DesktopArgs),
    /// Show the MCP servers Claude Desktop knows about
    List(ListArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct DesktopArgs {
    /// Claude Desktop config file (default: platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// Server entry name (default: the application name)
    #[arg(long, value_name = "NAME")]
    pub server_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EnableArgs {
    #[command(flatten)]
    pub desktop: DesktopArgs,

    #[command(flatten)]
    pub rules: RulesArgs,

    /// Environment for the server process (repeatable KEY=VALUE)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub desktop: DesktopArgs,

    /// Output JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn execute_claude(cmd: ClaudeCommand, app_name: &str) -> Result<()> {
    match cmd {
        ClaudeCommand::Enable(args) => enable(args, app_name),
        ClaudeCommand::Disable(args) => disable(args, app_name),
        ClaudeCommand::List(args) => list(args),
    }
}

fn enable(args: EnableArgs, app_name: &str) -> Result<()> {
    let config = DesktopConfig::locate(args.desktop.config_path.clone())?;
    let name = args.desktop.server_name.as_deref().unwrap_or(app_name);
    let exe = std::env::current_exe().context("failed to locate the running executable")?;
    let entry = server_entry(&exe, args.rules.path().as_deref(), &args.env)?;

    config.add_server(name, &entry)?;

    let style = StyleOptions::detect();
    println!(
        "{} {} registered in {}",
        emoji("success", &style),
        color(Role::Success, name, &style),
        config.path().display()
    );
    println!("   {}", color(Role::Dim, invocation(&entry), &style));
    println!("Restart Claude Desktop to pick up the change.");
    Ok(())
}

fn disable(args: DesktopArgs, app_name: &str) -> Result<()> {
    let config = DesktopConfig::locate(args.config_path)?;
    let name = args.server_name.as_deref().unwrap_or(app_name);
    let style = StyleOptions::detect();
    if config.remove_server(name)? {
        println!(
            "{} {} removed from {}",
            emoji("success", &style),
            name,
            config.path().display()
        );
    } else {
        println!(
            "{} {} is not registered in {}",
            emoji("info", &style),
            name,
            config.path().display()
        );
    }
    Ok(())
}

fn list(args: ListArgs) -> Result<()> {
    let config = DesktopConfig::locate(args.desktop.config_path)?;
    let servers = config.list_servers()?;

    if args.json {
        let doc = serde_json::json!({
            "status": "ok",
            "path": config.path(),
            "count": servers.len(),
            "servers": servers,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let style = StyleOptions::detect();
    let path = config.path().display().to_string();
    println!(
        "{}",
        box_header(
            &format!("{} MCP servers ({})", emoji("tool", &style), servers.len()),
            Some(path.as_str()),
            &style
        )
    );
    if servers.is_empty() {
        println!("{}", color(Role::Dim, "(none)", &style));
        return Ok(());
    }
    let rows: Vec<Vec<String>> = servers
        .iter()
        .map(|(name, entry)| vec![name.clone(), invocation(entry)])
        .collect();
    println!("{}", table(&["NAME", "COMMAND"], &rows, &style));
    Ok(())
}

/// Entry launching `exe mcp start`, pinned to an absolute rules file when given.
pub fn server_entry(exe: &Path, rules: Option<&Path>, env: &[String]) -> Result<ServerEntry> {
    let mut args = vec![MCP_COMMAND.to_string(), "start".to_string()];
    if let Some(rules) = rules {
        let abs = std::path::absolute(rules)
            .with_context(|| format!("failed to resolve rules path: {}", rules.display()))?;
        args.push("--rules".into());
        args.push(abs.display().to_string());
    }
    let mut entry = ServerEntry::new(exe.display().to_string(), args);
    entry.env = parse_env(env)?;
    Ok(entry)
}

fn parse_env(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    for kv in pairs {
        let Some((k, v)) = kv.split_once('=') else {
            bail!("invalid --env (expected KEY=VALUE): {kv}");
        };
        let key = k.trim();
        if key.is_empty() {
            bail!("invalid --env (empty key): {kv}");
        }
        env.insert(key.to_string(), v.to_string());
    }
    Ok(env)
}

fn invocation(entry: &ServerEntry) -> String {
    let mut words = Vec::with_capacity(entry.args.len() + 1);
    words.push(entry.command.as_str());
    words.extend(entry.args.iter().map(String::as_str));
    shell_words::join(words)
}
