use anyhow::{Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use tokio_util::sync::CancellationToken;

use mcp_bridge::tree::{CommandTree, Invocation};
use mcp_bridge::{InheritedFlagRule, PathPredicate, SelectionRule, cmd, utils};

/// mcp-bridge - sample CLI served as MCP tools.
///
/// Command layout:
///   mcp-bridge hello [--greeting G] [--name N]
///   mcp-bridge cluster [--namespace NS] [--context CTX] list [--all] [--limit N] [--label K=V ...]
///   mcp-bridge cluster [--namespace NS] [--context CTX] describe <POD>...
///   mcp-bridge mcp start|tools|claude ...
///
/// Global flags / env:
///   -v / -vv        Increase verbosity (stderr)
///   -q / --quiet    Errors only
///   RUST_LOG        Overrides the derived level
///   MCP_BRIDGE_RULES  Rules file when --rules is omitted
///
/// Examples:
///   mcp-bridge hello --greeting Hi
///   mcp-bridge mcp tools
///   mcp-bridge mcp start --rules rules.yaml
///   mcp-bridge mcp claude enable --env RUST_LOG=debug
fn app() -> Command {
    Command::new("mcp-bridge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Serve a CLI's commands as MCP tools (with a small sample CLI)")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase verbosity (-v, -vv)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Silence all non-error output"),
        )
        .subcommand(
            Command::new("hello")
                .about("Print a greeting")
                .arg(
                    Arg::new("greeting")
                        .long("greeting")
                        .default_value("Hello")
                        .help("Greeting word"),
                )
                .arg(
                    Arg::new("name")
                        .long("name")
                        .default_value("World")
                        .help("Who to greet"),
                ),
        )
        .subcommand(
            Command::new("cluster")
                .about("Inspect the sample cluster")
                .subcommand_required(true)
                .arg(
                    Arg::new("namespace")
                        .long("namespace")
                        .short('n')
                        .global(true)
                        .default_value("default")
                        .help("Namespace to operate in"),
                )
                .arg(
                    Arg::new("context")
                        .long("context")
                        .global(true)
                        .value_parser(["dev", "prod"])
                        .help("Cluster context"),
                )
                .subcommand(
                    Command::new("list")
                        .about("List pods")
                        .arg(
                            Arg::new("all")
                                .long("all")
                                .action(ArgAction::SetTrue)
                                .help("Include completed pods"),
                        )
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(u32))
                                .help("Maximum pods to show"),
                        )
                        .arg(
                            Arg::new("label")
                                .long("label")
                                .action(ArgAction::Append)
                                .value_name("KEY=VALUE")
                                .help("Only pods carrying this label (repeatable)"),
                        ),
                )
                .subcommand(
                    Command::new("describe")
                        .about("Show pod details")
                        .arg(
                            Arg::new("pods")
                                .value_name("POD")
                                .num_args(1..)
                                .required(true)
                                .help("Pod names"),
                        ),
                ),
        )
        .subcommand(cmd::mcp_command())
}

/* ---- Sample cluster ---- */

struct Pod {
    name: &'static str,
    namespace: &'static str,
    phase: &'static str,
    labels: &'static [(&'static str, &'static str)],
}

const PODS: &[Pod] = &[
    Pod {
        name: "web-7c9d",
        namespace: "default",
        phase: "Running",
        labels: &[("app", "web"), ("tier", "frontend")],
    },
    Pod {
        name: "api-5f2a",
        namespace: "default",
        phase: "Running",
        labels: &[("app", "api"), ("tier", "backend")],
    },
    Pod {
        name: "migrate-1x8k",
        namespace: "default",
        phase: "Succeeded",
        labels: &[("app", "api"), ("job", "migrate")],
    },
    Pod {
        name: "coredns-66bf",
        namespace: "kube-system",
        phase: "Running",
        labels: &[("app", "dns")],
    },
];

fn string_arg(m: &ArgMatches, id: &str) -> String {
    m.get_one::<String>(id).cloned().unwrap_or_default()
}

fn hello(inv: &mut Invocation<'_>) -> Result<()> {
    let greeting = string_arg(inv.matches(), "greeting");
    let name = string_arg(inv.matches(), "name");
    writeln!(inv.out(), "{greeting}, {name}!")?;
    Ok(())
}

fn cluster_list(inv: &mut Invocation<'_>) -> Result<()> {
    let m = inv.matches();
    let namespace = string_arg(m, "namespace");
    let all = m.get_flag("all");
    let limit = m.get_one::<u32>("limit").map(|n| *n as usize).unwrap_or(usize::MAX);
    let mut labels = Vec::new();
    for raw in m.get_many::<String>("label").into_iter().flatten() {
        let Some((k, v)) = raw.split_once('=') else {
            bail!("invalid --label (expected KEY=VALUE): {raw}");
        };
        labels.push((k.to_string(), v.to_string()));
    }

    let pods: Vec<&Pod> = PODS
        .iter()
        .filter(|p| p.namespace == namespace)
        .filter(|p| all || p.phase == "Running")
        .filter(|p| {
            labels
                .iter()
                .all(|(k, v)| p.labels.iter().any(|(pk, pv)| pk == k && pv == v))
        })
        .take(limit)
        .collect();

    let out = inv.out();
    writeln!(out, "NAME\tPHASE")?;
    for pod in &pods {
        writeln!(out, "{}\t{}", pod.name, pod.phase)?;
    }
    tracing::debug!(namespace = %namespace, shown = pods.len(), "listed pods");
    Ok(())
}

fn cluster_describe(inv: &mut Invocation<'_>) -> Result<()> {
    let namespace = string_arg(inv.matches(), "namespace");
    let context = inv.matches().get_one::<String>("context").cloned();
    let names: Vec<String> = inv
        .matches()
        .get_many::<String>("pods")
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    let mut missing = Vec::new();
    for name in &names {
        if inv.is_cancelled() {
            bail!("cancelled");
        }
        match PODS.iter().find(|p| p.namespace == namespace && p.name == name.as_str()) {
            Some(pod) => {
                let labels: Vec<String> = pod.labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
                let out = inv.out();
                writeln!(out, "Name:      {}", pod.name)?;
                writeln!(out, "Namespace: {}", pod.namespace)?;
                if let Some(ctx) = &context {
                    writeln!(out, "Context:   {ctx}")?;
                }
                writeln!(out, "Phase:     {}", pod.phase)?;
                writeln!(out, "Labels:    {}", labels.join(", "))?;
            }
            None => missing.push(name.as_str()),
        }
    }
    if !missing.is_empty() {
        bail!("pods not found in namespace {namespace}: {}", missing.join(", "));
    }
    Ok(())
}

fn tree() -> CommandTree {
    CommandTree::new(app)
        .action("mcp-bridge hello", hello)
        .action("mcp-bridge cluster list", cluster_list)
        .action("mcp-bridge cluster describe", cluster_describe)
}

/// Every sample command; of the ancestor flags only the cluster ones are
/// exposed, never -v/-q.
fn default_rules() -> Result<Vec<SelectionRule>> {
    Ok(vec![
        SelectionRule::allow(PathPredicate::Glob("mcp-bridge *".into()))?.with_inherited_flags(
            InheritedFlagRule::Allow(vec!["namespace".into(), "context".into()]),
        ),
    ])
}

fn main() -> Result<()> {
    let tree = tree();
    let matches = tree.command().get_matches();

    let level = utils::derive_level(matches.get_count("verbose"), matches.get_flag("quiet"));
    utils::init_logging(level);

    if let Some((cmd::MCP_COMMAND, sub)) = matches.subcommand() {
        return cmd::execute_mcp(sub, tree, &default_rules()?);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    tree.dispatch(&matches, &mut out, CancellationToken::new())
}
