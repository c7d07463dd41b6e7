//! Execution adapter.
//!
//! One call: look the tool up, translate the argument map back into command
//! line tokens, build a fresh command tree, run it on a blocking thread with a
//! call-local output buffer, and report the outcome.
//!
//! Lookup and argument translation failures are `Err(BridgeError)` (protocol
//! errors). A command that ran and failed, panicked, or was cancelled is
//! `Ok(ExecutionResult { success: false, .. })` (tool-level error).

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::registry::ToolRegistry;
use crate::schema::{ParamBinding, ParamSpec, ToolDefinition};
use crate::tree::{CommandTree, FlagKind, FlagSpec};

/* ---- Request / Result ---- */

#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub tool: String,
    pub arguments: Map<String, Value>,
}

impl ExecutionRequest {
    pub fn new(tool: impl Into<String>, arguments: Map<String, Value>) -> Self {
        ExecutionRequest {
            tool: tool.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Everything the command wrote; on failure followed by `Error: <message>`.
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(output: String) -> Self {
        ExecutionResult {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failure(captured: String, error: String) -> Self {
        let mut output = captured;
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str("Error: ");
        output.push_str(&error);
        ExecutionResult {
            success: false,
            output,
            error: Some(error),
        }
    }
}

/* ---- Executor ---- */

/// Runs registered tools. Cheap to share; holds no per-call state.
#[derive(Clone)]
pub struct Executor {
    tree: Arc<CommandTree>,
    registry: Arc<ToolRegistry>,
}

impl Executor {
    pub fn new(tree: Arc<CommandTree>, registry: Arc<ToolRegistry>) -> Self {
        Executor { tree, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call. `cancel` bounds the call: once it fires the call
    /// reports failure immediately and the action sees a cancelled token.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, BridgeError> {
        let started = Instant::now();
        let def = self
            .registry
            .lookup(&request.tool)
            .ok_or_else(|| BridgeError::ToolNotFound {
                name: request.tool.clone(),
            })?;

        let argv = build_argv(def, &request.arguments)?;
        tracing::debug!(tool = %def.name, ?argv, "arguments bound");

        if cancel.is_cancelled() {
            return Ok(ExecutionResult::failure(String::new(), "cancelled".into()));
        }

        let tree = Arc::clone(&self.tree);
        let task_cancel = cancel.child_token();
        let handle = tokio::task::spawn_blocking(move || run_isolated(&tree, argv, task_cancel));

        let result = tokio::select! {
            joined = handle => joined?,
            _ = cancel.cancelled() => {
                ExecutionResult::failure(String::new(), "cancelled before completion".into())
            }
        };

        tracing::info!(
            tool = %def.name,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call finished"
        );
        Ok(result)
    }
}

thread_local! {
    static IN_ACTION: Cell<bool> = const { Cell::new(false) };
}

/// Keep the default panic hook from printing for panics raised inside an
/// action; those are reported through the call result instead. Panics
/// anywhere else still reach the previous hook.
fn silence_action_panics() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !IN_ACTION.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Run `argv` against a brand-new command tree, capturing all output.
/// Panics raised by the action are turned into a failed result.
fn run_isolated(tree: &CommandTree, argv: Vec<String>, cancel: CancellationToken) -> ExecutionResult {
    silence_action_panics();
    let mut buffer: Vec<u8> = Vec::new();
    IN_ACTION.with(|f| f.set(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| tree.run(argv, &mut buffer, cancel)));
    IN_ACTION.with(|f| f.set(false));
    let captured = String::from_utf8_lossy(&buffer).into_owned();

    match outcome {
        Ok(Ok(())) => ExecutionResult::success(captured),
        Ok(Err(e)) => ExecutionResult::failure(captured, format!("{e:#}")),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(panic = %msg, "command panicked");
            ExecutionResult::failure(captured, format!("command panicked: {msg}"))
        }
    }
}

/* ---- Argument translation ---- */

/// Translate an argument map into argv for `def` (program name first).
///
/// Flags with values become `--name=value`; switches are emitted only when
/// the requested value is the one their presence sets; positional values
/// follow a `--` separator in the order given.
pub fn build_argv(def: &ToolDefinition, args: &Map<String, Value>) -> Result<Vec<String>, BridgeError> {
    if let Some(unknown) = args.keys().find(|k| def.param(k).is_none()) {
        return Err(BridgeError::UnknownParameter {
            tool: def.name.clone(),
            param: unknown.clone(),
        });
    }

    let mut argv: Vec<String> = def.path.split(' ').map(str::to_string).collect();
    let mut positional = Vec::new();

    for param in &def.params {
        let Some(value) = args.get(&param.name).filter(|v| !v.is_null()) else {
            continue;
        };
        match &param.binding {
            ParamBinding::Positional => positional = as_string_list(param, value)?,
            ParamBinding::Flag(flag) => push_flag(&mut argv, param, flag, value)?,
        }
    }

    if !positional.is_empty() {
        argv.push("--".into());
        argv.extend(positional);
    }
    Ok(argv)
}

fn flag_token(flag: &FlagSpec) -> String {
    match (&flag.long, flag.short) {
        (Some(long), _) => format!("--{long}"),
        (None, Some(short)) => format!("-{short}"),
        (None, None) => format!("--{}", flag.id),
    }
}

/// `--long=value`, or `-s=value` for short-only flags, so a value starting
/// with `-` is never read as another flag.
fn push_value(argv: &mut Vec<String>, flag: &FlagSpec, value: String) {
    argv.push(format!("{}={value}", flag_token(flag)));
}

fn push_flag(
    argv: &mut Vec<String>,
    param: &ParamSpec,
    flag: &FlagSpec,
    value: &Value,
) -> Result<(), BridgeError> {
    match flag.kind {
        FlagKind::Switch { presence } => {
            if as_bool(param, value)? == presence {
                argv.push(flag_token(flag));
            }
        }
        FlagKind::Bool => push_value(argv, flag, as_bool(param, value)?.to_string()),
        FlagKind::Count => {
            // clap keeps occurrences in a u8
            let n = as_integer(param, value)?;
            if !(0..=i64::from(u8::MAX)).contains(&n) {
                return Err(invalid(param, "integer between 0 and 255", value));
            }
            for _ in 0..n {
                argv.push(flag_token(flag));
            }
        }
        FlagKind::Integer => push_value(argv, flag, as_integer(param, value)?.to_string()),
        FlagKind::Float => push_value(argv, flag, as_float(param, value)?.to_string()),
        FlagKind::String => {
            let v = as_scalar_string(param, value)?;
            check_choice(param, value, &v)?;
            push_value(argv, flag, v);
        }
        FlagKind::StringList { append: true } => {
            for v in as_string_list(param, value)? {
                check_choice(param, value, &v)?;
                push_value(argv, flag, v);
            }
        }
        FlagKind::StringList { append: false } => {
            let mut values = as_string_list(param, value)?;
            for v in &values {
                check_choice(param, value, v)?;
            }
            match values.len() {
                0 => {}
                1 => push_value(argv, flag, values.remove(0)),
                _ => {
                    // bare tokens after the flag; clap reads a leading '-' as another flag
                    if !flag.allow_hyphen_values && values.iter().any(|v| v.starts_with('-')) {
                        return Err(invalid(param, "values not starting with '-'", value));
                    }
                    argv.push(flag_token(flag));
                    argv.extend(values);
                }
            }
        }
        // never reaches a schema
        FlagKind::Unsupported => {}
    }
    Ok(())
}

fn invalid(param: &ParamSpec, expected: &'static str, got: &Value) -> BridgeError {
    BridgeError::InvalidArgument {
        param: param.name.clone(),
        expected,
        got: got.to_string(),
    }
}

/// Values outside a flag's possible values never reach the command.
fn check_choice(param: &ParamSpec, value: &Value, v: &str) -> Result<(), BridgeError> {
    if param.enum_values.is_empty() || param.enum_values.iter().any(|c| c == v) {
        Ok(())
    } else {
        Err(invalid(param, "one of the allowed values", value))
    }
}

fn as_bool(param: &ParamSpec, value: &Value) -> Result<bool, BridgeError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(true),
            "false" | "0" | "no" | "n" => Ok(false),
            _ => Err(invalid(param, "boolean", value)),
        },
        _ => Err(invalid(param, "boolean", value)),
    }
}

fn as_integer(param: &ParamSpec, value: &Value) -> Result<i64, BridgeError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(param, "integer", value))
}

fn as_float(param: &ParamSpec, value: &Value) -> Result<f64, BridgeError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| invalid(param, "number", value))
}

fn as_scalar_string(param: &ParamSpec, value: &Value) -> Result<String, BridgeError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid(param, "string", value)),
    }
}

fn as_string_list(param: &ParamSpec, value: &Value) -> Result<Vec<String>, BridgeError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) | Value::Object(_) | Value::Null => {
                    Err(invalid(param, "array of strings", value))
                }
                scalar => as_scalar_string(param, scalar),
            })
            .collect(),
        scalar => Ok(vec![as_scalar_string(param, scalar)?]),
    }
}
