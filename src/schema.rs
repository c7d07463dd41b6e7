//! Schema generator: turns a selected node into a [`ToolDefinition`].

use serde_json::{Map, Value, json};

use crate::error::BridgeError;
use crate::tree::{FlagKind, FlagSpec};
use crate::walker::SelectedNode;

/// MCP clients reject tool names longer than this.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Parameter carrying positional arguments.
pub const POSITIONAL_PARAM: &str = "args";
const POSITIONAL_PARAM_FALLBACK: &str = "positional_args";

/// JSON-schema type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Boolean,
    Integer,
    Number,
    StringArray,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::StringArray => "array",
        }
    }
}

/// How a parameter goes back onto the command line.
#[derive(Debug, Clone)]
pub enum ParamBinding {
    Flag(FlagSpec),
    /// Trailing bare tokens, order preserved.
    Positional,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub enum_values: Vec<String>,
    pub binding: ParamBinding,
}

impl ParamSpec {
    fn to_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.ty.as_str()));
        if self.ty == ParamType::StringArray {
            prop.insert("items".into(), json!({ "type": "string" }));
        }
        if let Some(desc) = &self.description {
            prop.insert("description".into(), json!(desc));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        if !self.enum_values.is_empty() {
            // for arrays the enum constrains the items
            match prop.get_mut("items") {
                Some(Value::Object(items)) => {
                    items.insert("enum".into(), json!(self.enum_values));
                }
                _ => {
                    prop.insert("enum".into(), json!(self.enum_values));
                }
            }
        }
        Value::Object(prop)
    }
}

/// An invocable tool derived from one command node. Immutable once built.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Command path the tool re-executes (`"app get pods"`).
    pub path: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDefinition {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON-schema object describing the tool's input.
    pub fn input_schema(&self) -> Map<String, Value> {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        schema.insert("additionalProperties".into(), json!(false));
        schema
    }
}

/// Derive a protocol-safe tool name from a command path: lowercase, every run
/// of characters outside `[a-z0-9_]` becomes one `_`, outer `_` trimmed.
pub fn tool_name(path: &str) -> String {
    let mut name = String::with_capacity(path.len());
    let mut pending_sep = false;
    for c in path.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_sep && !name.is_empty() {
                name.push('_');
            }
            pending_sep = false;
            name.push(c);
        } else {
            pending_sep = true;
        }
    }
    name.trim_matches('_').to_string()
}

/// Description: short help, else long help, else the bare command name.
fn description(node: &SelectedNode) -> String {
    [&node.short_help, &node.long_help]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| node.name.clone())
}

fn default_value(flag: &FlagSpec, ty: ParamType) -> Option<Value> {
    let first = flag.defaults.first()?;
    let value = match (&flag.kind, ty) {
        (FlagKind::StringList { .. }, _) => json!(flag.defaults),
        (_, ParamType::Boolean) => json!(first.parse::<bool>().ok()?),
        (_, ParamType::Integer) => json!(first.parse::<i64>().ok()?),
        (_, ParamType::Number) => json!(first.parse::<f64>().ok()?),
        _ => json!(first),
    };
    Some(value)
}

fn flag_param(flag: &FlagSpec, path: &str) -> Option<ParamSpec> {
    let ty = match flag.kind {
        FlagKind::Switch { .. } | FlagKind::Bool => ParamType::Boolean,
        FlagKind::Count | FlagKind::Integer => ParamType::Integer,
        FlagKind::Float => ParamType::Number,
        FlagKind::String => ParamType::String,
        FlagKind::StringList { .. } => ParamType::StringArray,
        FlagKind::Unsupported => {
            tracing::warn!(
                command = path,
                flag = %flag.name,
                "flag value type has no schema representation; dropped"
            );
            return None;
        }
    };
    let enum_values = match ty {
        ParamType::String | ParamType::StringArray => flag.possible_values.clone(),
        _ => Vec::new(),
    };
    Some(ParamSpec {
        name: flag.name.clone(),
        ty,
        required: flag.required,
        default: default_value(flag, ty),
        description: flag.help.clone(),
        enum_values,
        binding: ParamBinding::Flag(flag.clone()),
    })
}

/// Build the tool definition for a selected node.
pub fn build_tool_definition(node: &SelectedNode) -> Result<ToolDefinition, BridgeError> {
    let name = tool_name(&node.path);
    if name.is_empty() {
        return Err(BridgeError::EmptyToolName {
            path: node.path.clone(),
        });
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(BridgeError::NameTooLong {
            name,
            path: node.path.clone(),
            max: MAX_TOOL_NAME_LEN,
        });
    }

    let mut params: Vec<ParamSpec> = node
        .flags()
        .filter_map(|f| flag_param(f, &node.path))
        .collect();

    if let Some(positionals) = &node.positionals {
        let param_name = if params.iter().any(|p| p.name == POSITIONAL_PARAM) {
            POSITIONAL_PARAM_FALLBACK
        } else {
            POSITIONAL_PARAM
        };
        let description = match &positionals.help {
            Some(help) => format!("Positional arguments ({}). {help}", positionals.value_names.join(", ")),
            None => format!("Positional arguments ({})", positionals.value_names.join(", ")),
        };
        params.push(ParamSpec {
            name: param_name.to_string(),
            ty: ParamType::StringArray,
            required: false,
            default: None,
            description: Some(description),
            enum_values: Vec::new(),
            binding: ParamBinding::Positional,
        });
    }

    Ok(ToolDefinition {
        name,
        description: description(node),
        path: node.path.clone(),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::PositionalSpec;

    fn flag(name: &str, kind: FlagKind) -> FlagSpec {
        FlagSpec {
            id: name.into(),
            name: name.into(),
            long: Some(name.into()),
            short: None,
            help: Some(format!("{name} help")),
            kind,
            required: false,
            global: false,
            defaults: Vec::new(),
            possible_values: Vec::new(),
            allow_hyphen_values: false,
        }
    }

    fn node(path: &str, local: Vec<FlagSpec>) -> SelectedNode {
        SelectedNode {
            name: path.rsplit(' ').next().unwrap().into(),
            path: path.into(),
            short_help: None,
            long_help: None,
            local_flags: local,
            inherited_flags: Vec::new(),
            positionals: None,
        }
    }

    #[test]
    fn tool_name_normalization() {
        assert_eq!(tool_name("app hello"), "app_hello");
        assert_eq!(tool_name("root sub-a"), "root_sub_a");
        assert_eq!(tool_name("My-App  Get.Pods"), "my_app_get_pods");
        assert_eq!(tool_name("app snake_case"), "app_snake_case");
    }

    #[test]
    fn greeting_schema() {
        let mut greeting = flag("greeting", FlagKind::String);
        greeting.defaults = vec!["Hello".into()];
        greeting.help = Some("Greeting word".into());
        let def = build_tool_definition(&node("app hello", vec![greeting])).unwrap();

        assert_eq!(def.name, "app_hello");
        assert_eq!(def.description, "hello");
        assert_eq!(
            Value::Object(def.input_schema()),
            json!({
                "type": "object",
                "properties": {
                    "greeting": {
                        "type": "string",
                        "description": "Greeting word",
                        "default": "Hello"
                    }
                },
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn description_fallbacks() {
        let mut n = node("app x", vec![]);
        n.long_help = Some("Long text".into());
        assert_eq!(build_tool_definition(&n).unwrap().description, "Long text");
        n.short_help = Some("Short".into());
        assert_eq!(build_tool_definition(&n).unwrap().description, "Short");
    }

    #[test]
    fn types_required_and_enums() {
        let mut level = flag("level", FlagKind::String);
        level.possible_values = vec!["low".into(), "high".into()];
        level.required = true;
        let mut count = flag("count", FlagKind::Count);
        count.defaults = vec!["0".into()];
        let def = build_tool_definition(&node(
            "app x",
            vec![
                flag("dry-run", FlagKind::Switch { presence: true }),
                count,
                flag("ratio", FlagKind::Float),
                flag("tag", FlagKind::StringList { append: true }),
                level,
            ],
        ))
        .unwrap();

        let schema = Value::Object(def.input_schema());
        assert_eq!(schema["properties"]["dry-run"]["type"], "boolean");
        assert_eq!(schema["properties"]["count"]["type"], "integer");
        assert_eq!(schema["properties"]["count"]["default"], 0);
        assert_eq!(schema["properties"]["ratio"]["type"], "number");
        assert_eq!(schema["properties"]["tag"]["type"], "array");
        assert_eq!(schema["properties"]["tag"]["items"]["type"], "string");
        assert_eq!(schema["properties"]["level"]["enum"], json!(["low", "high"]));
        assert_eq!(schema["required"], json!(["level"]));
    }

    #[test]
    fn unsupported_flag_dropped() {
        let def = build_tool_definition(&node(
            "app x",
            vec![flag("blob", FlagKind::Unsupported), flag("ok", FlagKind::String)],
        ))
        .unwrap();
        let names: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn positional_parameter_appended() {
        let mut n = node("app describe", vec![flag("args", FlagKind::String)]);
        n.positionals = Some(PositionalSpec {
            value_names: vec!["name".into()],
            help: None,
        });
        let def = build_tool_definition(&n).unwrap();
        let last = def.params.last().unwrap();
        assert_eq!(last.name, "positional_args");
        assert_eq!(last.ty, ParamType::StringArray);
        assert!(!last.required);
        assert!(matches!(last.binding, ParamBinding::Positional));
    }

    #[test]
    fn overlong_name_rejected() {
        let long_path = format!("app {}", "x".repeat(70));
        let err = build_tool_definition(&node(&long_path, vec![])).unwrap_err();
        assert!(matches!(err, BridgeError::NameTooLong { .. }));
    }
}
