//! Claude Desktop configuration: register or unregister MCP servers.
//!
//! The file is `{"mcpServers": {name: {command, args, env}}, ...}`. Keys this
//! module does not know about are written back untouched. A missing file reads
//! as an empty document, and every write is preceded by a copy to
//! `<file>.backup`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const SERVERS_KEY: &str = "mcpServers";

/// How the host launches one MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ServerEntry {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        ServerEntry {
            command: command.into(),
            args,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DesktopConfig {
    path: PathBuf,
}

impl DesktopConfig {
    /// Platform default: `<config dir>/Claude/claude_desktop_config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| anyhow!("could not determine the user config directory"))?;
        Ok(base.join("Claude").join("claude_desktop_config.json"))
    }

    /// Use `path` when given, the platform default otherwise.
    pub fn locate(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => Self::default_path()?,
        };
        Ok(DesktopConfig { path })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        DesktopConfig { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name: OsString = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("claude_desktop_config.json"));
        name.push(".backup");
        self.path.with_file_name(name)
    }

    /// Copy the current file to its backup path. Returns `None` when there is
    /// nothing to back up yet.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let dest = self.backup_path();
        std::fs::copy(&self.path, &dest).with_context(|| {
            format!("failed to back up {} to {}", self.path.display(), dest.display())
        })?;
        tracing::debug!(backup = %dest.display(), "desktop config backed up");
        Ok(Some(dest))
    }

    pub fn list_servers(&self) -> Result<BTreeMap<String, ServerEntry>> {
        let doc = self.read()?;
        let Some(servers) = doc.get(SERVERS_KEY) else {
            return Ok(BTreeMap::new());
        };
        serde_json::from_value(servers.clone())
            .with_context(|| format!("malformed `{SERVERS_KEY}` in {}", self.path.display()))
    }

    pub fn has_server(&self, name: &str) -> Result<bool> {
        let doc = self.read()?;
        Ok(doc
            .get(SERVERS_KEY)
            .and_then(Value::as_object)
            .is_some_and(|s| s.contains_key(name)))
    }

    /// Insert or replace the entry for `name`.
    pub fn add_server(&self, name: &str, entry: &ServerEntry) -> Result<()> {
        if name.trim().is_empty() {
            bail!("server name must not be empty");
        }
        let mut doc = self.read()?;
        let servers = servers_mut(&mut doc, &self.path)?;
        let replaced = servers
            .insert(name.to_string(), serde_json::to_value(entry)?)
            .is_some();
        self.write(&doc)?;
        tracing::info!(name, replaced, path = %self.path.display(), "server registered");
        Ok(())
    }

    /// Remove the entry for `name`. Returns whether it was present; the file
    /// is left alone when it was not.
    pub fn remove_server(&self, name: &str) -> Result<bool> {
        let mut doc = self.read()?;
        let removed = servers_mut(&mut doc, &self.path)?.remove(name).is_some();
        if removed {
            self.write(&doc)?;
            tracing::info!(name, path = %self.path.display(), "server removed");
        }
        Ok(removed)
    }

    fn read(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => bail!("{} must contain a JSON object", self.path.display()),
        }
    }

    fn write(&self, doc: &Map<String, Value>) -> Result<()> {
        self.backup()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut body = serde_json::to_string_pretty(doc)?;
        body.push('\n');
        std::fs::write(&self.path, body)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

fn servers_mut<'a>(doc: &'a mut Map<String, Value>, path: &Path) -> Result<&'a mut Map<String, Value>> {
    doc.entry(SERVERS_KEY)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow!("`{SERVERS_KEY}` in {} is not an object", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_in(dir: &tempfile::TempDir) -> DesktopConfig {
        DesktopConfig::at(dir.path().join("Claude").join("claude_desktop_config.json"))
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(&dir);
        assert!(cfg.list_servers().unwrap().is_empty());
        assert!(!cfg.has_server("x").unwrap());
        assert_eq!(cfg.backup().unwrap(), None);
    }

    #[test]
    fn add_creates_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(&dir);
        cfg.add_server("demo", &ServerEntry::new("/usr/bin/demo", vec!["mcp".into(), "start".into()]))
            .unwrap();

        assert!(cfg.has_server("demo").unwrap());
        let written: Value = serde_json::from_str(&std::fs::read_to_string(cfg.path()).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"mcpServers": {"demo": {"command": "/usr/bin/demo", "args": ["mcp", "start"]}}})
        );
    }

    #[test]
    fn unknown_keys_survive_and_backup_is_taken() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(&dir);
        std::fs::create_dir_all(cfg.path().parent().unwrap()).unwrap();
        let original = json!({
            "theme": "dark",
            "mcpServers": {"other": {"command": "other", "args": [], "extra": 1}}
        });
        std::fs::write(cfg.path(), original.to_string()).unwrap();

        let mut entry = ServerEntry::new("demo", vec![]);
        entry.env.insert("RUST_LOG".into(), "debug".into());
        cfg.add_server("demo", &entry).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(cfg.path()).unwrap()).unwrap();
        assert_eq!(written["theme"], "dark");
        assert_eq!(written["mcpServers"]["other"]["extra"], 1);
        assert_eq!(written["mcpServers"]["demo"]["env"]["RUST_LOG"], "debug");

        let backup: Value =
            serde_json::from_str(&std::fs::read_to_string(cfg.backup_path()).unwrap()).unwrap();
        assert_eq!(backup, original);
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(&dir);
        cfg.add_server("a", &ServerEntry::new("a", vec![])).unwrap();
        cfg.add_server("b", &ServerEntry::new("b", vec![])).unwrap();

        assert!(cfg.remove_server("a").unwrap());
        assert!(!cfg.remove_server("a").unwrap());
        let names: Vec<String> = cfg.list_servers().unwrap().into_keys().collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn non_object_document_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let err = DesktopConfig::at(&path).add_server("x", &ServerEntry::new("x", vec![])).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn backup_path_appends_suffix() {
        let cfg = DesktopConfig::at("/tmp/claude/claude_desktop_config.json");
        assert_eq!(
            cfg.backup_path(),
            PathBuf::from("/tmp/claude/claude_desktop_config.json.backup")
        );
    }
}
