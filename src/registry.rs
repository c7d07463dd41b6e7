//! Tool registry: immutable name → definition mapping, in walker order.

use std::collections::HashMap;

use crate::error::BridgeError;
use crate::schema::ToolDefinition;

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build the registry. Fails on the first pair of definitions sharing a name.
    pub fn register(defs: Vec<ToolDefinition>) -> Result<Self, BridgeError> {
        let mut index = HashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            if let Some(&prev) = index.get(&def.name) {
                let first: &ToolDefinition = &defs[prev];
                return Err(BridgeError::DuplicateToolName {
                    name: def.name.clone(),
                    first: first.path.clone(),
                    second: def.path.clone(),
                });
            }
            index.insert(def.name.clone(), i);
        }
        Ok(ToolRegistry { tools: defs, index })
    }

    /// All tools, in the order they were registered.
    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
