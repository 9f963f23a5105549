use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::data_models::{Role, SearchRequest};
use crate::search::{SEARCH_TOOL_DESCRIPTION, SEARCH_TOOL_NAME, SearchTool};

/// What a caller is told about a tool: enough to request it, not to run it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSignature {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub signature: ToolSignature,
    pub handler: Arc<SearchTool>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<SearchTool>,
    ) -> ToolDescriptor {
        ToolDescriptor {
            signature: ToolSignature {
                name: name.into(),
                description: description.into(),
                parameters: SearchRequest::json_schema(),
            },
            handler,
        }
    }

    /// The `tavily_search` tool backed by `handler`.
    pub fn web_search(handler: Arc<SearchTool>) -> ToolDescriptor {
        Self::new(SEARCH_TOOL_NAME, SEARCH_TOOL_DESCRIPTION, handler)
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }
}

struct Binding {
    descriptor: ToolDescriptor,
    caller: Role,
    executor: Role,
}

/// Name to tool mapping, written at startup and read-only after that.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Binding>,
}

impl ToolRegistry {
    pub fn new() -> ToolRegistry {
        ToolRegistry::default()
    }

    /// Make `tool` visible to `caller` and executable only by `executor`.
    /// Registering a name twice replaces the earlier descriptor.
    pub fn register(&mut self, tool: ToolDescriptor, caller: Role, executor: Role) {
        let name = tool.name().to_string();
        let previous = self.tools.insert(
            name.clone(),
            Binding {
                descriptor: tool,
                caller,
                executor,
            },
        );
        if previous.is_some() {
            tracing::debug!("tool {name} re-registered, replacing previous descriptor");
        }
    }

    /// Signatures of every tool `role` may ask for, sorted by name.
    pub fn signatures_for(&self, role: Role) -> Vec<ToolSignature> {
        let mut signatures = self
            .tools
            .values()
            .filter(|b| b.caller == role)
            .map(|b| b.descriptor.signature.clone())
            .collect::<Vec<ToolSignature>>();
        signatures.sort_by(|a, b| a.name.cmp(&b.name));
        signatures
    }

    /// The handler for `name`, if `role` is the one allowed to run it.
    pub fn handler_for(&self, name: &str, role: Role) -> Option<Arc<SearchTool>> {
        self.tools
            .get(name)
            .filter(|b| b.executor == role)
            .map(|b| b.descriptor.handler.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
