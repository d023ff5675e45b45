//! Tool registry: name -> capability, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::schema::ToolDeclaration;
use super::{RegistryError, Tool, ToolResult};
use crate::sandbox::RunContext;

struct RegisteredTool {
    declaration: ToolDeclaration,
    tool: Arc<dyn Tool>,
}

/// Registered tools in registration order, with normalized declarations.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    /// Normalize the tool's parameters and add it under its name.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateTool { tool_name: name });
        }

        let parameters = tool.parameters().normalize(&name)?;
        let declaration = ToolDeclaration {
            name: name.clone(),
            description: tool.description().to_string(),
            parameters,
        };

        self.by_name.insert(name, self.tools.len());
        self.tools.push(RegisteredTool { declaration, tool });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i].tool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.declaration.name.as_str()).collect()
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.declaration.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run `name` with `args`. Never fails: unknown names and internal tool
    /// errors come back as `ok=false` results.
    pub async fn invoke(&self, ctx: &RunContext, name: &str, args: &Map<String, Value>) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::failure(format!("Unknown tool: {name}"));
        };

        match tool.run(ctx, args).await {
            Ok(result) => result,
            Err(err) => {
                debug!(tool = name, error = %err, "tool failed");
                ToolResult::from_error(&err)
            }
        }
    }
}
