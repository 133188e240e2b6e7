//! Tool dispatch: one named tool, one input, one uniform result

use serde_json::Value;
use tracing::{info, instrument, warn};

use super::registry::ToolRegistry;
use super::{ToolContext, ToolResult};

/// Executes tool calls against a fixed registry.
///
/// Dispatch never fails: unknown names, malformed inputs and capability errors
/// all come back as an unsuccessful [`ToolResult`] for the model to read.
pub struct ToolDispatcher {
    registry: ToolRegistry,
    ctx: ToolContext,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, ctx: ToolContext) -> Self {
        Self { registry, ctx }
    }

    /// Run `name` with `input`
    #[instrument(skip(self, input), fields(tool = %name))]
    pub async fn invoke(&self, name: &str, input: &Value) -> ToolResult {
        let tool = match self.registry.lookup(name) {
            Ok(t) => t,
            Err(e) => {
                warn!(tool = %name, "Model requested unknown tool");
                return ToolResult::from_error(name, input, &e);
            }
        };

        info!(tool = %name, "Executing tool");
        match tool.execute(input, &self.ctx).await {
            Ok(output) => {
                if output.success {
                    info!(tool = %name, output_len = output.text.len(), "Tool executed successfully");
                } else {
                    warn!(tool = %name, "Tool reported an unsuccessful outcome");
                }
                ToolResult::from_output(name, input, output)
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::from_error(name, input, &e)
            }
        }
    }

    /// Get a reference to the registry
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("registry", &self.registry)
            .field("working_dir", &self.ctx.working_dir)
            .finish()
    }
}
