//! Idempotent directory creation

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{PathInput, Tool, ToolContext, ToolError, ToolOutput};

/// Creates a directory and any missing parents; succeeds if it already exists
pub struct CreateFolderTool;

#[async_trait]
impl Tool for CreateFolderTool {
    fn name(&self) -> &str {
        "create_folder"
    }

    fn description(&self) -> &str {
        "Create a folder (and any missing parents). Succeeds if the folder already exists."
    }

    fn input_shape(&self) -> &str {
        "path: str"
    }

    async fn execute(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let path = PathInput::parse(self.name(), input)?;
        let target = ctx.resolve(&path);

        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|source| ToolError::Io {
                action: "failed to create folder",
                path: path.clone(),
                source,
            })?;

        Ok(ToolOutput::success(format!("Folder created: {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_folder_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());

        let first = CreateFolderTool.execute(&json!("app/src"), &ctx).await.unwrap();
        let second = CreateFolderTool.execute(&json!("app/src"), &ctx).await.unwrap();

        assert_eq!(first.text, "Folder created: app/src");
        assert_eq!(second, first);
        assert!(temp_dir.path().join("app/src").is_dir());
    }

    #[tokio::test]
    async fn test_create_folder_over_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("taken"), "x").unwrap();
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());

        let err = CreateFolderTool.execute(&json!({"path": "taken"}), &ctx).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to create folder taken"));
    }
}
