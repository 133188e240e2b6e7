//! File write tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{parse_input, Tool, ToolContext, ToolError, ToolOutput};

#[derive(Debug, Deserialize)]
struct WriteFileInput {
    path: String,
    content: String,
}

/// Creates or overwrites a file with the given content
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing it if it exists. Missing parent folders are created."
    }

    fn input_shape(&self) -> &str {
        "{ path: str, content: str }"
    }

    async fn execute(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let WriteFileInput { path, content } = parse_input(self.name(), input)?;
        if path.trim().is_empty() {
            return Err(ToolError::invalid_input(self.name(), "path is empty"));
        }

        let target = ctx.resolve(&path);

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| ToolError::Io {
                        action: "failed to create parent folders for",
                        path: path.clone(),
                        source,
                    })?;
            }
        }

        tokio::fs::write(&target, content.as_bytes())
            .await
            .map_err(|source| ToolError::Io {
                action: "failed to write file",
                path: path.clone(),
                source,
            })?;

        Ok(ToolOutput::success(format!("File written: {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_file() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());

        let output = WriteFileTool
            .execute(&json!({"path": "hello.txt", "content": "Hello"}), &ctx)
            .await
            .unwrap();

        assert_eq!(output.text, "File written: hello.txt");
        assert_eq!(fs::read_to_string(temp_dir.path().join("hello.txt")).unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_write_file_overwrites_and_creates_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let file_path = temp_dir.path().join("a/b/c.txt");

        WriteFileTool
            .execute(&json!({"path": "a/b/c.txt", "content": "first"}), &ctx)
            .await
            .unwrap();
        WriteFileTool
            .execute(&json!({"path": "a/b/c.txt", "content": "second"}), &ctx)
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(file_path).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_write_file_missing_content_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let file_path = temp_dir.path().join("partial.txt");
        assert!(!file_path.exists());

        let err = WriteFileTool
            .execute(&json!({"path": "partial.txt"}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidInput { .. }));
        assert!(err.to_string().contains("content"));
        assert!(!file_path.exists());
    }

    #[tokio::test]
    async fn test_write_file_rejects_text_input() {
        let ctx = ToolContext::default();
        let err = WriteFileTool.execute(&json!("hello.txt"), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }
}
