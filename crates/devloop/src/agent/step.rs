//! The model's structured reply: one step per round

use serde_json::Value;
use thiserror::Error;

/// One unit of the model's reasoning
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Plan { content: String },
    Action { content: String, tool: String, input: Value },
    Observe { content: String },
    Complete { content: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// Not a JSON object, or no string `step` field
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// A `step` value outside plan/action/observe/complete
    #[error("unrecognized step '{0}'")]
    UnknownTag(String),
}

impl Step {
    /// Parse a raw completion into a step
    pub fn parse(raw: &str) -> Result<Step, StepError> {
        let value: Value = match serde_json::from_str(raw.trim()) {
            Ok(value) => value,
            Err(e) => {
                let body = extract_json_from_markdown(raw)
                    .ok_or_else(|| StepError::Malformed(e.to_string()))?;
                serde_json::from_str(body).map_err(|e| StepError::Malformed(e.to_string()))?
            }
        };
        let Value::Object(mut fields) = value else {
            return Err(StepError::Malformed("reply is not a JSON object".to_string()));
        };

        let tag = match fields.get("step") {
            Some(Value::String(tag)) => tag.trim().to_ascii_lowercase(),
            Some(_) => return Err(StepError::Malformed("`step` is not a string".to_string())),
            None => return Err(StepError::Malformed("missing `step` field".to_string())),
        };

        let content = match fields.remove("content") {
            Some(Value::String(text)) => text,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        match tag.as_str() {
            "plan" => Ok(Step::Plan { content }),
            "observe" => Ok(Step::Observe { content }),
            "complete" => Ok(Step::Complete { content }),
            "action" => {
                let tool = match fields.remove("tool") {
                    Some(Value::String(name)) => name,
                    _ => String::new(),
                };
                let input = fields.remove("input").unwrap_or(Value::Null);
                Ok(Step::Action { content, tool, input })
            }
            _ => Err(StepError::UnknownTag(tag)),
        }
    }

    /// Wire tag of this step
    pub fn tag(&self) -> &'static str {
        match self {
            Step::Plan { .. } => "plan",
            Step::Action { .. } => "action",
            Step::Observe { .. } => "observe",
            Step::Complete { .. } => "complete",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Step::Plan { content }
            | Step::Action { content, .. }
            | Step::Observe { content }
            | Step::Complete { content } => content,
        }
    }
}

/// Pull the body out of a ```json fenced block, if the reply has one.
/// The closing fence is the last one, so fences inside string values survive.
fn extract_json_from_markdown(content: &str) -> Option<&str> {
    let patterns = ["```json\n", "```JSON\n", "```\n"];

    for pattern in patterns {
        if let Some(start) = content.find(pattern) {
            let json_start = start + pattern.len();
            if let Some(end) = content[json_start..].rfind("```") {
                return Some(content[json_start..json_start + end].trim());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plan() {
        let step = Step::parse(r#"{"step": "plan", "content": "Create the folder first"}"#).unwrap();
        assert_eq!(
            step,
            Step::Plan {
                content: "Create the folder first".to_string()
            }
        );
    }

    #[test]
    fn test_parse_action_with_mapping_input() {
        let step = Step::parse(
            r#"{"step": "action", "content": "write it", "tool": "write_file", "input": {"path": "hello.txt", "content": "Hello"}}"#,
        )
        .unwrap();

        match step {
            Step::Action { tool, input, .. } => {
                assert_eq!(tool, "write_file");
                assert_eq!(input, json!({"path": "hello.txt", "content": "Hello"}));
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_without_tool() {
        let step = Step::parse(r#"{"step": "action", "content": "?"}"#).unwrap();
        assert_eq!(
            step,
            Step::Action {
                content: "?".to_string(),
                tool: String::new(),
                input: Value::Null
            }
        );
    }

    #[test]
    fn test_parse_fenced_reply() {
        let raw = "```json\n{\"step\": \"complete\", \"content\": \"done\"}\n```";
        assert_eq!(Step::parse(raw).unwrap().tag(), "complete");
    }

    #[test]
    fn test_parse_fenced_reply_with_nested_fence_in_content() {
        let raw = "```json\n{\"step\": \"action\", \"content\": \"readme\", \"tool\": \"write_file\", \
                   \"input\": {\"path\": \"README.md\", \"content\": \"# App\\n```bash\\nnpm start\\n```\\n\"}}\n```";

        match Step::parse(raw).unwrap() {
            Step::Action { tool, input, .. } => {
                assert_eq!(tool, "write_file");
                assert_eq!(input["content"], "# App\n```bash\nnpm start\n```\n");
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_json_containing_fences() {
        let raw = r#"{"step": "observe", "content": "see ```json\n{}\n``` above"}"#;
        assert_eq!(Step::parse(raw).unwrap().content(), "see ```json\n{}\n``` above");
    }

    #[test]
    fn test_parse_not_json_is_malformed() {
        assert!(matches!(
            Step::parse("Sure! I'll start by creating a folder."),
            Err(StepError::Malformed(_))
        ));
        assert!(matches!(Step::parse("[1, 2]"), Err(StepError::Malformed(_))));
    }

    #[test]
    fn test_parse_missing_step_is_malformed() {
        assert_eq!(
            Step::parse(r#"{"content": "hi"}"#),
            Err(StepError::Malformed("missing `step` field".to_string()))
        );
    }

    #[test]
    fn test_parse_unknown_tag() {
        assert_eq!(
            Step::parse(r#"{"step": "celebrate", "content": "yay"}"#),
            Err(StepError::UnknownTag("celebrate".to_string()))
        );
    }

    #[test]
    fn test_missing_content_defaults_to_empty() {
        assert_eq!(Step::parse(r#"{"step": "observe"}"#).unwrap().content(), "");
    }
}
