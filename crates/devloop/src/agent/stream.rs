//! `--output-format stream-json` events from the agent CLI.

use serde::Deserialize;
use serde_json::Value;

/// One line of the agent's event stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum StreamEvent {
    Assistant {
        message: AssistantMessage,
    },
    User {},
    Result {
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
    },
    System {},
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentBlock {
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

const MAX_COMMAND_CHARS: usize = 120;

fn input_str<'a>(input: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|key| input.get(key).and_then(Value::as_str))
        .unwrap_or("?")
}

/// One progress line for a tool call.
pub(crate) fn describe_tool_use(name: &str, input: &Value) -> String {
    match name {
        "Read" => format!("Read {}", input_str(input, &["file_path", "path"])),
        "Write" => format!("Write {}", input_str(input, &["file_path", "path"])),
        "Edit" => format!("Edit {}", input_str(input, &["file_path", "path"])),
        name if name.starts_with("Bash") => {
            let command = input_str(input, &["command", "cmd"]);
            if command.chars().count() > MAX_COMMAND_CHARS {
                let cut: String = command.chars().take(MAX_COMMAND_CHARS).collect();
                format!("$ {cut}...")
            } else {
                format!("$ {command}")
            }
        }
        other => other.to_string(),
    }
}
