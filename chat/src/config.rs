use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::COMMAND_PREFIX;
use crate::error::Result;
use crate::frame::CHAT_TAG;

/// Runtime settings for the chat protocol and its console.
///
/// Every field is optional in JSON and falls back to its default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Character that marks a console line as a command.
    pub command_prefix: char,
    /// Frame tag carrying chat text.
    pub chat_tag: u64,
    /// Prompt written before each console read.
    pub prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            command_prefix: COMMAND_PREFIX,
            chat_tag: CHAT_TAG,
            prompt: "> ".into(),
        }
    }
}

impl ChatConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    #[test]
    fn empty_object_uses_defaults() {
        assert_eq!(ChatConfig::from_json("{}").unwrap(), ChatConfig::default());
    }

    #[test]
    fn fields_override() {
        let config = ChatConfig::from_json(r#"{"command_prefix": "!", "prompt": ""}"#).unwrap();
        assert_eq!(config.command_prefix, '!');
        assert_eq!(config.chat_tag, CHAT_TAG);
        assert!(config.prompt.is_empty());
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(ChatConfig::from_json("{"), Err(ChatError::Config(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ChatConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ChatError::Io(_)));
    }
}
