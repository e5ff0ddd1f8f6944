//! Message aggregation
//!
//! Recipes add free-text notes under `messages`. They are prefixed and
//! appended, one per line, to cloud-init's `final_message`; `messages` itself
//! is removed since cloud-init does not know it.

use async_trait::async_trait;
use serde_yaml::Value;

use super::{as_mapping_mut, take_list, Stage};
use crate::error::Result;

pub struct Messages {
    prefix: String,
}

impl Messages {
    pub fn new(prefix: String) -> Self {
        Self { prefix }
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Stage for Messages {
    fn name(&self) -> &'static str {
        "messages"
    }

    async fn apply(&self, mut config: Value) -> Result<Value> {
        let Some(root) = as_mapping_mut(&mut config) else {
            return Ok(config);
        };
        let Some(messages) = take_list(root, "messages")? else {
            return Ok(config);
        };

        let mut lines: Vec<String> = root
            .get("final_message")
            .and_then(message_text)
            .filter(|text| !text.is_empty())
            .into_iter()
            .collect();
        lines.extend(
            messages
                .iter()
                .filter_map(message_text)
                .map(|text| format!("{}{}", self.prefix, text)),
        );

        if !lines.is_empty() {
            root.insert(Value::from("final_message"), Value::from(lines.join("\n")));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> Messages {
        Messages::new("* ".to_string())
    }

    #[tokio::test]
    async fn test_appends_to_final_message() {
        let config: Value = serde_yaml::from_str(
            "final_message: Provisioned in $UPTIME seconds\nmessages:\n  - Docker is installed\n  - Reboot required\n",
        )
        .unwrap();
        let result = stage().apply(config).await.unwrap();
        assert!(result.get("messages").is_none());
        assert_eq!(
            result["final_message"].as_str(),
            Some("Provisioned in $UPTIME seconds\n* Docker is installed\n* Reboot required")
        );
    }

    #[tokio::test]
    async fn test_without_final_message() {
        let config: Value = serde_yaml::from_str("messages: [hello]").unwrap();
        let result = stage().apply(config).await.unwrap();
        assert_eq!(result["final_message"].as_str(), Some("* hello"));
    }

    #[tokio::test]
    async fn test_empty_messages_removed() {
        let config: Value = serde_yaml::from_str("messages: []\nruncmd: [x]").unwrap();
        let result = stage().apply(config).await.unwrap();
        let expected: Value = serde_yaml::from_str("runcmd: [x]").unwrap();
        assert_eq!(result, expected);
    }
}
