//! `[[name]]` placeholder substitution
//!
//! The document is serialized to YAML text, every `[[name]]` whose name is a
//! known template variable is replaced, and the text is parsed again.
//! Placeholders with unknown names stay as written. If the replaced text is
//! no longer valid YAML the request fails.

use async_trait::async_trait;
use indexmap::IndexMap;
use log::debug;
use regex::{Captures, Regex};
use serde_yaml::Value;

use super::Stage;
use crate::error::{Error, Result};

const PLACEHOLDER: &str = r"\[\[([A-Za-z0-9_]+)\]\]";

pub struct Variables {
    values: IndexMap<String, String>,
    pattern: Regex,
}

impl Variables {
    pub fn new(values: IndexMap<String, String>) -> Result<Self> {
        Ok(Self {
            values,
            pattern: Regex::new(PLACEHOLDER)?,
        })
    }

    /// Replace known placeholders in `text`
    pub fn substitute(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| match self.values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

#[async_trait]
impl Stage for Variables {
    fn name(&self) -> &'static str {
        "variables"
    }

    async fn apply(&self, config: Value) -> Result<Value> {
        let text = serde_yaml::to_string(&config)?;
        if !self.pattern.is_match(&text) {
            return Ok(config);
        }

        let substituted = self.substitute(&text);
        debug!("Substituted template variables");
        serde_yaml::from_str(&substituted).map_err(|err| Error::Substitution {
            message: err.to_string(),
        })
    }
}
