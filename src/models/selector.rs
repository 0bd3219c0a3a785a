//! Model selection and parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParleyError;

/// A gateway model selector of the form `provider/model_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelSelector {
    provider: String,
    model_id: String,
}

impl ModelSelector {
    /// Parse "provider/model_id".
    ///
    /// Examples: "openai/gpt-4o", "perplexity/sonar", "xai/grok-4.1-fast-reasoning"
    pub fn parse(s: &str) -> Result<Self, ParleyError> {
        let (provider, model_id) = s.trim().split_once('/').ok_or_else(|| {
            ParleyError::MalformedRequest(format!(
                "Invalid model selector '{s}': expected 'provider/model_id'"
            ))
        })?;
        if provider.is_empty() || model_id.is_empty() {
            return Err(ParleyError::MalformedRequest(format!(
                "Invalid model selector '{s}': provider and model id must not be empty"
            )));
        }
        Ok(Self {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model_id)
    }
}

impl FromStr for ModelSelector {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModelSelector {
    type Error = ParleyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ModelSelector> for String {
    fn from(selector: ModelSelector) -> Self {
        selector.to_string()
    }
}
