//! Token usage tracking.

use serde::{Deserialize, Serialize};

/// Token usage for a generation step or a whole turn.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
}

impl Usage {
    /// Merge another usage into this one (accumulate).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        if let Some(v) = other.reasoning_tokens {
            *self.reasoning_tokens.get_or_insert(0) += v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates_steps() {
        let mut total = Usage::default();
        total.merge(&Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            reasoning_tokens: None,
        });
        total.merge(&Usage {
            input_tokens: 20,
            output_tokens: 7,
            total_tokens: 27,
            reasoning_tokens: Some(3),
        });
        assert_eq!(total.input_tokens, 30);
        assert_eq!(total.total_tokens, 42);
        assert_eq!(total.reasoning_tokens, Some(3));
    }
}
