use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// A request for illustrations: what to look for and how many images to keep.
///
/// Built once and never mutated; `query_string` is the text sent to the
/// search engine and also names the per-query download directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    topic: String,
    keywords: String,
    requested_count: usize,
}

impl SearchQuery {
    /// Build a query from a topic and free-form keywords.
    ///
    /// Both parts are NFC-normalized and whitespace-collapsed so that the same
    /// words always map to the same directory. Fails only when both parts are
    /// blank.
    pub fn new(topic: &str, keywords: &str, requested_count: usize) -> Result<Self, ModelError> {
        let topic = normalize(topic);
        let keywords = normalize(keywords);
        if topic.is_empty() && keywords.is_empty() {
            return Err(ModelError::EmptyQuery);
        }
        Ok(Self {
            topic,
            keywords,
            requested_count,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    pub fn requested_count(&self) -> usize {
        self.requested_count
    }

    /// The combined `"<topic> <keywords>"` search string.
    pub fn query_string(&self) -> String {
        match (self.topic.is_empty(), self.keywords.is_empty()) {
            (false, false) => format!("{} {}", self.topic, self.keywords),
            (false, true) => self.topic.clone(),
            _ => self.keywords.clone(),
        }
    }
}

fn normalize(input: &str) -> String {
    let nfc: String = input.nfc().collect();
    nfc.split_whitespace().collect::<Vec<_>>().join(" ")
}
