use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything persisted between runs.
///
/// `scraped_sources` is the idempotency flag per source name and `data` keeps
/// every structured result produced for that source, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub scraped_sources: HashMap<String, bool>,
    #[serde(default)]
    pub data: HashMap<String, Vec<Value>>,
}

impl Context {
    pub fn was_scraped(&self, name: &str) -> bool {
        self.scraped_sources.get(name).copied().unwrap_or(false)
    }

    pub fn mark_scraped(&mut self, name: &str) {
        self.scraped_sources.insert(name.to_string(), true);
    }

    pub fn append_result(&mut self, name: &str, result: Value) {
        self.data.entry(name.to_string()).or_default().push(result);
    }

    pub fn results(&self, name: &str) -> &[Value] {
        self.data.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends the result and sets the flag in one step, so a flagged source
    /// always has at least one stored result.
    pub fn complete(&mut self, name: &str, result: Value) {
        self.append_result(name, result);
        self.mark_scraped(name);
    }
}
