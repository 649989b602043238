use serde_json::{json, Value};

const FENCE: &str = "```";

/// What the structuring service handed back, after cleanup.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResult {
    Parsed(Value),
    /// The output was not valid json; the cleaned text is kept as-is.
    RawOutput(String),
}

impl StructuredResult {
    pub fn is_parsed(&self) -> bool {
        matches!(self, StructuredResult::Parsed(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            StructuredResult::Parsed(value) => value,
            StructuredResult::RawOutput(raw_output) => json!({ "raw_output": raw_output }),
        }
    }
}

/// Removes a markdown code fence around the response, if there is one.
///
/// The opening line is dropped whatever language tag it carries. The closing
/// line is only dropped when it is a bare fence. Text that does not start
/// with a fence is returned unchanged.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with(FENCE) {
        return text.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().is_some_and(|line| line.trim() == FENCE) {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

pub fn normalize(raw_response: &str) -> StructuredResult {
    let stripped = strip_code_fence(raw_response);

    match serde_json::from_str::<Value>(&stripped) {
        Ok(value) => StructuredResult::Parsed(value),
        Err(e) => {
            log::debug!("Structuring output is not json ({}), keeping raw text", e);
            StructuredResult::RawOutput(stripped)
        }
    }
}
