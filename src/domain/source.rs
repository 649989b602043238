use std::{collections::HashSet, fmt};

use itertools::Itertools;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Id,
    Class,
    Css,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Id => write!(f, "id"),
            SelectorKind::Class => write!(f, "class"),
            SelectorKind::Css => write!(f, "css"),
        }
    }
}

/// A single element lookup, already normalized for the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub kind: SelectorKind,
    pub value: String,
}

impl Locator {
    /// Builds a locator from a raw `(kind, value)` pair.
    ///
    /// A class lookup only accepts one class token, so `"a b c"` is rewritten
    /// into the compound css selector `".a.b.c"` keeping the token order.
    pub fn resolve(kind: SelectorKind, value: &str) -> Self {
        let tokens: Vec<&str> = value.split_whitespace().collect();

        match (kind, tokens.as_slice()) {
            (SelectorKind::Class, [_, _, ..]) => Locator {
                kind: SelectorKind::Css,
                value: tokens.iter().map(|t| format!(".{}", t)).join(""),
            },
            _ => Locator {
                kind,
                value: value.trim().to_string(),
            },
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Selector(Locator),
    /// Text of the parent container of the element with this id.
    HeadingAnchor {
        heading_id: String,
    },
}

/// A source as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub selector_type: Option<SelectorKind>,
    #[serde(default)]
    pub selector_value: Option<String>,
    #[serde(default)]
    pub heading_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: Url,
    pub strategy: ExtractionStrategy,
}

#[derive(Debug, Error, PartialEq)]
pub enum SourceConfigError {
    #[error("source `{name}` is listed more than once")]
    DuplicateName { name: String },
    #[error("source `{name}` has an invalid url `{url}`: {reason}")]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },
    #[error("source `{name}` sets both a selector and a heading id")]
    AmbiguousStrategy { name: String },
    #[error("source `{name}` sets neither a selector nor a heading id")]
    MissingStrategy { name: String },
    #[error("source `{name}` has a selector type but no selector value")]
    MissingSelectorValue { name: String },
    #[error("source `{name}` has a selector value but no selector type")]
    MissingSelectorType { name: String },
    #[error("source `{name}` has a blank {field}")]
    Blank { name: String, field: &'static str },
}

fn non_blank<'a>(
    name: &str,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, SourceConfigError> {
    match value.trim() {
        "" => Err(SourceConfigError::Blank {
            name: name.to_string(),
            field,
        }),
        v => Ok(v),
    }
}

pub fn resolve_strategy(source: &SourceSettings) -> Result<ExtractionStrategy, SourceConfigError> {
    let name = source.name.clone();

    match (
        source.selector_type,
        source.selector_value.as_deref(),
        source.heading_id.as_deref(),
    ) {
        (Some(kind), Some(value), None) => {
            let value = non_blank(&name, "selector_value", value)?;
            Ok(ExtractionStrategy::Selector(Locator::resolve(kind, value)))
        }
        (None, None, Some(heading_id)) => {
            let heading_id = non_blank(&name, "heading_id", heading_id)?;
            Ok(ExtractionStrategy::HeadingAnchor {
                heading_id: heading_id.to_string(),
            })
        }
        (None, None, None) => Err(SourceConfigError::MissingStrategy { name }),
        (_, _, Some(_)) => Err(SourceConfigError::AmbiguousStrategy { name }),
        (Some(_), None, None) => Err(SourceConfigError::MissingSelectorValue { name }),
        (None, Some(_), None) => Err(SourceConfigError::MissingSelectorType { name }),
    }
}

/// Resolves every configured source, keeping the list order.
pub fn resolve_sources(
    sources: &[SourceSettings],
) -> Result<Vec<SourceDescriptor>, SourceConfigError> {
    let mut seen = HashSet::new();

    sources
        .iter()
        .map(|source| {
            let name = non_blank(&source.name, "name", &source.name)?.to_string();
            if !seen.insert(name.clone()) {
                return Err(SourceConfigError::DuplicateName { name });
            }

            let url = Url::parse(source.url.trim()).map_err(|e| SourceConfigError::InvalidUrl {
                name: name.clone(),
                url: source.url.clone(),
                reason: e.to_string(),
            })?;

            Ok(SourceDescriptor {
                strategy: resolve_strategy(source)?,
                name,
                url,
            })
        })
        .collect()
}
