//! `{{ env VAR }}` placeholders in host and port settings

use crate::errors::TemplateError;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Env(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = input;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| TemplateError::Unterminated(input.to_string()))?;
            let directive = after[..close].trim();

            let mut words = directive.split_whitespace();
            match (words.next(), words.next(), words.next()) {
                (Some("env"), Some(var), None) if crate::snapshot::is_variable_name(var) => {
                    segments.push(Segment::Env(var.to_string()));
                }
                _ => return Err(TemplateError::Unsupported(directive.to_string())),
            }
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(Self { segments })
    }

    /// Variables referenced, each once.
    pub fn vars(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Env(var) => Some(var.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    pub fn is_static(&self) -> bool {
        self.vars().is_empty()
    }

    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Env(var) => out.push_str(
                    values
                        .get(var)
                        .ok_or_else(|| TemplateError::Unset(var.clone()))?,
                ),
            }
        }
        Ok(out)
    }
}
