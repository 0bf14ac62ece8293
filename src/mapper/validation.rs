//! Field-scoped validation.
//!
//! [`Rules`] checks a JSON value against ordered per-field rules and yields
//! a list of [`ValidationIssue`]s. [`map_issues`] walks that list into the
//! `fieldErrors` of a `VALIDATION_FAILED` model.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorModel, FieldErrors};

/// Field key used for issues that are not attached to any field.
pub const FORM_FIELD: &str = "_form";

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: Vec<String>,
    pub message: String,
}

impl ValidationIssue {
    /// `path` is dotted, e.g. `address.zip`.
    pub fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            message: message.into(),
        }
    }

    pub fn field(&self) -> String {
        if self.path.is_empty() {
            FORM_FIELD.to_string()
        } else {
            self.path.join(".")
        }
    }
}

/// A single field check.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Email,
    MinLength(usize),
    MaxLength(usize),
    Pattern { regex: Regex, message: String },
}

impl Rule {
    pub fn pattern(regex: Regex, message: impl Into<String>) -> Self {
        Self::Pattern {
            regex,
            message: message.into(),
        }
    }

    /// `None` when the value passes. Only `Required` rejects a missing value.
    fn check(&self, value: Option<&Value>) -> Option<String> {
        match self {
            Rule::Required => is_blank(value).then(|| "required".to_string()),
            Rule::Email => {
                let text = non_empty_str(value)?;
                match email_regex() {
                    Some(regex) if !regex.is_match(text) => Some("invalid email".to_string()),
                    _ => None,
                }
            }
            Rule::MinLength(min) => {
                let text = non_empty_str(value)?;
                (text.chars().count() < *min)
                    .then(|| format!("must be at least {min} characters"))
            }
            Rule::MaxLength(max) => {
                let text = non_empty_str(value)?;
                (text.chars().count() > *max)
                    .then(|| format!("must be at most {max} characters"))
            }
            Rule::Pattern { regex, message } => {
                let text = non_empty_str(value)?;
                (!regex.is_match(text)).then(|| message.clone())
            }
        }
    }
}

/// Ordered per-field rules.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `rule` for the dotted `path`. Rules run in insertion order.
    pub fn field(mut self, path: impl Into<String>, rule: Rule) -> Self {
        let path = path.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == path) {
            Some((_, rules)) => rules.push(rule),
            None => self.fields.push((path, vec![rule])),
        }
        self
    }

    /// Every failed check, in field then rule order.
    pub fn check(&self, input: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for (path, rules) in &self.fields {
            let value = lookup_path(input, path);
            for rule in rules {
                if let Some(message) = rule.check(value) {
                    issues.push(ValidationIssue::new(path, message));
                }
            }
        }
        issues
    }

    pub fn validate(&self, input: &Value) -> Result<(), ErrorModel> {
        let issues = self.check(input);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(map_issues(issues))
        }
    }
}

/// Build a `VALIDATION_FAILED` model. The first issue per field wins.
pub fn map_issues(issues: Vec<ValidationIssue>) -> ErrorModel {
    let field_errors: FieldErrors = issues
        .into_iter()
        .map(|issue| (issue.field(), issue.message))
        .collect();
    ErrorModel::validation(field_errors)
}

fn lookup_path<'a>(input: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(input, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}
