//! Message classification: ordered rule table, first match wins.
//!
//! A [`Classifier`] holds the rule table for the lifetime of a pipeline.  It
//! is built before hooks go live and never mutated afterwards, so evaluation
//! needs no locking.  Evaluation walks the table in order and stops at the
//! first rule whose matcher accepts the message; later rules are shadowed.
//! Tables are small (tens of entries) so the linear scan is the right shape.
//!
//! Rules come from two places:
//!
//! - [`RuleSpec`]: the serde form used by the TOML configuration.  Message
//!   codes may be written as integers or catalog names.
//! - [`ClassificationRule`] built in code, which additionally allows
//!   predicate matchers and custom extractors.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog;
use crate::domain::codes::*;
use crate::domain::message::{Category, RawMessage};

use super::translate::Extractor;

/// Error type for building rules from configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("unknown message name: {0}")]
    UnknownMessageName(String),
    #[error("unknown extractor: {0}")]
    UnknownExtractor(String),
    #[error("empty code range {start:#06x}..{end:#06x}")]
    EmptyRange { start: u32, end: u32 },
    #[error("rule category must not be empty")]
    EmptyCategory,
    /// `wparam` only applies to single-code rules.
    #[error("wparam {wparam:#x} cannot be combined with code range {start:#06x}..{end:#06x}")]
    WParamWithRange { start: u32, end: u32, wparam: u64 },
}

/// User-supplied match predicate.
pub type MatchFn = dyn Fn(&RawMessage) -> bool + Send + Sync;

/// Decides whether a rule applies to a message.
#[derive(Clone)]
pub enum MessageMatcher {
    /// Exact message code.
    Code(u32),
    /// Code in `start..end`.
    CodeRange { start: u32, end: u32 },
    /// Exact message code and exact `wParam`.
    CodeWithWParam { code: u32, wparam: usize },
    /// Arbitrary predicate.  Must be side-effect free.
    Predicate(Arc<MatchFn>),
}

impl MessageMatcher {
    #[inline]
    pub fn matches(&self, raw: &RawMessage) -> bool {
        match self {
            Self::Code(code) => raw.code == *code,
            Self::CodeRange { start, end } => (*start..*end).contains(&raw.code),
            Self::CodeWithWParam { code, wparam } => raw.code == *code && raw.wparam == *wparam,
            Self::Predicate(f) => f(raw),
        }
    }
}

impl fmt::Debug for MessageMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "Code({code:#06x})"),
            Self::CodeRange { start, end } => write!(f, "CodeRange({start:#06x}..{end:#06x})"),
            Self::CodeWithWParam { code, wparam } => {
                write!(f, "CodeWithWParam({code:#06x}, {wparam:#x})")
            }
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// One entry of the rule table.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub matcher: MessageMatcher,
    pub category: Category,
    pub extractor: Extractor,
}

impl ClassificationRule {
    pub fn new(matcher: MessageMatcher, category: impl Into<Category>, extractor: Extractor) -> Self {
        Self {
            matcher,
            category: category.into(),
            extractor,
        }
    }

    /// Shorthand for an exact-code rule.
    pub fn for_code(code: u32, category: impl Into<Category>, extractor: Extractor) -> Self {
        Self::new(MessageMatcher::Code(code), category, extractor)
    }
}

/// Result of a successful classification, borrowing from the rule table.
#[derive(Debug, Clone, Copy)]
pub struct Classification<'a> {
    pub category: &'a Category,
    pub extractor: &'a Extractor,
    /// Position of the matching rule in the table.
    pub rule_index: usize,
}

/// Ordered, read-only rule table.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Classifier over [`default_rule_specs`].
    pub fn with_default_rules() -> Self {
        // The built-in specs only reference catalog names and extractor names
        // defined in this crate; a failure here is caught by the unit tests.
        Self::from_specs(&default_rule_specs()).unwrap_or_default()
    }

    /// Builds a classifier from configuration specs, preserving order.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, RuleError> {
        let rules = specs.iter().map(RuleSpec::to_rule).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Returns the first rule matching `raw`, or `None`.
    pub fn classify(&self, raw: &RawMessage) -> Option<Classification<'_>> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matcher.matches(raw))
            .map(|(rule_index, rule)| Classification {
                category: &rule.category,
                extractor: &rule.extractor,
                rule_index,
            })
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Distinct categories in table order.
    pub fn categories(&self) -> Vec<Category> {
        let mut seen = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&rule.category) {
                seen.push(rule.category.clone());
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ── Configuration form ────────────────────────────────────────────────────────

/// A message code as written in configuration: `0x219`, `537`,
/// `"WM_DEVICECHANGE"` or `"0x0219"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeSpec {
    Numeric(u32),
    Named(String),
}

impl CodeSpec {
    pub fn resolve(&self) -> Result<u32, RuleError> {
        match self {
            Self::Numeric(code) => Ok(*code),
            Self::Named(name) => {
                let trimmed = name.trim();
                if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                    return u32::from_str_radix(hex, 16)
                        .map_err(|_| RuleError::UnknownMessageName(name.clone()));
                }
                catalog::code_by_name(trimmed).ok_or_else(|| RuleError::UnknownMessageName(name.clone()))
            }
        }
    }
}

impl From<&str> for CodeSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<u32> for CodeSpec {
    fn from(code: u32) -> Self {
        Self::Numeric(code)
    }
}

/// Serde form of a [`ClassificationRule`].
///
/// `code_end` and `wparam` are mutually exclusive: a rule matches either a
/// code range or one code with one `wParam`.
///
/// ```toml
/// [[rules]]
/// code = "WM_DEVICECHANGE"
/// category = "DeviceChange"
/// extract = "device_change"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub code: CodeSpec,
    /// When set, the rule matches `code..code_end`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_end: Option<CodeSpec>,
    /// When set, the rule also requires this exact `wParam`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wparam: Option<u64>,
    pub category: String,
    #[serde(default = "default_extract")]
    pub extract: String,
}

fn default_extract() -> String {
    "raw".to_string()
}

impl RuleSpec {
    pub fn new(code: impl Into<CodeSpec>, category: &str, extract: &str) -> Self {
        Self {
            code: code.into(),
            code_end: None,
            wparam: None,
            category: category.to_string(),
            extract: extract.to_string(),
        }
    }

    /// Resolves names and builds the runtime rule.
    pub fn to_rule(&self) -> Result<ClassificationRule, RuleError> {
        if self.category.trim().is_empty() {
            return Err(RuleError::EmptyCategory);
        }
        let code = self.code.resolve()?;
        let extractor: Extractor = self.extract.parse()?;

        let matcher = match (&self.code_end, self.wparam) {
            (Some(end), wparam) => {
                let end = end.resolve()?;
                if end <= code {
                    return Err(RuleError::EmptyRange { start: code, end });
                }
                if let Some(wparam) = wparam {
                    return Err(RuleError::WParamWithRange { start: code, end, wparam });
                }
                MessageMatcher::CodeRange { start: code, end }
            }
            (None, Some(wparam)) => MessageMatcher::CodeWithWParam {
                code,
                wparam: wparam as usize,
            },
            (None, None) => MessageMatcher::Code(code),
        };

        Ok(ClassificationRule::new(matcher, self.category.trim(), extractor))
    }
}

/// Built-in rule table covering system and window-level notifications.
pub fn default_rule_specs() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new("WM_DEVICECHANGE", Category::DEVICE_CHANGE, "device_change"),
        RuleSpec::new("WM_POWERBROADCAST", Category::POWER_EVENT, "power"),
        RuleSpec::new("WM_DISPLAYCHANGE", Category::DISPLAY_CHANGE, "display"),
        RuleSpec::new("WM_DPICHANGED", Category::DPI_CHANGE, "dpi"),
        RuleSpec::new("WM_WTSSESSION_CHANGE", Category::SESSION_CHANGE, "session"),
        RuleSpec::new("WM_ACTIVATE", Category::ACTIVATION, "activation"),
        RuleSpec::new("WM_ACTIVATEAPP", Category::ACTIVATION, "activation"),
        RuleSpec::new("WM_SETFOCUS", Category::FOCUS, "focus"),
        RuleSpec::new("WM_KILLFOCUS", Category::FOCUS, "focus"),
        RuleSpec::new("WM_CLOSE", Category::CLOSE_REQUEST, "close"),
        RuleSpec::new("WM_QUIT", Category::QUIT_REQUEST, "quit"),
        RuleSpec::new("WM_QUERYENDSESSION", Category::END_SESSION, "end_session"),
        RuleSpec::new("WM_ENDSESSION", Category::END_SESSION, "end_session"),
        RuleSpec::new("WM_SIZE", Category::WINDOW_SIZE, "size"),
        RuleSpec::new("WM_SETTINGCHANGE", Category::SETTING_CHANGE, "raw"),
        RuleSpec::new("WM_THEMECHANGED", Category::SETTING_CHANGE, "raw"),
    ]
}
