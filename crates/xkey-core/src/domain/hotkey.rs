//! Hotkey definitions and window filters.
//!
//! A [`HotkeyItem`] is a key plus a set of modifiers, optionally restricted
//! to windows whose title or class matches a [`WindowFilter`].  Items without
//! a filter are *global* and are grabbed on the root window.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::keymap::{Key, Modifier};

/// Error returned when a window filter pattern does not compile.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid window filter {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Title and class of a window, as resolved by the window information
/// resolver.  Both are empty strings when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowInfo {
    /// `_NET_WM_VISIBLE_NAME`, `_NET_WM_NAME` or `WM_NAME`.
    pub title: String,
    /// `WM_CLASS` formatted as `"instance.class"`.
    pub class: String,
}

impl WindowInfo {
    pub fn new(title: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            class: class.into(),
        }
    }

    /// Returns `true` when neither title nor class is known.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.class.is_empty()
    }
}

/// A regular expression matched against the start of a window's title or
/// class.
#[derive(Clone)]
pub struct WindowFilter {
    pattern: String,
    regex: Regex,
}

impl WindowFilter {
    /// Compiles `pattern`, anchored at the start of the subject.
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let regex = Regex::new(&format!(r"\A(?:{pattern})")).map_err(|source| {
            FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written by the user.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` when the pattern matches the start of the title or of
    /// the class.
    pub fn matches(&self, info: &WindowInfo) -> bool {
        self.regex.is_match(&info.title) || self.regex.is_match(&info.class)
    }
}

impl PartialEq for WindowFilter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for WindowFilter {}

impl fmt::Debug for WindowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WindowFilter").field(&self.pattern).finish()
    }
}

impl Serialize for WindowFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

impl<'de> Deserialize<'de> for WindowFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        WindowFilter::new(&s).map_err(serde::de::Error::custom)
    }
}

fn default_enabled() -> bool {
    true
}

/// A key combination the engine grabs and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyItem {
    pub key: Key,
    #[serde(default)]
    pub modifiers: BTreeSet<Modifier>,
    #[serde(default)]
    pub filter: Option<WindowFilter>,
    /// When set, every descendant of a matching window is grabbed too.
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl HotkeyItem {
    /// Creates an enabled global item.
    pub fn new(key: Key, modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        Self {
            key,
            modifiers: modifiers.into_iter().collect(),
            filter: None,
            recursive: false,
            enabled: true,
        }
    }

    /// Restricts the item to windows matching `filter`.
    pub fn with_filter(mut self, filter: WindowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns `true` for items without a window filter.
    pub fn is_global(&self) -> bool {
        self.filter.is_none()
    }

    pub fn requires(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    /// Returns `true` when the item applies to a window with `info`.
    ///
    /// Global items apply everywhere.
    pub fn applies_to(&self, info: &WindowInfo) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(info))
    }
}

impl fmt::Display for HotkeyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{m}+")?;
        }
        write!(f, "{}", self.key)?;
        if let Some(filter) = &self.filter {
            write!(f, " [{}]", filter.pattern())?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
