//! Source registry model
//!
//! This module defines the durable catalog of sync sources: their identity,
//! fetch/parse capabilities, scheduling cadence, and health bookkeeping. The
//! registry rows live in the store; only the upsert applier mutates them,
//! once per attempted sync, via [`Source::apply_outcome`].

mod source;

pub use source::{AttemptOutcome, Source, SourceFilter};

use serde::{Deserialize, Serialize};

/// Grouping of a source within the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    /// Traveling tour with an official schedule page (WSOP, WPT, ...)
    Tour,

    /// A single venue's tournament calendar
    Venue,

    /// Third-party listing site covering many venues
    Aggregator,
}

impl SourceCategory {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Tour => "tour",
            Self::Venue => "venue",
            Self::Aggregator => "aggregator",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "tour" => Some(Self::Tour),
            "venue" => Some(Self::Venue),
            "aggregator" => Some(Self::Aggregator),
            _ => None,
        }
    }
}

/// How raw content is retrieved for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStrategy {
    /// Plain HTTP GET; the markup is server-rendered
    Http,

    /// Script-rendered page; retrieved through the headless-render service
    Rendered,
}

impl FetchStrategy {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Rendered => "rendered",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Self::Http),
            "rendered" => Some(Self::Rendered),
            _ => None,
        }
    }
}

/// Which extraction rule turns raw content into event candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseRule {
    /// Schedule rendered as `<table>` rows
    HtmlTable,

    /// Schedule rendered as repeated card/list elements
    HtmlCards,

    /// Schedule embedded as a JSON block in the page
    EmbeddedJson,
}

impl ParseRule {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::HtmlTable => "html_table",
            Self::HtmlCards => "html_cards",
            Self::EmbeddedJson => "embedded_json",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "html_table" => Some(Self::HtmlTable),
            "html_cards" => Some(Self::HtmlCards),
            "embedded_json" => Some(Self::EmbeddedJson),
            _ => None,
        }
    }
}

/// Minimum inter-request spacing class for a source's host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitClass {
    Default,

    /// Slower spacing for hosts known to throttle aggressively
    Gentle,

    /// Tighter spacing for hosts that tolerate it
    Strict,
}

impl RateLimitClass {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Gentle => "gentle",
            Self::Strict => "strict",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "gentle" => Some(Self::Gentle),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Health of a source as maintained by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStatus {
    /// Last attempt succeeded (or the source has never been attempted)
    Healthy,

    /// Consecutive failures crossed the configured threshold
    Degraded,

    /// Operator-disabled; never selected in normal mode
    Disabled,
}

impl SourceStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Disabled => "disabled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "healthy" => Some(Self::Healthy),
            "degraded" => Some(Self::Degraded),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}
