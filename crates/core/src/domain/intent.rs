use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    Order,
    ProfileUpdate,
    Recommendation,
    Confirmation,
    Greeting,
    Help,
    AddToCart,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Order => "order",
            Self::ProfileUpdate => "profile_update",
            Self::Recommendation => "recommendation",
            Self::Confirmation => "confirmation",
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::AddToCart => "add_to_cart",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "order" => Ok(Self::Order),
            "profile_update" => Ok(Self::ProfileUpdate),
            "recommendation" => Ok(Self::Recommendation),
            "confirmation" => Ok(Self::Confirmation),
            "greeting" => Ok(Self::Greeting),
            "help" => Ok(Self::Help),
            "add_to_cart" => Ok(Self::AddToCart),
            other => Err(DomainError::InvariantViolation(format!("unknown intent label `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: Intent,
    pub confidence: f64,
}

impl IntentScore {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self { intent, confidence: confidence.clamp(0.0, 1.0) }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyEntities {
    #[serde(default)]
    pub food: Vec<String>,
    #[serde(default)]
    pub restaurant: Vec<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// Which tier of the completion fallback chain produced a reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    #[default]
    Structured,
    Legacy,
    RuleBased,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionReply {
    pub response: String,
    pub intent: Intent,
    pub confidence: f64,
    #[serde(default)]
    pub entities: ReplyEntities,
    #[serde(default)]
    pub source: ReplySource,
    /// Wall time the completion chain spent producing this reply.
    #[serde(default)]
    pub processing_ms: u64,
}
