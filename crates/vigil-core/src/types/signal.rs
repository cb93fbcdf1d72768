//! Signal types.
//!
//! A [`Signal`] is what the outside world hands us; an [`IntelligentSignal`] is what
//! the decision pipeline produces from it once it has been scored and gated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::{VigilError, VigilResult};

/// Fixed set of intelligence domains a signal can belong to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SignalDomain {
    /// Competitor moves: launches, pricing, hires.
    Competitive,
    /// Regulation, compliance and policy changes.
    Regulatory,
    /// Market and demand shifts.
    Market,
    /// Technology and product developments.
    Technology,
    /// Funding, earnings and other financial events.
    Financial,
    /// Partnerships, alliances and M&A.
    Partnership,
}

impl SignalDomain {
    /// All domains in declaration order.
    pub fn all() -> Vec<SignalDomain> {
        Self::iter().collect()
    }
}

/// Four-level signal priority. Ordering follows rank: `Low < Medium < High < Critical`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Ordinal rank: critical=4 > high=3 > medium=2 > low=1.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }
}

/// How soon and how insistently a signal should reach the user.
///
/// Ordering is by urgency index, so the *minimum* value is the most urgent:
/// `Immediate < Timely < Batched < Digest`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    Timely,
    Batched,
    Digest,
}

impl Urgency {
    /// Position in the fixed ordering, 0 being most urgent.
    pub fn index(&self) -> usize {
        match self {
            Urgency::Immediate => 0,
            Urgency::Timely => 1,
            Urgency::Batched => 2,
            Urgency::Digest => 3,
        }
    }

    /// Whether `self` is strictly more urgent than `other`.
    pub fn is_more_urgent_than(&self, other: Urgency) -> bool {
        self.index() < other.index()
    }
}

/// An externally supplied signal. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Identity supplied by the acquisition layer.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub domain: SignalDomain,
    pub priority: Priority,
    /// Provider relevance in `[0, 1]`.
    pub relevance_score: f64,
    pub published_at: DateTime<Utc>,
    /// Competitor named by the signal, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor: Option<String>,
    /// Free-form topic label, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Provider-specific type label (e.g. "product_launch").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
}

impl Signal {
    /// Create a new signal with the required attributes.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        domain: SignalDomain,
        priority: Priority,
        relevance_score: f64,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: String::new(),
            url: None,
            source_id: None,
            domain,
            priority,
            relevance_score,
            published_at,
            competitor: None,
            topic: None,
            signal_type: None,
        }
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the source URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the competitor attribute.
    pub fn with_competitor(mut self, competitor: impl Into<String>) -> Self {
        self.competitor = Some(competitor.into());
        self
    }

    /// Set the topic attribute.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the signal type attribute.
    pub fn with_signal_type(mut self, signal_type: impl Into<String>) -> Self {
        self.signal_type = Some(signal_type.into());
        self
    }

    /// Check the fields the pipeline cannot work without.
    pub fn validate(&self) -> VigilResult<()> {
        if self.id.trim().is_empty() {
            return Err(VigilError::missing_field("id"));
        }
        if !self.relevance_score.is_finite() {
            return Err(VigilError::validation(format!(
                "relevance_score must be a finite number, got {}",
                self.relevance_score
            )));
        }
        Ok(())
    }
}

/// Lenient wire form of a [`Signal`], as received from the acquisition layer.
///
/// Every field is optional so a malformed payload can be rejected with a logged
/// warning instead of a deserialization failure further up.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSignal {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    #[serde(alias = "sourceId")]
    pub source_id: Option<String>,
    pub domain: Option<String>,
    pub priority: Option<String>,
    #[serde(alias = "relevanceScore")]
    pub relevance_score: Option<f64>,
    #[serde(alias = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
    pub competitor: Option<String>,
    pub topic: Option<String>,
    #[serde(alias = "signalType")]
    pub signal_type: Option<String>,
}

impl RawSignal {
    /// Validate into a [`Signal`].
    ///
    /// `id`, `domain` and `priority` are required. A missing relevance defaults to
    /// 0.5 and a missing publication time to `received_at`.
    pub fn into_signal(self, received_at: DateTime<Utc>) -> VigilResult<Signal> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| VigilError::missing_field("id"))?;
        let domain = self.domain.ok_or_else(|| VigilError::missing_field("domain"))?;
        let domain = domain.parse::<SignalDomain>().map_err(|_| {
            VigilError::validation_with_suggestion(
                format!("Unknown domain '{}'", domain),
                format!("Use one of: {:?}", SignalDomain::all()),
            )
        })?;
        let priority = self
            .priority
            .ok_or_else(|| VigilError::missing_field("priority"))?;
        let priority = priority.parse::<Priority>().map_err(|_| {
            VigilError::validation_with_suggestion(
                format!("Unknown priority '{}'", priority),
                "Use one of: critical, high, medium, low",
            )
        })?;

        let signal = Signal {
            title: self.title.unwrap_or_else(|| id.clone()),
            id,
            summary: self.summary.unwrap_or_default(),
            url: self.url,
            source_id: self.source_id,
            domain,
            priority,
            relevance_score: self.relevance_score.unwrap_or(0.5),
            published_at: self.published_at.unwrap_or(received_at),
            competitor: self.competitor,
            topic: self.topic,
            signal_type: self.signal_type,
        };
        signal.validate()?;
        Ok(signal)
    }
}

/// A scored, gated signal as recorded by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligentSignal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub domain: SignalDomain,
    pub priority: Priority,
    /// Signal Intelligence Score, 0-100.
    pub sis: u8,
    pub urgency: Urgency,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
    /// -1, 0 or 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_score: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    /// Play a sound on delivery (persona default or rule).
    #[serde(default)]
    pub sound: bool,
    /// Highlight on delivery (rule).
    #[serde(default)]
    pub highlight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
}

impl IntelligentSignal {
    /// Derive an intelligent signal from its source signal and scoring.
    pub fn from_signal(signal: &Signal, sis: u8, urgency: Urgency, now: DateTime<Utc>) -> Self {
        Self {
            id: signal.id.clone(),
            title: signal.title.clone(),
            summary: signal.summary.clone(),
            url: signal.url.clone(),
            source_id: signal.source_id.clone(),
            domain: signal.domain,
            priority: signal.priority,
            sis,
            urgency,
            published_at: signal.published_at,
            created_at: now,
            read_at: None,
            dismissed_at: None,
            feedback_score: None,
            cluster_id: None,
            sound: false,
            highlight: false,
            competitor: signal.competitor.clone(),
            topic: signal.topic.clone(),
            signal_type: signal.signal_type.clone(),
        }
    }

    /// Valid enough to take part in clustering.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed_at.is_some()
    }

    /// Neither read nor dismissed.
    pub fn is_unread(&self) -> bool {
        !self.is_read() && !self.is_dismissed()
    }
}

/// The attributes the preference policy looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalContext<'a> {
    pub domain: SignalDomain,
    pub priority: Priority,
    pub competitor: Option<&'a str>,
    pub topic: Option<&'a str>,
    pub signal_type: Option<&'a str>,
}

impl<'a> SignalContext<'a> {
    /// Context with only domain and priority.
    pub fn new(domain: SignalDomain, priority: Priority) -> Self {
        Self {
            domain,
            priority,
            competitor: None,
            topic: None,
            signal_type: None,
        }
    }
}

impl<'a> From<&'a Signal> for SignalContext<'a> {
    fn from(signal: &'a Signal) -> Self {
        Self {
            domain: signal.domain,
            priority: signal.priority,
            competitor: signal.competitor.as_deref(),
            topic: signal.topic.as_deref(),
            signal_type: signal.signal_type.as_deref(),
        }
    }
}

impl<'a> From<&'a IntelligentSignal> for SignalContext<'a> {
    fn from(signal: &'a IntelligentSignal) -> Self {
        Self {
            domain: signal.domain,
            priority: signal.priority,
            competitor: signal.competitor.as_deref(),
            topic: signal.topic.as_deref(),
            signal_type: signal.signal_type.as_deref(),
        }
    }
}
