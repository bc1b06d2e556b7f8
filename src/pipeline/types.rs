//! Iteration records and outcomes

use serde::{Deserialize, Serialize};

use crate::ai::validation::ExtractionMethod;
use crate::constants::judge::{FAILURE_FEEDBACK_PREFIX, FAILURE_SUGGESTION};
use crate::types::StructuredData;

// =============================================================================
// Judge Decision
// =============================================================================

/// Verdict returned by the quality judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeDecision {
    #[serde(alias = "is_acceptable")]
    pub acceptable: bool,
    #[serde(alias = "confidence_score")]
    pub confidence: f32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl JudgeDecision {
    /// Rejecting decision substituted when the judge itself fails
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            acceptable: false,
            confidence: 0.0,
            feedback: format!("{}: {}", FAILURE_FEEDBACK_PREFIX, error),
            suggestions: vec![FAILURE_SUGGESTION.to_string()],
        }
    }

    /// Clamp confidence into [0, 1]; NaN and infinities become 0
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn accepts(&self, threshold: f32) -> bool {
        self.acceptable && self.confidence >= threshold
    }
}

// =============================================================================
// Data Source
// =============================================================================

/// Where a record's raw text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// Real agent answer
    Agent,
    /// Agent call failed; configured fallback payload substituted
    Fallback { reason: String },
    /// Agent call failed; nothing substituted
    AgentFailed { reason: String },
}

impl DataSource {
    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Fallback { .. } => "fallback",
            Self::AgentFailed { .. } => "agent_failed",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Fallback { reason } => write!(f, "fallback ({})", reason),
            Self::AgentFailed { reason } => write!(f, "agent failed ({})", reason),
        }
    }
}

// =============================================================================
// Iteration Record
// =============================================================================

/// One prompt → agent → extraction → judgment pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based sequence number
    pub index: u32,
    pub prompt: String,
    pub raw_response: String,
    pub source: DataSource,
    pub data: StructuredData,
    pub paragraph: Option<String>,
    pub method: ExtractionMethod,
    pub decision: JudgeDecision,
    /// Set when `decision` was synthesized after a judge failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Judge accepted with enough confidence
    Accepted,
    /// Iteration cap reached; best record finalized
    Exhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Every record of one run plus the finalized choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationOutcome {
    pub records: Vec<IterationRecord>,
    pub stop_reason: StopReason,
    /// 1-based index of the finalized record
    pub final_index: u32,
}

impl IterationOutcome {
    pub fn finalized(&self) -> &IterationRecord {
        // final_index always names a pushed record
        &self.records[(self.final_index - 1) as usize]
    }

    pub fn source(&self) -> &DataSource {
        &self.finalized().source
    }

    pub fn iterations(&self) -> usize {
        self.records.len()
    }
}

/// Index of the highest-confidence record; the earliest wins ties
pub fn select_best(records: &[IterationRecord]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, record) in records.iter().enumerate() {
        match best {
            Some(b) if record.decision.confidence <= records[b].decision.confidence => {}
            _ => best = Some(i),
        }
    }
    best
}
