//! # Eligibility Evaluation
//!
//! A pure function from a student's current facts to the first blocking
//! reason, if any. The pipeline gathers the facts (one store read each);
//! this module owns the priority order and nothing else, so the order is
//! testable without any storage in play.
//!
//! Priority: registration status, then payment, then exclusion. The first
//! matching condition wins — later checks are not evaluated once one blocks.

use serde::{Deserialize, Serialize};

use crate::domain::ApprovalStatus;

/// Which kind of exclusion covers a day.
///
/// A closure and a personal cut block identically; the distinction exists so
/// staff-facing reason text can say which one applied. When both cover the
/// day, the closure wins the reason text — it is the broader fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExclusionKind {
    /// The student's own mess cut.
    PersonalCut,
    /// A mess-wide closure.
    GlobalClosure,
}

/// The eligibility facts for one student on one day, each independently
/// mutable by a different flow (admin review, payment verification,
/// self-service cuts, closure declarations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityFacts {
    /// Registration lifecycle status.
    pub approval: ApprovalStatus,
    /// Whether a verified payment window covers the day.
    pub payment_ok: bool,
    /// The exclusion covering the day, if any.
    pub exclusion: Option<ExclusionKind>,
}

/// Why a student is ineligible today. Expected and frequent — these are
/// informational, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityBlock {
    /// Student is not approved.
    Status(ApprovalStatus),
    /// No verified payment window covers today.
    NoPayment,
    /// A cut or closure covers today.
    Excluded(ExclusionKind),
}

impl EligibilityFacts {
    /// The first blocking condition in priority order, or `None` if the
    /// student is eligible.
    pub fn blocking_reason(&self) -> Option<EligibilityBlock> {
        if self.approval != ApprovalStatus::Approved {
            return Some(EligibilityBlock::Status(self.approval));
        }
        if !self.payment_ok {
            return Some(EligibilityBlock::NoPayment);
        }
        if let Some(kind) = self.exclusion {
            return Some(EligibilityBlock::Excluded(kind));
        }
        None
    }

    /// Whether nothing blocks admission today.
    pub fn is_eligible(&self) -> bool {
        self.blocking_reason().is_none()
    }
}

impl EligibilityBlock {
    /// Staff-facing reason text.
    pub fn reason_text(&self) -> String {
        match self {
            Self::Status(status) => format!("student not approved (status {status})"),
            Self::NoPayment => "no verified payment for current cycle".to_string(),
            Self::Excluded(ExclusionKind::GlobalClosure) => "mess closed".to_string(),
            Self::Excluded(ExclusionKind::PersonalCut) => "mess cut applied".to_string(),
        }
    }
}
