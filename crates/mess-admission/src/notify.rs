//! # Student Notification Port
//!
//! Fire-and-forget delivery of student-facing events. The admission pipeline
//! (and the admin flows) publish events here; delivery is the collaborator's
//! problem — at-least-once, retried, dead-lettered, whatever it chooses.
//!
//! ## Contract
//!
//! [`NotificationSink::notify`] must not block and must not fail the caller.
//! An implementation that performs I/O must hand the event off (spawn a
//! task, push to a queue) and return immediately. The admission decision is
//! final before the notification is attempted; a delivery failure is logged
//! by the sink, never propagated.

use serde::{Deserialize, Serialize};

use mess_core::{Meal, MealDay, StudentId};

/// Student-facing events worth a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    /// A meal was served against the student's credential.
    MealAdmitted { meal: Meal, day: MealDay },
    /// Registration approved — mess access is active.
    RegistrationApproved,
    /// Registration denied.
    RegistrationDenied,
    /// A payment window was verified.
    PaymentVerified { cycle_start: MealDay, cycle_end: MealDay },
    /// A payment window was denied.
    PaymentDenied { reason: Option<String> },
    /// A mess cut was applied.
    MessCutApplied { from_day: MealDay, to_day: MealDay },
}

/// The notification port. See the module docs for the non-blocking,
/// non-failing contract.
pub trait NotificationSink: Send + Sync {
    /// Publish an event for a student. Must return promptly; must not fail.
    fn notify(&self, student_id: StudentId, event: NotificationEvent);
}

/// A sink that drops events. For tests and headless deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotificationSink;

impl NotificationSink for NullNotificationSink {
    fn notify(&self, _student_id: StudentId, _event: NotificationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = NotificationEvent::MealAdmitted {
            meal: Meal::Lunch,
            day: MealDay::parse("2024-01-15").unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "MEAL_ADMITTED");
        assert_eq!(json["meal"], "LUNCH");
    }

    #[test]
    fn null_sink_accepts_everything() {
        let sink = NullNotificationSink;
        sink.notify(StudentId(1), NotificationEvent::RegistrationApproved);
    }
}
