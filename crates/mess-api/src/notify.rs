//! # Spawned Notification Sink
//!
//! The deployment implementation of the admission engine's notification
//! port. Delivery happens on a spawned task so the caller — the admission
//! pipeline, an approval handler — returns immediately. The transport (the
//! original deployment pushes chat messages) is behind this boundary and is
//! represented here by structured logging; failures are the sink's problem
//! and never the decision's.

use mess_admission::{NotificationEvent, NotificationSink};
use mess_core::StudentId;

/// Fire-and-forget sink: hands each event to a background task.
///
/// Requires a Tokio runtime. Events observed while no runtime is running
/// are logged synchronously rather than lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnedNotificationSink;

impl SpawnedNotificationSink {
    /// Create the sink.
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSink for SpawnedNotificationSink {
    fn notify(&self, student_id: StudentId, event: NotificationEvent) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    deliver(student_id, &event);
                });
            }
            Err(_) => {
                // No runtime (startup paths, sync tests): deliver inline.
                deliver(student_id, &event);
            }
        }
    }
}

/// The delivery edge. Swapping in a real transport (bot API, queue) means
/// replacing this function; everything upstream stays.
fn deliver(student_id: StudentId, event: &NotificationEvent) {
    tracing::info!(
        student = %student_id,
        event = ?event,
        "student notification dispatched"
    );
}
