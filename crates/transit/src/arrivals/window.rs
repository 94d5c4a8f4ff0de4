//! Selection of the scheduled slots a reconciliation looks at.

use crate::models::types::ScheduledArrival;

/// Slots at or after `cutoff`, plus the last one before it.
///
/// `scheduled` must be ordered by scheduled time. The slot just before the
/// cutoff stays visible since that bus may still be running late. When
/// every slot precedes the cutoff only the last one is returned.
pub fn boundary_window(scheduled: &[ScheduledArrival], cutoff: u32) -> &[ScheduledArrival] {
    let first_due = scheduled.partition_point(|arrival| arrival.scheduled < cutoff);
    &scheduled[first_due.saturating_sub(1)..]
}
