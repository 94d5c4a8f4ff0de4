//! Positional merge of scheduled slots with live predictions.
//!
//! All values are offsets in seconds since local midnight of the target day.
//! Predictions can land before that midnight, so merged offsets are signed.

use std::collections::HashMap;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::identifiers::RouteIdentifier;
use crate::models::types::{LiveEstimate, RealtimeEstimate, ScheduledArrival};
use crate::time::offset_since_midnight;

/// A merged arrival before route names and instants are attached
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedArrival {
    pub route_id: RouteIdentifier,
    pub scheduled: i64,
    pub expected: i64,
}

/// Project raw predictions onto the target day.
///
/// The upstream reports time until arrival as of `now`. Only the soonest
/// prediction per route is kept and the result is ordered by predicted time.
pub fn project_estimates(
    live: Vec<LiveEstimate>,
    target: &DateTime<Tz>,
    now: &DateTime<Tz>,
) -> Vec<RealtimeEstimate> {
    let target_offset = i64::from(offset_since_midnight(target));
    let lead = now.signed_duration_since(*target).num_seconds();

    let mut soonest: HashMap<RouteIdentifier, Duration> = HashMap::new();
    for estimate in live {
        soonest
            .entry(estimate.route_id)
            .and_modify(|eta| *eta = (*eta).min(estimate.eta))
            .or_insert(estimate.eta);
    }

    let mut projected: Vec<RealtimeEstimate> = soonest
        .into_iter()
        .map(|(route_id, eta)| {
            let eta = i64::try_from(eta.as_secs()).unwrap_or(i64::MAX);
            RealtimeEstimate {
                route_id,
                predicted: target_offset.saturating_add(lead).saturating_add(eta),
            }
        })
        .collect();

    projected.sort_by(|a, b| {
        a.predicted
            .cmp(&b.predicted)
            .then_with(|| a.route_id.cmp(&b.route_id))
    });
    projected
}

/// Whether the first scheduled slot is still ahead of the bus.
///
/// Without live data the slot is assumed to have passed. With live data it
/// is kept when the first prediction comes before the second slot (or there
/// is no second slot), unless the prediction is more than `late_tolerance`
/// seconds past it.
pub fn keep_first_slot(
    scheduled: &[ScheduledArrival],
    estimates: &[RealtimeEstimate],
    late_tolerance: u32,
) -> bool {
    let (Some(first), Some(eta)) = (scheduled.first(), estimates.first()) else {
        return false;
    };

    let before_next_slot = match scheduled.get(1) {
        Some(second) => eta.predicted < i64::from(second.scheduled),
        None => true,
    };

    before_next_slot && eta.predicted <= i64::from(first.scheduled) + i64::from(late_tolerance)
}

/// Merge `scheduled` (already windowed) with ordered `estimates`.
///
/// The i-th remaining slot takes the i-th prediction as its expected time.
/// Predictions beyond the last slot become arrivals of their own, scheduled
/// at the predicted time.
pub fn merge(
    scheduled: &[ScheduledArrival],
    estimates: &[RealtimeEstimate],
    late_tolerance: u32,
) -> Vec<MergedArrival> {
    let slots = if keep_first_slot(scheduled, estimates, late_tolerance) || scheduled.is_empty() {
        scheduled
    } else {
        &scheduled[1..]
    };

    let mut merged: Vec<MergedArrival> = slots
        .iter()
        .enumerate()
        .map(|(idx, slot)| MergedArrival {
            route_id: slot.route_id.clone(),
            scheduled: i64::from(slot.scheduled),
            expected: estimates
                .get(idx)
                .map_or(i64::from(slot.scheduled), |eta| eta.predicted),
        })
        .collect();

    merged.extend(estimates.iter().skip(slots.len()).map(|eta| MergedArrival {
        route_id: eta.route_id.clone(),
        scheduled: eta.predicted,
        expected: eta.predicted,
    }));

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::StopId;
    use crate::models::calendar::WeekdayFlags;
    use crate::models::types::ArrivalKind;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    const TOLERANCE: u32 = 50 * 60;

    fn at(hour: u32, minute: u32) -> u32 {
        hour * 3600 + minute * 60
    }

    fn slot(route: &str, scheduled: u32) -> ScheduledArrival {
        ScheduledArrival {
            stop_id: StopId(1),
            route_id: RouteIdentifier::new(route),
            scheduled,
            weekdays: WeekdayFlags::every_day(),
            kind: ArrivalKind::Timepoint,
        }
    }

    fn eta(route: &str, predicted: u32) -> RealtimeEstimate {
        RealtimeEstimate {
            route_id: RouteIdentifier::new(route),
            predicted: i64::from(predicted),
        }
    }

    fn merged(route: &str, scheduled: u32, expected: u32) -> MergedArrival {
        MergedArrival {
            route_id: RouteIdentifier::new(route),
            scheduled: i64::from(scheduled),
            expected: i64::from(expected),
        }
    }

    #[test]
    fn test_prediction_fills_first_slot() {
        let scheduled = [slot("A", at(8, 0)), slot("B", at(8, 15))];
        let estimates = [eta("A", at(8, 3))];

        assert_eq!(
            merge(&scheduled, &estimates, TOLERANCE),
            vec![merged("A", at(8, 0), at(8, 3)), merged("B", at(8, 15), at(8, 15))]
        );
    }

    #[test]
    fn test_surplus_predictions_become_arrivals() {
        let scheduled = [slot("A", at(8, 0))];
        let estimates = [eta("A", at(8, 2)), eta("C", at(8, 10))];

        assert_eq!(
            merge(&scheduled, &estimates, TOLERANCE),
            vec![merged("A", at(8, 0), at(8, 2)), merged("C", at(8, 10), at(8, 10))]
        );
    }

    #[test]
    fn test_first_slot_dropped_without_live_data() {
        let scheduled = [slot("A", at(7, 55)), slot("B", at(8, 5)), slot("A", at(8, 20))];

        assert_eq!(
            merge(&scheduled, &[], TOLERANCE),
            vec![merged("B", at(8, 5), at(8, 5)), merged("A", at(8, 20), at(8, 20))]
        );
    }

    #[test]
    fn test_first_slot_dropped_when_prediction_passes_second_slot() {
        let scheduled = [slot("A", at(7, 55)), slot("B", at(8, 5))];
        let estimates = [eta("B", at(8, 6))];

        assert_eq!(
            merge(&scheduled, &estimates, TOLERANCE),
            vec![merged("B", at(8, 5), at(8, 6))]
        );
    }

    #[test]
    fn test_single_slot_kept_within_tolerance_only() {
        let scheduled = [slot("A", at(8, 0))];
        assert!(keep_first_slot(&scheduled, &[eta("A", at(8, 50))], TOLERANCE));
        assert!(!keep_first_slot(&scheduled, &[eta("A", at(8, 51))], TOLERANCE));
        assert!(!keep_first_slot(&scheduled, &[], TOLERANCE));
        assert!(!keep_first_slot(&[], &[eta("A", at(8, 0))], TOLERANCE));
    }

    #[test]
    fn test_empty_schedule_uses_predictions() {
        assert_eq!(
            merge(&[], &[eta("A", at(8, 2))], TOLERANCE),
            vec![merged("A", at(8, 2), at(8, 2))]
        );
        assert!(merge(&[], &[], TOLERANCE).is_empty());
    }

    #[test]
    fn test_project_keeps_soonest_per_route() {
        let now = Los_Angeles.with_ymd_and_hms(2024, 5, 14, 8, 0, 0).unwrap();
        let live = vec![
            LiveEstimate {
                route_id: RouteIdentifier::new("B"),
                eta: Duration::from_secs(600),
            },
            LiveEstimate {
                route_id: RouteIdentifier::new("A"),
                eta: Duration::from_secs(900),
            },
            LiveEstimate {
                route_id: RouteIdentifier::new("A"),
                eta: Duration::from_secs(180),
            },
        ];

        assert_eq!(
            project_estimates(live, &now, &now),
            vec![eta("A", at(8, 3)), eta("B", at(8, 10))]
        );
    }

    #[test]
    fn test_project_relative_to_now_not_target() {
        let now = Los_Angeles.with_ymd_and_hms(2024, 5, 14, 8, 0, 0).unwrap();
        let target = Los_Angeles.with_ymd_and_hms(2024, 5, 14, 8, 10, 0).unwrap();
        let live = vec![LiveEstimate {
            route_id: RouteIdentifier::new("A"),
            eta: Duration::from_secs(15 * 60),
        }];

        assert_eq!(project_estimates(live, &target, &now), vec![eta("A", at(8, 15))]);
    }

    #[test]
    fn test_prediction_before_target_midnight_stays_negative() {
        let now = Los_Angeles.with_ymd_and_hms(2024, 5, 14, 23, 58, 0).unwrap();
        let target = Los_Angeles.with_ymd_and_hms(2024, 5, 15, 0, 5, 0).unwrap();
        let live = vec![LiveEstimate {
            route_id: RouteIdentifier::new("A"),
            eta: Duration::from_secs(60),
        }];

        let projected = project_estimates(live, &target, &now);
        assert_eq!(projected[0].predicted, -60);

        assert_eq!(
            merge(&[], &projected, TOLERANCE),
            vec![MergedArrival {
                route_id: RouteIdentifier::new("A"),
                scheduled: -60,
                expected: -60,
            }]
        );
    }
}
