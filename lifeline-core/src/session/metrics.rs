//! Per-user session metrics.

use chrono::{Duration, Timelike};
use chrono_tz::Tz;

use crate::types::{DeviceType, Session, SessionMetrics, TimeOfDay};

/// Aggregate a user's history (oldest first) plus the active session.
pub fn compute_metrics(history: &[Session], active: Option<&Session>) -> SessionMetrics {
    let sessions: Vec<&Session> = history.iter().chain(active).collect();
    let total = sessions.len();

    let average_session_duration = if total == 0 {
        0.0
    } else {
        sessions
            .iter()
            .map(|s| s.session_duration as f64)
            .sum::<f64>()
            / total as f64
    };

    SessionMetrics {
        average_session_duration,
        total_sessions: total,
        active_sessions_count: usize::from(active.is_some()),
        most_active_time_of_day: most_active_time_of_day(&sessions),
        frequent_device_type: frequent_device_type(&sessions),
        session_consistency: session_consistency(&sessions),
    }
}

/// Modal start-time bucket; ties go to the earlier bucket.
fn most_active_time_of_day(sessions: &[&Session]) -> Option<TimeOfDay> {
    if sessions.is_empty() {
        return None;
    }

    let mut counts = [0usize; 4];
    for session in sessions {
        let bucket = TimeOfDay::from_hour(local_start_hour(session));
        if let Some(idx) = TimeOfDay::ALL.iter().position(|b| *b == bucket) {
            counts[idx] += 1;
        }
    }

    let mut best = 0;
    for idx in 1..counts.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    Some(TimeOfDay::ALL[best])
}

/// Hour of the session start in the session's own timezone.
/// Unknown timezone names fall back to UTC.
fn local_start_hour(session: &Session) -> u32 {
    match session.metadata.timezone.parse::<Tz>() {
        Ok(tz) => session.start_time.with_timezone(&tz).hour(),
        Err(_) => session.start_time.hour(),
    }
}

/// Modal device class; ties go to the first one encountered.
fn frequent_device_type(sessions: &[&Session]) -> Option<DeviceType> {
    let mut counts: Vec<(DeviceType, usize)> = Vec::new();
    for session in sessions {
        let device = session.metadata.device_type;
        match counts.iter_mut().find(|(d, _)| *d == device) {
            Some((_, count)) => *count += 1,
            None => counts.push((device, 1)),
        }
    }

    let mut best: Option<(DeviceType, usize)> = None;
    for (device, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((device, count));
        }
    }
    best.map(|(device, _)| device)
}

/// Regularity score in [0, 1]: 1 minus the mean idle gap between consecutive
/// sessions as a fraction of a week.
fn session_consistency(sessions: &[&Session]) -> f64 {
    if sessions.len() < 2 {
        return 1.0;
    }

    let mut ordered: Vec<&Session> = sessions.to_vec();
    ordered.sort_by_key(|s| s.start_time);

    let gaps: Vec<i64> = ordered
        .windows(2)
        .map(|pair| {
            let gap = pair[1].start_time - pair[0].closed_at();
            gap.num_milliseconds().max(0)
        })
        .collect();

    let avg_gap = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
    let week = Duration::weeks(1).num_milliseconds() as f64;

    (1.0 - avg_gap / week).clamp(0.0, 1.0)
}
