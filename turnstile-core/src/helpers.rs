//! Small formatting helpers shared with the operator surface.

use chrono::Duration;

/// Render a delta as its largest whole unit, for lock listings.
///
/// `None` and sub-second deltas both read as "0 seconds".
pub fn humanize_delta(delta: Option<Duration>) -> String {
    let delta = delta.unwrap_or_else(Duration::zero);

    let (count, unit) = if delta.num_days() > 0 {
        (delta.num_days(), "day")
    } else if delta.num_hours() > 0 {
        (delta.num_hours(), "hour")
    } else if delta.num_minutes() > 0 {
        (delta.num_minutes(), "minute")
    } else {
        (delta.num_seconds().max(0), "second")
    };

    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}
