//! Time-sortable identifiers.
//!
//! Every primary key in the pipeline is a UUIDv7: a 128-bit value whose
//! high bits are a millisecond Unix timestamp and whose low bits are random.
//! This gives us both an opaque, globally unique key and, for free, a
//! recoverable creation timestamp that every subsequent lookup on that key
//! uses as a narrow `created_at` range bound.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Generate a fresh time-sortable id.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Recover the creation timestamp embedded in a UUIDv7. Returns `None` for
/// ids that aren't version 7 (should not occur for ids minted by this
/// crate, but callers handling externally supplied ids should check).
pub fn embedded_timestamp(id: Uuid) -> Option<DateTime<Utc>> {
    let ts = id.get_timestamp()?;
    let (secs, nanos) = ts.to_unix();
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
}

/// The `created_at` range an id-keyed lookup should constrain itself to,
/// widened symmetrically by `slack` around the id's embedded timestamp.
/// Falls back to `(None, None)` (unconstrained) for non-v7 ids so a caller
/// never silently excludes a legitimately matching row.
pub fn created_at_window(id: Uuid, slack: Duration) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match embedded_timestamp(id) {
        Some(ts) => (Some(ts - slack), Some(ts + slack)),
        None => (None, None),
    }
}

/// The one-sided lower bound a horizon scan (the dispatcher's scheduled-
/// message scan) should apply: ids created no earlier than `horizon` ago.
pub fn lower_bound(horizon: Duration) -> DateTime<Utc> {
    Utc::now() - horizon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_timestamp_is_recoverable_within_a_second() {
        let before = Utc::now();
        let id = new_id();
        let ts = embedded_timestamp(id).expect("v7 id has a timestamp");
        let after = Utc::now();
        assert!(ts >= before - Duration::seconds(1));
        assert!(ts <= after + Duration::seconds(1));
    }

    #[test]
    fn window_brackets_the_embedded_timestamp() {
        let id = new_id();
        let (lo, hi) = created_at_window(id, Duration::hours(1));
        let ts = embedded_timestamp(id).unwrap();
        assert!(lo.unwrap() <= ts);
        assert!(hi.unwrap() >= ts);
    }

    #[test]
    fn v4_ids_have_no_embedded_timestamp() {
        let id = Uuid::new_v4();
        assert!(embedded_timestamp(id).is_none());
        assert_eq!(created_at_window(id, Duration::hours(1)), (None, None));
    }
}
