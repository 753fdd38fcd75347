// src/time.rs

use chrono::{DateTime, Duration as ChronoDuration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};
use tzf_rs::DefaultFinder;

use crate::Location;

/// Coordinate -> IANA zone name lookup.
pub trait TimezoneResolver: Send + Sync {
    fn timezone_at(&self, location: &Location) -> Option<String>;
}

/// Offline lookup against the bundled timezone polygons.
pub struct TzfResolver {
    finder: DefaultFinder,
}

impl TzfResolver {
    pub fn new() -> Self {
        TzfResolver {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for TzfResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneResolver for TzfResolver {
    fn timezone_at(&self, location: &Location) -> Option<String> {
        let name = self.finder.get_tz_name(location.longitude, location.latitude);
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Attaches `zone` to a wall-clock timestamp and converts it to UTC. Missing
/// or unknown zones are treated as UTC.
pub fn to_universal(local: NaiveDateTime, zone: Option<&str>) -> DateTime<Utc> {
    let tz = match zone {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(zone = name, "unknown timezone, falling back to UTC");
            Tz::UTC
        }),
        None => {
            warn!("timezone lookup returned nothing, falling back to UTC");
            Tz::UTC
        }
    };

    let instant = match tz.from_local_datetime(&local) {
        LocalResult::Single(date_time) => date_time.with_timezone(&Utc),
        // clocks rolled back: the first occurrence
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // clocks jumped forward: keep the offset in force before the jump
        LocalResult::None => {
            let offset_seconds = offset_before_gap(&tz, local);
            Utc.from_utc_datetime(&(local - ChronoDuration::seconds(offset_seconds)))
        }
    };
    debug!(%local, %tz, %instant, "resolved universal instant");
    instant
}

fn offset_before_gap(tz: &Tz, local: NaiveDateTime) -> i64 {
    (1..=48)
        .map(|step| local - ChronoDuration::minutes(30 * step))
        .find_map(|earlier| tz.from_local_datetime(&earlier).earliest())
        .map_or(0, |date_time| date_time.offset().fix().local_minus_utc() as i64)
}
