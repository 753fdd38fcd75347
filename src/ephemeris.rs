// src/ephemeris.rs

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, warn};

use crate::error::CalculationError;
use crate::{CelestialBody, JulianDay, PlanetPositions};

/// Black-box source of geocentric ecliptic longitudes.
pub trait LongitudeProvider: Send + Sync {
    fn longitude(&self, julian_day: JulianDay, body: CelestialBody) -> Result<f64, CalculationError>;
}

/// Converts a DateTime<Utc> to Julian Day (Gregorian calendar, UT).
pub fn date_to_julian_day(date_time: DateTime<Utc>) -> JulianDay {
    let mut year = date_time.year() as f64;
    let mut month = date_time.month() as f64;
    let day = date_time.day() as f64;
    let second =
        date_time.second() as f64 + (date_time.timestamp_subsec_micros() as f64 / 1_000_000.0);
    let hour = date_time.hour() as f64 + date_time.minute() as f64 / 60.0 + second / 3600.0;

    if month <= 2.0 {
        year -= 1.0;
        month += 12.0;
    }
    let century = (year / 100.0).floor();
    let gregorian_correction = 2.0 - century + (century / 4.0).floor();

    (365.25 * (year + 4716.0)).floor()
        + (30.6001 * (month + 1.0)).floor()
        + day
        + gregorian_correction
        - 1524.5
        + hour / 24.0
}

/// Longitudes of every tracked body at `instant`. Bodies the provider cannot
/// compute are left out of the mapping.
pub fn calculate_positions(provider: &dyn LongitudeProvider, instant: DateTime<Utc>) -> PlanetPositions {
    positions_at(provider, date_to_julian_day(instant))
}

pub fn positions_at(provider: &dyn LongitudeProvider, julian_day: JulianDay) -> PlanetPositions {
    let positions: PlanetPositions = CelestialBody::iter()
        .filter_map(|body| match provider.longitude(julian_day, body) {
            Ok(longitude) if longitude.is_finite() => Some((body, longitude.rem_euclid(360.0))),
            Ok(longitude) => {
                warn!(%body, longitude, "ephemeris returned a non-finite longitude, omitting body");
                None
            }
            Err(err) => {
                warn!(%body, error = %err, "omitting body from chart");
                None
            }
        })
        .collect();
    debug!(julian_day, bodies = positions.len(), "computed planet positions");
    positions
}

// ---------------------------
// ## VSOP87 / ELP-2000 ephemeris
// ---------------------------

const J2000: JulianDay = 2451545.0;
/// General precession in longitude, degrees per Julian century.
const PRECESSION_PER_CENTURY: f64 = 1.3969713;
/// Range of the Pluto periodic series. Outside it the position drifts slowly.
const PLUTO_SERIES_RANGE: std::ops::Range<JulianDay> = 2409542.5..2488069.5;

/// Geocentric tropical longitudes from the `astro` crate: VSOP87 for the
/// planets and the Earth, ELP-2000/82 for the Moon, Meeus' periodic series
/// for Pluto. Input is UT; ΔT is applied before evaluating the theories.
#[derive(Debug, Clone, Copy, Default)]
pub struct VsopEphemeris;

impl VsopEphemeris {
    pub fn new() -> Self {
        VsopEphemeris
    }
}

impl LongitudeProvider for VsopEphemeris {
    fn longitude(&self, julian_day: JulianDay, body: CelestialBody) -> Result<f64, CalculationError> {
        if !julian_day.is_finite() {
            return Err(CalculationError::new(body, "julian day is not finite"));
        }
        let jde = ephemeris_day(julian_day);

        let radians = match body {
            CelestialBody::Sun => astro::sun::geocent_ecl_pos(jde).0.long,
            CelestialBody::Moon => astro::lunar::geocent_ecl_pos(jde).0.long,
            CelestialBody::Pluto => {
                if !PLUTO_SERIES_RANGE.contains(&julian_day) {
                    debug!(julian_day, "pluto outside its series range, accuracy degrades");
                }
                // the series is referred to the J2000 equinox
                let (long, lat, radius) = astro::pluto::heliocent_pos(jde);
                let precession = ((jde - J2000) / 36525.0 * PRECESSION_PER_CENTURY).to_radians();
                geocentric(jde, (long + precession, lat, radius))
            }
            planet => {
                let planet = vsop_planet(planet)
                    .ok_or_else(|| CalculationError::new(planet, "not covered by VSOP87"))?;
                geocentric(jde, astro::planet::heliocent_coords(&planet, jde))
            }
        };

        if !radians.is_finite() {
            return Err(CalculationError::new(body, "theory returned a non-finite longitude"));
        }
        Ok(radians.to_degrees().rem_euclid(360.0))
    }
}

fn vsop_planet(body: CelestialBody) -> Option<astro::planet::Planet> {
    use astro::planet::Planet;
    match body {
        CelestialBody::Mercury => Some(Planet::Mercury),
        CelestialBody::Venus => Some(Planet::Venus),
        CelestialBody::Mars => Some(Planet::Mars),
        CelestialBody::Jupiter => Some(Planet::Jupiter),
        CelestialBody::Saturn => Some(Planet::Saturn),
        CelestialBody::Uranus => Some(Planet::Uranus),
        CelestialBody::Neptune => Some(Planet::Neptune),
        CelestialBody::Sun | CelestialBody::Moon | CelestialBody::Pluto => None,
    }
}

/// UT Julian day -> Julian ephemeris day (TT).
fn ephemeris_day(julian_day: JulianDay) -> JulianDay {
    let years = 2000.0 + (julian_day - J2000) / 365.25;
    let year = years.floor();
    let month = ((years - year) * 12.0).floor().clamp(0.0, 11.0) as u8 + 1;
    let delta_t = astro::time::delta_t(year as i32, month);
    astro::time::julian_ephemeris_day(julian_day, delta_t)
}

/// Heliocentric (longitude, latitude, radius) -> geocentric ecliptic longitude,
/// all angles in radians.
fn geocentric(jde: JulianDay, (long, lat, radius): (f64, f64, f64)) -> f64 {
    let (earth_long, earth_lat, earth_radius) = astro::planet::heliocent_coords(&astro::planet::Planet::Earth, jde);
    let x = radius * lat.cos() * long.cos() - earth_radius * earth_lat.cos() * earth_long.cos();
    let y = radius * lat.cos() * long.sin() - earth_radius * earth_lat.cos() * earth_long.sin();
    y.atan2(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ZodiacSign;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn jd(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> JulianDay {
        date_to_julian_day(Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap())
    }

    struct FailingBody(CelestialBody);

    impl LongitudeProvider for FailingBody {
        fn longitude(&self, _julian_day: JulianDay, body: CelestialBody) -> Result<f64, CalculationError> {
            if body == self.0 {
                Err(CalculationError::new(body, "simulated failure"))
            } else {
                Ok(body as usize as f64 * 40.0)
            }
        }
    }

    #[test]
    fn test_julian_day_j2000() {
        assert_abs_diff_eq!(jd(2000, 1, 1, 12, 0), 2451545.0, epsilon = 1e-9);
    }

    #[test]
    fn test_julian_day_with_minutes() {
        // 1987-04-10 is JD 2446895.5 at midnight
        assert_abs_diff_eq!(jd(1987, 4, 10, 19, 21), 2446895.5 + 19.35 / 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_julian_day_january_uses_previous_year() {
        assert_abs_diff_eq!(jd(1990, 1, 1, 0, 0), 2447892.5, epsilon = 1e-9);
        assert_abs_diff_eq!(jd(1990, 3, 1, 0, 0), 2447951.5, epsilon = 1e-9);
    }

    #[test]
    fn test_sun_position() {
        let eph = VsopEphemeris::new();
        let sun = eph.longitude(jd(2023, 5, 17, 12, 0), CelestialBody::Sun).unwrap();
        assert_abs_diff_eq!(sun, 56.3, epsilon = 0.3);

        let sun = eph.longitude(2451545.0, CelestialBody::Sun).unwrap();
        assert_abs_diff_eq!(sun, 280.37, epsilon = 0.2);
    }

    #[test]
    fn test_outer_planets_at_j2000() {
        let eph = VsopEphemeris::new();
        let jupiter = eph.longitude(2451545.0, CelestialBody::Jupiter).unwrap();
        let saturn = eph.longitude(2451545.0, CelestialBody::Saturn).unwrap();
        let pluto = eph.longitude(2451545.0, CelestialBody::Pluto).unwrap();
        assert_eq!(ZodiacSign::from_longitude(jupiter), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(saturn), ZodiacSign::Taurus);
        assert_eq!(ZodiacSign::from_longitude(pluto), ZodiacSign::Sagittarius);
    }

    #[test]
    fn test_moon_moves_about_thirteen_degrees_a_day() {
        let eph = VsopEphemeris::new();
        let start = jd(2023, 5, 17, 0, 0);
        let today = eph.longitude(start, CelestialBody::Moon).unwrap();
        let tomorrow = eph.longitude(start + 1.0, CelestialBody::Moon).unwrap();
        let motion = (tomorrow - today).rem_euclid(360.0);
        assert!((11.0..16.0).contains(&motion), "moon moved {motion} degrees");
    }

    #[test]
    fn test_all_longitudes_normalised() {
        let eph = VsopEphemeris::new();
        for julian_day in [2415020.5, 2440587.5, 2451545.0, 2460000.5] {
            for body in CelestialBody::iter() {
                let longitude = eph.longitude(julian_day, body).unwrap();
                assert!((0.0..360.0).contains(&longitude), "{body} at {julian_day}: {longitude}");
            }
        }
    }

    #[test]
    fn test_pluto_available_outside_series_range() {
        let eph = VsopEphemeris::new();
        let positions = positions_at(&eph, jd(1700, 1, 1, 0, 0));
        assert_eq!(positions.len(), 10);
        assert!(positions.contains_key(&CelestialBody::Pluto));
    }

    #[test]
    fn test_inner_planets_stay_near_the_sun() {
        let eph = VsopEphemeris::new();
        let julian_day = jd(1990, 6, 15, 8, 0);
        let sun = eph.longitude(julian_day, CelestialBody::Sun).unwrap();
        for (body, max_elongation) in [(CelestialBody::Mercury, 28.5), (CelestialBody::Venus, 47.5)] {
            let longitude = eph.longitude(julian_day, body).unwrap();
            let elongation = crate::aspects::angular_separation(sun, longitude);
            assert!(elongation <= max_elongation, "{body} is {elongation} degrees from the sun");
        }
    }

    #[test]
    fn test_non_finite_julian_day_fails_every_body() {
        let eph = VsopEphemeris::new();
        assert!(positions_at(&eph, f64::NAN).is_empty());
    }

    #[test]
    fn test_failed_body_is_omitted() {
        let instant = Utc.with_ymd_and_hms(1990, 6, 15, 8, 0, 0).unwrap();
        let positions = calculate_positions(&FailingBody(CelestialBody::Mars), instant);
        assert_eq!(positions.len(), 9);
        assert!(!positions.contains_key(&CelestialBody::Mars));
        assert_eq!(positions.get(&CelestialBody::Venus), Some(&120.0));
    }
}
