// src/lib.rs

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod aspects;
pub mod config;
pub mod conversation;
pub mod ephemeris;
pub mod error;
pub mod geocode;
pub mod interpret;
pub mod pipeline;
pub mod telegram;
pub mod time;

pub use aspects::calculate_aspects;
pub use config::{BotConfig, ConfigError};
pub use conversation::{Conversation, DialogueState, Reply, Session};
pub use ephemeris::{calculate_positions, date_to_julian_day, LongitudeProvider, VsopEphemeris};
pub use error::{AstrologyError, CalculationError};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use interpret::{interpret, PredictionTopic};
pub use pipeline::{ChartInfo, Services};
pub use time::{to_universal, TimezoneResolver, TzfResolver};

// ---------------------------
// ## Enumerations
// ---------------------------

/// The ten bodies tracked by the chart. Declaration order is the canonical
/// order used for pair enumeration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CelestialBody {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
}

impl CelestialBody {
    pub const ALL: [CelestialBody; 10] = [
        CelestialBody::Sun,
        CelestialBody::Moon,
        CelestialBody::Mercury,
        CelestialBody::Venus,
        CelestialBody::Mars,
        CelestialBody::Jupiter,
        CelestialBody::Saturn,
        CelestialBody::Uranus,
        CelestialBody::Neptune,
        CelestialBody::Pluto,
    ];

    pub fn iter() -> impl Iterator<Item = CelestialBody> {
        Self::ALL.iter().copied()
    }

    /// Russian name as it appears in prediction texts.
    pub fn name_ru(self) -> &'static str {
        match self {
            CelestialBody::Sun => "Солнце",
            CelestialBody::Moon => "Луна",
            CelestialBody::Mercury => "Меркурий",
            CelestialBody::Venus => "Венера",
            CelestialBody::Mars => "Марс",
            CelestialBody::Jupiter => "Юпитер",
            CelestialBody::Saturn => "Сатурн",
            CelestialBody::Uranus => "Уран",
            CelestialBody::Neptune => "Нептун",
            CelestialBody::Pluto => "Плутон",
        }
    }
}

impl fmt::Display for CelestialBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries = 0,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    /// `floor(longitude / 30) mod 12`.
    pub fn from_longitude(longitude: f64) -> Self {
        let sign_index = (longitude / 30.0).floor().rem_euclid(12.0) as usize;
        Self::ALL[sign_index % 12]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign_str = match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        };
        write!(f, "{}", sign_str)
    }
}

/// Major aspects in the order they are tested against a separation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aspect {
    Conjunction,
    Sextile,
    Square,
    Trine,
    Opposition,
}

impl Aspect {
    pub const ALL: [Aspect; 5] = [
        Aspect::Conjunction,
        Aspect::Sextile,
        Aspect::Square,
        Aspect::Trine,
        Aspect::Opposition,
    ];

    pub fn angle(self) -> f64 {
        match self {
            Aspect::Conjunction => 0.0,
            Aspect::Sextile => 60.0,
            Aspect::Square => 90.0,
            Aspect::Trine => 120.0,
            Aspect::Opposition => 180.0,
        }
    }

    pub fn name_ru(self) -> &'static str {
        match self {
            Aspect::Conjunction => "соединение",
            Aspect::Sextile => "секстиль",
            Aspect::Square => "квадрат",
            Aspect::Trine => "трин",
            Aspect::Opposition => "оппозиция",
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} ({}°)", self, self.angle())
    }
}

// ---------------------------
// ## Structures
// ---------------------------

pub type JulianDay = f64;

/// Ecliptic longitude per body. Bodies whose computation failed are absent.
pub type PlanetPositions = BTreeMap<CelestialBody, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectInfo {
    pub aspect: Aspect,
    pub planet1: CelestialBody,
    pub planet2: CelestialBody,
    pub orb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Location { latitude, longitude }
    }

    pub fn moscow() -> Self { Location { latitude: 55.7558, longitude: 37.6173 } }
    pub fn novosibirsk() -> Self { Location { latitude: 55.0084, longitude: 82.9357 } }
}

/// Everything the dialogue collects before a prediction can be made.
#[derive(Debug, Clone, PartialEq)]
pub struct BirthInfo {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub place: String,
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_buckets_respect_boundaries() {
        assert_eq!(ZodiacSign::from_longitude(0.0).index(), 0);
        assert_eq!(ZodiacSign::from_longitude(29.999).index(), 0);
        assert_eq!(ZodiacSign::from_longitude(30.0).index(), 1);
        assert_eq!(ZodiacSign::from_longitude(359.999).index(), 11);
        assert_eq!(ZodiacSign::from_longitude(360.0).index(), 0);
    }

    #[test]
    fn sign_from_longitude_names() {
        assert_eq!(ZodiacSign::from_longitude(95.0), ZodiacSign::Cancer);
        assert_eq!(ZodiacSign::from_longitude(280.4), ZodiacSign::Capricorn);
        assert_eq!(ZodiacSign::from_longitude(-10.0), ZodiacSign::Pisces);
    }

    #[test]
    fn bodies_iterate_in_canonical_order() {
        let bodies: Vec<_> = CelestialBody::iter().collect();
        assert_eq!(bodies.len(), 10);
        assert_eq!(bodies.first(), Some(&CelestialBody::Sun));
        assert_eq!(bodies.last(), Some(&CelestialBody::Pluto));
        assert!(bodies.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn aspect_angles_are_ascending() {
        let angles: Vec<f64> = Aspect::ALL.iter().map(|aspect| aspect.angle()).collect();
        assert_eq!(angles, vec![0.0, 60.0, 90.0, 120.0, 180.0]);
    }
}
