// src/pipeline.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::aspects::calculate_aspects;
use crate::config::BotConfig;
use crate::ephemeris::{date_to_julian_day, positions_at, LongitudeProvider, VsopEphemeris};
use crate::error::AstrologyError;
use crate::geocode::{Geocoder, NominatimGeocoder};
use crate::interpret::{interpret, PredictionTopic};
use crate::time::{to_universal, TimezoneResolver, TzfResolver};
use crate::{AspectInfo, BirthInfo, JulianDay, Location, PlanetPositions};

/// Everything the interpreter needs about one birth moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartInfo {
    pub instant: DateTime<Utc>,
    pub julian_day: JulianDay,
    pub planets: PlanetPositions,
    pub aspects: Vec<AspectInfo>,
}

impl ChartInfo {
    pub fn calculate(ephemeris: &dyn LongitudeProvider, instant: DateTime<Utc>) -> Self {
        let julian_day = date_to_julian_day(instant);
        let planets = positions_at(ephemeris, julian_day);
        let aspects = calculate_aspects(&planets);
        ChartInfo {
            instant,
            julian_day,
            planets,
            aspects,
        }
    }

    pub fn interpret(&self, topic: Option<PredictionTopic>) -> String {
        interpret(&self.planets, &self.aspects, topic)
    }
}

/// The external collaborators of the pipeline.
#[derive(Clone)]
pub struct Services {
    pub geocoder: Arc<dyn Geocoder>,
    pub zones: Arc<dyn TimezoneResolver>,
    pub ephemeris: Arc<dyn LongitudeProvider>,
    pub lookup_timeout: Duration,
}

impl Services {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        zones: Arc<dyn TimezoneResolver>,
        ephemeris: Arc<dyn LongitudeProvider>,
        lookup_timeout: Duration,
    ) -> Self {
        Services {
            geocoder,
            zones,
            ephemeris,
            lookup_timeout,
        }
    }

    /// Nominatim, the bundled timezone polygons and the VSOP87 ephemeris.
    pub fn from_config(config: &BotConfig) -> Result<Self, AstrologyError> {
        let geocoder = NominatimGeocoder::new(&config.geocoder_url, &config.user_agent, config.lookup_timeout())?;
        info!(geocoder = %config.geocoder_url, "loading timezone polygons");
        Ok(Services::new(
            Arc::new(geocoder),
            Arc::new(TzfResolver::new()),
            Arc::new(VsopEphemeris::new()),
            config.lookup_timeout(),
        ))
    }

    /// Coordinates of `place`; errors and timeouts count as "not found".
    pub async fn locate(&self, place: &str) -> Option<Location> {
        match timeout(self.lookup_timeout, self.geocoder.geocode(place)).await {
            Ok(Ok(location)) => location,
            Ok(Err(err)) => {
                warn!(place, error = %err, "geocoding failed");
                None
            }
            Err(_) => {
                warn!(place, timeout = ?self.lookup_timeout, "geocoding timed out");
                None
            }
        }
    }

    /// Zone name at `location`, looked up on a blocking thread.
    pub async fn timezone_at(&self, location: Location) -> Option<String> {
        let zones = Arc::clone(&self.zones);
        let lookup = tokio::task::spawn_blocking(move || zones.timezone_at(&location));
        match timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(zone)) => zone,
            Ok(Err(err)) => {
                warn!(error = %err, "timezone lookup task failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.lookup_timeout, "timezone lookup timed out");
                None
            }
        }
    }

    /// Universal instant of a local birth moment. A failed or timed-out zone
    /// lookup means the wall clock is read as UTC.
    pub async fn resolve(&self, date: NaiveDate, time: NaiveTime, location: Location) -> DateTime<Utc> {
        let zone = self.timezone_at(location).await;
        to_universal(date.and_time(time), zone.as_deref())
    }

    pub async fn resolve_instant(&self, birth_info: &BirthInfo) -> DateTime<Utc> {
        self.resolve(birth_info.date, birth_info.time, birth_info.location).await
    }

    pub async fn chart(&self, birth_info: &BirthInfo) -> ChartInfo {
        let instant = self.resolve_instant(birth_info).await;
        let chart = ChartInfo::calculate(self.ephemeris.as_ref(), instant);
        debug!(
            place = %birth_info.place,
            %instant,
            bodies = chart.planets.len(),
            aspects = chart.aspects.len(),
            "chart calculated"
        );
        chart
    }

    pub async fn predict(&self, birth_info: &BirthInfo, topic: Option<PredictionTopic>) -> String {
        self.chart(birth_info).await.interpret(topic)
    }
}
