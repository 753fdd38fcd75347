// src/geocode.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use urlencoding::encode;

use crate::error::AstrologyError;
use crate::Location;

/// Place name -> coordinates. `Ok(None)` means the service knows no such place.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> Result<Option<Location>, AstrologyError>;
}

// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// OpenStreetMap Nominatim search client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, AstrologyError> {
        let client = Client::builder().user_agent(user_agent).timeout(timeout).build()?;
        Ok(NominatimGeocoder {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, place: &str) -> String {
        format!("{}/search?q={}&format=json&limit=1", self.base_url, encode(place))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Location>, AstrologyError> {
        let response = self.client.get(self.search_url(place)).send().await?;

        if !response.status().is_success() {
            return Err(AstrologyError::Geocode(format!(
                "HTTP request failed with status: {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        places.first().map(parse_place).transpose()
    }
}

fn parse_place(place: &NominatimPlace) -> Result<Location, AstrologyError> {
    let latitude: f64 = place
        .lat
        .parse()
        .map_err(|_| AstrologyError::Geocode(format!("bad latitude {:?}", place.lat)))?;
    let longitude: f64 = place
        .lon
        .parse()
        .map_err(|_| AstrologyError::Geocode(format!("bad longitude {:?}", place.lon)))?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AstrologyError::Geocode(format!(
            "coordinates out of range: {latitude}, {longitude}"
        )));
    }
    debug!(name = %place.display_name, latitude, longitude, "geocoded place");
    Ok(Location::new(latitude, longitude))
}
