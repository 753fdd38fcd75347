// src/error.rs

use thiserror::Error;

use crate::CelestialBody;

/// A single body could not be computed. Never aborts a chart.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot compute {body}: {message}")]
pub struct CalculationError {
    pub body: CelestialBody,
    pub message: String,
}

impl CalculationError {
    pub fn new(body: CelestialBody, message: impl Into<String>) -> Self {
        CalculationError {
            body,
            message: message.into(),
        }
    }
}

/// Failures of the lookup services and the transport.
#[derive(Debug, Error)]
pub enum AstrologyError {
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("Geocoding Error: {0}")]
    Geocode(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
}
