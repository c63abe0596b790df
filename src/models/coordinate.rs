use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, AppError> {
        let coordinate = Self { lat, lng };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::BadRequest(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }

        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::BadRequest(format!(
                "longitude {} outside [-180, 180]",
                self.lng
            )));
        }

        Ok(())
    }
}
