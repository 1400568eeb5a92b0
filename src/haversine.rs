//! Great-circle distance between task locations.
//!
//! Straight-line only: no road network, no traffic. Good enough to order
//! stops within a single courier run.

use serde::{Deserialize, Serialize};

use crate::error::SequencingError;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Distance to another point in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }

    /// Rejects latitudes outside [-90, 90] and longitudes outside [-180, 180].
    ///
    /// NaN fails both range checks and is rejected as well.
    pub fn validate(&self) -> Result<(), SequencingError> {
        let lat_ok = (-90.0..=90.0).contains(&self.lat);
        let lon_ok = (-180.0..=180.0).contains(&self.lon);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(SequencingError::InvalidCoordinates {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }
}

/// Haversine distance between two points in kilometers.
///
/// NaN inputs propagate as NaN.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Distance between two optional locations.
///
/// A missing location on either side is infinitely far, so an unlocated task
/// never wins a nearest-neighbor comparison against a located one.
pub fn distance_between(from: Option<&GeoPoint>, to: Option<&GeoPoint>) -> f64 {
    match (from, to) {
        (Some(from), Some(to)) => from.distance_km(to),
        _ => f64::INFINITY,
    }
}

/// Convert a distance in km to whole travel minutes, rounded up.
pub fn travel_minutes(km: f64, speed_kmh: f64) -> i64 {
    let hours = km / speed_kmh;
    (hours * 60.0).ceil() as i64
}

/// Travel minutes between two optional locations; 0 when either is missing.
pub fn leg_minutes(from: Option<&GeoPoint>, to: Option<&GeoPoint>, speed_kmh: f64) -> i64 {
    match (from, to) {
        (Some(from), Some(to)) => travel_minutes(from.distance_km(to), speed_kmh),
        _ => 0,
    }
}
