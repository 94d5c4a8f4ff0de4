//! Spatial query utilities for distance calculations and input checks.
//!
//! Uses Haversine formula for accurate distances on Earth's surface.

use geo::{HaversineDistance, Point};

use crate::models::types::{Result, TransitError};

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// Reject coordinates outside the WGS84 range before any lookup happens
pub fn validate_point(lat: f64, lon: f64) -> Result<Point> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(TransitError::InvalidInput(format!("latitude {lat} out of range")));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(TransitError::InvalidInput(format!("longitude {lon} out of range")));
    }
    Ok(Point::new(lon, lat))
}

pub fn validate_radius(radius_m: f64) -> Result<f64> {
    if radius_m <= 0.0 || !radius_m.is_finite() {
        return Err(TransitError::InvalidInput(format!(
            "radius must be a positive number of meters, got {radius_m}"
        )));
    }
    Ok(radius_m)
}
