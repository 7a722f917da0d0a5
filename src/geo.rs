//! Distance collaborator.
//!
//! The proximity threshold, the A* edge weights and the A* heuristic all go
//! through a single [`Metric`]. A* stays optimal as long as the metric obeys
//! the triangle inequality, which holds for the straight-line chord metric
//! shipped here.

use crate::types::GeoCoords;

/// Mean Earth radius in km used by the spherical model
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Symmetric, non-negative distance between two geographic positions
pub trait Metric: Send + Sync + 'static {
    /// Distance in km
    fn distance(&self, a: &GeoCoords, b: &GeoCoords) -> f64;
}

impl<M: Metric + ?Sized> Metric for std::sync::Arc<M> {
    fn distance(&self, a: &GeoCoords, b: &GeoCoords) -> f64 {
        (**self).distance(a, b)
    }
}

/// Straight-line (chord) distance between two points on a spherical Earth,
/// each lifted by its altitude.
#[derive(Debug, Clone, Copy)]
pub struct ChordMetric {
    /// Radius of the reference sphere in km
    pub radius_km: f64,
}

impl Default for ChordMetric {
    fn default() -> Self {
        Self {
            radius_km: EARTH_RADIUS_KM,
        }
    }
}

impl Metric for ChordMetric {
    fn distance(&self, a: &GeoCoords, b: &GeoCoords) -> f64 {
        let lat1 = a.lat.to_radians();
        let lat2 = b.lat.to_radians();
        let dlng = (a.lng - b.lng).to_radians();

        let r1 = a.alt + self.radius_km;
        let r2 = b.alt + self.radius_km;

        let cos_angle = lat1.cos() * lat2.cos() * dlng.cos() + lat1.sin() * lat2.sin();
        // Rounding can push the radicand a hair below zero for identical points.
        (r1 * r1 + r2 * r2 - 2.0 * r1 * r2 * cos_angle).max(0.0).sqrt()
    }
}
