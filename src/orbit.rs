//! Propagation collaborator
//!
//! The engine only needs `propagate(elements, time) -> position + velocity`.
//! [`Propagator`] is that seam. [`CircularOrbitPropagator`] is a small
//! two-body implementation (circular orbits, Earth rotation via GMST) used
//! by the demo binary and the tests; production callers plug in their own
//! propagator (e.g. SGP4 over TLEs) behind the same trait.

use crate::geo::EARTH_RADIUS_KM;
use crate::types::{Entity, GeoCoords, PropagatedState, Velocity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Earth gravitational parameter in km^3/s^2
pub const EARTH_MU_KM3_S2: f64 = 398_600.4418;

/// Unix timestamp of J2000.0 (2000-01-01T12:00:00Z) in milliseconds
const J2000_UNIX_MS: i64 = 946_728_000_000;

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;
pub const GMST_BASE_DEG: f64 = 280.460_618_37;
pub const GMST_ROTATION_PER_DAY: f64 = 360.985_647_366_29;
pub const GMST_CORRECTION: f64 = 0.000_387_933;

/// Computes an entity's geographic position and velocity at a given instant
///
/// Implementations are called concurrently from every compute unit, hence
/// `Send + Sync`. Returning `None` means "no data for this entity at this
/// time"; the entity simply keeps its previous position for the round.
pub trait Propagator: Send + Sync + 'static {
    /// Tracked element set for one entity
    type Elements: Send + Sync + 'static;

    /// Propagate one entity to `time`
    fn propagate(&self, elements: &Self::Elements, time: DateTime<Utc>) -> Option<PropagatedState>;
}

/// Greenwich mean sidereal time in radians
pub fn greenwich_mean_sidereal_time(timestamp: DateTime<Utc>) -> f64 {
    let days_since_j2000 =
        (timestamp.timestamp_millis() - J2000_UNIX_MS) as f64 / (1000.0 * SECONDS_PER_DAY);
    let centuries = days_since_j2000 / DAYS_PER_JULIAN_CENTURY;
    let gmst_degrees = GMST_BASE_DEG
        + GMST_ROTATION_PER_DAY * days_since_j2000
        + GMST_CORRECTION * centuries * centuries
        - centuries * centuries * centuries / 38_710_000.0;
    gmst_degrees.rem_euclid(360.0).to_radians()
}

/// Elements of a circular orbit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircularOrbit {
    /// Altitude above the reference sphere in km
    pub altitude_km: f64,
    /// Inclination in degrees
    pub inclination_deg: f64,
    /// Right ascension of the ascending node in degrees
    pub raan_deg: f64,
    /// Argument of latitude at `epoch` in degrees
    pub phase_deg: f64,
    /// Reference instant for `phase_deg`
    pub epoch: DateTime<Utc>,
}

/// Two-body propagator for [`CircularOrbit`] elements
#[derive(Debug, Clone, Copy)]
pub struct CircularOrbitPropagator {
    /// Radius of the central body in km
    pub radius_km: f64,
    /// Gravitational parameter in km^3/s^2
    pub mu: f64,
}

impl Default for CircularOrbitPropagator {
    fn default() -> Self {
        Self {
            radius_km: EARTH_RADIUS_KM,
            mu: EARTH_MU_KM3_S2,
        }
    }
}

impl CircularOrbitPropagator {
    /// Orbital speed in km/s for a circular orbit at `altitude_km`
    pub fn circular_speed(&self, altitude_km: f64) -> f64 {
        (self.mu / (self.radius_km + altitude_km)).sqrt()
    }
}

impl Propagator for CircularOrbitPropagator {
    type Elements = CircularOrbit;

    fn propagate(&self, orbit: &CircularOrbit, time: DateTime<Utc>) -> Option<PropagatedState> {
        let a = self.radius_km + orbit.altitude_km;
        if orbit.altitude_km < 0.0 || !a.is_finite() {
            return None;
        }

        let dt = (time - orbit.epoch).num_milliseconds() as f64 / 1000.0;
        let mean_motion = (self.mu / (a * a * a)).sqrt();
        let u = orbit.phase_deg.to_radians() + mean_motion * dt;
        let inc = orbit.inclination_deg.to_radians();
        let raan = orbit.raan_deg.to_radians();

        let (sin_u, cos_u) = u.sin_cos();
        let (sin_i, cos_i) = inc.sin_cos();
        let (sin_o, cos_o) = raan.sin_cos();

        // Inertial position
        let x = a * (cos_o * cos_u - sin_o * sin_u * cos_i);
        let y = a * (sin_o * cos_u + cos_o * sin_u * cos_i);
        let z = a * sin_u * sin_i;

        let speed = (self.mu / a).sqrt();
        let velocity = Velocity::new(
            speed * (-cos_o * sin_u - sin_o * cos_u * cos_i),
            speed * (-sin_o * sin_u + cos_o * cos_u * cos_i),
            speed * cos_u * sin_i,
        );

        let gmst = greenwich_mean_sidereal_time(time);
        let lng = (y.atan2(x) - gmst + PI).rem_euclid(2.0 * PI) - PI;
        let lat = (z / a).clamp(-1.0, 1.0).asin();

        Some(PropagatedState {
            position: GeoCoords::new(lat.to_degrees(), lng.to_degrees(), orbit.altitude_km),
            velocity,
        })
    }
}

/// Walker-delta shell: `total` satellites in `planes` evenly spaced planes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkerShell {
    /// Total satellites in the shell
    pub total: usize,
    /// Number of orbital planes
    pub planes: usize,
    /// Walker phasing parameter F
    pub phasing: f64,
    /// Altitude in km
    pub altitude_km: f64,
    /// Inclination in degrees
    pub inclination_deg: f64,
}

impl WalkerShell {
    /// Satellites per plane (remainder satellites are dropped)
    pub fn sats_per_plane(&self) -> usize {
        if self.planes == 0 {
            0
        } else {
            self.total / self.planes
        }
    }

    /// Generate the shell's entities with consecutive ids starting at `first_id`
    pub fn entities(&self, first_id: u32, epoch: DateTime<Utc>) -> Vec<Entity<CircularOrbit>> {
        let per_plane = self.sats_per_plane();
        if per_plane == 0 {
            return Vec::new();
        }

        let raan_step = 360.0 / self.planes as f64;
        let sat_step = 360.0 / per_plane as f64;
        let phase_step = self.phasing * 360.0 / (per_plane * self.planes) as f64;

        let mut entities = Vec::with_capacity(per_plane * self.planes);
        let mut id = first_id;
        for plane in 0..self.planes {
            for slot in 0..per_plane {
                let orbit = CircularOrbit {
                    altitude_km: self.altitude_km,
                    inclination_deg: self.inclination_deg,
                    raan_deg: raan_step * plane as f64,
                    phase_deg: sat_step * slot as f64 + phase_step * plane as f64,
                    epoch,
                };
                entities.push(Entity::new(id, orbit).with_name(format!("SHELL-P{}-S{}", plane, slot)));
                id += 1;
            }
        }
        entities
    }
}
