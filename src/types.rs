//! Core data types for SatMesh
//!
//! The engine treats entities as opaque apart from their identity, their
//! geographic position and the tracked elements handed to the propagation
//! collaborator. Rendering-side state (Cartesian scene positions, colours,
//! selection) lives with the caller, not here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a tracked entity (satellite catalog number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(value: u32) -> Self {
        EntityId(value)
    }
}

/// Geographic position: latitude/longitude in degrees, altitude in km above the reference sphere
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoCoords {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Altitude in kilometres
    pub alt: f64,
}

impl GeoCoords {
    /// Create a new position
    pub const fn new(lat: f64, lng: f64, alt: f64) -> Self {
        Self { lat, lng, alt }
    }

    /// A point on the surface (zero altitude)
    pub const fn surface(lat: f64, lng: f64) -> Self {
        Self { lat, lng, alt: 0.0 }
    }

    /// Whether lat/lng are both exactly zero.
    ///
    /// Result buffers start zeroed, so a `(0, 0)` row is read as "not written
    /// this round". A real entity sitting exactly on the null island point is
    /// skipped for one round as a consequence.
    pub fn is_unset(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

impl fmt::Display for GeoCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.1} km)", self.lat, self.lng, self.alt)
    }
}

/// Velocity vector in km/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Velocity {
    /// Create a new velocity vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Scalar speed in km/s
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Output of the propagation collaborator for one entity at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PropagatedState {
    /// Geographic position
    pub position: GeoCoords,
    /// Velocity vector
    pub velocity: Velocity,
}

impl PropagatedState {
    /// Scalar speed in km/s
    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }
}

/// A tracked moving node (satellite)
///
/// `E` is the element set the propagation collaborator consumes. Code that
/// only needs identity and position (graph building, tests) can use `()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<E = ()> {
    /// Stable identifier
    pub id: EntityId,
    /// Optional display name
    pub name: Option<String>,
    /// Current geographic position
    pub position: GeoCoords,
    /// Current scalar speed in km/s
    pub speed: f64,
    /// Tracked elements handed to the propagator
    pub elements: E,
}

impl<E> Entity<E> {
    /// Create a new entity at the null position
    pub fn new(id: impl Into<EntityId>, elements: E) -> Self {
        Self {
            id: id.into(),
            name: None,
            position: GeoCoords::default(),
            speed: 0.0,
            elements,
        }
    }

    /// Set the initial position
    pub fn with_position(mut self, position: GeoCoords) -> Self {
        self.position = position;
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Entity<()> {
    /// Create a position-only entity
    pub fn at(id: impl Into<EntityId>, position: GeoCoords) -> Self {
        Entity::new(id, ()).with_position(position)
    }
}

/// Anything with a stable identity and a current geographic position
pub trait Tracked {
    /// Stable identifier
    fn id(&self) -> EntityId;

    /// Current geographic position
    fn position(&self) -> GeoCoords;
}

impl<E> Tracked for Entity<E> {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> GeoCoords {
        self.position
    }
}

impl<T: Tracked + ?Sized> Tracked for &T {
    fn id(&self) -> EntityId {
        (**self).id()
    }

    fn position(&self) -> GeoCoords {
        (**self).position()
    }
}
