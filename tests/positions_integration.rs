//! Integration tests for bulk position updates
//!
//! These tests validate:
//! - Copy-back equals what the propagator returned for `(entity, t)`
//! - Results of a round abandoned by `load` never reach the new entity set

mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::mock_helpers::{release, Marker, MarkerPropagator};
use common::poll_until;
use satmesh_rs::{
    BulkPositionUpdater, CircularOrbitPropagator, Entity, Propagator, WalkerShell,
};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
}

fn markers(n: u32, base: f64) -> Vec<Entity<Marker>> {
    (0..n).map(|i| Entity::new(i, base + i as f64)).collect()
}

#[test]
fn test_round_trip_with_circular_orbits() {
    let shell = WalkerShell {
        total: 60,
        planes: 5,
        phasing: 1.0,
        altitude_km: 780.0,
        inclination_deg: 86.4,
    };
    let mut entities = shell.entities(0, epoch());
    let propagator = CircularOrbitPropagator::default();
    let mut updater = BulkPositionUpdater::new(4, propagator).unwrap();
    updater.load(&entities);

    let t = epoch() + Duration::minutes(42);
    updater.start_round(t).unwrap();
    poll_until("position round", || updater.try_finish_round(&mut entities, t).unwrap());

    for (i, entity) in entities.iter().enumerate() {
        let expected = propagator.propagate(&entity.elements, t).unwrap();
        assert_eq!(entity.position, expected.position, "entity {}", i);
        assert_eq!(entity.speed, expected.speed());
        assert_eq!(updater.position(i), Some(expected.position));
    }
}

#[test]
fn test_reload_discards_abandoned_round() {
    let (propagator, gate) = MarkerPropagator::gated(epoch());
    let reference = MarkerPropagator::new(epoch());
    let mut updater = BulkPositionUpdater::new(3, propagator).unwrap();

    let old = markers(12, 10.0);
    updater.load(&old);
    updater.start_round(epoch()).unwrap();

    let mut replacement = markers(12, 50.0);
    updater.load(&replacement);
    release(&gate, 24);

    let t = epoch() + Duration::minutes(3);
    poll_until("replacement round", || {
        updater.try_finish_round(&mut replacement, t).unwrap()
    });

    for (i, entity) in replacement.iter().enumerate() {
        assert_eq!(entity.position, reference.expected(50.0 + i as f64, t));
        assert_eq!(entity.speed, 7.5);
    }
    assert!(updater.stats().stale_reports <= 3);
    assert_eq!(updater.stats().rounds_abandoned, 1);

    // Completion started the next gated round; release it so Drop can join
    release(&gate, 12);
}

#[test]
fn test_continuous_rounds_track_time() {
    let reference = MarkerPropagator::new(epoch());
    let mut updater = BulkPositionUpdater::new(2, MarkerPropagator::new(epoch())).unwrap();
    let mut entities = markers(5, 1.0);
    updater.load(&entities);

    let mut minute = 0;
    let mut applied = 0;
    poll_until("three applied rounds", || {
        minute += 1;
        let t = epoch() + Duration::minutes(minute);
        if updater.try_finish_round(&mut entities, t).unwrap() {
            applied += 1;
        }
        applied == 3
    });

    // Each applied round was started at an earlier frame's time
    let lng = entities[0].position.lng;
    assert!(lng > reference.expected(1.0, epoch()).lng);
    assert!(lng < 1.0 + minute as f64);
    assert_eq!(updater.rounds_applied(), 3);
}
