#[macro_use]
extern crate assert_float_eq;

pub mod test_utils;

use rand::Rng;
use route_drawing_core::controller::{PointSetController, SessionState};
use route_drawing_core::gateway::{GatewayError, MemoryGateway, PersistenceGateway};
use route_drawing_core::point::{Point, PointSequence};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{init_logger, memory_controller, points};

/// Reads the store right away but reports the result only after `delay`.
struct SlowLoadGateway {
    inner: Arc<MemoryGateway>,
    delay: Duration,
    reads: AtomicUsize,
}

impl PersistenceGateway for SlowLoadGateway {
    fn save(&self, user_id: &str, markers: &[Point]) -> Result<(), GatewayError> {
        self.inner.save(user_id, markers)
    }

    fn load(&self, user_id: &str) -> Result<PointSequence, GatewayError> {
        let result = self.inner.load(user_id);
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        result
    }
}

struct PanickingGateway;

impl PersistenceGateway for PanickingGateway {
    fn save(&self, _user_id: &str, _markers: &[Point]) -> Result<(), GatewayError> {
        Ok(())
    }

    fn load(&self, _user_id: &str) -> Result<PointSequence, GatewayError> {
        panic!("store blew up");
    }
}

#[tokio::test]
async fn click_scenario() {
    let (mut controller, _gateway) = memory_controller();
    controller.initialize("alice");
    controller.settle().await;

    assert_eq!(controller.toggle_point(11.0, 78.0), &points(&[(11.0, 78.0)])[..]);
    assert_eq!(controller.route_view().distance_km, 0.0);

    assert_eq!(controller.toggle_point(11.1, 78.1).len(), 2);
    let view = controller.route_view();
    assert!(!view.is_degenerate());
    assert_float_absolute_eq!(view.distance_km, 15.58, 0.01);
    assert_eq!(view.distance_text(), "Total Distance: 15.58 km");

    assert_eq!(controller.toggle_point(11.0, 78.0), &points(&[(11.1, 78.1)])[..]);
    let view = controller.route_view();
    assert_eq!(view.distance_km, 0.0);
    assert!(view.is_degenerate());
}

#[tokio::test]
async fn toggle_twice_restores_sequence() {
    let (mut controller, _gateway) = memory_controller();
    controller.initialize("alice");
    controller.settle().await;

    let mut rng = rand::rng();
    for _ in 0..20 {
        controller.toggle_point(rng.random_range(-80.0..80.0), rng.random_range(-170.0..170.0));
    }
    let before = controller.sequence().to_vec();
    let distance_before = controller.route_view().distance_km;

    // out of the range used above, can't be in the sequence
    let (lat, lng) = (85.5, 175.25);
    controller.toggle_point(lat, lng);
    assert_eq!(controller.sequence().len(), before.len() + 1);
    assert_eq!(controller.sequence().last(), Some(&Point::new(lat, lng)));

    controller.toggle_point(lat, lng);
    assert_eq!(controller.sequence(), &before[..]);
    assert_float_absolute_eq!(controller.route_view().distance_km, distance_before, 1e-9);
}

#[tokio::test]
async fn load_restores_stored_points() {
    let (mut controller, gateway) = memory_controller();
    let stored = points(&[(11.0, 78.0), (11.1, 78.1)]);
    gateway.save("alice", &stored).unwrap();

    controller.initialize("alice");
    assert_eq!(controller.session().unwrap().state(), SessionState::Loading);
    let view = controller.settle().await;

    assert_eq!(controller.session().unwrap().state(), SessionState::Settled);
    assert_eq!(controller.sequence(), &stored[..]);
    assert_eq!(view.line, stored);
    assert_float_absolute_eq!(view.distance_km, 15.58, 0.01);
}

#[tokio::test]
async fn double_load_does_not_duplicate() {
    let (mut controller, gateway) = memory_controller();
    let stored = points(&[(11.0, 78.0), (11.1, 78.1), (11.2, 78.0)]);
    gateway.save("alice", &stored).unwrap();

    controller.initialize("alice");
    controller.load();
    controller.settle().await;
    assert_eq!(controller.sequence(), &stored[..]);

    controller.load();
    controller.settle().await;
    assert_eq!(controller.sequence(), &stored[..]);
}

#[tokio::test]
async fn load_drops_duplicates_inside_stored_data() {
    let (mut controller, gateway) = memory_controller();
    gateway.put_raw(
        "alice",
        r#"[{"lat":1.0,"lng":2.0},{"lat":3.0,"lng":4.0},{"lat":1.0,"lng":2.0}]"#,
    );

    controller.initialize("alice");
    controller.settle().await;
    assert_eq!(controller.sequence(), &points(&[(1.0, 2.0), (3.0, 4.0)])[..]);
}

#[tokio::test]
async fn switch_user_replaces_sequence() {
    let (mut controller, gateway) = memory_controller();
    let bob_points = points(&[(12.0, 77.0), (12.5, 77.5)]);
    gateway.save("bob", &bob_points).unwrap();

    controller.initialize("alice");
    controller.settle().await;
    controller.toggle_point(11.0, 78.0);
    controller.toggle_point(11.1, 78.1);
    controller.flush_saves().await;

    controller.switch_user("bob");
    // nothing from alice is left, even before bob's data arrives
    assert_eq!(controller.user_id(), Some("bob"));
    assert!(controller.sequence().is_empty());
    assert!(controller.renderer().line().is_empty());
    assert_eq!(controller.route_view().distance_km, 0.0);

    controller.settle().await;
    assert_eq!(controller.sequence(), &bob_points[..]);
    assert_eq!(controller.renderer().line(), &bob_points[..]);

    // alice's points were saved before the switch
    assert_eq!(
        gateway.stored("alice"),
        Some(points(&[(11.0, 78.0), (11.1, 78.1)]))
    );
}

#[tokio::test]
async fn stale_load_is_discarded() {
    let (mut controller, gateway) = memory_controller();
    gateway
        .save("alice", &points(&[(1.0, 1.0), (2.0, 2.0)]))
        .unwrap();
    gateway.save("bob", &points(&[(3.0, 3.0)])).unwrap();

    controller.initialize("alice");
    controller.switch_user("bob");
    controller.settle().await;

    // give alice's load time to land, it must still be ignored
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.apply_pending_loads();

    assert_eq!(controller.sequence(), &points(&[(3.0, 3.0)])[..]);
}

#[tokio::test]
async fn apply_pending_loads_picks_up_completed_load() {
    let (mut controller, gateway) = memory_controller();
    gateway.save("alice", &points(&[(5.0, 5.0)])).unwrap();

    controller.initialize("alice");
    let mut applied = 0;
    for _ in 0..200 {
        applied += controller.apply_pending_loads();
        if applied > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(applied, 1);
    assert_eq!(controller.sequence(), &points(&[(5.0, 5.0)])[..]);
    assert_eq!(controller.session().unwrap().state(), SessionState::Settled);
}

#[tokio::test]
async fn every_mutation_is_saved() {
    let (mut controller, gateway) = memory_controller();
    controller.initialize("alice");
    controller.settle().await;

    controller.toggle_point(11.0, 78.0);
    controller.flush_saves().await;
    assert_eq!(gateway.stored("alice"), Some(points(&[(11.0, 78.0)])));

    controller.toggle_point(11.1, 78.1);
    controller.flush_saves().await;
    assert_eq!(
        gateway.stored("alice"),
        Some(points(&[(11.0, 78.0), (11.1, 78.1)]))
    );

    controller.toggle_point(11.0, 78.0);
    controller.flush_saves().await;
    assert_eq!(gateway.stored("alice"), Some(points(&[(11.1, 78.1)])));
    assert_eq!(gateway.save_count(), 3);
}

#[tokio::test]
async fn failed_save_keeps_local_state() {
    let (mut controller, gateway) = memory_controller();
    controller.initialize("alice");
    controller.settle().await;

    gateway.set_available(false);
    controller.toggle_point(11.0, 78.0);
    controller.toggle_point(11.1, 78.1);
    controller.flush_saves().await;

    assert_eq!(controller.sequence().len(), 2);
    assert_float_absolute_eq!(controller.route_view().distance_km, 15.58, 0.01);
    assert_eq!(gateway.save_count(), 0);

    gateway.set_available(true);
    assert_eq!(gateway.stored("alice"), None);
}

#[tokio::test]
async fn failed_load_leaves_session_empty() {
    let (mut controller, gateway) = memory_controller();
    gateway.save("alice", &points(&[(1.0, 1.0)])).unwrap();
    gateway.set_available(false);

    controller.initialize("alice");
    let view = controller.settle().await;
    assert!(controller.sequence().is_empty());
    assert!(view.line.is_empty());
    assert_eq!(controller.session().unwrap().state(), SessionState::Settled);
}

#[tokio::test]
async fn malformed_record_leaves_session_empty() {
    let (mut controller, gateway) = memory_controller();
    gateway.put_raw("alice", "{not json");

    controller.initialize("alice");
    controller.settle().await;
    assert!(controller.sequence().is_empty());

    // the session is still usable
    controller.toggle_point(1.0, 2.0);
    assert_eq!(controller.sequence(), &points(&[(1.0, 2.0)])[..]);
}

#[tokio::test]
async fn remove_point() {
    let (mut controller, gateway) = memory_controller();
    controller.initialize("alice");
    controller.settle().await;
    controller.toggle_point(1.0, 1.0);
    controller.toggle_point(2.0, 2.0);
    controller.toggle_point(3.0, 3.0);
    controller.flush_saves().await;
    let saves = gateway.save_count();

    let remaining = controller.remove_point(&Point::new(2.0, 2.0)).to_vec();
    assert_eq!(remaining, points(&[(1.0, 1.0), (3.0, 3.0)]));
    assert_eq!(controller.renderer().line(), &remaining[..]);
    controller.flush_saves().await;
    assert_eq!(gateway.save_count(), saves + 1);
    assert_eq!(gateway.stored("alice"), Some(remaining.clone()));

    // unknown point: no change, no save
    controller.remove_point(&Point::new(9.0, 9.0));
    controller.flush_saves().await;
    assert_eq!(controller.sequence(), &remaining[..]);
    assert_eq!(gateway.save_count(), saves + 1);
}

#[tokio::test]
async fn empty_user_id_is_ignored() {
    let (mut controller, gateway) = memory_controller();
    controller.initialize("");
    assert!(controller.session().is_none());

    controller.initialize("alice");
    controller.settle().await;
    controller.toggle_point(1.0, 1.0);
    controller.switch_user("");
    assert_eq!(controller.user_id(), Some("alice"));
    assert_eq!(controller.sequence().len(), 1);

    controller.flush_saves().await;
    assert_eq!(gateway.stored(""), None);
}

#[tokio::test]
async fn toggle_without_session_does_nothing() {
    let (mut controller, gateway) = memory_controller();
    assert!(controller.toggle_point(1.0, 1.0).is_empty());
    controller.save();
    controller.flush_saves().await;
    assert_eq!(gateway.save_count(), 0);
    assert!(controller.settle().await.line.is_empty());
}

#[tokio::test]
async fn click_during_load_keeps_stored_points() {
    init_logger();
    let store = Arc::new(MemoryGateway::new());
    store.save("alice", &points(&[(1.0, 1.0), (2.0, 2.0)])).unwrap();
    let gateway = Arc::new(SlowLoadGateway {
        inner: store.clone(),
        delay: Duration::from_millis(100),
        reads: AtomicUsize::new(0),
    });
    let mut controller =
        PointSetController::new(gateway.clone(), tokio::runtime::Handle::current());

    controller.initialize("alice");
    // click only once the load has read the old record
    while gateway.reads.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        controller.session().unwrap().state(),
        SessionState::Loading
    );
    controller.toggle_point(3.0, 3.0);
    controller.flush_saves().await;
    // the click was saved on its own while the load was still running
    assert_eq!(store.stored("alice"), Some(points(&[(3.0, 3.0)])));

    controller.settle().await;
    controller.flush_saves().await;

    let expected = points(&[(3.0, 3.0), (1.0, 1.0), (2.0, 2.0)]);
    assert_eq!(controller.sequence(), &expected[..]);
    assert_eq!(store.stored("alice"), Some(expected));
}

#[tokio::test]
async fn load_into_empty_session_does_not_save() {
    let (mut controller, gateway) = memory_controller();
    gateway.save("alice", &points(&[(1.0, 1.0)])).unwrap();

    controller.initialize("alice");
    controller.settle().await;
    controller.flush_saves().await;
    assert_eq!(gateway.save_count(), 1);
}

#[tokio::test]
async fn panicking_load_still_settles() {
    init_logger();
    let mut controller =
        PointSetController::new(Arc::new(PanickingGateway), tokio::runtime::Handle::current());

    controller.initialize("alice");
    let view = tokio::time::timeout(Duration::from_secs(5), controller.settle())
        .await
        .expect("settle did not return");
    assert!(view.line.is_empty());
    assert_eq!(controller.session().unwrap().state(), SessionState::Settled);

    controller.toggle_point(1.0, 1.0);
    assert_eq!(controller.sequence(), &points(&[(1.0, 1.0)])[..]);
}

#[tokio::test]
async fn non_finite_points_are_rejected() {
    let (mut controller, gateway) = memory_controller();
    controller.initialize("alice");
    controller.settle().await;
    controller.toggle_point(1.0, 1.0);
    controller.flush_saves().await;
    let saves = gateway.save_count();

    assert_eq!(controller.toggle_point(f64::NAN, 1.0), &points(&[(1.0, 1.0)])[..]);
    controller.toggle_point(1.0, f64::INFINITY);
    controller.toggle_point(f64::NEG_INFINITY, 0.0);
    controller.flush_saves().await;

    assert_eq!(controller.sequence(), &points(&[(1.0, 1.0)])[..]);
    assert_eq!(gateway.save_count(), saves);

    // what is stored still loads
    controller.switch_user("alice");
    controller.settle().await;
    assert_eq!(controller.sequence(), &points(&[(1.0, 1.0)])[..]);
}
