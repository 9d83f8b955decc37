#![allow(dead_code)]

use route_drawing_core::controller::PointSetController;
use route_drawing_core::gateway::MemoryGateway;
use route_drawing_core::point::Point;
use std::sync::Arc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn points(coords: &[(f64, f64)]) -> Vec<Point> {
    coords
        .iter()
        .map(|&(lat, lng)| Point::new(lat, lng))
        .collect()
}

/// Controller on the current tokio runtime backed by a fresh in-memory store.
pub fn memory_controller() -> (PointSetController, Arc<MemoryGateway>) {
    init_logger();
    let gateway = Arc::new(MemoryGateway::new());
    let controller = PointSetController::new(gateway.clone(), tokio::runtime::Handle::current());
    (controller, gateway)
}
