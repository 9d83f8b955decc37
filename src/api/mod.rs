#[allow(clippy::module_inception)]
pub mod api;
pub use api::{CommandError, DrawingApp};
