pub mod route_renderer;
pub use route_renderer::{LineStyle, RouteRenderer, RouteView};
