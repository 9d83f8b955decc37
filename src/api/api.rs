use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;

use crate::controller::PointSetController;
use crate::gateway::PersistenceGateway;
use crate::point::Point;
use crate::renderer::RouteView;

/// Errors shown to the user. Nothing changes when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Please enter a valid User ID.")]
    InvalidUserId,
    #[error("Please start the app first!")]
    NotStarted,
}

/// Entry point for the UI buttons and map clicks. The controller is only
/// created by the first successful `start`, later starts switch the user on
/// that same controller.
pub struct DrawingApp {
    gateway: Arc<dyn PersistenceGateway>,
    runtime: Handle,
    controller: Option<PointSetController>,
}

impl DrawingApp {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, runtime: Handle) -> Self {
        Self {
            gateway,
            runtime,
            controller: None,
        }
    }

    pub fn controller(&self) -> Option<&PointSetController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut PointSetController> {
        self.controller.as_mut()
    }

    fn started(&mut self) -> Result<&mut PointSetController, CommandError> {
        self.controller.as_mut().ok_or(CommandError::NotStarted)
    }

    pub fn start(&mut self, user_id_input: &str) -> Result<(), CommandError> {
        let user_id = user_id_input.trim();
        if user_id.is_empty() {
            return Err(CommandError::InvalidUserId);
        }
        match self.controller.as_mut() {
            Some(controller) => controller.switch_user(user_id),
            None => {
                let mut controller =
                    PointSetController::new(self.gateway.clone(), self.runtime.clone());
                controller.initialize(user_id);
                self.controller = Some(controller);
            }
        }
        Ok(())
    }

    /// Blank input is ignored.
    pub fn change_line_color(&mut self, color_input: &str) -> Result<(), CommandError> {
        let controller = self.started()?;
        let color = color_input.trim();
        if !color.is_empty() {
            controller.renderer_mut().set_color(color);
        }
        Ok(())
    }

    /// Returns whether the line is dashed afterwards.
    pub fn toggle_line_dashed(&mut self) -> Result<bool, CommandError> {
        Ok(self.started()?.renderer_mut().toggle_dashed())
    }

    pub fn on_map_click(&mut self, lat: f64, lng: f64) -> Result<RouteView, CommandError> {
        let controller = self.started()?;
        controller.toggle_point(lat, lng);
        Ok(controller.route_view())
    }

    pub fn on_marker_click(&mut self, point: &Point) -> Result<RouteView, CommandError> {
        let controller = self.started()?;
        controller.remove_point(point);
        Ok(controller.route_view())
    }

    /// Picks up finished loads, call it from the UI loop.
    pub fn poll(&mut self) -> Option<RouteView> {
        let controller = self.controller.as_mut()?;
        if controller.apply_pending_loads() > 0 {
            Some(controller.route_view())
        } else {
            None
        }
    }

    pub fn distance_text(&mut self) -> Option<String> {
        self.controller
            .as_mut()
            .map(|controller| controller.route_view().distance_text())
    }
}
