use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::gateway::{GatewayError, PersistenceGateway};
use crate::point::{self, Point, PointSequence};
use crate::renderer::{RouteRenderer, RouteView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A load for this session has been issued and not applied yet.
    Loading,
    Settled,
}

#[derive(Debug)]
pub struct UserSession {
    user_id: String,
    sequence: PointSequence,
    state: SessionState,
}

impl UserSession {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn sequence(&self) -> &[Point] {
        &self.sequence
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

struct LoadCompletion {
    generation: u64,
    user_id: String,
    result: Result<PointSequence, GatewayError>,
}

/// Owns the markers of the active user.
///
/// Every mutation goes through `&mut self`, so there is only ever one writer.
/// Saves and loads run on the tokio runtime given at construction. A finished
/// load does not touch the sequence by itself, it is queued and applied the
/// next time `apply_pending_loads` or `settle` is called. Loads are tagged
/// with the session generation they were issued for and dropped if the user
/// has been switched in the meantime.
pub struct PointSetController {
    gateway: Arc<dyn PersistenceGateway>,
    runtime: Handle,
    session: Option<UserSession>,
    generation: u64,
    pending_loads: usize,
    renderer: RouteRenderer,
    load_tx: mpsc::UnboundedSender<LoadCompletion>,
    load_rx: mpsc::UnboundedReceiver<LoadCompletion>,
    pending_saves: Vec<JoinHandle<()>>,
}

impl PointSetController {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, runtime: Handle) -> Self {
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            runtime,
            session: None,
            generation: 0,
            pending_loads: 0,
            renderer: RouteRenderer::new(),
            load_tx,
            load_rx,
            pending_saves: Vec::new(),
        }
    }

    pub fn session(&self) -> Option<&UserSession> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn sequence(&self) -> &[Point] {
        match &self.session {
            Some(session) => &session.sequence,
            None => &[],
        }
    }

    pub fn renderer(&self) -> &RouteRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut RouteRenderer {
        &mut self.renderer
    }

    pub fn route_view(&mut self) -> RouteView {
        self.renderer.view()
    }

    pub fn initialize(&mut self, user_id: &str) {
        if user_id.is_empty() {
            warn!("[controller] ignoring session start with an empty user id");
            return;
        }
        info!("[controller] starting session for user {}", user_id);
        self.start_session(user_id);
    }

    pub fn switch_user(&mut self, new_user_id: &str) {
        if new_user_id.is_empty() {
            warn!("[controller] ignoring switch to an empty user id");
            return;
        }
        info!(
            "[controller] switching user: {} -> {}",
            self.user_id().unwrap_or("<none>"),
            new_user_id
        );
        self.start_session(new_user_id);
    }

    fn start_session(&mut self, user_id: &str) {
        // anything still in flight belongs to the previous generation
        self.generation = self.generation.wrapping_add(1);
        self.pending_loads = 0;
        self.session = Some(UserSession {
            user_id: user_id.to_string(),
            sequence: Vec::new(),
            state: SessionState::Loading,
        });
        self.renderer.clear();
        self.load();
    }

    /// Removes the point at exactly `(lat, lng)` if there is one, otherwise
    /// appends a new point. Re-renders and saves afterwards.
    pub fn toggle_point(&mut self, lat: f64, lng: f64) -> &[Point] {
        // JSON has no NaN or infinity, such a point would make the record unloadable
        if !lat.is_finite() || !lng.is_finite() {
            warn!("[controller] ignoring non-finite point ({}, {})", lat, lng);
            return self.sequence();
        }
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                warn!("[controller] toggle_point called without an active session");
                return &[];
            }
        };
        match point::position_of(&session.sequence, lat, lng) {
            Some(idx) => {
                session.sequence.remove(idx);
                debug!("[controller] removed point ({}, {})", lat, lng);
            }
            None => {
                session.sequence.push(Point::new(lat, lng));
                debug!("[controller] added point ({}, {})", lat, lng);
            }
        }
        self.after_mutation();
        self.sequence()
    }

    /// Removes the first point equal to `point`. Nothing happens, including no
    /// save, if there is no such point.
    pub fn remove_point(&mut self, point: &Point) -> &[Point] {
        let removed = match self.session.as_mut() {
            Some(session) => match session.sequence.iter().position(|p| p == point) {
                Some(idx) => {
                    session.sequence.remove(idx);
                    true
                }
                None => false,
            },
            None => false,
        };
        if removed {
            debug!("[controller] removed point ({}, {})", point.lat, point.lng);
            self.after_mutation();
        }
        self.sequence()
    }

    fn after_mutation(&mut self) {
        self.render();
        self.save();
    }

    fn render(&mut self) -> RouteView {
        let sequence = match &self.session {
            Some(session) => session.sequence.as_slice(),
            None => &[],
        };
        self.renderer.render(sequence)
    }

    /// Fire-and-forget upsert of the current sequence. Failures are logged and
    /// never retried, the in-memory sequence stays as it is.
    pub fn save(&mut self) {
        let session = match &self.session {
            Some(session) => session,
            None => return,
        };
        let gateway = self.gateway.clone();
        let user_id = session.user_id.clone();
        let markers = session.sequence.clone();

        self.pending_saves.retain(|handle| !handle.is_finished());
        let handle = self.runtime.spawn_blocking(move || {
            match gateway.save(&user_id, &markers) {
                Ok(()) => debug!(
                    "[controller] saved {} markers for user {}",
                    markers.len(),
                    user_id
                ),
                Err(error) => error!(
                    "[controller] failed to save markers for user {}: {}",
                    user_id, error
                ),
            }
        });
        self.pending_saves.push(handle);
    }

    /// Fetches the stored sequence of the active user in the background. The
    /// result is merged by `apply_pending_loads`/`settle`.
    pub fn load(&mut self) {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return,
        };
        session.state = SessionState::Loading;
        self.pending_loads += 1;

        let gateway = self.gateway.clone();
        let tx = self.load_tx.clone();
        let generation = self.generation;
        let user_id = session.user_id.clone();
        self.runtime.spawn_blocking(move || {
            // a panicking store still reports back
            let result = panic::catch_unwind(AssertUnwindSafe(|| gateway.load(&user_id)))
                .unwrap_or_else(|_| Err(anyhow!("load task panicked").into()));
            // the receiver lives as long as the controller
            let _ = tx.send(LoadCompletion {
                generation,
                user_id,
                result,
            });
        });
    }

    /// Applies every load that has completed so far without waiting. Returns
    /// how many completions were looked at, stale ones included.
    pub fn apply_pending_loads(&mut self) -> usize {
        let mut count = 0;
        while let Ok(completion) = self.load_rx.try_recv() {
            self.apply_load(completion);
            count += 1;
        }
        count
    }

    /// Waits until every load issued for the current session has been applied.
    pub async fn settle(&mut self) -> RouteView {
        while self.pending_loads > 0 {
            match self.load_rx.recv().await {
                Some(completion) => self.apply_load(completion),
                None => break,
            }
        }
        self.renderer.view()
    }

    /// Waits for every save issued so far.
    pub async fn flush_saves(&mut self) {
        for handle in self.pending_saves.drain(..) {
            if let Err(error) = handle.await {
                error!("[controller] save task failed: {}", error);
            }
        }
    }

    fn apply_load(&mut self, completion: LoadCompletion) {
        let LoadCompletion {
            generation,
            user_id,
            result,
        } = completion;
        if generation != self.generation {
            debug!(
                "[controller] discarding stale load for user {} (generation {}, current {})",
                user_id, generation, self.generation
            );
            return;
        }
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return,
        };
        self.pending_loads = self.pending_loads.saturating_sub(1);
        if self.pending_loads == 0 {
            session.state = SessionState::Settled;
        }

        let mut needs_save = false;
        match result {
            Ok(markers) => {
                let fetched = markers.len();
                let had_local_points = !session.sequence.is_empty();
                let added = point::merge_without_duplicates(&mut session.sequence, markers);
                info!(
                    "[controller] loaded {} markers for user {}, {} new",
                    fetched, user_id, added
                );
                // points clicked during the load were already saved without the
                // stored ones, write the merged sequence back
                needs_save = had_local_points && added > 0;
            }
            Err(GatewayError::NotFound(_)) => {
                info!("[controller] no stored markers for user {}", user_id);
            }
            Err(error) => {
                error!(
                    "[controller] failed to load markers for user {}: {}",
                    user_id, error
                );
            }
        }
        self.render();
        if needs_save {
            self.save();
        }
    }
}
