use actix_web::dev::{Service, ServerHandle};
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Result;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Runtime;

use crate::gateway::{GatewayError, LoadResponse, PersistedRecord, PersistenceGateway};

struct AppState {
    gateway: Arc<dyn PersistenceGateway>,
}

async fn save_drawing(
    record: web::Json<PersistedRecord>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let PersistedRecord { user_id, markers } = record.into_inner();
    if user_id.trim().is_empty() {
        return HttpResponse::BadRequest().body("Missing User ID");
    }

    let gateway = data.gateway.clone();
    let result = web::block(move || {
        let result = gateway.save(&user_id, &markers);
        (user_id, markers.len(), result)
    })
    .await;

    match result {
        Ok((user_id, count, Ok(()))) => {
            info!("[server] saved {} markers for user {}", count, user_id);
            HttpResponse::Ok().body("Drawing data saved")
        }
        Ok((user_id, _, Err(error))) => {
            error!("[server] error saving data for user {}: {}", user_id, error);
            HttpResponse::InternalServerError().body("Error saving data")
        }
        Err(error) => {
            error!("[server] error saving data: {}", error);
            HttpResponse::InternalServerError().body("Error saving data")
        }
    }
}

async fn load_drawing(user_id: web::Path<String>, data: web::Data<AppState>) -> HttpResponse {
    let user_id = user_id.into_inner();
    let gateway = data.gateway.clone();
    let lookup_id = user_id.clone();
    let result = web::block(move || gateway.load(&lookup_id)).await;

    match result {
        Ok(Ok(markers)) => HttpResponse::Ok().json(LoadResponse { markers }),
        Ok(Err(GatewayError::NotFound(_))) => {
            HttpResponse::NotFound().body("No data found for the given User ID")
        }
        Ok(Err(error @ GatewayError::Malformed { .. })) => {
            error!("[server] {}", error);
            HttpResponse::InternalServerError().body("Error parsing stored data")
        }
        Ok(Err(error)) => {
            error!("[server] database error for user {}: {}", user_id, error);
            HttpResponse::InternalServerError().body("Server error")
        }
        Err(error) => {
            error!("[server] database error for user {}: {}", user_id, error);
            HttpResponse::InternalServerError().body("Server error")
        }
    }
}

/// HTTP front of a `PersistenceGateway`, speaking the protocol `HttpGateway`
/// expects. Runs on its own thread with its own tokio runtime.
pub struct DrawingServer {
    host: String,
    port: u16,
    gateway: Arc<dyn PersistenceGateway>,
    server_handle: Option<ServerHandle>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DrawingServer {
    /// `port` 0 picks a free port, `port()` reports the real one once started.
    pub fn new(host: &str, port: u16, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            host: host.into(),
            port,
            gateway,
            server_handle: None,
            handle: None,
        }
    }

    pub fn create_and_start(
        host: &str,
        port: u16,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Result<Self> {
        let mut server = Self::new(host, port, gateway);
        server.start()?;
        Ok(server)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    // Start the server in a separate thread
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            bail!("server is already running");
        }
        let host = self.host.clone();
        let port = self.port;
        let gateway = self.gateway.clone();

        // Create a channel to report the bound port (or the failure) back
        let (tx, rx) = std::sync::mpsc::channel::<Result<(u16, ServerHandle)>>();

        let handle = thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(error) => {
                    let _ = tx.send(Err(error.into()));
                    return;
                }
            };
            runtime.block_on(async move {
                info!("[server] setting up routes...");
                let app_state = web::Data::new(AppState { gateway });
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(app_state.clone())
                        .wrap_fn(|req, srv| {
                            info!("[server] incoming request: {} {}", req.method(), req.uri());
                            srv.call(req)
                        })
                        .route("/saveDrawing", web::post().to(save_drawing))
                        .route("/loadDrawing/{user_id}", web::get().to(load_drawing))
                })
                .workers(2)
                .shutdown_timeout(5)
                .bind((host.as_str(), port));

                let server = match server {
                    Ok(server) => server,
                    Err(error) => {
                        let _ = tx.send(Err(error.into()));
                        return;
                    }
                };

                // If port was 0, get the actual port
                let actual_port = server.addrs().first().map(|addr| addr.port()).unwrap_or(port);
                let server = server.run();
                let _ = tx.send(Ok((actual_port, server.handle())));

                info!("[server] bound successfully to {}:{}", host, actual_port);
                if let Err(error) = server.await {
                    error!("[server] stopped with error: {}", error);
                }
            });
        });

        let (actual_port, server_handle) = rx
            .recv()
            .map_err(|_| anyhow!("server thread exited before binding"))??;
        self.port = actual_port;
        self.server_handle = Some(server_handle);
        self.handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(server_handle) = self.server_handle.take() {
            pollster::block_on(server_handle.stop(true));
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[server] server thread panicked");
            }
        }
    }
}

impl Drop for DrawingServer {
    fn drop(&mut self) {
        self.stop();
    }
}
