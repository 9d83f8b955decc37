use route_drawing_core::config::DrawingConfig;
use route_drawing_core::gateway::SqliteGateway;
use route_drawing_core::logs;
use route_drawing_core::server::DrawingServer;
use std::sync::Arc;

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DrawingConfig::from_env()?;
    std::fs::create_dir_all(&config.support_dir)?;
    logs::init(&config.log_dir, log::LevelFilter::Info)?;

    let gateway = Arc::new(SqliteGateway::open(&config.support_dir)?);
    let server = DrawingServer::create_and_start(&config.host, config.port, gateway)?;

    println!("================================================");
    println!("[Drawing Server]:  {}", server.url());
    println!("  POST {}/saveDrawing", server.url());
    println!("  GET  {}/loadDrawing/<userId>", server.url());
    println!("================================================");

    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C! Shutting down...");
        std::process::exit(0);
    })?;

    // Block the main thread to keep server running
    loop {
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
}
