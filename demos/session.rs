use route_drawing_core::api::DrawingApp;
use route_drawing_core::config::DrawingConfig;
use route_drawing_core::gateway::HttpGateway;
use std::env;
use std::sync::Arc;

// A few clicks around Tiruchirappalli, the last one removes the first point again.
const CLICKS: [(f64, f64); 4] = [
    (10.7905, 78.7047),
    (10.8050, 78.6856),
    (10.8155, 78.6965),
    (10.7905, 78.7047),
];

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let user_id = args.get(1).map(String::as_str).unwrap_or("demo-user");

    let config = DrawingConfig::from_env()?;
    println!("using drawing server at {}", config.server_url);
    let gateway = Arc::new(HttpGateway::new(&config.server_url)?);

    let runtime = tokio::runtime::Runtime::new()?;
    let mut app = DrawingApp::new(gateway, runtime.handle().clone());

    if let Err(e) = app.on_map_click(CLICKS[0].0, CLICKS[0].1) {
        println!("before start: {e}");
    }
    app.start(user_id)?;

    runtime.block_on(async {
        if let Some(controller) = app.controller_mut() {
            let view = controller.settle().await;
            println!("loaded {} points for {}", view.line.len(), user_id);
            println!("{}", view.distance_text());
        }
    });

    for (lat, lng) in CLICKS {
        let view = app.on_map_click(lat, lng)?;
        println!(
            "click ({lat}, {lng}) -> {} points, {}",
            view.line.len(),
            view.distance_text()
        );
    }

    app.change_line_color("red")?;
    let dashed = app.toggle_line_dashed()?;
    println!("line is now red, dashed: {dashed}");

    runtime.block_on(async {
        if let Some(controller) = app.controller_mut() {
            controller.flush_saves().await;
        }
    });
    if let Some(text) = app.distance_text() {
        println!("{text}");
    }
    Ok(())
}
