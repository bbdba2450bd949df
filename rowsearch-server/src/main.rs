use actix_web::{web, App, HttpServer};
use rowsearch::Workspace;

mod handlers;

/// Shared application state
pub struct AppState {
    pub workspace: Workspace,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Starting rowsearch server");

    let data_dir = std::env::var("ROWSEARCH_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let host = std::env::var("ROWSEARCH_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("ROWSEARCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Opening workspace at: {data_dir}");
    let workspace = Workspace::open(&data_dir).expect("Failed to open rowsearch workspace");

    let state = web::Data::new(AppState { workspace });

    log::info!("Listening on {host}:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
