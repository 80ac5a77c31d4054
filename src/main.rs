use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Mutex;
use std::time::Duration;

use token_ledger::api::{self, ApiDoc};
use token_ledger::blockchain::{scheduler, Blockchain};
use token_ledger::config::{LedgerConfig, ServerConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to read .env: {}", err);
        }
    }

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let ledger_config = LedgerConfig::from_env();
    let server_config = ServerConfig::from_env();
    info!("Ledger configuration: {:?}", ledger_config);

    let ledger = web::Data::new(Mutex::new(Blockchain::new(ledger_config)));

    // Auto-mining checks run in the background and share the ledger lock
    let driver = tokio::spawn(scheduler::drive(
        ledger.clone().into_inner(),
        Duration::from_millis(server_config.scheduler_poll_ms),
    ));

    info!(
        "Starting HTTP server at http://{}:{}",
        server_config.host, server_config.port
    );

    let server = HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(ledger.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((server_config.host.as_str(), server_config.port))?
    .run();

    let result = server.await;
    driver.abort();
    if let Err(err) = &result {
        warn!("HTTP server stopped with error: {}", err);
    }

    Ok(result?)
}
