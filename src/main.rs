#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use passkey_verify::{
    passkey::handlers::configure_services, MemoryUserStore, PasskeyService, RingBackend,
    ServerSettings, VERSION,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = ServerSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e:#}")))?;

    let service = PasskeyService::new(
        settings.passkeys.clone(),
        Arc::new(MemoryUserStore::new()),
        Arc::new(RingBackend::new()),
    );

    start_server(service, &settings).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(service: PasskeyService, settings: &ServerSettings) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, settings);

    let service = web::Data::new(service);
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .max_age(3600);

        App::new()
            .app_data(service.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &ServerSettings) {
    println!("Starting passkey-verify {VERSION} on http://{bind_address}");
    println!();
    println!("Relying party: {} ({})", settings.passkeys.rp_id, settings.passkeys.rp_name);
    println!("Allowed origins: {}", settings.passkeys.rp_origins.join(", "));
    println!();
    println!("Passkey endpoints:");
    println!("  POST /signup       - Start passkey registration");
    println!("  POST /check-signup - Complete passkey registration");
    println!("  POST /login        - Start passkey authentication");
    println!("  POST /check-login  - Complete passkey authentication");
    println!();
    println!("System endpoints:");
    println!("  GET  /health       - Health check");
    info!(
        "Challenges expire after {}s, user verification {}",
        settings.passkeys.challenge_ttl_seconds, settings.passkeys.user_verification
    );
}
