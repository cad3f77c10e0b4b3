//! Passkey request handlers
//!
//! HTTP endpoints for the sign-up and login ceremonies. Every failure is
//! answered with `{"ok": false, "error": ...}` carrying a generic message;
//! the detailed reason only goes to the log.

use actix_web::error::InternalError;
use actix_web::{web, HttpResponse, Result};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::service::PasskeyService;
use crate::webauthn::{AuthenticationResponse, CeremonyError, RegistrationResponse};

/// Body of `/signup` and `/login`
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Body of `/check-signup`
#[derive(Debug, Deserialize)]
pub struct CheckSignupRequest {
    pub email: String,
    pub credential: RegistrationResponse,
}

/// Body of `/check-login`
#[derive(Debug, Deserialize)]
pub struct CheckLoginRequest {
    pub email: String,
    pub credential: AuthenticationResponse,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
}

/// Start passkey registration
///
/// # Errors
/// Never fails at the actix level; ceremony errors become JSON responses.
pub async fn signup(
    service: web::Data<PasskeyService>,
    body: web::Json<EmailRequest>,
) -> Result<HttpResponse> {
    Ok(match service.start_registration(&body.email) {
        Ok(options) => HttpResponse::Ok().json(json!({ "ok": true, "options": options })),
        Err(e) => error_response("signup", &body.email, &e),
    })
}

/// Complete passkey registration
///
/// # Errors
/// Never fails at the actix level; ceremony errors become JSON responses.
pub async fn check_signup(
    service: web::Data<PasskeyService>,
    body: web::Json<CheckSignupRequest>,
) -> Result<HttpResponse> {
    Ok(
        match service.finish_registration(&body.email, &body.credential) {
            Ok(_) => HttpResponse::Ok().json(json!({ "ok": true })),
            Err(e) => error_response("check-signup", &body.email, &e),
        },
    )
}

/// Start passkey authentication
///
/// # Errors
/// Never fails at the actix level; ceremony errors become JSON responses.
pub async fn login(
    service: web::Data<PasskeyService>,
    body: web::Json<EmailRequest>,
) -> Result<HttpResponse> {
    Ok(match service.start_authentication(&body.email) {
        Ok(options) => HttpResponse::Ok().json(json!({ "ok": true, "options": options })),
        Err(e) => error_response("login", &body.email, &e),
    })
}

/// Complete passkey authentication
///
/// # Errors
/// Never fails at the actix level; ceremony errors become JSON responses.
pub async fn check_login(
    service: web::Data<PasskeyService>,
    body: web::Json<CheckLoginRequest>,
) -> Result<HttpResponse> {
    Ok(
        match service.finish_authentication(&body.email, &body.credential) {
            Ok(_) => HttpResponse::Ok().json(json!({ "ok": true })),
            Err(e) => error_response("check-login", &body.email, &e),
        },
    )
}

/// Health check endpoint
///
/// # Errors
/// Never fails.
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "Passkey verification server is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Register the passkey routes and the JSON body error handler
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Rejected request body: {err}");
        let response = HttpResponse::BadRequest().json(json!({
            "ok": false,
            "error": "Invalid request body",
        }));
        InternalError::from_response(err, response).into()
    }))
    .route("/signup", web::post().to(signup))
    .route("/check-signup", web::post().to(check_signup))
    .route("/login", web::post().to(login))
    .route("/check-login", web::post().to(check_login))
    .route("/health", web::get().to(health));
}

fn error_response(endpoint: &str, email: &str, err: &CeremonyError) -> HttpResponse {
    let body = json!({ "ok": false, "error": err.client_message() });
    if err.is_internal() {
        error!("/{endpoint} failed for {email}: {err}");
        HttpResponse::InternalServerError().json(body)
    } else {
        warn!("/{endpoint} rejected for {email}: {err}");
        HttpResponse::BadRequest().json(body)
    }
}
