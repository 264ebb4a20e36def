//! Shoparena API - REST server
//!
//! HTTP surface of the marketplace: buyer and seller accounts, role-guarded
//! profile endpoints and public product search.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod routes;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod uploads;

use crate::state::AppState;
use axum::{http::HeaderValue, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::signup_handler,
        handlers::auth::login_handler,
        handlers::auth::logout_handler,
        handlers::auth::forgot_password_handler,
        handlers::auth::reset_password_handler,
        handlers::profile::get_profile,
        handlers::profile::update_profile,
        handlers::profile::update_password,
        handlers::profile::upload_profile_image,
        handlers::products::search_products,
        handlers::products::get_product,
        handlers::products::list_sellers,
        handlers::products::seller_shop,
    ),
    components(
        schemas(
            error::ApiError,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::UpdateProfileRequest,
            auth::ChangePasswordRequest,
            auth::ForgotPasswordRequest,
            auth::ResetPasswordRequest,
            auth::AccountView,
            auth::AuthResponse,
            auth::MessageResponse,
            handlers::health::HealthResponse,
            handlers::health::ReadinessResponse,
            handlers::health::ReadinessChecks,
            handlers::profile::ImageUpload,
            handlers::profile::ImageResponse,
            handlers::products::ProductView,
            handlers::products::SellerShop,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup, login, logout and password reset"),
        (name = "profile", description = "Authenticated account profile"),
        (name = "products", description = "Product search and sellers"),
    ),
    info(
        title = "Shoparena API",
        description = "Two-sided marketplace API for buyers and sellers",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::health_routes())
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS for the configured origins; unparsable entries are skipped
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
