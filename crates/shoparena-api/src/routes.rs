//! API route definitions
//!
//! Author: Shoparena developers

use crate::auth::middleware::{require_role, RoleGuard};
use crate::handlers::{auth, health, products, profile};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use shoparena_core::Role;
use std::sync::Arc;

/// Multipart framing allowance on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Liveness and readiness, mounted at the root
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
}

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/searchproducts", get(products::search_products))
        .route("/product/:id", get(products::get_product))
        .route("/sellers", get(products::list_sellers))
        .nest("/buyer", role_routes(state.clone(), Role::Buyer))
        .nest("/seller", role_routes(state, Role::Seller))
}

/// Account routes for one role
///
/// The same handlers serve both roles; the role reaches them as an
/// `Extension<Role>` and the guard admits only tokens issued for it.
fn role_routes(state: Arc<AppState>, role: Role) -> Router<Arc<AppState>> {
    let upload_limit = state.config.server.max_upload_size + MULTIPART_OVERHEAD;

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/signup", post(auth::signup_handler))
        .route("/login", post(auth::login_handler))
        .route("/forgotpassword", post(auth::forgot_password_handler))
        .route("/forgotpassword/reset", put(auth::reset_password_handler));

    // Protected routes (token for this role required)
    let mut protected_routes = Router::new()
        .route("/logout", post(auth::logout_handler))
        .route(
            "/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/updatepassword", put(profile::update_password))
        .route(
            "/profile/image",
            put(profile::upload_profile_image).layer(DefaultBodyLimit::max(upload_limit)),
        );

    if role == Role::Seller {
        protected_routes = protected_routes.route("/shop", get(products::seller_shop));
    }

    let protected_routes = protected_routes.route_layer(middleware::from_fn_with_state(
        RoleGuard::new(state, role),
        require_role,
    ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(Extension(role))
}
