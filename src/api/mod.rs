pub mod auth;
pub mod error;
pub mod guard;
mod klienci;
mod montaze;
pub mod rate_limit;
pub mod session;
mod users;
pub mod validation;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Only the login endpoint is rate limited
    let auth_routes = Router::new()
        .route(
            "/login",
            post(auth::login).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::rate_limit_login,
            )),
        )
        .route("/logout", post(auth::logout));

    // Authentication is enforced per handler through the User extractor;
    // role and ownership checks live in the handlers themselves.
    let api_routes = Router::new()
        .route("/montaze", get(montaze::list_montaze).post(montaze::create_montaz))
        .route(
            "/montaze/:id",
            get(montaze::get_montaz)
                .put(montaze::update_montaz)
                .delete(montaze::delete_montaz),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            put(users::update_user).patch(users::toggle_user_active),
        )
        .route("/klienci", get(klienci::list_klienci).post(klienci::create_klient))
        .route(
            "/klienci/:id",
            put(klienci::update_klient).delete(klienci::delete_klient),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", auth_routes.merge(api_routes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
