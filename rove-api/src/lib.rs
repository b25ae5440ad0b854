use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod state;
pub mod error;
pub mod bookings;
pub mod webhooks;
pub mod ratings;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(auth::routes())
        .merge(bookings::routes())
        .merge(webhooks::routes())
        .merge(ratings::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
