// routes.rs
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use http::{header::AUTHORIZATION, header::CONTENT_TYPE, HeaderValue, Method};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    if let Some(origin) = &state.config.cors_allowed_origin {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => cors = cors.allow_origin(origin),
            Err(e) => warn!("Ignoring invalid CORS_ALLOWED_ORIGIN {origin}: {e}"),
        }
    }

    Router::new()
        .route("/", get(handlers::root))
        .route("/polls/", get(handlers::index))
        .route("/polls/{question_id}/", get(handlers::detail))
        .route("/polls/{question_id}/results/", get(handlers::results))
        .route("/polls/{question_id}/vote/", post(handlers::vote))
        .route("/polls/{question_id}/reset/", post(handlers::reset))
        .route(
            "/admin/questions",
            get(handlers::admin_questions).post(handlers::create_question),
        )
        .route("/admin/questions/{question_id}", delete(handlers::delete_question))
        .route("/admin/questions/{question_id}/choices", post(handlers::add_choice))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
