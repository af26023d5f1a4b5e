use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{protected, public};
use crate::middleware::{recipe_rate_limit, session_middleware};
use crate::state::AppState;

/// Full router: public and protected route groups behind the session layer
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(recipe_public_routes())
        // Session required
        .merge(auth_routes())
        .merge(recipe_routes(state.clone()))
        .merge(user_routes())
        // Global middleware
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .layer(DefaultBodyLimit::max(body_limit));

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security.cors_origins));
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(public::register))
        .route("/login", post(public::login))
}

fn recipe_public_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(public::list_recipes))
        .route(
            "/recipe/:id",
            get(public::get_recipe)
                .put(protected::update_recipe)
                .delete(protected::delete_recipe),
        )
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", get(protected::logout))
        .route("/me", get(protected::me))
}

fn recipe_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Only creation is rate limited
        .route(
            "/recipe",
            post(protected::create_recipe)
                .layer(middleware::from_fn_with_state(state, recipe_rate_limit)),
        )
        .route("/recipe/:id/like", post(protected::toggle_like))
        .route("/recipe/:id/rate", post(protected::rate_recipe))
        .route("/recipe/:id/rating", get(protected::get_rating))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/liked-recipes", get(protected::liked_recipes))
        .route("/users-recipes", get(protected::users_recipes))
}

/// Credentialed CORS for the configured browser origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Recipe Share API",
            "version": version,
            "environment": state.config.environment,
            "description": "Recipe sharing backend: accounts, recipes, likes, ratings and images",
            "endpoints": {
                "auth": "/register, /login (public); /logout, /me (session)",
                "recipes": "/recipes, /recipe/:id (public read); POST /recipe, PUT|DELETE /recipe/:id (owner)",
                "engagement": "/recipe/:id/like, /recipe/:id/rate, /recipe/:id/rating (session)",
                "user": "/user/liked-recipes, /users-recipes (session)",
                "health": "/health (public)"
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": state.store.backend_name()
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "store": state.store.backend_name()
                    }
                })),
            )
        }
    }
}
