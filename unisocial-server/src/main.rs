use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod models;
mod routes;
mod schema;
mod services;

use config::AppConfig;
use unisocial_shared::clients::db::{create_pool, DbPool};
use unisocial_shared::clients::email::EmailClient;
use unisocial_shared::clients::redis::RedisClient;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub redis: RedisClient,
    pub email: EmailClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    unisocial_shared::middleware::init_tracing("unisocial_server");

    let config = AppConfig::load()?;
    let port = config.port;

    // The auth extractor reads the secret from the environment.
    std::env::set_var("JWT_SECRET", &config.jwt_secret);
    std::env::set_var("UNISOCIAL_ENV", &config.environment);

    let metrics_handle = unisocial_shared::middleware::init_metrics();

    let db = create_pool(&config.database_url);
    let redis = RedisClient::connect(&config.redis_url).await?;
    let email = EmailClient::new(
        &config.mail_api_url,
        &config.mail_api_key,
        &config.mail_from_email,
        &config.mail_from_name,
    );

    let state = Arc::new(AppState { db, config, redis, email });

    // Background housekeeping: expired blocks, lapsed account blocks,
    // notification retention.
    let maintenance_state = state.clone();
    tokio::spawn(async move {
        services::maintenance::run(maintenance_state).await;
    });

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me));

    let user_routes = Router::new()
        .route("/me", get(routes::profile::get_own_profile).patch(routes::profile::update_own_profile))
        .route("/me/followers", get(routes::follows::list_followers))
        .route("/me/following", get(routes::follows::list_following))
        .route("/me/blocked", get(routes::blocks::list_blocked))
        .route("/search", get(routes::users::search_users))
        .route("/:id", get(routes::users::get_user))
        .route("/:id/posts", get(routes::posts::list_user_posts))
        .route("/:id/follow", post(routes::follows::follow_user).delete(routes::follows::unfollow_user))
        .route("/:id/block", post(routes::blocks::block_user).delete(routes::blocks::unblock_user));

    let post_routes = Router::new()
        .route("/", post(routes::posts::create_post).get(routes::posts::list_posts))
        .route("/:id", delete(routes::posts::delete_post))
        .route("/:id/like", post(routes::posts::toggle_like))
        .route("/:id/comments", post(routes::posts::create_comment).get(routes::posts::list_comments));

    let notification_routes = Router::new()
        .route("/", get(routes::notifications::list_notifications))
        .route("/unread-count", get(routes::notifications::unread_count))
        .route("/mark-all-read", post(routes::notifications::mark_all_read))
        .route("/:id/read", post(routes::notifications::mark_read));

    let message_routes = Router::new()
        .route("/", post(routes::messages::send_message))
        .route("/conversations", get(routes::messages::list_conversations))
        .route("/unread-count", get(routes::messages::unread_count))
        .route("/with/:user_id", get(routes::messages::get_conversation))
        .route("/with/:user_id/read", post(routes::messages::mark_conversation_read));

    let admin_routes = Router::new()
        .route("/reports", get(routes::admin::list_reports))
        .route("/reports/:id", get(routes::admin::get_report))
        .route("/reports/:id/review", put(routes::admin::review_report))
        .route("/reports/:id/resolve", put(routes::admin::resolve_report))
        .route("/users/:id/block", put(routes::admin::block_account))
        .route("/users/:id/unblock", put(routes::admin::unblock_account))
        .route("/stats", get(routes::admin::get_stats));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(move || async move { metrics_handle.render() }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/posts", post_routes)
        .route("/api/comments/:id", delete(routes::posts::delete_comment))
        .route("/api/reports", post(routes::reports::create_report))
        .nest("/api/notifications", notification_routes)
        .nest("/api/messages", message_routes)
        .nest("/api/admin", admin_routes)
        .layer(axum::middleware::from_fn(unisocial_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "unisocial-server starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
