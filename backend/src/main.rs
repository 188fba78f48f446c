use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenwarden_backend::{
    config::Config,
    db::connection::{create_pool, DbPool},
    routes::build_router,
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokenwarden_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        jwt_secret = %mask_secret(&config.jwt_secret),
        refresh_token_secret = %mask_secret(&config.refresh_token_secret),
        password_pepper = %mask_secret(&config.password_pepper),
        jwt_expiration_hours = config.jwt_expiration_hours,
        refresh_token_expiration_days = config.refresh_token_expiration_days,
        cookie_secure = config.cookie_secure,
        "Loaded configuration from environment/.env"
    );

    let pool: DbPool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let bind_addr = config.bind_addr.clone();
    let app = build_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
