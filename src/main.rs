use std::net::{IpAddr, SocketAddr};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_api::{
    app::build_app,
    config::AppConfig,
    db::{create_pool, run_migrations},
    middleware::auth::TokenVerifier,
    state::AppState,
    storage::ImageStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let verifier = TokenVerifier::from_config(&config.auth).await?;

    if !config.vnpay.is_configured() {
        tracing::warn!("VNPAY_TMN_CODE / VNPAY_HASH_SECRET not set; payment endpoints will fail");
    }
    let storage = match &config.storage {
        Some(storage_config) => {
            tracing::info!(bucket = %storage_config.bucket, "image storage enabled");
            Some(ImageStorage::new(storage_config))
        }
        None => {
            tracing::warn!("R2 storage not configured; image uploads are disabled");
            None
        }
    };

    let state = AppState::new(pool, verifier, config.vnpay.clone(), storage);
    let app = build_app(state, &config.allowed_origins);

    let addr = SocketAddr::from((config.host.parse::<IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
