mod api;
mod carts;
mod middleware;
mod sessions;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use rosso_airtable::{AirtableClient, Catalog, CatalogTables};
use rosso_supabase::SupabaseClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_auth_rate_limit, AppState, StoreSettings},
    carts::CartStore,
    sessions::SessionStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = rosso_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let airtable = AirtableClient::with_base_url(
        &config.airtable_api_key,
        &config.airtable_base_id,
        config.http_timeout_secs,
        config.http_max_retries,
        config.http_retry_backoff_ms,
        &config.airtable_api_url,
    )?;
    let catalog = Catalog::new(
        airtable,
        CatalogTables {
            products: config.airtable_products_table.clone(),
            categories: config.airtable_categories_table.clone(),
            brands: config.airtable_brands_table.clone(),
        },
    );
    let users = SupabaseClient::new(
        &config.supabase_url,
        &config.supabase_service_key,
        &config.supabase_users_table,
        config.http_timeout_secs,
    )?;

    let state = AppState {
        catalog: Arc::new(catalog),
        users: Arc::new(users),
        sessions: SessionStore::new(Duration::from_secs(config.session_ttl_secs)),
        carts: CartStore::new(
            Duration::from_secs(config.cart_ttl_secs),
            config.max_carts,
        ),
        store: Arc::new(StoreSettings {
            whatsapp_number: config.whatsapp_number.clone(),
            low_stock_threshold: config.low_stock_threshold,
        }),
    };
    let app = build_app(state, default_auth_rate_limit());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "rosso-server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
