mod admin;
mod config;
mod db;
mod entities;
mod error;
mod facets;
mod models;
mod mutation;
mod query;
mod routes;
mod store;
mod templates;

use std::{net::SocketAddr, sync::Arc};

use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config, facets::CatalogFacets, mutation::Submissions, query::Catalog,
    store::CatalogStore,
};

pub struct AppState {
    pub config: Arc<Config>,
    pub store: CatalogStore,
    pub catalog: Catalog,
    pub facets: CatalogFacets,
    pub submissions: Submissions,
}

impl AppState {
    pub fn new(config: Config, db: DatabaseConnection) -> Self {
        let store = CatalogStore::new(db.clone());
        Self {
            config: Arc::new(config),
            catalog: Catalog::new(db.clone()),
            facets: CatalogFacets::new(db),
            submissions: Submissions::new(store.clone()),
            store,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,movies=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.addr;

    let db = db::connect_and_migrate(&config.database_url, config.db_max_connections).await?;
    let state = Arc::new(AppState::new(config, db));

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
