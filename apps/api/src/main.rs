mod config;
mod db;
mod errors;
mod invitations;
mod models;
mod relationships;
mod routes;
mod state;
mod teams;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::invitations::acceptance::InvitationService;
use crate::invitations::store::PgInvitationStore;
use crate::relationships::driver::RelationshipSync;
use crate::relationships::normalizer::RelationshipReader;
use crate::relationships::pg_store::{
    PgConversationOpener, PgMembershipStore, PgRelationshipStore,
};
use crate::routes::build_router;
use crate::state::AppState;
use crate::teams::membership::TeamMembershipService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Waypoint API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&db).await?;

    // Store seams
    let memberships = Arc::new(PgMembershipStore::new(db.clone()));
    let relationships = Arc::new(PgRelationshipStore::new(db.clone()));
    let conversations = Arc::new(PgConversationOpener::new(db.clone()));
    let invitation_store = Arc::new(PgInvitationStore::new(db.clone()));

    // Relationship engine
    let sync = RelationshipSync::new(memberships.clone(), relationships.clone(), conversations);
    let reader = RelationshipReader::new(
        memberships.clone(),
        relationships,
        sync.clone(),
        config.read_repair_enabled,
    );
    info!(
        "Relationship read-repair {}",
        if config.read_repair_enabled { "enabled" } else { "disabled" }
    );

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        reader,
        invitations: InvitationService::new(invitation_store, memberships.clone(), sync.clone()),
        teams: TeamMembershipService::new(memberships, sync),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the web client's host is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
