use sqlx::PgPool;

use crate::config::Config;
use crate::invitations::acceptance::InvitationService;
use crate::relationships::normalizer::RelationshipReader;
use crate::teams::membership::TeamMembershipService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Read path: mentee/mentor lists behind read-repair.
    pub reader: RelationshipReader,
    pub invitations: InvitationService,
    pub teams: TeamMembershipService,
}
