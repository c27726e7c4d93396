//! Store seams for the relationship engine.
//!
//! The engine only talks to these traits. `pg_store` backs them with Postgres;
//! tests use the in-memory implementation in `memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::relationship::{
    EdgeKey, MenteeSummary, MentorSummary, NewRelationship, RelationshipRow, RelationshipType,
};
use crate::models::team::{TeamMember, TeamRole};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The `(mentor_id, mentee_id)` pair already has a row.
    #[error("relationship {0} already exists")]
    UniqueViolation(EdgeKey),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("invalid stored data: {0}")]
    Invalid(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// Authoritative team roster, owned by the team-management collaborator.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn list_active_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError>;

    async fn get_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, StoreError>;

    /// Role of an active member; `None` if the user is not an active member.
    async fn get_role(&self, team_id: Uuid, user_id: Uuid)
        -> Result<Option<TeamRole>, StoreError>;

    /// Active memberships of a user across all teams.
    async fn list_active_teams(&self, user_id: Uuid) -> Result<Vec<TeamMember>, StoreError>;

    /// Inserts the membership, or re-activates a former member with the new role.
    async fn upsert_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<TeamMember, StoreError>;

    async fn update_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<(), StoreError>;

    async fn deactivate_member(&self, team_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;
}

/// Directed mentor → mentee edge set.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Every row where the user is mentor or mentee, active or not.
    async fn list_edges_for_user(&self, user_id: Uuid)
        -> Result<Vec<RelationshipRow>, StoreError>;

    async fn find_edge(&self, key: EdgeKey) -> Result<Option<RelationshipRow>, StoreError>;

    /// Fails with `StoreError::UniqueViolation` when the pair already has a row.
    async fn insert_edge(&self, edge: &NewRelationship) -> Result<RelationshipRow, StoreError>;

    /// Sets `active = true, invitation_status = 'accepted', accepted_at = at`.
    /// Fails with `StoreError::Invalid` when no row has that id.
    async fn reactivate_edge(
        &self,
        relationship_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn deactivate_edge(&self, relationship_id: Uuid) -> Result<(), StoreError>;

    async fn set_edge_type(
        &self,
        relationship_id: Uuid,
        relationship_type: RelationshipType,
    ) -> Result<(), StoreError>;

    /// Resolves NULL `active` flags on rows touching the user. Returns the
    /// number of rows repaired.
    async fn normalize_legacy_status(&self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn list_active_mentees(&self, mentor_id: Uuid)
        -> Result<Vec<MenteeSummary>, StoreError>;

    /// Active mentors of a mentee, most recently accepted first.
    async fn list_active_mentors(&self, mentee_id: Uuid)
        -> Result<Vec<MentorSummary>, StoreError>;
}

/// Chat collaborator: opens the mentor ↔ mentee conversation for a new edge.
#[async_trait]
pub trait ConversationOpener: Send + Sync {
    async fn open_conversation(&self, mentor_id: Uuid, mentee_id: Uuid) -> Result<(), StoreError>;
}
