//! Postgres-backed store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::relationship::{
    EdgeKey, InvitationStatus, MenteeSummary, MenteeSummaryRow, MentorSummary, MentorSummaryRow,
    NewRelationship, RelationshipRow, RelationshipType,
};
use crate::models::team::{TeamMember, TeamMemberRow, TeamRole};
use crate::relationships::store::{
    ConversationOpener, MembershipStore, RelationshipStore, StoreError,
};

/// Single-row updates by id must hit exactly one row.
fn expect_single_row(rows_affected: u64, relationship_id: Uuid) -> Result<(), StoreError> {
    match rows_affected {
        1 => Ok(()),
        0 => Err(StoreError::Invalid(format!(
            "relationship {relationship_id} not found"
        ))),
        n => Err(StoreError::Invalid(format!(
            "update of relationship {relationship_id} touched {n} rows"
        ))),
    }
}

fn into_members(rows: Vec<TeamMemberRow>) -> Result<Vec<TeamMember>, StoreError> {
    rows.into_iter()
        .map(|row| TeamMember::try_from(row).map_err(|e| StoreError::Invalid(e.to_string())))
        .collect()
}

#[derive(Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn list_active_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        let rows = sqlx::query_as::<_, TeamMemberRow>(
            "SELECT * FROM team_members WHERE team_id = $1 AND active ORDER BY joined_at, user_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        into_members(rows)
    }

    async fn get_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, StoreError> {
        let row = sqlx::query_as::<_, TeamMemberRow>(
            "SELECT * FROM team_members WHERE team_id = $1 AND user_id = $2",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TeamMember::try_from)
            .transpose()
            .map_err(|e| StoreError::Invalid(e.to_string()))
    }

    async fn get_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamRole>, StoreError> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2 AND active",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        role.map(|r| r.parse::<TeamRole>())
            .transpose()
            .map_err(|e| StoreError::Invalid(e.to_string()))
    }

    async fn list_active_teams(&self, user_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        let rows = sqlx::query_as::<_, TeamMemberRow>(
            "SELECT * FROM team_members WHERE user_id = $1 AND active ORDER BY joined_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_members(rows)
    }

    async fn upsert_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<TeamMember, StoreError> {
        let row = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            INSERT INTO team_members (team_id, user_id, role, active)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (team_id, user_id)
            DO UPDATE SET role = EXCLUDED.role, active = TRUE
            RETURNING *
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        TeamMember::try_from(row).map_err(|e| StoreError::Invalid(e.to_string()))
    }

    async fn update_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE team_members SET role = $3 WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate_member(&self, team_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE team_members SET active = FALSE WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgRelationshipStore {
    pool: PgPool,
}

impl PgRelationshipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationshipStore for PgRelationshipStore {
    async fn list_edges_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RelationshipRow>, StoreError> {
        Ok(sqlx::query_as::<_, RelationshipRow>(
            r#"
            SELECT * FROM mentor_relationships
            WHERE mentor_id = $1 OR mentee_id = $1
            ORDER BY mentor_id, mentee_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_edge(&self, key: EdgeKey) -> Result<Option<RelationshipRow>, StoreError> {
        Ok(sqlx::query_as::<_, RelationshipRow>(
            "SELECT * FROM mentor_relationships WHERE mentor_id = $1 AND mentee_id = $2",
        )
        .bind(key.mentor_id)
        .bind(key.mentee_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_edge(&self, edge: &NewRelationship) -> Result<RelationshipRow, StoreError> {
        let key = EdgeKey::new(edge.mentor_id, edge.mentee_id);
        let result = sqlx::query_as::<_, RelationshipRow>(
            r#"
            INSERT INTO mentor_relationships
                (id, mentor_id, mentee_id, relationship_type, invitation_status,
                 active, accepted_at, permissions_granted)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(edge.mentor_id)
        .bind(edge.mentee_id)
        .bind(edge.relationship_type.as_str())
        .bind(InvitationStatus::Accepted.as_str())
        .bind(edge.accepted_at)
        .bind(edge.permissions.to_value())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!("Insert of {key} lost to a concurrent writer");
                Err(StoreError::UniqueViolation(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reactivate_edge(
        &self,
        relationship_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mentor_relationships
            SET active = TRUE, invitation_status = 'accepted', accepted_at = $2
            WHERE id = $1
            "#,
        )
        .bind(relationship_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        expect_single_row(result.rows_affected(), relationship_id)
    }

    async fn deactivate_edge(&self, relationship_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE mentor_relationships SET active = FALSE WHERE id = $1")
            .bind(relationship_id)
            .execute(&self.pool)
            .await?;
        expect_single_row(result.rows_affected(), relationship_id)
    }

    async fn set_edge_type(
        &self,
        relationship_id: Uuid,
        relationship_type: RelationshipType,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE mentor_relationships SET relationship_type = $2 WHERE id = $1")
                .bind(relationship_id)
                .bind(relationship_type.as_str())
                .execute(&self.pool)
                .await?;
        expect_single_row(result.rows_affected(), relationship_id)
    }

    async fn normalize_legacy_status(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mentor_relationships
            SET active = (invitation_status <> 'declined')
            WHERE active IS NULL AND (mentor_id = $1 OR mentee_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_active_mentees(
        &self,
        mentor_id: Uuid,
    ) -> Result<Vec<MenteeSummary>, StoreError> {
        let rows = sqlx::query_as::<_, MenteeSummaryRow>(
            r#"
            SELECT r.mentee_id, r.id AS relationship_id, r.relationship_type,
                   r.permissions_granted, r.accepted_at, u.display_name, u.email
            FROM mentor_relationships r
            LEFT JOIN users u ON u.id = r.mentee_id
            WHERE r.mentor_id = $1 AND r.active = TRUE
            ORDER BY r.accepted_at DESC NULLS LAST, r.mentee_id
            "#,
        )
        .bind(mentor_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| MenteeSummary::try_from(row).map_err(StoreError::Invalid))
            .collect()
    }

    async fn list_active_mentors(
        &self,
        mentee_id: Uuid,
    ) -> Result<Vec<MentorSummary>, StoreError> {
        let rows = sqlx::query_as::<_, MentorSummaryRow>(
            r#"
            SELECT r.mentor_id, r.id AS relationship_id, r.relationship_type,
                   r.permissions_granted, r.accepted_at, u.display_name, u.email
            FROM mentor_relationships r
            LEFT JOIN users u ON u.id = r.mentor_id
            WHERE r.mentee_id = $1 AND r.active = TRUE
            ORDER BY r.accepted_at DESC NULLS LAST, r.mentor_id
            "#,
        )
        .bind(mentee_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| MentorSummary::try_from(row).map_err(StoreError::Invalid))
            .collect()
    }
}

/// Opens the mentorship conversation row the chat service picks up.
#[derive(Clone)]
pub struct PgConversationOpener {
    pool: PgPool,
}

impl PgConversationOpener {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationOpener for PgConversationOpener {
    async fn open_conversation(&self, mentor_id: Uuid, mentee_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, conversation_type, mentor_id, mentee_id)
            VALUES ($1, 'mentorship', $2, $3)
            ON CONFLICT (mentor_id, mentee_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(mentor_id)
        .bind(mentee_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
