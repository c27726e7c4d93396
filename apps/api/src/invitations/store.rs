use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::invitation::{
    MentorInvitationRow, MentorInvitationStatus, TeamInvitationRow, TeamInvitationStatus,
};
use crate::relationships::store::StoreError;

/// Token-addressed invitation records.
///
/// Status transitions are conditional on the row still being `pending`; they
/// return `false` when another request already moved it.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn find_team_invitation(
        &self,
        token: &str,
    ) -> Result<Option<TeamInvitationRow>, StoreError>;

    async fn transition_team_invitation(
        &self,
        invitation_id: Uuid,
        to: TeamInvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn find_mentor_invitation(
        &self,
        token: &str,
    ) -> Result<Option<MentorInvitationRow>, StoreError>;

    async fn transition_mentor_invitation(
        &self,
        invitation_id: Uuid,
        to: MentorInvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgInvitationStore {
    pool: PgPool,
}

impl PgInvitationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationStore for PgInvitationStore {
    async fn find_team_invitation(
        &self,
        token: &str,
    ) -> Result<Option<TeamInvitationRow>, StoreError> {
        Ok(sqlx::query_as::<_, TeamInvitationRow>(
            "SELECT * FROM team_invitations WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn transition_team_invitation(
        &self,
        invitation_id: Uuid,
        to: TeamInvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE team_invitations
            SET status = $2, responded_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(invitation_id)
        .bind(to.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_mentor_invitation(
        &self,
        token: &str,
    ) -> Result<Option<MentorInvitationRow>, StoreError> {
        Ok(sqlx::query_as::<_, MentorInvitationRow>(
            "SELECT * FROM mentor_invitations WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn transition_mentor_invitation(
        &self,
        invitation_id: Uuid,
        to: MentorInvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mentor_invitations
            SET status = $2, responded_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(invitation_id)
        .bind(to.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
