use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::team::TeamRole;
use crate::relationships::driver::{BatchResult, RelationshipSync};
use crate::relationships::reconciler::Trigger;
use crate::relationships::store::MembershipStore;
use crate::relationships::verification::VerificationReport;

#[derive(Debug, Serialize)]
pub struct MembershipChange {
    pub team_id: Uuid,
    pub user_id: Uuid,
    /// `None` once the member has been removed.
    pub role: Option<TeamRole>,
    pub relationships: BatchResult,
    pub verification: Option<VerificationReport>,
}

#[derive(Clone)]
pub struct TeamMembershipService {
    memberships: Arc<dyn MembershipStore>,
    sync: RelationshipSync,
}

impl TeamMembershipService {
    pub fn new(memberships: Arc<dyn MembershipStore>, sync: RelationshipSync) -> Self {
        Self { memberships, sync }
    }

    pub async fn change_member_role(
        &self,
        team_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
        new_role: TeamRole,
    ) -> Result<MembershipChange, AppError> {
        self.require_admin(team_id, actor_id).await?;
        let old_role = self.require_member(team_id, user_id).await?;

        self.memberships
            .update_role(team_id, user_id, new_role)
            .await?;

        let outcome = self
            .sync
            .sync_team_member(
                team_id,
                Trigger::RoleChanged {
                    user_id,
                    old_role,
                    new_role,
                },
            )
            .await?;

        info!(
            "Role of user {} in team {} changed {} -> {} by {}",
            user_id, team_id, old_role, new_role, actor_id
        );

        Ok(MembershipChange {
            team_id,
            user_id,
            role: Some(new_role),
            relationships: outcome.batch,
            verification: outcome.verification,
        })
    }

    /// Admins may remove anyone; members may remove themselves.
    pub async fn remove_member(
        &self,
        team_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
    ) -> Result<MembershipChange, AppError> {
        if actor_id != user_id {
            self.require_admin(team_id, actor_id).await?;
        }
        let last_role = self.require_member(team_id, user_id).await?;

        self.memberships.deactivate_member(team_id, user_id).await?;

        let outcome = self
            .sync
            .sync_team_member(team_id, Trigger::MemberRemoved { user_id, last_role })
            .await?;

        info!(
            "User {} removed from team {} by {} ({} relationship(s) deactivated)",
            user_id,
            team_id,
            actor_id,
            outcome.batch.deactivated.len()
        );

        Ok(MembershipChange {
            team_id,
            user_id,
            role: None,
            relationships: outcome.batch,
            verification: outcome.verification,
        })
    }

    async fn require_admin(&self, team_id: Uuid, actor_id: Uuid) -> Result<(), AppError> {
        match self.memberships.get_role(team_id, actor_id).await? {
            Some(TeamRole::Admin) => Ok(()),
            _ => Err(AppError::Forbidden(format!(
                "user {actor_id} is not an admin of team {team_id}"
            ))),
        }
    }

    async fn require_member(&self, team_id: Uuid, user_id: Uuid) -> Result<TeamRole, AppError> {
        self.memberships
            .get_role(team_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("user {user_id} is not a member of team {team_id}"))
            })
    }
}
