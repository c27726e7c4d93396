//! Sync-on-write driver: applies reconciler diffs to the relationship store.
//!
//! Flow: load roster (after the membership write) → load the member's edges →
//! build the protected set from the member's other teams → compute diff →
//! apply edge by edge → hand new edges to chat → verify.
//!
//! Application is best-effort: each edge is written independently, failures
//! are collected in `BatchResult::failed`, and the batch always runs to the
//! end. Re-running the sync converges whatever a previous run left behind.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::relationship::{EdgeKey, NewRelationship, Permissions, RelationshipType};
use crate::models::team::TeamRole;
use crate::relationships::reconciler::{
    compute_desired_edges, required_for_member, EdgeDiff, PlannedEdge, TeamSnapshot, Trigger,
};
use crate::relationships::store::{
    ConversationOpener, MembershipStore, RelationshipStore, StoreError,
};
use crate::relationships::verification::{
    verify_member_edges, VerificationFailure, VerificationReport, VerifyError,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to load relationship snapshot: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Verification(#[from] VerificationFailure),
}

impl From<VerifyError> for SyncError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Failed(f) => SyncError::Verification(f),
            VerifyError::Store(s) => SyncError::Store(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOperation {
    Create,
    Reactivate,
    Retype,
    Deactivate,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeFailure {
    pub key: EdgeKey,
    pub operation: EdgeOperation,
    pub message: String,
}

/// Outcome of applying one diff.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub created: Vec<EdgeKey>,
    pub reactivated: Vec<EdgeKey>,
    pub retyped: Vec<EdgeKey>,
    pub deactivated: Vec<EdgeKey>,
    pub unchanged: usize,
    pub failed: Vec<EdgeFailure>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.created.len() + self.reactivated.len() + self.retyped.len() + self.deactivated.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: BatchResult) {
        self.created.extend(other.created);
        self.reactivated.extend(other.reactivated);
        self.retyped.extend(other.retyped);
        self.deactivated.extend(other.deactivated);
        self.unchanged += other.unchanged;
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub team_id: Uuid,
    pub trigger: Trigger,
    pub batch: BatchResult,
    pub verification: Option<VerificationReport>,
}

/// Reconciles relationship edges against team membership.
///
/// Cheap to clone; holds shared handles to the store seams.
#[derive(Clone)]
pub struct RelationshipSync {
    memberships: Arc<dyn MembershipStore>,
    relationships: Arc<dyn RelationshipStore>,
    conversations: Arc<dyn ConversationOpener>,
}

impl RelationshipSync {
    pub fn new(
        memberships: Arc<dyn MembershipStore>,
        relationships: Arc<dyn RelationshipStore>,
        conversations: Arc<dyn ConversationOpener>,
    ) -> Self {
        Self {
            memberships,
            relationships,
            conversations,
        }
    }

    /// Write-path entry point, called after a membership mutation is visible.
    ///
    /// Per-edge failures are reported in the outcome. Only an unreadable
    /// snapshot or a failed verification is returned as an error.
    pub async fn sync_team_member(
        &self,
        team_id: Uuid,
        trigger: Trigger,
    ) -> Result<SyncOutcome, SyncError> {
        let user_id = trigger.user_id();
        let diff = self.plan(team_id, &trigger).await?;
        info!(
            "Relationship sync ({}) for user {} in team {}: {} to create, {} to reactivate, {} to retype, {} to deactivate, {} unchanged",
            trigger.name(),
            user_id,
            team_id,
            diff.to_create.len(),
            diff.to_reactivate.len(),
            diff.to_retype.len(),
            diff.to_deactivate.len(),
            diff.unchanged
        );

        let batch = self.apply(&diff).await;
        if !batch.is_clean() {
            warn!(
                "Relationship sync for user {} in team {} finished with {} failed edge(s)",
                user_id,
                team_id,
                batch.failed.len()
            );
        }

        let verification = if trigger.expects_edges() {
            Some(
                verify_member_edges(self.relationships.as_ref(), team_id, user_id, &diff.required)
                    .await?,
            )
        } else {
            None
        };

        Ok(SyncOutcome {
            team_id,
            trigger,
            batch,
            verification,
        })
    }

    /// Read-path entry point: creates or reactivates whatever the member's
    /// current role requires in the team. Never deactivates and never verifies.
    pub async fn repair_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<BatchResult, SyncError> {
        let trigger = Trigger::MemberJoined { user_id, role };
        let diff = self.plan(team_id, &trigger).await?;
        if diff.is_empty() {
            return Ok(BatchResult {
                unchanged: diff.unchanged,
                ..BatchResult::default()
            });
        }
        info!(
            "Read-repair for user {} in team {}: {} edge(s) missing or inactive",
            user_id,
            team_id,
            diff.operation_count()
        );
        Ok(self.apply(&diff).await)
    }

    /// Creates or reactivates a single explicit edge (mentor invitations).
    pub async fn ensure_edge(
        &self,
        key: EdgeKey,
        relationship_type: RelationshipType,
    ) -> BatchResult {
        let mut batch = BatchResult::default();
        let planned = PlannedEdge {
            key,
            relationship_type,
        };

        let existing = match self.relationships.find_edge(key).await {
            Ok(existing) => existing,
            Err(e) => {
                record_failure(&mut batch, key, EdgeOperation::Create, &e);
                return batch;
            }
        };

        match existing {
            Some(row) if row.is_effectively_active() => batch.unchanged += 1,
            Some(row) => match self.relationships.reactivate_edge(row.id, Utc::now()).await {
                Ok(()) => batch.reactivated.push(key),
                Err(e) => record_failure(&mut batch, key, EdgeOperation::Reactivate, &e),
            },
            None => match self.create_or_reactivate(&planned).await {
                Ok(EdgeOperation::Create) => batch.created.push(key),
                Ok(_) => batch.reactivated.push(key),
                Err(e) => record_failure(&mut batch, key, EdgeOperation::Create, &e),
            },
        }

        self.announce(&batch);
        batch
    }

    async fn plan(&self, team_id: Uuid, trigger: &Trigger) -> Result<EdgeDiff, StoreError> {
        let user_id = trigger.user_id();
        let members = self.memberships.list_active_members(team_id).await?;
        let snapshot = TeamSnapshot::from_members(team_id, &members);
        let existing = self.relationships.list_edges_for_user(user_id).await?;
        let protected = self.protected_pairs(team_id, user_id).await?;
        Ok(compute_desired_edges(&snapshot, trigger, &existing, &protected))
    }

    /// Pairs touching `user_id` that another shared team still requires.
    async fn protected_pairs(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<HashSet<EdgeKey>, StoreError> {
        let mut protected = HashSet::new();
        let other_teams = self.memberships.list_active_teams(user_id).await?;
        for membership in other_teams.iter().filter(|m| m.team_id != team_id) {
            let members = self
                .memberships
                .list_active_members(membership.team_id)
                .await?;
            let snapshot = TeamSnapshot::from_members(membership.team_id, &members);
            protected.extend(required_for_member(&snapshot, user_id).into_keys());
        }
        Ok(protected)
    }

    async fn apply(&self, diff: &EdgeDiff) -> BatchResult {
        let mut batch = BatchResult {
            unchanged: diff.unchanged,
            ..BatchResult::default()
        };

        for planned in &diff.to_create {
            match self.create_or_reactivate(planned).await {
                Ok(EdgeOperation::Create) => batch.created.push(planned.key),
                Ok(_) => batch.reactivated.push(planned.key),
                Err(e) => record_failure(&mut batch, planned.key, EdgeOperation::Create, &e),
            }
        }

        for edge in &diff.to_reactivate {
            match self
                .relationships
                .reactivate_edge(edge.relationship_id, Utc::now())
                .await
            {
                Ok(()) => batch.reactivated.push(edge.key),
                Err(e) => record_failure(&mut batch, edge.key, EdgeOperation::Reactivate, &e),
            }
        }

        for edge in &diff.to_retype {
            match self
                .relationships
                .set_edge_type(edge.relationship_id, edge.relationship_type)
                .await
            {
                Ok(()) => batch.retyped.push(edge.key),
                Err(e) => record_failure(&mut batch, edge.key, EdgeOperation::Retype, &e),
            }
        }

        for edge in &diff.to_deactivate {
            match self.relationships.deactivate_edge(edge.relationship_id).await {
                Ok(()) => batch.deactivated.push(edge.key),
                Err(e) => record_failure(&mut batch, edge.key, EdgeOperation::Deactivate, &e),
            }
        }

        self.announce(&batch);
        batch
    }

    /// Inserts the edge; if a concurrent writer got there first, reactivates
    /// the winner's row instead.
    async fn create_or_reactivate(
        &self,
        planned: &PlannedEdge,
    ) -> Result<EdgeOperation, StoreError> {
        let now = Utc::now();
        let new_edge = NewRelationship {
            mentor_id: planned.key.mentor_id,
            mentee_id: planned.key.mentee_id,
            relationship_type: planned.relationship_type,
            permissions: Permissions::default(),
            accepted_at: now,
        };

        match self.relationships.insert_edge(&new_edge).await {
            Ok(_) => Ok(EdgeOperation::Create),
            Err(StoreError::UniqueViolation(key)) => {
                debug!("Edge {key} already exists; reactivating");
                let row = self.relationships.find_edge(key).await?.ok_or_else(|| {
                    StoreError::Invalid(format!("edge {key} reported as duplicate but not found"))
                })?;
                self.relationships.reactivate_edge(row.id, now).await?;
                Ok(EdgeOperation::Reactivate)
            }
            Err(e) => Err(e),
        }
    }

    /// Fire-and-forget hand-off to the chat collaborator for every edge that
    /// became active in this batch.
    fn announce(&self, batch: &BatchResult) {
        for key in batch.created.iter().chain(batch.reactivated.iter()).copied() {
            let opener = Arc::clone(&self.conversations);
            tokio::spawn(async move {
                if let Err(e) = opener.open_conversation(key.mentor_id, key.mentee_id).await {
                    warn!("Failed to open conversation for relationship {key}: {e}");
                }
            });
        }
    }
}

fn record_failure(batch: &mut BatchResult, key: EdgeKey, operation: EdgeOperation, e: &StoreError) {
    warn!("Relationship edge {key} {operation:?} failed: {e}");
    batch.failed.push(EdgeFailure {
        key,
        operation,
        message: e.to_string(),
    });
}
