//! Sync-on-read normalizer: read-repair in front of the mentee/mentor lists.
//!
//! Every read first resolves legacy NULL `active` flags, then re-runs the
//! reconciler (create/reactivate only) for the teams the reader belongs to.
//! Repair failures are logged and never fail the read itself.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::models::relationship::{MenteeSummary, MentorSummary};
use crate::relationships::driver::{BatchResult, RelationshipSync};
use crate::relationships::store::{MembershipStore, RelationshipStore, StoreError};

#[derive(Clone)]
pub struct RelationshipReader {
    memberships: Arc<dyn MembershipStore>,
    relationships: Arc<dyn RelationshipStore>,
    sync: RelationshipSync,
    read_repair: bool,
}

/// Which side of the edge the reader sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Perspective {
    Mentor,
    Mentee,
}

impl RelationshipReader {
    pub fn new(
        memberships: Arc<dyn MembershipStore>,
        relationships: Arc<dyn RelationshipStore>,
        sync: RelationshipSync,
        read_repair: bool,
    ) -> Self {
        Self {
            memberships,
            relationships,
            sync,
            read_repair,
        }
    }

    /// Active mentees of `mentor_id`, after read-repair.
    pub async fn get_mentees(&self, mentor_id: Uuid) -> Result<Vec<MenteeSummary>, StoreError> {
        self.normalize(mentor_id, Perspective::Mentor).await;
        self.relationships.list_active_mentees(mentor_id).await
    }

    /// The mentee's most recently accepted active mentor, after read-repair.
    pub async fn get_mentor(&self, mentee_id: Uuid) -> Result<Option<MentorSummary>, StoreError> {
        self.normalize(mentee_id, Perspective::Mentee).await;
        Ok(self
            .relationships
            .list_active_mentors(mentee_id)
            .await?
            .into_iter()
            .next())
    }

    async fn normalize(&self, user_id: Uuid, perspective: Perspective) {
        match self.relationships.normalize_legacy_status(user_id).await {
            Ok(0) => {}
            Ok(n) => info!("Repaired {n} legacy relationship row(s) for user {user_id}"),
            Err(e) => warn!("Legacy status repair failed for user {user_id}: {e}"),
        }

        if !self.read_repair {
            return;
        }

        let memberships = match self.memberships.list_active_teams(user_id).await {
            Ok(m) => m,
            Err(e) => {
                warn!("Read-repair skipped for user {user_id}: {e}");
                return;
            }
        };

        let mut repaired = BatchResult::default();
        for membership in memberships {
            if perspective == Perspective::Mentor && !membership.role.is_mentor_capable() {
                continue;
            }
            match self
                .sync
                .repair_member(membership.team_id, user_id, membership.role)
                .await
            {
                Ok(batch) => repaired.merge(batch),
                Err(e) => warn!(
                    "Read-repair failed for user {} in team {}: {}",
                    user_id, membership.team_id, e
                ),
            }
        }

        if !repaired.is_clean() {
            warn!(
                "Read-repair for user {} left {} edge(s) unrepaired",
                user_id,
                repaired.failed.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::relationship::EdgeKey;
    use crate::models::team::TeamRole;
    use crate::relationships::memory::MemoryStore;

    fn uid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn reader_for(store: &MemoryStore, read_repair: bool) -> RelationshipReader {
        let sync = RelationshipSync::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        );
        RelationshipReader::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            sync,
            read_repair,
        )
    }

    #[tokio::test]
    async fn test_get_mentees_fills_missing_edges() {
        let store = MemoryStore::new();
        let team = uid(100);
        let (a, b, c) = (uid(1), uid(2), uid(3));
        store.add_member(team, a, TeamRole::Mentor);
        store.add_member(team, b, TeamRole::Candidate);
        store.add_member(team, c, TeamRole::Peer);
        store.set_profile(b, "Bea", "bea@example.com");

        let mut mentees = reader_for(&store, true).get_mentees(a).await.unwrap();
        mentees.sort_by_key(|m| m.mentee_id);

        assert_eq!(mentees.len(), 2);
        assert_eq!(mentees[0].mentee_id, b);
        assert_eq!(mentees[0].display_name.as_deref(), Some("Bea"));
        assert_eq!(mentees[0].email.as_deref(), Some("bea@example.com"));
        assert_eq!(mentees[1].mentee_id, c);
        assert!(mentees[1].display_name.is_none());
        assert!(mentees[0].permissions.can_assign_tasks);
    }

    #[tokio::test]
    async fn test_legacy_null_rows_are_repaired_on_read() {
        let store = MemoryStore::new();
        let (a, b, c) = (uid(1), uid(2), uid(3));
        store.seed_edge(a, b, None, "accepted");
        store.seed_edge(a, c, None, "declined");

        let mentees = reader_for(&store, false).get_mentees(a).await.unwrap();

        assert_eq!(mentees.len(), 1);
        assert_eq!(mentees[0].mentee_id, b);
        assert_eq!(store.edge(EdgeKey::new(a, b)).unwrap().active, Some(true));
        assert_eq!(store.edge(EdgeKey::new(a, c)).unwrap().active, Some(false));
    }

    #[tokio::test]
    async fn test_non_mentor_reader_does_not_mentor() {
        let store = MemoryStore::new();
        let team = uid(100);
        let (a, b) = (uid(1), uid(2));
        store.add_member(team, a, TeamRole::Peer);
        store.add_member(team, b, TeamRole::Candidate);

        let mentees = reader_for(&store, true).get_mentees(a).await.unwrap();
        assert!(mentees.is_empty());
        assert!(store.edges().is_empty());
    }

    #[tokio::test]
    async fn test_get_mentor_repairs_incoming_edge() {
        let store = MemoryStore::new();
        let team = uid(100);
        let (a, b) = (uid(1), uid(2));
        store.add_member(team, a, TeamRole::CareerCoach);
        store.add_member(team, b, TeamRole::Candidate);
        store.seed_edge(a, b, Some(false), "accepted");

        let mentor = reader_for(&store, true).get_mentor(b).await.unwrap().unwrap();
        assert_eq!(mentor.mentor_id, a);
        assert_eq!(store.edges().len(), 1);
    }

    #[tokio::test]
    async fn test_read_repair_can_be_disabled() {
        let store = MemoryStore::new();
        let team = uid(100);
        store.add_member(team, uid(1), TeamRole::Mentor);
        store.add_member(team, uid(2), TeamRole::Candidate);

        let mentor = reader_for(&store, false).get_mentor(uid(2)).await.unwrap();
        assert!(mentor.is_none());
        assert!(store.edges().is_empty());
    }

    #[tokio::test]
    async fn test_repair_failure_does_not_fail_read() {
        let store = MemoryStore::new();
        let team = uid(100);
        let (a, b) = (uid(1), uid(2));
        store.add_member(team, a, TeamRole::Mentor);
        store.add_member(team, b, TeamRole::Candidate);
        store.fail_all_edge_writes(true);

        let mentees = reader_for(&store, true).get_mentees(a).await.unwrap();
        assert!(mentees.is_empty());
    }
}
