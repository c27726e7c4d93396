//! In-memory implementation of every store seam, used by the tests.
//!
//! Mirrors the Postgres semantics that matter to the engine: the
//! `(mentor_id, mentee_id)` uniqueness constraint, conditional invitation
//! transitions, and profile joins. Writes can be made to fail per pair, or to
//! lose an insert race against a simulated concurrent writer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::invitations::store::InvitationStore;
use crate::models::invitation::{
    MentorInvitationRow, MentorInvitationStatus, TeamInvitationRow, TeamInvitationStatus,
};
use crate::models::relationship::{
    EdgeKey, InvitationStatus, MenteeSummary, MentorSummary, NewRelationship, Permissions,
    RelationshipRow, RelationshipType,
};
use crate::models::team::{TeamMember, TeamRole};
use crate::relationships::store::{
    ConversationOpener, MembershipStore, RelationshipStore, StoreError,
};

#[derive(Default)]
struct Inner {
    members: BTreeMap<(Uuid, Uuid), TeamMember>,
    edges: Vec<RelationshipRow>,
    profiles: HashMap<Uuid, (String, String)>,
    failing_pairs: HashSet<EdgeKey>,
    fail_all_edge_writes: bool,
    racing_pairs: HashSet<EdgeKey>,
    conversations: Vec<EdgeKey>,
    fail_conversations: bool,
    team_invitations: Vec<TeamInvitationRow>,
    mentor_invitations: Vec<MentorInvitationRow>,
}

impl Inner {
    fn write_blocked(&self, key: EdgeKey) -> Result<(), StoreError> {
        if self.fail_all_edge_writes || self.failing_pairs.contains(&key) {
            return Err(StoreError::Unavailable(format!("write to {key} rejected")));
        }
        Ok(())
    }

    fn edge_mut(&mut self, relationship_id: Uuid) -> Result<&mut RelationshipRow, StoreError> {
        self.edges
            .iter_mut()
            .find(|e| e.id == relationship_id)
            .ok_or_else(|| StoreError::Invalid(format!("relationship {relationship_id} not found")))
    }

    fn profile(&self, user_id: Uuid) -> (Option<String>, Option<String>) {
        match self.profiles.get(&user_id) {
            Some((name, email)) => (Some(name.clone()), Some(email.clone())),
            None => (None, None),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn add_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) {
        self.lock().members.insert(
            (team_id, user_id),
            TeamMember {
                team_id,
                user_id,
                role,
                active: true,
                joined_at: Utc::now(),
            },
        );
    }

    pub fn set_profile(&self, user_id: Uuid, display_name: &str, email: &str) {
        self.lock()
            .profiles
            .insert(user_id, (display_name.to_string(), email.to_string()));
    }

    pub fn seed_edge(
        &self,
        mentor_id: Uuid,
        mentee_id: Uuid,
        active: Option<bool>,
        status: &str,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().edges.push(RelationshipRow {
            id,
            mentor_id,
            mentee_id,
            relationship_type: "general".to_string(),
            invitation_status: status.to_string(),
            active,
            accepted_at: None,
            permissions_granted: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn edges(&self) -> Vec<RelationshipRow> {
        self.lock().edges.clone()
    }

    pub fn edge(&self, key: EdgeKey) -> Option<RelationshipRow> {
        self.lock().edges.iter().find(|e| e.key() == key).cloned()
    }

    pub fn active_keys(&self) -> Vec<EdgeKey> {
        let mut keys: Vec<EdgeKey> = self
            .lock()
            .edges
            .iter()
            .filter(|e| e.is_effectively_active())
            .map(|e| e.key())
            .collect();
        keys.sort();
        keys
    }

    pub fn fail_edge_writes_for(&self, key: EdgeKey) {
        self.lock().failing_pairs.insert(key);
    }

    pub fn fail_all_edge_writes(&self, fail: bool) {
        self.lock().fail_all_edge_writes = fail;
    }

    /// The next insert for `key` finds that another writer created the row first.
    pub fn race_insert_for(&self, key: EdgeKey) {
        self.lock().racing_pairs.insert(key);
    }

    pub fn fail_conversations(&self) {
        self.lock().fail_conversations = true;
    }

    pub fn conversations(&self) -> Vec<EdgeKey> {
        self.lock().conversations.clone()
    }

    pub fn add_team_invitation(&self, row: TeamInvitationRow) {
        self.lock().team_invitations.push(row);
    }

    pub fn add_mentor_invitation(&self, row: MentorInvitationRow) {
        self.lock().mentor_invitations.push(row);
    }

    pub fn team_invitation(&self, token: &str) -> Option<TeamInvitationRow> {
        self.lock()
            .team_invitations
            .iter()
            .find(|i| i.token == token)
            .cloned()
    }

    pub fn mentor_invitation(&self, token: &str) -> Option<MentorInvitationRow> {
        self.lock()
            .mentor_invitations
            .iter()
            .find(|i| i.token == token)
            .cloned()
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn list_active_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        Ok(self
            .lock()
            .members
            .values()
            .filter(|m| m.team_id == team_id && m.active)
            .cloned()
            .collect())
    }

    async fn get_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, StoreError> {
        Ok(self.lock().members.get(&(team_id, user_id)).cloned())
    }

    async fn get_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamRole>, StoreError> {
        Ok(self
            .lock()
            .members
            .get(&(team_id, user_id))
            .filter(|m| m.active)
            .map(|m| m.role))
    }

    async fn list_active_teams(&self, user_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        Ok(self
            .lock()
            .members
            .values()
            .filter(|m| m.user_id == user_id && m.active)
            .cloned()
            .collect())
    }

    async fn upsert_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<TeamMember, StoreError> {
        let mut inner = self.lock();
        let member = inner
            .members
            .entry((team_id, user_id))
            .or_insert_with(|| TeamMember {
                team_id,
                user_id,
                role,
                active: true,
                joined_at: Utc::now(),
            });
        member.role = role;
        member.active = true;
        Ok(member.clone())
    }

    async fn update_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<(), StoreError> {
        match self.lock().members.get_mut(&(team_id, user_id)) {
            Some(m) => {
                m.role = role;
                Ok(())
            }
            None => Err(StoreError::Invalid(format!(
                "user {user_id} is not a member of team {team_id}"
            ))),
        }
    }

    async fn deactivate_member(&self, team_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        if let Some(m) = self.lock().members.get_mut(&(team_id, user_id)) {
            m.active = false;
        }
        Ok(())
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn list_edges_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RelationshipRow>, StoreError> {
        Ok(self
            .lock()
            .edges
            .iter()
            .filter(|e| e.key().touches(user_id))
            .cloned()
            .collect())
    }

    async fn find_edge(&self, key: EdgeKey) -> Result<Option<RelationshipRow>, StoreError> {
        Ok(self.edge(key))
    }

    async fn insert_edge(&self, edge: &NewRelationship) -> Result<RelationshipRow, StoreError> {
        let key = EdgeKey::new(edge.mentor_id, edge.mentee_id);
        let mut inner = self.lock();
        inner.write_blocked(key)?;

        let row = RelationshipRow {
            id: Uuid::new_v4(),
            mentor_id: edge.mentor_id,
            mentee_id: edge.mentee_id,
            relationship_type: edge.relationship_type.as_str().to_string(),
            invitation_status: InvitationStatus::Accepted.as_str().to_string(),
            active: Some(true),
            accepted_at: Some(edge.accepted_at),
            permissions_granted: Some(edge.permissions.to_value()),
            created_at: Utc::now(),
        };

        if inner.racing_pairs.remove(&key) {
            // The concurrent writer's row lands first.
            inner.edges.push(RelationshipRow {
                active: Some(false),
                ..row
            });
            return Err(StoreError::UniqueViolation(key));
        }
        if inner.edges.iter().any(|e| e.key() == key) {
            return Err(StoreError::UniqueViolation(key));
        }
        inner.edges.push(row.clone());
        Ok(row)
    }

    async fn reactivate_edge(
        &self,
        relationship_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = inner.edge_mut(relationship_id)?.key();
        inner.write_blocked(key)?;
        let edge = inner.edge_mut(relationship_id)?;
        edge.active = Some(true);
        edge.invitation_status = InvitationStatus::Accepted.as_str().to_string();
        edge.accepted_at = Some(at);
        Ok(())
    }

    async fn deactivate_edge(&self, relationship_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = inner.edge_mut(relationship_id)?.key();
        inner.write_blocked(key)?;
        inner.edge_mut(relationship_id)?.active = Some(false);
        Ok(())
    }

    async fn set_edge_type(
        &self,
        relationship_id: Uuid,
        relationship_type: RelationshipType,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = inner.edge_mut(relationship_id)?.key();
        inner.write_blocked(key)?;
        inner.edge_mut(relationship_id)?.relationship_type =
            relationship_type.as_str().to_string();
        Ok(())
    }

    async fn normalize_legacy_status(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut repaired = 0;
        for edge in self.lock().edges.iter_mut() {
            if edge.active.is_none() && edge.key().touches(user_id) {
                edge.active = Some(!edge.is_declined());
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    async fn list_active_mentees(
        &self,
        mentor_id: Uuid,
    ) -> Result<Vec<MenteeSummary>, StoreError> {
        let inner = self.lock();
        inner
            .edges
            .iter()
            .filter(|e| e.mentor_id == mentor_id && e.active == Some(true))
            .map(|e| {
                let (display_name, email) = inner.profile(e.mentee_id);
                Ok(MenteeSummary {
                    mentee_id: e.mentee_id,
                    relationship_id: e.id,
                    relationship_type: RelationshipType::parse(&e.relationship_type)
                    .ok_or_else(|| StoreError::Invalid(e.relationship_type.clone()))?,
                    permissions: Permissions::from_stored(e.permissions_granted.as_ref())
                        .map_err(StoreError::Invalid)?,
                    accepted_at: e.accepted_at,
                    display_name,
                    email,
                })
            })
            .collect()
    }

    async fn list_active_mentors(
        &self,
        mentee_id: Uuid,
    ) -> Result<Vec<MentorSummary>, StoreError> {
        let inner = self.lock();
        let mut mentors = inner
            .edges
            .iter()
            .filter(|e| e.mentee_id == mentee_id && e.active == Some(true))
            .map(|e| {
                let (display_name, email) = inner.profile(e.mentor_id);
                Ok(MentorSummary {
                    mentor_id: e.mentor_id,
                    relationship_id: e.id,
                    relationship_type: RelationshipType::parse(&e.relationship_type)
                    .ok_or_else(|| StoreError::Invalid(e.relationship_type.clone()))?,
                    permissions: Permissions::from_stored(e.permissions_granted.as_ref())
                        .map_err(StoreError::Invalid)?,
                    accepted_at: e.accepted_at,
                    display_name,
                    email,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        mentors.sort_by(|a, b| b.accepted_at.cmp(&a.accepted_at));
        Ok(mentors)
    }
}

#[async_trait]
impl ConversationOpener for MemoryStore {
    async fn open_conversation(&self, mentor_id: Uuid, mentee_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_conversations {
            return Err(StoreError::Unavailable("chat service down".to_string()));
        }
        let key = EdgeKey::new(mentor_id, mentee_id);
        if !inner.conversations.contains(&key) {
            inner.conversations.push(key);
        }
        Ok(())
    }
}

#[async_trait]
impl InvitationStore for MemoryStore {
    async fn find_team_invitation(
        &self,
        token: &str,
    ) -> Result<Option<TeamInvitationRow>, StoreError> {
        Ok(self.team_invitation(token))
    }

    async fn transition_team_invitation(
        &self,
        invitation_id: Uuid,
        to: TeamInvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner
            .team_invitations
            .iter_mut()
            .find(|i| i.id == invitation_id && i.status == "pending")
        {
            Some(inv) => {
                inv.status = to.as_str().to_string();
                inv.responded_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_mentor_invitation(
        &self,
        token: &str,
    ) -> Result<Option<MentorInvitationRow>, StoreError> {
        Ok(self.mentor_invitation(token))
    }

    async fn transition_mentor_invitation(
        &self,
        invitation_id: Uuid,
        to: MentorInvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner
            .mentor_invitations
            .iter_mut()
            .find(|i| i.id == invitation_id && i.status == "pending")
        {
            Some(inv) => {
                inv.status = to.as_str().to_string();
                inv.responded_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
