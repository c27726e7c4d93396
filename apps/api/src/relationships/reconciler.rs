//! Edge reconciler: pure computation of the mentor → mentee edge diff for one
//! team member.
//!
//! Desired graph for a team: every active mentor-capable member is the mentor
//! of every other active member. A trigger scopes the diff to the edges
//! touching the affected member; the other members' edges are reconciled by
//! their own triggers (or by read-repair).
//!
//! No I/O happens here. The write path (`driver`) and the read path
//! (`normalizer`) both call `compute_desired_edges` and apply the result.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::models::relationship::{EdgeKey, RelationshipRow, RelationshipType};
use crate::models::team::{RoleClass, TeamMember, TeamRole};

/// Membership change that requires the affected member's edges to be re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    MemberJoined {
        user_id: Uuid,
        role: TeamRole,
    },
    RoleChanged {
        user_id: Uuid,
        old_role: TeamRole,
        new_role: TeamRole,
    },
    MemberRemoved {
        user_id: Uuid,
        last_role: TeamRole,
    },
}

impl Trigger {
    pub fn user_id(&self) -> Uuid {
        match *self {
            Trigger::MemberJoined { user_id, .. }
            | Trigger::RoleChanged { user_id, .. }
            | Trigger::MemberRemoved { user_id, .. } => user_id,
        }
    }

    /// Role the member holds after the change; `None` once removed.
    pub fn current_role(&self) -> Option<TeamRole> {
        match *self {
            Trigger::MemberJoined { role, .. } => Some(role),
            Trigger::RoleChanged { new_role, .. } => Some(new_role),
            Trigger::MemberRemoved { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Trigger::MemberJoined { .. } => "member_joined",
            Trigger::RoleChanged { .. } => "role_changed",
            Trigger::MemberRemoved { .. } => "member_removed",
        }
    }

    /// Joins and role changes are expected to leave the member with edges;
    /// removals are not.
    pub fn expects_edges(&self) -> bool {
        !matches!(self, Trigger::MemberRemoved { .. })
    }
}

/// Active roster of one team as read after the triggering write.
#[derive(Debug, Clone, Default)]
pub struct TeamSnapshot {
    pub team_id: Uuid,
    roster: BTreeMap<Uuid, TeamRole>,
}

impl TeamSnapshot {
    pub fn new(team_id: Uuid) -> Self {
        Self {
            team_id,
            roster: BTreeMap::new(),
        }
    }

    /// Builds a snapshot from membership rows, ignoring inactive ones.
    pub fn from_members(team_id: Uuid, members: &[TeamMember]) -> Self {
        members
            .iter()
            .filter(|m| m.active && m.team_id == team_id)
            .fold(Self::new(team_id), |snapshot, m| {
                snapshot.with_member(m.user_id, m.role)
            })
    }

    pub fn with_member(mut self, user_id: Uuid, role: TeamRole) -> Self {
        self.roster.insert(user_id, role);
        self
    }

    pub fn role_of(&self, user_id: Uuid) -> Option<TeamRole> {
        self.roster.get(&user_id).copied()
    }

    pub fn members(&self) -> impl Iterator<Item = (Uuid, TeamRole)> + '_ {
        self.roster.iter().map(|(id, role)| (*id, *role))
    }
}

/// An edge that should exist but has no row yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedEdge {
    pub key: EdgeKey,
    pub relationship_type: RelationshipType,
}

/// An existing row the diff wants to flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExistingEdge {
    pub relationship_id: Uuid,
    pub key: EdgeKey,
}

/// An existing outgoing edge whose type no longer matches its mentor's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetypedEdge {
    pub relationship_id: Uuid,
    pub key: EdgeKey,
    pub relationship_type: RelationshipType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeDiff {
    pub to_create: Vec<PlannedEdge>,
    pub to_reactivate: Vec<ExistingEdge>,
    pub to_retype: Vec<RetypedEdge>,
    pub to_deactivate: Vec<ExistingEdge>,
    /// Required edges already active; left untouched.
    pub unchanged: usize,
    /// Every edge touching the member that the roster requires.
    pub required: Vec<EdgeKey>,
}

impl EdgeDiff {
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    pub fn operation_count(&self) -> usize {
        self.to_create.len()
            + self.to_reactivate.len()
            + self.to_retype.len()
            + self.to_deactivate.len()
    }
}

pub fn relationship_type_for(mentor_role: TeamRole) -> RelationshipType {
    match mentor_role {
        TeamRole::CareerCoach => RelationshipType::CareerCoaching,
        _ => RelationshipType::General,
    }
}

/// Required edges touching `user_id`, in either direction.
pub fn required_for_member(
    snapshot: &TeamSnapshot,
    user_id: Uuid,
) -> BTreeMap<EdgeKey, RelationshipType> {
    let mut required = BTreeMap::new();
    let Some(user_role) = snapshot.role_of(user_id) else {
        return required;
    };
    for (other_id, other_role) in snapshot.members() {
        if other_id == user_id {
            continue;
        }
        if user_role.is_mentor_capable() {
            required.insert(
                EdgeKey::new(user_id, other_id),
                relationship_type_for(user_role),
            );
        }
        if other_role.is_mentor_capable() {
            required.insert(
                EdgeKey::new(other_id, user_id),
                relationship_type_for(other_role),
            );
        }
    }
    required
}

/// Computes the minimal create/reactivate/deactivate set that brings the
/// edges touching the trigger's member in line with the team roster.
///
/// `existing` should hold every relationship row touching the member; rows
/// for other pairs are ignored. `protected` pairs are still required by
/// another team the two users share and are never deactivated.
///
/// A removal deactivates the edges the member held in its last role: outgoing
/// for a mentor, incoming for a mentee, none for an admin. Edges a remaining
/// mentor holds towards a departed mentor stay active.
pub fn compute_desired_edges(
    snapshot: &TeamSnapshot,
    trigger: &Trigger,
    existing: &[RelationshipRow],
    protected: &HashSet<EdgeKey>,
) -> EdgeDiff {
    let user_id = trigger.user_id();

    // The trigger's role wins over whatever the snapshot read back; a member
    // missing from the snapshot is not active and gets nothing created.
    let mut roster = snapshot.clone();
    match trigger.current_role() {
        Some(role) if roster.role_of(user_id).is_some() => {
            roster.roster.insert(user_id, role);
        }
        Some(_) => {}
        None => {
            roster.roster.remove(&user_id);
        }
    }

    let by_key: HashMap<EdgeKey, &RelationshipRow> = existing
        .iter()
        .filter(|row| row.key().touches(user_id))
        .map(|row| (row.key(), row))
        .collect();

    let mut diff = EdgeDiff::default();
    let required = required_for_member(&roster, user_id);

    // Only a move between mentor roles re-types the member's outgoing edges;
    // explicitly invited edges keep the type they were created with otherwise.
    let retypes_outgoing = matches!(
        trigger,
        Trigger::RoleChanged { old_role, new_role, .. }
            if old_role != new_role
                && old_role.is_mentor_capable()
                && new_role.is_mentor_capable()
    );

    for (key, relationship_type) in &required {
        let Some(row) = by_key.get(key) else {
            diff.to_create.push(PlannedEdge {
                key: *key,
                relationship_type: *relationship_type,
            });
            continue;
        };

        if row.is_effectively_active() {
            diff.unchanged += 1;
        } else {
            diff.to_reactivate.push(ExistingEdge {
                relationship_id: row.id,
                key: *key,
            });
        }

        if retypes_outgoing
            && key.mentor_id == user_id
            && !protected.contains(key)
            && row.relationship_type != relationship_type.as_str()
        {
            diff.to_retype.push(RetypedEdge {
                relationship_id: row.id,
                key: *key,
                relationship_type: *relationship_type,
            });
        }
    }

    let stale = |key: &EdgeKey| -> bool {
        let counterpart = if key.mentor_id == user_id {
            key.mentee_id
        } else {
            key.mentor_id
        };
        counterpart != user_id
            && roster.role_of(counterpart).is_some()
            && !required.contains_key(key)
            && !protected.contains(key)
    };

    let mut to_deactivate: Vec<ExistingEdge> = match trigger {
        Trigger::MemberJoined { .. } => Vec::new(),
        Trigger::RoleChanged { new_role, .. } if !new_role.is_mentor_capable() => by_key
            .values()
            .filter(|row| row.mentor_id == user_id && row.is_effectively_active())
            .filter(|row| stale(&row.key()))
            .map(|row| ExistingEdge {
                relationship_id: row.id,
                key: row.key(),
            })
            .collect(),
        Trigger::RoleChanged { .. } => Vec::new(),
        Trigger::MemberRemoved { last_role, .. } => by_key
            .values()
            .filter(|row| match last_role.class() {
                RoleClass::MentorCapable => row.mentor_id == user_id,
                RoleClass::MenteeCapable => row.mentee_id == user_id,
                RoleClass::Neither => false,
            })
            .filter(|row| row.is_effectively_active())
            .filter(|row| stale(&row.key()))
            .map(|row| ExistingEdge {
                relationship_id: row.id,
                key: row.key(),
            })
            .collect(),
    };

    diff.to_reactivate.sort_by_key(|e| e.key);
    diff.to_retype.sort_by_key(|e| e.key);
    to_deactivate.sort_by_key(|e| e.key);
    diff.to_deactivate = to_deactivate;
    diff.required = required.into_keys().collect();
    diff
}
