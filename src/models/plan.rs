use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::User;

/// A repair plan loaded together with its procedure associations and their members.
///
/// The plan is a snapshot: membership changes are made in memory and written back in one
/// go by [`crate::store::AssociationStore::persist`].
#[derive(Debug, Clone)]
pub struct Plan {
    pub plan_id: i64,
    pub procedures: Vec<PlanProcedure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn procedure(&self, procedure_id: i64) -> Option<&PlanProcedure> {
        self.procedures
            .iter()
            .find(|pp| pp.procedure_id == procedure_id)
    }

    pub fn procedure_mut(&mut self, procedure_id: i64) -> Option<&mut PlanProcedure> {
        self.procedures
            .iter_mut()
            .find(|pp| pp.procedure_id == procedure_id)
    }

    /// True if any association has membership changes not yet persisted.
    pub fn has_pending_changes(&self) -> bool {
        self.procedures
            .iter()
            .any(|pp| !pp.pending_changes().is_empty())
    }
}

/// A procedure scheduled on a plan, and the set of users assigned to it.
///
/// Membership is keyed by user id, so a user can appear at most once. The ids present
/// when the row was loaded are remembered so the store can write only the difference.
#[derive(Debug, Clone)]
pub struct PlanProcedure {
    pub plan_id: i64,
    pub procedure_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    users: BTreeMap<i64, User>,
    loaded: BTreeSet<i64>,
}

impl PlanProcedure {
    pub fn new(
        plan_id: i64,
        procedure_id: i64,
        users: impl IntoIterator<Item = User>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let users: BTreeMap<i64, User> = users.into_iter().map(|u| (u.user_id, u)).collect();
        let loaded = users.keys().copied().collect();
        Self {
            plan_id,
            procedure_id,
            created_at,
            updated_at,
            users,
            loaded,
        }
    }

    /// Member ids in ascending order.
    pub fn user_ids(&self) -> Vec<i64> {
        self.users.keys().copied().collect()
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Add a member. Returns false if the user was already assigned.
    pub fn add_user(&mut self, user: User) -> bool {
        if self.users.contains_key(&user.user_id) {
            return false;
        }
        self.users.insert(user.user_id, user);
        true
    }

    /// Remove a member. Returns false if the user was not assigned.
    pub fn remove_user(&mut self, user_id: i64) -> bool {
        self.users.remove(&user_id).is_some()
    }

    /// Remove every member, returning how many were removed.
    pub fn clear_users(&mut self) -> usize {
        let removed = self.users.len();
        self.users.clear();
        removed
    }

    /// Difference between the loaded membership and the current one.
    pub fn pending_changes(&self) -> MembershipChanges {
        MembershipChanges {
            added: self
                .users
                .keys()
                .filter(|id| !self.loaded.contains(id))
                .copied()
                .collect(),
            removed: self
                .loaded
                .iter()
                .filter(|id| !self.users.contains_key(id))
                .copied()
                .collect(),
        }
    }
}

/// Membership ids to insert and delete for one [`PlanProcedure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChanges {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
}

impl MembershipChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
