//! Sticky user-to-variant assignment.
//!
//! The coordinator keys assignments by (user, campaign). With stickiness on,
//! the first allocation for a pair is stored under that pair's entry lock and
//! every later request replays it, so concurrent first requests agree on a
//! single winner. Unknown users are registered on first contact; an explicit
//! re-registration wipes the user's assignments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use splitflow_core::SplitflowResult;
use tracing::{debug, info};

use crate::store::VariantStore;
use crate::strategy::{select_variant, Strategy};

pub struct AssignmentCoordinator {
    assignments: DashMap<(String, String), String>,
    users: DashMap<String, DateTime<Utc>>,
}

impl AssignmentCoordinator {
    pub fn new() -> Self {
        Self {
            assignments: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Returns the variant for `user_id` in `campaign`, allocating one if
    /// needed.
    ///
    /// The campaign is resolved before any state changes, so an unknown
    /// campaign leaves both the user registry and the assignment map
    /// untouched. With `sticky` off the allocation runs every time and
    /// overwrites the stored pair.
    pub fn get_or_assign<R: Rng + ?Sized>(
        &self,
        store: &VariantStore,
        campaign: &str,
        user_id: &str,
        strategy: Strategy,
        epsilon: f64,
        sticky: bool,
        rng: &mut R,
    ) -> SplitflowResult<String> {
        let snapshot = store.snapshot(campaign)?;

        self.users
            .entry(user_id.to_string())
            .or_insert_with(Utc::now);

        let key = (user_id.to_string(), campaign.to_string());
        if !sticky {
            let code = select_variant(strategy, &snapshot, epsilon, rng)?;
            self.assignments.insert(key, code.clone());
            debug!(
                user = user_id,
                campaign,
                variant = %code,
                "Allocated variant (non-sticky)"
            );
            return Ok(code);
        }

        match self.assignments.entry(key) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let code = select_variant(strategy, &snapshot, epsilon, rng)?;
                slot.insert(code.clone());
                debug!(
                    user = user_id,
                    campaign,
                    variant = %code,
                    "Assigned sticky variant"
                );
                Ok(code)
            }
        }
    }

    /// Registers a user, returning `true` when the id was not seen before.
    /// Re-registering an existing id resets their assignments, mirroring a
    /// fresh session.
    pub fn register_user(&self, user_id: &str) -> bool {
        let existed = self
            .users
            .insert(user_id.to_string(), Utc::now())
            .is_some();
        if existed {
            self.assignments.retain(|key, _| key.0 != user_id);
        }
        info!(user = user_id, existed, "User registered");
        !existed
    }

    pub fn user_exists(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// Current campaign-to-variant map for one user.
    pub fn assignments_for(&self, user_id: &str) -> BTreeMap<String, String> {
        self.assignments
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

impl Default for AssignmentCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
