// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::filter::{GoalCriteria, ReminderCriteria};
use crate::forms::{ContributionFormInput, GoalFormInput, InviteFormInput, ReminderFormInput};
use crate::search::SearchHit;
use crate::{
    Activity, Goal, GoalId, Member, MemberId, Reminder, ReminderId, Transaction,
};

/// Fetch and mutation surface shared by the local store and the REST client.
pub trait DataSource {
    fn list_goals(&self, criteria: &GoalCriteria) -> Result<Vec<Goal>>;
    fn get_goal(&self, goal_id: GoalId) -> Result<Goal>;
    fn list_reminders(&self, criteria: &ReminderCriteria) -> Result<Vec<Reminder>>;
    fn list_transactions(&self, goal_id: Option<GoalId>) -> Result<Vec<Transaction>>;
    fn list_activities(&self, limit: usize) -> Result<Vec<Activity>>;
    fn list_members(&self) -> Result<Vec<Member>>;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    fn create_goal(&self, input: &GoalFormInput, author: Option<MemberId>) -> Result<Goal>;
    fn update_goal(&self, goal_id: GoalId, input: &GoalFormInput) -> Result<Goal>;
    fn delete_goal(&self, goal_id: GoalId) -> Result<()>;
    /// Returns the goal with its balance after the transaction.
    fn record_transaction(&self, input: &ContributionFormInput) -> Result<Goal>;
    fn create_reminder(&self, input: &ReminderFormInput) -> Result<Reminder>;
    /// One-off reminders become dismissed; recurring ones move to their next
    /// occurrence.
    fn dismiss_reminder(&self, reminder_id: ReminderId) -> Result<Reminder>;
    fn invite_member(&self, input: &InviteFormInput) -> Result<Member>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub version: u64,
    pub payload: String,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftConflict {
    pub key: String,
    pub expected_version: u64,
    pub actual_version: u64,
}

impl std::fmt::Display for DraftConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "draft {} was changed elsewhere (expected version {}, found {})",
            self.key, self.expected_version, self.actual_version
        )
    }
}

impl std::error::Error for DraftConflict {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { version: u64 },
    Conflict(DraftConflict),
}

/// Versioned key/value storage for in-progress forms. Version 0 means "no
/// draft"; a save only lands when `expected_version` matches the stored one.
/// Removing a draft keeps its version, so a fresh save continues the count
/// and a writer holding a pre-removal version always conflicts.
pub trait DraftStore {
    fn load_draft(&self, key: &str) -> Result<Option<Draft>>;
    fn save_draft(
        &self,
        key: &str,
        expected_version: u64,
        payload: &str,
        now: OffsetDateTime,
    ) -> Result<SaveOutcome>;
    fn remove_draft(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: RefCell<BTreeMap<String, Draft>>,
    removed: RefCell<BTreeMap<String, u64>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.drafts.borrow().keys().cloned().collect()
    }
}

impl DraftStore for MemoryDraftStore {
    fn load_draft(&self, key: &str) -> Result<Option<Draft>> {
        Ok(self.drafts.borrow().get(key).cloned())
    }

    fn save_draft(
        &self,
        key: &str,
        expected_version: u64,
        payload: &str,
        now: OffsetDateTime,
    ) -> Result<SaveOutcome> {
        let mut drafts = self.drafts.borrow_mut();
        let actual_version = drafts.get(key).map_or(0, |draft| draft.version);
        if actual_version != expected_version {
            return Ok(SaveOutcome::Conflict(DraftConflict {
                key: key.to_owned(),
                expected_version,
                actual_version,
            }));
        }
        let base = if expected_version == 0 {
            self.removed.borrow_mut().remove(key).unwrap_or(0)
        } else {
            expected_version
        };
        let version = base + 1;
        drafts.insert(
            key.to_owned(),
            Draft {
                version,
                payload: payload.to_owned(),
                saved_at: now,
            },
        );
        Ok(SaveOutcome::Saved { version })
    }

    fn remove_draft(&self, key: &str) -> Result<()> {
        if let Some(draft) = self.drafts.borrow_mut().remove(key) {
            self.removed.borrow_mut().insert(key.to_owned(), draft.version);
        }
        Ok(())
    }
}
