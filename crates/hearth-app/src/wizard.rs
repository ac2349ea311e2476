// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Multi-step goal form. Steps advance only when the current step's required
//! fields check out, and every edit re-arms a debounced draft save.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::forms::{GoalDraft, GoalFormInput};
use crate::source::{DraftConflict, DraftStore, SaveOutcome};
use crate::{Goal, GoalId};

pub const NEW_GOAL_DRAFT_KEY: &str = "goal-wizard";
pub const DEFAULT_AUTOSAVE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    Basics,
    Target,
    Members,
    Review,
    Submitted,
}

impl WizardStep {
    pub const EDITABLE: [Self; 4] = [Self::Basics, Self::Target, Self::Members, Self::Review];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Basics => "basics",
            Self::Target => "target",
            Self::Members => "members",
            Self::Review => "review",
            Self::Submitted => "done",
        }
    }

    const fn next(self) -> Option<Self> {
        match self {
            Self::Basics => Some(Self::Target),
            Self::Target => Some(Self::Members),
            Self::Members => Some(Self::Review),
            Self::Review | Self::Submitted => None,
        }
    }

    const fn previous(self) -> Option<Self> {
        match self {
            Self::Target => Some(Self::Basics),
            Self::Members => Some(Self::Target),
            Self::Review => Some(Self::Members),
            Self::Basics | Self::Submitted => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardMode {
    Create,
    Edit(GoalId),
}

impl WizardMode {
    pub fn draft_key(self) -> String {
        match self {
            Self::Create => NEW_GOAL_DRAFT_KEY.to_owned(),
            Self::Edit(goal_id) => format!("goal-edit:{}", goal_id.get()),
        }
    }
}

#[derive(Debug)]
pub struct GoalWizard {
    mode: WizardMode,
    step: WizardStep,
    draft: GoalDraft,
    draft_key: String,
    draft_version: u64,
    autosave: Debouncer<()>,
    conflict: Option<DraftConflict>,
    error: Option<String>,
    notice: Option<String>,
}

impl GoalWizard {
    /// Start a new-goal wizard, restoring any saved draft.
    pub fn open(store: &dyn DraftStore, autosave: Duration) -> Result<Self> {
        Self::open_with(WizardMode::Create, GoalDraft::default(), store, autosave)
    }

    /// Start an edit wizard prefilled from `goal`; a saved edit draft wins.
    pub fn open_edit(goal: &Goal, store: &dyn DraftStore, autosave: Duration) -> Result<Self> {
        Self::open_with(
            WizardMode::Edit(goal.id),
            GoalDraft::from_goal(goal),
            store,
            autosave,
        )
    }

    fn open_with(
        mode: WizardMode,
        initial: GoalDraft,
        store: &dyn DraftStore,
        autosave: Duration,
    ) -> Result<Self> {
        let draft_key = mode.draft_key();
        let mut wizard = Self {
            mode,
            step: WizardStep::Basics,
            draft: initial,
            draft_key,
            draft_version: 0,
            autosave: Debouncer::new(autosave),
            conflict: None,
            error: None,
            notice: None,
        };
        wizard.restore(store)?;
        Ok(wizard)
    }

    fn restore(&mut self, store: &dyn DraftStore) -> Result<()> {
        let Some(saved) = store
            .load_draft(&self.draft_key)
            .with_context(|| format!("load draft {}", self.draft_key))?
        else {
            return Ok(());
        };
        self.draft_version = saved.version;
        match serde_json::from_str::<GoalDraft>(&saved.payload) {
            Ok(draft) => {
                debug!(key = %self.draft_key, version = saved.version, "restored draft");
                self.draft = draft;
            }
            Err(error) => {
                warn!(key = %self.draft_key, error = %error, "ignoring unreadable draft");
            }
        }
        Ok(())
    }

    pub const fn mode(&self) -> WizardMode {
        self.mode
    }

    pub const fn step(&self) -> WizardStep {
        self.step
    }

    pub const fn draft(&self) -> &GoalDraft {
        &self.draft
    }

    pub fn draft_key(&self) -> &str {
        &self.draft_key
    }

    pub const fn draft_version(&self) -> u64 {
        self.draft_version
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub const fn conflict(&self) -> Option<&DraftConflict> {
        self.conflict.as_ref()
    }

    pub const fn has_unsaved_changes(&self) -> bool {
        self.autosave.is_pending()
    }

    fn check_step(&self) -> Result<()> {
        match self.step {
            WizardStep::Basics => self.draft.check_basics(),
            WizardStep::Target => self.draft.check_target().map(|_| ()),
            WizardStep::Members => self.draft.check_members().map(|_| ()),
            WizardStep::Review => self.draft.to_input().map(|_| ()),
            WizardStep::Submitted => anyhow::bail!("goal already submitted"),
        }
    }

    pub fn can_advance(&self) -> bool {
        self.step.next().is_some() && self.check_step().is_ok()
    }

    /// Why the current step cannot advance, for inline hints.
    pub fn step_problem(&self) -> Option<String> {
        self.check_step().err().map(|error| error.to_string())
    }

    pub fn next(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        true
    }

    pub fn previous(&mut self) -> bool {
        let Some(previous) = self.step.previous() else {
            return false;
        };
        self.step = previous;
        true
    }

    /// Apply a field change and re-arm the autosave window.
    pub fn edit(&mut self, now: Instant, change: impl FnOnce(&mut GoalDraft)) {
        if self.step == WizardStep::Submitted {
            return;
        }
        let before = self.draft.clone();
        change(&mut self.draft);
        if self.draft != before {
            self.autosave.push((), now);
        }
    }

    /// Persist the draft once the autosave window has elapsed.
    pub fn tick(&mut self, store: &dyn DraftStore, now: Instant) -> Result<Option<SaveOutcome>> {
        if self.autosave.poll(now).is_none() {
            return Ok(None);
        }
        self.save(store).map(Some)
    }

    /// Persist immediately, for example before closing the form.
    pub fn flush(&mut self, store: &dyn DraftStore) -> Result<Option<SaveOutcome>> {
        if self.autosave.flush().is_none() {
            return Ok(None);
        }
        self.save(store).map(Some)
    }

    fn save(&mut self, store: &dyn DraftStore) -> Result<SaveOutcome> {
        if let Some(conflict) = &self.conflict {
            return Ok(SaveOutcome::Conflict(conflict.clone()));
        }
        let payload = serde_json::to_string(&self.draft).context("serialize goal draft")?;
        let outcome = store
            .save_draft(
                &self.draft_key,
                self.draft_version,
                &payload,
                OffsetDateTime::now_utc(),
            )
            .with_context(|| format!("save draft {}", self.draft_key))?;
        match &outcome {
            SaveOutcome::Saved { version } => {
                debug!(key = %self.draft_key, version, "saved draft");
                self.draft_version = *version;
            }
            SaveOutcome::Conflict(conflict) => {
                warn!(key = %self.draft_key, %conflict, "draft save lost a race");
                self.conflict = Some(conflict.clone());
            }
        }
        Ok(outcome)
    }

    /// Resolve a conflict by adopting the stored draft.
    pub fn take_stored_draft(&mut self, store: &dyn DraftStore) -> Result<()> {
        self.conflict = None;
        self.autosave.cancel();
        self.draft_version = 0;
        self.restore(store)
    }

    /// Resolve a conflict by writing this form's values over the stored draft.
    pub fn keep_local_draft(&mut self, store: &dyn DraftStore) -> Result<SaveOutcome> {
        if let Some(conflict) = self.conflict.take() {
            self.draft_version = conflict.actual_version;
        }
        self.autosave.cancel();
        self.save(store)
    }

    /// Validate fully, run `mutate`, and clear the draft on success. Failures
    /// leave the wizard on Review with the message inline and fields intact.
    pub fn submit<F>(&mut self, store: &dyn DraftStore, mutate: F) -> Option<Goal>
    where
        F: FnOnce(WizardMode, &GoalFormInput) -> Result<Goal>,
    {
        if self.step != WizardStep::Review {
            return None;
        }
        let result = self
            .draft
            .to_input()
            .and_then(|input| mutate(self.mode, &input));
        let goal = match result {
            Ok(goal) => goal,
            Err(error) => {
                self.error = Some(format!("{error:#}"));
                return None;
            }
        };

        self.autosave.cancel();
        if let Err(error) = store.remove_draft(&self.draft_key) {
            warn!(key = %self.draft_key, error = %error, "could not clear submitted draft");
        }
        self.draft_version = 0;
        self.error = None;
        self.notice = Some(match self.mode {
            WizardMode::Create => format!("created goal \"{}\"", goal.title),
            WizardMode::Edit(_) => format!("saved changes to \"{}\"", goal.title),
        });
        self.step = WizardStep::Submitted;
        Some(goal)
    }

    /// Teardown: pending autosaves are dropped.
    pub fn close(&mut self) {
        self.autosave.cancel();
    }
}
