// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use hearth_app::wizard::WizardMode;
use hearth_app::{
    Activity, DataSource, DraftStore, FormPayload, Goal, GoalCriteria, GoalFormInput, GoalId,
    Member, MemberId, MemberRole, MemberStatus, Reminder, ReminderCriteria, ReminderId,
    SearchHit, Transaction,
};
use hearth_db::Store;
use hearth_tui::{AdminSnapshot, AppRuntime};
use tracing::{debug, info};

/// The family member driving this session and what they may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub member: Option<Member>,
    pub role: MemberRole,
    pub is_admin: bool,
}

impl Identity {
    pub fn member_id(&self) -> Option<MemberId> {
        self.member.as_ref().map(|member| member.id)
    }

    pub fn describe(&self) -> String {
        match &self.member {
            Some(member) => format!("{} <{}> ({})", member.name, member.email, member.role),
            None => format!("no family yet ({})", self.role),
        }
    }
}

/// Match `[profile] email` against the family, falling back to the owner.
/// `admin_store` is the local database when there is one; remote sessions
/// never get site admin tools.
pub fn resolve_identity(
    source: &dyn DataSource,
    email: Option<&str>,
    admin_store: Option<&Store>,
) -> Result<Identity> {
    let members = source.list_members()?;
    let active = members
        .iter()
        .filter(|member| member.status != MemberStatus::Removed);

    let member = match email {
        Some(email) => {
            let wanted = email.trim().to_lowercase();
            let found = active
                .clone()
                .find(|member| member.email.to_lowercase() == wanted)
                .cloned();
            if found.is_none() {
                bail!(
                    "profile.email {email:?} is not a family member -- invite them first or fix [profile] email"
                );
            }
            found
        }
        None => active
            .clone()
            .find(|member| member.role == MemberRole::Owner)
            .cloned(),
    };

    let role = match &member {
        Some(member) => member.role,
        None if members.is_empty() => MemberRole::Owner,
        None => bail!("this family has no owner -- set [profile] email to pick a member"),
    };

    let is_admin = match admin_store {
        Some(store) => {
            let users = store.list_users()?;
            users.is_empty()
                || member.as_ref().is_some_and(|member| {
                    users.iter().any(|user| {
                        user.is_admin && user.active && user.email.eq_ignore_ascii_case(&member.email)
                    })
                })
        }
        None => false,
    };

    let identity = Identity {
        member,
        role,
        is_admin,
    };
    info!(who = %identity.describe(), is_admin, "resolved identity");
    Ok(identity)
}

/// Binds a data source, the local draft table, and the session identity
/// into what the terminal UI expects.
pub struct Runtime<'a, S: DataSource> {
    source: &'a S,
    drafts: &'a Store,
    admin: Option<&'a Store>,
    identity: Identity,
}

impl<'a> Runtime<'a, Store> {
    pub fn local(store: &'a Store, identity: Identity) -> Self {
        Self {
            source: store,
            drafts: store,
            admin: Some(store),
            identity,
        }
    }
}

impl<'a> Runtime<'a, hearth_api::Client> {
    pub fn remote(client: &'a hearth_api::Client, drafts: &'a Store, identity: Identity) -> Self {
        Self {
            source: client,
            drafts,
            admin: None,
            identity,
        }
    }
}

impl<S: DataSource> Runtime<'_, S> {
    fn admin_store(&self) -> Result<&Store> {
        if !self.identity.is_admin {
            bail!("admin tools are limited to site admins");
        }
        self.admin
            .ok_or_else(|| anyhow!("admin tools need a local database -- remove [api] base_url"))
    }
}

impl<S: DataSource> AppRuntime for Runtime<'_, S> {
    fn load_goals(&self, criteria: &GoalCriteria) -> Result<Vec<Goal>> {
        self.source.list_goals(criteria)
    }

    fn load_goal(&self, goal_id: GoalId) -> Result<Goal> {
        self.source.get_goal(goal_id)
    }

    fn load_transactions(&self, goal_id: GoalId) -> Result<Vec<Transaction>> {
        self.source.list_transactions(Some(goal_id))
    }

    fn load_reminders(&self, criteria: &ReminderCriteria) -> Result<Vec<Reminder>> {
        self.source.list_reminders(criteria)
    }

    fn load_activities(&self, limit: usize) -> Result<Vec<Activity>> {
        self.source.list_activities(limit)
    }

    fn load_members(&self) -> Result<Vec<Member>> {
        self.source.list_members()
    }

    fn load_admin(&self) -> Result<AdminSnapshot> {
        let store = self.admin_store()?;
        Ok(AdminSnapshot {
            users: store.list_users()?,
            broadcasts: store.list_broadcasts()?,
        })
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.source.search(query, limit)
    }

    fn save_goal(&self, mode: WizardMode, input: &GoalFormInput) -> Result<Goal> {
        match mode {
            WizardMode::Create => self.source.create_goal(input, self.identity.member_id()),
            WizardMode::Edit(goal_id) => self.source.update_goal(goal_id, input),
        }
    }

    fn delete_goal(&self, goal_id: GoalId) -> Result<()> {
        self.source.delete_goal(goal_id)
    }

    fn submit_form(&self, payload: &FormPayload) -> Result<()> {
        payload.validate()?;
        match payload {
            FormPayload::Contribution(input) => {
                let mut input = input.clone();
                if input.member_id.is_none() {
                    input.member_id = self.identity.member_id();
                }
                let goal = self.source.record_transaction(&input)?;
                debug!(goal = goal.id.get(), balance = goal.current_cents, "recorded transaction");
            }
            FormPayload::Reminder(input) => {
                self.source.create_reminder(input)?;
            }
            FormPayload::Invite(input) => {
                if !self.identity.role.assignable_roles().contains(&input.role) {
                    bail!(
                        "{} members cannot invite a {} -- pick another role",
                        self.identity.role,
                        input.role
                    );
                }
                self.source.invite_member(input)?;
            }
            FormPayload::Broadcast(input) => {
                self.admin_store()?.create_broadcast(input)?;
            }
        }
        Ok(())
    }

    fn dismiss_reminder(&self, reminder_id: ReminderId) -> Result<Reminder> {
        self.source.dismiss_reminder(reminder_id)
    }

    fn draft_store(&self) -> &dyn DraftStore {
        self.drafts
    }

    fn error_status(&self, error: &anyhow::Error) -> Option<u16> {
        hearth_api::error_status(error)
    }
}
