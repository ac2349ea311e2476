// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::validation::{
    MAX_TITLE_LEN, ValidationError, format_cents, format_date, parse_optional_date,
    parse_required_cents, validate_email,
};
use crate::{
    BroadcastAudience, FormKind, Goal, GoalCategory, GoalId, GoalKind, GoalStatus, MemberId,
    MemberRole, ReminderFrequency, TransactionKind,
};

/// Raw wizard field values as typed. This is what drafts persist, so a
/// half-entered amount or date survives a reload exactly as the user left it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalDraft {
    pub title: String,
    pub description: String,
    pub kind: GoalKind,
    pub category: GoalCategory,
    pub status: GoalStatus,
    pub target: String,
    pub deadline: String,
    pub shared: bool,
    pub invites: Vec<InviteDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteDraft {
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

impl Default for GoalDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            kind: GoalKind::Savings,
            category: GoalCategory::Other,
            status: GoalStatus::Active,
            target: String::new(),
            deadline: String::new(),
            shared: true,
            invites: Vec::new(),
        }
    }
}

impl GoalDraft {
    pub fn from_goal(goal: &Goal) -> Self {
        Self {
            title: goal.title.clone(),
            description: goal.description.clone(),
            kind: goal.kind,
            category: goal.category,
            status: goal.status,
            target: format_cents(goal.target_cents),
            deadline: format_date(goal.deadline),
            shared: goal.shared,
            invites: Vec::new(),
        }
    }

    pub fn check_basics(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            bail!("goal title is required -- enter a title and retry");
        }
        if title.chars().count() > MAX_TITLE_LEN {
            bail!("goal title must be at most {MAX_TITLE_LEN} characters");
        }
        Ok(())
    }

    pub fn check_target(&self) -> Result<(i64, Option<Date>)> {
        let target_cents = parse_required_cents(&self.target).map_err(|error| match error {
            ValidationError::NegativeMoney => anyhow!("goal target cannot be negative"),
            _ => anyhow!("goal target must be an amount like 1500 or 1,500.00"),
        })?;
        if target_cents <= 0 {
            bail!("goal target must be positive -- enter an amount above zero");
        }
        let deadline = parse_optional_date(&self.deadline)
            .map_err(|_| anyhow!("goal deadline must look like 2026-12-31"))?;
        Ok((target_cents, deadline))
    }

    pub fn check_members(&self) -> Result<Vec<InviteFormInput>> {
        let mut invites = Vec::with_capacity(self.invites.len());
        for invite in &self.invites {
            let parsed = InviteFormInput {
                name: invite.name.trim().to_owned(),
                email: validate_email(&invite.email).map_err(|_| {
                    anyhow!("invite email {:?} is not a valid address", invite.email.trim())
                })?,
                role: invite.role,
            };
            parsed.validate()?;
            if invites
                .iter()
                .any(|existing: &InviteFormInput| existing.email == parsed.email)
            {
                bail!("{} is invited twice -- remove the duplicate", parsed.email);
            }
            invites.push(parsed);
        }
        Ok(invites)
    }

    /// Full conversion into a validated mutation payload.
    pub fn to_input(&self) -> Result<GoalFormInput> {
        self.check_basics()?;
        let (target_cents, deadline) = self.check_target()?;
        let invites = self.check_members()?;
        let input = GoalFormInput {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            kind: self.kind,
            category: self.category,
            status: self.status,
            target_cents,
            deadline,
            shared: self.shared,
            invites,
        };
        input.validate()?;
        Ok(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalFormInput {
    pub title: String,
    pub description: String,
    pub kind: GoalKind,
    pub category: GoalCategory,
    pub status: GoalStatus,
    pub target_cents: i64,
    #[serde(default, with = "crate::model::iso_date::option")]
    pub deadline: Option<Date>,
    pub shared: bool,
    #[serde(default)]
    pub invites: Vec<InviteFormInput>,
}

impl GoalFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("goal title is required -- enter a title and retry");
        }
        if self.target_cents <= 0 {
            bail!("goal target must be positive -- enter an amount above zero");
        }
        for invite in &self.invites {
            invite.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionFormInput {
    pub goal_id: GoalId,
    pub member_id: Option<MemberId>,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub note: String,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl ContributionFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.goal_id.get() <= 0 {
            bail!("contribution goal is required -- choose a goal and retry");
        }
        if self.amount_cents <= 0 {
            bail!("{} amount must be positive", self.kind);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderFormInput {
    pub goal_id: Option<GoalId>,
    pub title: String,
    pub frequency: ReminderFrequency,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_for: OffsetDateTime,
}

impl ReminderFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("reminder title is required -- enter a title and retry");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteFormInput {
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

impl InviteFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            bail!("invite email is required -- enter an email and retry");
        }
        if self.role == MemberRole::Owner {
            bail!("a family has exactly one owner -- invite as admin instead");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastFormInput {
    pub title: String,
    pub body: String,
    pub audience: BroadcastAudience,
}

impl BroadcastFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("broadcast title is required -- enter a title and retry");
        }
        if self.body.trim().is_empty() {
            bail!("broadcast body is empty -- write a message and retry");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Contribution(ContributionFormInput),
    Reminder(ReminderFormInput),
    Invite(InviteFormInput),
    Broadcast(BroadcastFormInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Contribution(_) => FormKind::Contribution,
            Self::Reminder(_) => FormKind::Reminder,
            Self::Invite(_) => FormKind::Invite,
            Self::Broadcast(_) => FormKind::Broadcast,
        }
    }

    /// Blank single-step payload; goal forms go through the wizard instead.
    pub fn blank_for(kind: FormKind, now: OffsetDateTime) -> Option<Self> {
        match kind {
            FormKind::Contribution => Some(Self::Contribution(ContributionFormInput {
                goal_id: GoalId::new(0),
                member_id: None,
                kind: TransactionKind::Contribution,
                amount_cents: 0,
                note: String::new(),
                occurred_at: now,
            })),
            FormKind::Reminder => Some(Self::Reminder(ReminderFormInput {
                goal_id: None,
                title: String::new(),
                frequency: ReminderFrequency::Once,
                scheduled_for: now,
            })),
            FormKind::Invite => Some(Self::Invite(InviteFormInput {
                name: String::new(),
                email: String::new(),
                role: MemberRole::Contributor,
            })),
            FormKind::Broadcast => Some(Self::Broadcast(BroadcastFormInput {
                title: String::new(),
                body: String::new(),
                audience: BroadcastAudience::All,
            })),
            FormKind::GoalWizard | FormKind::GoalEdit(_) => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Contribution(input) => input.validate(),
            Self::Reminder(input) => input.validate(),
            Self::Invite(input) => input.validate(),
            Self::Broadcast(input) => input.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FormPayload, GoalDraft, InviteDraft, InviteFormInput};
    use crate::{FormKind, GoalId, MemberRole};
    use time::OffsetDateTime;
    use time::macros::date;

    fn filled() -> GoalDraft {
        GoalDraft {
            title: "  Summer vacation ".to_owned(),
            target: "$3,000".to_owned(),
            deadline: "2026-07-01".to_owned(),
            ..GoalDraft::default()
        }
    }

    #[test]
    fn draft_converts_into_trimmed_typed_input() -> anyhow::Result<()> {
        let input = filled().to_input()?;
        assert_eq!(input.title, "Summer vacation");
        assert_eq!(input.target_cents, 300_000);
        assert_eq!(input.deadline, Some(date!(2026 - 07 - 01)));
        Ok(())
    }

    #[test]
    fn target_must_be_positive_money() {
        let mut draft = filled();
        for (raw, message) in [
            ("", "must be an amount"),
            ("abc", "must be an amount"),
            ("-5", "cannot be negative"),
            ("0", "must be positive"),
        ] {
            draft.target = raw.to_owned();
            let error = draft.check_target().expect_err("bad target");
            assert!(error.to_string().contains(message), "{raw}: {error}");
        }
    }

    #[test]
    fn title_is_required_and_bounded() {
        let mut draft = filled();
        draft.title = "   ".to_owned();
        assert!(draft.check_basics().is_err());
        draft.title = "x".repeat(81);
        assert!(draft.check_basics().is_err());
    }

    #[test]
    fn invites_need_valid_unique_emails() {
        let mut draft = filled();
        draft.invites = vec![
            InviteDraft {
                name: "Sam".to_owned(),
                email: "sam@example.com".to_owned(),
                role: MemberRole::Contributor,
            },
            InviteDraft {
                name: "Sam again".to_owned(),
                email: "SAM@example.com".to_owned(),
                role: MemberRole::Viewer,
            },
        ];
        let error = draft.check_members().expect_err("duplicate invite");
        assert!(error.to_string().contains("invited twice"));

        draft.invites[1].email = "not-an-email".to_owned();
        let error = draft.check_members().expect_err("bad email");
        assert!(error.to_string().contains("not a valid address"));
    }

    #[test]
    fn owner_role_cannot_be_invited() {
        let invite = InviteFormInput {
            name: String::new(),
            email: "a@example.com".to_owned(),
            role: MemberRole::Owner,
        };
        assert!(invite.validate().is_err());
    }

    #[test]
    fn blank_payloads_exist_for_single_step_forms_only() {
        let now = OffsetDateTime::UNIX_EPOCH;
        assert!(FormPayload::blank_for(FormKind::Invite, now).is_some());
        assert!(FormPayload::blank_for(FormKind::GoalWizard, now).is_none());
        assert!(FormPayload::blank_for(FormKind::GoalEdit(GoalId::new(1)), now).is_none());

        let blank = FormPayload::blank_for(FormKind::Contribution, now).expect("blank form");
        assert_eq!(blank.kind(), FormKind::Contribution);
        let error = blank.validate().expect_err("blank contribution is incomplete");
        assert!(error.to_string().contains("choose a goal"));
    }

    #[test]
    fn draft_json_tolerates_missing_fields() -> anyhow::Result<()> {
        let draft: GoalDraft = serde_json::from_str(r#"{"title":"Bike"}"#)?;
        assert_eq!(draft.title, "Bike");
        assert_eq!(draft.target, "");
        Ok(())
    }
}
