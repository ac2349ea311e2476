// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

time::serde::format_description!(pub(crate) iso_date, Date, "[year]-[month]-[day]");

macro_rules! labeled_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

labeled_enum!(GoalStatus {
    Active => "active",
    Paused => "paused",
    Completed => "completed",
    Cancelled => "cancelled",
});

labeled_enum!(GoalKind {
    Savings => "savings",
    Activity => "activity",
});

labeled_enum!(GoalCategory {
    Vacation => "vacation",
    Education => "education",
    Home => "home",
    Emergency => "emergency",
    Vehicle => "vehicle",
    Fitness => "fitness",
    Celebration => "celebration",
    Other => "other",
});

labeled_enum!(MemberRole {
    Owner => "owner",
    Admin => "admin",
    Contributor => "contributor",
    Viewer => "viewer",
});

labeled_enum!(MemberStatus {
    Invited => "invited",
    Active => "active",
    Removed => "removed",
});

labeled_enum!(TransactionKind {
    Contribution => "contribution",
    Withdrawal => "withdrawal",
});

labeled_enum!(ReminderFrequency {
    Once => "once",
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

labeled_enum!(ReminderStatus {
    Scheduled => "scheduled",
    Sent => "sent",
    Dismissed => "dismissed",
});

labeled_enum!(ActivityKind {
    GoalCreated => "goal_created",
    GoalUpdated => "goal_updated",
    GoalDeleted => "goal_deleted",
    Contribution => "contribution",
    Withdrawal => "withdrawal",
    MemberInvited => "member_invited",
    ReminderScheduled => "reminder_scheduled",
    ReminderDismissed => "reminder_dismissed",
});

labeled_enum!(BroadcastAudience {
    All => "all",
    Admins => "admins",
});

labeled_enum!(SortField {
    Created => "created",
    Updated => "updated",
    Progress => "progress",
    Target => "target",
});

labeled_enum!(SortDirection {
    Asc => "asc",
    Desc => "desc",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Dashboard,
    Goals,
    Reminders,
    Activity,
    Members,
    Admin,
}

impl TabKind {
    pub const ALL: [Self; 6] = [
        Self::Dashboard,
        Self::Goals,
        Self::Reminders,
        Self::Activity,
        Self::Members,
        Self::Admin,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Goals => "goals",
            Self::Reminders => "reminders",
            Self::Activity => "activity",
            Self::Members => "family",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    GoalWizard,
    GoalEdit(GoalId),
    Contribution,
    Reminder,
    Invite,
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Search,
    Form(FormKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    pub description: String,
    pub kind: GoalKind,
    pub category: GoalCategory,
    pub status: GoalStatus,
    pub target_cents: i64,
    pub current_cents: i64,
    #[serde(default, with = "iso_date::option")]
    pub deadline: Option<Date>,
    pub created_by: Option<MemberId>,
    pub shared: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

pub const MILESTONE_PERCENTS: [u8; 4] = [25, 50, 75, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub percent: u8,
    pub amount_cents: i64,
    pub reached: bool,
}

impl Goal {
    /// Percent of target reached. `None` when the target is not positive.
    pub fn progress_percent(&self) -> Option<f64> {
        if self.target_cents <= 0 {
            return None;
        }
        Some(self.current_cents as f64 / self.target_cents as f64 * 100.0)
    }

    pub fn remaining_cents(&self) -> i64 {
        (self.target_cents - self.current_cents).max(0)
    }

    pub fn milestones(&self) -> Vec<Milestone> {
        MILESTONE_PERCENTS
            .iter()
            .map(|&percent| {
                let amount_cents = self.target_cents.max(0) * i64::from(percent) / 100;
                Milestone {
                    percent,
                    amount_cents,
                    reached: self.target_cents > 0 && self.current_cents >= amount_cents,
                }
            })
            .collect()
    }

    pub fn is_overdue(&self, today: Date) -> bool {
        self.status == GoalStatus::Active && self.deadline.is_some_and(|deadline| deadline < today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub goal_id: GoalId,
    pub member_id: Option<MemberId>,
    pub member_name: String,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub note: String,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Effect on the goal balance: contributions add, withdrawals subtract.
    pub const fn signed_amount_cents(&self) -> i64 {
        match self.kind {
            TransactionKind::Contribution => self.amount_cents,
            TransactionKind::Withdrawal => -self.amount_cents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub goal_id: Option<GoalId>,
    pub title: String,
    pub frequency: ReminderFrequency,
    pub status: ReminderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_for: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Reminder {
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        self.status == ReminderStatus::Scheduled && self.scheduled_for < now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub goal_id: Option<GoalId>,
    pub member_id: Option<MemberId>,
    pub kind: ActivityKind,
    pub summary: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: BroadcastId,
    pub title: String,
    pub body: String,
    pub audience: BroadcastAudience,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
}
