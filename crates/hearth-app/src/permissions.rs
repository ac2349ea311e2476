// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::MemberRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    ViewGoal,
    Contribute,
    EditGoal,
    ManageReminders,
    InviteMembers,
    DeleteGoal,
    ManageRoles,
}

impl Permission {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ViewGoal => "view goals",
            Self::Contribute => "contribute",
            Self::EditGoal => "edit goals",
            Self::ManageReminders => "manage reminders",
            Self::InviteMembers => "invite members",
            Self::DeleteGoal => "delete goals",
            Self::ManageRoles => "manage roles",
        }
    }
}

impl MemberRole {
    pub const fn allows(self, permission: Permission) -> bool {
        match self {
            Self::Owner => true,
            Self::Admin => !matches!(permission, Permission::ManageRoles | Permission::DeleteGoal),
            Self::Contributor => matches!(
                permission,
                Permission::ViewGoal | Permission::Contribute | Permission::ManageReminders
            ),
            Self::Viewer => matches!(permission, Permission::ViewGoal),
        }
    }

    pub fn require(self, permission: Permission) -> Result<()> {
        if !self.allows(permission) {
            bail!(
                "{} members cannot {} -- ask a family owner to change your role",
                self.as_str(),
                permission.label()
            );
        }
        Ok(())
    }

    /// Roles this role may hand out when inviting.
    pub fn assignable_roles(self) -> &'static [MemberRole] {
        match self {
            Self::Owner => &[Self::Admin, Self::Contributor, Self::Viewer],
            Self::Admin => &[Self::Contributor, Self::Viewer],
            Self::Contributor | Self::Viewer => &[],
        }
    }
}
