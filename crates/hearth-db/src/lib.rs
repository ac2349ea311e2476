// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use hearth_app::filter::{Criteria, filter_items};
use hearth_app::validation::{format_cents, next_occurrence, validate_email};
use hearth_app::{
    Activity, ActivityId, ActivityKind, Broadcast, BroadcastAudience, BroadcastFormInput,
    BroadcastId, ContributionFormInput, DataSource, Draft, DraftConflict, DraftStore, Goal,
    GoalCategory, GoalCriteria, GoalFormInput, GoalId, GoalKind, GoalStatus, InviteFormInput,
    Member, MemberId, MemberRole, MemberStatus, Reminder, ReminderCriteria, ReminderFormInput,
    ReminderFrequency, ReminderId, ReminderStatus, SaveOutcome, SearchHit, Transaction,
    TransactionId, TransactionKind, User, UserId,
};
use hearth_testkit::FamilyFaker;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, warn};

pub const APP_NAME: &str = "hearth";
const DEMO_GOAL_COUNT: usize = 6;

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "members",
        &[
            "id",
            "name",
            "email",
            "role",
            "status",
            "joined_at",
            "updated_at",
        ],
    ),
    (
        "goals",
        &[
            "id",
            "title",
            "description",
            "kind",
            "category",
            "status",
            "target_cents",
            "current_cents",
            "deadline",
            "created_by",
            "shared",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    ),
    (
        "transactions",
        &[
            "id",
            "goal_id",
            "member_id",
            "kind",
            "amount_cents",
            "note",
            "occurred_at",
            "created_at",
        ],
    ),
    (
        "reminders",
        &[
            "id",
            "goal_id",
            "title",
            "frequency",
            "status",
            "scheduled_for",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "activities",
        &["id", "goal_id", "member_id", "kind", "summary", "created_at"],
    ),
    ("drafts", &["key", "version", "payload", "saved_at", "removed"]),
    (
        "users",
        &["id", "name", "email", "is_admin", "active", "created_at"],
    ),
    (
        "broadcasts",
        &["id", "title", "body", "audience", "created_at", "sent_at"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_goals_deleted_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_goals_deleted_at ON goals (deleted_at);",
    },
    RequiredIndex {
        name: "idx_transactions_goal_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_transactions_goal_id ON transactions (goal_id);",
    },
    RequiredIndex {
        name: "idx_reminders_scheduled_for",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_reminders_scheduled_for ON reminders (scheduled_for);",
    },
    RequiredIndex {
        name: "idx_activities_created_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_activities_created_at ON activities (created_at);",
    },
    RequiredIndex {
        name: "idx_members_email",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_members_email ON members (email);",
    },
];

const GOAL_COLUMNS: &str = "
  id, title, description, kind, category, status,
  target_cents, current_cents, deadline, created_by, shared,
  created_at, updated_at, deleted_at
";

const TRANSACTION_SELECT: &str = "
  SELECT
    t.id, t.goal_id, t.member_id, COALESCE(m.name, ''), t.kind,
    t.amount_cents, t.note, t.occurred_at, t.created_at
  FROM transactions t
  LEFT JOIN members m ON m.id = t.member_id
";

const REMINDER_COLUMNS: &str = "
  id, goal_id, title, frequency, status, scheduled_for, created_at, updated_at
";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)
    }

    pub fn get_reminder(&self, reminder_id: ReminderId) -> Result<Reminder> {
        self.conn
            .query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?"),
                params![reminder_id.get()],
                reminder_from_row,
            )
            .optional()
            .with_context(|| format!("load reminder {}", reminder_id.get()))?
            .ok_or_else(|| {
                anyhow!(
                    "reminder {} not found -- choose an existing reminder and retry",
                    reminder_id.get()
                )
            })
    }

    pub fn get_member(&self, member_id: MemberId) -> Result<Member> {
        self.conn
            .query_row(
                "
                SELECT id, name, email, role, status, joined_at
                FROM members
                WHERE id = ?
                ",
                params![member_id.get()],
                member_from_row,
            )
            .optional()
            .with_context(|| format!("load member {}", member_id.get()))?
            .ok_or_else(|| {
                anyhow!(
                    "member {} not found -- choose an existing family member and retry",
                    member_id.get()
                )
            })
    }

    pub fn set_member_role(&self, member_id: MemberId, role: MemberRole) -> Result<()> {
        if role == MemberRole::Owner {
            bail!("a family has exactly one owner -- choose admin, contributor, or viewer");
        }
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE members
                SET role = ?, updated_at = ?
                WHERE id = ? AND status != 'removed' AND role != 'owner'
                ",
                params![role.as_str(), now, member_id.get()],
            )
            .context("update member role")?;
        if rows_affected == 0 {
            bail!(
                "member {} not found, removed, or the owner -- choose another member and retry",
                member_id.get()
            );
        }
        Ok(())
    }

    /// Adds the founding owner of the family. Only one owner may exist.
    pub fn create_owner(&self, name: &str, email: &str) -> Result<Member> {
        let existing: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM members WHERE role = 'owner' AND status != 'removed'",
                [],
                |row| row.get(0),
            )
            .context("count family owners")?;
        if existing > 0 {
            bail!("family already has an owner -- invite this person as an admin instead");
        }
        let email = validate_email(email).with_context(|| format!("owner email {email:?}"))?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO members (name, email, role, status, joined_at, updated_at)
                VALUES (?, ?, 'owner', 'active', ?, ?)
                ",
                params![name.trim(), email, now, now],
            )
            .context("insert family owner")?;
        self.get_member(MemberId::new(self.conn.last_insert_rowid()))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        query_rows(
            &self.conn,
            "
            SELECT id, name, email, is_admin, active, created_at
            FROM users
            ORDER BY name ASC, id ASC
            ",
            [],
            user_from_row,
            "users",
        )
    }

    pub fn create_user(&self, name: &str, email: &str, is_admin: bool) -> Result<User> {
        if name.trim().is_empty() {
            bail!("user name is required -- enter a name and retry");
        }
        let email = validate_email(email).with_context(|| format!("user email {email:?}"))?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO users (name, email, is_admin, active, created_at)
                VALUES (?, ?, ?, 1, ?)
                ",
                params![name.trim(), email, is_admin, now],
            )
            .context("insert user")?;
        let user_id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "
                SELECT id, name, email, is_admin, active, created_at
                FROM users
                WHERE id = ?
                ",
                params![user_id],
                user_from_row,
            )
            .with_context(|| format!("load user {user_id}"))
    }

    pub fn set_user_active(&self, user_id: UserId, active: bool) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE users SET active = ? WHERE id = ?",
                params![active, user_id.get()],
            )
            .context("update user status")?;
        if rows_affected == 0 {
            bail!(
                "user {} not found -- choose an existing user and retry",
                user_id.get()
            );
        }
        debug!(user = user_id.get(), active, "changed user status");
        Ok(())
    }

    pub fn create_broadcast(&self, input: &BroadcastFormInput) -> Result<Broadcast> {
        input.validate()?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO broadcasts (title, body, audience, created_at)
                VALUES (?, ?, ?, ?)
                ",
                params![
                    input.title.trim(),
                    input.body.trim(),
                    input.audience.as_str(),
                    now
                ],
            )
            .context("insert broadcast")?;
        self.get_broadcast(BroadcastId::new(self.conn.last_insert_rowid()))
    }

    pub fn list_broadcasts(&self) -> Result<Vec<Broadcast>> {
        query_rows(
            &self.conn,
            "
            SELECT id, title, body, audience, created_at, sent_at
            FROM broadcasts
            ORDER BY created_at DESC, id DESC
            ",
            [],
            broadcast_from_row,
            "broadcasts",
        )
    }

    /// Stamps `sent_at`. A broadcast goes out once.
    pub fn mark_broadcast_sent(&self, broadcast_id: BroadcastId) -> Result<Broadcast> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE broadcasts SET sent_at = ? WHERE id = ? AND sent_at IS NULL",
                params![now, broadcast_id.get()],
            )
            .context("mark broadcast sent")?;
        if rows_affected == 0 {
            bail!(
                "broadcast {} not found or already sent -- choose an unsent broadcast and retry",
                broadcast_id.get()
            );
        }
        self.get_broadcast(broadcast_id)
    }

    pub fn family_owner(&self) -> Result<Option<Member>> {
        let owner_id: Option<i64> = self
            .conn
            .query_row(
                "
                SELECT id FROM members
                WHERE role = 'owner' AND status != 'removed'
                ORDER BY id ASC
                LIMIT 1
                ",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("find family owner")?;
        owner_id
            .map(|owner_id| self.get_member(MemberId::new(owner_id)))
            .transpose()
    }

    /// Fills an empty database with a generated family: an owner and a few
    /// invited members, goals with contributions and reminders, site users
    /// and a welcome broadcast.
    pub fn seed_demo_data(&self, seed: u64) -> Result<()> {
        let goal_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM goals", [], |row| row.get(0))
            .context("count goals")?;
        if goal_count > 0 {
            bail!("database already has goals -- use --demo with an empty database");
        }

        let mut faker = FamilyFaker::new(seed);
        let mut emails = BTreeSet::new();
        let owner = match self.family_owner()? {
            Some(owner) => owner,
            None => {
                let person = faker.person();
                self.create_owner(&person.name, &person.email)?
            }
        };
        emails.insert(owner.email.clone());

        let mut contributors = vec![owner.id];
        for role in [
            MemberRole::Admin,
            MemberRole::Contributor,
            MemberRole::Contributor,
            MemberRole::Viewer,
        ] {
            let invite = faker.invite(role);
            if !emails.insert(invite.email.clone()) {
                continue;
            }
            let member = self.invite_member(&invite)?;
            if role != MemberRole::Viewer {
                contributors.push(member.id);
            }
        }

        for _ in 0..DEMO_GOAL_COUNT {
            let goal = self.create_goal(&faker.goal(), Some(owner.id))?;
            for _ in 0..faker.int_n(5) {
                let member = contributors[faker.int_n(contributors.len())];
                let contribution =
                    faker.contribution(goal.id, Some(member), goal.target_cents / 3);
                self.record_transaction(&contribution)?;
            }
            if faker.int_n(3) != 0 {
                self.create_reminder(&faker.reminder(Some(goal.id)))?;
            }
        }
        self.create_reminder(&faker.reminder(None))?;

        self.create_user(&owner.name, &owner.email, true)?;
        let person = faker.person();
        if !emails.contains(&person.email) {
            self.create_user(&person.name, &person.email, false)?;
        }
        self.create_broadcast(&BroadcastFormInput {
            title: "Welcome to hearth".to_owned(),
            body: "Set a goal, invite your family, and save together.".to_owned(),
            audience: BroadcastAudience::All,
        })?;
        debug!(seed, goals = DEMO_GOAL_COUNT, "seeded demo data");
        Ok(())
    }

    fn get_broadcast(&self, broadcast_id: BroadcastId) -> Result<Broadcast> {
        self.conn
            .query_row(
                "
                SELECT id, title, body, audience, created_at, sent_at
                FROM broadcasts
                WHERE id = ?
                ",
                params![broadcast_id.get()],
                broadcast_from_row,
            )
            .with_context(|| format!("load broadcast {}", broadcast_id.get()))
    }

    fn member_name(&self, member_id: Option<MemberId>) -> Result<String> {
        match member_id {
            Some(member_id) => Ok(self.get_member(member_id)?.name),
            None => Ok("someone".to_owned()),
        }
    }
}

impl DataSource for Store {
    fn list_goals(&self, criteria: &GoalCriteria) -> Result<Vec<Goal>> {
        let goals = query_rows(
            &self.conn,
            &format!(
                "
                SELECT {GOAL_COLUMNS}
                FROM goals
                WHERE deleted_at IS NULL
                ORDER BY updated_at DESC, id DESC
                "
            ),
            [],
            goal_from_row,
            "goals",
        )?;
        Ok(filter_items(&goals, &with_reference_time(criteria)))
    }

    fn get_goal(&self, goal_id: GoalId) -> Result<Goal> {
        self.conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ? AND deleted_at IS NULL"),
                params![goal_id.get()],
                goal_from_row,
            )
            .optional()
            .with_context(|| format!("load goal {}", goal_id.get()))?
            .ok_or_else(|| {
                anyhow!(
                    "goal {} not found or deleted -- choose an existing goal and retry",
                    goal_id.get()
                )
            })
    }

    fn list_reminders(&self, criteria: &ReminderCriteria) -> Result<Vec<Reminder>> {
        let reminders = query_rows(
            &self.conn,
            &format!(
                "
                SELECT {REMINDER_COLUMNS}
                FROM reminders
                ORDER BY scheduled_for ASC, id ASC
                "
            ),
            [],
            reminder_from_row,
            "reminders",
        )?;
        Ok(filter_items(&reminders, &with_reference_time(criteria)))
    }

    fn list_transactions(&self, goal_id: Option<GoalId>) -> Result<Vec<Transaction>> {
        query_rows(
            &self.conn,
            &format!(
                "
                {TRANSACTION_SELECT}
                WHERE (?1 IS NULL OR t.goal_id = ?1)
                ORDER BY t.occurred_at DESC, t.id DESC
                "
            ),
            params![goal_id.map(GoalId::get)],
            transaction_from_row,
            "transactions",
        )
    }

    fn list_activities(&self, limit: usize) -> Result<Vec<Activity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        query_rows(
            &self.conn,
            "
            SELECT id, goal_id, member_id, kind, summary, created_at
            FROM activities
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            ",
            params![limit],
            activity_from_row,
            "activities",
        )
    }

    fn list_members(&self) -> Result<Vec<Member>> {
        query_rows(
            &self.conn,
            "
            SELECT id, name, email, role, status, joined_at
            FROM members
            WHERE status != 'removed'
            ORDER BY joined_at ASC, id ASC
            ",
            [],
            member_from_row,
            "members",
        )
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let trimmed = query.trim();
        if trimmed.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let pattern = like_pattern(trimmed);
        let cap = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut hits = Vec::new();
        let goals = query_rows(
            &self.conn,
            &format!(
                "
                SELECT {GOAL_COLUMNS}
                FROM goals
                WHERE deleted_at IS NULL
                  AND (title LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\')
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
                "
            ),
            params![pattern, cap],
            goal_from_row,
            "goal search",
        )?;
        hits.extend(goals.iter().map(SearchHit::from));

        let activities = query_rows(
            &self.conn,
            "
            SELECT id, goal_id, member_id, kind, summary, created_at
            FROM activities
            WHERE summary LIKE ?1 ESCAPE '\\'
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            ",
            params![pattern, cap],
            activity_from_row,
            "activity search",
        )?;
        hits.extend(activities.iter().map(SearchHit::from));

        let transactions = query_rows(
            &self.conn,
            &format!(
                "
                {TRANSACTION_SELECT}
                WHERE t.note LIKE ?1 ESCAPE '\\' OR m.name LIKE ?1 ESCAPE '\\'
                ORDER BY t.created_at DESC, t.id DESC
                LIMIT ?2
                "
            ),
            params![pattern, cap],
            transaction_from_row,
            "transaction search",
        )?;
        hits.extend(transactions.iter().map(SearchHit::from));

        let members = query_rows(
            &self.conn,
            "
            SELECT id, name, email, role, status, joined_at
            FROM members
            WHERE status != 'removed'
              AND (name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\')
            ORDER BY joined_at DESC, id DESC
            LIMIT ?2
            ",
            params![pattern, cap],
            member_from_row,
            "member search",
        )?;
        hits.extend(members.iter().map(SearchHit::from));

        let reminders = query_rows(
            &self.conn,
            &format!(
                "
                SELECT {REMINDER_COLUMNS}
                FROM reminders
                WHERE title LIKE ?1 ESCAPE '\\'
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
                "
            ),
            params![pattern, cap],
            reminder_from_row,
            "reminder search",
        )?;
        hits.extend(reminders.iter().map(SearchHit::from));

        hits.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        hits.truncate(limit);
        debug!(query = trimmed, hits = hits.len(), "searched store");
        Ok(hits)
    }

    fn create_goal(&self, input: &GoalFormInput, author: Option<MemberId>) -> Result<Goal> {
        input.validate()?;
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin goal transaction")?;
        tx.execute(
            "
            INSERT INTO goals (
              title, description, kind, category, status,
              target_cents, current_cents, deadline, created_by, shared,
              created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)
            ",
            params![
                input.title.trim(),
                input.description.trim(),
                input.kind.as_str(),
                input.category.as_str(),
                input.status.as_str(),
                input.target_cents,
                input.deadline.map(format_date),
                author.map(MemberId::get),
                input.shared,
                now,
                now,
            ],
        )
        .context("insert goal")?;
        let goal_id = GoalId::new(tx.last_insert_rowid());
        insert_activity(
            &tx,
            Some(goal_id),
            author,
            ActivityKind::GoalCreated,
            &format!("created goal {}", input.title.trim()),
            &now,
        )?;
        for invite in &input.invites {
            insert_invite(&tx, Some(goal_id), invite, &now)?;
        }
        tx.commit().context("commit goal")?;

        debug!(goal = goal_id.get(), invites = input.invites.len(), "created goal");
        self.get_goal(goal_id)
    }

    fn update_goal(&self, goal_id: GoalId, input: &GoalFormInput) -> Result<Goal> {
        input.validate()?;
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin goal transaction")?;
        let rows_affected = tx
            .execute(
                "
                UPDATE goals
                SET
                  title = ?,
                  description = ?,
                  kind = ?,
                  category = ?,
                  status = ?,
                  target_cents = ?,
                  deadline = ?,
                  shared = ?,
                  updated_at = ?
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![
                    input.title.trim(),
                    input.description.trim(),
                    input.kind.as_str(),
                    input.category.as_str(),
                    input.status.as_str(),
                    input.target_cents,
                    input.deadline.map(format_date),
                    input.shared,
                    now,
                    goal_id.get(),
                ],
            )
            .context("update goal")?;
        if rows_affected == 0 {
            bail!(
                "goal {} not found or deleted -- choose an existing goal and retry",
                goal_id.get()
            );
        }
        insert_activity(
            &tx,
            Some(goal_id),
            None,
            ActivityKind::GoalUpdated,
            &format!("updated goal {}", input.title.trim()),
            &now,
        )?;
        for invite in &input.invites {
            insert_invite(&tx, Some(goal_id), invite, &now)?;
        }
        tx.commit().context("commit goal update")?;
        self.get_goal(goal_id)
    }

    fn delete_goal(&self, goal_id: GoalId) -> Result<()> {
        let goal = self.get_goal(goal_id)?;
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin goal transaction")?;
        let rows_affected = tx
            .execute(
                "
                UPDATE goals
                SET deleted_at = ?, updated_at = ?
                WHERE id = ? AND deleted_at IS NULL
                ",
                params![now, now, goal_id.get()],
            )
            .context("delete goal")?;
        if rows_affected == 0 {
            bail!(
                "goal {} not found or deleted -- choose an existing goal and retry",
                goal_id.get()
            );
        }
        insert_activity(
            &tx,
            Some(goal_id),
            None,
            ActivityKind::GoalDeleted,
            &format!("deleted goal {}", goal.title),
            &now,
        )?;
        tx.commit().context("commit goal delete")
    }

    fn record_transaction(&self, input: &ContributionFormInput) -> Result<Goal> {
        input.validate()?;
        let goal = self.get_goal(input.goal_id)?;
        if goal.status == GoalStatus::Cancelled {
            bail!(
                "goal {} is cancelled -- reactivate it before recording money",
                goal.title
            );
        }
        let member_name = self.member_name(input.member_id)?;

        let signed = match input.kind {
            TransactionKind::Contribution => input.amount_cents,
            TransactionKind::Withdrawal => -input.amount_cents,
        };
        let current_cents = goal.current_cents.saturating_add(signed).max(0);
        let status = if goal.status == GoalStatus::Active
            && goal.target_cents > 0
            && current_cents >= goal.target_cents
        {
            GoalStatus::Completed
        } else {
            goal.status
        };

        let now = now_rfc3339()?;
        let occurred_at = format_datetime(input.occurred_at)?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin transaction insert")?;
        tx.execute(
            "
            INSERT INTO transactions (
              goal_id, member_id, kind, amount_cents, note, occurred_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                input.goal_id.get(),
                input.member_id.map(MemberId::get),
                input.kind.as_str(),
                input.amount_cents,
                input.note.trim(),
                occurred_at,
                now,
            ],
        )
        .context("insert transaction")?;
        tx.execute(
            "
            UPDATE goals
            SET current_cents = ?, status = ?, updated_at = ?
            WHERE id = ?
            ",
            params![current_cents, status.as_str(), now, input.goal_id.get()],
        )
        .context("update goal balance")?;

        let (activity_kind, verb) = match input.kind {
            TransactionKind::Contribution => (ActivityKind::Contribution, "added"),
            TransactionKind::Withdrawal => (ActivityKind::Withdrawal, "withdrew"),
        };
        insert_activity(
            &tx,
            Some(input.goal_id),
            input.member_id,
            activity_kind,
            &format!(
                "{member_name} {verb} {} for {}",
                format_cents(input.amount_cents),
                goal.title
            ),
            &now,
        )?;
        tx.commit().context("commit transaction")?;

        if status != goal.status {
            debug!(goal = goal.id.get(), "goal reached its target");
        }
        self.get_goal(input.goal_id)
    }

    fn create_reminder(&self, input: &ReminderFormInput) -> Result<Reminder> {
        input.validate()?;
        if let Some(goal_id) = input.goal_id {
            self.get_goal(goal_id)?;
        }
        let now = now_rfc3339()?;
        let scheduled_for = format_datetime(input.scheduled_for)?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin reminder transaction")?;
        tx.execute(
            "
            INSERT INTO reminders (
              goal_id, title, frequency, status, scheduled_for, created_at, updated_at
            ) VALUES (?, ?, ?, 'scheduled', ?, ?, ?)
            ",
            params![
                input.goal_id.map(GoalId::get),
                input.title.trim(),
                input.frequency.as_str(),
                scheduled_for,
                now,
                now,
            ],
        )
        .context("insert reminder")?;
        let reminder_id = ReminderId::new(tx.last_insert_rowid());
        insert_activity(
            &tx,
            input.goal_id,
            None,
            ActivityKind::ReminderScheduled,
            &format!("scheduled reminder {}", input.title.trim()),
            &now,
        )?;
        tx.commit().context("commit reminder")?;
        self.get_reminder(reminder_id)
    }

    fn dismiss_reminder(&self, reminder_id: ReminderId) -> Result<Reminder> {
        let reminder = self.get_reminder(reminder_id)?;
        if reminder.status == ReminderStatus::Dismissed {
            bail!(
                "reminder {} is already dismissed -- choose a scheduled reminder",
                reminder_id.get()
            );
        }
        let now = now_rfc3339()?;
        let (status, scheduled_for) =
            match next_occurrence(reminder.frequency, reminder.scheduled_for) {
                Some(next) => (ReminderStatus::Scheduled, next),
                None => (ReminderStatus::Dismissed, reminder.scheduled_for),
            };

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin reminder transaction")?;
        tx.execute(
            "
            UPDATE reminders
            SET status = ?, scheduled_for = ?, updated_at = ?
            WHERE id = ?
            ",
            params![
                status.as_str(),
                format_datetime(scheduled_for)?,
                now,
                reminder_id.get()
            ],
        )
        .context("update reminder")?;
        insert_activity(
            &tx,
            reminder.goal_id,
            None,
            ActivityKind::ReminderDismissed,
            &format!("dismissed reminder {}", reminder.title),
            &now,
        )?;
        tx.commit().context("commit reminder")?;
        self.get_reminder(reminder_id)
    }

    fn invite_member(&self, input: &InviteFormInput) -> Result<Member> {
        input.validate()?;
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin invite transaction")?;
        let Some(member_id) = insert_invite(&tx, None, input, &now)? else {
            bail!(
                "{} is already in the family -- invite someone else",
                input.email.trim()
            );
        };
        tx.commit().context("commit invite")?;
        self.get_member(member_id)
    }
}

impl DraftStore for Store {
    fn load_draft(&self, key: &str) -> Result<Option<Draft>> {
        self.conn
            .query_row(
                "SELECT version, payload, saved_at FROM drafts WHERE key = ? AND removed = 0",
                params![key],
                |row| {
                    let version: i64 = row.get(0)?;
                    let saved_at_raw: String = row.get(2)?;
                    Ok(Draft {
                        version: u64::try_from(version).unwrap_or(0),
                        payload: row.get(1)?,
                        saved_at: parse_datetime(&saved_at_raw).map_err(to_sql_error)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load draft {key}"))
    }

    fn save_draft(
        &self,
        key: &str,
        expected_version: u64,
        payload: &str,
        now: OffsetDateTime,
    ) -> Result<SaveOutcome> {
        let saved_at = format_datetime(now)?;
        let expected = i64::try_from(expected_version)
            .with_context(|| format!("draft version {expected_version} is out of range"))?;
        // A fresh save may revive a removed key; its version keeps counting.
        let rows_affected = if expected_version == 0 {
            self.conn.execute(
                "
                INSERT INTO drafts (key, version, payload, saved_at, removed)
                VALUES (?, 1, ?, ?, 0)
                ON CONFLICT(key) DO UPDATE SET
                  version = drafts.version + 1,
                  payload = excluded.payload,
                  saved_at = excluded.saved_at,
                  removed = 0
                WHERE drafts.removed = 1
                ",
                params![key, payload, saved_at],
            )
        } else {
            self.conn.execute(
                "
                UPDATE drafts
                SET version = version + 1, payload = ?, saved_at = ?
                WHERE key = ? AND version = ? AND removed = 0
                ",
                params![payload, saved_at, key, expected],
            )
        }
        .with_context(|| format!("save draft {key}"))?;

        if rows_affected == 0 {
            let actual_version = self.load_draft(key)?.map_or(0, |draft| draft.version);
            warn!(
                key,
                expected_version, actual_version, "draft changed since it was loaded"
            );
            return Ok(SaveOutcome::Conflict(DraftConflict {
                key: key.to_owned(),
                expected_version,
                actual_version,
            }));
        }
        let version = self
            .load_draft(key)?
            .map_or(expected_version + 1, |draft| draft.version);
        Ok(SaveOutcome::Saved { version })
    }

    fn remove_draft(&self, key: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE drafts SET removed = 1, payload = '' WHERE key = ?",
                params![key],
            )
            .with_context(|| format!("remove draft {key}"))?;
        Ok(())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("HEARTH_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set HEARTH_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("hearth.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); set [api] base_url for remote data instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

/// Fills in `as_of` so time-relative flags evaluate against the current clock.
fn with_reference_time<S: Clone, K: Clone>(criteria: &Criteria<S, K>) -> Criteria<S, K> {
    let mut criteria = criteria.clone();
    if criteria.as_of.is_none() {
        criteria.as_of = Some(OffsetDateTime::now_utc());
    }
    criteria
}

fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Adds a family member unless the email already belongs to one. Returns the
/// new member's id, or `None` when the email was already present.
fn insert_invite(
    conn: &Connection,
    goal_id: Option<GoalId>,
    invite: &InviteFormInput,
    now: &str,
) -> Result<Option<MemberId>> {
    let email = validate_email(&invite.email)
        .with_context(|| format!("invite email {:?}", invite.email))?;
    let existing = conn
        .query_row(
            "SELECT id FROM members WHERE email = ? AND status != 'removed'",
            params![email],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .context("look up member email")?;
    if existing.is_some() {
        return Ok(None);
    }

    let name = if invite.name.trim().is_empty() {
        email.clone()
    } else {
        invite.name.trim().to_owned()
    };
    conn.execute(
        "
        INSERT INTO members (name, email, role, status, joined_at, updated_at)
        VALUES (?, ?, ?, 'invited', ?, ?)
        ",
        params![name, email, invite.role.as_str(), now, now],
    )
    .context("insert member invite")?;
    let member_id = MemberId::new(conn.last_insert_rowid());
    insert_activity(
        conn,
        goal_id,
        Some(member_id),
        ActivityKind::MemberInvited,
        &format!("invited {name} as {}", invite.role),
        now,
    )?;
    Ok(Some(member_id))
}

fn insert_activity(
    conn: &Connection,
    goal_id: Option<GoalId>,
    member_id: Option<MemberId>,
    kind: ActivityKind,
    summary: &str,
    now: &str,
) -> Result<ActivityId> {
    conn.execute(
        "
        INSERT INTO activities (goal_id, member_id, kind, summary, created_at)
        VALUES (?, ?, ?, ?, ?)
        ",
        params![
            goal_id.map(GoalId::get),
            member_id.map(MemberId::get),
            kind.as_str(),
            summary,
            now
        ],
    )
    .with_context(|| format!("record {kind} activity"))?;
    Ok(ActivityId::new(conn.last_insert_rowid()))
}

fn query_rows<T, P>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
    what: &str,
) -> Result<Vec<T>>
where
    P: rusqlite::Params,
{
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("prepare {what} query"))?;
    let rows = stmt
        .query_map(params, map)
        .with_context(|| format!("query {what}"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("collect {what}"))
}

fn parse_label<T>(
    index: usize,
    raw: &str,
    parse: fn(&str) -> Option<T>,
    what: &str,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown {what} {raw}"),
            )),
        )
    })
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    let kind_raw: String = row.get(3)?;
    let category_raw: String = row.get(4)?;
    let status_raw: String = row.get(5)?;
    let deadline_raw: Option<String> = row.get(8)?;
    let created_at_raw: String = row.get(11)?;
    let updated_at_raw: String = row.get(12)?;
    let deleted_at_raw: Option<String> = row.get(13)?;

    Ok(Goal {
        id: GoalId::new(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        kind: parse_label(3, &kind_raw, GoalKind::parse, "goal kind")?,
        category: parse_label(4, &category_raw, GoalCategory::parse, "goal category")?,
        status: parse_label(5, &status_raw, GoalStatus::parse, "goal status")?,
        target_cents: row.get(6)?,
        current_cents: row.get(7)?,
        deadline: parse_opt_date(deadline_raw).map_err(to_sql_error)?,
        created_by: row.get::<_, Option<i64>>(9)?.map(MemberId::new),
        shared: row.get(10)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
        deleted_at: parse_opt_datetime(deleted_at_raw).map_err(to_sql_error)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    let role_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let joined_at_raw: String = row.get(5)?;
    Ok(Member {
        id: MemberId::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_label(3, &role_raw, MemberRole::parse, "member role")?,
        status: parse_label(4, &status_raw, MemberStatus::parse, "member status")?,
        joined_at: parse_datetime(&joined_at_raw).map_err(to_sql_error)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind_raw: String = row.get(4)?;
    let occurred_at_raw: String = row.get(7)?;
    let created_at_raw: String = row.get(8)?;
    Ok(Transaction {
        id: TransactionId::new(row.get(0)?),
        goal_id: GoalId::new(row.get(1)?),
        member_id: row.get::<_, Option<i64>>(2)?.map(MemberId::new),
        member_name: row.get(3)?,
        kind: parse_label(4, &kind_raw, TransactionKind::parse, "transaction kind")?,
        amount_cents: row.get(5)?,
        note: row.get(6)?,
        occurred_at: parse_datetime(&occurred_at_raw).map_err(to_sql_error)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
    })
}

fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    let frequency_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let scheduled_for_raw: String = row.get(5)?;
    let created_at_raw: String = row.get(6)?;
    let updated_at_raw: String = row.get(7)?;
    Ok(Reminder {
        id: ReminderId::new(row.get(0)?),
        goal_id: row.get::<_, Option<i64>>(1)?.map(GoalId::new),
        title: row.get(2)?,
        frequency: parse_label(
            3,
            &frequency_raw,
            ReminderFrequency::parse,
            "reminder frequency",
        )?,
        status: parse_label(4, &status_raw, ReminderStatus::parse, "reminder status")?,
        scheduled_for: parse_datetime(&scheduled_for_raw).map_err(to_sql_error)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let kind_raw: String = row.get(3)?;
    let created_at_raw: String = row.get(5)?;
    Ok(Activity {
        id: ActivityId::new(row.get(0)?),
        goal_id: row.get::<_, Option<i64>>(1)?.map(GoalId::new),
        member_id: row.get::<_, Option<i64>>(2)?.map(MemberId::new),
        kind: parse_label(3, &kind_raw, ActivityKind::parse, "activity kind")?,
        summary: row.get(4)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at_raw: String = row.get(5)?;
    Ok(User {
        id: UserId::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
        active: row.get(4)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
    })
}

fn broadcast_from_row(row: &Row<'_>) -> rusqlite::Result<Broadcast> {
    let audience_raw: String = row.get(3)?;
    let created_at_raw: String = row.get(4)?;
    let sent_at_raw: Option<String> = row.get(5)?;
    Ok(Broadcast {
        id: BroadcastId::new(row.get(0)?),
        title: row.get(1)?,
        body: row.get(2)?,
        audience: parse_label(
            3,
            &audience_raw,
            BroadcastAudience::parse,
            "broadcast audience",
        )?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        sent_at: parse_opt_datetime(sent_at_raw).map_err(to_sql_error)?,
    })
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point [storage] db_path at a hearth database"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    format_datetime(OffsetDateTime::now_utc())
}

fn format_datetime(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .context("format timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Ok(value);
    }

    let date_time = parse_datetime(raw)?;
    Ok(date_time.date())
}

fn parse_opt_datetime(raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.as_deref().map(parse_datetime).transpose()
}

fn parse_opt_date(raw: Option<String>) -> Result<Option<Date>> {
    raw.as_deref().map(parse_date).transpose()
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}

fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("vac"), "%vac%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
