// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use hearth_app::{
    ContributionFormInput, Goal, GoalCategory, GoalFormInput, GoalId, GoalKind, GoalStatus,
    InviteFormInput, MemberId, MemberRole, ReminderFormInput, ReminderFrequency, TransactionKind,
};
use std::path::PathBuf;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const REFERENCE_NOW: OffsetDateTime = datetime!(2026-03-01 09:00 UTC);

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Bennett", "Brooks",
];
const EMAIL_DOMAINS: [&str; 4] = [
    "example.com",
    "family.example",
    "mail.example.org",
    "home.example.net",
];

/// (category, title, target range in whole dollars)
const GOAL_TEMPLATES: [(GoalCategory, &str, i64, i64); 14] = [
    (GoalCategory::Vacation, "Summer beach trip", 1_500, 6_000),
    (GoalCategory::Vacation, "Visit grandparents", 800, 2_500),
    (GoalCategory::Education, "College fund", 10_000, 60_000),
    (GoalCategory::Education, "Piano lessons", 300, 1_500),
    (GoalCategory::Home, "New couch", 700, 2_500),
    (GoalCategory::Home, "Backyard garden", 300, 1_200),
    (GoalCategory::Emergency, "Rainy day fund", 3_000, 15_000),
    (GoalCategory::Vehicle, "Family minivan", 8_000, 25_000),
    (GoalCategory::Vehicle, "Bike for Sam", 150, 600),
    (GoalCategory::Fitness, "Run 100 miles together", 100, 100),
    (GoalCategory::Fitness, "Swim lessons", 200, 800),
    (GoalCategory::Celebration, "Anniversary dinner", 200, 600),
    (GoalCategory::Celebration, "Birthday party", 250, 900),
    (GoalCategory::Other, "Holiday gifts", 400, 1_500),
];

const CONTRIBUTION_NOTES: [&str; 8] = [
    "Weekly allowance",
    "Birthday money",
    "Garage sale",
    "Paycheck transfer",
    "Lemonade stand",
    "Tax refund",
    "Round-up savings",
    "",
];

const REMINDER_TITLES: [&str; 6] = [
    "Transfer allowance",
    "Check progress together",
    "Deposit birthday money",
    "Review the family budget",
    "Plan the next milestone",
    "Celebrate a milestone",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of plausible family fixtures.
#[derive(Debug, Clone)]
pub struct FamilyFaker {
    rng: DeterministicRng,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl FamilyFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn person(&mut self) -> Person {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&EMAIL_DOMAINS);
        Person {
            name: format!("{first} {last}"),
            email: format!(
                "{}.{}@{domain}",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase()
            ),
        }
    }

    pub fn invite(&mut self, role: MemberRole) -> InviteFormInput {
        let person = self.person();
        InviteFormInput {
            name: person.name,
            email: person.email,
            role,
        }
    }

    pub fn goal(&mut self) -> GoalFormInput {
        let (category, title, min, max) = GOAL_TEMPLATES[self.rng.int_n(GOAL_TEMPLATES.len())];
        let kind = if category == GoalCategory::Fitness {
            GoalKind::Activity
        } else {
            GoalKind::Savings
        };
        let deadline = self
            .rng
            .bool()
            .then(|| (REFERENCE_NOW + Duration::days(self.int_range_i64(-30, 365))).date());
        GoalFormInput {
            title: title.to_owned(),
            description: format!("{category} goal for the whole family"),
            kind,
            category,
            status: GoalStatus::Active,
            target_cents: self.int_range_i64(min, max) * 100,
            deadline,
            shared: self.rng.int_n(4) != 0,
            invites: Vec::new(),
        }
    }

    pub fn contribution(
        &mut self,
        goal_id: GoalId,
        member_id: Option<MemberId>,
        max_cents: i64,
    ) -> ContributionFormInput {
        let note = self.pick(&CONTRIBUTION_NOTES);
        let upper = (max_cents / 100).max(1);
        ContributionFormInput {
            goal_id,
            member_id,
            kind: TransactionKind::Contribution,
            amount_cents: self.int_range_i64(1, upper) * 100,
            note: note.to_owned(),
            occurred_at: self
                .datetime_between(REFERENCE_NOW - Duration::days(120), REFERENCE_NOW),
        }
    }

    pub fn reminder(&mut self, goal_id: Option<GoalId>) -> ReminderFormInput {
        let frequency = ReminderFrequency::ALL[self.rng.int_n(ReminderFrequency::ALL.len())];
        ReminderFormInput {
            goal_id,
            title: self.pick(&REMINDER_TITLES).to_owned(),
            frequency,
            scheduled_for: self.datetime_between(
                REFERENCE_NOW - Duration::days(7),
                REFERENCE_NOW + Duration::days(30),
            ),
        }
    }

    /// A stored-looking goal for pure in-memory tests.
    pub fn goal_record(&mut self, id: i64) -> Goal {
        let input = self.goal();
        let created_at =
            self.datetime_between(REFERENCE_NOW - Duration::days(365), REFERENCE_NOW);
        let current_cents = self.int_range_i64(0, input.target_cents);
        Goal {
            id: GoalId::new(id),
            title: input.title,
            description: input.description,
            kind: input.kind,
            category: input.category,
            status: if current_cents >= input.target_cents {
                GoalStatus::Completed
            } else {
                GoalStatus::Active
            },
            target_cents: input.target_cents,
            current_cents,
            deadline: input.deadline,
            created_by: None,
            shared: input.shared,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }

    fn datetime_between(&mut self, start: OffsetDateTime, end: OffsetDateTime) -> OffsetDateTime {
        let span = (end - start).whole_seconds();
        if span <= 0 {
            return start;
        }
        start + Duration::seconds(self.int_range_i64(0, span))
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("hearth.db");
    Ok((dir, db_path))
}

/// Fixed "now" that generated dates are spread around.
pub const fn reference_now() -> OffsetDateTime {
    REFERENCE_NOW
}

#[cfg(test)]
mod tests {
    use super::{FamilyFaker, reference_now, temp_db_path};
    use hearth_app::{GoalId, GoalKind, MemberRole};
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_same_fixtures() {
        let mut left = FamilyFaker::new(42);
        let mut right = FamilyFaker::new(42);
        assert_eq!(left.person(), right.person());
        assert_eq!(left.goal(), right.goal());
    }

    #[test]
    fn generated_goals_validate() {
        let mut faker = FamilyFaker::new(3);
        for _ in 0..50 {
            let goal = faker.goal();
            goal.validate().expect("faker goal should be valid");
            if goal.title.starts_with("Run ") {
                assert_eq!(goal.kind, GoalKind::Activity);
                assert_eq!(goal.target_cents, 10_000);
            }
        }
    }

    #[test]
    fn contributions_stay_within_cap() {
        let mut faker = FamilyFaker::new(9);
        for _ in 0..50 {
            let contribution = faker.contribution(GoalId::new(1), None, 5_000);
            contribution.validate().expect("valid contribution");
            assert!(contribution.amount_cents <= 5_000);
            assert!(contribution.occurred_at <= reference_now());
        }
    }

    #[test]
    fn invites_have_plausible_emails() {
        let mut faker = FamilyFaker::new(11);
        let invite = faker.invite(MemberRole::Viewer);
        invite.validate().expect("valid invite");
        assert!(invite.email.contains('@'));
    }

    #[test]
    fn goal_records_respect_progress_bounds() {
        let mut faker = FamilyFaker::new(5);
        for id in 1..30 {
            let goal = faker.goal_record(id);
            assert!(goal.current_cents <= goal.target_cents);
            assert_eq!(goal.id, GoalId::new(id));
        }
    }

    #[test]
    fn variety_across_seeds() {
        let names = (0_u64..20)
            .map(|seed| FamilyFaker::new(seed).person().name)
            .collect::<BTreeSet<_>>();
        assert!(names.len() >= 8, "got {}", names.len());
    }

    #[test]
    fn temp_db_path_lives_in_temp_dir() -> anyhow::Result<()> {
        let (dir, path) = temp_db_path()?;
        assert!(path.starts_with(dir.path()));
        Ok(())
    }
}
