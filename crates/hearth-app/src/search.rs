// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::filter::{DateField, Filterable, Labeled, NotApplicable};
use crate::{Activity, Goal, GoalId, Member, Reminder, Route, Transaction};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_BLUR_GRACE: Duration = Duration::from_millis(150);
pub const DEFAULT_MAX_RESULTS: usize = 8;
pub const RECENT_SEARCH_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Goal,
    Activity,
    Transaction,
    Member,
    Reminder,
}

impl HitKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Activity => "activity",
            Self::Transaction => "transaction",
            Self::Member => "member",
            Self::Reminder => "reminder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "goal" => Some(Self::Goal),
            "activity" => Some(Self::Activity),
            "transaction" => Some(Self::Transaction),
            "member" => Some(Self::Member),
            "reminder" => Some(Self::Reminder),
            _ => None,
        }
    }
}

impl Labeled for HitKind {
    fn as_label(self) -> &'static str {
        self.as_str()
    }

    fn from_label(value: &str) -> Option<Self> {
        Self::parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub kind: HitKind,
    pub id: i64,
    #[serde(default)]
    pub goal_id: Option<GoalId>,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl SearchHit {
    pub fn route(&self) -> Route {
        match (self.kind, self.goal_id) {
            (HitKind::Goal, _) => Route::Goal(GoalId::new(self.id)),
            (HitKind::Transaction | HitKind::Activity, Some(goal_id)) => Route::Goal(goal_id),
            (HitKind::Activity, None) => Route::Activity,
            (HitKind::Transaction, None) => Route::Goals,
            (HitKind::Member, _) => Route::Members,
            (HitKind::Reminder, _) => Route::Reminders,
        }
    }
}

impl From<&Goal> for SearchHit {
    fn from(goal: &Goal) -> Self {
        Self {
            kind: HitKind::Goal,
            id: goal.id.get(),
            goal_id: Some(goal.id),
            title: goal.title.clone(),
            subtitle: format!("{} goal, {}", goal.category, goal.status),
            created_at: goal.created_at,
        }
    }
}

impl From<&Activity> for SearchHit {
    fn from(activity: &Activity) -> Self {
        Self {
            kind: HitKind::Activity,
            id: activity.id.get(),
            goal_id: activity.goal_id,
            title: activity.summary.clone(),
            subtitle: activity.kind.to_string(),
            created_at: activity.created_at,
        }
    }
}

impl From<&Transaction> for SearchHit {
    fn from(transaction: &Transaction) -> Self {
        Self {
            kind: HitKind::Transaction,
            id: transaction.id.get(),
            goal_id: Some(transaction.goal_id),
            title: if transaction.note.is_empty() {
                format!("{} by {}", transaction.kind, transaction.member_name)
            } else {
                transaction.note.clone()
            },
            subtitle: crate::validation::format_cents(transaction.signed_amount_cents()),
            created_at: transaction.created_at,
        }
    }
}

impl From<&Member> for SearchHit {
    fn from(member: &Member) -> Self {
        Self {
            kind: HitKind::Member,
            id: member.id.get(),
            goal_id: None,
            title: member.name.clone(),
            subtitle: member.email.clone(),
            created_at: member.joined_at,
        }
    }
}

impl From<&Reminder> for SearchHit {
    fn from(reminder: &Reminder) -> Self {
        Self {
            kind: HitKind::Reminder,
            id: reminder.id.get(),
            goal_id: reminder.goal_id,
            title: reminder.title.clone(),
            subtitle: reminder.frequency.to_string(),
            created_at: reminder.created_at,
        }
    }
}

impl Filterable for SearchHit {
    type Status = NotApplicable;
    type Kind = HitKind;

    fn text_fields(&self) -> Vec<&str> {
        vec![&self.title, &self.subtitle]
    }

    fn status(&self) -> Option<NotApplicable> {
        None
    }

    fn kind(&self) -> Option<HitKind> {
        Some(self.kind)
    }

    fn amount_cents(&self) -> Option<i64> {
        None
    }

    fn timestamp(&self, field: DateField) -> Option<OffsetDateTime> {
        match field {
            DateField::Created | DateField::Updated => Some(self.created_at),
            DateField::Scheduled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropdownEntry {
    Result(SearchHit),
    Suggestion(String),
}

impl DropdownEntry {
    pub fn label(&self) -> &str {
        match self {
            Self::Result(hit) => &hit.title,
            Self::Suggestion(text) => text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropdownState {
    Closed,
    OpenLoading,
    OpenWithResults,
    OpenEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEffect {
    IssueQuery { request_id: u64, query: String },
    Selected(DropdownEntry),
    /// Reported after navigation is decided; delivery never blocks it.
    Analytics { query: String, index: usize },
    Navigate(Route),
    Blur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    Down,
    Up,
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub debounce: Duration,
    pub blur_grace: Duration,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            blur_grace: DEFAULT_BLUR_GRACE,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Most-recent-first list of submitted searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentSearches {
    limit: usize,
    items: VecDeque<String>,
}

impl Default for RecentSearches {
    fn default() -> Self {
        Self::new(RECENT_SEARCH_LIMIT)
    }
}

impl RecentSearches {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            items: VecDeque::with_capacity(limit),
        }
    }

    pub fn push(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() || self.limit == 0 {
            return;
        }
        self.items
            .retain(|existing| !existing.eq_ignore_ascii_case(query));
        self.items.push_front(query.to_owned());
        self.items.truncate(self.limit);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
pub struct SearchDropdown {
    config: SearchConfig,
    query: String,
    state: DropdownState,
    results: Vec<SearchHit>,
    suggestions: Vec<String>,
    recent: RecentSearches,
    selected: Option<usize>,
    debouncer: Debouncer<String>,
    last_request_id: u64,
    in_flight: Option<u64>,
    blurred_at: Option<Instant>,
    unmounted: bool,
}

impl SearchDropdown {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            query: String::new(),
            state: DropdownState::Closed,
            results: Vec::new(),
            suggestions: Vec::new(),
            recent: RecentSearches::default(),
            selected: None,
            debouncer: Debouncer::new(config.debounce),
            last_request_id: 0,
            in_flight: None,
            blurred_at: None,
            unmounted: false,
        }
    }

    /// Static suggestions listed after live results. When empty, recent
    /// searches are offered instead.
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub const fn state(&self) -> DropdownState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != DropdownState::Closed
    }

    pub const fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn results(&self) -> &[SearchHit] {
        &self.results
    }

    pub const fn recent(&self) -> &RecentSearches {
        &self.recent
    }

    pub fn entries(&self) -> Vec<DropdownEntry> {
        let suggestions: Vec<String> = if self.suggestions.is_empty() {
            self.recent.iter().map(str::to_owned).collect()
        } else {
            self.suggestions.clone()
        };
        self.results
            .iter()
            .cloned()
            .map(DropdownEntry::Result)
            .chain(suggestions.into_iter().map(DropdownEntry::Suggestion))
            .collect()
    }

    pub fn set_query(&mut self, text: &str, now: Instant) {
        if self.unmounted {
            return;
        }
        let changed = self.query != text;
        self.query = text.to_owned();
        self.selected = None;
        self.blurred_at = None;
        if changed {
            // Responses for the previous text no longer apply.
            self.in_flight = None;
            self.results.clear();
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.debouncer.cancel();
            self.state = DropdownState::Closed;
            return;
        }
        self.state = DropdownState::OpenLoading;
        self.debouncer.push(trimmed.to_owned(), now);
    }

    pub fn focus(&mut self, now: Instant) {
        self.blurred_at = None;
        if self.unmounted || self.is_open() || self.query.trim().is_empty() {
            return;
        }
        self.state = DropdownState::OpenLoading;
        self.debouncer.push(self.query.trim().to_owned(), now);
    }

    /// Start the grace window; the dropdown closes on the first tick after it.
    pub fn blur(&mut self, now: Instant) {
        if self.is_open() {
            self.blurred_at = Some(now);
        }
    }

    pub fn tick(&mut self, now: Instant) -> Vec<SearchEffect> {
        if self.unmounted {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if let Some(query) = self.debouncer.poll(now) {
            self.last_request_id += 1;
            self.in_flight = Some(self.last_request_id);
            self.state = DropdownState::OpenLoading;
            debug!(request_id = self.last_request_id, %query, "issuing search");
            effects.push(SearchEffect::IssueQuery {
                request_id: self.last_request_id,
                query,
            });
        }
        let grace_over = self
            .blurred_at
            .is_some_and(|at| now.saturating_duration_since(at) >= self.config.blur_grace);
        if grace_over {
            self.close();
        }
        effects
    }

    pub fn resolve(&mut self, request_id: u64, outcome: Result<Vec<SearchHit>>) {
        if self.unmounted || self.in_flight != Some(request_id) {
            debug!(request_id, latest = self.last_request_id, "discarding stale search response");
            return;
        }
        self.in_flight = None;
        let mut hits = match outcome {
            Ok(hits) => hits,
            Err(error) => {
                warn!(request_id, error = %error, "search failed");
                Vec::new()
            }
        };
        hits.truncate(self.config.max_results);
        self.results = hits;
        self.selected = None;
        if self.is_open() {
            self.state = if self.results.is_empty() {
                DropdownState::OpenEmpty
            } else {
                DropdownState::OpenWithResults
            };
        }
    }

    pub fn key(&mut self, key: SearchKey) -> Vec<SearchEffect> {
        if self.unmounted {
            return Vec::new();
        }
        let count = if self.is_open() {
            self.entries().len()
        } else {
            0
        };
        match key {
            SearchKey::Down if count > 0 => {
                self.selected = Some(self.selected.map_or(0, |index| (index + 1) % count));
                Vec::new()
            }
            SearchKey::Up if count > 0 => {
                self.selected = Some(
                    self.selected
                        .map_or(count - 1, |index| (index + count - 1) % count),
                );
                Vec::new()
            }
            SearchKey::Down | SearchKey::Up => Vec::new(),
            SearchKey::Enter => match self.selected.filter(|index| *index < count) {
                Some(index) => self.activate(index),
                None => self.submit(),
            },
            SearchKey::Escape => {
                self.close();
                vec![SearchEffect::Blur]
            }
        }
    }

    /// Pointer activation. Valid while open, including during the blur grace.
    pub fn click(&mut self, index: usize) -> Vec<SearchEffect> {
        if self.unmounted || !self.is_open() || index >= self.entries().len() {
            return Vec::new();
        }
        self.activate(index)
    }

    pub fn unmount(&mut self) {
        self.debouncer.cancel();
        self.in_flight = None;
        self.blurred_at = None;
        self.state = DropdownState::Closed;
        self.unmounted = true;
    }

    fn activate(&mut self, index: usize) -> Vec<SearchEffect> {
        let Some(entry) = self.entries().into_iter().nth(index) else {
            return Vec::new();
        };
        let query = self.query.trim().to_owned();
        let route = match &entry {
            DropdownEntry::Result(hit) => {
                self.recent.push(&query);
                hit.route()
            }
            DropdownEntry::Suggestion(text) => {
                self.recent.push(text);
                Route::search(text.clone())
            }
        };
        self.close();
        vec![
            SearchEffect::Selected(entry),
            SearchEffect::Navigate(route),
            SearchEffect::Analytics { query, index },
        ]
    }

    fn submit(&mut self) -> Vec<SearchEffect> {
        let query = self.query.trim().to_owned();
        if query.is_empty() {
            return Vec::new();
        }
        self.recent.push(&query);
        self.close();
        vec![SearchEffect::Navigate(Route::search(query))]
    }

    fn close(&mut self) {
        self.debouncer.cancel();
        self.in_flight = None;
        self.blurred_at = None;
        self.selected = None;
        self.state = DropdownState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DropdownEntry, DropdownState, HitKind, RecentSearches, SearchConfig, SearchDropdown,
        SearchEffect, SearchHit, SearchKey,
    };
    use crate::{GoalId, Route};
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};
    use time::OffsetDateTime;

    fn hit(id: i64, title: &str) -> SearchHit {
        SearchHit {
            kind: HitKind::Goal,
            id,
            goal_id: Some(GoalId::new(id)),
            title: title.to_owned(),
            subtitle: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn issued(effects: &[SearchEffect]) -> Vec<(u64, String)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                SearchEffect::IssueQuery { request_id, query } => {
                    Some((*request_id, query.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Type `query`, let the debounce fire, and resolve with `hits`.
    fn open_with(dropdown: &mut SearchDropdown, query: &str, hits: Vec<SearchHit>) -> Instant {
        let start = Instant::now();
        dropdown.set_query(query, start);
        let effects = dropdown.tick(start + Duration::from_millis(300));
        let (request_id, _) = issued(&effects)[0].clone();
        dropdown.resolve(request_id, Ok(hits));
        start + Duration::from_millis(300)
    }

    #[test]
    fn typing_within_window_issues_one_query_for_latest_text() {
        let start = Instant::now();
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        dropdown.set_query("vac", start);
        assert_eq!(dropdown.state(), DropdownState::OpenLoading);
        let mut effects = dropdown.tick(start + Duration::from_millis(100));
        dropdown.set_query("vaca", start + Duration::from_millis(150));
        for offset in [200, 300, 449, 450, 600, 900] {
            effects.extend(dropdown.tick(start + Duration::from_millis(offset)));
        }
        assert_eq!(issued(&effects), vec![(1, "vaca".to_owned())]);
    }

    #[test]
    fn resolution_picks_results_or_empty_state() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        open_with(&mut dropdown, "beach", vec![hit(1, "Beach house")]);
        assert_eq!(dropdown.state(), DropdownState::OpenWithResults);

        let mut empty = SearchDropdown::new(SearchConfig::default());
        open_with(&mut empty, "zzz", Vec::new());
        assert_eq!(empty.state(), DropdownState::OpenEmpty);
    }

    #[test]
    fn failed_query_is_swallowed_as_empty() {
        let start = Instant::now();
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        dropdown.set_query("beach", start);
        let effects = dropdown.tick(start + Duration::from_secs(1));
        let (request_id, _) = issued(&effects)[0].clone();
        dropdown.resolve(request_id, Err(anyhow!("connection reset")));
        assert_eq!(dropdown.state(), DropdownState::OpenEmpty);
        assert!(dropdown.results().is_empty());
    }

    #[test]
    fn stale_responses_are_discarded() {
        let start = Instant::now();
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        dropdown.set_query("bea", start);
        dropdown.tick(start + Duration::from_millis(300));
        dropdown.set_query("beach", start + Duration::from_millis(400));
        let effects = dropdown.tick(start + Duration::from_millis(700));
        assert_eq!(issued(&effects), vec![(2, "beach".to_owned())]);

        dropdown.resolve(1, Ok(vec![hit(9, "Bear costume")]));
        assert_eq!(dropdown.state(), DropdownState::OpenLoading);

        dropdown.resolve(2, Ok(vec![hit(1, "Beach house")]));
        assert_eq!(dropdown.results(), &[hit(1, "Beach house")]);
    }

    #[test]
    fn response_for_outdated_text_is_dropped_while_newer_text_debounces() {
        let start = Instant::now();
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        dropdown.set_query("vac", start);
        let first = dropdown.tick(start + Duration::from_millis(300));
        assert_eq!(issued(&first), vec![(1, "vac".to_owned())]);

        dropdown.set_query("vacaz", start + Duration::from_millis(350));
        dropdown.resolve(1, Ok(vec![hit(1, "Vacation fund")]));
        assert_eq!(dropdown.state(), DropdownState::OpenLoading);
        assert!(dropdown.results().is_empty());

        let second = dropdown.tick(start + Duration::from_millis(650));
        assert_eq!(issued(&second), vec![(2, "vacaz".to_owned())]);
        dropdown.resolve(2, Ok(Vec::new()));
        assert_eq!(dropdown.state(), DropdownState::OpenEmpty);
        assert!(dropdown.results().is_empty());
    }

    #[test]
    fn requery_moves_between_results_and_empty() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        let later = open_with(&mut dropdown, "beach", vec![hit(1, "Beach house")]);
        assert_eq!(dropdown.state(), DropdownState::OpenWithResults);

        dropdown.set_query("beachz", later);
        assert_eq!(dropdown.state(), DropdownState::OpenLoading);
        let effects = dropdown.tick(later + Duration::from_millis(300));
        let (request_id, _) = issued(&effects)[0].clone();
        dropdown.resolve(request_id, Ok(Vec::new()));
        assert_eq!(dropdown.state(), DropdownState::OpenEmpty);

        dropdown.set_query("beach", later + Duration::from_millis(400));
        let effects = dropdown.tick(later + Duration::from_millis(700));
        let (request_id, _) = issued(&effects)[0].clone();
        dropdown.resolve(request_id, Ok(vec![hit(1, "Beach house")]));
        assert_eq!(dropdown.state(), DropdownState::OpenWithResults);
        assert_eq!(dropdown.results().len(), 1);
    }

    #[test]
    fn arrow_keys_wrap_around_combined_entries() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default())
            .with_suggestions(vec!["vacation ideas".to_owned()]);
        open_with(&mut dropdown, "be", vec![hit(1, "Beach"), hit(2, "Bed")]);
        assert_eq!(dropdown.entries().len(), 3);

        dropdown.key(SearchKey::Down);
        assert_eq!(dropdown.selected(), Some(0));
        dropdown.key(SearchKey::Down);
        dropdown.key(SearchKey::Down);
        assert_eq!(dropdown.selected(), Some(2));
        dropdown.key(SearchKey::Down);
        assert_eq!(dropdown.selected(), Some(0));
        dropdown.key(SearchKey::Up);
        assert_eq!(dropdown.selected(), Some(2));
    }

    #[test]
    fn arrow_up_from_nothing_selects_last_entry() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        open_with(&mut dropdown, "be", vec![hit(1, "Beach"), hit(2, "Bed"), hit(3, "Bell")]);
        dropdown.key(SearchKey::Up);
        assert_eq!(dropdown.selected(), Some(2));
    }

    #[test]
    fn enter_activates_selection_and_reports_analytics() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        open_with(&mut dropdown, "beach", vec![hit(4, "Beach house")]);
        dropdown.key(SearchKey::Down);
        let effects = dropdown.key(SearchKey::Enter);
        assert_eq!(
            effects,
            vec![
                SearchEffect::Selected(DropdownEntry::Result(hit(4, "Beach house"))),
                SearchEffect::Navigate(Route::Goal(GoalId::new(4))),
                SearchEffect::Analytics {
                    query: "beach".to_owned(),
                    index: 0,
                },
            ]
        );
        assert_eq!(dropdown.state(), DropdownState::Closed);
    }

    #[test]
    fn enter_without_selection_runs_full_text_search() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        open_with(&mut dropdown, "beach & sun", Vec::new());
        let effects = dropdown.key(SearchKey::Enter);
        assert_eq!(
            effects,
            vec![SearchEffect::Navigate(Route::search("beach & sun"))]
        );
        assert_eq!(
            Route::search("beach & sun").path(),
            "/search?q=beach+%26+sun"
        );
        assert_eq!(dropdown.recent().iter().collect::<Vec<_>>(), vec!["beach & sun"]);
    }

    #[test]
    fn escape_closes_and_blurs() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        open_with(&mut dropdown, "beach", vec![hit(1, "Beach")]);
        assert_eq!(dropdown.key(SearchKey::Escape), vec![SearchEffect::Blur]);
        assert_eq!(dropdown.state(), DropdownState::Closed);
    }

    #[test]
    fn clearing_query_closes_and_cancels_pending_query() {
        let start = Instant::now();
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        dropdown.set_query("bea", start);
        dropdown.set_query("  ", start + Duration::from_millis(50));
        assert_eq!(dropdown.state(), DropdownState::Closed);
        assert!(dropdown.tick(start + Duration::from_secs(2)).is_empty());
    }

    #[test]
    fn click_during_blur_grace_still_activates() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        let now = open_with(&mut dropdown, "beach", vec![hit(1, "Beach")]);
        dropdown.blur(now);
        assert!(dropdown.tick(now + Duration::from_millis(100)).is_empty());
        assert!(dropdown.is_open());
        let effects = dropdown.click(0);
        assert!(effects.contains(&SearchEffect::Navigate(Route::Goal(GoalId::new(1)))));
    }

    #[test]
    fn blur_closes_after_grace_window() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        let now = open_with(&mut dropdown, "beach", vec![hit(1, "Beach")]);
        dropdown.blur(now);
        dropdown.tick(now + Duration::from_millis(150));
        assert_eq!(dropdown.state(), DropdownState::Closed);
        assert!(dropdown.click(0).is_empty());
    }

    #[test]
    fn unmount_cancels_timer_and_ignores_late_results() {
        let start = Instant::now();
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        dropdown.set_query("bea", start);
        let effects = dropdown.tick(start + Duration::from_millis(300));
        let (request_id, _) = issued(&effects)[0].clone();
        dropdown.set_query("beach", start + Duration::from_millis(350));
        dropdown.unmount();

        assert!(dropdown.tick(start + Duration::from_secs(5)).is_empty());
        dropdown.resolve(request_id, Ok(vec![hit(1, "Beach")]));
        assert!(dropdown.results().is_empty());
        assert_eq!(dropdown.state(), DropdownState::Closed);
    }

    #[test]
    fn recent_searches_are_bounded_and_deduplicated() {
        let mut recent = RecentSearches::default();
        for query in ["a", "b", "c", "d", "e", "f", "C"] {
            recent.push(query);
        }
        assert_eq!(recent.iter().collect::<Vec<_>>(), vec!["C", "f", "e", "d", "b"]);
    }

    #[test]
    fn recent_searches_fill_suggestions_when_none_configured() {
        let mut dropdown = SearchDropdown::new(SearchConfig::default());
        open_with(&mut dropdown, "beach", Vec::new());
        dropdown.key(SearchKey::Enter);

        open_with(&mut dropdown, "bike", vec![hit(2, "Bike")]);
        assert_eq!(
            dropdown.entries(),
            vec![
                DropdownEntry::Result(hit(2, "Bike")),
                DropdownEntry::Suggestion("beach".to_owned()),
            ]
        );
    }
}
