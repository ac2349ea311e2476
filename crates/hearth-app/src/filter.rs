// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Typed filter criteria and the stable sort applied to fetched collections.
//!
//! Every criteria field is optional and absence never excludes anything. A
//! filtered view is always an order-preserving subset of its source; ordering
//! only changes through the explicit sort step.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::form_urlencoded;

use crate::{
    Activity, ActivityKind, Goal, GoalKind, GoalStatus, Member, MemberRole, MemberStatus,
    Reminder, ReminderFrequency, ReminderStatus, SortDirection, SortField, Transaction,
    TransactionKind, User,
};

/// String form used when criteria travel through query strings.
pub trait Labeled: Sized + Copy {
    fn as_label(self) -> &'static str;
    fn from_label(value: &str) -> Option<Self>;
}

/// Stand-in for a criteria dimension a collection does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotApplicable {}

impl Labeled for NotApplicable {
    fn as_label(self) -> &'static str {
        match self {}
    }

    fn from_label(_value: &str) -> Option<Self> {
        None
    }
}

macro_rules! impl_labeled {
    ($($name:ty),+ $(,)?) => {
        $(
            impl Labeled for $name {
                fn as_label(self) -> &'static str {
                    self.as_str()
                }

                fn from_label(value: &str) -> Option<Self> {
                    Self::parse(value)
                }
            }
        )+
    };
}

impl_labeled!(
    GoalStatus,
    GoalKind,
    MemberStatus,
    MemberRole,
    TransactionKind,
    ReminderStatus,
    ReminderFrequency,
    ActivityKind,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    #[default]
    Created,
    Updated,
    Scheduled,
}

impl DateField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Scheduled => "scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "scheduled" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Overdue,
    HasDeadline,
    Shared,
    Recurring,
    Admin,
}

impl FlagKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::HasDeadline => "has_deadline",
            Self::Shared => "shared",
            Self::Recurring => "recurring",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "overdue" => Some(Self::Overdue),
            "has_deadline" => Some(Self::HasDeadline),
            "shared" => Some(Self::Shared),
            "recurring" => Some(Self::Recurring),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// A record that criteria can be evaluated against.
pub trait Filterable {
    type Status: Labeled + PartialEq;
    type Kind: Labeled + PartialEq;

    /// Fields searched by the free-text query.
    fn text_fields(&self) -> Vec<&str>;
    fn status(&self) -> Option<Self::Status>;
    fn kind(&self) -> Option<Self::Kind>;
    /// The numeric field constrained by `amount_min`/`amount_max`.
    fn amount_cents(&self) -> Option<i64>;
    fn timestamp(&self, field: DateField) -> Option<OffsetDateTime>;
    /// `None` means the flag does not exist for this record type.
    fn flag(&self, _flag: FlagKind, _as_of: Option<OffsetDateTime>) -> Option<bool> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Criteria<S, K> {
    pub query: Option<String>,
    pub status: Option<S>,
    pub kind: Option<K>,
    pub date_field: DateField,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_end: Option<OffsetDateTime>,
    pub amount_min: Option<i64>,
    pub amount_max: Option<i64>,
    pub flags: BTreeMap<FlagKind, bool>,
    /// Reference instant for time-relative flags such as `overdue`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub as_of: Option<OffsetDateTime>,
}

impl<S, K> Default for Criteria<S, K> {
    fn default() -> Self {
        Self {
            query: None,
            status: None,
            kind: None,
            date_field: DateField::Created,
            date_start: None,
            date_end: None,
            amount_min: None,
            amount_max: None,
            flags: BTreeMap::new(),
            as_of: None,
        }
    }
}

pub type GoalCriteria = Criteria<GoalStatus, GoalKind>;
pub type ReminderCriteria = Criteria<ReminderStatus, ReminderFrequency>;
pub type TransactionCriteria = Criteria<NotApplicable, TransactionKind>;
pub type ActivityCriteria = Criteria<NotApplicable, ActivityKind>;
pub type MemberCriteria = Criteria<MemberStatus, MemberRole>;
pub type UserCriteria = Criteria<NotApplicable, NotApplicable>;

impl<S, K> Criteria<S, K>
where
    S: Labeled + PartialEq,
    K: Labeled + PartialEq,
{
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_status(mut self, status: S) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(mut self, kind: K) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_amount_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.amount_min = min;
        self.amount_max = max;
        self
    }

    pub fn with_date_range(
        mut self,
        field: DateField,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
    ) -> Self {
        self.date_field = field;
        self.date_start = start;
        self.date_end = end;
        self
    }

    pub fn with_flag(mut self, flag: FlagKind, value: bool) -> Self {
        self.flags.insert(flag, value);
        self
    }

    pub fn as_of(mut self, instant: OffsetDateTime) -> Self {
        self.as_of = Some(instant);
        self
    }

    /// True when no field constrains the result.
    pub fn is_empty(&self) -> bool {
        self.normalized_query().is_none()
            && self.status.is_none()
            && self.kind.is_none()
            && self.date_start.is_none()
            && self.date_end.is_none()
            && self.amount_min.is_none()
            && self.amount_max.is_none()
            && self.flags.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Number of active constraints, for "filters (3)" style badges.
    pub fn active_count(&self) -> usize {
        usize::from(self.normalized_query().is_some())
            + usize::from(self.status.is_some())
            + usize::from(self.kind.is_some())
            + usize::from(self.date_start.is_some() || self.date_end.is_some())
            + usize::from(self.amount_min.is_some() || self.amount_max.is_some())
            + self.flags.len()
    }

    pub fn matches<T>(&self, item: &T) -> bool
    where
        T: Filterable<Status = S, Kind = K>,
    {
        self.matches_query(item)
            && self.status.is_none_or(|status| item.status() == Some(status))
            && self.kind.is_none_or(|kind| item.kind() == Some(kind))
            && self.matches_amount(item)
            && self.matches_dates(item)
            && self
                .flags
                .iter()
                .all(|(flag, wanted)| item.flag(*flag, self.as_of).unwrap_or(false) == *wanted)
    }

    fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .map(str::to_lowercase)
    }

    fn matches_query<T: Filterable>(&self, item: &T) -> bool {
        let Some(needle) = self.normalized_query() else {
            return true;
        };
        item.text_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    fn matches_amount<T: Filterable>(&self, item: &T) -> bool {
        if self.amount_min.is_none() && self.amount_max.is_none() {
            return true;
        }
        let Some(value) = item.amount_cents() else {
            return false;
        };
        self.amount_min.is_none_or(|min| value >= min)
            && self.amount_max.is_none_or(|max| value <= max)
    }

    fn matches_dates<T: Filterable>(&self, item: &T) -> bool {
        if self.date_start.is_none() && self.date_end.is_none() {
            return true;
        }
        let Some(value) = item.timestamp(self.date_field) else {
            return false;
        };
        self.date_start.is_none_or(|start| value >= start)
            && self.date_end.is_none_or(|end| value <= end)
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(query) = self.normalized_query() {
            pairs.push(("q".to_owned(), query));
        }
        if let Some(status) = self.status {
            pairs.push(("status".to_owned(), status.as_label().to_owned()));
        }
        if let Some(kind) = self.kind {
            pairs.push(("kind".to_owned(), kind.as_label().to_owned()));
        }
        if self.date_start.is_some() || self.date_end.is_some() {
            pairs.push(("date_field".to_owned(), self.date_field.as_str().to_owned()));
        }
        for (key, value) in [("from", self.date_start), ("to", self.date_end)] {
            if let Some(value) = value.and_then(|value| value.format(&Rfc3339).ok()) {
                pairs.push((key.to_owned(), value));
            }
        }
        if let Some(min) = self.amount_min {
            pairs.push(("min".to_owned(), min.to_string()));
        }
        if let Some(max) = self.amount_max {
            pairs.push(("max".to_owned(), max.to_string()));
        }
        for (flag, value) in &self.flags {
            pairs.push((format!("flag.{}", flag.as_str()), value.to_string()));
        }
        if let Some(as_of) = self.as_of.and_then(|value| value.format(&Rfc3339).ok()) {
            pairs.push(("as_of".to_owned(), as_of));
        }
        pairs
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_query_pairs())
            .finish()
    }

    /// Parse criteria from query-string pairs. Unknown keys are rejected.
    pub fn from_query_pairs<I, A, B>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut criteria = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "q" => criteria.query = Some(value.to_owned()),
                "status" => {
                    criteria.status = Some(
                        S::from_label(value)
                            .ok_or_else(|| anyhow!("unknown status filter {value:?}"))?,
                    );
                }
                "kind" => {
                    criteria.kind = Some(
                        K::from_label(value)
                            .ok_or_else(|| anyhow!("unknown kind filter {value:?}"))?,
                    );
                }
                "date_field" => {
                    criteria.date_field = DateField::parse(value)
                        .ok_or_else(|| anyhow!("unknown date field {value:?}"))?;
                }
                "from" => criteria.date_start = Some(parse_instant(key, value)?),
                "to" => criteria.date_end = Some(parse_instant(key, value)?),
                "as_of" => criteria.as_of = Some(parse_instant(key, value)?),
                "min" => criteria.amount_min = Some(parse_amount(key, value)?),
                "max" => criteria.amount_max = Some(parse_amount(key, value)?),
                other => {
                    let Some(flag) = other.strip_prefix("flag.") else {
                        bail!("unknown filter parameter {other:?}");
                    };
                    let flag = FlagKind::parse(flag)
                        .ok_or_else(|| anyhow!("unknown filter flag {flag:?}"))?;
                    let wanted = value
                        .parse::<bool>()
                        .map_err(|_| anyhow!("flag {other} must be true or false, got {value:?}"))?;
                    criteria.flags.insert(flag, wanted);
                }
            }
        }
        Ok(criteria)
    }

    pub fn from_query_string(raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        Self::from_query_pairs(form_urlencoded::parse(raw.as_bytes()))
    }
}

fn parse_instant(key: &str, value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|error| anyhow!("{key} must be an RFC 3339 timestamp, got {value:?}: {error}"))
}

fn parse_amount(key: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| anyhow!("{key} must be an integer amount in cents, got {value:?}"))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue {
    Time(OffsetDateTime),
    Cents(i64),
    Percent(f64),
}

impl SortValue {
    fn cmp_value(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Time(left), Self::Time(right)) => left.cmp(right),
            (Self::Cents(left), Self::Cents(right)) => left.cmp(right),
            (Self::Percent(left), Self::Percent(right)) => left.total_cmp(right),
            _ => Ordering::Equal,
        }
    }
}

pub trait Sortable {
    /// `None` when the record has no value for `field`; such records sort last.
    fn sort_value(&self, field: SortField) -> Option<SortValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Parse `field` or `field:direction`, for example `progress:desc`.
    pub fn parse(raw: &str) -> Result<Self> {
        let (field_raw, direction_raw) = raw.split_once(':').unwrap_or((raw, "asc"));
        let field = SortField::parse(field_raw.trim()).ok_or_else(|| {
            anyhow!("unknown sort field {field_raw:?}; use created, updated, progress, or target")
        })?;
        let direction = SortDirection::parse(direction_raw.trim())
            .ok_or_else(|| anyhow!("unknown sort direction {direction_raw:?}; use asc or desc"))?;
        Ok(Self { field, direction })
    }

    pub fn label(self) -> String {
        format!("{}:{}", self.field.as_str(), self.direction.as_str())
    }
}

/// Stable in-place sort. Ties keep their input order in both directions.
pub fn sort_stable<T: Sortable>(items: &mut [T], spec: SortSpec) {
    items.sort_by(|left, right| {
        match (left.sort_value(spec.field), right.sort_value(spec.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => match spec.direction {
                SortDirection::Asc => left.cmp_value(&right),
                SortDirection::Desc => left.cmp_value(&right).reverse(),
            },
        }
    });
}

pub fn filter_items<T>(items: &[T], criteria: &Criteria<T::Status, T::Kind>) -> Vec<T>
where
    T: Filterable + Clone,
{
    if criteria.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| criteria.matches(*item))
        .cloned()
        .collect()
}

/// Filter then optionally sort.
pub fn apply<T>(
    items: &[T],
    criteria: &Criteria<T::Status, T::Kind>,
    sort: Option<SortSpec>,
) -> Vec<T>
where
    T: Filterable + Sortable + Clone,
{
    let mut view = filter_items(items, criteria);
    if let Some(spec) = sort {
        sort_stable(&mut view, spec);
    }
    view
}

fn date_to_instant(date: time::Date) -> OffsetDateTime {
    date.midnight().assume_utc()
}

impl Filterable for Goal {
    type Status = GoalStatus;
    type Kind = GoalKind;

    fn text_fields(&self) -> Vec<&str> {
        vec![&self.title, &self.description, self.category.as_str()]
    }

    fn status(&self) -> Option<GoalStatus> {
        Some(self.status)
    }

    fn kind(&self) -> Option<GoalKind> {
        Some(self.kind)
    }

    fn amount_cents(&self) -> Option<i64> {
        Some(self.target_cents)
    }

    fn timestamp(&self, field: DateField) -> Option<OffsetDateTime> {
        match field {
            DateField::Created => Some(self.created_at),
            DateField::Updated => Some(self.updated_at),
            DateField::Scheduled => self.deadline.map(date_to_instant),
        }
    }

    fn flag(&self, flag: FlagKind, as_of: Option<OffsetDateTime>) -> Option<bool> {
        match flag {
            FlagKind::Overdue => Some(as_of.is_some_and(|now| self.is_overdue(now.date()))),
            FlagKind::HasDeadline => Some(self.deadline.is_some()),
            FlagKind::Shared => Some(self.shared),
            FlagKind::Recurring | FlagKind::Admin => None,
        }
    }
}

impl Sortable for Goal {
    fn sort_value(&self, field: SortField) -> Option<SortValue> {
        match field {
            SortField::Created => Some(SortValue::Time(self.created_at)),
            SortField::Updated => Some(SortValue::Time(self.updated_at)),
            SortField::Progress => self.progress_percent().map(SortValue::Percent),
            SortField::Target => Some(SortValue::Cents(self.target_cents)),
        }
    }
}

impl Filterable for Reminder {
    type Status = ReminderStatus;
    type Kind = ReminderFrequency;

    fn text_fields(&self) -> Vec<&str> {
        vec![&self.title]
    }

    fn status(&self) -> Option<ReminderStatus> {
        Some(self.status)
    }

    fn kind(&self) -> Option<ReminderFrequency> {
        Some(self.frequency)
    }

    fn amount_cents(&self) -> Option<i64> {
        None
    }

    fn timestamp(&self, field: DateField) -> Option<OffsetDateTime> {
        match field {
            DateField::Created => Some(self.created_at),
            DateField::Updated => Some(self.updated_at),
            DateField::Scheduled => Some(self.scheduled_for),
        }
    }

    fn flag(&self, flag: FlagKind, as_of: Option<OffsetDateTime>) -> Option<bool> {
        match flag {
            FlagKind::Overdue => Some(as_of.is_some_and(|now| self.is_overdue(now))),
            FlagKind::Recurring => Some(self.frequency != ReminderFrequency::Once),
            FlagKind::HasDeadline | FlagKind::Shared | FlagKind::Admin => None,
        }
    }
}

impl Sortable for Reminder {
    fn sort_value(&self, field: SortField) -> Option<SortValue> {
        match field {
            SortField::Created => Some(SortValue::Time(self.created_at)),
            SortField::Updated => Some(SortValue::Time(self.updated_at)),
            SortField::Progress | SortField::Target => None,
        }
    }
}

impl Filterable for Transaction {
    type Status = NotApplicable;
    type Kind = TransactionKind;

    fn text_fields(&self) -> Vec<&str> {
        vec![&self.note, &self.member_name]
    }

    fn status(&self) -> Option<NotApplicable> {
        None
    }

    fn kind(&self) -> Option<TransactionKind> {
        Some(self.kind)
    }

    fn amount_cents(&self) -> Option<i64> {
        Some(self.amount_cents)
    }

    fn timestamp(&self, field: DateField) -> Option<OffsetDateTime> {
        match field {
            DateField::Created | DateField::Updated => Some(self.created_at),
            DateField::Scheduled => Some(self.occurred_at),
        }
    }
}

impl Sortable for Transaction {
    fn sort_value(&self, field: SortField) -> Option<SortValue> {
        match field {
            SortField::Created | SortField::Updated => Some(SortValue::Time(self.occurred_at)),
            SortField::Target => Some(SortValue::Cents(self.amount_cents)),
            SortField::Progress => None,
        }
    }
}

impl Filterable for Activity {
    type Status = NotApplicable;
    type Kind = ActivityKind;

    fn text_fields(&self) -> Vec<&str> {
        vec![&self.summary]
    }

    fn status(&self) -> Option<NotApplicable> {
        None
    }

    fn kind(&self) -> Option<ActivityKind> {
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

impl Sortable for Activity {
    fn sort_value(&self, field: SortField) -> Option<SortValue> {
        match field {
            SortField::Created | SortField::Updated => Some(SortValue::Time(self.created_at)),
            SortField::Progress | SortField::Target => None,
        }
    }
}

impl Filterable for Member {
    type Status = MemberStatus;
    type Kind = MemberRole;

    fn text_fields(&self) -> Vec<&str> {
        vec![&self.name, &self.email]
    }

    fn status(&self) -> Option<MemberStatus> {
        Some(self.status)
    }

    fn kind(&self) -> Option<MemberRole> {
        Some(self.role)
    }

    fn amount_cents(&self) -> Option<i64> {
        None
    }

    fn timestamp(&self, field: DateField) -> Option<OffsetDateTime> {
        match field {
            DateField::Created | DateField::Updated => Some(self.joined_at),
            DateField::Scheduled => None,
        }
    }
}

impl Sortable for Member {
    fn sort_value(&self, field: SortField) -> Option<SortValue> {
        match field {
            SortField::Created | SortField::Updated => Some(SortValue::Time(self.joined_at)),
            SortField::Progress | SortField::Target => None,
        }
    }
}

impl Filterable for User {
    type Status = NotApplicable;
    type Kind = NotApplicable;

    fn text_fields(&self) -> Vec<&str> {
        vec![&self.name, &self.email]
    }

    fn status(&self) -> Option<NotApplicable> {
        None
    }

    fn kind(&self) -> Option<NotApplicable> {
        None
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

    fn flag(&self, flag: FlagKind, _as_of: Option<OffsetDateTime>) -> Option<bool> {
        match flag {
            FlagKind::Admin => Some(self.is_admin),
            _ => None,
        }
    }
}

impl Sortable for User {
    fn sort_value(&self, field: SortField) -> Option<SortValue> {
        match field {
            SortField::Created | SortField::Updated => Some(SortValue::Time(self.created_at)),
            SortField::Progress | SortField::Target => None,
        }
    }
}
