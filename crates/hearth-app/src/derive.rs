// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Memoized views over fetched collections. A view recomputes only when the
//! source `Arc` changes identity or the criteria/sort key changes value.

use std::sync::Arc;
use time::Date;
use tracing::debug;

use crate::filter::{Criteria, Filterable, SortSpec, Sortable, apply};
use crate::{Goal, GoalStatus};

struct MemoEntry<T, K, V> {
    source: Arc<Vec<T>>,
    key: K,
    value: Arc<V>,
}

pub struct Memo<T, K, V> {
    entry: Option<MemoEntry<T, K, V>>,
    recomputes: usize,
}

impl<T, K, V> Default for Memo<T, K, V> {
    fn default() -> Self {
        Self {
            entry: None,
            recomputes: 0,
        }
    }
}

impl<T, K, V> Memo<T, K, V>
where
    K: PartialEq + Clone,
{
    pub fn get_or_compute(
        &mut self,
        source: &Arc<Vec<T>>,
        key: &K,
        compute: impl FnOnce(&[T], &K) -> V,
    ) -> Arc<V> {
        let hit = self
            .entry
            .as_ref()
            .filter(|entry| Arc::ptr_eq(&entry.source, source) && entry.key == *key);
        if let Some(entry) = hit {
            return Arc::clone(&entry.value);
        }
        let value = Arc::new(compute(source, key));
        self.recomputes += 1;
        self.entry = Some(MemoEntry {
            source: Arc::clone(source),
            key: key.clone(),
            value: Arc::clone(&value),
        });
        value
    }

    pub const fn recomputes(&self) -> usize {
        self.recomputes
    }
}

type ViewKey<T> = (
    Criteria<<T as Filterable>::Status, <T as Filterable>::Kind>,
    Option<SortSpec>,
);

/// Filtered and sorted view of one collection.
pub struct FilteredView<T: Filterable> {
    memo: Memo<T, ViewKey<T>, Vec<T>>,
    empty: Arc<Vec<T>>,
}

impl<T: Filterable> Default for FilteredView<T> {
    fn default() -> Self {
        Self {
            memo: Memo::default(),
            empty: Arc::new(Vec::new()),
        }
    }
}

impl<T> FilteredView<T>
where
    T: Filterable + Sortable + Clone,
{
    /// `None` means the source is still loading; the view is then empty.
    pub fn get(
        &mut self,
        source: Option<&Arc<Vec<T>>>,
        criteria: &Criteria<T::Status, T::Kind>,
        sort: Option<SortSpec>,
    ) -> Arc<Vec<T>> {
        let Some(source) = source else {
            return Arc::clone(&self.empty);
        };
        let key = (criteria.clone(), sort);
        self.memo.get_or_compute(source, &key, |items, (criteria, sort)| {
            let view = apply(items, criteria, *sort);
            debug!(
                source = items.len(),
                visible = view.len(),
                "recomputed filtered view"
            );
            view
        })
    }

    pub const fn recomputes(&self) -> usize {
        self.memo.recomputes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DashboardSummary {
    pub active: usize,
    pub paused: usize,
    pub completed: usize,
    pub overdue: usize,
    pub total_saved_cents: i64,
    pub total_target_cents: i64,
}

impl DashboardSummary {
    pub fn from_goals(goals: &[Goal], today: Date) -> Self {
        let mut summary = Self::default();
        for goal in goals.iter().filter(|goal| goal.deleted_at.is_none()) {
            match goal.status {
                GoalStatus::Active => summary.active += 1,
                GoalStatus::Paused => summary.paused += 1,
                GoalStatus::Completed => summary.completed += 1,
                GoalStatus::Cancelled => continue,
            }
            if goal.is_overdue(today) {
                summary.overdue += 1;
            }
            summary.total_saved_cents += goal.current_cents;
            summary.total_target_cents += goal.target_cents.max(0);
        }
        summary
    }

    /// Saved over target across counted goals; `None` without any target.
    pub fn overall_progress(&self) -> Option<f64> {
        if self.total_target_cents <= 0 {
            return None;
        }
        Some(self.total_saved_cents as f64 / self.total_target_cents as f64 * 100.0)
    }
}

#[derive(Default)]
pub struct SummaryView {
    memo: Memo<Goal, Date, DashboardSummary>,
}

impl SummaryView {
    pub fn get(&mut self, goals: Option<&Arc<Vec<Goal>>>, today: Date) -> DashboardSummary {
        let Some(goals) = goals else {
            return DashboardSummary::default();
        };
        *self
            .memo
            .get_or_compute(goals, &today, |goals, today| {
                DashboardSummary::from_goals(goals, *today)
            })
    }

    pub const fn recomputes(&self) -> usize {
        self.memo.recomputes()
    }
}
