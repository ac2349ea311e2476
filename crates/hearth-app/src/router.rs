// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use url::form_urlencoded;

use crate::{GoalId, TabKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Goals,
    Goal(GoalId),
    NewGoal,
    EditGoal(GoalId),
    Reminders,
    Activity,
    Members,
    Search { query: String },
    Admin,
    Error { trace: String },
}

impl Route {
    pub fn search(query: impl Into<String>) -> Self {
        Self::Search {
            query: query.into(),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Dashboard => "/".to_owned(),
            Self::Goals => "/goals".to_owned(),
            Self::Goal(id) => format!("/goals/{}", id.get()),
            Self::NewGoal => "/goals/new".to_owned(),
            Self::EditGoal(id) => format!("/goals/{}/edit", id.get()),
            Self::Reminders => "/reminders".to_owned(),
            Self::Activity => "/activity".to_owned(),
            Self::Members => "/family".to_owned(),
            Self::Search { query } => format!("/search?q={}", encode(query)),
            Self::Admin => "/admin".to_owned(),
            Self::Error { trace } => format!("/error?trace={}", encode(trace)),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
        let segments = path
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();
        let param = |name: &str| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default()
        };
        let route = match segments.as_slice() {
            [] => Self::Dashboard,
            ["goals"] => Self::Goals,
            ["goals", "new"] => Self::NewGoal,
            ["goals", id] => Self::Goal(parse_goal_id(id)?),
            ["goals", id, "edit"] => Self::EditGoal(parse_goal_id(id)?),
            ["reminders"] => Self::Reminders,
            ["activity"] => Self::Activity,
            ["family"] => Self::Members,
            ["search"] => Self::Search {
                query: param("q"),
            },
            ["admin"] => Self::Admin,
            ["error"] => Self::Error {
                trace: param("trace"),
            },
            _ => bail!("no page at {raw:?}"),
        };
        Ok(route)
    }

    /// The tab that hosts this route, when there is one.
    pub const fn tab(&self) -> Option<TabKind> {
        match self {
            Self::Dashboard => Some(TabKind::Dashboard),
            Self::Goals | Self::Goal(_) | Self::NewGoal | Self::EditGoal(_) => {
                Some(TabKind::Goals)
            }
            Self::Reminders => Some(TabKind::Reminders),
            Self::Activity => Some(TabKind::Activity),
            Self::Members => Some(TabKind::Members),
            Self::Admin => Some(TabKind::Admin),
            Self::Search { .. } | Self::Error { .. } => None,
        }
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn parse_goal_id(raw: &str) -> Result<GoalId> {
    raw.parse::<i64>()
        .map(GoalId::new)
        .map_err(|_| anyhow!("goal id must be a number, got {raw:?}"))
}
