// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::errors::Notice;
use crate::filter::{FlagKind, GoalCriteria, ReminderCriteria, SortSpec};
use crate::permissions::Permission;
use crate::{AppMode, FormKind, GoalStatus, MemberRole, Route, SortDirection, SortField, TabKind};

/// Order the goal list sort key cycles through; `None` keeps fetch order.
pub const GOAL_SORT_CYCLE: [Option<SortSpec>; 6] = [
    None,
    Some(SortSpec::new(SortField::Created, SortDirection::Desc)),
    Some(SortSpec::new(SortField::Updated, SortDirection::Desc)),
    Some(SortSpec::new(SortField::Progress, SortDirection::Desc)),
    Some(SortSpec::new(SortField::Progress, SortDirection::Asc)),
    Some(SortSpec::new(SortField::Target, SortDirection::Desc)),
];

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: TabKind,
    pub route: Route,
    pub role: MemberRole,
    pub is_admin: bool,
    pub goal_criteria: GoalCriteria,
    pub goal_sort: Option<SortSpec>,
    pub reminder_criteria: ReminderCriteria,
    pub notice: Option<Notice>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_tab: TabKind::Dashboard,
            route: Route::Dashboard,
            role: MemberRole::Viewer,
            is_admin: false,
            goal_criteria: GoalCriteria::default(),
            goal_sort: None,
            reminder_criteria: ReminderCriteria::default(),
            notice: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    Navigate(Route),
    FocusSearch,
    ExitToNav,
    OpenForm(FormKind),
    SetGoalStatus(Option<GoalStatus>),
    ToggleGoalFlag(FlagKind),
    SetGoalQuery(String),
    CycleGoalSort,
    ToggleOverdueReminders,
    ClearFilters,
    ShowNotice(Notice),
    ClearNotice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(TabKind),
    RouteChanged(Route),
    FiltersChanged,
    SortChanged(Option<SortSpec>),
    NoticeShown(Notice),
    NoticeCleared,
}

impl AppState {
    pub fn for_role(role: MemberRole, is_admin: bool) -> Self {
        Self {
            role,
            is_admin,
            ..Self::default()
        }
    }

    pub fn visible_tabs(&self) -> Vec<TabKind> {
        TabKind::ALL
            .into_iter()
            .filter(|tab| *tab != TabKind::Admin || self.is_admin)
            .collect()
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::Navigate(route) => self.navigate(route),
            AppCommand::FocusSearch => {
                self.mode = AppMode::Search;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenForm(kind) => match self.form_permission(kind) {
                Ok(()) => {
                    self.mode = AppMode::Form(kind);
                    vec![AppEvent::ModeChanged(self.mode)]
                }
                Err(message) => vec![self.show_notice(Notice::warning(message))],
            },
            AppCommand::SetGoalStatus(status) => {
                self.goal_criteria.status = status;
                vec![AppEvent::FiltersChanged]
            }
            AppCommand::ToggleGoalFlag(flag) => {
                // Absent -> required -> excluded -> absent.
                match self.goal_criteria.flags.get(&flag).copied() {
                    None => {
                        self.goal_criteria.flags.insert(flag, true);
                    }
                    Some(true) => {
                        self.goal_criteria.flags.insert(flag, false);
                    }
                    Some(false) => {
                        self.goal_criteria.flags.remove(&flag);
                    }
                }
                vec![AppEvent::FiltersChanged]
            }
            AppCommand::SetGoalQuery(query) => {
                self.goal_criteria.query = Some(query).filter(|query| !query.trim().is_empty());
                vec![AppEvent::FiltersChanged]
            }
            AppCommand::CycleGoalSort => {
                let current = GOAL_SORT_CYCLE
                    .iter()
                    .position(|spec| *spec == self.goal_sort)
                    .unwrap_or(0);
                self.goal_sort = GOAL_SORT_CYCLE[(current + 1) % GOAL_SORT_CYCLE.len()];
                vec![AppEvent::SortChanged(self.goal_sort)]
            }
            AppCommand::ToggleOverdueReminders => {
                if self.reminder_criteria.flags.remove(&FlagKind::Overdue).is_none() {
                    self.reminder_criteria.flags.insert(FlagKind::Overdue, true);
                }
                vec![AppEvent::FiltersChanged]
            }
            AppCommand::ClearFilters => {
                self.goal_criteria.clear();
                self.reminder_criteria.clear();
                vec![AppEvent::FiltersChanged]
            }
            AppCommand::ShowNotice(notice) => vec![self.show_notice(notice)],
            AppCommand::ClearNotice => {
                self.notice = None;
                vec![AppEvent::NoticeCleared]
            }
        }
    }

    fn navigate(&mut self, route: Route) -> Vec<AppEvent> {
        if route == Route::Admin && !self.is_admin {
            return vec![self.show_notice(Notice::warning(
                "the admin area is limited to site admins",
            ))];
        }
        let mut events = Vec::new();
        if let Some(tab) = route.tab()
            && tab != self.active_tab
        {
            self.active_tab = tab;
            events.push(AppEvent::TabChanged(tab));
        }
        if self.mode != AppMode::Nav {
            self.mode = AppMode::Nav;
            events.push(AppEvent::ModeChanged(self.mode));
        }
        self.route = route.clone();
        events.push(AppEvent::RouteChanged(route));
        events
    }

    fn form_permission(&self, kind: FormKind) -> Result<(), String> {
        let permission = match kind {
            FormKind::GoalWizard | FormKind::GoalEdit(_) => Permission::EditGoal,
            FormKind::Contribution => Permission::Contribute,
            FormKind::Reminder => Permission::ManageReminders,
            FormKind::Invite => Permission::InviteMembers,
            FormKind::Broadcast => {
                return if self.is_admin {
                    Ok(())
                } else {
                    Err("broadcasts are limited to site admins".to_owned())
                };
            }
        };
        self.role
            .require(permission)
            .map_err(|error| error.to_string())
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = self.visible_tabs();
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        self.route = tab_route(self.active_tab);
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn show_notice(&mut self, notice: Notice) -> AppEvent {
        self.notice = Some(notice.clone());
        AppEvent::NoticeShown(notice)
    }
}

pub const fn tab_route(tab: TabKind) -> Route {
    match tab {
        TabKind::Dashboard => Route::Dashboard,
        TabKind::Goals => Route::Goals,
        TabKind::Reminders => Route::Reminders,
        TabKind::Activity => Route::Activity,
        TabKind::Members => Route::Members,
        TabKind::Admin => Route::Admin,
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState};
    use crate::errors::NoticeLevel;
    use crate::filter::{FlagKind, SortSpec};
    use crate::{
        AppMode, FormKind, GoalStatus, MemberRole, Route, SortDirection, SortField, TabKind,
    };

    #[test]
    fn tab_rotation_wraps_and_skips_admin_for_members() {
        let mut state = AppState {
            active_tab: TabKind::Members,
            ..AppState::for_role(MemberRole::Owner, false)
        };

        let events = state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, TabKind::Dashboard);
        assert_eq!(events, vec![AppEvent::TabChanged(TabKind::Dashboard)]);

        let mut admin = AppState {
            active_tab: TabKind::Members,
            ..AppState::for_role(MemberRole::Owner, true)
        };
        admin.dispatch(AppCommand::NextTab);
        assert_eq!(admin.active_tab, TabKind::Admin);
        assert_eq!(admin.route, Route::Admin);
    }

    #[test]
    fn navigation_switches_tab_and_returns_to_nav() {
        let mut state = AppState::for_role(MemberRole::Owner, false);
        state.dispatch(AppCommand::FocusSearch);
        let events = state.dispatch(AppCommand::Navigate(Route::search("bike")));
        assert_eq!(
            events,
            vec![
                AppEvent::ModeChanged(AppMode::Nav),
                AppEvent::RouteChanged(Route::search("bike")),
            ]
        );

        state.dispatch(AppCommand::Navigate(Route::Reminders));
        assert_eq!(state.active_tab, TabKind::Reminders);
    }

    #[test]
    fn admin_route_is_refused_for_non_admins() {
        let mut state = AppState::for_role(MemberRole::Owner, false);
        state.dispatch(AppCommand::Navigate(Route::Admin));
        assert_eq!(state.route, Route::Dashboard);
        assert_eq!(
            state.notice.as_ref().map(|notice| notice.level),
            Some(NoticeLevel::Warning)
        );
    }

    #[test]
    fn forms_open_only_with_permission() {
        let mut viewer = AppState::for_role(MemberRole::Viewer, false);
        viewer.dispatch(AppCommand::OpenForm(FormKind::Contribution));
        assert_eq!(viewer.mode, AppMode::Nav);
        assert!(
            viewer
                .notice
                .as_ref()
                .is_some_and(|notice| notice.message.contains("cannot contribute"))
        );

        let mut contributor = AppState::for_role(MemberRole::Contributor, false);
        contributor.dispatch(AppCommand::OpenForm(FormKind::Contribution));
        assert_eq!(contributor.mode, AppMode::Form(FormKind::Contribution));

        let mut owner = AppState::for_role(MemberRole::Owner, false);
        owner.dispatch(AppCommand::OpenForm(FormKind::Broadcast));
        assert_eq!(owner.mode, AppMode::Nav);
    }

    #[test]
    fn flag_toggle_cycles_through_three_states() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::ToggleGoalFlag(FlagKind::Shared));
        assert_eq!(state.goal_criteria.flags.get(&FlagKind::Shared), Some(&true));
        state.dispatch(AppCommand::ToggleGoalFlag(FlagKind::Shared));
        assert_eq!(state.goal_criteria.flags.get(&FlagKind::Shared), Some(&false));
        state.dispatch(AppCommand::ToggleGoalFlag(FlagKind::Shared));
        assert!(state.goal_criteria.is_empty());
    }

    #[test]
    fn sort_cycle_wraps_back_to_fetch_order() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::CycleGoalSort);
        assert_eq!(
            events,
            vec![AppEvent::SortChanged(Some(SortSpec::new(
                SortField::Created,
                SortDirection::Desc
            )))]
        );
        for _ in 0..5 {
            state.dispatch(AppCommand::CycleGoalSort);
        }
        assert_eq!(state.goal_sort, None);
    }

    #[test]
    fn clear_filters_resets_all_criteria() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::SetGoalStatus(Some(GoalStatus::Active)));
        state.dispatch(AppCommand::SetGoalQuery("bike".to_owned()));
        state.dispatch(AppCommand::ToggleOverdueReminders);
        assert_eq!(state.goal_criteria.active_count(), 2);

        state.dispatch(AppCommand::ClearFilters);
        assert!(state.goal_criteria.is_empty());
        assert!(state.reminder_criteria.is_empty());
    }
}
