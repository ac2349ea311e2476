// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use hearth_app::derive::{DashboardSummary, FilteredView, SummaryView};
use hearth_app::search::{DropdownEntry, DropdownState, SearchConfig, SearchDropdown, SearchEffect, SearchKey};
use hearth_app::validation::{
    format_cents, format_compact_cents, format_date, format_percent, parse_optional_date,
    parse_required_cents, validate_email,
};
use hearth_app::wizard::{DEFAULT_AUTOSAVE, GoalWizard, WizardMode, WizardStep};
use hearth_app::{
    Activity, AppCommand, AppEvent, AppMode, AppState, Broadcast, BroadcastAudience, DraftStore,
    ErrorReporter, FlagKind, FormKind, FormPayload, Goal, GoalCategory, GoalCriteria, GoalDraft,
    GoalFormInput, GoalId, GoalKind, GoalStatus, InviteDraft, Member, MemberRole, Notice,
    NoticeLevel, Permission, Reminder, ReminderCriteria, ReminderFrequency, ReminderId,
    ReminderStatus, Route, SaveOutcome, SearchHit, SortSpec, TabKind, Transaction,
    TransactionKind, User, tab_route,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::macros::{format_description, time};
use time::{Date, OffsetDateTime};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const NOTICE_TTL: Duration = Duration::from_secs(4);
const DEFAULT_ACTIVITY_LIMIT: usize = 50;
const LIST_BAR_WIDTH: usize = 10;
const DETAIL_BAR_WIDTH: usize = 30;
const UPCOMING_REMINDERS: usize = 5;
const REMINDER_TIME: time::Time = time!(9:00);
const STATUS_FILTER_CYCLE: [Option<GoalStatus>; 5] = [
    None,
    Some(GoalStatus::Active),
    Some(GoalStatus::Paused),
    Some(GoalStatus::Completed),
    Some(GoalStatus::Cancelled),
];

/// Timing knobs the terminal loop hands to its controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub search: SearchConfig,
    pub autosave: Duration,
    pub activity_limit: usize,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            autosave: DEFAULT_AUTOSAVE,
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminSnapshot {
    pub users: Vec<User>,
    pub broadcasts: Vec<Broadcast>,
}

/// Everything the terminal UI needs from a backend. Methods take `&self` so
/// a wizard submit can borrow the draft store and the mutation together.
pub trait AppRuntime {
    fn load_goals(&self, criteria: &GoalCriteria) -> Result<Vec<Goal>>;
    fn load_goal(&self, goal_id: GoalId) -> Result<Goal>;
    fn load_transactions(&self, goal_id: GoalId) -> Result<Vec<Transaction>>;
    fn load_reminders(&self, criteria: &ReminderCriteria) -> Result<Vec<Reminder>>;
    fn load_activities(&self, limit: usize) -> Result<Vec<Activity>>;
    fn load_members(&self) -> Result<Vec<Member>>;
    fn load_admin(&self) -> Result<AdminSnapshot>;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
    fn save_goal(&self, mode: WizardMode, input: &GoalFormInput) -> Result<Goal>;
    fn delete_goal(&self, goal_id: GoalId) -> Result<()>;
    fn submit_form(&self, payload: &FormPayload) -> Result<()>;
    fn dismiss_reminder(&self, reminder_id: ReminderId) -> Result<Reminder>;
    fn draft_store(&self) -> &dyn DraftStore;
    /// HTTP-style status behind a failure, when the backend has one.
    fn error_status(&self, _error: &anyhow::Error) -> Option<u16> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearNotice { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GoalDetail {
    goal: Goal,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WizardField {
    Title,
    Description,
    Kind,
    Category,
    Target,
    Deadline,
    Shared,
    Status,
    InviteName,
    InviteEmail,
    InviteRole,
}

impl WizardField {
    const fn label(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Kind => "kind",
            Self::Category => "category",
            Self::Target => "target $",
            Self::Deadline => "deadline",
            Self::Shared => "shared",
            Self::Status => "status",
            Self::InviteName => "invite name",
            Self::InviteEmail => "invite email",
            Self::InviteRole => "invite role",
        }
    }

    const fn is_choice(self) -> bool {
        matches!(
            self,
            Self::Kind | Self::Category | Self::Shared | Self::Status | Self::InviteRole
        )
    }
}

const fn wizard_fields(step: WizardStep, mode: WizardMode) -> &'static [WizardField] {
    match (step, mode) {
        (WizardStep::Basics, _) => &[
            WizardField::Title,
            WizardField::Description,
            WizardField::Kind,
            WizardField::Category,
        ],
        (WizardStep::Target, WizardMode::Create) => &[
            WizardField::Target,
            WizardField::Deadline,
            WizardField::Shared,
        ],
        (WizardStep::Target, WizardMode::Edit(_)) => &[
            WizardField::Target,
            WizardField::Deadline,
            WizardField::Shared,
            WizardField::Status,
        ],
        (WizardStep::Members, _) => &[
            WizardField::InviteName,
            WizardField::InviteEmail,
            WizardField::InviteRole,
        ],
        (WizardStep::Review | WizardStep::Submitted, _) => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldEdit {
    Push(char),
    Pop,
    Cycle(isize),
}

#[derive(Debug)]
struct WizardUiState {
    wizard: GoalWizard,
    field_index: usize,
}

impl WizardUiState {
    fn current_field(&self) -> Option<WizardField> {
        wizard_fields(self.wizard.step(), self.wizard.mode())
            .get(self.field_index)
            .copied()
    }

    fn move_field(&mut self, delta: isize) {
        let count = wizard_fields(self.wizard.step(), self.wizard.mode()).len();
        if count == 0 {
            self.field_index = 0;
            return;
        }
        self.field_index = (self.field_index as isize + delta).rem_euclid(count as isize) as usize;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue {
    Text(String),
    Choice {
        options: Vec<&'static str>,
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormField {
    label: &'static str,
    value: FieldValue,
}

impl FormField {
    fn text(label: &'static str) -> Self {
        Self {
            label,
            value: FieldValue::Text(String::new()),
        }
    }

    fn choice(label: &'static str, options: Vec<&'static str>) -> Self {
        Self {
            label,
            value: FieldValue::Choice { options, index: 0 },
        }
    }

    fn as_text(&self) -> &str {
        match &self.value {
            FieldValue::Text(text) => text,
            FieldValue::Choice { options, index } => options.get(*index).copied().unwrap_or(""),
        }
    }

    fn apply(&mut self, edit: FieldEdit) {
        match (&mut self.value, edit) {
            (FieldValue::Text(text), FieldEdit::Push(ch)) => text.push(ch),
            (FieldValue::Text(text), FieldEdit::Pop) => {
                text.pop();
            }
            (FieldValue::Choice { options, index }, FieldEdit::Cycle(delta)) if !options.is_empty() => {
                *index = (*index as isize + delta).rem_euclid(options.len() as isize) as usize;
            }
            (FieldValue::Choice { options, index }, FieldEdit::Push(' ')) if !options.is_empty() => {
                *index = (*index + 1) % options.len();
            }
            _ => {}
        }
    }
}

/// Single-step forms: contributions, reminders, invites and broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    kind: FormKind,
    goal: Option<(GoalId, String)>,
    fields: Vec<FormField>,
    field_index: usize,
    error: Option<String>,
}

impl FormUiState {
    fn new(kind: FormKind, goal: Option<&Goal>, role: MemberRole) -> Option<Self> {
        let fields = match kind {
            FormKind::Contribution => vec![
                FormField::choice("type", labels(TransactionKind::ALL, TransactionKind::as_str)),
                FormField::text("amount $"),
                FormField::text("note"),
            ],
            FormKind::Reminder => vec![
                FormField::text("title"),
                FormField::choice("repeats", labels(ReminderFrequency::ALL, ReminderFrequency::as_str)),
                FormField::text("date"),
            ],
            FormKind::Invite => vec![
                FormField::text("name"),
                FormField::text("email"),
                FormField::choice("role", labels(role.assignable_roles(), MemberRole::as_str)),
            ],
            FormKind::Broadcast => vec![
                FormField::text("title"),
                FormField::text("message"),
                FormField::choice("audience", labels(BroadcastAudience::ALL, BroadcastAudience::as_str)),
            ],
            FormKind::GoalWizard | FormKind::GoalEdit(_) => return None,
        };
        Some(Self {
            kind,
            goal: goal.map(|goal| (goal.id, goal.title.clone())),
            fields,
            field_index: 0,
            error: None,
        })
    }

    fn value(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .map_or("", FormField::as_text)
    }

    fn move_field(&mut self, delta: isize) {
        let count = self.fields.len().max(1) as isize;
        self.field_index = (self.field_index as isize + delta).rem_euclid(count) as usize;
    }

    fn apply(&mut self, edit: FieldEdit) {
        if let Some(field) = self.fields.get_mut(self.field_index) {
            field.apply(edit);
            self.error = None;
        }
    }

    fn to_payload(&self, now: OffsetDateTime) -> Result<FormPayload> {
        let mut payload = FormPayload::blank_for(self.kind, now)
            .ok_or_else(|| anyhow!("goal forms use the wizard"))?;
        match &mut payload {
            FormPayload::Contribution(input) => {
                let (goal_id, _) = self
                    .goal
                    .as_ref()
                    .ok_or_else(|| anyhow!("choose a goal before recording money"))?;
                input.goal_id = *goal_id;
                input.kind =
                    TransactionKind::parse(self.value("type")).unwrap_or(TransactionKind::Contribution);
                input.amount_cents = parse_required_cents(self.value("amount $"))
                    .map_err(|error| anyhow!("amount: {error} -- enter dollars like 25 or 25.50"))?;
                input.note = self.value("note").trim().to_owned();
            }
            FormPayload::Reminder(input) => {
                input.goal_id = self.goal.as_ref().map(|(goal_id, _)| *goal_id);
                input.title = self.value("title").trim().to_owned();
                input.frequency =
                    ReminderFrequency::parse(self.value("repeats")).unwrap_or(ReminderFrequency::Once);
                let date = parse_optional_date(self.value("date"))
                    .map_err(|_| anyhow!("reminder date must look like 2026-12-31"))?;
                if let Some(date) = date {
                    input.scheduled_for = date.with_time(REMINDER_TIME).assume_utc();
                }
            }
            FormPayload::Invite(input) => {
                input.name = self.value("name").trim().to_owned();
                input.email = validate_email(self.value("email")).map_err(|_| {
                    anyhow!(
                        "invite email {:?} is not a valid address",
                        self.value("email").trim()
                    )
                })?;
                input.role = MemberRole::parse(self.value("role"))
                    .ok_or_else(|| anyhow!("your role cannot hand out invites"))?;
            }
            FormPayload::Broadcast(input) => {
                input.title = self.value("title").trim().to_owned();
                input.body = self.value("message").trim().to_owned();
                input.audience =
                    BroadcastAudience::parse(self.value("audience")).unwrap_or(BroadcastAudience::All);
            }
        }
        payload.validate()?;
        Ok(payload)
    }
}

fn labels<T: Copy>(items: &[T], label: fn(T) -> &'static str) -> Vec<&'static str> {
    items.iter().copied().map(label).collect()
}

struct VisibleRows {
    goals: Arc<Vec<Goal>>,
    reminders: Arc<Vec<Reminder>>,
    summary: DashboardSummary,
}

struct TableProjection {
    title: String,
    columns: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

struct ViewData {
    options: UiOptions,
    goals: Option<Arc<Vec<Goal>>>,
    reminders: Option<Arc<Vec<Reminder>>>,
    activities: Vec<Activity>,
    members: Vec<Member>,
    admin: AdminSnapshot,
    detail: Option<GoalDetail>,
    search_page: Vec<SearchHit>,
    goal_view: FilteredView<Goal>,
    reminder_view: FilteredView<Reminder>,
    summary: SummaryView,
    search: SearchDropdown,
    wizard: Option<WizardUiState>,
    form: Option<FormUiState>,
    reporter: ErrorReporter,
    cursor: usize,
    help_visible: bool,
    notice_token: u64,
}

impl ViewData {
    fn new(options: UiOptions) -> Self {
        Self {
            options,
            goals: None,
            reminders: None,
            activities: Vec::new(),
            members: Vec::new(),
            admin: AdminSnapshot::default(),
            detail: None,
            search_page: Vec::new(),
            goal_view: FilteredView::default(),
            reminder_view: FilteredView::default(),
            summary: SummaryView::default(),
            search: SearchDropdown::new(options.search),
            wizard: None,
            form: None,
            reporter: ErrorReporter::default(),
            cursor: 0,
            help_visible: false,
            notice_token: 0,
        }
    }

    fn visible(&mut self, state: &AppState, today: Date) -> VisibleRows {
        VisibleRows {
            goals: self
                .goal_view
                .get(self.goals.as_ref(), &state.goal_criteria, state.goal_sort),
            reminders: self
                .reminder_view
                .get(self.reminders.as_ref(), &state.reminder_criteria, None),
            summary: self.summary.get(self.goals.as_ref(), today),
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &R, options: UiOptions) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(options);
    let (internal_tx, internal_rx) = mpsc::channel();
    refresh_or_report(state, runtime, &mut view_data, &internal_tx, Instant::now());

    let result = event_loop(
        state,
        runtime,
        &mut view_data,
        &internal_tx,
        &internal_rx,
        |state, view_data, visible| {
            terminal
                .draw(|frame| render(frame, state, view_data, visible))
                .map(|_| ())
                .context("draw frame")
        },
        next_key,
    );

    if view_data.wizard.is_some() {
        close_wizard(state, runtime, &mut view_data, &internal_tx, Instant::now());
    }
    view_data.search.unmount();

    let raw_restored = disable_raw_mode().context("disable raw mode");
    let screen_restored =
        execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen");
    result.and(raw_restored).and(screen_restored)
}

/// Runs until a quit key or the first draw/input failure. Terminal setup and
/// teardown stay with the caller.
fn event_loop<R, D, K>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    internal_rx: &Receiver<InternalEvent>,
    mut draw: D,
    mut next_key: K,
) -> Result<()>
where
    R: AppRuntime,
    D: FnMut(&AppState, &ViewData, &VisibleRows) -> Result<()>,
    K: FnMut() -> Result<Option<KeyEvent>>,
{
    loop {
        let now = Instant::now();
        process_internal_events(state, view_data, internal_rx);
        tick_controllers(state, runtime, view_data, internal_tx, now);

        let visible = view_data.visible(state, today());
        draw(state, view_data, &visible)?;

        if let Some(key) = next_key()?
            && handle_key_event(state, runtime, view_data, internal_tx, key, Instant::now())
        {
            return Ok(());
        }
    }
}

fn next_key() -> Result<Option<KeyEvent>> {
    if !event::poll(POLL_INTERVAL).context("poll event")? {
        return Ok(None);
    }
    match event::read().context("read event")? {
        Event::Key(key) => Ok(Some(key)),
        _ => Ok(None),
    }
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearNotice { token } if token == view_data.notice_token => {
                state.dispatch(AppCommand::ClearNotice);
            }
            InternalEvent::ClearNotice { .. } => {}
        }
    }
}

/// Drives the clock-based controllers: search debounce and blur grace,
/// wizard autosave, and the error page redirect.
fn tick_controllers<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let effects = view_data.search.tick(now);
    apply_search_effects(state, runtime, view_data, internal_tx, effects, now);

    let outcome = match view_data.wizard.as_mut() {
        Some(ui) => ui.wizard.tick(runtime.draft_store(), now),
        None => Ok(None),
    };
    handle_draft_outcome(state, runtime, view_data, internal_tx, outcome, now);

    if let Some(route) = view_data.reporter.tick(now) {
        navigate(state, runtime, view_data, internal_tx, route, now);
    }
}

fn schedule_notice_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(NOTICE_TTL);
        let _ = sender.send(InternalEvent::ClearNotice { token });
    });
}

/// Dispatches and arms the auto-clear for any non-error notice it raises.
fn dispatch_command(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) -> Vec<AppEvent> {
    let events = state.dispatch(command);
    for event in &events {
        if let AppEvent::NoticeShown(notice) = event {
            view_data.notice_token = view_data.notice_token.saturating_add(1);
            if notice.level != NoticeLevel::Error {
                schedule_notice_clear(internal_tx, view_data.notice_token);
            }
        }
    }
    events
}

fn show_notice(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    notice: Notice,
) {
    dispatch_command(state, view_data, internal_tx, AppCommand::ShowNotice(notice));
}

fn report_failure<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    context: &str,
    error: anyhow::Error,
    now: Instant,
) {
    let status = runtime.error_status(&error);
    let report = view_data
        .reporter
        .report(status, format!("{context}: {error:#}"), now);
    show_notice(state, view_data, internal_tx, report.notice());
}

fn handle_draft_outcome<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    outcome: Result<Option<SaveOutcome>>,
    now: Instant,
) {
    match outcome {
        Ok(Some(SaveOutcome::Conflict(conflict))) => show_notice(
            state,
            view_data,
            internal_tx,
            Notice::warning(format!(
                "{conflict} -- ctrl+t loads the saved copy, ctrl+k keeps yours"
            )),
        ),
        Ok(_) => {}
        Err(error) => report_failure(
            state,
            runtime,
            view_data,
            internal_tx,
            "save draft",
            error,
            now,
        ),
    }
}

fn refresh_view_data<R: AppRuntime>(
    state: &AppState,
    runtime: &R,
    view_data: &mut ViewData,
) -> Result<()> {
    match &state.route {
        Route::Goal(goal_id) => {
            let goal = runtime.load_goal(*goal_id)?;
            let transactions = runtime.load_transactions(*goal_id)?;
            view_data.detail = Some(GoalDetail { goal, transactions });
            return Ok(());
        }
        Route::Search { query } => {
            view_data.search_page = runtime.search(query, view_data.options.search.max_results)?;
            return Ok(());
        }
        Route::Error { .. } => return Ok(()),
        _ => {}
    }

    view_data.detail = None;
    match state.active_tab {
        TabKind::Dashboard => {
            view_data.goals = Some(Arc::new(runtime.load_goals(&GoalCriteria::default())?));
            view_data.reminders = Some(Arc::new(
                runtime.load_reminders(&ReminderCriteria::default())?,
            ));
        }
        TabKind::Goals => {
            view_data.goals = Some(Arc::new(runtime.load_goals(&GoalCriteria::default())?));
        }
        TabKind::Reminders => {
            view_data.reminders = Some(Arc::new(
                runtime.load_reminders(&ReminderCriteria::default())?,
            ));
            if view_data.goals.is_none() {
                view_data.goals = Some(Arc::new(runtime.load_goals(&GoalCriteria::default())?));
            }
        }
        TabKind::Activity => {
            view_data.activities = runtime.load_activities(view_data.options.activity_limit)?;
        }
        TabKind::Members => {
            view_data.members = runtime.load_members()?;
        }
        TabKind::Admin => {
            view_data.admin = runtime.load_admin()?;
        }
    }
    Ok(())
}

fn refresh_or_report<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    if let Err(error) = refresh_view_data(state, runtime, view_data) {
        let context = format!("load {}", state.route.path());
        report_failure(state, runtime, view_data, internal_tx, &context, error, now);
    }
}

fn navigate<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    route: Route,
    now: Instant,
) {
    match route {
        Route::NewGoal => {
            open_wizard(state, runtime, view_data, internal_tx, FormKind::GoalWizard, now);
            return;
        }
        Route::EditGoal(goal_id) => {
            open_wizard(
                state,
                runtime,
                view_data,
                internal_tx,
                FormKind::GoalEdit(goal_id),
                now,
            );
            return;
        }
        _ => {}
    }
    let events = dispatch_command(state, view_data, internal_tx, AppCommand::Navigate(route));
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::RouteChanged(_)))
    {
        view_data.cursor = 0;
        refresh_or_report(state, runtime, view_data, internal_tx, now);
    }
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
    now: Instant,
) {
    dispatch_command(state, view_data, internal_tx, command);
    view_data.cursor = 0;
    refresh_or_report(state, runtime, view_data, internal_tx, now);
}

fn apply_search_effects<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    effects: Vec<SearchEffect>,
    now: Instant,
) {
    for effect in effects {
        match effect {
            SearchEffect::IssueQuery { request_id, query } => {
                let outcome = runtime.search(&query, view_data.options.search.max_results);
                view_data.search.resolve(request_id, outcome);
            }
            SearchEffect::Selected(entry) => {
                debug!(label = entry.label(), "search entry selected");
            }
            SearchEffect::Analytics { query, index } => {
                debug!(%query, index, "search selection");
            }
            SearchEffect::Navigate(route) => {
                navigate(state, runtime, view_data, internal_tx, route, now);
            }
            SearchEffect::Blur => {
                dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
            }
        }
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    now: Instant,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::Search => handle_search_key(state, runtime, view_data, internal_tx, key, now),
        AppMode::Form(FormKind::GoalWizard | FormKind::GoalEdit(_)) => {
            handle_wizard_key(state, runtime, view_data, internal_tx, key, now);
        }
        AppMode::Form(_) => handle_form_key(state, runtime, view_data, internal_tx, key, now),
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key, now),
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    now: Instant,
) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return;
    }
    match key.code {
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('f') | KeyCode::Tab => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::NextTab, now);
        }
        KeyCode::Char('b') | KeyCode::BackTab => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::PrevTab, now);
        }
        KeyCode::Char('/') => {
            dispatch_command(state, view_data, internal_tx, AppCommand::FocusSearch);
            view_data.search.focus(now);
        }
        KeyCode::Char('j') | KeyCode::Down => move_cursor(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(state, view_data, -1),
        KeyCode::Char('g') => view_data.cursor = 0,
        KeyCode::Char('G') => {
            view_data.cursor = row_count(state, view_data).saturating_sub(1);
        }
        KeyCode::Enter => open_selected(state, runtime, view_data, internal_tx, now),
        KeyCode::Esc => {
            if matches!(
                state.route,
                Route::Goal(_) | Route::Search { .. } | Route::Error { .. }
            ) {
                let route = tab_route(state.active_tab);
                navigate(state, runtime, view_data, internal_tx, route, now);
            } else {
                dispatch_command(state, view_data, internal_tx, AppCommand::ClearNotice);
            }
        }
        KeyCode::Char('R') => {
            if matches!(state.route, Route::Error { .. }) {
                let route = tab_route(state.active_tab);
                navigate(state, runtime, view_data, internal_tx, route, now);
            } else {
                refresh_or_report(state, runtime, view_data, internal_tx, now);
            }
        }
        KeyCode::Char('n') => {
            open_wizard(state, runtime, view_data, internal_tx, FormKind::GoalWizard, now);
        }
        KeyCode::Char('e') => match selected_goal(state, view_data) {
            Some(goal) => open_wizard(
                state,
                runtime,
                view_data,
                internal_tx,
                FormKind::GoalEdit(goal.id),
                now,
            ),
            None => show_notice(
                state,
                view_data,
                internal_tx,
                Notice::info("select a goal to edit"),
            ),
        },
        KeyCode::Char('c') => {
            let goal = selected_goal(state, view_data);
            open_form(state, view_data, internal_tx, FormKind::Contribution, goal);
        }
        KeyCode::Char('r') => {
            let goal = selected_goal(state, view_data);
            open_form(state, view_data, internal_tx, FormKind::Reminder, goal);
        }
        KeyCode::Char('i') => open_form(state, view_data, internal_tx, FormKind::Invite, None),
        KeyCode::Char('B') => open_form(state, view_data, internal_tx, FormKind::Broadcast, None),
        KeyCode::Char('D') => delete_selected_goal(state, runtime, view_data, internal_tx, now),
        KeyCode::Char('x') => dismiss_selected_reminder(state, runtime, view_data, internal_tx, now),
        KeyCode::Char('s') => {
            dispatch_command(state, view_data, internal_tx, AppCommand::CycleGoalSort);
            view_data.cursor = 0;
        }
        KeyCode::Char('t') => {
            let current = STATUS_FILTER_CYCLE
                .iter()
                .position(|status| *status == state.goal_criteria.status)
                .unwrap_or(0);
            let next = STATUS_FILTER_CYCLE[(current + 1) % STATUS_FILTER_CYCLE.len()];
            dispatch_command(state, view_data, internal_tx, AppCommand::SetGoalStatus(next));
            view_data.cursor = 0;
        }
        KeyCode::Char('o') => {
            let command = if state.active_tab == TabKind::Reminders {
                AppCommand::ToggleOverdueReminders
            } else {
                AppCommand::ToggleGoalFlag(FlagKind::Overdue)
            };
            dispatch_command(state, view_data, internal_tx, command);
            view_data.cursor = 0;
        }
        KeyCode::Char('h') => {
            dispatch_command(
                state,
                view_data,
                internal_tx,
                AppCommand::ToggleGoalFlag(FlagKind::Shared),
            );
            view_data.cursor = 0;
        }
        KeyCode::Char('C') => {
            dispatch_command(state, view_data, internal_tx, AppCommand::ClearFilters);
            view_data.cursor = 0;
        }
        _ => {}
    }
}

fn row_count(state: &AppState, view_data: &mut ViewData) -> usize {
    match &state.route {
        Route::Search { .. } => view_data.search_page.len(),
        Route::Goal(_) | Route::Error { .. } => 0,
        _ => match state.active_tab {
            TabKind::Dashboard => 0,
            TabKind::Goals => view_data.visible(state, today()).goals.len(),
            TabKind::Reminders => view_data.visible(state, today()).reminders.len(),
            TabKind::Activity => view_data.activities.len(),
            TabKind::Members => view_data.members.len(),
            TabKind::Admin => view_data.admin.users.len(),
        },
    }
}

fn move_cursor(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let count = row_count(state, view_data);
    if count == 0 {
        view_data.cursor = 0;
        return;
    }
    let next = (view_data.cursor as isize + delta).clamp(0, count as isize - 1);
    view_data.cursor = next as usize;
}

fn selected_goal(state: &AppState, view_data: &mut ViewData) -> Option<Goal> {
    match &state.route {
        Route::Goal(_) => view_data.detail.as_ref().map(|detail| detail.goal.clone()),
        Route::Goals => {
            let cursor = view_data.cursor;
            view_data.visible(state, today()).goals.get(cursor).cloned()
        }
        _ => None,
    }
}

fn selected_reminder(state: &AppState, view_data: &mut ViewData) -> Option<Reminder> {
    if state.route != Route::Reminders {
        return None;
    }
    let cursor = view_data.cursor;
    view_data
        .visible(state, today())
        .reminders
        .get(cursor)
        .cloned()
}

fn open_selected<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let route = match &state.route {
        Route::Search { .. } => view_data.search_page.get(view_data.cursor).map(SearchHit::route),
        Route::Goals => selected_goal(state, view_data).map(|goal| Route::Goal(goal.id)),
        Route::Reminders => selected_reminder(state, view_data)
            .and_then(|reminder| reminder.goal_id)
            .map(Route::Goal),
        _ => None,
    };
    if let Some(route) = route {
        navigate(state, runtime, view_data, internal_tx, route, now);
    }
}

fn delete_selected_goal<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    if let Err(error) = state.role.require(Permission::DeleteGoal) {
        show_notice(state, view_data, internal_tx, Notice::warning(error.to_string()));
        return;
    }
    let Some(goal) = selected_goal(state, view_data) else {
        return;
    };
    match runtime.delete_goal(goal.id) {
        Ok(()) => {
            show_notice(
                state,
                view_data,
                internal_tx,
                Notice::success(format!("deleted goal \"{}\"", goal.title)),
            );
            if state.route == Route::Goals {
                refresh_or_report(state, runtime, view_data, internal_tx, now);
            } else {
                navigate(state, runtime, view_data, internal_tx, Route::Goals, now);
            }
            move_cursor(state, view_data, 0);
        }
        Err(error) => report_failure(
            state,
            runtime,
            view_data,
            internal_tx,
            "delete goal",
            error,
            now,
        ),
    }
}

fn dismiss_selected_reminder<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let Some(reminder) = selected_reminder(state, view_data) else {
        return;
    };
    if let Err(error) = state.role.require(Permission::ManageReminders) {
        show_notice(state, view_data, internal_tx, Notice::warning(error.to_string()));
        return;
    }
    match runtime.dismiss_reminder(reminder.id) {
        Ok(updated) => {
            let message = if updated.status == ReminderStatus::Dismissed {
                format!("dismissed \"{}\"", updated.title)
            } else {
                format!(
                    "\"{}\" moved to {}",
                    updated.title,
                    format_timestamp(updated.scheduled_for)
                )
            };
            show_notice(state, view_data, internal_tx, Notice::success(message));
            refresh_or_report(state, runtime, view_data, internal_tx, now);
        }
        Err(error) => report_failure(
            state,
            runtime,
            view_data,
            internal_tx,
            "dismiss reminder",
            error,
            now,
        ),
    }
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    now: Instant,
) {
    let effects = match key.code {
        KeyCode::Esc => view_data.search.key(SearchKey::Escape),
        KeyCode::Down => view_data.search.key(SearchKey::Down),
        KeyCode::Up => view_data.search.key(SearchKey::Up),
        KeyCode::Enter => view_data.search.key(SearchKey::Enter),
        KeyCode::Tab | KeyCode::BackTab => {
            view_data.search.blur(now);
            vec![SearchEffect::Blur]
        }
        KeyCode::Backspace => {
            let mut query = view_data.search.query().to_owned();
            query.pop();
            view_data.search.set_query(&query, now);
            Vec::new()
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut query = view_data.search.query().to_owned();
            query.push(ch);
            view_data.search.set_query(&query, now);
            Vec::new()
        }
        _ => Vec::new(),
    };
    apply_search_effects(state, runtime, view_data, internal_tx, effects, now);
}

fn open_wizard<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: FormKind,
    now: Instant,
) {
    dispatch_command(state, view_data, internal_tx, AppCommand::OpenForm(kind));
    if state.mode != AppMode::Form(kind) {
        return;
    }
    let store = runtime.draft_store();
    let autosave = view_data.options.autosave;
    let opened = match kind {
        FormKind::GoalEdit(goal_id) => find_goal(runtime, view_data, goal_id)
            .and_then(|goal| GoalWizard::open_edit(&goal, store, autosave)),
        _ => GoalWizard::open(store, autosave),
    };
    match opened {
        Ok(wizard) => {
            let restored = wizard.draft_version() > 0;
            view_data.wizard = Some(WizardUiState {
                wizard,
                field_index: 0,
            });
            if restored {
                show_notice(
                    state,
                    view_data,
                    internal_tx,
                    Notice::info("restored your unsaved draft"),
                );
            }
        }
        Err(error) => {
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
            report_failure(
                state,
                runtime,
                view_data,
                internal_tx,
                "open goal form",
                error,
                now,
            );
        }
    }
}

fn find_goal<R: AppRuntime>(runtime: &R, view_data: &ViewData, goal_id: GoalId) -> Result<Goal> {
    let cached = view_data
        .goals
        .as_ref()
        .and_then(|goals| goals.iter().find(|goal| goal.id == goal_id).cloned());
    match cached {
        Some(goal) => Ok(goal),
        None => runtime.load_goal(goal_id),
    }
}

fn close_wizard<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    if let Some(mut ui) = view_data.wizard.take() {
        let outcome = ui.wizard.flush(runtime.draft_store());
        ui.wizard.close();
        handle_draft_outcome(state, runtime, view_data, internal_tx, outcome, now);
    }
    dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
}

fn handle_wizard_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    now: Instant,
) {
    let Some(ui) = view_data.wizard.as_mut() else {
        dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    };
    let roles = state.role.assignable_roles();

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let outcome = match key.code {
            KeyCode::Char('s') => ui.wizard.flush(runtime.draft_store()),
            KeyCode::Char('t') => ui
                .wizard
                .take_stored_draft(runtime.draft_store())
                .map(|()| None),
            KeyCode::Char('k') => ui.wizard.keep_local_draft(runtime.draft_store()).map(Some),
            KeyCode::Char('n') if ui.wizard.step() == WizardStep::Members => {
                ui.wizard.edit(now, |draft| {
                    let last_blank = draft
                        .invites
                        .last()
                        .is_some_and(|invite| invite.name.is_empty() && invite.email.is_empty());
                    if !last_blank {
                        draft.invites.push(blank_invite(roles));
                    }
                });
                ui.field_index = 0;
                Ok(None)
            }
            KeyCode::Char('d') if ui.wizard.step() == WizardStep::Members => {
                ui.wizard.edit(now, |draft| {
                    draft.invites.pop();
                });
                Ok(None)
            }
            _ => Ok(None),
        };
        handle_draft_outcome(state, runtime, view_data, internal_tx, outcome, now);
        return;
    }

    match key.code {
        KeyCode::Esc => {
            if matches!(ui.wizard.step(), WizardStep::Basics | WizardStep::Submitted) {
                close_wizard(state, runtime, view_data, internal_tx, now);
            } else {
                ui.wizard.previous();
                ui.field_index = 0;
            }
        }
        KeyCode::Enter => match ui.wizard.step() {
            WizardStep::Review => submit_wizard(state, runtime, view_data, internal_tx, now),
            WizardStep::Submitted => close_wizard(state, runtime, view_data, internal_tx, now),
            _ => {
                if ui.wizard.next() {
                    ui.field_index = 0;
                } else if let Some(problem) = ui.wizard.step_problem() {
                    show_notice(state, view_data, internal_tx, Notice::warning(problem));
                }
            }
        },
        KeyCode::Tab | KeyCode::Down => ui.move_field(1),
        KeyCode::BackTab | KeyCode::Up => ui.move_field(-1),
        KeyCode::Left => edit_wizard_field(ui, FieldEdit::Cycle(-1), roles, now),
        KeyCode::Right => edit_wizard_field(ui, FieldEdit::Cycle(1), roles, now),
        KeyCode::Backspace => edit_wizard_field(ui, FieldEdit::Pop, roles, now),
        KeyCode::Char(' ') if ui.current_field().is_some_and(WizardField::is_choice) => {
            edit_wizard_field(ui, FieldEdit::Cycle(1), roles, now);
        }
        KeyCode::Char(ch) => edit_wizard_field(ui, FieldEdit::Push(ch), roles, now),
        _ => {}
    }
}

fn edit_wizard_field(ui: &mut WizardUiState, edit: FieldEdit, roles: &[MemberRole], now: Instant) {
    let Some(field) = ui.current_field() else {
        return;
    };
    if field.is_choice() != matches!(edit, FieldEdit::Cycle(_)) {
        return;
    }
    ui.wizard
        .edit(now, |draft| apply_wizard_edit(draft, field, edit, roles));
}

fn apply_wizard_edit(draft: &mut GoalDraft, field: WizardField, edit: FieldEdit, roles: &[MemberRole]) {
    let delta = match edit {
        FieldEdit::Cycle(delta) => delta,
        FieldEdit::Push(_) | FieldEdit::Pop => 0,
    };
    match field {
        WizardField::Title => edit_text(&mut draft.title, edit),
        WizardField::Description => edit_text(&mut draft.description, edit),
        WizardField::Target => edit_text(&mut draft.target, edit),
        WizardField::Deadline => edit_text(&mut draft.deadline, edit),
        WizardField::Kind => draft.kind = cycle(GoalKind::ALL, draft.kind, delta),
        WizardField::Category => draft.category = cycle(GoalCategory::ALL, draft.category, delta),
        WizardField::Status => draft.status = cycle(GoalStatus::ALL, draft.status, delta),
        WizardField::Shared => draft.shared = !draft.shared,
        WizardField::InviteName | WizardField::InviteEmail | WizardField::InviteRole => {
            if draft.invites.is_empty() {
                if edit == FieldEdit::Pop {
                    return;
                }
                draft.invites.push(blank_invite(roles));
            }
            let Some(invite) = draft.invites.last_mut() else {
                return;
            };
            match field {
                WizardField::InviteName => edit_text(&mut invite.name, edit),
                WizardField::InviteEmail => edit_text(&mut invite.email, edit),
                _ => invite.role = cycle(roles, invite.role, delta),
            }
        }
    }
}

fn edit_text(value: &mut String, edit: FieldEdit) {
    match edit {
        FieldEdit::Push(ch) => value.push(ch),
        FieldEdit::Pop => {
            value.pop();
        }
        FieldEdit::Cycle(_) => {}
    }
}

fn cycle<T: Copy + PartialEq>(items: &[T], current: T, delta: isize) -> T {
    if items.is_empty() {
        return current;
    }
    let position = items.iter().position(|item| *item == current).unwrap_or(0);
    let next = (position as isize + delta).rem_euclid(items.len() as isize) as usize;
    items[next]
}

fn blank_invite(roles: &[MemberRole]) -> InviteDraft {
    let role = roles
        .iter()
        .copied()
        .find(|role| *role == MemberRole::Contributor)
        .or_else(|| roles.first().copied())
        .unwrap_or(MemberRole::Viewer);
    InviteDraft {
        name: String::new(),
        email: String::new(),
        role,
    }
}

fn submit_wizard<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let Some(ui) = view_data.wizard.as_mut() else {
        return;
    };
    let mut failure_status = None;
    let saved = ui.wizard.submit(runtime.draft_store(), |mode, input| {
        runtime
            .save_goal(mode, input)
            .inspect_err(|error| failure_status = Some(runtime.error_status(error)))
    });

    match saved {
        Some(goal) => {
            let message = ui.wizard.notice().unwrap_or("saved goal").to_owned();
            ui.wizard.close();
            view_data.wizard = None;
            view_data.goals = None;
            show_notice(state, view_data, internal_tx, Notice::success(message));
            navigate(state, runtime, view_data, internal_tx, Route::Goal(goal.id), now);
        }
        None => {
            let message = ui
                .wizard
                .error()
                .unwrap_or("goal could not be saved")
                .to_owned();
            if let Some(status) = failure_status {
                let report = view_data.reporter.report(status, message, now);
                show_notice(state, view_data, internal_tx, report.notice());
            }
        }
    }
}

fn open_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: FormKind,
    goal: Option<Goal>,
) {
    if kind == FormKind::Contribution && goal.is_none() {
        show_notice(
            state,
            view_data,
            internal_tx,
            Notice::info("select a goal first -- money is always recorded against a goal"),
        );
        return;
    }
    dispatch_command(state, view_data, internal_tx, AppCommand::OpenForm(kind));
    if state.mode != AppMode::Form(kind) {
        return;
    }
    view_data.form = FormUiState::new(kind, goal.as_ref(), state.role);
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    now: Instant,
) {
    let Some(form) = view_data.form.as_mut() else {
        dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    };
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if key.code == KeyCode::Char('s') {
            submit_form(state, runtime, view_data, internal_tx, now);
        }
        return;
    }
    match key.code {
        KeyCode::Esc => {
            view_data.form = None;
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        }
        KeyCode::Enter => submit_form(state, runtime, view_data, internal_tx, now),
        KeyCode::Tab | KeyCode::Down => form.move_field(1),
        KeyCode::BackTab | KeyCode::Up => form.move_field(-1),
        KeyCode::Left => form.apply(FieldEdit::Cycle(-1)),
        KeyCode::Right => form.apply(FieldEdit::Cycle(1)),
        KeyCode::Backspace => form.apply(FieldEdit::Pop),
        KeyCode::Char(ch) => form.apply(FieldEdit::Push(ch)),
        _ => {}
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    let payload = match form.to_payload(OffsetDateTime::now_utc()) {
        Ok(payload) => payload,
        Err(error) => {
            form.error = Some(format!("{error:#}"));
            return;
        }
    };
    match runtime.submit_form(&payload) {
        Ok(()) => {
            let message = format!("saved {}", form_title(payload.kind()));
            view_data.form = None;
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
            show_notice(state, view_data, internal_tx, Notice::success(message));
            refresh_or_report(state, runtime, view_data, internal_tx, now);
        }
        Err(error) => {
            form.error = Some(format!("{error:#}"));
            report_failure(
                state,
                runtime,
                view_data,
                internal_tx,
                "submit form",
                error,
                now,
            );
        }
    }
}

const fn form_title(kind: FormKind) -> &'static str {
    match kind {
        FormKind::GoalWizard => "new goal",
        FormKind::GoalEdit(_) => "goal changes",
        FormKind::Contribution => "money movement",
        FormKind::Reminder => "reminder",
        FormKind::Invite => "invite",
        FormKind::Broadcast => "broadcast",
    }
}

fn render(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    view_data: &ViewData,
    visible: &VisibleRows,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let tabs_visible = state.visible_tabs();
    let selected = tabs_visible
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(tab_titles(state))
        .block(Block::default().title("hearth").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    let now = OffsetDateTime::now_utc();
    match &state.route {
        Route::Error { trace } => {
            let body = Paragraph::new(render_error_page_text(trace, &view_data.reporter))
                .block(Block::default().borders(Borders::ALL).title("error"));
            frame.render_widget(body, layout[1]);
        }
        Route::Goal(_) if view_data.detail.is_some() => {
            let text = view_data
                .detail
                .as_ref()
                .map(|detail| render_goal_detail_text(detail, now.date()))
                .unwrap_or_default();
            let body =
                Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("goal"));
            frame.render_widget(body, layout[1]);
        }
        _ if state.active_tab == TabKind::Dashboard && state.route == Route::Dashboard => {
            let body = Paragraph::new(render_dashboard_text(
                &visible.summary,
                &visible.reminders,
                now,
            ))
            .block(Block::default().borders(Borders::ALL).title("dashboard"));
            frame.render_widget(body, layout[1]);
        }
        _ => {
            if let Some(projection) = table_projection(state, view_data, visible, now) {
                render_table(frame, layout[1], &projection, view_data.cursor);
            }
        }
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if state.mode == AppMode::Search || view_data.search.is_open() {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let dropdown = Paragraph::new(render_search_dropdown_text(&view_data.search))
            .block(Block::default().title("search").borders(Borders::ALL));
        frame.render_widget(dropdown, area);
    }

    if let Some(ui) = &view_data.wizard {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let wizard = Paragraph::new(render_wizard_text(ui)).block(
            Block::default()
                .title("goal")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(wizard, area);
    }

    if let Some(form) = &view_data.form {
        let area = centered_rect(60, 45, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(render_form_text(form))
            .block(Block::default().title(form_title(form.kind)).borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn tab_titles(state: &AppState) -> Vec<String> {
    state
        .visible_tabs()
        .into_iter()
        .map(|tab| {
            let active_filters = match tab {
                TabKind::Goals => state.goal_criteria.active_count(),
                TabKind::Reminders => state.reminder_criteria.active_count(),
                _ => 0,
            };
            if active_filters > 0 {
                format!("{} ({active_filters})", tab.label())
            } else {
                tab.label().to_owned()
            }
        })
        .collect()
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    projection: &TableProjection,
    cursor: usize,
) {
    let widths = vec![Constraint::Min(8); projection.columns.len().max(1)];
    let header = Row::new(projection.columns.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let rows = projection.rows.iter().enumerate().map(|(index, row)| {
        let style = if index == cursor {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(row.iter().map(|cell| Cell::from(cell.clone()))).style(style)
    });
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(projection.title.clone())
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn table_projection(
    state: &AppState,
    view_data: &ViewData,
    visible: &VisibleRows,
    now: OffsetDateTime,
) -> Option<TableProjection> {
    if let Route::Search { query } = &state.route {
        return Some(TableProjection {
            title: format!("search: {query} ({})", view_data.search_page.len()),
            columns: vec!["kind", "match", "detail"],
            rows: view_data
                .search_page
                .iter()
                .map(|hit| {
                    vec![
                        hit.kind.as_str().to_owned(),
                        hit.title.clone(),
                        hit.subtitle.clone(),
                    ]
                })
                .collect(),
        });
    }

    let projection = match state.active_tab {
        TabKind::Dashboard => return None,
        TabKind::Goals => TableProjection {
            title: format!(
                "goals {}/{} | sort {}",
                visible.goals.len(),
                view_data.goals.as_ref().map_or(0, |goals| goals.len()),
                sort_label(state.goal_sort)
            ),
            columns: vec!["goal", "category", "status", "progress", "saved", "deadline"],
            rows: visible
                .goals
                .iter()
                .map(|goal| goal_row(goal, now.date()))
                .collect(),
        },
        TabKind::Reminders => {
            let goals = view_data.goals.as_deref().map_or(&[][..], Vec::as_slice);
            TableProjection {
                title: format!("reminders {}", visible.reminders.len()),
                columns: vec!["reminder", "repeats", "status", "when", "goal"],
                rows: visible
                    .reminders
                    .iter()
                    .map(|reminder| reminder_row(reminder, goals, now))
                    .collect(),
            }
        }
        TabKind::Activity => TableProjection {
            title: format!("activity {}", view_data.activities.len()),
            columns: vec!["when", "what", "summary"],
            rows: view_data
                .activities
                .iter()
                .map(|activity| {
                    vec![
                        format_timestamp(activity.created_at),
                        activity.kind.as_str().replace('_', " "),
                        activity.summary.clone(),
                    ]
                })
                .collect(),
        },
        TabKind::Members => TableProjection {
            title: format!("family {}", view_data.members.len()),
            columns: vec!["name", "email", "role", "status"],
            rows: view_data
                .members
                .iter()
                .map(|member| {
                    vec![
                        member.name.clone(),
                        member.email.clone(),
                        member.role.to_string(),
                        member.status.to_string(),
                    ]
                })
                .collect(),
        },
        TabKind::Admin => {
            let unsent = view_data
                .admin
                .broadcasts
                .iter()
                .filter(|broadcast| broadcast.sent_at.is_none())
                .count();
            TableProjection {
                title: format!(
                    "admin | {} broadcasts, {unsent} unsent",
                    view_data.admin.broadcasts.len()
                ),
                columns: vec!["user", "email", "admin", "active"],
                rows: view_data
                    .admin
                    .users
                    .iter()
                    .map(|user| {
                        vec![
                            user.name.clone(),
                            user.email.clone(),
                            yes_no(user.is_admin).to_owned(),
                            yes_no(user.active).to_owned(),
                        ]
                    })
                    .collect(),
            }
        }
    };
    Some(projection)
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn sort_label(sort: Option<SortSpec>) -> String {
    sort.map_or_else(|| "none".to_owned(), SortSpec::label)
}

fn goal_row(goal: &Goal, today: Date) -> Vec<String> {
    let deadline = match goal.deadline {
        Some(_) if goal.is_overdue(today) => format!("{} !", format_date(goal.deadline)),
        Some(_) => format_date(goal.deadline),
        None => "-".to_owned(),
    };
    vec![
        goal.title.clone(),
        goal.category.to_string(),
        goal.status.to_string(),
        progress_bar(goal.progress_percent(), LIST_BAR_WIDTH),
        format!(
            "{} / {}",
            format_compact_cents(goal.current_cents),
            format_compact_cents(goal.target_cents)
        ),
        deadline,
    ]
}

fn reminder_row(reminder: &Reminder, goals: &[Goal], now: OffsetDateTime) -> Vec<String> {
    let goal = reminder
        .goal_id
        .and_then(|goal_id| goals.iter().find(|goal| goal.id == goal_id))
        .map_or_else(|| "-".to_owned(), |goal| goal.title.clone());
    let mut when = format_timestamp(reminder.scheduled_for);
    if reminder.is_overdue(now) {
        when.push_str(" !");
    }
    vec![
        reminder.title.clone(),
        reminder.frequency.to_string(),
        reminder.status.to_string(),
        when,
        goal,
    ]
}

fn progress_bar(percent: Option<f64>, width: usize) -> String {
    let Some(percent) = percent else {
        return format!("[{}] --", "-".repeat(width));
    };
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!(
        "[{}{}] {}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled)),
        format_percent(Some(percent))
    )
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}

fn render_dashboard_text(
    summary: &DashboardSummary,
    reminders: &[Reminder],
    now: OffsetDateTime,
) -> String {
    let mut lines = vec![
        format!(
            "goals: {} active, {} paused, {} completed",
            summary.active, summary.paused, summary.completed
        ),
        format!("overdue: {}", summary.overdue),
        format!(
            "saved: {} of {}",
            format_cents(summary.total_saved_cents),
            format_cents(summary.total_target_cents)
        ),
        progress_bar(summary.overall_progress(), DETAIL_BAR_WIDTH),
        String::new(),
    ];

    let mut upcoming = reminders
        .iter()
        .filter(|reminder| reminder.status == ReminderStatus::Scheduled)
        .collect::<Vec<_>>();
    upcoming.sort_by_key(|reminder| reminder.scheduled_for);
    if upcoming.is_empty() {
        lines.push("no reminders scheduled".to_owned());
    } else {
        lines.push("next reminders".to_owned());
        for reminder in upcoming.into_iter().take(UPCOMING_REMINDERS) {
            let marker = if reminder.is_overdue(now) { "!" } else { " " };
            lines.push(format!(
                "{marker} {} {}",
                format_timestamp(reminder.scheduled_for),
                reminder.title
            ));
        }
    }
    lines.join("\n")
}

fn render_goal_detail_text(detail: &GoalDetail, today: Date) -> String {
    let goal = &detail.goal;
    let mut lines = vec![
        goal.title.clone(),
        format!("{} {} goal, {}", goal.category, goal.kind, goal.status),
        String::new(),
        format!(
            "saved {} of {}",
            format_cents(goal.current_cents),
            format_cents(goal.target_cents)
        ),
        progress_bar(goal.progress_percent(), DETAIL_BAR_WIDTH),
        format!("remaining {}", format_cents(goal.remaining_cents())),
    ];
    if goal.deadline.is_some() {
        let overdue = if goal.is_overdue(today) {
            " (overdue)"
        } else {
            ""
        };
        lines.push(format!("deadline {}{overdue}", format_date(goal.deadline)));
    }
    if !goal.description.is_empty() {
        lines.push(String::new());
        lines.push(goal.description.clone());
    }

    lines.push(String::new());
    lines.push("milestones".to_owned());
    for milestone in goal.milestones() {
        lines.push(format!(
            "  [{}] {:>3}% {}",
            if milestone.reached { "x" } else { " " },
            milestone.percent,
            format_cents(milestone.amount_cents)
        ));
    }

    lines.push(String::new());
    if detail.transactions.is_empty() {
        lines.push("no money recorded yet".to_owned());
    } else {
        lines.push("history".to_owned());
        for transaction in &detail.transactions {
            let who = if transaction.member_name.is_empty() {
                "someone"
            } else {
                &transaction.member_name
            };
            let mut line = format!(
                "  {} {:>12} {who}",
                format_timestamp(transaction.occurred_at),
                format_cents(transaction.signed_amount_cents())
            );
            if !transaction.note.is_empty() {
                line.push_str(": ");
                line.push_str(&transaction.note);
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn render_search_dropdown_text(search: &SearchDropdown) -> String {
    let mut lines = vec![format!("search: {}_", search.query())];
    match search.state() {
        DropdownState::Closed => return lines.join("\n"),
        DropdownState::OpenLoading => lines.push("searching...".to_owned()),
        DropdownState::OpenEmpty => lines.push("no matches".to_owned()),
        DropdownState::OpenWithResults => {}
    }
    for (index, entry) in search.entries().iter().enumerate() {
        let marker = if search.selected() == Some(index) {
            ">"
        } else {
            " "
        };
        let line = match entry {
            DropdownEntry::Result(hit) => format!("{marker} {} ({})", hit.title, hit.kind.as_str()),
            DropdownEntry::Suggestion(text) => format!("{marker} try: {text}"),
        };
        lines.push(line);
    }
    lines.join("\n")
}

fn render_wizard_text(ui: &WizardUiState) -> String {
    let wizard = &ui.wizard;
    let heading = match wizard.mode() {
        WizardMode::Create => "new goal".to_owned(),
        WizardMode::Edit(goal_id) => format!("edit goal {}", goal_id.get()),
    };
    let steps = WizardStep::EDITABLE
        .iter()
        .map(|step| {
            if *step == wizard.step() {
                format!("[{}]", step.label())
            } else {
                step.label().to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" > ");
    let mut lines = vec![heading, steps, String::new()];

    let draft = wizard.draft();
    match wizard.step() {
        WizardStep::Review => {
            lines.push(format!("title: {}", draft.title.trim()));
            if !draft.description.trim().is_empty() {
                lines.push(format!("description: {}", draft.description.trim()));
            }
            lines.push(format!("{} / {} / {}", draft.kind, draft.category, draft.status));
            lines.push(format!("target: ${}", draft.target.trim()));
            if !draft.deadline.trim().is_empty() {
                lines.push(format!("deadline: {}", draft.deadline.trim()));
            }
            lines.push(format!("shared: {}", yes_no(draft.shared)));
            lines.push(format!("invites: {}", draft.invites.len()));
            lines.push(String::new());
            lines.push("enter saves the goal".to_owned());
        }
        WizardStep::Submitted => {
            lines.push(wizard.notice().unwrap_or("done").to_owned());
        }
        step => {
            for (index, field) in wizard_fields(step, wizard.mode()).iter().enumerate() {
                let marker = if index == ui.field_index { ">" } else { " " };
                let value = wizard_field_value(draft, *field);
                if field.is_choice() {
                    lines.push(format!("{marker} {}: < {value} >", field.label()));
                } else {
                    lines.push(format!("{marker} {}: {value}", field.label()));
                }
            }
            if step == WizardStep::Members {
                lines.push(String::new());
                lines.push(format!(
                    "invites ({}) | ctrl+n another | ctrl+d remove last",
                    draft.invites.len()
                ));
                for invite in &draft.invites {
                    lines.push(format!("  {} <{}> {}", invite.name, invite.email, invite.role));
                }
            }
        }
    }

    lines.push(String::new());
    if wizard.step() != WizardStep::Submitted
        && let Some(problem) = wizard.step_problem()
    {
        lines.push(format!("! {problem}"));
    }
    if let Some(error) = wizard.error() {
        lines.push(format!("error: {error}"));
    }
    if let Some(conflict) = wizard.conflict() {
        lines.push(format!(
            "conflict: {conflict} -- ctrl+t loads the saved copy, ctrl+k keeps yours"
        ));
    }
    let draft_status = if wizard.has_unsaved_changes() {
        "draft: unsaved changes".to_owned()
    } else if wizard.draft_version() > 0 {
        format!("draft: saved (v{})", wizard.draft_version())
    } else {
        "draft: not saved".to_owned()
    };
    lines.push(draft_status);
    lines.join("\n")
}

fn wizard_field_value(draft: &GoalDraft, field: WizardField) -> String {
    let invite = draft.invites.last();
    match field {
        WizardField::Title => draft.title.clone(),
        WizardField::Description => draft.description.clone(),
        WizardField::Kind => draft.kind.to_string(),
        WizardField::Category => draft.category.to_string(),
        WizardField::Target => draft.target.clone(),
        WizardField::Deadline => draft.deadline.clone(),
        WizardField::Shared => yes_no(draft.shared).to_owned(),
        WizardField::Status => draft.status.to_string(),
        WizardField::InviteName => invite.map(|invite| invite.name.clone()).unwrap_or_default(),
        WizardField::InviteEmail => invite.map(|invite| invite.email.clone()).unwrap_or_default(),
        WizardField::InviteRole => invite
            .map(|invite| invite.role.to_string())
            .unwrap_or_default(),
    }
}

fn render_form_text(form: &FormUiState) -> String {
    let mut lines = Vec::new();
    if let Some((_, title)) = &form.goal {
        lines.push(format!("goal: {title}"));
        lines.push(String::new());
    }
    for (index, field) in form.fields.iter().enumerate() {
        let marker = if index == form.field_index { ">" } else { " " };
        match &field.value {
            FieldValue::Text(text) => lines.push(format!("{marker} {}: {text}", field.label)),
            FieldValue::Choice { .. } => {
                lines.push(format!("{marker} {}: < {} >", field.label, field.as_text()));
            }
        }
    }
    if let Some(error) = &form.error {
        lines.push(String::new());
        lines.push(format!("error: {error}"));
    }
    lines.join("\n")
}

fn render_error_page_text(trace: &str, reporter: &ErrorReporter) -> String {
    let report = reporter
        .reports()
        .find(|report| report.trace_id.to_string() == trace);
    let mut lines = vec!["something went wrong".to_owned(), String::new()];
    match report {
        Some(report) => {
            lines.push(report.message.clone());
            if let Some(status) = report.status {
                lines.push(format!("status {status}"));
            }
            lines.push(String::new());
            lines.push(if report.retry_allowed {
                "R retries".to_owned()
            } else {
                "retries are paused after repeated failures -- wait a moment".to_owned()
            });
        }
        None => lines.push("no details were recorded for this failure".to_owned()),
    }
    lines.push(format!("trace {trace}"));
    lines.push("esc goes back".to_owned());
    lines.join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }
    let mode = match state.mode {
        AppMode::Nav => "NAV",
        AppMode::Search => "SEARCH",
        AppMode::Form(_) => "FORM",
    };
    let hints = match state.mode {
        AppMode::Nav => format!(
            "f/b tabs | j/k | enter open | / search | n new | s sort:{} | t status | o overdue | ? help | ctrl+q",
            sort_label(state.goal_sort)
        ),
        AppMode::Search => "type | up/down | enter go | esc close".to_owned(),
        AppMode::Form(FormKind::GoalWizard | FormKind::GoalEdit(_)) => {
            "tab field | space/left/right choose | enter next | esc back | ctrl+s save".to_owned()
        }
        AppMode::Form(_) => "tab field | left/right choose | enter save | esc cancel".to_owned(),
    };
    let mut parts = vec![mode.to_owned()];
    if let Some(notice) = &state.notice {
        let prefix = match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => "",
            NoticeLevel::Warning => "warning: ",
            NoticeLevel::Error => "error: ",
        };
        parts.push(format!("{prefix}{}", notice.message));
    }
    parts.push(hints);
    parts.join(" | ")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit\n\
nav: f/b or tab/shift+tab switch tabs | j/k move | g/G first/last | enter open | esc back\n\
nav: / search | R reload | ? help\n\
goals: n new | e edit | c record money | r reminder | D delete\n\
filters: t status | o overdue | h shared | s sort | C clear\n\
reminders: x dismiss | o overdue only\n\
family: i invite | admin: B broadcast\n\
search: type to search | up/down choose | enter go | esc close\n\
wizard: tab/shift+tab field | space/left/right choose | enter next | esc back | ctrl+s save draft\n\
wizard: ctrl+n add invite | ctrl+d remove invite | ctrl+t load saved copy | ctrl+k keep mine\n\
form: tab field | left/right choose | enter or ctrl+s save | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AdminSnapshot, AppRuntime, FieldEdit, FormUiState, GoalDetail, InternalEvent, UiOptions,
        ViewData, WizardField, apply_wizard_edit, centered_rect, cycle, event_loop, handle_key_event,
        process_internal_events, progress_bar, refresh_view_data, render_error_page_text,
        render_goal_detail_text, render_search_dropdown_text, status_text, tick_controllers,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use hearth_app::search::{SearchConfig, SearchDropdown};
    use hearth_app::wizard::{NEW_GOAL_DRAFT_KEY, WizardMode, WizardStep};
    use hearth_app::{
        Activity, AppMode, AppState, DraftStore, FormKind, FormPayload, Goal, GoalCategory,
        GoalCriteria, GoalDraft, GoalFormInput, GoalId, GoalKind, GoalStatus, HitKind, Member,
        MemberRole, MemoryDraftStore, NoticeLevel, Reminder, ReminderCriteria, ReminderFrequency,
        ReminderId, ReminderStatus, Route, SearchHit, TabKind, Transaction, TransactionId,
        TransactionKind,
    };
    use hearth_testkit::reference_now;
    use pretty_assertions::assert_eq;
    use ratatui::layout::Rect;
    use std::cell::RefCell;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::{Duration, Instant};
    use time::macros::date;

    #[derive(Debug)]
    struct StatusError(u16);

    impl std::fmt::Display for StatusError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "server returned {}", self.0)
        }
    }

    impl std::error::Error for StatusError {}

    #[derive(Default)]
    struct TestRuntime {
        goals: RefCell<Vec<Goal>>,
        reminders: RefCell<Vec<Reminder>>,
        hits: Vec<SearchHit>,
        goal_loads: RefCell<usize>,
        searches: RefCell<Vec<String>>,
        saved: RefCell<Vec<(WizardMode, GoalFormInput)>>,
        payloads: RefCell<Vec<FormPayload>>,
        dismissed: RefCell<Vec<ReminderId>>,
        failing_status: Option<u16>,
        drafts: MemoryDraftStore,
    }

    impl TestRuntime {
        fn with_goals(goals: Vec<Goal>) -> Self {
            Self {
                goals: RefCell::new(goals),
                ..Self::default()
            }
        }

        fn fail_if_configured(&self) -> Result<()> {
            match self.failing_status {
                Some(status) => Err(anyhow::Error::new(StatusError(status))),
                None => Ok(()),
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn load_goals(&self, _criteria: &GoalCriteria) -> Result<Vec<Goal>> {
            self.fail_if_configured()?;
            *self.goal_loads.borrow_mut() += 1;
            Ok(self.goals.borrow().clone())
        }

        fn load_goal(&self, goal_id: GoalId) -> Result<Goal> {
            self.fail_if_configured()?;
            self.goals
                .borrow()
                .iter()
                .find(|goal| goal.id == goal_id)
                .cloned()
                .ok_or_else(|| anyhow!("goal {} not found", goal_id.get()))
        }

        fn load_transactions(&self, _goal_id: GoalId) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }

        fn load_reminders(&self, _criteria: &ReminderCriteria) -> Result<Vec<Reminder>> {
            Ok(self.reminders.borrow().clone())
        }

        fn load_activities(&self, _limit: usize) -> Result<Vec<Activity>> {
            Ok(Vec::new())
        }

        fn load_members(&self) -> Result<Vec<Member>> {
            Ok(Vec::new())
        }

        fn load_admin(&self) -> Result<AdminSnapshot> {
            Ok(AdminSnapshot::default())
        }

        fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            self.searches.borrow_mut().push(query.to_owned());
            Ok(self.hits.clone())
        }

        fn save_goal(&self, mode: WizardMode, input: &GoalFormInput) -> Result<Goal> {
            self.saved.borrow_mut().push((mode, input.clone()));
            let id = GoalId::new(self.goals.borrow().len() as i64 + 1);
            let mut goal = sample_goal(id.get(), &input.title, input.target_cents, 0);
            goal.category = input.category;
            self.goals.borrow_mut().push(goal.clone());
            Ok(goal)
        }

        fn delete_goal(&self, goal_id: GoalId) -> Result<()> {
            self.goals.borrow_mut().retain(|goal| goal.id != goal_id);
            Ok(())
        }

        fn submit_form(&self, payload: &FormPayload) -> Result<()> {
            self.payloads.borrow_mut().push(payload.clone());
            Ok(())
        }

        fn dismiss_reminder(&self, reminder_id: ReminderId) -> Result<Reminder> {
            self.dismissed.borrow_mut().push(reminder_id);
            let mut reminders = self.reminders.borrow_mut();
            let reminder = reminders
                .iter_mut()
                .find(|reminder| reminder.id == reminder_id)
                .ok_or_else(|| anyhow!("reminder not found"))?;
            reminder.status = ReminderStatus::Dismissed;
            Ok(reminder.clone())
        }

        fn draft_store(&self) -> &dyn DraftStore {
            &self.drafts
        }

        fn error_status(&self, error: &anyhow::Error) -> Option<u16> {
            error
                .chain()
                .find_map(|cause| cause.downcast_ref::<StatusError>())
                .map(|status| status.0)
        }
    }

    fn sample_goal(id: i64, title: &str, target_cents: i64, current_cents: i64) -> Goal {
        Goal {
            id: GoalId::new(id),
            title: title.to_owned(),
            description: String::new(),
            kind: GoalKind::Savings,
            category: GoalCategory::Vacation,
            status: GoalStatus::Active,
            target_cents,
            current_cents,
            deadline: None,
            created_by: None,
            shared: true,
            created_at: reference_now(),
            updated_at: reference_now(),
            deleted_at: None,
        }
    }

    fn sample_reminder(id: i64, goal_id: Option<GoalId>) -> Reminder {
        Reminder {
            id: ReminderId::new(id),
            goal_id,
            title: "Move money to savings".to_owned(),
            frequency: ReminderFrequency::Once,
            status: ReminderStatus::Scheduled,
            scheduled_for: reference_now(),
            created_at: reference_now(),
            updated_at: reference_now(),
        }
    }

    struct Harness {
        state: AppState,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
        now: Instant,
    }

    impl Harness {
        fn new(role: MemberRole) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                state: AppState::for_role(role, false),
                view_data: ViewData::new(UiOptions::default()),
                tx,
                rx,
                now: Instant::now(),
            }
        }

        fn press(&mut self, runtime: &TestRuntime, code: KeyCode) -> bool {
            self.send(runtime, KeyEvent::new(code, KeyModifiers::NONE))
        }

        fn ctrl(&mut self, runtime: &TestRuntime, ch: char) -> bool {
            self.send(
                runtime,
                KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL),
            )
        }

        fn send(&mut self, runtime: &TestRuntime, key: KeyEvent) -> bool {
            handle_key_event(
                &mut self.state,
                runtime,
                &mut self.view_data,
                &self.tx,
                key,
                self.now,
            )
        }

        fn type_text(&mut self, runtime: &TestRuntime, text: &str) {
            for ch in text.chars() {
                self.press(runtime, KeyCode::Char(ch));
            }
        }

        fn advance(&mut self, runtime: &TestRuntime, by: Duration) {
            self.now += by;
            tick_controllers(
                &mut self.state,
                runtime,
                &mut self.view_data,
                &self.tx,
                self.now,
            );
        }

        fn goto(&mut self, runtime: &TestRuntime, route: Route) {
            super::navigate(
                &mut self.state,
                runtime,
                &mut self.view_data,
                &self.tx,
                route,
                self.now,
            );
        }
    }

    #[test]
    fn ctrl_q_quits_from_any_mode() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);
        assert!(harness.ctrl(&runtime, 'q'));
        harness.press(&runtime, KeyCode::Char('/'));
        assert_eq!(harness.state.mode, AppMode::Search);
        assert!(harness.ctrl(&runtime, 'q'));
    }

    #[test]
    fn tab_keys_switch_tabs_and_load_data() {
        let runtime = TestRuntime::with_goals(vec![sample_goal(1, "Beach trip", 100_000, 25_000)]);
        let mut harness = Harness::new(MemberRole::Owner);

        assert!(!harness.press(&runtime, KeyCode::Char('f')));
        assert_eq!(harness.state.active_tab, TabKind::Goals);
        assert_eq!(harness.state.route, Route::Goals);
        assert_eq!(*runtime.goal_loads.borrow(), 1);
        let goals = harness
            .view_data
            .goals
            .as_ref()
            .map_or(0, |goals| goals.len());
        assert_eq!(goals, 1);

        harness.press(&runtime, KeyCode::Char('b'));
        assert_eq!(harness.state.active_tab, TabKind::Dashboard);
    }

    #[test]
    fn enter_on_goal_row_opens_detail_and_esc_returns() {
        let runtime = TestRuntime::with_goals(vec![
            sample_goal(1, "Beach trip", 100_000, 25_000),
            sample_goal(2, "New bikes", 60_000, 0),
        ]);
        let mut harness = Harness::new(MemberRole::Owner);
        harness.goto(&runtime, Route::Goals);

        harness.press(&runtime, KeyCode::Char('j'));
        harness.press(&runtime, KeyCode::Enter);
        assert_eq!(harness.state.route, Route::Goal(GoalId::new(2)));
        let detail = harness.view_data.detail.as_ref().map(|detail| detail.goal.id);
        assert_eq!(detail, Some(GoalId::new(2)));

        harness.press(&runtime, KeyCode::Esc);
        assert_eq!(harness.state.route, Route::Goals);
    }

    #[test]
    fn search_debounces_then_enter_opens_the_selected_hit() {
        let runtime = TestRuntime {
            hits: vec![SearchHit {
                kind: HitKind::Goal,
                id: 4,
                goal_id: Some(GoalId::new(4)),
                title: "Vacation fund".to_owned(),
                subtitle: "vacation goal, active".to_owned(),
                created_at: reference_now(),
            }],
            goals: RefCell::new(vec![sample_goal(4, "Vacation fund", 300_000, 0)]),
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(MemberRole::Owner);

        harness.press(&runtime, KeyCode::Char('/'));
        harness.type_text(&runtime, "vac");
        harness.advance(&runtime, Duration::from_millis(100));
        assert!(runtime.searches.borrow().is_empty());

        harness.advance(&runtime, Duration::from_millis(300));
        assert_eq!(*runtime.searches.borrow(), vec!["vac".to_owned()]);
        let text = render_search_dropdown_text(&harness.view_data.search);
        assert!(text.contains("Vacation fund (goal)"));

        harness.press(&runtime, KeyCode::Down);
        harness.press(&runtime, KeyCode::Enter);
        assert_eq!(harness.state.route, Route::Goal(GoalId::new(4)));
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn escape_closes_search_back_to_nav() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Viewer);
        harness.press(&runtime, KeyCode::Char('/'));
        harness.type_text(&runtime, "bike");
        harness.press(&runtime, KeyCode::Esc);
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(!harness.view_data.search.is_open());
    }

    #[test]
    fn wizard_walks_every_step_and_submits() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);

        harness.press(&runtime, KeyCode::Char('n'));
        assert_eq!(harness.state.mode, AppMode::Form(FormKind::GoalWizard));

        harness.type_text(&runtime, "Family cabin");
        harness.press(&runtime, KeyCode::Enter);
        harness.type_text(&runtime, "1500");
        harness.press(&runtime, KeyCode::Enter);
        harness.press(&runtime, KeyCode::Enter);
        let step = harness
            .view_data
            .wizard
            .as_ref()
            .map(|ui| ui.wizard.step());
        assert_eq!(step, Some(WizardStep::Review));

        harness.press(&runtime, KeyCode::Enter);
        let saved = runtime.saved.borrow();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, WizardMode::Create);
        assert_eq!(saved[0].1.title, "Family cabin");
        assert_eq!(saved[0].1.target_cents, 150_000);
        assert!(harness.view_data.wizard.is_none());
        assert_eq!(harness.state.route, Route::Goal(GoalId::new(1)));
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(runtime.drafts.keys().is_empty());
    }

    #[test]
    fn blank_title_blocks_the_first_step() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);
        harness.press(&runtime, KeyCode::Char('n'));
        harness.press(&runtime, KeyCode::Enter);

        let step = harness
            .view_data
            .wizard
            .as_ref()
            .map(|ui| ui.wizard.step());
        assert_eq!(step, Some(WizardStep::Basics));
        let notice = harness.state.notice.as_ref().map(|notice| notice.level);
        assert_eq!(notice, Some(NoticeLevel::Warning));
    }

    #[test]
    fn autosaved_draft_is_restored_on_reopen() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);
        harness.press(&runtime, KeyCode::Char('n'));
        harness.type_text(&runtime, "Piano");
        harness.advance(&runtime, Duration::from_millis(500));
        assert!(runtime.drafts.keys().is_empty());

        harness.advance(&runtime, Duration::from_millis(600));
        assert_eq!(runtime.drafts.keys(), vec![NEW_GOAL_DRAFT_KEY.to_owned()]);

        harness.press(&runtime, KeyCode::Esc);
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(harness.view_data.wizard.is_none());

        harness.press(&runtime, KeyCode::Char('n'));
        let title = harness
            .view_data
            .wizard
            .as_ref()
            .map(|ui| ui.wizard.draft().title.clone());
        assert_eq!(title.as_deref(), Some("Piano"));
        let notice = harness.state.notice.as_ref().map(|notice| notice.message.clone());
        assert_eq!(notice.as_deref(), Some("restored your unsaved draft"));
    }

    #[test]
    fn server_failure_redirects_to_error_page_after_delay() {
        let runtime = TestRuntime {
            failing_status: Some(503),
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(MemberRole::Owner);
        harness.press(&runtime, KeyCode::Char('f'));

        let notice = harness.state.notice.as_ref().map(|notice| notice.level);
        assert_eq!(notice, Some(NoticeLevel::Error));
        assert_eq!(harness.state.route, Route::Goals);

        harness.advance(&runtime, Duration::from_secs(1));
        assert_eq!(harness.state.route, Route::Goals);
        harness.advance(&runtime, Duration::from_secs(2));
        let Route::Error { trace } = harness.state.route.clone() else {
            panic!("expected error route, got {:?}", harness.state.route);
        };
        let page = render_error_page_text(&trace, &harness.view_data.reporter);
        assert!(page.contains("status 503"));
        assert!(page.contains(&trace));

        harness.press(&runtime, KeyCode::Esc);
        assert_eq!(harness.state.route, Route::Goals);
    }

    #[test]
    fn client_failure_stays_on_the_page() {
        let runtime = TestRuntime {
            failing_status: Some(404),
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(MemberRole::Owner);
        harness.press(&runtime, KeyCode::Char('f'));
        harness.advance(&runtime, Duration::from_secs(5));
        assert_eq!(harness.state.route, Route::Goals);
    }

    #[test]
    fn viewer_cannot_open_contribution_form() {
        let runtime = TestRuntime::with_goals(vec![sample_goal(1, "Beach trip", 100_000, 0)]);
        let mut harness = Harness::new(MemberRole::Viewer);
        harness.goto(&runtime, Route::Goals);
        harness.press(&runtime, KeyCode::Char('c'));

        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(harness.view_data.form.is_none());
        let message = harness
            .state
            .notice
            .as_ref()
            .map(|notice| notice.message.clone())
            .unwrap_or_default();
        assert!(message.contains("viewer members cannot"), "{message}");
    }

    #[test]
    fn contribution_form_submits_cents_for_selected_goal() {
        let runtime = TestRuntime::with_goals(vec![sample_goal(1, "Beach trip", 100_000, 0)]);
        let mut harness = Harness::new(MemberRole::Contributor);
        harness.goto(&runtime, Route::Goals);
        harness.press(&runtime, KeyCode::Char('c'));
        assert_eq!(harness.state.mode, AppMode::Form(FormKind::Contribution));

        harness.press(&runtime, KeyCode::Tab);
        harness.type_text(&runtime, "25");
        harness.press(&runtime, KeyCode::Tab);
        harness.type_text(&runtime, "allowance");
        harness.press(&runtime, KeyCode::Enter);

        let payloads = runtime.payloads.borrow();
        let [FormPayload::Contribution(input)] = payloads.as_slice() else {
            panic!("expected one contribution, got {payloads:?}");
        };
        assert_eq!(input.goal_id, GoalId::new(1));
        assert_eq!(input.amount_cents, 2_500);
        assert_eq!(input.kind, TransactionKind::Contribution);
        assert_eq!(input.note, "allowance");
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn contribution_needs_a_selected_goal() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);
        harness.press(&runtime, KeyCode::Char('c'));
        assert_eq!(harness.state.mode, AppMode::Nav);
        let message = harness
            .state
            .notice
            .as_ref()
            .map(|notice| notice.message.clone())
            .unwrap_or_default();
        assert!(message.starts_with("select a goal first"));
    }

    #[test]
    fn invalid_form_input_stays_open_with_an_error() {
        let form = FormUiState::new(FormKind::Invite, None, MemberRole::Owner);
        let Some(mut form) = form else {
            panic!("invite form should exist");
        };
        for ch in "Sam".chars() {
            form.apply(FieldEdit::Push(ch));
        }
        form.move_field(1);
        for ch in "not-an-email".chars() {
            form.apply(FieldEdit::Push(ch));
        }
        let error = form
            .to_payload(reference_now())
            .expect_err("email should be rejected");
        assert!(error.to_string().contains("not a valid address"));
    }

    #[test]
    fn dismiss_key_dismisses_the_selected_reminder() {
        let runtime = TestRuntime {
            reminders: RefCell::new(vec![sample_reminder(3, None)]),
            ..TestRuntime::default()
        };
        let mut harness = Harness::new(MemberRole::Owner);
        harness.goto(&runtime, Route::Reminders);
        harness.press(&runtime, KeyCode::Char('x'));

        assert_eq!(*runtime.dismissed.borrow(), vec![ReminderId::new(3)]);
        let notice = harness.state.notice.as_ref().map(|notice| notice.level);
        assert_eq!(notice, Some(NoticeLevel::Success));
    }

    #[test]
    fn stale_notice_clear_is_ignored() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);
        harness.press(&runtime, KeyCode::Char('c'));
        let first = harness.view_data.notice_token;
        harness.press(&runtime, KeyCode::Char('c'));
        harness
            .tx
            .send(InternalEvent::ClearNotice { token: first })
            .expect("send clear");
        process_internal_events(&mut harness.state, &harness.view_data, &harness.rx);
        assert!(harness.state.notice.is_some());

        let latest = harness.view_data.notice_token;
        harness
            .tx
            .send(InternalEvent::ClearNotice { token: latest })
            .expect("send clear");
        process_internal_events(&mut harness.state, &harness.view_data, &harness.rx);
        assert!(harness.state.notice.is_none());
    }

    #[test]
    fn refresh_loads_goal_detail_for_goal_route() -> Result<()> {
        let runtime = TestRuntime::with_goals(vec![sample_goal(9, "Roof", 800_000, 200_000)]);
        let mut state = AppState::for_role(MemberRole::Owner, false);
        state.route = Route::Goal(GoalId::new(9));
        let mut view_data = ViewData::new(UiOptions::default());
        refresh_view_data(&state, &runtime, &mut view_data)?;
        let title = view_data.detail.as_ref().map(|detail| detail.goal.title.as_str());
        assert_eq!(title, Some("Roof"));
        Ok(())
    }

    #[test]
    fn progress_bar_handles_missing_target() {
        assert_eq!(progress_bar(Some(50.0), 10), "[#####-----] 50%");
        assert_eq!(progress_bar(Some(140.0), 4), "[####] 140%");
        assert_eq!(progress_bar(None, 4), "[----] --");
    }

    #[test]
    fn goal_detail_lists_milestones_and_history() {
        let mut goal = sample_goal(1, "Beach trip", 100_000, 50_000);
        goal.deadline = Some(date!(2026 - 01 - 15));
        let detail = GoalDetail {
            goal,
            transactions: vec![Transaction {
                id: TransactionId::new(1),
                goal_id: GoalId::new(1),
                member_id: None,
                member_name: "Avery".to_owned(),
                kind: TransactionKind::Withdrawal,
                amount_cents: 1_000,
                note: "snacks".to_owned(),
                occurred_at: reference_now(),
                created_at: reference_now(),
            }],
        };
        let text = render_goal_detail_text(&detail, date!(2026 - 03 - 01));
        assert!(text.contains("deadline 2026-01-15 (overdue)"));
        assert!(text.contains("[x]  50%"));
        assert!(text.contains("[ ]  75%"));
        assert!(text.contains("Avery: snacks"));
    }

    #[test]
    fn wizard_edits_cycle_choices_and_invites() {
        let roles = MemberRole::Owner.assignable_roles();
        let mut draft = GoalDraft::default();
        apply_wizard_edit(&mut draft, WizardField::Title, FieldEdit::Push('A'), roles);
        apply_wizard_edit(&mut draft, WizardField::Title, FieldEdit::Pop, roles);
        assert_eq!(draft.title, "");

        let kind = draft.kind;
        apply_wizard_edit(&mut draft, WizardField::Kind, FieldEdit::Cycle(1), roles);
        assert_ne!(draft.kind, kind);

        apply_wizard_edit(&mut draft, WizardField::InviteEmail, FieldEdit::Pop, roles);
        assert!(draft.invites.is_empty());
        apply_wizard_edit(&mut draft, WizardField::InviteEmail, FieldEdit::Push('k'), roles);
        assert_eq!(draft.invites.len(), 1);
        assert_eq!(draft.invites[0].email, "k");
    }

    #[test]
    fn cycle_wraps_both_directions() {
        let items = [1, 2, 3];
        assert_eq!(cycle(&items, 3, 1), 1);
        assert_eq!(cycle(&items, 1, -1), 3);
        assert_eq!(cycle(&items, 9, 1), 2);
        assert_eq!(cycle::<i32>(&[], 4, 1), 4);
    }

    #[test]
    fn search_dropdown_text_marks_loading_and_empty() {
        let now = Instant::now();
        let mut search = SearchDropdown::new(SearchConfig::default());
        search.set_query("zzz", now);
        assert!(render_search_dropdown_text(&search).contains("searching..."));
        let effects = search.tick(now + Duration::from_secs(1));
        assert_eq!(effects.len(), 1);
        search.resolve(1, Ok(Vec::new()));
        assert!(render_search_dropdown_text(&search).contains("no matches"));
    }

    #[test]
    fn status_text_shows_mode_notice_and_sort() {
        let mut state = AppState::for_role(MemberRole::Owner, false);
        let view_data = ViewData::new(UiOptions::default());
        let text = status_text(&state, &view_data);
        assert!(text.starts_with("NAV | "));
        assert!(text.contains("sort:none"));

        state.dispatch(hearth_app::AppCommand::ShowNotice(hearth_app::Notice::warning(
            "careful",
        )));
        assert!(status_text(&state, &view_data).contains("warning: careful"));
    }

    #[test]
    fn event_loop_returns_input_errors_to_the_caller() {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);
        let mut draws = 0;
        let mut reads = 0;
        let result = event_loop(
            &mut harness.state,
            &runtime,
            &mut harness.view_data,
            &harness.tx,
            &harness.rx,
            |_, _, _| {
                draws += 1;
                Ok(())
            },
            || {
                reads += 1;
                if reads == 1 {
                    Ok(None)
                } else {
                    Err(anyhow!("read event: device gone"))
                }
            },
        );

        let error = result.expect_err("input failure should end the loop");
        assert!(error.to_string().contains("device gone"));
        assert_eq!(draws, 2);
        assert_eq!(reads, 2);
    }

    #[test]
    fn event_loop_stops_on_quit_key() -> Result<()> {
        let runtime = TestRuntime::default();
        let mut harness = Harness::new(MemberRole::Owner);
        event_loop(
            &mut harness.state,
            &runtime,
            &mut harness.view_data,
            &harness.tx,
            &harness.rx,
            |_, _, _| Ok(()),
            || Ok(Some(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL))),
        )
    }

    #[test]
    fn centered_rect_stays_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(60, 50, area);
        assert!(popup.width <= 60 && popup.height <= 20);
        assert!(popup.x >= 20 && popup.y >= 10);
    }
}
