// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod debounce;
pub mod derive;
pub mod errors;
pub mod filter;
pub mod forms;
pub mod ids;
pub mod model;
pub mod permissions;
pub mod router;
pub mod search;
pub mod source;
pub mod state;
pub mod validation;
pub mod wizard;

pub use errors::{ErrorReport, ErrorReporter, Notice, NoticeLevel};
pub use filter::{Criteria, FlagKind, GoalCriteria, ReminderCriteria, SortSpec};
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use permissions::Permission;
pub use router::Route;
pub use search::{HitKind, SearchHit};
pub use source::{DataSource, Draft, DraftConflict, DraftStore, MemoryDraftStore, SaveOutcome};
pub use state::*;
