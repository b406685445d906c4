use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::model::{MealLog, MealType};
use super::repo::NewMealLog;
use crate::chat::ConversationMessage;
use crate::collab::ParseRequest;
use crate::error::{CollaboratorError, FailureKind, LogError};
use crate::events::LogCompleted;
use crate::insights::{build_snapshot, DashboardSnapshot};
use crate::meals::model::FoodItem;
use crate::state::AppState;

pub const NO_FOODS_MESSAGE: &str = "No food items recognized. Try being more specific.";
const PARSER_TIMEOUT_MESSAGE: &str = "Analyzing your meal took too long. Please try again.";
const READ_BACK_ATTEMPTS: u32 = 2;
const PARSER_UNAVAILABLE_MESSAGE: &str = "Could not analyze your meal right now. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPhase {
    Idle,
    Validating,
    ParsingExternal,
    Appending,
    Aggregating,
    Done,
    Failed(FailureKind),
}

impl LogPhase {
    pub fn can_advance_to(self, next: LogPhase) -> bool {
        use LogPhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, ParsingExternal)
                | (Validating, Failed(FailureKind::EmptyInput))
                | (ParsingExternal, Appending)
                | (ParsingExternal, Failed(FailureKind::Parse))
                | (Appending, Aggregating)
                | (Appending, Failed(FailureKind::Store))
                | (Aggregating, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LogPhase::Done | LogPhase::Failed(_))
    }
}

/// One pass through the logging pipeline and the phases it went through.
#[derive(Debug)]
pub struct LogAttempt {
    pub user_id: Uuid,
    phase: LogPhase,
    trail: Vec<LogPhase>,
}

impl LogAttempt {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            phase: LogPhase::Idle,
            trail: vec![LogPhase::Idle],
        }
    }

    pub fn phase(&self) -> LogPhase {
        self.phase
    }

    pub fn trail(&self) -> &[LogPhase] {
        &self.trail
    }

    fn advance(&mut self, next: LogPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal log phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        if !self.phase.can_advance_to(next) {
            error!(user_id = %self.user_id, from = ?self.phase, to = ?next, "illegal log phase transition");
            return;
        }
        debug!(user_id = %self.user_id, from = ?self.phase, to = ?next, "log phase");
        self.phase = next;
        self.trail.push(next);
    }

    fn fail(&mut self, err: LogError) -> LogError {
        let kind = err.kind();
        match kind {
            FailureKind::Store => error!(user_id = %self.user_id, error = %err, "logging attempt failed"),
            _ => warn!(user_id = %self.user_id, error = %err, "logging attempt rejected"),
        }
        self.advance(LogPhase::Failed(kind));
        err
    }
}

/// One async mutex per user, held across the append step.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    /// Drops the entries of other users nobody is holding or waiting on.
    pub async fn lock(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|id, lock| *id == user_id || Arc::strong_count(lock) > 1);
            locks.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[derive(Debug, Clone)]
pub struct LogRequest {
    pub description: String,
    pub meal_type: MealType,
    pub history: Vec<ConversationMessage>,
}

impl LogRequest {
    pub fn new(description: impl Into<String>, meal_type: MealType) -> Self {
        Self {
            description: description.into(),
            meal_type,
            history: Vec::new(),
        }
    }
}

/// What a successful attempt produced: the new log and every view refreshed after it.
/// `snapshot` is `None` when the views could not be read back; the meal is committed either way.
#[derive(Debug, Clone, Serialize)]
pub struct LogOutcome {
    pub meal: MealLog,
    pub snapshot: Option<DashboardSnapshot>,
}

/// Validate, parse, append, re-aggregate. Publishes [`LogCompleted`] on success.
#[instrument(skip(st, req), fields(meal_type = %req.meal_type))]
pub async fn log_meal(st: &AppState, user_id: Uuid, req: LogRequest) -> Result<LogOutcome, LogError> {
    let mut attempt = LogAttempt::new(user_id);
    run_attempt(st, &mut attempt, req).await
}

pub(crate) async fn run_attempt(
    st: &AppState,
    attempt: &mut LogAttempt,
    req: LogRequest,
) -> Result<LogOutcome, LogError> {
    let user_id = attempt.user_id;

    attempt.advance(LogPhase::Validating);
    let description = req.description.trim();
    if description.is_empty() {
        return Err(attempt.fail(LogError::EmptyInput));
    }

    attempt.advance(LogPhase::ParsingExternal);
    let request = ParseRequest {
        description: description.to_string(),
        meal_type: req.meal_type,
        history: req.history,
    };
    let foods = match parse_foods(st, request).await {
        Ok(foods) => foods,
        Err(e) => return Err(attempt.fail(e)),
    };

    attempt.advance(LogPhase::Appending);
    let appended = {
        let _guard = st.append_locks.lock(user_id).await;
        st.store
            .append(NewMealLog {
                user_id,
                meal_type: req.meal_type,
                foods,
                original_text: Some(description.to_string()),
            })
            .await
    };
    let meal = match appended {
        Ok(meal) => meal,
        Err(e) => return Err(attempt.fail(LogError::Store(e))),
    };
    info!(%user_id, meal_id = %meal.id(), calories = meal.total_nutrition().calories, "meal logged");

    attempt.advance(LogPhase::Aggregating);
    let snapshot = refresh_views(st, user_id, meal.id()).await;

    attempt.advance(LogPhase::Done);
    st.events.publish(LogCompleted {
        user_id,
        meal_id: meal.id(),
        snapshot: snapshot.clone(),
    });
    Ok(LogOutcome { meal, snapshot })
}

/// Reads the views back after a commit, retrying once. A failure here never
/// fails the attempt.
async fn refresh_views(st: &AppState, user_id: Uuid, meal_id: Uuid) -> Option<DashboardSnapshot> {
    for attempt in 1..=READ_BACK_ATTEMPTS {
        match build_snapshot(st, user_id).await {
            Ok(snapshot) => return Some(snapshot),
            Err(e) => warn!(%user_id, %meal_id, attempt, error = %e, "views read-back failed"),
        }
    }
    None
}

/// Calls the parser under the configured timeout. Every failure, and an empty
/// result, becomes [`LogError::Parse`].
async fn parse_foods(st: &AppState, request: ParseRequest) -> Result<Vec<FoodItem>, LogError> {
    let timeout = st.config.collaborator.timeout();
    match tokio::time::timeout(timeout, st.parser.parse(request)).await {
        Err(_) => {
            warn!(?timeout, "food parser timed out");
            Err(LogError::Parse(PARSER_TIMEOUT_MESSAGE.into()))
        }
        Ok(Err(CollaboratorError::Rejected(msg))) => Err(LogError::Parse(msg)),
        Ok(Err(CollaboratorError::Timeout)) => Err(LogError::Parse(PARSER_TIMEOUT_MESSAGE.into())),
        Ok(Err(e)) => {
            warn!(error = %e, "food parser failed");
            Err(LogError::Parse(PARSER_UNAVAILABLE_MESSAGE.into()))
        }
        Ok(Ok(foods)) if foods.is_empty() => Err(LogError::Parse(NO_FOODS_MESSAGE.into())),
        Ok(Ok(foods)) => Ok(foods),
    }
}
