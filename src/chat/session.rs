use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ConversationMessage, MessageKind, Role};
use crate::clock::LocalDays;
use crate::error::{CollaboratorError, LogError};
use crate::insights::recommendations::Recommendation;
use crate::meals::model::MealLog;
use crate::meals::services::{log_meal, LogOutcome, LogRequest};
use crate::state::AppState;

pub const MAX_SESSIONS_PER_USER: usize = 8;
const AGENT_UNAVAILABLE: &str = "Sorry, I can't reach the nutrition assistant right now. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingUserInput,
    ProcessingTurn,
}

/// Everything one turn added to the transcript, plus the logged meal if there was one.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub messages: Vec<ConversationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged: Option<LogOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub state: TurnState,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub transcript: Vec<ConversationMessage>,
}

/// One user's conversation. The transcript is append-only.
#[derive(Debug)]
pub struct ConversationSession {
    id: Uuid,
    user_id: Uuid,
    started_at: OffsetDateTime,
    state: TurnState,
    transcript: Vec<ConversationMessage>,
}

impl ConversationSession {
    pub fn new(user_id: Uuid, started_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            started_at,
            state: TurnState::AwaitingUserInput,
            transcript: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            state: self.state,
            started_at: self.started_at,
            transcript: self.transcript.clone(),
        }
    }

    fn push(&mut self, role: Role, kind: MessageKind, content: String, at: OffsetDateTime) {
        if role == Role::Agent && content.trim().is_empty() {
            return;
        }
        self.transcript.push(ConversationMessage {
            role,
            kind,
            content,
            timestamp: at,
        });
    }

    /// Runs one user turn. A blank message is rejected before the turn starts.
    pub async fn handle_turn(&mut self, st: &AppState, text: &str) -> Result<TurnResult, LogError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LogError::EmptyInput);
        }

        self.state = TurnState::ProcessingTurn;
        let start = self.transcript.len();
        let history = self.transcript.clone();
        self.push(Role::User, MessageKind::Text, text.to_string(), st.days.now());

        let logged = self.run_turn(st, text, history).await;

        self.state = TurnState::AwaitingUserInput;
        debug!(session_id = %self.id, added = self.transcript.len() - start, "turn finished");
        Ok(TurnResult {
            messages: self.transcript[start..].to_vec(),
            logged,
        })
    }

    async fn run_turn(
        &mut self,
        st: &AppState,
        text: &str,
        history: Vec<ConversationMessage>,
    ) -> Option<LogOutcome> {
        let timeout = st.config.collaborator.timeout();
        let reply = match tokio::time::timeout(timeout, st.agent.respond(text, &history)).await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(session_id = %self.id, ?timeout, "chat agent timed out");
                self.push(Role::Agent, MessageKind::Error, AGENT_UNAVAILABLE.to_string(), st.days.now());
                return None;
            }
        };
        let turn = match reply {
            Ok(turn) => turn,
            Err(e) => {
                let shown = match e {
                    CollaboratorError::Rejected(msg) => msg,
                    other => {
                        warn!(session_id = %self.id, error = %other, "chat agent failed");
                        AGENT_UNAVAILABLE.to_string()
                    }
                };
                self.push(Role::Agent, MessageKind::Error, shown, st.days.now());
                return None;
            }
        };

        let Some(intent) = turn.food_log else {
            self.push(Role::Agent, MessageKind::Text, turn.reply, st.days.now());
            return None;
        };

        let request = LogRequest {
            description: intent.description,
            meal_type: intent.meal_type,
            history,
        };
        match log_meal(st, self.user_id, request).await {
            Ok(outcome) => {
                info!(session_id = %self.id, meal_id = %outcome.meal.id(), "meal logged from chat");
                let reply = with_confirmation(&turn.reply, &outcome.meal);
                self.push(Role::Agent, MessageKind::Text, reply, st.days.now());
                if let Some(snapshot) = &outcome.snapshot {
                    let insights = render_insights(&snapshot.recommendations);
                    self.push(Role::Agent, MessageKind::Insights, insights, st.days.now());
                }
                Some(outcome)
            }
            Err(e) => {
                self.push(Role::Agent, MessageKind::Error, e.user_message(), st.days.now());
                None
            }
        }
    }
}

fn with_confirmation(reply: &str, meal: &MealLog) -> String {
    let names: Vec<&str> = meal.foods().iter().map(|f| f.name()).collect();
    let t = meal.total_nutrition();
    let confirmation = format!(
        "Logged {} for {}: {} cal, {}g protein, {}g carbs, {}g fat.",
        names.join(", "),
        meal.meal_type(),
        t.calories.round(),
        t.protein.round(),
        t.carbs.round(),
        t.fat.round()
    );
    if reply.trim().is_empty() {
        confirmation
    } else {
        format!("{}\n\n{}", reply.trim(), confirmation)
    }
}

fn render_insights(recs: &[Recommendation]) -> String {
    recs.iter()
        .map(|r| format!("{} {}", r.icon, r.message))
        .collect::<Vec<_>>()
        .join("\n")
}

struct SessionEntry {
    user_id: Uuid,
    last_active: OffsetDateTime,
    session: Arc<Mutex<ConversationSession>>,
}

/// Open sessions by id. A session is only visible to the user who started it.
/// Sessions idle for longer than the TTL are discarded on the next access or sweep.
pub struct SessionRegistry {
    days: LocalDays,
    idle_ttl: Duration,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(days: LocalDays, idle_ttl: Duration) -> Self {
        Self {
            days,
            idle_ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a session. A user already at [`MAX_SESSIONS_PER_USER`] loses their least recently used one.
    pub async fn start(&self, user_id: Uuid) -> SessionView {
        let now = self.days.now();
        let session = ConversationSession::new(user_id, now);
        let view = session.view();

        let mut sessions = self.sessions.write().await;
        self.evict_idle_locked(&mut sessions, now);
        let mut own: Vec<(Uuid, OffsetDateTime)> = sessions
            .iter()
            .filter(|(_, e)| e.user_id == user_id)
            .map(|(id, e)| (*id, e.last_active))
            .collect();
        if own.len() >= MAX_SESSIONS_PER_USER {
            own.sort_by_key(|(_, at)| *at);
            for (id, _) in own.iter().take(own.len() + 1 - MAX_SESSIONS_PER_USER) {
                sessions.remove(id);
                info!(%user_id, session_id = %id, "chat session dropped, too many open");
            }
        }
        sessions.insert(
            session.id(),
            SessionEntry {
                user_id,
                last_active: now,
                session: Arc::new(Mutex::new(session)),
            },
        );
        info!(%user_id, session_id = %view.id, "chat session started");
        view
    }

    /// Looks the session up and marks it active.
    pub async fn get(&self, user_id: Uuid, session_id: Uuid) -> Option<Arc<Mutex<ConversationSession>>> {
        let now = self.days.now();
        let mut sessions = self.sessions.write().await;
        self.evict_idle_locked(&mut sessions, now);
        let entry = sessions.get_mut(&session_id).filter(|e| e.user_id == user_id)?;
        entry.last_active = now;
        Some(entry.session.clone())
    }

    /// Discards the session. Returns false if the user has no such session.
    pub async fn end(&self, user_id: Uuid, session_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&session_id) {
            Some(e) if e.user_id == user_id => {
                sessions.remove(&session_id);
                info!(%user_id, %session_id, "chat session ended");
                true
            }
            _ => false,
        }
    }

    /// Drops every idle session. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let now = self.days.now();
        let mut sessions = self.sessions.write().await;
        self.evict_idle_locked(&mut sessions, now)
    }

    fn evict_idle_locked(&self, sessions: &mut HashMap<Uuid, SessionEntry>, now: OffsetDateTime) -> usize {
        let before = sessions.len();
        sessions.retain(|_, e| now - e.last_active < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "idle chat sessions evicted");
        }
        evicted
    }

    /// Sweeps idle sessions every `every` until the registry is dropped.
    pub fn spawn_sweeper(registry: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::downgrade(registry);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.evict_idle().await;
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{AgentTurn, FoodLogIntent};
    use crate::meals::model::MealType;
    use crate::test_support::{food, Harness};

    fn session(h: &Harness, user: Uuid) -> ConversationSession {
        ConversationSession::new(user, h.state.days.now())
    }

    fn registry(h: &Harness) -> SessionRegistry {
        SessionRegistry::new(h.state.days.clone(), Duration::minutes(60))
    }

    fn log_turn(reply: &str, description: &str) -> AgentTurn {
        AgentTurn {
            reply: reply.into(),
            food_log: Some(FoodLogIntent {
                description: description.into(),
                meal_type: MealType::Lunch,
            }),
        }
    }

    #[tokio::test]
    async fn logged_meal_adds_reply_and_insights() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let mut s = session(&h, user);
        h.agent.push(Ok(log_turn("Got it!", "chicken and rice")));
        h.parser.push(Ok(vec![
            food("chicken", 300.0, 40.0),
            food("rice", 200.0, 4.0),
        ]));

        let result = s.handle_turn(&h.state, "chicken and rice for lunch").await.unwrap();

        let roles: Vec<(Role, MessageKind)> = s.transcript().iter().map(|m| (m.role, m.kind)).collect();
        assert_eq!(
            roles,
            vec![
                (Role::User, MessageKind::Text),
                (Role::Agent, MessageKind::Text),
                (Role::Agent, MessageKind::Insights),
            ]
        );
        let reply = &s.transcript()[1].content;
        assert!(reply.starts_with("Got it!"));
        assert!(reply.contains("chicken, rice"));
        assert!(reply.contains("500 cal"));
        assert_eq!(result.messages.len(), 3);
        assert!(result.logged.is_some());
        assert_eq!(s.state(), TurnState::AwaitingUserInput);
        assert_eq!(h.store.count(user).await, 1);
    }

    #[tokio::test]
    async fn parse_failure_becomes_agent_error_message() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let mut s = session(&h, user);
        h.agent.push(Ok(log_turn("", "asdkjh")));
        h.parser.push(Err(CollaboratorError::Rejected(
            "I don't recognize 'asdkjh'".into(),
        )));

        let result = s.handle_turn(&h.state, "asdkjh").await.unwrap();

        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.transcript()[0].role, Role::User);
        assert_eq!(s.transcript()[1].kind, MessageKind::Error);
        assert_eq!(s.transcript()[1].content, "I don't recognize 'asdkjh'");
        assert!(result.logged.is_none());
        assert_eq!(h.store.count(user).await, 0);
    }

    #[tokio::test]
    async fn agent_error_keeps_user_message() {
        let h = Harness::new();
        let mut s = session(&h, Uuid::new_v4());
        h.agent.push(Err(CollaboratorError::Status(502)));

        s.handle_turn(&h.state, "hello?").await.unwrap();

        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.transcript()[0].content, "hello?");
        assert_eq!(s.transcript()[1].kind, MessageKind::Error);
        assert_eq!(s.transcript()[1].content, AGENT_UNAVAILABLE);
    }

    #[tokio::test]
    async fn blank_agent_reply_is_suppressed() {
        let h = Harness::new();
        let mut s = session(&h, Uuid::new_v4());
        h.agent.push(Ok(AgentTurn {
            reply: "  ".into(),
            food_log: None,
        }));

        let result = s.handle_turn(&h.state, "ok").await.unwrap();
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn blank_user_message_leaves_transcript_untouched() {
        let h = Harness::new();
        let mut s = session(&h, Uuid::new_v4());

        let err = s.handle_turn(&h.state, " \t ").await.unwrap_err();
        assert!(matches!(err, LogError::EmptyInput));
        assert!(s.transcript().is_empty());
        assert_eq!(h.agent.calls(), 0);
    }

    #[tokio::test]
    async fn agent_sees_prior_transcript() {
        let h = Harness::new();
        let mut s = session(&h, Uuid::new_v4());
        h.agent.push(Ok(AgentTurn {
            reply: "Hi! What did you eat?".into(),
            food_log: None,
        }));
        h.agent.push(Ok(AgentTurn {
            reply: "Noted.".into(),
            food_log: None,
        }));

        s.handle_turn(&h.state, "hi").await.unwrap();
        s.handle_turn(&h.state, "nothing yet").await.unwrap();

        assert_eq!(h.agent.history_lens(), vec![0, 2]);
        assert_eq!(s.transcript().len(), 4);
    }

    #[tokio::test]
    async fn registry_scopes_sessions_to_their_user() {
        let h = Harness::new();
        let registry = registry(&h);
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());

        let view = registry.start(me).await;
        assert!(registry.get(me, view.id).await.is_some());
        assert!(registry.get(other, view.id).await.is_none());
        assert!(!registry.end(other, view.id).await);
        assert!(registry.end(me, view.id).await);
        assert!(registry.get(me, view.id).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn slow_agent_times_out_as_unavailable() {
        let h = Harness::new();
        let mut s = session(&h, Uuid::new_v4());
        h.agent.set_delay(std::time::Duration::from_millis(
            h.state.config.collaborator.timeout_ms * 10,
        ));

        let result = s.handle_turn(&h.state, "what should I eat?").await.unwrap();

        assert!(result.logged.is_none());
        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.transcript()[0].content, "what should I eat?");
        assert_eq!(s.transcript()[1].kind, MessageKind::Error);
        assert_eq!(s.transcript()[1].content, AGENT_UNAVAILABLE);
        assert_eq!(s.state(), TurnState::AwaitingUserInput);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_after_the_ttl() {
        let h = Harness::new();
        let registry = registry(&h);
        let user = Uuid::new_v4();

        for _ in 0..5 {
            registry.start(Uuid::new_v4()).await;
        }
        let active = registry.start(user).await.id;

        h.clock.advance(Duration::minutes(45));
        assert!(registry.get(user, active).await.is_some());
        h.clock.advance(Duration::minutes(45));

        assert_eq!(registry.evict_idle().await, 5);
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(user, active).await.is_some());

        h.clock.advance(Duration::days(30));
        assert!(registry.get(user, active).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn start_drops_the_least_recent_session_past_the_cap() {
        let h = Harness::new();
        let registry = registry(&h);
        let user = Uuid::new_v4();

        let first = registry.start(user).await.id;
        for _ in 1..MAX_SESSIONS_PER_USER {
            h.clock.advance(Duration::seconds(1));
            registry.start(user).await;
        }
        assert_eq!(registry.len().await, MAX_SESSIONS_PER_USER);

        h.clock.advance(Duration::seconds(1));
        registry.start(user).await;
        assert_eq!(registry.len().await, MAX_SESSIONS_PER_USER);
        assert!(registry.get(user, first).await.is_none());
    }
}
