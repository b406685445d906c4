use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AgentTurn, ChatAgent, FoodLogIntent, FoodParser, ParseRequest};
use crate::chat::{ConversationMessage, Role};
use crate::config::CollaboratorConfig;
use crate::error::CollaboratorError;
use crate::meals::model::{FoodItem, MealType, NutritionValues};
use crate::meals::services::NO_FOODS_MESSAGE;

/// HTTP client for the nutrition service (`POST /parse`, `POST /chat`).
pub struct HttpNutritionService {
    client: Client,
    base_url: String,
}

impl HttpNutritionService {
    pub fn new(config: &CollaboratorConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, CollaboratorError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                CollaboratorError::Timeout
            } else {
                CollaboratorError::Transport(e)
            }
        })?;

        let status = resp.status();
        // the service reports refusals as 4xx with a JSON error body
        if status.is_server_error() {
            warn!(%status, %url, "nutrition service failure");
            return Err(CollaboratorError::Status(status.as_u16()));
        }
        let body = resp.json::<R>().await?;
        debug!(%status, %url, "nutrition service replied");
        Ok(body)
    }
}

#[derive(Debug, Serialize)]
struct WireHistory<'a> {
    role: &'static str,
    content: &'a str,
}

fn wire_history(history: &[ConversationMessage]) -> Vec<WireHistory<'_>> {
    history
        .iter()
        .map(|m| WireHistory {
            role: match m.role {
                Role::User => "user",
                Role::Agent => "agent",
            },
            content: &m.content,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ParseBody<'a> {
    food_text: &'a str,
    meal_type: MealType,
    conversation_history: Vec<WireHistory<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireNutrition {
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    fiber: Option<f64>,
}

impl From<WireNutrition> for NutritionValues {
    fn from(w: WireNutrition) -> Self {
        NutritionValues::new(
            w.calories.unwrap_or(0.0),
            w.protein.unwrap_or(0.0),
            w.carbs.unwrap_or(0.0),
            w.fat.unwrap_or(0.0),
            w.fiber.unwrap_or(0.0),
        )
    }
}

#[derive(Debug, Deserialize)]
struct WireFood {
    name: String,
    #[serde(default)]
    portion_text: Option<String>,
    #[serde(default)]
    nutrition: Option<WireNutrition>,
    #[serde(default)]
    category: Option<String>,
}

impl From<WireFood> for FoodItem {
    fn from(w: WireFood) -> Self {
        let item = FoodItem::new(
            w.name,
            w.portion_text.unwrap_or_else(|| "1 serving".into()),
            w.nutrition.unwrap_or_default().into(),
        );
        match w.category {
            Some(c) if !c.trim().is_empty() => item.with_category(c),
            _ => item,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParseReply {
    success: Option<bool>,
    foods: Vec<WireFood>,
    error: Option<String>,
}

fn rejection(error: Option<String>, fallback: &str) -> CollaboratorError {
    CollaboratorError::Rejected(
        error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    )
}

#[async_trait]
impl FoodParser for HttpNutritionService {
    async fn parse(&self, request: ParseRequest) -> Result<Vec<FoodItem>, CollaboratorError> {
        let body = ParseBody {
            food_text: &request.description,
            meal_type: request.meal_type,
            conversation_history: wire_history(&request.history),
        };
        let reply: ParseReply = self.post("/parse", &body).await?;
        if reply.success == Some(false) || reply.error.as_ref().is_some_and(non_blank) {
            return Err(rejection(reply.error, NO_FOODS_MESSAGE));
        }
        Ok(reply.foods.into_iter().map(FoodItem::from).collect())
    }
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    message: &'a str,
    conversation_history: Vec<WireHistory<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatReply {
    agent_response: String,
    intent: Option<String>,
    food_text: Option<String>,
    meal_type: Option<String>,
    needs_clarification: bool,
    clarification_question: Option<String>,
    error: Option<String>,
}

fn non_blank(s: &String) -> bool {
    !s.trim().is_empty()
}

impl ChatReply {
    fn into_turn(self, message: &str) -> Result<AgentTurn, CollaboratorError> {
        if let Some(error) = self.error.filter(non_blank) {
            return Err(CollaboratorError::Rejected(error));
        }
        if self.needs_clarification {
            return Ok(AgentTurn {
                reply: self
                    .clarification_question
                    .filter(non_blank)
                    .unwrap_or(self.agent_response),
                food_log: None,
            });
        }
        let food_log = (self.intent.as_deref() == Some("log_food")).then(|| FoodLogIntent {
            description: self
                .food_text
                .filter(non_blank)
                .unwrap_or_else(|| message.to_string()),
            meal_type: self
                .meal_type
                .and_then(|m| m.parse().ok())
                .unwrap_or_default(),
        });
        Ok(AgentTurn {
            reply: self.agent_response,
            food_log,
        })
    }
}

#[async_trait]
impl ChatAgent for HttpNutritionService {
    async fn respond(
        &self,
        message: &str,
        history: &[ConversationMessage],
    ) -> Result<AgentTurn, CollaboratorError> {
        let body = ChatBody {
            message,
            conversation_history: wire_history(history),
        };
        let reply: ChatReply = self.post("/chat", &body).await?;
        reply.into_turn(message)
    }
}
