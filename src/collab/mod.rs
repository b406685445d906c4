//! Contracts of the external nutrition service.
//!
//! The service does the natural-language work: it turns a free-text meal
//! description into foods with nutrition, and classifies chat messages.
//! Everything here treats its answers as untrusted input.

mod http;

pub use http::HttpNutritionService;

use async_trait::async_trait;

use crate::chat::ConversationMessage;
use crate::error::CollaboratorError;
use crate::meals::model::{FoodItem, MealType};

#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub description: String,
    pub meal_type: MealType,
    pub history: Vec<ConversationMessage>,
}

#[async_trait]
pub trait FoodParser: Send + Sync {
    /// Foods found in the description, in mention order. May be empty.
    async fn parse(&self, request: ParseRequest) -> Result<Vec<FoodItem>, CollaboratorError>;
}

/// The agent's reading of one chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTurn {
    pub reply: String,
    pub food_log: Option<FoodLogIntent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodLogIntent {
    pub description: String,
    pub meal_type: MealType,
}

#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn respond(
        &self,
        message: &str,
        history: &[ConversationMessage],
    ) -> Result<AgentTurn, CollaboratorError>;
}
