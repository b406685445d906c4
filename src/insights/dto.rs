use serde::{Deserialize, Serialize};

use super::recommendations::Recommendation;

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub days: Option<u32>,
    #[serde(default = "default_detail")]
    pub detail: bool,
}

fn default_detail() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
}
