pub(crate) mod dto;
pub mod handlers;
pub mod memory;
pub mod model;
pub mod repo;
mod repo_types;
pub mod services;

pub use memory::MemoryLogStore;
pub use repo::{LogStore, PgLogStore};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
