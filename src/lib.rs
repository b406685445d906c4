pub mod app;
pub mod auth;
pub mod chat;
pub mod clock;
pub mod collab;
pub mod config;
pub mod error;
pub mod events;
pub mod goals;
pub mod insights;
pub mod meals;
pub mod state;

#[cfg(test)]
mod test_support;
