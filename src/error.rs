use serde::Serialize;
use thiserror::Error;

/// Failures of the log store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored meal log is unreadable: {0}")]
    Corrupt(String),
}

/// Failures of the parsing / intent collaborator, before they are folded
/// into [`LogError::Parse`].
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The service answered but refused the request. The text is shown to the user as is.
    #[error("{0}")]
    Rejected(String),

    #[error("nutrition service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("nutrition service returned status {0}")]
    Status(u16),

    #[error("nutrition service did not answer in time")]
    Timeout,
}

/// A goal value that could not be used. Always recovered locally.
#[derive(Debug, Error)]
pub enum GoalConfigError {
    #[error("goal {field} is invalid: {value}")]
    Invalid { field: &'static str, value: f64 },

    #[error("goals lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyInput,
    Parse,
    Store,
}

/// Everything a logging attempt can fail with once it reaches the presentation layer.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("food description is empty")]
    EmptyInput,

    #[error("{0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LogError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LogError::EmptyInput => FailureKind::EmptyInput,
            LogError::Parse(_) => FailureKind::Parse,
            LogError::Store(_) => FailureKind::Store,
        }
    }

    /// Text safe to show in the UI or in the chat transcript.
    pub fn user_message(&self) -> String {
        match self {
            LogError::EmptyInput => "Please describe what you ate.".to_string(),
            LogError::Parse(msg) => msg.clone(),
            LogError::Store(_) => "Could not save your meal right now. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_are_shown_verbatim() {
        let err = LogError::Parse("I don't recognize 'asdkjh'".into());
        assert_eq!(err.user_message(), "I don't recognize 'asdkjh'");
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn store_errors_hide_details() {
        let err = LogError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert!(!err.user_message().contains("pool"));
        assert_eq!(err.kind(), FailureKind::Store);
    }
}
