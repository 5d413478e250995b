use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unsupported selector syntax at byte {position} in '{selector}'")]
    Unsupported { selector: String, position: usize },

    #[error("unterminated attribute selector in '{0}'")]
    Unterminated(String),
}

#[derive(Debug, Error)]
pub enum DomError {
    #[error("page snapshot root must be an element")]
    TextRoot,

    #[error("failed to read page snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid page snapshot: {0}")]
    Json(#[from] serde_json::Error),
}
