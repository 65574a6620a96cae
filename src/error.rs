use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Tag extraction error: {0}")]
    Tag(String),
    #[error("Substitution error: template references group '{group}' which did not capture")]
    Substitution { group: String },
    #[error("Template error: {message} at offset {offset}")]
    Template { message: String, offset: usize },
    #[error("Regex error: {0}")]
    Regex(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

// Helper conversions
impl From<rusqlite::Error> for ExtractError {
    fn from(e: rusqlite::Error) -> Self { Self::Query(e.to_string()) }
}
impl From<regex::Error> for ExtractError {
    fn from(e: regex::Error) -> Self { Self::Regex(e.to_string()) }
}
impl From<config::ConfigError> for ExtractError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for ExtractError {
    fn from(e: serde_json::Error) -> Self { Self::Config(e.to_string()) }
}
impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self { Self::Io(e.to_string()) }
}
