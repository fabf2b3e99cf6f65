//! Error types for Agent Studio.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors reported by a relational store backend.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Agent record loading errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Agent identifier must not be empty")]
    EmptyIdentifier,

    #[error("Agent {id} not found")]
    NotFound { id: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Response for agent {id} was superseded by a newer request")]
    Superseded { id: String },
}

impl LoadError {
    /// Message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Agent not found",
            Self::EmptyIdentifier => "Agent identifier is required",
            Self::Backend(_) | Self::Superseded { .. } => {
                "Failed to load agent data. Please try again."
            }
        }
    }
}

/// Outbound email delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Transport failed: {0}")]
    Transport(String),
}

/// Navigation hand-off errors.
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("Navigation to {route} rejected: {reason}")]
    Rejected { route: String, reason: String },
}

/// Build pipeline state machine errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Cannot transition rendering from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
