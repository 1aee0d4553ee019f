use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Сообщение для любого сбоя транспорта (запрос так и не завершился)
pub const NETWORK_ERROR: &str = "Network error";

/// Ошибки локальной валидации форм. До сети не доходят.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Post content cannot be empty")]
    EmptyContent,

    #[error("Select at least one platform")]
    NoPlatformSelected,

    #[error("Content exceeds the {limit} character limit by {over}")]
    OverLimit { limit: usize, over: usize },

    #[error("Platform {0} is not connected")]
    PlatformNotConnected(String),

    #[error("A request is already in progress")]
    Busy,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Ответ не 2xx. `detail` берётся из тела ответа, если бэкенд его прислал,
    /// иначе `message` содержит запасной текст.
    #[error("{message}")]
    Api {
        status: u16,
        detail: Option<String>,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Not logged in. Run `socialpub login` first")]
    NotAuthenticated,

    #[error("Timeout waiting for server response")]
    Timeout,

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("{0}")]
    Custom(String),
}

impl AppError {
    /// Текст для пользователя: ошибки транспорта сводятся к общему сообщению,
    /// остальные показываются как есть.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NetworkError(_) | AppError::Timeout => NETWORK_ERROR.to_string(),
            other => other.to_string(),
        }
    }

    pub fn api(status: u16, detail: Option<String>, fallback: impl Into<String>) -> Self {
        let message = detail.clone().unwrap_or_else(|| fallback.into());
        AppError::Api {
            status,
            detail,
            message,
        }
    }

    /// Подменяет запасное сообщение ошибки API на специфичное для действия.
    /// Сообщение бэкенда (`detail`) не трогается.
    pub fn with_fallback(self, fallback: impl Into<String>) -> Self {
        match self {
            AppError::Api { status, detail, .. } => AppError::api(status, detail, fallback),
            other => other,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Api { status: 401, .. } | AppError::NotAuthenticated)
    }
}
