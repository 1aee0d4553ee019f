use crate::error::{AppError, AppResult, ValidationError};
use crate::models::User;
use crate::session::AuthContext;
use fancy_regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, error};

pub const MIN_PASSWORD_LEN: usize = 6;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s.]+$";

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| match Regex::new(EMAIL_PATTERN) {
    Ok(re) => Some(re),
    Err(e) => {
        error!("Regex error while compiling email pattern: {}", e);
        None
    }
});

/// Проверяет, похожа ли строка на email адрес.
/// Точную проверку делает бэкенд.
pub fn looks_like_email(email: &str) -> bool {
    match EMAIL_RE.as_ref() {
        Some(re) => re.is_match(email.trim()).unwrap_or(false),
        // Без шаблона решение остаётся за бэкендом
        None => true,
    }
}

/// Локальная проверка формы регистрации. Порядок: совпадение паролей,
/// длина пароля, email, имя пользователя.
pub fn validate(email: &str, username: &str, password: &str, confirm: &str) -> AppResult<()> {
    if password != confirm {
        return Err(ValidationError::PasswordMismatch.into());
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN }.into());
    }

    if !looks_like_email(email) {
        return Err(AppError::InvalidEmail(email.to_string()));
    }

    if username.trim().is_empty() {
        return Err(ValidationError::EmptyUsername.into());
    }

    Ok(())
}

#[derive(Debug, Default)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    busy: bool,
    error: Option<String>,
}

impl RegisterForm {
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        RegisterForm {
            email: email.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_passwords(mut self, password: impl Into<String>, confirm: impl Into<String>) -> Self {
        self.password = password.into();
        self.confirm_password = confirm.into();
        self
    }

    /// Пока идёт запрос, поля формы недоступны
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Проверяет форму и регистрирует пользователя через контекст
    /// авторизации. Ошибка валидации не доходит до сети.
    pub async fn submit<'a>(&mut self, auth: &'a mut AuthContext) -> AppResult<&'a User> {
        if self.busy {
            return Err(ValidationError::Busy.into());
        }
        self.error = None;

        if let Err(e) = validate(&self.email, &self.username, &self.password, &self.confirm_password) {
            debug!("Registration form rejected: {}", e);
            self.error = Some(e.user_message());
            return Err(e);
        }

        self.busy = true;
        let result = auth
            .register(&self.email, &self.username, &self.password)
            .await;
        self.busy = false;

        match result {
            Ok(user) => Ok(user),
            Err(e) => {
                let e = e.with_fallback("Registration failed");
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }
}
