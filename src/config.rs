use crate::models::Platform;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const SESSION_FILE_NAME: &str = "session.json";

#[derive(Parser, Debug, Clone)]
#[command(name = "socialpub")]
#[command(author = "Dabe Vlohn")]
#[command(version = "0.1.0")]
#[command(about = "Publish one post to many social platforms at once")]
pub struct Config {
    /// Адрес API бэкенда публикаций
    /// env: API_BASE_URL
    #[arg(long, global = true, env = "API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Файл сессии (токен и пользователь).
    /// По умолчанию: <config dir>/socialpub/session.json
    /// env: SOCIALPUB_SESSION_FILE
    #[arg(long, global = true, env = "SOCIALPUB_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Таймаут HTTP запроса в секундах
    /// env: SOCIALPUB_TIMEOUT
    #[arg(long, global = true, env = "SOCIALPUB_TIMEOUT", default_value = "30")]
    pub timeout_secs: u64,

    /// Не открывать браузер при подключении, только вывести ссылку
    #[arg(long, global = true, env = "SOCIALPUB_NO_BROWSER")]
    pub no_browser: bool,

    /// Debug режим: выводить JSON ответов
    #[arg(long, global = true, env = "SOCIALPUB_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Создать новый аккаунт
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Пароль. Если не указан, запрашивается интерактивно
        #[arg(long, env = "SOCIALPUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Подтверждение пароля. Если не указано, запрашивается интерактивно
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Войти в существующий аккаунт
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SOCIALPUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Выйти и удалить сохранённую сессию
    Logout,
    /// Показать текущего пользователя
    Whoami,
    /// Показать подключения к платформам
    Connections,
    /// Подключить платформу через OAuth
    Connect {
        #[arg(value_enum)]
        platform: Platform,
    },
    /// Отключить платформу
    Disconnect {
        #[arg(value_enum)]
        platform: Platform,
        /// Не спрашивать подтверждение
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Опубликовать пост на выбранных платформах
    Post {
        content: String,
        /// Платформа для публикации, можно указать несколько раз
        #[arg(long = "platform", short = 'p', value_enum, required = true)]
        platforms: Vec<Platform>,
        /// Отложенная публикация (RFC3339, например 2025-01-01T09:00:00Z)
        #[arg(long)]
        schedule: Option<DateTime<Utc>>,
    },
    /// История публикаций
    History {
        #[arg(long, default_value = "20")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Сводная панель: пользователь, подключения, форма поста, статистика
    Dashboard,
    /// Проверить доступность бэкенда
    Health,
}

impl Config {
    /// Валидирует конфигурацию при запуске
    pub fn validate(&self) -> crate::error::AppResult<()> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(crate::error::AppError::Config(format!(
                "API base URL must start with http:// or https://, got {}",
                self.api_base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(crate::error::AppError::Config(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Базовый URL без завершающего слэша
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session_path(&self) -> PathBuf {
        match &self.session_file {
            Some(path) => path.clone(),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("socialpub")
                .join(SESSION_FILE_NAME),
        }
    }
}
