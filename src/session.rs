//! Сессия авторизации: токен и пользователь.
//!
//! `AuthContext` передаётся компонентам явно. Жизненный цикл: сессия
//! появляется при `login`/`register` и исчезает при `logout`. Чтобы отдельные
//! запуски CLI видели одну и ту же сессию, она сохраняется в JSON файл.

use crate::api::PublisherApi;
use crate::error::{AppError, AppResult};
use crate::models::{Credentials, RegisterRequest, Token, User};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Файл сессии хранит bearer токен, читать его может только владелец
#[cfg(unix)]
const SESSION_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: Token,
}

/// Файловое хранилище сессии
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        SessionStore { path }
    }

    pub async fn load(&self) -> AppResult<Option<Session>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let session = serde_json::from_slice(&bytes)?;
                debug!("Session restored from {}", self.path.display());
                Ok(Some(session))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, session: &Session) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(session)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(SESSION_FILE_MODE);

        let mut file = options.open(&self.path).await?;
        // mode действует только при создании, старый файл мог остаться с широкими правами
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(SESSION_FILE_MODE))
                .await?;
        }
        file.write_all(&bytes).await?;
        file.flush().await?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    pub async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct AuthContext {
    api: Arc<dyn PublisherApi>,
    store: Option<SessionStore>,
    session: Option<Session>,
}

impl AuthContext {
    pub fn new(api: Arc<dyn PublisherApi>, store: Option<SessionStore>) -> Self {
        AuthContext {
            api,
            store,
            session: None,
        }
    }

    /// Поднимает сохранённую сессию, если она есть
    pub async fn restore(&mut self) -> AppResult<()> {
        if let Some(store) = &self.store {
            self.session = store.load().await?;
        }
        Ok(())
    }

    pub fn api(&self) -> Arc<dyn PublisherApi> {
        Arc::clone(&self.api)
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Bearer токен текущей сессии
    pub fn token(&self) -> AppResult<&str> {
        self.session
            .as_ref()
            .map(|s| s.token.access_token.as_str())
            .ok_or(AppError::NotAuthenticated)
    }

    pub async fn register(&mut self, email: &str, username: &str, password: &str) -> AppResult<&User> {
        let request = RegisterRequest {
            email: email.trim().to_string(),
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let token = self.api.register(&request).await?;
        self.start(token).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> AppResult<&User> {
        let cred = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let token = self.api.login(&cred).await?;
        self.start(token).await
    }

    /// Завершает сессию. Локальная сессия удаляется даже если бэкенд
    /// недоступен: токен без состояния на сервере, выход клиентский.
    pub async fn logout(&mut self) -> AppResult<()> {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.api.logout(&session.token.access_token).await {
                warn!("Backend logout failed, dropping local session anyway: {}", e);
            }
            info!("Logged out {}", session.user.username);
        }
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        Ok(())
    }

    /// Обновляет данные пользователя с бэкенда. Просроченный токен
    /// сбрасывает сессию.
    pub async fn refresh_user(&mut self) -> AppResult<&User> {
        let token = self.token()?.to_string();
        match self.api.me(&token).await {
            Ok(user) => {
                let session = self.session.as_mut().ok_or(AppError::NotAuthenticated)?;
                session.user = user;
                self.persist().await?;
                self.user().ok_or(AppError::NotAuthenticated)
            }
            Err(e) if e.is_unauthorized() => {
                warn!("Session expired, clearing it");
                self.session = None;
                if let Some(store) = &self.store {
                    store.clear().await?;
                }
                Err(AppError::NotAuthenticated)
            }
            Err(e) => Err(e),
        }
    }

    async fn start(&mut self, token: Token) -> AppResult<&User> {
        let user = self.api.me(&token.access_token).await?;
        info!("Session started for {}", user.username);
        self.session = Some(Session { user, token });
        self.persist().await?;
        self.user().ok_or(AppError::NotAuthenticated)
    }

    async fn persist(&self) -> AppResult<()> {
        match (&self.store, &self.session) {
            (Some(store), Some(session)) => store.save(session).await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{Call, FakeApi};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("socialpub-test-{}-{}", std::process::id(), name))
            .join("session.json")
    }

    #[tokio::test]
    async fn token_requires_session() {
        let ctx = AuthContext::new(Arc::new(FakeApi::default()), None);
        assert!(matches!(ctx.token(), Err(AppError::NotAuthenticated)));
        assert!(ctx.user().is_none());
    }

    #[tokio::test]
    async fn login_starts_session_and_persists_it() {
        let path = temp_path("login");
        let api = Arc::new(FakeApi::default());
        let mut ctx = AuthContext::new(api.clone(), Some(SessionStore::new(path.clone())));

        let user = ctx.login(" jane@example.com ", "secret1").await.unwrap();
        assert_eq!(user.username, "jane");
        assert_eq!(ctx.token().unwrap(), "tok-123");
        assert_eq!(api.calls(), vec![Call::Login("jane@example.com".into()), Call::Me]);

        let mut restored = AuthContext::new(api.clone(), Some(SessionStore::new(path.clone())));
        restored.restore().await.unwrap();
        assert_eq!(restored.user().map(|u| u.username.as_str()), Some("jane"));

        restored.logout().await.unwrap();
        assert!(!restored.is_authenticated());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn logout_survives_backend_failure() {
        let api = Arc::new(FakeApi::default());
        let mut ctx = AuthContext::new(api.clone(), None);
        ctx.login("jane@example.com", "secret1").await.unwrap();

        *api.fail_with.lock().unwrap() = Some((500, None));
        tokio_test::assert_ok!(ctx.logout().await);
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn expired_token_clears_session() {
        let api = Arc::new(FakeApi::default());
        let mut ctx = AuthContext::new(api.clone(), None);
        ctx.login("jane@example.com", "secret1").await.unwrap();

        *api.fail_with.lock().unwrap() = Some((401, Some("Could not validate credentials".into())));
        let err = ctx.refresh_user().await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated));
        assert!(!ctx.is_authenticated());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn session_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("mode");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        // Уже существующий файл с широкими правами тоже сужается
        std::fs::write(&path, b"{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let api = Arc::new(FakeApi::default());
        let mut ctx = AuthContext::new(api, Some(SessionStore::new(path.clone())));
        ctx.login("jane@example.com", "secret1").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let saved: Session = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved.token.access_token, "tok-123");
        ctx.logout().await.unwrap();
    }

    #[tokio::test]
    async fn missing_session_file_is_not_an_error() {
        let store = SessionStore::new(temp_path("missing"));
        assert_eq!(store.load().await.unwrap(), None);
        tokio_test::assert_ok!(store.clear().await);
    }
}
