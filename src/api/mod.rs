pub mod http;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{
    Connection, CreatePostRequest, Credentials, HealthStatus, Platform, PostResponse,
    RegisterRequest, Token, User,
};
use async_trait::async_trait;

/// Абстрактный интерфейс к бэкенду публикаций.
///
/// Методы, требующие авторизации, принимают bearer токен явно: сессия живёт
/// в `AuthContext`, а не в клиенте.
#[async_trait]
pub trait PublisherApi: Send + Sync {
    /// Регистрирует пользователя и сразу выдаёт токен
    async fn register(&self, request: &RegisterRequest) -> AppResult<Token>;

    async fn login(&self, cred: &Credentials) -> AppResult<Token>;

    /// Информация о владельце токена
    async fn me(&self, token: &str) -> AppResult<User>;

    async fn logout(&self, token: &str) -> AppResult<()>;

    /// Все подключения пользователя, включая неактивные
    async fn list_connections(&self, token: &str) -> AppResult<Vec<Connection>>;

    /// Возвращает URL авторизации OAuth для платформы
    async fn connect_url(&self, token: &str, platform: Platform) -> AppResult<String>;

    async fn disconnect(&self, token: &str, platform: Platform) -> AppResult<()>;

    /// Публикует пост на нескольких платформах одним вызовом
    async fn create_post(&self, token: &str, request: &CreatePostRequest) -> AppResult<PostResponse>;

    async fn post_history(&self, token: &str, limit: u32, offset: u32) -> AppResult<Vec<PostResponse>>;

    async fn health(&self) -> AppResult<HealthStatus>;
}

/// Фабрика для создания API клиента на основе конфигурации
pub fn create_api_client(config: &Config) -> AppResult<Box<dyn PublisherApi>> {
    Ok(Box::new(http::HttpPublisherClient::new(config)?))
}

#[cfg(test)]
pub(crate) mod fake {
    //! Поддельный бэкенд для тестов компонентов: отвечает заготовками и
    //! записывает все вызовы.

    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Register(RegisterRequest),
        Login(String),
        Me,
        Logout,
        ListConnections,
        ConnectUrl(Platform),
        Disconnect(Platform),
        CreatePost(CreatePostRequest),
        History(u32, u32),
    }

    #[derive(Default)]
    pub struct FakeApi {
        pub calls: Mutex<Vec<Call>>,
        pub connections: Mutex<Vec<Connection>>,
        /// Подключения, которые станут активны после N-го запроса списка
        pub activate_after: Mutex<Option<(usize, Connection)>>,
        pub post_response: Mutex<Option<PostResponse>>,
        pub fail_with: Mutex<Option<(u16, Option<String>)>>,
        /// Отказ только для запросов списка подключений
        pub fail_lists: Mutex<bool>,
        pub user: Mutex<Option<User>>,
    }

    impl FakeApi {
        pub fn with_connections(connections: Vec<Connection>) -> Self {
            let api = FakeApi::default();
            *api.connections.lock().unwrap() = connections;
            api
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn list_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::ListConnections))
                .count()
        }

        fn record(&self, call: Call) -> AppResult<()> {
            self.calls.lock().unwrap().push(call);
            match self.fail_with.lock().unwrap().clone() {
                Some((status, detail)) => Err(AppError::api(status, detail, "request failed")),
                None => Ok(()),
            }
        }

        fn token() -> Token {
            Token {
                access_token: "tok-123".into(),
                token_type: "bearer".into(),
                expires_in: 1800,
            }
        }
    }

    pub fn connection(platform: Platform, is_active: bool) -> Connection {
        Connection {
            platform,
            is_active,
            platform_username: Some(format!("{}_user", platform.id())),
            platform_user_id: None,
            created_at: None,
        }
    }

    #[async_trait]
    impl PublisherApi for FakeApi {
        async fn register(&self, request: &RegisterRequest) -> AppResult<Token> {
            self.record(Call::Register(request.clone()))?;
            Ok(Self::token())
        }

        async fn login(&self, cred: &Credentials) -> AppResult<Token> {
            self.record(Call::Login(cred.email.clone()))?;
            Ok(Self::token())
        }

        async fn me(&self, _token: &str) -> AppResult<User> {
            self.record(Call::Me)?;
            Ok(self.user.lock().unwrap().clone().unwrap_or(User {
                id: 1,
                email: "jane@example.com".into(),
                username: "jane".into(),
                is_active: true,
            }))
        }

        async fn logout(&self, _token: &str) -> AppResult<()> {
            self.record(Call::Logout)
        }

        async fn list_connections(&self, _token: &str) -> AppResult<Vec<Connection>> {
            self.record(Call::ListConnections)?;
            if *self.fail_lists.lock().unwrap() {
                return Err(AppError::api(503, None, "request failed"));
            }
            let n = self.list_calls();
            let mut conns = self.connections.lock().unwrap();
            if let Some((after, conn)) = self.activate_after.lock().unwrap().clone() {
                if n >= after {
                    conns.retain(|c| c.platform != conn.platform);
                    conns.push(conn);
                }
            }
            Ok(conns.clone())
        }

        async fn connect_url(&self, _token: &str, platform: Platform) -> AppResult<String> {
            self.record(Call::ConnectUrl(platform))?;
            Ok(format!("https://auth.example.com/{}", platform))
        }

        async fn disconnect(&self, _token: &str, platform: Platform) -> AppResult<()> {
            self.record(Call::Disconnect(platform))?;
            self.connections
                .lock()
                .unwrap()
                .retain(|c| c.platform != platform);
            Ok(())
        }

        async fn create_post(&self, _token: &str, request: &CreatePostRequest) -> AppResult<PostResponse> {
            self.record(Call::CreatePost(request.clone()))?;
            Ok(self.post_response.lock().unwrap().clone().unwrap_or_default())
        }

        async fn post_history(&self, _token: &str, limit: u32, offset: u32) -> AppResult<Vec<PostResponse>> {
            self.record(Call::History(limit, offset))?;
            Ok(self.post_response.lock().unwrap().clone().into_iter().collect())
        }

        async fn health(&self) -> AppResult<HealthStatus> {
            Ok(HealthStatus {
                status: "healthy".into(),
            })
        }
    }
}
