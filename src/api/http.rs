use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    ConnectResponse, Connection, CreatePostRequest, Credentials, HealthStatus, Platform,
    PostResponse, RegisterRequest, Token, User,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info};

const USER_AGENT: &str = "socialpub/0.1";

pub struct HttpPublisherClient {
    http_client: Client,
    base_url: String,
    debug: bool,
}

impl HttpPublisherClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(HttpPublisherClient {
            http_client,
            base_url: config.base_url().to_string(),
            debug: config.debug,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_auth_header(token: &str) -> String {
        format!("Bearer {}", token)
    }

    /// Отправляет запрос и превращает ответ не 2xx в `AppError::Api`
    async fn send(&self, request: RequestBuilder, fallback: &str) -> AppResult<Response> {
        let response = request.send().await.map_err(|e| {
            error!("Request failed: {}", e);
            if e.is_timeout() {
                AppError::Timeout
            } else {
                AppError::NetworkError(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Тело ошибки может быть не JSON, тогда detail просто отсутствует
        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        error!("API returned status: {} ({:?})", status, detail);
        Err(AppError::api(status.as_u16(), detail, fallback))
    }

    async fn json<T: DeserializeOwned>(&self, response: Response) -> AppResult<T> {
        let body = response.text().await?;
        if self.debug {
            debug!("Response body: {}", body);
        }
        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response JSON: {}", e);
            AppError::JsonError(e)
        })
    }
}

/// Достаёт сообщение бэкенда из тела ошибки.
///
/// FastAPI отдаёт `{"detail": "..."}`, а для ошибок валидации запроса
/// `{"detail": [{"msg": "..."}, ...]}`.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

#[async_trait]
impl super::PublisherApi for HttpPublisherClient {
    async fn register(&self, request: &RegisterRequest) -> AppResult<Token> {
        debug!("Registering user: {}", request.username);

        let response = self
            .send(
                self.http_client.post(self.url("/auth/register")).json(request),
                "Registration failed",
            )
            .await?;

        let token: Token = self.json(response).await?;
        info!("Registered user: {}", request.username);
        Ok(token)
    }

    async fn login(&self, cred: &Credentials) -> AppResult<Token> {
        debug!("Logging in: {}", cred.email);

        let response = self
            .send(
                self.http_client.post(self.url("/auth/login")).json(cred),
                "Login failed",
            )
            .await?;

        let token: Token = self.json(response).await?;
        info!("Logged in: {}", cred.email);
        Ok(token)
    }

    async fn me(&self, token: &str) -> AppResult<User> {
        let response = self
            .send(
                self.http_client
                    .get(self.url("/auth/me"))
                    .header("Authorization", Self::get_auth_header(token)),
                "Failed to load user",
            )
            .await?;

        self.json(response).await
    }

    async fn logout(&self, token: &str) -> AppResult<()> {
        self.send(
            self.http_client
                .post(self.url("/auth/logout"))
                .header("Authorization", Self::get_auth_header(token)),
            "Logout failed",
        )
        .await?;

        Ok(())
    }

    async fn list_connections(&self, token: &str) -> AppResult<Vec<Connection>> {
        debug!("Fetching social connections");

        let response = self
            .send(
                self.http_client
                    .get(self.url("/social/tokens"))
                    .header("Authorization", Self::get_auth_header(token)),
                "Failed to load connections",
            )
            .await?;

        let connections: Vec<Connection> = self.json(response).await?;
        debug!("Fetched {} connections", connections.len());
        Ok(connections)
    }

    async fn connect_url(&self, token: &str, platform: Platform) -> AppResult<String> {
        debug!("Requesting OAuth URL for {}", platform);

        let response = self
            .send(
                self.http_client
                    .get(self.url(&format!("/social/connect/{}", platform.id())))
                    .header("Authorization", Self::get_auth_header(token)),
                &format!("Failed to connect to {}", platform),
            )
            .await?;

        let data: ConnectResponse = self.json(response).await?;
        Ok(data.auth_url)
    }

    async fn disconnect(&self, token: &str, platform: Platform) -> AppResult<()> {
        debug!("Disconnecting {}", platform);

        self.send(
            self.http_client
                .delete(self.url(&format!("/social/disconnect/{}", platform.id())))
                .header("Authorization", Self::get_auth_header(token)),
            &format!("Failed to disconnect from {}", platform),
        )
        .await?;

        info!("Disconnected {}", platform);
        Ok(())
    }

    async fn create_post(&self, token: &str, request: &CreatePostRequest) -> AppResult<PostResponse> {
        debug!("Publishing post to {:?}", request.platforms);

        let response = self
            .send(
                self.http_client
                    .post(self.url("/posts/create"))
                    .header("Authorization", Self::get_auth_header(token))
                    .json(request),
                "Failed to publish post",
            )
            .await?;

        let post: PostResponse = self.json(response).await?;
        info!("Post {:?} finished with status {}", post.id, post.status);
        Ok(post)
    }

    async fn post_history(&self, token: &str, limit: u32, offset: u32) -> AppResult<Vec<PostResponse>> {
        let response = self
            .send(
                self.http_client
                    .get(self.url("/posts/history"))
                    .header("Authorization", Self::get_auth_header(token))
                    .query(&[("limit", limit), ("offset", offset)]),
                "Failed to load post history",
            )
            .await?;

        self.json(response).await
    }

    async fn health(&self) -> AppResult<HealthStatus> {
        let response = self
            .send(self.http_client.get(self.url("/health")), "Backend is not healthy")
            .await?;

        self.json(response).await
    }
}
