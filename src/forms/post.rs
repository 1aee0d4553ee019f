use crate::api::PublisherApi;
use crate::error::{AppResult, ValidationError};
use crate::models::{CreatePostRequest, Platform, PlatformDescriptor, PostResponse};
use crate::store::{ConnectionSnapshot, ConnectionStore};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PUBLISH_ERROR: &str = "Failed to publish post";

/// Действующий лимит символов: минимум по выбранным платформам.
/// `None`, если ничего не выбрано.
pub fn character_limit(platforms: &[Platform]) -> Option<usize> {
    platforms.iter().map(|p| p.max_length()).min()
}

/// Сколько символов осталось; отрицательное значение означает превышение
pub fn remaining_chars(limit: Option<usize>, content: &str) -> Option<i64> {
    limit.map(|limit| limit as i64 - content.chars().count() as i64)
}

pub fn is_over_limit(limit: Option<usize>, content: &str) -> bool {
    remaining_chars(limit, content).is_some_and(|r| r < 0)
}

/// Форма публикации поста.
///
/// Черновик (`content` + выбранные платформы) живёт только в форме и
/// очищается после успешной отправки.
pub struct PostForm {
    api: Arc<dyn PublisherApi>,
    store: ConnectionStore,
    content: String,
    selected: Vec<Platform>,
    schedule: Option<DateTime<Utc>>,
    busy: bool,
    error: Option<String>,
    result: Option<PostResponse>,
}

impl PostForm {
    pub fn new(api: Arc<dyn PublisherApi>, store: ConnectionStore) -> Self {
        PostForm {
            api,
            store,
            content: String::new(),
            selected: Vec::new(),
            schedule: None,
            busy: false,
            error: None,
            result: None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn set_schedule(&mut self, at: Option<DateTime<Utc>>) {
        self.schedule = at;
    }

    pub fn selected(&self) -> &[Platform] {
        &self.selected
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Итоги последней успешной отправки
    pub fn result(&self) -> Option<&PostResponse> {
        self.result.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Платформы, на которые сейчас можно публиковать
    pub async fn available_platforms(&self) -> Vec<&'static PlatformDescriptor> {
        available(&self.store.snapshot().await)
    }

    /// Включает или выключает платформу. Выбрать можно только активно
    /// подключённую.
    pub async fn toggle(&mut self, platform: Platform) -> AppResult<()> {
        if let Some(pos) = self.selected.iter().position(|p| *p == platform) {
            self.selected.remove(pos);
            return Ok(());
        }
        if !self.store.snapshot().await.is_connected(platform) {
            return Err(ValidationError::PlatformNotConnected(platform.to_string()).into());
        }
        self.selected.push(platform);
        Ok(())
    }

    pub fn character_limit(&self) -> Option<usize> {
        character_limit(&self.selected)
    }

    pub fn remaining_chars(&self) -> Option<i64> {
        remaining_chars(self.character_limit(), &self.content)
    }

    pub fn is_over_limit(&self) -> bool {
        is_over_limit(self.character_limit(), &self.content)
    }

    /// Состояние кнопки "опубликовать"
    pub async fn can_submit(&self) -> bool {
        !self.is_busy()
            && !self.available_platforms().await.is_empty()
            && !self.selected.is_empty()
            && !self.content.trim().is_empty()
            && !self.is_over_limit()
    }

    fn check(&self, snapshot: &ConnectionSnapshot) -> Result<(), ValidationError> {
        if self.is_busy() {
            return Err(ValidationError::Busy);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if self.selected.is_empty() {
            return Err(ValidationError::NoPlatformSelected);
        }
        if let Some(missing) = self.selected.iter().find(|p| !snapshot.is_connected(**p)) {
            return Err(ValidationError::PlatformNotConnected(missing.to_string()));
        }
        if let (Some(limit), Some(remaining)) = (self.character_limit(), self.remaining_chars()) {
            if remaining < 0 {
                return Err(ValidationError::OverLimit {
                    limit,
                    over: remaining.unsigned_abs() as usize,
                });
            }
        }
        Ok(())
    }

    /// Отправляет пост на публикацию. Ошибки валидации выставляются
    /// в форму и до сети не доходят.
    pub async fn submit(&mut self, token: &str) -> AppResult<PostResponse> {
        let snapshot = self.store.snapshot().await;
        if let Err(e) = self.check(&snapshot) {
            debug!("Post form rejected: {}", e);
            self.error = Some(e.to_string());
            return Err(e.into());
        }

        let request = CreatePostRequest {
            content: self.content.trim().to_string(),
            platforms: self.selected.clone(),
            media_urls: Vec::new(),
            scheduled_at: self.schedule,
        };

        self.busy = true;
        self.error = None;
        self.result = None;
        let outcome = self.api.create_post(token, &request).await;
        self.busy = false;

        match outcome {
            Ok(response) => {
                let failed = response.results.iter().filter(|r| !r.is_success()).count();
                if failed > 0 {
                    warn!("{} of {} platforms failed", failed, response.results.len());
                }
                info!("Post submitted to {} platforms", request.platforms.len());
                self.content.clear();
                self.selected.clear();
                self.schedule = None;
                self.result = Some(response.clone());
                Ok(response)
            }
            Err(e) => {
                let e = e.with_fallback(PUBLISH_ERROR);
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub async fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "New post");

        if let Some(error) = &self.error {
            let _ = writeln!(out, "  ! {}", error);
        }
        if let Some(result) = &self.result {
            out.push_str(&render_results(result));
        }

        let available = self.available_platforms().await;
        if available.is_empty() {
            let _ = writeln!(
                out,
                "  No platform connected. Connect at least one social platform to publish."
            );
        } else {
            for descriptor in available {
                let mark = if self.selected.contains(&descriptor.platform) { "x" } else { " " };
                let _ = writeln!(
                    out,
                    "  [{}] {:<10} max {} chars",
                    mark, descriptor.name, descriptor.max_length
                );
            }
        }

        if let Some(remaining) = self.remaining_chars() {
            let flag = if remaining < 0 { " (over limit)" } else { "" };
            let _ = writeln!(out, "  {} characters remaining{}", remaining, flag);
        }
        out
    }
}

fn available(snapshot: &ConnectionSnapshot) -> Vec<&'static PlatformDescriptor> {
    snapshot
        .active_platforms()
        .into_iter()
        .map(Platform::descriptor)
        .collect()
}

/// Список итогов по платформам
pub fn render_results(response: &PostResponse) -> String {
    let mut out = String::new();
    let scheduled = response.status == "scheduled";
    let headline = if scheduled {
        "Post scheduled"
    } else {
        "Post published"
    };
    let _ = writeln!(out, "  {} ({})", headline, response.status);
    for result in &response.results {
        let verdict = if result.is_success() { "Published" } else { "Error" };
        let _ = write!(out, "    {} {} - {}", if result.is_success() { "+" } else { "-" }, result.platform, verdict);
        if let Some(error) = &result.error {
            let _ = write!(out, ": {}", error);
        }
        out.push('\n');
    }
    out
}
