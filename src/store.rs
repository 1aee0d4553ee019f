use crate::api::PublisherApi;
use crate::error::AppResult;
use crate::models::{Connection, Platform};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Снимок списка подключений на момент последнего обновления
#[derive(Debug, Clone, Default)]
pub struct ConnectionSnapshot {
    pub connections: Vec<Connection>,
    /// Растёт при каждом успешном обновлении; 0 значит "ещё не загружали"
    pub generation: u64,
}

impl ConnectionSnapshot {
    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }

    /// Активное подключение к платформе, если есть
    pub fn active(&self, platform: Platform) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.platform == platform && c.is_active)
    }

    pub fn is_connected(&self, platform: Platform) -> bool {
        self.active(platform).is_some()
    }

    /// Платформы, доступные для публикации, в порядке таблицы платформ
    pub fn active_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.is_connected(*p))
            .collect()
    }
}

/// Общий для панели подключений и формы поста кэш подключений.
///
/// Обновляется явно: при загрузке, после connect/disconnect и на каждом шаге
/// ожидания OAuth. Клоны разделяют один снимок.
#[derive(Clone)]
pub struct ConnectionStore {
    api: Arc<dyn PublisherApi>,
    snapshot: Arc<RwLock<ConnectionSnapshot>>,
}

impl ConnectionStore {
    pub fn new(api: Arc<dyn PublisherApi>) -> Self {
        ConnectionStore {
            api,
            snapshot: Arc::new(RwLock::new(ConnectionSnapshot::default())),
        }
    }

    /// Перечитывает список с бэкенда. При ошибке старый снимок остаётся.
    pub async fn refresh(&self, token: &str) -> AppResult<ConnectionSnapshot> {
        let connections = self.api.list_connections(token).await?;
        let mut guard = self.snapshot.write().await;
        guard.connections = connections;
        guard.generation += 1;
        debug!(
            "Connection snapshot #{} ({} active)",
            guard.generation,
            guard.active_platforms().len()
        );
        Ok(guard.clone())
    }

    pub async fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Снимок, загруженный хотя бы один раз
    pub async fn ensure_loaded(&self, token: &str) -> AppResult<ConnectionSnapshot> {
        let current = self.snapshot().await;
        if current.is_loaded() {
            Ok(current)
        } else {
            self.refresh(token).await
        }
    }
}
