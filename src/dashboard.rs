use crate::connections::SocialConnections;
use crate::forms::PostForm;
use crate::session::AuthContext;
use crate::store::ConnectionStore;
use std::fmt::Write as _;
use tracing::warn;

pub const TITLE: &str = "Social Multiplatform Publisher";

/// Статистика-заглушка: бэкенд её не отдаёт
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuickStats {
    pub posts_today: u32,
    pub posts_this_week: u32,
    pub connected_platforms: Option<u32>,
}

/// Главная панель: форма поста и подключения над одним общим снимком
pub struct Dashboard {
    pub post_form: PostForm,
    pub connections: SocialConnections,
    pub stats: QuickStats,
}

impl Dashboard {
    pub fn new(auth: &AuthContext) -> Self {
        let api = auth.api();
        let store = ConnectionStore::new(api.clone());
        Dashboard {
            post_form: PostForm::new(api.clone(), store.clone()),
            connections: SocialConnections::new(api, store),
            stats: QuickStats::default(),
        }
    }

    /// Загружает общий снимок подключений один раз для обоих компонентов.
    /// Ошибка загрузки остаётся в панели подключений и не мешает отрисовке.
    pub async fn mount(&mut self, token: &str) {
        if let Err(e) = self.connections.load(token).await {
            warn!("Dashboard mounted without connections: {}", e);
        }
    }

    pub async fn render(&self, auth: &AuthContext) -> String {
        let mut out = String::new();
        let username = auth.user().map(|u| u.username.as_str()).unwrap_or("?");

        let _ = writeln!(out, "== {} ==", TITLE);
        let _ = writeln!(out, "Hello, {}   (socialpub logout to sign out)", username);
        out.push('\n');

        out.push_str(&self.post_form.render().await);
        out.push('\n');

        let _ = writeln!(out, "Recent posts");
        let _ = writeln!(out, "  No posts published yet.");
        out.push('\n');

        out.push_str(&self.connections.render().await);
        out.push('\n');

        out.push_str(&render_stats(&self.stats));
        out
    }
}

fn render_stats(stats: &QuickStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Quick stats");
    let _ = writeln!(out, "  Posts today:          {}", stats.posts_today);
    let _ = writeln!(out, "  Posts this week:      {}", stats.posts_this_week);
    let connected = stats
        .connected_platforms
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "  Connected platforms:  {}", connected);
    out
}
