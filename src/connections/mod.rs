//! Панель подключений к соцсетям: список, подключение через OAuth,
//! отключение с подтверждением.

pub mod poller;

use crate::api::PublisherApi;
use crate::error::{AppError, AppResult};
use crate::models::{Connection, Platform, PlatformDescriptor, PLATFORMS};
use crate::store::{ConnectionSnapshot, ConnectionStore};
use async_trait::async_trait;
use poller::{ConnectWatch, PollConfig};
use std::fmt::Write as _;
use std::io::{BufRead, Write as _};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LOAD_ERROR: &str = "Failed to load connections";

/// Открывает URL авторизации OAuth (в CLI вместо всплывающего окна)
pub trait AuthUrlOpener: Send + Sync {
    fn open(&self, url: &str) -> AppResult<()>;
}

/// Системный браузер через `xdg-open` / `open` / `start`
pub struct SystemBrowser;

impl AuthUrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> AppResult<()> {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            Command::new("xdg-open")
        };

        command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| AppError::Custom(format!("Cannot open browser: {}", e)))
    }
}

/// Ничего не открывает, только печатает ссылку
pub struct PrintUrl;

impl AuthUrlOpener for PrintUrl {
    fn open(&self, url: &str) -> AppResult<()> {
        println!("Open this URL to authorize:\n  {}", url);
        Ok(())
    }
}

/// Интерактивное подтверждение опасных действий
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Спрашивает y/N в терминале
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        // Чтение stdin блокирующее, уводим его с потоков runtime
        match tokio::task::spawn_blocking(move || ask_stdin(&prompt)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Confirmation prompt failed: {}", e);
                false
            }
        }
    }
}

fn ask_stdin(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

/// Согласием считается только явное "y"/"yes"
fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Для `--yes`
pub struct AssumeYes;

#[async_trait]
impl Confirm for AssumeYes {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Disconnected,
    Declined,
}

/// Строка панели для одной платформы
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformRow {
    pub descriptor: &'static PlatformDescriptor,
    pub connected: bool,
    pub account: Option<String>,
}

pub struct SocialConnections {
    api: Arc<dyn PublisherApi>,
    store: ConnectionStore,
    poll: PollConfig,
    loading: bool,
    error: Option<String>,
}

impl SocialConnections {
    pub fn new(api: Arc<dyn PublisherApi>, store: ConnectionStore) -> Self {
        SocialConnections {
            api,
            store,
            poll: PollConfig::default(),
            loading: true,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Загружает все подключения, включая неактивные
    pub async fn load(&mut self, token: &str) -> AppResult<ConnectionSnapshot> {
        let result = self.store.refresh(token).await;
        self.loading = false;
        match result {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                let e = e.with_fallback(LOAD_ERROR);
                self.error = Some(load_error_message(&e));
                Err(e)
            }
        }
    }

    /// Запрашивает URL авторизации, открывает его и запускает ожидание
    /// активации подключения.
    pub async fn connect(
        &mut self,
        token: &str,
        platform: Platform,
        opener: &dyn AuthUrlOpener,
    ) -> AppResult<ConnectWatch> {
        let auth_url = match self.api.connect_url(token, platform).await {
            Ok(url) => url,
            Err(e) => {
                let e = e.with_fallback(format!("Failed to connect to {}", platform));
                self.error = Some(e.user_message());
                return Err(e);
            }
        };

        debug!("Opening authorization URL for {}", platform);
        if let Err(e) = opener.open(&auth_url) {
            // Ссылку всё равно можно открыть вручную
            warn!("{}", e);
            PrintUrl.open(&auth_url)?;
        }

        Ok(poller::spawn(
            self.store.clone(),
            token.to_string(),
            platform,
            self.poll,
        ))
    }

    pub async fn disconnect(
        &mut self,
        token: &str,
        platform: Platform,
        confirm: &dyn Confirm,
    ) -> AppResult<DisconnectOutcome> {
        let prompt = format!(
            "Are you sure you want to disconnect {}?",
            platform.descriptor().name
        );
        if !confirm.confirm(&prompt).await {
            debug!("Disconnect of {} declined", platform);
            return Ok(DisconnectOutcome::Declined);
        }

        if let Err(e) = self.api.disconnect(token, platform).await {
            let e = e.with_fallback(format!("Failed to disconnect from {}", platform));
            self.error = Some(e.user_message());
            return Err(e);
        }

        info!("{} disconnected, refreshing connections", platform);
        // Отключение уже прошло; сбой перезагрузки остаётся ошибкой панели
        if let Err(e) = self.load(token).await {
            warn!("Connections reload after disconnect failed: {}", e);
        }
        Ok(DisconnectOutcome::Disconnected)
    }

    pub async fn rows(&self) -> Vec<PlatformRow> {
        platform_rows(&self.store.snapshot().await)
    }

    pub async fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Social connections");
        if self.loading {
            let _ = writeln!(out, "  Loading...");
            return out;
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "  ! {}", error);
        }
        for row in self.rows().await {
            let badge = if row.connected { "connected" } else { "not connected" };
            let _ = writeln!(
                out,
                "  {:<5} {:<10} {:<14} {}",
                row.descriptor.icon, row.descriptor.name, badge, row.descriptor.description
            );
            if let Some(account) = row.account {
                let _ = writeln!(out, "        account: {}", account);
            }
        }
        out
    }
}

/// Для загрузки списка сбой HTTP и сбой сети различаются
fn load_error_message(e: &AppError) -> String {
    match e {
        AppError::Api { .. } => LOAD_ERROR.to_string(),
        other => other.user_message(),
    }
}

pub fn platform_rows(snapshot: &ConnectionSnapshot) -> Vec<PlatformRow> {
    PLATFORMS
        .iter()
        .map(|descriptor| {
            let active: Option<&Connection> = snapshot.active(descriptor.platform);
            PlatformRow {
                descriptor,
                connected: active.is_some(),
                account: active.and_then(|c| c.platform_username.clone()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::poller::PollOutcome;
    use super::*;
    use crate::api::fake::{connection, Call, FakeApi};
    use std::sync::Mutex;

    struct RecordingOpener(Mutex<Vec<String>>);

    impl AuthUrlOpener for RecordingOpener {
        fn open(&self, url: &str) -> AppResult<()> {
            self.0.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct Decline;

    #[async_trait]
    impl Confirm for Decline {
        async fn confirm(&self, _prompt: &str) -> bool {
            false
        }
    }

    fn panel(api: &Arc<FakeApi>) -> SocialConnections {
        let api: Arc<dyn PublisherApi> = api.clone();
        SocialConnections::new(api.clone(), ConnectionStore::new(api))
    }

    #[tokio::test]
    async fn load_keeps_inactive_connections_for_rendering() {
        let api = Arc::new(FakeApi::with_connections(vec![
            connection(Platform::Facebook, true),
            connection(Platform::Twitter, false),
        ]));
        let mut panel = panel(&api);
        assert!(panel.is_loading());

        let snapshot = panel.load("tok").await.unwrap();
        assert_eq!(snapshot.connections.len(), 2);
        assert!(!panel.is_loading());

        let rows = panel.rows().await;
        assert_eq!(rows.len(), 5);
        assert!(rows[0].connected);
        assert_eq!(rows[0].account.as_deref(), Some("facebook_user"));
        let twitter = rows.iter().find(|r| r.descriptor.platform == Platform::Twitter).unwrap();
        assert!(!twitter.connected);
        assert!(twitter.account.is_none());
    }

    #[tokio::test]
    async fn load_failure_sets_generic_error() {
        let api = Arc::new(FakeApi::default());
        *api.fail_with.lock().unwrap() = Some((500, Some("boom".into())));
        let mut panel = panel(&api);

        assert!(panel.load("tok").await.is_err());
        assert_eq!(panel.error(), Some(LOAD_ERROR));
        assert!(panel.render().await.contains(LOAD_ERROR));
    }

    #[tokio::test]
    async fn connect_opens_auth_url_and_polls() {
        let api = Arc::new(FakeApi::with_connections(vec![]));
        *api.activate_after.lock().unwrap() = Some((1, connection(Platform::Facebook, true)));
        let mut panel = panel(&api);
        panel.poll = PollConfig {
            interval: std::time::Duration::from_millis(10),
            ceiling: std::time::Duration::from_millis(500),
        };
        let opener = RecordingOpener(Mutex::new(vec![]));

        let mut watch = panel.connect("tok", Platform::Facebook, &opener).await.unwrap();
        assert_eq!(watch.platform(), Platform::Facebook);
        assert!(matches!(watch.wait().await, PollOutcome::Connected(_)));

        assert_eq!(
            opener.0.lock().unwrap().as_slice(),
            ["https://auth.example.com/facebook".to_string()]
        );
        assert!(panel.rows().await[0].connected);
    }

    #[tokio::test]
    async fn connect_failure_is_per_platform() {
        let api = Arc::new(FakeApi::default());
        *api.fail_with.lock().unwrap() = Some((500, None));
        let mut panel = panel(&api);
        let opener = RecordingOpener(Mutex::new(vec![]));

        assert!(panel.connect("tok", Platform::Tiktok, &opener).await.is_err());
        assert_eq!(panel.error(), Some("Failed to connect to tiktok"));
        assert!(opener.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn declined_disconnect_makes_no_request() {
        let api = Arc::new(FakeApi::with_connections(vec![connection(Platform::Linkedin, true)]));
        let mut panel = panel(&api);

        let outcome = panel.disconnect("tok", Platform::Linkedin, &Decline).await.unwrap();
        assert_eq!(outcome, DisconnectOutcome::Declined);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn disconnect_refetches_connections() {
        let api = Arc::new(FakeApi::with_connections(vec![connection(Platform::Linkedin, true)]));
        let mut panel = panel(&api);
        panel.load("tok").await.unwrap();

        let outcome = panel.disconnect("tok", Platform::Linkedin, &AssumeYes).await.unwrap();
        assert_eq!(outcome, DisconnectOutcome::Disconnected);
        assert_eq!(
            api.calls(),
            vec![
                Call::ListConnections,
                Call::Disconnect(Platform::Linkedin),
                Call::ListConnections
            ]
        );
        assert!(panel.rows().await.iter().all(|r| !r.connected));
    }

    #[tokio::test]
    async fn disconnect_succeeds_even_if_reload_fails() {
        let api = Arc::new(FakeApi::with_connections(vec![connection(Platform::Linkedin, true)]));
        let mut panel = panel(&api);
        panel.load("tok").await.unwrap();
        *api.fail_lists.lock().unwrap() = true;

        let outcome = panel.disconnect("tok", Platform::Linkedin, &AssumeYes).await.unwrap();
        assert_eq!(outcome, DisconnectOutcome::Disconnected);
        assert_eq!(panel.error(), Some(LOAD_ERROR));
        assert_eq!(api.list_calls(), 2);
    }

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES \r\n"));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn disconnect_failure_is_reported() {
        let api = Arc::new(FakeApi::with_connections(vec![connection(Platform::Linkedin, true)]));
        let mut panel = panel(&api);
        panel.load("tok").await.unwrap();
        *api.fail_with.lock().unwrap() = Some((404, None));

        assert!(panel.disconnect("tok", Platform::Linkedin, &AssumeYes).await.is_err());
        assert_eq!(panel.error(), Some("Failed to disconnect from linkedin"));
    }
}
