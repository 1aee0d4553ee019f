use crate::models::{Connection, Platform};
use crate::store::ConnectionStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const POLL_CEILING: Duration = Duration::from_millis(120_000);

/// Параметры ожидания завершения OAuth
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Как часто перечитывать список подключений
    pub interval: Duration,
    /// Абсолютный предел ожидания, после него опрос прекращается
    pub ceiling: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            ceiling: POLL_CEILING,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Connected(Connection),
    TimedOut,
    Cancelled,
}

/// Хэндл фоновой задачи опроса
pub struct ConnectWatch {
    platform: Platform,
    cancel: CancellationToken,
    handle: JoinHandle<PollOutcome>,
}

impl ConnectWatch {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Останавливает опрос досрочно (пользователь закрыл окно авторизации
    /// или прервал ожидание)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Ждёт завершения опроса. После `cancel` ожидание можно повторить,
    /// задача вернёт `Cancelled`.
    pub async fn wait(&mut self) -> PollOutcome {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Connection poller for {} aborted: {}", self.platform, e);
                PollOutcome::Cancelled
            }
        }
    }
}

/// Запускает опрос `/social/tokens` до появления активного подключения.
///
/// Остановка: подключение стало активным, вызван `cancel`, или истёк
/// `ceiling`. Запрос, начатый до истечения предела, обрезается им же.
pub fn spawn(store: ConnectionStore, token: String, platform: Platform, config: PollConfig) -> ConnectWatch {
    let cancel = CancellationToken::new();

    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            info!(
                "Waiting for {} authorization (interval={:?}, ceiling={:?})",
                platform, config.interval, config.ceiling
            );
            let outcome = poll(store, token, platform, config, cancel).await;
            info!("Connection poller for {} stopped: {:?}", platform, outcome);
            outcome
        })
    };

    ConnectWatch {
        platform,
        cancel,
        handle,
    }
}

async fn poll(
    store: ConnectionStore,
    token: String,
    platform: Platform,
    config: PollConfig,
    cancel: CancellationToken,
) -> PollOutcome {
    let start = Instant::now();
    let deadline = start + config.ceiling;

    let mut ticker = tokio::time::interval_at(start + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expired = tokio::time::sleep_until(deadline);
    tokio::pin!(expired);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = &mut expired => return PollOutcome::TimedOut,
            _ = ticker.tick() => {
                debug!("Polling connections for {}", platform);
                match tokio::time::timeout_at(deadline, store.refresh(&token)).await {
                    Ok(Ok(snapshot)) => {
                        if let Some(conn) = snapshot.active(platform) {
                            return PollOutcome::Connected(conn.clone());
                        }
                    }
                    // Сетевые сбои не прерывают ожидание, пробуем на следующем тике
                    Ok(Err(e)) => warn!("Connection poll failed: {}", e),
                    Err(_) => return PollOutcome::TimedOut,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{connection, FakeApi};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn stops_at_ceiling_when_never_connected() {
        let api = Arc::new(FakeApi::with_connections(vec![connection(Platform::Facebook, false)]));
        let store = ConnectionStore::new(api.clone());
        let started = Instant::now();

        let mut watch = spawn(store, "tok".into(), Platform::Facebook, PollConfig::default());
        let outcome = watch.wait().await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(started.elapsed() <= POLL_CEILING);
        // Тики на 2с, 4с, ... 118с; на 120с срабатывает предел
        let polls = api.list_calls();
        assert!((58..=60).contains(&polls), "unexpected poll count {polls}");
    }

    #[tokio::test(start_paused = true)]
    async fn stops_as_soon_as_connection_is_active() {
        let api = Arc::new(FakeApi::with_connections(vec![]));
        *api.activate_after.lock().unwrap() = Some((3, connection(Platform::Facebook, true)));
        let store = ConnectionStore::new(api.clone());
        let started = Instant::now();

        let mut watch = spawn(store.clone(), "tok".into(), Platform::Facebook, PollConfig::default());
        match watch.wait().await {
            PollOutcome::Connected(conn) => assert_eq!(conn.platform, Platform::Facebook),
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert_eq!(api.list_calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        assert!(store.snapshot().await.is_connected(Platform::Facebook));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_before_ceiling() {
        let api = Arc::new(FakeApi::with_connections(vec![]));
        let store = ConnectionStore::new(api.clone());

        let mut watch = spawn(store, "tok".into(), Platform::Twitter, PollConfig::default());
        assert_eq!(watch.platform(), Platform::Twitter);

        // Ожидание прерывается отменой, как Ctrl-C в CLI
        let outcome = tokio::select! {
            outcome = watch.wait() => outcome,
            _ = tokio::time::sleep(Duration::from_millis(5000)) => {
                watch.cancel();
                watch.wait().await
            }
        };

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_keep_polling() {
        let api = Arc::new(FakeApi::with_connections(vec![]));
        *api.fail_with.lock().unwrap() = Some((503, None));
        let store = ConnectionStore::new(api.clone());

        let config = PollConfig {
            interval: Duration::from_millis(100),
            ceiling: Duration::from_millis(1000),
        };
        let outcome = spawn(store, "tok".into(), Platform::Tiktok, config).wait().await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(api.list_calls() >= 9);
    }
}
