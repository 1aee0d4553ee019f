use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod connections;
mod dashboard;
mod error;
mod forms;
mod models;
mod session;
mod store;

use config::{Command, Config};
use connections::poller::PollOutcome;
use connections::{AssumeYes, AuthUrlOpener, DisconnectOutcome, PrintUrl, SocialConnections, StdinConfirm, SystemBrowser};
use dashboard::Dashboard;
use error::{AppError, AppResult};
use forms::{post::render_results, PostForm, RegisterForm};
use session::{AuthContext, SessionStore};
use store::ConnectionStore;

#[tokio::main]
async fn main() {
    // Парсим конфигурацию из CLI и env
    let config = Config::parse();

    // Инициализируем логирование
    init_tracing(config.debug);

    if let Err(e) = run(config).await {
        error!("Command failed: {:?}", e);
        eprintln!("error: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(config: Config) -> AppResult<()> {
    // Валидируем конфигурацию
    config.validate()?;

    debug!("Using API at {}", config.base_url());

    let api: Arc<dyn api::PublisherApi> = Arc::from(api::create_api_client(&config)?);
    let mut auth = AuthContext::new(Arc::clone(&api), Some(SessionStore::new(config.session_path())));
    auth.restore().await?;

    match config.command.clone() {
        Command::Register {
            email,
            username,
            password,
            confirm_password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ").await?,
            };
            let confirm = match confirm_password {
                Some(p) => p,
                None => prompt_password("Confirm password: ").await?,
            };
            let mut form = RegisterForm::new(email, username).with_passwords(password, confirm);
            let user = form.submit(&mut auth).await?;
            println!("Registered and logged in as {}", user.username);
        }

        Command::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ").await?,
            };
            let user = auth.login(&email, &password).await?;
            println!("Logged in as {}", user.username);
        }

        Command::Logout => {
            if !auth.is_authenticated() {
                println!("Not logged in");
                return Ok(());
            }
            auth.logout().await?;
            println!("Logged out");
        }

        Command::Whoami => {
            let user = auth.refresh_user().await?;
            println!("{} <{}> (id {})", user.username, user.email, user.id);
        }

        Command::Connections => {
            let token = auth.token()?;
            let mut panel = SocialConnections::new(Arc::clone(&api), ConnectionStore::new(Arc::clone(&api)));
            // Ошибка уже попала в панель и будет отрисована
            let loaded = panel.load(token).await;
            print!("{}", panel.render().await);
            loaded?;
        }

        Command::Connect { platform } => {
            let token = auth.token()?;
            let store = ConnectionStore::new(Arc::clone(&api));
            let mut panel = SocialConnections::new(Arc::clone(&api), store);

            let opener: &dyn AuthUrlOpener = if config.no_browser { &PrintUrl } else { &SystemBrowser };
            let mut watch = panel.connect(token, platform, opener).await?;
            let name = watch.platform().descriptor().name;
            println!("Waiting for {} authorization (Ctrl-C to stop)...", name);

            // Ctrl-C заменяет закрытие окна авторизации
            let outcome = tokio::select! {
                outcome = watch.wait() => outcome,
                _ = tokio::signal::ctrl_c() => {
                    watch.cancel();
                    watch.wait().await
                }
            };

            match outcome {
                PollOutcome::Connected(conn) => {
                    let account = conn.platform_username.unwrap_or_default();
                    println!("{} connected {}", name, account);
                }
                PollOutcome::TimedOut => {
                    println!("Authorization not completed in time; run `socialpub connections` to check again");
                }
                PollOutcome::Cancelled => println!("Stopped waiting for authorization"),
            }
        }

        Command::Disconnect { platform, yes } => {
            let token = auth.token()?;
            let mut panel = SocialConnections::new(Arc::clone(&api), ConnectionStore::new(Arc::clone(&api)));
            let outcome = if yes {
                panel.disconnect(token, platform, &AssumeYes).await?
            } else {
                panel.disconnect(token, platform, &StdinConfirm).await?
            };
            match outcome {
                DisconnectOutcome::Disconnected => {
                    println!("{} disconnected", platform.descriptor().name);
                    print!("{}", panel.render().await);
                }
                DisconnectOutcome::Declined => println!("Nothing changed"),
            }
        }

        Command::Post {
            content,
            platforms,
            schedule,
        } => {
            let token = auth.token()?;
            let store = ConnectionStore::new(Arc::clone(&api));
            store.ensure_loaded(token).await?;

            let mut form = PostForm::new(Arc::clone(&api), store);
            form.set_content(content);
            form.set_schedule(schedule);
            for platform in platforms {
                // Повтор платформы в аргументах не должен снимать выбор
                if !form.selected().contains(&platform) {
                    form.toggle(platform).await?;
                }
            }

            form.submit(token).await?;
            if let Some(response) = form.result() {
                print!("{}", render_results(response));
                info!("Post {:?} status {}", response.id, response.status);
            }
        }

        Command::History { limit, offset } => {
            let token = auth.token()?;
            let posts = api.post_history(token, limit, offset).await?;
            if posts.is_empty() {
                println!("No posts published yet.");
            }
            for post in posts {
                let when = post
                    .published_at
                    .or(post.created_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("#{} {} [{}] {}", post.id.unwrap_or_default(), when, post.platforms.join(", "), post.content);
                print!("{}", render_results(&post));
            }
        }

        Command::Dashboard => {
            let token = auth.token()?.to_string();
            auth.refresh_user().await?;
            let mut dashboard = Dashboard::new(&auth);
            dashboard.mount(&token).await;
            print!("{}", dashboard.render(&auth).await);
        }

        Command::Health => {
            let health = api.health().await?;
            println!("{}: {}", config.base_url(), health.status);
        }
    }

    Ok(())
}

/// Читает пароль из терминала без эха, если он не передан флагом
async fn prompt_password(label: &'static str) -> AppResult<String> {
    let value = tokio::task::spawn_blocking(move || rpassword::prompt_password(label))
        .await
        .map_err(|e| AppError::Custom(format!("Password prompt failed: {}", e)))??;
    if value.is_empty() {
        return Err(AppError::Custom(format!("{} is required", label.trim_end_matches([':', ' ']))));
    }
    Ok(value)
}

/// Инициализирует систему логирования с использованием tracing.
/// Логи идут в stderr, чтобы не смешиваться с выводом команд.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .init();

    debug!("Tracing initialized");
}
