use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use hotel_chat::config::{self, AppConfig};
use hotel_chat::network::{ChatBackend, ChatClient, HttpBackend, transport};
use hotel_chat::ui::ChatApp;
use hotel_chat::ui::components::sidebar::role_badge;
use hotel_chat::{ChatError, ChatResult};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "hotel-chat",
    version,
    about = "Staff chat client for the hotel management backend"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Base URL of the backend API
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
    /// Realtime server URL (defaults to the API URL)
    #[arg(long, value_name = "URL")]
    socket_url: Option<String>,
    /// Bearer token of the signed-in staff member
    #[arg(long)]
    token: Option<String>,
    /// Id of the signed-in staff member
    #[arg(long)]
    user_id: Option<String>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// List colleagues with their unread counts and exit
    Users,
    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> ChatResult<()> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config =
        config::load_config(&cli.config).with_overrides(|key| std::env::var(key).ok());
    if let Some(url) = cli.api_url {
        app_config.api_base_url = url;
    }
    if let Some(url) = cli.socket_url {
        app_config.socket_url = Some(url);
    }
    if let Some(token) = cli.token {
        app_config.token = Some(token);
    }
    if let Some(user_id) = cli.user_id {
        app_config.user_id = Some(user_id);
    }

    match cli.mode {
        Some(Mode::InitConfig) => {
            config::save_config(&cli.config, &app_config)?;
            log::info!("Wrote configuration to {}", cli.config);
            Ok(())
        }
        Some(Mode::Users) => list_users(&app_config).await,
        None => run_full_client(app_config).await,
    }
}

async fn list_users(app_config: &AppConfig) -> ChatResult<()> {
    let backend = HttpBackend::new(&app_config.api_base_url, app_config.token.clone())?;
    let users = backend.chat_users().await?;
    let unread = backend.unread_counts().await?;

    for user in users {
        let count = unread
            .iter()
            .find(|entry| entry.sender == user.id)
            .map_or(0, |entry| entry.count);
        println!("{} {:<24} {:<26} {count}", role_badge(user.role), user.name, user.id);
    }
    Ok(())
}

async fn run_full_client(app_config: AppConfig) -> ChatResult<()> {
    let user_id = app_config.user_id.clone().ok_or(ChatError::Unauthorized)?;
    let backend = Arc::new(HttpBackend::new(
        &app_config.api_base_url,
        app_config.token.clone(),
    )?);

    // 1. Một kết nối realtime cho cả phiên đăng nhập
    let connection = transport::connect(&app_config.transport(), &user_id).await?;

    // 2. Tạo các kênh giao tiếp: UI -> session, session -> UI
    let (cmd_tx, cmd_rx) = mpsc::channel(app_config.channel_capacity.max(1));
    let (event_tx, event_rx) = mpsc::channel(app_config.channel_capacity.max(1));

    let client = ChatClient::new(connection, backend, event_tx, cmd_rx);
    let session = tokio::spawn(async move {
        if let Err(err) = client.run().await {
            log::error!("Chat session terminated: {err}");
        }
    });

    // 3. Front end chạy tới khi người dùng thoát; đóng cmd_tx sẽ kết thúc session
    let app = ChatApp::new(
        user_id,
        cmd_tx,
        event_rx,
        app_config.zone(),
        app_config.recorder_command.clone(),
    );
    app.run().await?;

    if let Err(err) = session.await {
        log::error!("Chat session task failed: {err}");
    }
    Ok(())
}
