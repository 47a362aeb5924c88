//! roomsync entry point.

use std::time::Duration;

use clap::Parser;
use roomsync_cli::{App, AppEvent, ConsoleDriver, Runtime, RuntimeError, SyncConfig};
use roomsync_client::{DEFAULT_BOTTOM_THRESHOLD, ReconnectPolicy, transport::TransportConfig};
use roomsync_core::{Identity, RoomKey, UserId};
use tracing_subscriber::EnvFilter;

/// Tail a chat room and send lines typed on stdin
#[derive(Parser, Debug)]
#[command(name = "roomsync")]
#[command(about = "Tail a chat room and send lines typed on stdin")]
#[command(version)]
struct Args {
    /// Base URL of the chat API, e.g. https://api.example.com/chat
    #[arg(short, long)]
    server: String,

    /// Access token. Without it the client stays signed out.
    #[arg(short, long, requires = "user")]
    token: Option<String>,

    /// User id the token belongs to
    #[arg(short, long, requires = "token")]
    user: Option<String>,

    /// Room to open on start, as kind:id (community:lobby, clan:42)
    #[arg(short, long)]
    room: Option<RoomKey>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Reconnect attempts after the channel drops, 0 disables reconnecting
    #[arg(long, default_value_t = 5)]
    reconnect_attempts: u32,

    /// Distance from the bottom (px) under which new messages auto-scroll
    #[arg(long, default_value_t = DEFAULT_BOTTOM_THRESHOLD)]
    bottom_threshold: f64,

    /// REST request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,
}

impl Args {
    fn identity(&self) -> Identity {
        match (&self.user, &self.token) {
            (Some(user), Some(token)) => Identity::authenticated(UserId::new(user), token),
            _ => Identity::anonymous(),
        }
    }

    fn sync_config(&self) -> SyncConfig {
        let reconnect = match self.reconnect_attempts {
            0 => ReconnectPolicy::Never,
            max_attempts => ReconnectPolicy::Backoff {
                initial: Duration::from_millis(500),
                max: Duration::from_secs(30),
                max_attempts,
            },
        };
        SyncConfig { bottom_threshold: self.bottom_threshold, reconnect }
    }

    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            request_timeout: Duration::from_secs(self.timeout),
            ..TransportConfig::new(&self.server)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), RuntimeError> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut driver = ConsoleDriver::new(args.transport_config(), args.token.clone())?;
    if let Some(room) = args.room.clone() {
        driver.push_event(AppEvent::OpenRoom(room));
    }

    let app = App::new(args.identity(), args.sync_config());
    let app = Runtime::new(driver, app).run().await?;
    tracing::info!(status = ?app.status_message(), "exiting");
    Ok(())
}
