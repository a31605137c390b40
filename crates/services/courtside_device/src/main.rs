// File: services/courtside_device/src/main.rs
use std::env;
use std::sync::Arc;

use courtside_common::logging::{
    init_with_file, init_with_level, log_error, log_result, parse_level,
};
use courtside_common::{AppStatus, AuthSession, DevicePlatform, KeyValueStore, SessionProvider};
use courtside_config::load_config;
use courtside_push::{JsonFileStore, NotificationService, PushEvent, SharedSession};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod sim;

use sim::{tap_payload, Command, SimulatedPlatform, HELP};

const ACCESS_TOKEN_VAR: &str = "COURTSIDE_ACCESS_TOKEN";
const PLATFORM_VAR: &str = "COURTSIDE_DEVICE_PLATFORM";
const MODEL_VAR: &str = "COURTSIDE_DEVICE_MODEL";
const DENY_VAR: &str = "COURTSIDE_DENY_PERMISSION";
const LAUNCH_VAR: &str = "COURTSIDE_LAUNCH_NOTIFICATION";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    courtside_config::ensure_dotenv_loaded();
    let config = load_config()?;

    let level = parse_level(&config.logging.level);
    let _log_guard = match config.logging.directory.as_deref() {
        Some(directory) => Some(init_with_file(level, directory)),
        None => {
            init_with_level(level);
            None
        }
    };

    if let Err(issue) = config.push.validate() {
        warn!("Push configuration incomplete: {}", issue);
    }

    let store = log_result(
        JsonFileStore::open(&config.device.state_path).await,
        "Opened device state",
        "Failed to open device state",
    )?;
    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    let platform = Arc::new(simulated_platform());
    if let Ok(raw) = env::var(LAUNCH_VAR) {
        let mut words = raw.split_whitespace();
        if let Some(kind) = words.next() {
            platform.launched_from(tap_payload(kind, words.next()));
        }
    }

    let session = SharedSession::new();
    match env::var(ACCESS_TOKEN_VAR) {
        Ok(token) if !token.trim().is_empty() => session.set(AuthSession::new(token)),
        _ => warn!("{} is not set; registry calls will be refused", ACCESS_TOKEN_VAR),
    }

    let service = NotificationService::from_config(
        &config,
        platform.clone(),
        store,
        Arc::new(session.clone()),
    )?;

    let mut events = service.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PushEvent::Navigate(intent) => match serde_json::to_string(&intent) {
                    Ok(json) => println!("navigate {}", json),
                    Err(_) => println!("navigate {:?}", intent),
                },
                PushEvent::Received(payload) => println!("received {}", payload.kind),
            }
        }
    });

    initialize(&service).await;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(line) => line,
                Err(err) => {
                    log_error(err, "Reading commands failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{}", err);
                continue;
            }
        };

        match command {
            Command::Foreground => platform.set_app_state(AppStatus::Active),
            Command::Background => platform.set_app_state(AppStatus::Background),
            Command::Rotate => {
                platform.rotate_token();
            }
            Command::Tap(kind, id) => platform.tap(tap_payload(&kind, id.as_deref())),
            Command::Deliver(kind) => platform.deliver(tap_payload(&kind, None)),
            Command::Refresh => match session.current_session() {
                Some(current) => match service.update_token_if_needed(&current).await {
                    Ok(outcome) => println!("refresh: {:?}", outcome),
                    Err(err) => println!("refresh failed: {}", err),
                },
                None => println!("no session; set {}", ACCESS_TOKEN_VAR),
            },
            Command::Init => initialize(&service).await,
            Command::Status => println!(
                "state: {:?}\ntoken: {}\nregistered: {:?}",
                service.state(),
                service.current_token().unwrap_or_else(|| "-".to_string()),
                service.registration_state()
            ),
            Command::History => match session.current_session() {
                Some(current) => match service.notification_history(1, 20, &current).await {
                    Ok(records) => {
                        for record in records {
                            let marker = if record.is_read { " " } else { "*" };
                            println!(
                                "{} {} [{}] {}",
                                marker, record.id, record.kind, record.message
                            );
                        }
                    }
                    Err(err) => println!("history failed: {}", err),
                },
                None => println!("no session; set {}", ACCESS_TOKEN_VAR),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }

    service.cleanup();
    printer.abort();
    info!("Device session ended");
    Ok(())
}

async fn initialize(service: &NotificationService) {
    match service.initialize().await {
        Ok(token) => println!("push active with {}", token),
        Err(err) => println!("push inactive: {}", err),
    }
}

fn simulated_platform() -> SimulatedPlatform {
    let platform = match env::var(PLATFORM_VAR).as_deref() {
        Ok("ios") => DevicePlatform::Ios,
        _ => DevicePlatform::Android,
    };
    let model = env::var(MODEL_VAR).ok().filter(|model| !model.trim().is_empty());
    let grant = env::var(DENY_VAR).map_or(true, |value| value != "1" && value != "true");
    SimulatedPlatform::new(platform, model, grant)
}
