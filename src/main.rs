mod ui;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use ui::{AppState, Update};
use wavenet_chat::common::{ClientCommand, ClientEvent, ConversationId, UserId};
use wavenet_chat::config::{self, AppConfig};
use wavenet_chat::network::{HttpApi, SyncClient, WsConnector};

const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "wavenet", version, about = "Realtime two-party chat client")]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Identity to log in as
    #[arg(long, short, value_name = "USER_ID")]
    user: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file and exit
    Init,
    /// Print the conversation list and exit
    Conversations,
    /// Look users up by display name and exit
    Search { query: String },
    /// Interactive chat; optionally open the conversation with a user first
    Chat {
        #[arg(long, value_name = "USER_ID")]
        with: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    if let Command::Init = cli.command {
        config::save_config(&cli.config, &AppConfig::default())?;
        println!("Wrote default config to {}", cli.config);
        return Ok(());
    }

    let mut app_config = config::load_config(&cli.config);
    app_config.apply_env_overrides();
    let user: UserId = cli
        .user
        .ok_or("--user is required for this command")?
        .into();

    let api = Arc::new(HttpApi::new(&app_config.backend_url)?);
    let connector = Arc::new(WsConnector::new(
        app_config.channel_url.clone(),
        app_config.reconnect_delay(),
    ));

    // UI -> network
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // network -> UI
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let client = SyncClient::new(api, connector, app_config.to_settings(), event_tx, cmd_rx);
    let network = tokio::spawn(client.run());

    let mut state = AppState::new(user.clone());
    cmd_tx.send(ClientCommand::Login(user)).await?;

    match cli.command {
        Command::Init => {}
        Command::Conversations => {
            wait_for(&mut event_rx, &mut state, |u| {
                matches!(u, Update::Directory | Update::Failed(_))
            })
            .await;
        }
        Command::Search { query } => {
            cmd_tx.send(ClientCommand::Search(query)).await?;
            wait_for(&mut event_rx, &mut state, |u| {
                matches!(u, Update::SearchResults | Update::Failed(_))
            })
            .await;
        }
        Command::Chat { with } => {
            if let Some(other) = with {
                cmd_tx.send(ClientCommand::OpenWith(other.into())).await?;
            }
            run_chat(&cmd_tx, &mut event_rx, &mut state).await?;
        }
    }

    drop(cmd_tx);
    if let Err(err) = network.await {
        log::error!("Sync task terminated abnormally: {err}");
    }
    Ok(())
}

fn show(state: &mut AppState, event: ClientEvent) -> Vec<Update> {
    let updates = state.apply(event);
    for update in &updates {
        for line in ui::render::update(state, update) {
            println!("{line}");
        }
    }
    updates
}

/// Print events until one satisfies `done`, or give up after a while.
async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    state: &mut AppState,
    done: impl Fn(&Update) -> bool,
) {
    let deadline = tokio::time::sleep(ONE_SHOT_TIMEOUT);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { return };
                if show(state, event).iter().any(&done) {
                    return;
                }
            }
            _ = &mut deadline => {
                eprintln!("Timed out waiting for the backend");
                return;
            }
        }
    }
}

async fn run_chat(
    commands: &mpsc::Sender<ClientCommand>,
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    state: &mut AppState,
) -> Result<(), Box<dyn Error>> {
    println!("Type a message and press enter. Commands: /list /open <id> /with <user> /search <name> /hide /show /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                match parse_input(&line) {
                    Input::Quit => return Ok(()),
                    Input::List => {
                        for line in ui::render::directory(state) {
                            println!("{line}");
                        }
                    }
                    Input::Command(command) => commands.send(command).await?,
                    Input::Text(text) => {
                        commands.send(ClientCommand::TextInput).await?;
                        commands.send(ClientCommand::SendMessage(text)).await?;
                    }
                    Input::Unknown(what) => eprintln!("Unknown command `{what}`"),
                    Input::Empty => {}
                }
            }
            event = events.recv() => {
                let Some(event) = event else { return Ok(()) };
                show(state, event);
            }
        }
    }
}

#[derive(Debug)]
enum Input {
    Quit,
    List,
    Command(ClientCommand),
    Text(String),
    Unknown(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Input::Text(line.to_string());
    };
    let (name, arg) = rest
        .split_once(' ')
        .map_or((rest, ""), |(name, arg)| (name, arg.trim()));
    match (name, arg) {
        ("quit", _) => Input::Quit,
        ("list", _) => Input::List,
        ("open", id) if !id.is_empty() => {
            Input::Command(ClientCommand::SelectConversation(ConversationId::from(id)))
        }
        ("with", user) if !user.is_empty() => Input::Command(ClientCommand::OpenWith(user.into())),
        ("search", query) => Input::Command(ClientCommand::Search(query.to_string())),
        ("hide", _) => Input::Command(ClientCommand::SetVisible(false)),
        ("show", _) => Input::Command(ClientCommand::SetVisible(true)),
        ("refresh", _) => Input::Command(ClientCommand::RefreshDirectory),
        _ => Input::Unknown(line.to_string()),
    }
}
