use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;

use parley::application::connection::ConnectionManager;
use parley::application::services::{ChatClient, RoomSessionCoordinator, Update};
use parley::infrastructure::config::Config;
use parley::infrastructure::provisioning::HttpProvisioner;
use parley::infrastructure::relay::RelayTransport;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "A real-time room chat client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and chat
    Run {
        /// Create a new room instead of joining an existing one
        #[arg(long)]
        create: bool,
    },
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { create } => {
            run_client(cli.config, create);
        }
        Commands::Version => {
            println!("parley v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn run_client(config_path: String, create: bool) {
    // Load config
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let display_name = match config.client.display_name.clone() {
            Some(name) => name,
            None => match read_line("Your name: ") {
                Some(name) if !name.is_empty() => name,
                _ => {
                    eprintln!("A display name is required.");
                    return;
                }
            },
        };
        let room_name = read_line("Room name: ").unwrap_or_default();
        let password = read_line("Room password: ").unwrap_or_default();

        let transport = RelayTransport::new(&config.endpoints.socket_url);
        let connection = Arc::new(ConnectionManager::new(transport));
        let mut client = ChatClient::new(Arc::clone(&connection), display_name.clone())
            .with_idle_timeout(config.typing_idle());

        if let Err(e) = connection.connect().await {
            tracing::error!("Failed to reach the relay: {}", e);
            return;
        }

        let provisioner = HttpProvisioner::new(&config.endpoints.api_base_url);
        let mut coordinator = RoomSessionCoordinator::new(provisioner, Arc::clone(&connection))
            .with_join_timeout(config.join_timeout());

        let joined = if create {
            coordinator
                .create_flow(&room_name, &password, &display_name)
                .await
        } else {
            coordinator
                .match_flow(&room_name, &password, &display_name)
                .await
        };
        if let Err(e) = joined {
            tracing::error!("Could not join room: {}", e);
            return;
        }

        println!(
            "Joined '{}' as {}. Type a message and press enter; Ctrl-D leaves.",
            coordinator.session().room_name,
            display_name
        );
        chat_loop(&mut client).await;
        client.teardown().await;
    });
}

async fn chat_loop(client: &mut ChatClient<RelayTransport>) {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    // Line input is the closest thing to composition the
                    // console has: one change, then the field empties.
                    if let Err(e) = client.composition_changed(&line).await {
                        tracing::warn!("typing signal lost: {}", e);
                    }
                    match client.send_message(&line).await {
                        Ok(Some(message)) => {
                            println!(
                                "[{}] you: {}",
                                message.timestamp.format("%H:%M"),
                                message.text
                            );
                        }
                        Ok(None) => {}
                        Err(e) => tracing::error!("Failed to send message: {}", e),
                    }
                    if let Err(e) = client.composition_changed("").await {
                        tracing::warn!("typing signal lost: {}", e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("stdin error: {}", e);
                    break;
                }
            },
            update = client.next_update() => match update {
                Some(Update::Message(message)) => {
                    println!(
                        "[{}] {}: {}",
                        message.timestamp.format("%H:%M"),
                        message.sender,
                        message.text
                    );
                }
                Some(Update::Presence(users)) => {
                    if !users.is_empty() {
                        println!("{} is typing...", users.join(", "));
                    }
                }
                Some(Update::Notice(user)) => {
                    println!("* {} joined the room", user);
                }
                None => break,
            }
        }
    }
}

fn read_line(prompt: &str) -> Option<String> {
    use std::io::Write;
    print!("{}", prompt);
    let _ = std::io::stdout().flush();
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).ok()?;
    Some(input.trim().to_string())
}

fn init_config() {
    let config = Config::default();
    match serde_yaml::to_string(&config) {
        Ok(yaml) => match std::fs::write("config.yaml", yaml) {
            Ok(()) => println!("Wrote config.yaml"),
            Err(e) => eprintln!("Failed to write config.yaml: {}", e),
        },
        Err(e) => eprintln!("Failed to serialize config: {}", e),
    }
}
