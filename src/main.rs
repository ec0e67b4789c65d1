use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use peerchat::application::{knock, ChatPage, ChatTarget, ConnectionsPage};
use peerchat::auth::{AuthProvider, LocalAuth};
use peerchat::config::AppConfig;
use peerchat::contacts::{profile_username, ConnectionsService};
use peerchat::database::{Database, SledDatabase};
use peerchat::error::PeerChatError;
use peerchat::logging::init_logging;
use peerchat::network::{validate_username, ChatNode};
use peerchat::notice::Notice;

#[derive(Parser)]
#[command(author, version, about = "Peer-to-peer chat with contacts and file transfer", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an email address
    Login {
        #[arg(short, long)]
        email: String,
    },
    /// Sign out and clear the session
    Logout,
    /// Show the signed-in user and their Peer ID
    Whoami,
    /// List contacts
    Contacts,
    /// List pending connection requests
    Requests,
    /// Send a connection request
    Request {
        /// Peer ID (username) of the other user
        peer_id: String,

        /// Do not fall back to connecting when the user is not in the local database
        #[arg(long)]
        no_knock: bool,
    },
    /// Accept a pending connection request
    Accept { peer_id: String },
    /// Reject a pending connection request
    Reject { peer_id: String },
    /// Remove a contact
    Remove { peer_id: String },
    /// Stay online and record incoming connection requests
    Listen {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat with a contact
    Chat {
        #[arg(long)]
        peer_id: String,

        /// Name to show for the contact
        #[arg(long)]
        username: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn open_database(config: &AppConfig) -> anyhow::Result<Arc<dyn Database>> {
    let path = config.database_path();
    let db = SledDatabase::open(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(db))
}

async fn connections_page(config: &AppConfig, auth: &LocalAuth) -> anyhow::Result<ConnectionsPage> {
    let user = auth.require_user()?;
    let db = open_database(config)?;
    Ok(ConnectionsPage::new(ConnectionsService::open(db, user).await))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        let rooted = AppConfig::with_data_dir(dir);
        config.data_directory = rooted.data_directory;
        config.download_directory = rooted.download_directory;
    }
    config.validate()?;
    config.ensure_directories()?;

    // This guard needs to stay in scope, otherwise logs stop writing.
    let _guard = init_logging(&config.log_dir_path(), "peerchat")?;

    let auth = LocalAuth::new(&config.data_dir_path());

    match cli.command {
        Commands::Login { email } => {
            let user = auth.sign_in(&email)?;
            let db = open_database(&config)?;
            let service = ConnectionsService::open(db, user).await;
            println!("Signed in as {} (Peer ID: {})", service.user().email, service.username());
        }
        Commands::Logout => {
            auth.sign_out()?;
            println!("Signed out");
        }
        Commands::Whoami => {
            let page = connections_page(&config, &auth).await?;
            let service = page.service();
            println!("Email:   {}", service.user().email);
            println!("User ID: {}", service.user().uid);
            println!("Peer ID: {}", service.username());
        }
        Commands::Contacts => {
            let page = connections_page(&config, &auth).await?;
            println!("{}", page.contacts_view().await?);
        }
        Commands::Requests => {
            let page = connections_page(&config, &auth).await?;
            println!("{}", page.requests_view().await?);
        }
        Commands::Request { peer_id, no_knock } => {
            let page = connections_page(&config, &auth).await?;
            match page.send_request(&peer_id).await {
                Ok(notice) => println!("{}", notice),
                Err(PeerChatError::UserNotFound) if !no_knock => {
                    let username = page.service().username().to_string();
                    // Release the database so a listening page on this machine can record the request
                    drop(page);
                    info!("{} is not in the local database, connecting instead", peer_id);
                    let node = ChatNode::start(&username, &config.network).await?;
                    let notice = knock(node, &peer_id, config.timing.connect_timeout()).await;
                    println!("{}", notice);
                }
                Err(e) => println!("{}", Notice::error(e.to_string())),
            }
        }
        Commands::Accept { peer_id } => {
            let page = connections_page(&config, &auth).await?;
            println!("{}", page.accept(&peer_id).await);
        }
        Commands::Reject { peer_id } => {
            let page = connections_page(&config, &auth).await?;
            println!("{}", page.reject(&peer_id).await);
        }
        Commands::Remove { peer_id } => {
            let page = connections_page(&config, &auth).await?;
            match page.service().remove_contact(&peer_id).await? {
                0 => println!("{}", Notice::error(format!("{} is not in your contacts", peer_id))),
                _ => println!("{}", Notice::info(format!("{} removed from contacts", peer_id))),
            }
        }
        Commands::Listen { port } => {
            if let Some(port) = port {
                config.network.port = port;
            }
            let page = connections_page(&config, &auth).await?;
            let node = ChatNode::start(page.service().username(), &config.network).await?;
            page.listen(node).await?;
        }
        Commands::Chat {
            peer_id,
            username,
            port,
        } => {
            if let Some(port) = port {
                config.network.port = port;
            }
            validate_username(&peer_id)?;
            let user = auth.require_user()?;

            let (me, contact_name) = {
                let db = open_database(&config)?;
                let service = ConnectionsService::open(db.clone(), user.clone()).await;
                let me = match profile_username(db.as_ref(), &user.uid).await {
                    Ok(Some(name)) => name,
                    Ok(None) => user.uid.clone(),
                    Err(e) => {
                        error!("Error getting user data: {}", e);
                        user.uid.clone()
                    }
                };
                let contact_name = match username {
                    Some(name) => Some(name),
                    None => service
                        .contacts()
                        .await?
                        .into_iter()
                        .find(|c| c.peer_id == peer_id)
                        .map(|c| c.display_name().to_string()),
                };
                (me, contact_name)
            };

            let node = ChatNode::start(&me, &config.network).await?;
            let target = ChatTarget {
                peer_id,
                username: contact_name,
            };
            let page = ChatPage::new(config, node.handle.clone(), target);
            page.run(node).await?;
        }
    }

    Ok(())
}
