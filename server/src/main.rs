use clap::Parser;
use log::info;
use server::config::{DiscoveryConfig, ServerConfig, WorldConfig};
use server::network::Server;
use shared::{DEFAULT_GAME_SERVER_PORT, MAP_HEIGHT, MAP_WIDTH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the game server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port of the game server, also used for discovery
    #[arg(short = 'p', long, default_value_t = DEFAULT_GAME_SERVER_PORT)]
    port: u16,

    /// Map width in cells
    #[arg(long, default_value_t = MAP_WIDTH)]
    width: usize,

    /// Map height in cells
    #[arg(long, default_value_t = MAP_HEIGHT)]
    height: usize,

    /// Seed for map generation and spawn placement
    #[arg(long)]
    seed: Option<u64>,

    /// Do not answer LAN discovery requests
    #[arg(long)]
    no_discovery: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        world: WorldConfig {
            width: args.width,
            height: args.height,
            seed: args.seed,
            ..Default::default()
        },
        discovery: DiscoveryConfig {
            enabled: !args.no_discovery,
            port: args.port,
            ..Default::default()
        },
    };

    info!("Starting server...");
    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
