use clap::Parser;
use client::discovery::{default_target, discover_servers};
use client::game::ClientView;
use client::input::parse_command;
use client::network::{GameConnection, CONNECT_TIMEOUT};
use log::info;
use shared::{ClientMessage, Happening};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// TCP port of the server
    #[arg(short = 'p', long, default_value_t = shared::DEFAULT_GAME_SERVER_PORT)]
    port: u16,

    /// Look for servers on the local network and join the first one found
    #[arg(short = 'd', long)]
    discover: bool,

    /// How long to wait for discovery replies in milliseconds
    #[arg(long, default_value = "1000")]
    wait_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let address = if args.discover {
        info!("Looking for servers...");
        let servers = discover_servers(default_target(), Duration::from_millis(args.wait_ms)).await?;
        for server in &servers {
            println!("Found server at {}", server.ip());
        }
        match servers.first() {
            Some(server) => SocketAddr::new(server.ip(), args.port).to_string(),
            None => {
                eprintln!("No servers found");
                return Ok(());
            }
        }
    } else {
        match args.server.parse::<std::net::IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, args.port).to_string(),
            Err(_) => format!("{}:{}", args.server, args.port),
        }
    };

    info!("Connecting to: {}", address);
    let mut connection = match GameConnection::connect(&address, CONNECT_TIMEOUT).await {
        Ok(connection) => connection,
        Err(e) => {
            eprintln!("Could not connect to {}: {}", address, e);
            return Ok(());
        }
    };
    connection.send(&ClientMessage::Join {}).await?;

    println!("Commands: w/a/s/d, move <dir>, attack <dir>, say <text>, map, join, quit");

    let mut view = ClientView::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().eq_ignore_ascii_case("quit") {
                    break;
                }
                match parse_command(&line) {
                    Ok(message) => connection.send(&message).await?,
                    Err(e) => eprintln!("{}", e),
                }
            }
            message = connection.recv() => {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        eprintln!("Disconnected: {}", e);
                        break;
                    }
                };
                let was_dead = view.is_dead();
                if let Some(line) = view.apply(&message) {
                    println!("{}", line);
                }
                if view.is_dead() && !was_dead {
                    println!("You died. Type 'join' to respawn.");
                }
                if matches!(
                    message.happening,
                    Happening::Map { .. } | Happening::Join { .. } | Happening::Changes { .. }
                ) {
                    let player = view.player();
                    println!("{}", view.map_text());
                    println!(
                        "HP {}  STR {}  K/D {}/{}",
                        player.health, player.strength, player.kills, player.deaths
                    );
                }
            }
        }
    }

    Ok(())
}
