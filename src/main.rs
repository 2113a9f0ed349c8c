use crate::client::StreamClient;
use crate::config::{ClientConfig, app_name, app_version};
use crate::render::LogRenderer;
use crate::session::SessionState;
use clap::{Arg, Command};
use log::error;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod render;
pub mod rtp;
pub mod session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(app_version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file.")
                .required(false),
        )
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .value_name("ADDR")
                .help("Server address for the control channel.")
                .required(false),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server control port.")
                .required(false),
        )
        .arg(
            Arg::new("data-port")
                .short('d')
                .long("data-port")
                .value_name("PORT")
                .help("Local port for the data channel (0 picks one).")
                .required(false),
        )
        .arg(
            Arg::new("resource")
                .short('r')
                .long("resource")
                .value_name("NAME")
                .help("Stream name requested at setup.")
                .required(false),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ClientConfig::load(Path::new(path))?,
        None => ClientConfig::default(),
    };
    if let Some(server) = matches.get_one::<String>("server") {
        config.server_addr = server.clone();
    }
    if let Some(port) = matches.get_one::<String>("port") {
        config.control_port = port.parse()?;
    }
    if let Some(port) = matches.get_one::<String>("data-port") {
        config.data_port = port.parse()?;
    }
    if let Some(resource) = matches.get_one::<String>("resource") {
        config.resource = resource.clone();
    }

    let client = StreamClient::connect(&config, Box::new(LogRenderer)).await?;
    run_repl(client).await
}

/// Line-oriented command loop on stdin; one lifecycle command per line.
async fn run_repl(client: StreamClient) -> anyhow::Result<()> {
    println!("commands: setup | play | pause | teardown | status | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {}
            "setup" => client.setup().await?,
            "play" => client.play().await?,
            "pause" => client.pause().await?,
            "status" => println!(
                "session {:?} (id {}) | {}",
                client.state(),
                client.session_id(),
                client.summary()
            ),
            "teardown" | "quit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    if client.state() == SessionState::Idle {
        return Ok(());
    }
    client.teardown().await?;
    if tokio::time::timeout(Duration::from_secs(5), client.wait_teardown())
        .await
        .is_err()
    {
        error!("teardown acknowledgment never arrived, giving up");
    }
    Ok(())
}
