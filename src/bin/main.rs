use mio::Poll;
use server_proxy::config::FromYaml;
use server_proxy::{config::AppConfig, error::Result, server::Server, shutdown};

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let content = std::fs::read_to_string(&config_path)?;
    let config = AppConfig::from_str(&content)?;

    shutdown::install();

    let poll = Poll::new()?;

    config.display_config();

    let mut server = Server::new(config, &poll)?;

    server.run(poll)
}
