use anyhow::Result;
use clap::Parser as _;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use pixelclutch::{
    cli::{Cli, Command},
    config::{self, Config},
    PixelClutch,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelclutch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::ConfigTemplate) => {
            print!("{}", config::get_config_template());
        }
        Some(Command::ConfigInit { config_path }) => {
            let path = config::init_config(config_path)?;
            println!("Created config at {}", path.display());
        }
        None => {
            let config = Config::load(cli.args.config_path)?;
            PixelClutch::boot(config).await?.serve().await?;
        }
    }

    Ok(())
}
