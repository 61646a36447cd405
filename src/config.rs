use confique::{yaml::FormatOptions, Config as _};
use std::path::PathBuf;

use crate::team;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Confique(#[from] confique::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not determine config dir parent path")]
    ParentPath,

    #[error("Refusing to overwrite existing config: {0}")]
    Exists(PathBuf),

    #[error(transparent)]
    Xdg(#[from] xdg::BaseDirectoriesError),
}

#[derive(Clone, Debug, confique::Config)]
pub struct Config {
    /// Address the HTTP server listens on
    #[config(default = "127.0.0.1:3000")]
    pub bind_address: String,

    /// Database url. Defaults to $XDG_DATA/pixelclutch/db/database.sqlite3
    pub database_url: Option<String>,

    /// Database connection pool size
    #[config(default = 16)]
    pub database_pool_size: usize,

    /// Base64 encoded session key
    #[config(env = "PIXELCLUTCH_SESSION_KEY")]
    pub session_key: Option<String>,

    /// Account service configuration
    #[config(nested)]
    pub account_service: AccountServiceConfig,

    /// Team randomizer configuration
    #[config(nested)]
    pub team_randomizer: team::Config,
}

#[derive(Clone, Debug, confique::Config)]
pub struct AccountServiceConfig {
    /// Endpoint new registrations are posted to
    #[config(default = "http://127.0.0.1:3000/api/register")]
    pub registration_url: String,
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Config> {
        let config_path = get_config_path(config_path)?;
        let config = Config::builder().env().file(config_path).load()?;

        Ok(config)
    }
}

pub fn init_config(config_path: Option<PathBuf>) -> Result<PathBuf> {
    let config_path = get_config_path(config_path)?;
    if config_path.exists() {
        return Err(Error::Exists(config_path));
    }

    write_config_template(&config_path)?;

    Ok(config_path)
}

pub fn get_config_template() -> String {
    confique::yaml::template::<Config>(FormatOptions::default())
}

pub fn get_config_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => {
            let xdg_dirs = xdg::BaseDirectories::with_prefix("pixelclutch")?;
            Ok(xdg_dirs.get_config_file("config.yml"))
        }
    }
}

fn write_config_template(config_path: &PathBuf) -> Result<()> {
    let config_path_dir = config_path.parent().ok_or(Error::ParentPath)?;

    std::fs::create_dir_all(config_path_dir)?;
    std::fs::write(config_path, get_config_template())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_documents_every_section() {
        let template = get_config_template();

        assert!(template.contains("bind_address"));
        assert!(template.contains("registration_url"));
        assert!(template.contains("team_randomizer"));
        assert!(template.contains("PIXELCLUTCH_SESSION_KEY"));
    }

    #[test]
    fn defaults_fill_in_missing_values() {
        let config = Config::builder().load().unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:3000");
        assert_eq!(config.database_pool_size, 16);
        assert_eq!(
            config.account_service.registration_url,
            "http://127.0.0.1:3000/api/register"
        );
        assert_eq!(config.team_randomizer.model, "openai/gpt-4o");
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let path = std::env::temp_dir().join(format!(
            "pixelclutch-config-{}/config.yml",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        assert_eq!(init_config(Some(path.clone())).unwrap(), path);
        assert!(matches!(
            init_config(Some(path.clone())),
            Err(Error::Exists(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), get_config_template());

        std::fs::remove_file(&path).unwrap();
    }
}
