use clap::{Args, Parser, Subcommand};
use log::warn;
use std::path::PathBuf;

const MIN_KEY_LEN: usize = 32;

/// Personal movie watchlist
#[derive(Parser, Debug)]
#[command(name = "watchlist", version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory of the sled database
    #[arg(long, global = true, env = "WATCHLIST_DATABASE", default_value = "data.db")]
    pub database: PathBuf,

    /// Address the web server listens on
    #[arg(long, global = true, env = "WATCHLIST_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Key for the session cookie, at least 32 bytes
    #[arg(long, global = true, env = "WATCHLIST_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Glob matching the tera templates
    #[arg(
        long,
        global = true,
        env = "WATCHLIST_TEMPLATES",
        default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")
    )]
    pub templates: String,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the web server (the default)
    Serve,

    /// Create the database, optionally dropping all data first
    #[command(name = "initdb")]
    InitDb {
        /// Drop existing data before creating
        #[arg(long)]
        drop: bool,
    },

    /// Create a login account, or reset the password of an existing one
    ///
    /// sled locks the database directory, so stop `serve` first. The same
    /// holds for `initdb` and `forge`.
    Admin {
        /// The username used to log in
        #[arg(long)]
        username: String,

        /// The password used to log in
        #[arg(long, env = "WATCHLIST_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Fill the database with demo data
    Forge,
}

impl Config {
    pub fn secret_key(&self) -> anyhow::Result<Vec<u8>> {
        match &self.secret_key {
            Some(key) if key.len() >= MIN_KEY_LEN => Ok(key.as_bytes().to_vec()),
            Some(_) => anyhow::bail!("secret key must be at least {} bytes", MIN_KEY_LEN),
            None => {
                warn!("No secret key configured, sessions are signed with the development key");
                Ok(vec![0; MIN_KEY_LEN])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["watchlist", "--bind", "0.0.0.0:9000"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config.bind, "0.0.0.0:9000");
    }

    #[test]
    fn subcommands() {
        let cli = Cli::try_parse_from(["watchlist", "initdb", "--drop"]).unwrap();
        assert_eq!(cli.command, Some(Command::InitDb { drop: true }));

        let cli = Cli::try_parse_from([
            "watchlist",
            "admin",
            "--username",
            "root",
            "--password",
            "hunter22",
            "--database",
            "/tmp/watchlist",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Admin {
                username: "root".to_owned(),
                password: "hunter22".to_owned(),
            })
        );
        assert_eq!(cli.config.database, PathBuf::from("/tmp/watchlist"));
    }

    #[test]
    fn secret_key_length() {
        let mut cli = Cli::try_parse_from(["watchlist", "forge"]).unwrap();
        cli.config.secret_key = Some("short".to_owned());
        assert!(cli.config.secret_key().is_err());

        cli.config.secret_key = Some("k".repeat(MIN_KEY_LEN));
        assert_eq!(cli.config.secret_key().unwrap().len(), MIN_KEY_LEN);

        cli.config.secret_key = None;
        assert_eq!(cli.config.secret_key().unwrap(), vec![0; MIN_KEY_LEN]);
    }
}
