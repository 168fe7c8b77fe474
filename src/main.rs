mod auth;
mod config;
mod credentials;
mod database;
mod flash;
mod handlers;
mod model;
mod view;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{error, middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use config::{Cli, Command, Config};
use database::*;
use log::{debug, info};

pub(crate) fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> error::Error {
    debug!("{:?}", err);
    error::ErrorInternalServerError(message)
}

/// Creates `username` with the given password, or replaces the password
/// when the account already exists.
fn upsert_admin(db: &sled::Db, username: &str, password: &str) -> anyhow::Result<()> {
    if !model::valid_username(username) || password.is_empty() {
        anyhow::bail!("username must be 1 to 20 characters and password must not be empty");
    }
    reset(db, false)?;
    let digest = credentials::hash(password)?;
    match db.get_user_by_username(username)? {
        Some(mut user) => {
            info!("Updating user {}", username);
            user.password_hash = digest;
            db.save_user(&user)?;
        }
        None => {
            info!("Creating user {}", username);
            db.add_user(username, username, &digest)?
                .with_context(|| format!("username {} was taken concurrently", username))?;
        }
    }
    db.flush()?;
    Ok(())
}

async fn serve(config: Config, db: sled::Db) -> anyhow::Result<()> {
    let private_key = config.secret_key()?;
    let tera = web::Data::new(
        tera::Tera::new(&config.templates)
            .with_context(|| format!("loading templates from {}", config.templates))?,
    );
    reset(&db, false)?;
    let db = web::Data::new(db);

    info!("Listening on http://{}", config.bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(&private_key)
                    .name("auth-cookie")
                    .secure(false),
            ))
            .app_data(tera.clone())
            .app_data(db.clone())
            .configure(handlers::configure)
    })
    .bind(config.bind.as_str())?
    .run()
    .await?;
    Ok(())
}

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("watchlist=debug,actix_web=info"),
    )
    .init();

    let cli = Cli::parse();
    let db = sled::open(&cli.config.database)
        .with_context(|| format!("opening database {}", cli.config.database.display()))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.config, db).await?,
        Command::InitDb { drop } => {
            reset(&db, drop)?;
            info!("Initialized database.");
        }
        Command::Admin { username, password } => {
            upsert_admin(&db, &username, &password)?;
            info!("Done.");
        }
        Command::Forge => {
            forge(&db)?;
            info!("Done.");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_created_then_updated() {
        let db = temporary();
        upsert_admin(&db, "root", "first").unwrap();
        let created = db.get_user_by_username("root").unwrap().unwrap();
        assert_eq!(created.name, "root");
        assert!(credentials::verify("first", &created.password_hash));

        upsert_admin(&db, "root", "second").unwrap();
        let updated = db.get_user_by_username("root").unwrap().unwrap();
        assert_eq!(updated.id, created.id);
        assert!(credentials::verify("second", &updated.password_hash));
        assert!(!credentials::verify("first", &updated.password_hash));
    }

    #[test]
    fn admin_keeps_display_name() {
        let db = temporary();
        let mut user = db.add_user("root", "root", "").unwrap().unwrap();
        user.name = "Site Owner".to_owned();
        db.save_user(&user).unwrap();

        upsert_admin(&db, "root", "secret").unwrap();
        assert_eq!(db.get_user(user.id).unwrap().unwrap().name, "Site Owner");
    }

    #[test]
    fn admin_needs_credentials() {
        let db = temporary();
        assert!(upsert_admin(&db, "", "secret").is_err());
        assert!(upsert_admin(&db, "root", "").is_err());
        assert_eq!(db.first_user().unwrap(), None);
    }
}
