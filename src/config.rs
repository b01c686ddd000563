use std::num::NonZeroU32;

use chrono::Duration;
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::user::ensure_staff_exists,
    mongodb::{ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    index_limit: Option<NonZeroU32>,
    admin_username: String,
    // secrets
    jwt_secret: String,
    admin_password: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Maximum number of questions on the index page, if any.
    /// A limit of zero is refused when the config is loaded.
    pub fn index_limit(&self) -> Option<u32> {
        self.index_limit.map(NonZeroU32::get)
    }

    /// Username of the staff account created when none exists.
    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    /// Password of the staff account created when none exists.
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the database fairing and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// Name of the production database.
const DATABASE: &str = "polls";

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
///
/// Must be attached after [`ConfigFairing`], since the bootstrap staff account
/// comes from the application config.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }

        // Ensure somebody can log in to manage questions.
        let Some(app_config) = rocket.state::<Config>() else {
            error!("Application config must be loaded before the database");
            return Err(rocket);
        };
        if let Err(e) = ensure_staff_exists(&Coll::from_db(&db), app_config).await {
            error!("Failed to bootstrap staff account: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    fn figment() -> Figment {
        Figment::new()
            .merge(("auth_ttl", 60))
            .merge(("admin_username", "admin"))
            .merge(("admin_password", "admin password"))
            .merge(("jwt_secret", "test secret"))
    }

    #[test]
    fn index_limit_is_optional() {
        let config = figment().extract::<Config>().unwrap();
        assert_eq!(config.index_limit(), None);

        let config = figment()
            .merge(("index_limit", 5))
            .extract::<Config>()
            .unwrap();
        assert_eq!(config.index_limit(), Some(5));
    }

    #[test]
    fn zero_index_limit_is_refused() {
        let result = figment().merge(("index_limit", 0)).extract::<Config>();
        assert!(result.is_err());
    }
}
