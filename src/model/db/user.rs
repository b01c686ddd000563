use argon2::Config as Argon2Config;
use log::{error, info, warn};
use mongodb::bson::doc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    auth::Rights,
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// A user without an ID, ready for insertion.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl NewUser {
    /// Create a user, hashing the plaintext password.
    pub fn new(username: String, password: &str, is_staff: bool) -> Result<Self> {
        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(password.as_bytes(), &salt, &Argon2Config::default())?;
        Ok(Self {
            username,
            password_hash,
            is_staff,
        })
    }
}

/// A user from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl User {
    /// Check whether the given password is correct.
    /// A malformed stored hash never matches.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }

    /// The rights this user holds.
    pub fn rights(&self) -> Rights {
        if self.is_staff {
            Rights::Staff
        } else {
            Rights::Voter
        }
    }

    /// Find a user by username.
    pub async fn by_username(users: &Coll<User>, username: &str) -> Result<Option<User>> {
        Ok(users.find_one(doc! { "username": username }, None).await?)
    }
}

/// Create the configured staff account if there are no staff users at all.
/// If a voter already owns the configured username, nothing is created.
///
/// This operation is idempotent.
pub async fn ensure_staff_exists(users: &Coll<NewUser>, config: &Config) -> Result<()> {
    let staff = users.count_documents(doc! { "is_staff": true }, None).await?;
    if staff > 0 {
        return Ok(());
    }

    warn!(
        "No staff users found, creating '{}' from config",
        config.admin_username()
    );
    let admin = NewUser::new(
        config.admin_username().to_string(),
        config.admin_password(),
        true,
    )?;
    let result = users.insert_one(&admin, None).await;
    if is_duplicate_key_error(result.as_ref()) {
        error!(
            "Cannot create staff user '{}': a voter already has that username",
            admin.username
        );
        return Ok(());
    }
    result?;
    info!("Created staff user '{}'", admin.username);
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    /// Insert a user and return it with its ID.
    pub async fn insert(users: &Coll<NewUser>, user: NewUser) -> User {
        let id: Id = users
            .insert_one(&user, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            is_staff: user.is_staff,
        }
    }
}
