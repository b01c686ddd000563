use serde::{Deserialize, Serialize};

use crate::model::api::Message;

/// Where to go after logging in when no usable `next` is given.
pub const DEFAULT_REDIRECT: &str = "/polls/";

/// Longest allowed username.
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Shortest allowed password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Submitted login credentials.
#[derive(Debug, FromForm)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    /// Where to send the user once logged in.
    pub fn redirect_target(&self) -> String {
        safe_next(self.next.as_deref())
    }
}

/// Only follow local absolute paths, so a crafted link cannot bounce a
/// freshly logged-in user to another site.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => DEFAULT_REDIRECT.to_string(),
    }
}

/// The login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPage {
    pub next: String,
    pub message: Option<Message>,
    pub errors: Vec<String>,
}

/// A new account request.
#[derive(Debug, FromForm)]
pub struct SignupForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

impl SignupForm {
    /// Everything wrong with this request that can be checked without the
    /// database. Empty if the account can be created.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.username.is_empty() {
            problems.push("A username is required.".to_string());
        } else if self.username.chars().count() > MAX_USERNAME_LENGTH {
            problems.push(format!(
                "Ensure the username has at most {MAX_USERNAME_LENGTH} characters."
            ));
        }
        if !self.username.chars().all(is_username_char) {
            problems.push(
                "Enter a valid username. This value may contain only letters, numbers, \
                 and @/./+/-/_ characters."
                    .to_string(),
            );
        }

        if self.password1 != self.password2 {
            problems.push("The two password fields didn't match.".to_string());
        } else if self.password1.chars().count() < MIN_PASSWORD_LENGTH {
            problems.push(format!(
                "This password is too short. It must contain at least \
                 {MIN_PASSWORD_LENGTH} characters."
            ));
        }

        problems
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

/// The signup form, with any problems from the last attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupPage {
    pub errors: Vec<String>,
}
