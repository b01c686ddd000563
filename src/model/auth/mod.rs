mod guard;
mod rights;
mod token;

pub use guard::StaffUser;
pub use rights::{Rights, Role, Staff, Voter};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
