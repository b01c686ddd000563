//! Audit trail for authentication and voting.
//!
//! Every record is written synchronously under [`AUDIT_TARGET`], so
//! `log4rs.yaml` can route them to their own appender.

use std::fmt::{Display, Formatter};
use std::net::IpAddr;

use log::{info, warn};
use rocket::request::{FromRequest, Outcome, Request};

/// Log target of all audit records.
pub const AUDIT_TARGET: &str = "polls_backend::audit";

/// Header set by reverse proxies to carry the original client address.
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// Used when neither a forwarded address nor a peer address is known.
const UNKNOWN_ADDRESS: &str = "unknown";

/// The address a request originated from: the first `X-Forwarded-For` entry
/// if present, else the direct peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(String);

impl ClientIp {
    pub fn from_parts(forwarded_for: Option<&str>, peer: Option<IpAddr>) -> Self {
        let forwarded = forwarded_for
            .and_then(|header| header.split(',').next())
            .map(str::trim)
            .filter(|addr| !addr.is_empty());
        match (forwarded, peer) {
            (Some(addr), _) => Self(addr.to_string()),
            (None, Some(ip)) => Self(ip.to_string()),
            (None, None) => Self(UNKNOWN_ADDRESS.to_string()),
        }
    }

    pub fn of(req: &Request<'_>) -> Self {
        Self::from_parts(
            req.headers().get_one(FORWARDED_FOR_HEADER),
            req.remote().map(|addr| addr.ip()),
        )
    }
}

impl Display for ClientIp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientIp::of(req))
    }
}

/// Outcomes of an authentication attempt worth auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn,
    LoginFailed,
    LoggedOut,
}

impl AuthEvent {
    /// The audit line for this event.
    pub fn describe(&self, username: &str, ip: &ClientIp) -> String {
        match self {
            Self::LoggedIn => format!("Login user: {username} via ip: {ip}"),
            Self::LoginFailed => format!("Login failed for: {username} via ip: {ip}"),
            Self::LoggedOut => format!("Logout user: {username} via ip: {ip}"),
        }
    }
}

/// Record an authentication event. Called by the auth handlers on every outcome.
pub fn record(event: AuthEvent, username: &str, ip: &ClientIp) {
    let line = event.describe(username, ip);
    match event {
        AuthEvent::LoginFailed => warn!(target: AUDIT_TARGET, "{line}"),
        AuthEvent::LoggedIn | AuthEvent::LoggedOut => info!(target: AUDIT_TARGET, "{line}"),
    }
}

/// Record a successful vote.
pub fn record_vote(username: &str, question: &str) {
    info!(target: AUDIT_TARGET, "{username} voted in {question}.");
}
