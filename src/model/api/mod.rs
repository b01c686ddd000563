//! API-compatible types.
//!
//! Every view is a JSON "page" describing what a template would render:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Flash messages are carried along as `{kind, text}`.

pub mod account;
pub mod id;
pub mod page;
pub mod poll;
pub mod question;

pub use id::ApiId;
pub use page::{Message, Page};
