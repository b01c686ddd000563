//! Data types for questions, choices, votes and accounts.

pub mod api;
pub mod auth;
pub mod db;
pub mod eligibility;
pub mod mongodb;
