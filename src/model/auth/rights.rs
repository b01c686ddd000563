use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Different privilege levels. Higher levels include the lower ones.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Staff = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Staff => "staff",
            }
        )
    }
}

/// A role an endpoint can demand of its caller.
pub trait Role {
    /// The minimum rights needed to act in this role.
    const RIGHTS: Rights;
}

/// Any logged-in user.
pub struct Voter;

impl Role for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

/// A user allowed to manage questions and accounts.
pub struct Staff;

impl Role for Staff {
    const RIGHTS: Rights = Rights::Staff;
}
