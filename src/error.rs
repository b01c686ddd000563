use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {what}"))
    }
}

/// Outcomes of a poll operation that the caller is expected to recover from,
/// each carrying the message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollError {
    /// The question does not exist, or is not published yet.
    #[error("Question not found")]
    NotFound,
    /// The question's voting window has closed.
    #[error("The question is ended. Voting is not allowed.")]
    VotingClosed,
    /// The submitted choice is missing or belongs to another question.
    #[error("You didn't select a choice.")]
    InvalidChoice,
    /// Voting was attempted without logging in.
    #[error("Please log in to vote.")]
    AuthenticationRequired,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = match self {
            Self::Status(status, _) => status,
            Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(ref err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Poll(PollError::NotFound) => Status::NotFound,
            Self::Poll(PollError::VotingClosed) => Status::Forbidden,
            Self::Poll(PollError::InvalidChoice) => Status::UnprocessableEntity,
            Self::Poll(PollError::AuthenticationRequired) => Status::Unauthorized,
        };
        match status.class() {
            StatusClass::ServerError => log::error!("{self}"),
            _ => log::warn!("{self}"),
        }
        Err(status)
    }
}
