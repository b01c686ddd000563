use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::Error;
use crate::model::{
    db::user::User,
    mongodb::{Coll, Id},
};

use super::{
    rights::{Staff, Voter},
    token::AuthToken,
};

/// Look up the user a token names. A token for a deleted user is treated as
/// not logged in.
async fn lookup(req: &Request<'_>, id: Id) -> Outcome<User, Error> {
    // Unwrap is safe as the database is always managed.
    let users = req.guard::<Coll<User>>().await.unwrap();
    match users.find_one(id.as_doc(), None).await {
        Ok(Some(user)) => Outcome::Success(user),
        Ok(None) => Outcome::Forward(()),
        Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
    }
}

/// The logged-in user, whatever their rights.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken<Voter>>().await);
        lookup(req, token.id).await
    }
}

/// A logged-in user who is still staff.
pub struct StaffUser(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StaffUser {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken<Staff>>().await);
        let user = try_outcome!(lookup(req, token.id).await);
        if user.is_staff {
            Outcome::Success(Self(user))
        } else {
            Outcome::Forward(())
        }
    }
}
