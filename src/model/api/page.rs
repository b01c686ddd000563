use rocket::{
    http::Status,
    request::{FlashMessage, Request},
    response::{self, Flash, Redirect, Responder},
    serde::json::Json,
};
use serde::{Deserialize, Serialize};

/// The result of a page-style endpoint: a rendered view, a view re-rendered
/// with an error status, or a redirect elsewhere.
#[derive(Debug)]
pub enum Page<T> {
    /// Render `T` with status 200.
    View(T),
    /// Render `T` with the given status, e.g. a form with errors.
    Rejected(Status, T),
    /// Redirect without a message.
    Redirect(Redirect),
    /// Redirect and leave a one-shot message for the next page.
    Flash(Flash<Redirect>),
}

impl<T> Page<T> {
    /// Redirect to `path` with an error message.
    pub fn error_to(path: String, message: impl Into<String>) -> Self {
        Self::Flash(Flash::error(Redirect::to(path), message.into()))
    }
}

impl<'r, 'o: 'r, T: Serialize> Responder<'r, 'o> for Page<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        match self {
            Self::View(body) => Json(body).respond_to(req),
            Self::Rejected(status, body) => (status, Json(body)).respond_to(req),
            Self::Redirect(redirect) => redirect.respond_to(req),
            Self::Flash(flash) => flash.respond_to(req),
        }
    }
}

/// A one-shot message left by the previous request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: String,
    pub text: String,
}

impl From<FlashMessage<'_>> for Message {
    fn from(flash: FlashMessage<'_>) -> Self {
        Self {
            kind: flash.kind().to_string(),
            text: flash.message().to_string(),
        }
    }
}

impl Message {
    /// Convert an optional flash from a request guard.
    pub fn from_flash(flash: Option<FlashMessage<'_>>) -> Option<Self> {
        flash.map(Self::from)
    }
}
