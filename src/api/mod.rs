use rocket::Route;

mod admin;
mod auth;
mod polls;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(polls::routes());
    routes.extend(auth::routes());
    routes.extend(admin::routes());
    routes
}

/// Locations the handlers redirect between.
pub mod paths {
    use crate::model::mongodb::Id;

    pub const INDEX: &str = "/polls/";
    pub const LOGIN: &str = "/accounts/login/";

    pub fn detail(id: Id) -> String {
        format!("/polls/{id}/")
    }

    pub fn results(id: Id) -> String {
        format!("/polls/{id}/results/")
    }

    pub fn vote(id: Id) -> String {
        format!("/polls/{id}/vote/")
    }

    /// The login page, returning to `next` afterwards.
    pub fn login(next: &str) -> String {
        format!("{LOGIN}?next={next}")
    }
}
