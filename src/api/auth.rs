use rocket::{
    form::Form,
    http::{Cookie, CookieJar, Status},
    request::FlashMessage,
    response::Redirect,
    serde::json::Json,
    Route, State,
};

use crate::{
    api::paths,
    audit::{self, AuthEvent, ClientIp},
    error::Result,
    model::{
        api::{
            account::{safe_next, LoginForm, LoginPage, SignupForm, SignupPage},
            Message, Page,
        },
        auth::{AuthToken, Voter, AUTH_TOKEN_COOKIE},
        db::user::{NewUser, User},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    Config,
};

/// Shown for any unknown username or wrong password alike.
const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Logout audit name when nobody was logged in.
const ANONYMOUS: &str = "anonymous";

pub fn routes() -> Vec<Route> {
    routes![login_page, login, logout, signup_page, signup]
}

/// Log `user` in on this client.
fn start_session(cookies: &CookieJar<'_>, user: &User, ip: &ClientIp, config: &Config) {
    cookies.add(AuthToken::<Voter>::new(user).into_cookie(config));
    audit::record(AuthEvent::LoggedIn, &user.username, ip);
}

#[get("/accounts/login?<next>")]
fn login_page(next: Option<String>, flash: Option<FlashMessage<'_>>) -> Json<LoginPage> {
    Json(LoginPage {
        next: safe_next(next.as_deref()),
        message: Message::from_flash(flash),
        errors: Vec::new(),
    })
}

#[post("/accounts/login", data = "<credentials>")]
async fn login(
    ip: ClientIp,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
    credentials: Form<LoginForm>,
) -> Result<Page<LoginPage>> {
    let user = User::by_username(&users, &credentials.username)
        .await?
        .filter(|user| user.verify_password(&credentials.password));

    let Some(user) = user else {
        audit::record(AuthEvent::LoginFailed, &credentials.username, &ip);
        return Ok(Page::Rejected(
            Status::Unauthorized,
            LoginPage {
                next: credentials.redirect_target(),
                message: None,
                errors: vec![INVALID_LOGIN.to_string()],
            },
        ));
    };

    start_session(cookies, &user, &ip, config);
    Ok(Page::Redirect(Redirect::to(credentials.redirect_target())))
}

#[post("/accounts/logout")]
fn logout(user: Option<User>, ip: ClientIp, cookies: &CookieJar<'_>) -> Redirect {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    let username = user.as_ref().map_or(ANONYMOUS, |user| user.username.as_str());
    audit::record(AuthEvent::LoggedOut, username, &ip);
    Redirect::to(paths::INDEX)
}

#[get("/signup")]
fn signup_page() -> Json<SignupPage> {
    Json(SignupPage::default())
}

#[post("/signup", data = "<form>")]
async fn signup(
    ip: ClientIp,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
    form: Form<SignupForm>,
) -> Result<Page<SignupPage>> {
    let mut errors = form.problems();
    if errors.is_empty() && User::by_username(&users, &form.username).await?.is_some() {
        errors.push(USERNAME_TAKEN.to_string());
    }
    if !errors.is_empty() {
        return Ok(Page::Rejected(
            Status::UnprocessableEntity,
            SignupPage { errors },
        ));
    }

    let new_user = NewUser::new(form.username.clone(), &form.password1, false)?;
    let result = new_users.insert_one(&new_user, None).await;
    // Somebody else took the name since the check above.
    if is_duplicate_key_error(result.as_ref()) {
        return Ok(Page::Rejected(
            Status::UnprocessableEntity,
            SignupPage {
                errors: vec![USERNAME_TAKEN.to_string()],
            },
        ));
    }
    let id: Id = result?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();

    let user = User {
        id,
        username: new_user.username,
        password_hash: new_user.password_hash,
        is_staff: new_user.is_staff,
    };
    start_session(cookies, &user, &ip, config);
    Ok(Page::Redirect(Redirect::to(paths::INDEX)))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::{Client, LocalResponse},
    };

    use super::*;
    use crate::model::{
        api::account::DEFAULT_REDIRECT,
        db::{
            question::{examples::insert as insert_question, NewQuestion},
            user::examples::insert as insert_user,
        },
    };

    const PASSWORD: &str = "hunter22hunter22";

    fn location<'a>(response: &'a LocalResponse<'_>) -> Option<&'a str> {
        response.headers().get_one("Location")
    }

    async fn create_user(users: &Coll<NewUser>, username: &str) -> User {
        let user = NewUser::new(username.to_string(), PASSWORD, false).unwrap();
        insert_user(users, user).await
    }

    async fn post_login<'c>(client: &'c Client, body: String) -> LocalResponse<'c> {
        client
            .post(paths::LOGIN)
            .header(ContentType::Form)
            .header(Header::new("X-Forwarded-For", "203.0.113.9, 10.0.0.1"))
            .body(body)
            .dispatch()
            .await
    }

    async fn post_signup<'c>(
        client: &'c Client,
        username: &str,
        password1: &str,
        password2: &str,
    ) -> LocalResponse<'c> {
        client
            .post("/signup")
            .header(ContentType::Form)
            .body(format!(
                "username={username}&password1={password1}&password2={password2}"
            ))
            .dispatch()
            .await
    }

    #[backend_test]
    async fn login_valid(client: Client, users: Coll<NewUser>) {
        create_user(&users, "alice").await;

        let response = post_login(&client, format!("username=alice&password={PASSWORD}")).await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(location(&response), Some(DEFAULT_REDIRECT));
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn login_invalid(client: Client, users: Coll<NewUser>) {
        create_user(&users, "alice").await;

        for body in [
            "username=alice&password=wrong".to_string(),
            format!("username=nobody&password={PASSWORD}"),
            format!("username=ALICE&password={PASSWORD}"),
        ] {
            let response = post_login(&client, body).await;
            assert_eq!(response.status(), Status::Unauthorized);
            let page: LoginPage = response.into_json().await.unwrap();
            assert_eq!(page.errors, vec![INVALID_LOGIN.to_string()]);
            assert_eq!(client.cookies().get(AUTH_TOKEN_COOKIE), None);
        }
    }

    #[backend_test]
    async fn login_follows_local_next_only(client: Client, users: Coll<NewUser>) {
        create_user(&users, "alice").await;

        let response = post_login(
            &client,
            format!("username=alice&password={PASSWORD}&next=/polls/abc/vote/"),
        )
        .await;
        assert_eq!(location(&response), Some("/polls/abc/vote/"));

        let response = post_login(
            &client,
            format!("username=alice&password={PASSWORD}&next=https://evil.example/"),
        )
        .await;
        assert_eq!(location(&response), Some(DEFAULT_REDIRECT));
    }

    #[backend_test]
    async fn vote_after_login_redirect(client: Client, db: Database, users: Coll<NewUser>) {
        create_user(&users, "alice").await;
        let question = insert_question(&Coll::from_db(&db), &NewQuestion::open_example()).await;

        // Voting anonymously sends us to the login page with a message.
        let response = client
            .post(paths::vote(question))
            .header(ContentType::Form)
            .body("choice=")
            .dispatch()
            .await;
        let login_url = location(&response).unwrap().to_string();
        assert_eq!(login_url, format!("/accounts/login/?next=/polls/{question}/vote/"));

        let response = client.get(login_url).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let page: LoginPage = response.into_json().await.unwrap();
        assert_eq!(page.next, paths::vote(question));
        assert_eq!(page.message.unwrap().text, "Please log in to vote.");

        // Logging in returns us to the vote, which leads back to the ballot.
        let response = post_login(
            &client,
            format!("username=alice&password={PASSWORD}&next={}", page.next),
        )
        .await;
        assert_eq!(location(&response), Some(paths::vote(question).as_str()));

        let response = client.get(paths::vote(question)).dispatch().await;
        assert_eq!(location(&response), Some(paths::detail(question).as_str()));
    }

    #[backend_test(user)]
    async fn logout_clears_session(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.post("/accounts/logout/").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(location(&response), Some(paths::INDEX));
        assert_eq!(client.cookies().get(AUTH_TOKEN_COOKIE), None);

        // Logging out again is harmless.
        let response = client.post("/accounts/logout/").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
    }

    #[backend_test]
    async fn signup_logs_in(client: Client, db: Database) {
        let response = client.get("/signup").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let page: SignupPage = response.into_json().await.unwrap();
        assert!(page.errors.is_empty());

        let response = post_signup(&client, "new.user", PASSWORD, PASSWORD).await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(location(&response), Some(paths::INDEX));
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let user = User::by_username(&Coll::from_db(&db), "new.user")
            .await
            .unwrap()
            .unwrap();
        assert!(!user.is_staff);
        assert!(user.verify_password(PASSWORD));
    }

    #[backend_test]
    async fn signup_rejects_bad_requests(client: Client, users: Coll<NewUser>) {
        create_user(&users, "taken").await;

        let response = post_signup(&client, "taken", PASSWORD, PASSWORD).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let page: SignupPage = response.into_json().await.unwrap();
        assert_eq!(page.errors, vec![USERNAME_TAKEN.to_string()]);

        let response = post_signup(&client, "someone", PASSWORD, "different1").await;
        assert_eq!(response.status(), Status::UnprocessableEntity);

        let response = post_signup(&client, "some%20one", PASSWORD, PASSWORD).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);

        assert_eq!(users.count_documents(None, None).await.unwrap(), 1);
        assert_eq!(client.cookies().get(AUTH_TOKEN_COOKIE), None);
    }

    #[backend_test]
    async fn deleted_user_is_logged_out(client: Client, users: Coll<NewUser>, db: Database) {
        let user = create_user(&users, "alice").await;
        post_login(&client, format!("username=alice&password={PASSWORD}")).await;
        let question = insert_question(&Coll::from_db(&db), &NewQuestion::open_example()).await;

        users.delete_one(user.id.as_doc(), None).await.unwrap();

        let response = client
            .post(paths::vote(question))
            .header(ContentType::Form)
            .body("choice=")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert!(location(&response).unwrap().starts_with(paths::LOGIN));
    }
}
