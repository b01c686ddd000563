use chrono::{DateTime, Utc};
use mongodb::bson::oid::Error as IdError;
use rocket::{
    form::Form,
    http::Status,
    request::FlashMessage,
    response::Redirect,
    serde::json::Json,
    Route, State,
};

use crate::{
    api::paths,
    audit,
    error::{Error, PollError, Result},
    model::{
        api::{
            poll::{
                ChoiceDescription, ChoiceResult, DetailPage, IndexPage, QuestionSummary,
                ResultsPage, VoteForm,
            },
            ApiId, Message, Page,
        },
        db::{choice::Choice, question::Question, user::User, vote::Vote},
        eligibility::PublishWindow,
        mongodb::{Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        home,
        index,
        detail,
        results,
        vote,
        vote_requires_login,
        vote_landing
    ]
}

/// Turn the poll errors a visitor can cause into a redirect to the listing
/// carrying the error's message.
fn recover<T>(err: Error) -> Result<Page<T>> {
    match err {
        Error::Poll(e @ (PollError::NotFound | PollError::VotingClosed)) => {
            Ok(Page::error_to(paths::INDEX.to_string(), e.to_string()))
        }
        other => Err(other),
    }
}

/// A malformed ID names no question.
fn parse_id(question_id: std::result::Result<Id, IdError>) -> Result<Id> {
    question_id.map_err(|_| PollError::NotFound.into())
}

#[get("/")]
fn home() -> Redirect {
    Redirect::moved(paths::INDEX)
}

#[get("/polls")]
async fn index(
    flash: Option<FlashMessage<'_>>,
    questions: Coll<Question>,
    config: &State<Config>,
) -> Result<Json<IndexPage>> {
    let now = Utc::now();
    let latest = Question::list_published(&questions, now, config.index_limit()).await?;
    Ok(Json(IndexPage {
        message: Message::from_flash(flash),
        latest_question_list: latest
            .into_iter()
            .map(|question| QuestionSummary::new(question, now))
            .collect(),
    }))
}

/// The ballot for `question`, optionally carrying an error from a rejected vote.
async fn ballot_page(
    question: Question,
    user: Option<&User>,
    error_message: Option<String>,
    choices: &Coll<Choice>,
    votes: &Coll<Vote>,
) -> Result<DetailPage> {
    let voted_for = match user {
        Some(user) => Vote::of_voter(votes, user.id, question.id)
            .await?
            .map(|vote| ApiId::from(vote.choice_id)),
        None => None,
    };
    let choices = question
        .choices(choices)
        .await?
        .into_iter()
        .map(ChoiceDescription::from)
        .collect();
    Ok(DetailPage {
        error_message,
        question: question.into(),
        choices,
        voted_for,
    })
}

async fn show_detail(
    question_id: std::result::Result<Id, IdError>,
    user: Option<&User>,
    questions: &Coll<Question>,
    choices: &Coll<Choice>,
    votes: &Coll<Vote>,
) -> Result<Page<DetailPage>> {
    let now = Utc::now();
    let question = Question::find_published(questions, parse_id(question_id)?, now).await?;
    if !question.can_vote(now) {
        return Ok(Page::Redirect(Redirect::to(paths::results(question.id))));
    }
    let page = ballot_page(question, user, None, choices, votes).await?;
    Ok(Page::View(page))
}

#[get("/polls/<question_id>")]
async fn detail(
    question_id: std::result::Result<Id, IdError>,
    user: Option<User>,
    questions: Coll<Question>,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
) -> Result<Page<DetailPage>> {
    show_detail(question_id, user.as_ref(), &questions, &choices, &votes)
        .await
        .or_else(recover)
}

async fn show_results(
    question_id: std::result::Result<Id, IdError>,
    questions: &Coll<Question>,
    choices: &Coll<Choice>,
    votes: &Coll<Vote>,
) -> Result<Page<ResultsPage>> {
    let question = Question::find_published(questions, parse_id(question_id)?, Utc::now()).await?;
    let choices = question
        .tally(choices, votes)
        .await?
        .into_iter()
        .map(|(choice, count)| ChoiceResult::new(choice, count))
        .collect();
    Ok(Page::View(ResultsPage {
        question: question.into(),
        choices,
    }))
}

#[get("/polls/<question_id>/results")]
async fn results(
    question_id: std::result::Result<Id, IdError>,
    questions: Coll<Question>,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
) -> Result<Page<ResultsPage>> {
    show_results(question_id, &questions, &choices, &votes)
        .await
        .or_else(recover)
}

/// Point `user`'s vote on the question at the submitted choice.
async fn cast_vote(
    question_id: std::result::Result<Id, IdError>,
    choice: Option<Id>,
    user: &User,
    now: DateTime<Utc>,
    questions: &Coll<Question>,
    choices: &Coll<Choice>,
    votes: &Coll<Vote>,
) -> Result<Page<DetailPage>> {
    let question = Question::find(questions, parse_id(question_id)?).await?;
    if !question.can_vote(now) {
        return Err(PollError::VotingClosed.into());
    }

    let chosen = match choice {
        Some(choice_id) => Choice::of_question(choices, question.id, choice_id).await,
        None => Err(PollError::InvalidChoice.into()),
    };
    let chosen = match chosen {
        Ok(chosen) => chosen,
        Err(Error::Poll(e @ PollError::InvalidChoice)) => {
            let page = ballot_page(question, Some(user), Some(e.to_string()), choices, votes).await?;
            return Ok(Page::Rejected(Status::UnprocessableEntity, page));
        }
        Err(e) => return Err(e),
    };

    Vote::record(votes, user.id, &chosen).await?;
    audit::record_vote(&user.username, &question.text);
    Ok(Page::Redirect(Redirect::to(paths::results(question.id))))
}

#[post("/polls/<question_id>/vote", data = "<ballot>")]
async fn vote(
    question_id: std::result::Result<Id, IdError>,
    user: User,
    questions: Coll<Question>,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
    ballot: Option<Form<VoteForm>>,
) -> Result<Page<DetailPage>> {
    // A body that isn't a form at all selects nothing.
    let choice = ballot.and_then(|ballot| ballot.choice);
    cast_vote(
        question_id,
        choice,
        &user,
        Utc::now(),
        &questions,
        &choices,
        &votes,
    )
    .await
    .or_else(recover)
}

/// Reached when nobody is logged in: send the visitor to log in and come back.
#[post("/polls/<question_id>/vote", rank = 2)]
fn vote_requires_login(question_id: std::result::Result<Id, IdError>) -> Page<()> {
    let next = match question_id {
        Ok(id) => paths::vote(id),
        Err(_) => paths::INDEX.to_string(),
    };
    Page::error_to(
        paths::login(&next),
        PollError::AuthenticationRequired.to_string(),
    )
}

/// Where login sends the user back to after a vote was interrupted.
#[get("/polls/<question_id>/vote")]
fn vote_landing(question_id: std::result::Result<Id, IdError>) -> Page<()> {
    match question_id {
        Ok(id) => Page::Redirect(Redirect::to(paths::detail(id))),
        Err(_) => Page::error_to(paths::INDEX.to_string(), PollError::NotFound.to_string()),
    }
}
