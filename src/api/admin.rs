use chrono::Utc;
use log::info;
use mongodb::{bson::doc, Client};
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            poll::ChoiceResult,
            question::{AdminQuestion, ChoiceSpec, QuestionSpec},
        },
        auth::StaffUser,
        db::{
            choice::{Choice, NewChoice},
            question::{NewQuestion, Question},
            user::User,
            vote::Vote,
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        list_questions,
        create_question,
        add_choice,
        delete_question,
        delete_choice,
        delete_user,
    ]
}

/// A question with its tallies as staff see it.
async fn describe(
    question: Question,
    choices: &Coll<Choice>,
    votes: &Coll<Vote>,
) -> Result<AdminQuestion> {
    let tally = question
        .tally(choices, votes)
        .await?
        .into_iter()
        .map(|(choice, count)| ChoiceResult::new(choice, count))
        .collect();
    Ok(AdminQuestion::new(question, tally, Utc::now()))
}

#[get("/admin/questions?<search>")]
async fn list_questions(
    _staff: StaffUser,
    search: Option<String>,
    questions: Coll<Question>,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
) -> Result<Json<Vec<AdminQuestion>>> {
    let found = Question::search(&questions, search.as_deref()).await?;
    let mut described = Vec::with_capacity(found.len());
    for question in found {
        described.push(describe(question, &choices, &votes).await?);
    }
    Ok(Json(described))
}

#[post("/admin/questions", data = "<spec>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn create_question(
    staff: StaffUser,
    spec: Json<QuestionSpec>,
    new_questions: Coll<NewQuestion>,
    new_choices: Coll<NewChoice>,
    questions: Coll<Question>,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<Json<AdminQuestion>> {
    spec.check()
        .map_err(|reason| Error::Status(Status::UnprocessableEntity, reason))?;
    let (question, choice_texts) = spec.0.into_parts();

    // Insert the question and its choices together.
    let question_id: Id = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let question_id: Id = new_questions
            .insert_one_with_session(&question, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB
            .into();

        let new = choice_texts
            .into_iter()
            .map(|text| NewChoice { question_id, text })
            .collect::<Vec<_>>();
        // Inserting nothing is an error.
        if !new.is_empty() {
            new_choices
                .insert_many_with_session(&new, None, &mut session)
                .await?;
        }

        session.commit_transaction().await?;
        question_id
    };
    info!(
        "{} created question {question_id}: {}",
        staff.0.username, question.text
    );

    let created = Question::find(&questions, question_id).await?;
    Ok(Json(describe(created, &choices, &votes).await?))
}

#[post("/admin/questions/<question_id>/choices", data = "<spec>", format = "json")]
async fn add_choice(
    _staff: StaffUser,
    question_id: Id,
    spec: Json<ChoiceSpec>,
    questions: Coll<Question>,
    new_choices: Coll<NewChoice>,
) -> Result<Json<ChoiceResult>> {
    spec.check()
        .map_err(|reason| Error::Status(Status::UnprocessableEntity, reason))?;
    let question = Question::find(&questions, question_id).await?;

    let choice = NewChoice {
        question_id: question.id,
        text: spec.0.choice_text,
    };
    let id: Id = new_choices
        .insert_one(&choice, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    let choice = Choice {
        id,
        question_id: choice.question_id,
        text: choice.text,
    };
    Ok(Json(ChoiceResult::new(choice, 0)))
}

#[delete("/admin/questions/<question_id>")]
async fn delete_question(
    staff: StaffUser,
    question_id: Id,
    questions: Coll<Question>,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    let question = Question::find(&questions, question_id).await?;

    // Atomically delete the question and everything hanging off it.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        questions
            .delete_one_with_session(question.id.as_doc(), None, &mut session)
            .await?;

        let filter = doc! {
            "question_id": question.id,
        };
        choices
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        votes
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }
    info!(
        "{} deleted question {question_id}: {}",
        staff.0.username, question.text
    );

    Ok(())
}

#[delete("/admin/choices/<choice_id>")]
async fn delete_choice(
    _staff: StaffUser,
    choice_id: Id,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    let choice = choices
        .find_one(choice_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Choice {choice_id}")))?;

    // Atomically delete the choice and the votes for it.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        choices
            .delete_one_with_session(choice.id.as_doc(), None, &mut session)
            .await?;
        votes
            .delete_many_with_session(doc! { "choice_id": choice.id }, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }

    Ok(())
}

#[delete("/admin/users/<username>")]
async fn delete_user(
    staff: StaffUser,
    username: &str,
    users: Coll<User>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    let user = User::by_username(&users, username)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {username}")))?;

    // Prevent deleting the last staff member.
    if user.is_staff {
        let count = users.count_documents(doc! { "is_staff": true }, None).await?;
        if count == 1 {
            return Err(Error::Status(
                Status::UnprocessableEntity,
                "Cannot delete last staff user!".to_string(),
            ));
        }
    }

    // Atomically delete the user and their votes.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        users
            .delete_one_with_session(user.id.as_doc(), None, &mut session)
            .await?;
        votes
            .delete_many_with_session(doc! { "voter_id": user.id }, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }
    info!("{} deleted user {}", staff.0.username, user.username);

    Ok(())
}
