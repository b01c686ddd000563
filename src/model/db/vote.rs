use log::debug;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::choice::Choice,
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// A voter's current selection for one question.
///
/// `question_id` duplicates the choice's question so that the
/// (voter, question) pair can be matched, and uniquely indexed, directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub question_id: Id,
    pub choice_id: Id,
    pub voter_id: Id,
}

impl Vote {
    /// Point `voter`'s vote for the choice's question at `choice`, creating the
    /// vote if this is their first one.
    ///
    /// This is a single atomic upsert. Two concurrent first votes can both miss
    /// and race to insert; the unique index rejects the loser, whose retry then
    /// updates the winner's row.
    pub async fn record(votes: &Coll<Vote>, voter: Id, choice: &Choice) -> Result<Vote> {
        let filter = doc! {
            "voter_id": voter,
            "question_id": choice.question_id,
        };
        let update = doc! {
            "$set": { "choice_id": choice.id },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let mut result = votes
            .find_one_and_update(filter.clone(), update.clone(), options.clone())
            .await;
        if is_duplicate_key_error(result.as_ref()) {
            debug!("Concurrent first vote by {voter}, retrying as an update");
            result = votes.find_one_and_update(filter, update, options).await;
        }

        result?.ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                format!("Upserted vote by {voter} was not returned"),
            )
        })
    }

    /// The voter's current vote for a question, if any.
    pub async fn of_voter(votes: &Coll<Vote>, voter: Id, question_id: Id) -> Result<Option<Vote>> {
        let filter = doc! {
            "voter_id": voter,
            "question_id": question_id,
        };
        Ok(votes.find_one(filter, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::futures::future::join;

    use super::*;
    use crate::model::db::{
        choice::{examples::insert as insert_choice, NewChoice},
        question::{examples::insert as insert_question, NewQuestion},
    };

    /// An open question with two choices.
    async fn two_choices(db: &Database) -> (Choice, Choice) {
        let question = insert_question(
            &Coll::<NewQuestion>::from_db(db),
            &NewQuestion::open_example(),
        )
        .await;
        let new_choices = Coll::<NewChoice>::from_db(db);
        let first = insert_choice(&new_choices, question, "Choice 1").await;
        let second = insert_choice(&new_choices, question, "Choice 2").await;
        (first, second)
    }

    #[backend_test]
    async fn first_vote_creates_row(votes: Coll<Vote>, db: Database) {
        let (first, second) = two_choices(&db).await;
        let voter = Id::new();

        assert_eq!(Vote::of_voter(&votes, voter, first.question_id).await.unwrap(), None);

        let vote = Vote::record(&votes, voter, &first).await.unwrap();
        assert_eq!(vote.choice_id, first.id);
        assert_eq!(vote.question_id, first.question_id);
        assert_eq!(vote.voter_id, voter);

        assert_eq!(first.votes(&votes).await.unwrap(), 1);
        assert_eq!(second.votes(&votes).await.unwrap(), 0);
    }

    #[backend_test]
    async fn same_choice_twice_counts_once(votes: Coll<Vote>, db: Database) {
        let (first, _) = two_choices(&db).await;
        let voter = Id::new();

        let original = Vote::record(&votes, voter, &first).await.unwrap();
        for _ in 0..2 {
            let again = Vote::record(&votes, voter, &first).await.unwrap();
            assert_eq!(again, original);
        }

        assert_eq!(first.votes(&votes).await.unwrap(), 1);
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test]
    async fn revote_moves_vote_in_place(votes: Coll<Vote>, db: Database) {
        let (first, second) = two_choices(&db).await;
        let voter = Id::new();

        let original = Vote::record(&votes, voter, &first).await.unwrap();
        let revised = Vote::record(&votes, voter, &second).await.unwrap();

        assert_eq!(revised.id, original.id);
        assert_eq!(revised.choice_id, second.id);
        assert_eq!(first.votes(&votes).await.unwrap(), 0);
        assert_eq!(second.votes(&votes).await.unwrap(), 1);
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test]
    async fn voters_are_counted_separately(votes: Coll<Vote>, db: Database) {
        let (first, second) = two_choices(&db).await;

        Vote::record(&votes, Id::new(), &first).await.unwrap();
        Vote::record(&votes, Id::new(), &first).await.unwrap();
        Vote::record(&votes, Id::new(), &second).await.unwrap();

        assert_eq!(first.votes(&votes).await.unwrap(), 2);
        assert_eq!(second.votes(&votes).await.unwrap(), 1);
    }

    #[backend_test]
    async fn concurrent_first_votes_leave_one_row(votes: Coll<Vote>, db: Database) {
        let (first, second) = two_choices(&db).await;

        for _ in 0..10 {
            let voter = Id::new();
            let (a, b) = join(
                Vote::record(&votes, voter, &first),
                Vote::record(&votes, voter, &second),
            )
            .await;
            let (a, b) = (a.unwrap(), b.unwrap());
            assert_eq!(a.id, b.id);

            let filter = doc! { "voter_id": voter };
            assert_eq!(votes.count_documents(filter, None).await.unwrap(), 1);
        }
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 10);
    }
}
