use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::error::{PollError, Result};
use crate::model::{
    db::vote::Vote,
    mongodb::{Coll, Id},
};

/// A choice without an ID, ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChoice {
    pub question_id: Id,
    pub text: String,
}

/// A choice from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(rename = "_id")]
    pub id: Id,
    pub question_id: Id,
    pub text: String,
}

impl Choice {
    /// Find a choice of the given question.
    ///
    /// A choice belonging to any other question is reported as
    /// [`PollError::InvalidChoice`], exactly like a missing one.
    pub async fn of_question(choices: &Coll<Choice>, question_id: Id, id: Id) -> Result<Choice> {
        let filter = doc! {
            "_id": id,
            "question_id": question_id,
        };
        choices
            .find_one(filter, None)
            .await?
            .ok_or_else(|| PollError::InvalidChoice.into())
    }

    /// Number of votes currently pointing at this choice.
    pub async fn votes(&self, votes: &Coll<Vote>) -> Result<u64> {
        let count = votes
            .count_documents(doc! { "choice_id": self.id }, None)
            .await?;
        Ok(count)
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    /// Insert a choice for the given question and return it.
    pub async fn insert(choices: &Coll<NewChoice>, question_id: Id, text: &str) -> Choice {
        let choice = NewChoice {
            question_id,
            text: text.to_string(),
        };
        let id: Id = choices
            .insert_one(&choice, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        Choice {
            id,
            question_id,
            text: choice.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;

    use super::*;
    use crate::model::db::question::{examples::insert as insert_question, NewQuestion};

    #[backend_test]
    async fn choice_must_belong_to_question(db: Database) {
        let new_questions = Coll::<NewQuestion>::from_db(&db);
        let question = insert_question(&new_questions, &NewQuestion::open_example()).await;
        let other = insert_question(&new_questions, &NewQuestion::open_example()).await;

        let new_choices = Coll::<NewChoice>::from_db(&db);
        let own = examples::insert(&new_choices, question, "Not much").await;
        let foreign = examples::insert(&new_choices, other, "The sky").await;

        let choices = Coll::<Choice>::from_db(&db);
        assert_eq!(
            Choice::of_question(&choices, question, own.id).await.unwrap(),
            own
        );
        assert!(matches!(
            Choice::of_question(&choices, question, foreign.id).await,
            Err(crate::error::Error::Poll(PollError::InvalidChoice))
        ));
        assert!(matches!(
            Choice::of_question(&choices, question, Id::new()).await,
            Err(crate::error::Error::Poll(PollError::InvalidChoice))
        ));
    }
}
