use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{PollError, Result};
use crate::model::{
    db::{choice::Choice, vote::Vote},
    eligibility::PublishWindow,
    mongodb::{Coll, Id},
};

/// Maximum length of question and choice texts.
pub const MAX_TEXT_LENGTH: usize = 200;

/// A question without an ID, ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub pub_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
}

/// A question from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    pub text: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub pub_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
}

impl PublishWindow for NewQuestion {
    fn pub_date(&self) -> DateTime<Utc> {
        self.pub_date
    }

    fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }
}

impl PublishWindow for Question {
    fn pub_date(&self) -> DateTime<Utc> {
        self.pub_date
    }

    fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }
}

impl Question {
    /// Find a question by ID regardless of whether it is published.
    pub async fn find(questions: &Coll<Question>, id: Id) -> Result<Question> {
        questions
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| PollError::NotFound.into())
    }

    /// Find a question by ID, treating unpublished questions as missing.
    pub async fn find_published(
        questions: &Coll<Question>,
        id: Id,
        now: DateTime<Utc>,
    ) -> Result<Question> {
        let filter = doc! {
            "_id": id,
            "pub_date": { "$lte": BsonDateTime::from_chrono(now) },
        };
        questions
            .find_one(filter, None)
            .await?
            .ok_or_else(|| PollError::NotFound.into())
    }

    /// All questions published by `now`, most recent first, optionally capped at `limit`.
    pub async fn list_published(
        questions: &Coll<Question>,
        now: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<Question>> {
        let filter = doc! {
            "pub_date": { "$lte": BsonDateTime::from_chrono(now) },
        };
        let mut options = FindOptions::builder().sort(doc! { "pub_date": -1 }).build();
        options.limit = limit.map(i64::from);

        let published = questions
            .find(filter, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(published)
    }

    /// Every question, published or not, newest first. With a search term, only
    /// questions whose text contains it, ignoring case.
    pub async fn search(questions: &Coll<Question>, term: Option<&str>) -> Result<Vec<Question>> {
        let filter = term.filter(|term| !term.is_empty()).map(|term| {
            doc! {
                "text": { "$regex": escape_regex(term), "$options": "i" },
            }
        });
        let options = FindOptions::builder().sort(doc! { "pub_date": -1 }).build();
        let found = questions
            .find(filter, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(found)
    }

    /// This question's choices, in creation order.
    pub async fn choices(&self, choices: &Coll<Choice>) -> Result<Vec<Choice>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let found = choices
            .find(doc! { "question_id": self.id }, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(found)
    }

    /// This question's choices, each with its current number of votes.
    pub async fn tally(
        &self,
        choices: &Coll<Choice>,
        votes: &Coll<Vote>,
    ) -> Result<Vec<(Choice, u64)>> {
        let mut tally = Vec::new();
        for choice in self.choices(choices).await? {
            let count = choice.votes(votes).await?;
            tally.push((choice, count));
        }
        Ok(tally)
    }
}

/// Match `term` literally inside a `$regex`.
fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}


#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mongodb::Database;

    use super::examples::insert;
    use super::*;

    #[backend_test]
    async fn listing_is_published_only_newest_first(db: Database) {
        let new_questions = Coll::<NewQuestion>::from_db(&db);
        let newer = insert(&new_questions, &NewQuestion::published_in("Past 1", -2, 10)).await;
        let older = insert(&new_questions, &NewQuestion::published_in("Past 2", -3, 10)).await;
        insert(&new_questions, &NewQuestion::future_example()).await;

        let questions = Coll::<Question>::from_db(&db);
        let listed = Question::list_published(&questions, Utc::now(), None)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect::<Vec<_>>();
        assert_eq!(listed, vec![newer, older]);
    }

    #[backend_test]
    async fn listing_is_unbounded_unless_limited(db: Database) {
        let new_questions = Coll::<NewQuestion>::from_db(&db);
        for i in 0..10 {
            insert(
                &new_questions,
                &NewQuestion::published_in(&format!("Question {i}"), -i, 100),
            )
            .await;
        }

        let questions = Coll::<Question>::from_db(&db);
        // Question 0 is published "now", so list a moment later.
        let now = Utc::now() + Duration::seconds(1);
        let all = Question::list_published(&questions, now, None).await.unwrap();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0].text, "Question 0");
        assert_eq!(all[9].text, "Question 9");

        let capped = Question::list_published(&questions, now, Some(5)).await.unwrap();
        assert_eq!(capped.len(), 5);
        assert_eq!(capped[4].text, "Question 4");
    }

    #[backend_test]
    async fn unpublished_question_is_not_found(db: Database) {
        let id = insert(
            &Coll::<NewQuestion>::from_db(&db),
            &NewQuestion::future_example(),
        )
        .await;

        let questions = Coll::<Question>::from_db(&db);
        let result = Question::find_published(&questions, id, Utc::now()).await;
        assert!(matches!(
            result,
            Err(crate::error::Error::Poll(PollError::NotFound))
        ));

        // It still exists for callers that do not filter on publication.
        assert_eq!(Question::find(&questions, id).await.unwrap().id, id);
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(escape_regex("What's up?"), "What's up\\?");
        assert_eq!(escape_regex("a.b*c"), "a\\.b\\*c");
        assert_eq!(escape_regex("plain"), "plain");
    }

    #[backend_test]
    async fn search_ignores_case_and_publication(db: Database) {
        let new_questions = Coll::<NewQuestion>::from_db(&db);
        let future = insert(&new_questions, &NewQuestion::future_example()).await;
        let ended = insert(&new_questions, &NewQuestion::ended_example()).await;
        insert(&new_questions, &NewQuestion::open_example()).await;

        let questions = Coll::<Question>::from_db(&db);
        let all = Question::search(&questions, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, future);

        let found = Question::search(&questions, Some("QUESTION")).await.unwrap();
        let found = found.into_iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(found, vec![future, ended]);

        let literal = Question::search(&questions, Some("up?")).await.unwrap();
        assert_eq!(literal.len(), 1);
        assert!(Question::search(&questions, Some(".*")).await.unwrap().is_empty());
    }
}
