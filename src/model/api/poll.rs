use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{ApiId, Message},
    db::{choice::Choice, question::Question},
    eligibility::PublishWindow,
    mongodb::Id,
};

/// A question as shown in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: ApiId,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub was_published_recently: bool,
}

impl QuestionSummary {
    pub fn new(question: Question, now: DateTime<Utc>) -> Self {
        Self {
            was_published_recently: question.was_published_recently(now),
            id: question.id.into(),
            question_text: question.text,
            pub_date: question.pub_date,
        }
    }
}

/// The listing of published questions, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPage {
    pub message: Option<Message>,
    pub latest_question_list: Vec<QuestionSummary>,
}

/// A question's own fields, without its choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescription {
    pub id: ApiId,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl From<Question> for QuestionDescription {
    fn from(question: Question) -> Self {
        Self {
            id: question.id.into(),
            question_text: question.text,
            pub_date: question.pub_date,
            end_date: question.end_date,
        }
    }
}

/// A choice on the ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceDescription {
    pub id: ApiId,
    pub choice_text: String,
}

impl From<Choice> for ChoiceDescription {
    fn from(choice: Choice) -> Self {
        Self {
            id: choice.id.into(),
            choice_text: choice.text,
        }
    }
}

/// The ballot for an open question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailPage {
    /// Set when the page is re-rendered after a rejected vote.
    pub error_message: Option<String>,
    pub question: QuestionDescription,
    pub choices: Vec<ChoiceDescription>,
    /// The choice the logged-in user currently has selected, if any.
    pub voted_for: Option<ApiId>,
}

/// A choice with its current tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceResult {
    pub id: ApiId,
    pub choice_text: String,
    pub votes: u64,
}

impl ChoiceResult {
    pub fn new(choice: Choice, votes: u64) -> Self {
        Self {
            id: choice.id.into(),
            choice_text: choice.text,
            votes,
        }
    }
}

/// Tallies for a published question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsPage {
    pub question: QuestionDescription,
    pub choices: Vec<ChoiceResult>,
}

/// A submitted ballot. A missing or malformed choice parses as `None`.
#[derive(Debug, FromForm)]
pub struct VoteForm {
    pub choice: Option<Id>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::form::Form;

    use super::*;

    #[test]
    fn summary_flags_recent_questions() {
        let now = Utc::now();
        let question = Question {
            id: Id::new(),
            text: "What's new?".to_string(),
            pub_date: now - Duration::hours(2),
            end_date: now + Duration::days(1),
        };
        let summary = QuestionSummary::new(question.clone(), now);
        assert_eq!(*summary.id, question.id);
        assert_eq!(summary.question_text, question.text);
        assert!(summary.was_published_recently);

        let old = Question {
            pub_date: now - Duration::days(2),
            ..question
        };
        assert!(!QuestionSummary::new(old, now).was_published_recently);
    }

    #[test]
    fn vote_form_is_lenient() {
        let id = Id::new();
        let form = Form::<VoteForm>::parse(&format!("choice={id}")).unwrap();
        assert_eq!(form.choice, Some(id));

        for body in ["", "choice=", "choice=garbage", "choice=123"] {
            let form = Form::<VoteForm>::parse(body).unwrap();
            assert_eq!(form.choice, None, "{body:?}");
        }
    }
}
