use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{poll::ChoiceResult, ApiId},
    db::question::{NewQuestion, Question, MAX_TEXT_LENGTH},
    eligibility::PublishWindow,
};

/// A question to create, along with its initial choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub choices: Vec<ChoiceSpec>,
}

/// A choice to add to a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceSpec {
    pub choice_text: String,
}

impl PublishWindow for QuestionSpec {
    fn pub_date(&self) -> DateTime<Utc> {
        self.pub_date
    }

    fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }
}

/// Check a question or choice text, naming the field in the complaint.
pub fn check_text(field: &str, text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else if text.chars().count() > MAX_TEXT_LENGTH {
        Err(format!("{field} must be at most {MAX_TEXT_LENGTH} characters"))
    } else {
        Ok(())
    }
}

impl ChoiceSpec {
    pub fn check(&self) -> Result<(), String> {
        check_text("choice_text", &self.choice_text)
    }
}

impl QuestionSpec {
    /// Check this describes a question that can be stored.
    pub fn check(&self) -> Result<(), String> {
        check_text("question_text", &self.question_text)?;
        if !self.has_valid_window() {
            return Err("end_date must not be before pub_date".to_string());
        }
        self.choices.iter().try_for_each(ChoiceSpec::check)
    }

    /// Split into the question itself and its choice texts.
    pub fn into_parts(self) -> (NewQuestion, Vec<String>) {
        let question = NewQuestion {
            text: self.question_text,
            pub_date: self.pub_date,
            end_date: self.end_date,
        };
        let choices = self.choices.into_iter().map(|c| c.choice_text).collect();
        (question, choices)
    }
}

/// A question as staff see it, whatever its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminQuestion {
    pub id: ApiId,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_published: bool,
    pub was_published_recently: bool,
    pub can_vote: bool,
    pub choices: Vec<ChoiceResult>,
}

impl AdminQuestion {
    pub fn new(question: Question, choices: Vec<ChoiceResult>, now: DateTime<Utc>) -> Self {
        Self {
            is_published: question.is_published(now),
            was_published_recently: question.was_published_recently(now),
            can_vote: question.can_vote(now),
            id: question.id.into(),
            question_text: question.text,
            pub_date: question.pub_date,
            end_date: question.end_date,
            choices,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use chrono::Duration;

    use super::*;

    impl QuestionSpec {
        pub fn example() -> Self {
            let pub_date = Utc::now() - Duration::hours(1);
            Self {
                question_text: "What's up?".to_string(),
                pub_date,
                end_date: pub_date + Duration::days(7),
                choices: vec![
                    ChoiceSpec {
                        choice_text: "Not much".to_string(),
                    },
                    ChoiceSpec {
                        choice_text: "The sky".to_string(),
                    },
                ],
            }
        }
    }
}
