//! Test-collection domain types and operations.
//!
//! Wire types mirror the server's JSON shapes; collection endpoints wrap
//! their payloads in a `{message, data}` envelope while auth endpoints
//! return bare objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::UserProfile;

pub mod api;
pub mod directory;
pub mod status;

/// Publication status of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Draft,
    Published,
    Archived,
}

impl CollectionStatus {
    /// Wire/display form of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionStatus::Draft => "draft",
            CollectionStatus::Published => "published",
            CollectionStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Question form, selecting which answer fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Mcq,
    SingleChoice,
    ShortAnswer,
}

/// One answer option for choice questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

/// One quiz item belonging to a collection.
///
/// `correct_input_answer` is meaningful only for short-answer questions,
/// `options` only for mcq/singlechoice; the other is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub has_katex: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_input_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuestionOption>>,
}

fn default_weight() -> f64 {
    1.0
}

/// A titled grouping of quiz questions with a publication status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: CollectionStatus,
    pub created_by: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub question_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
}

/// Payload for creating a collection.
#[derive(Debug, Clone, Serialize)]
pub struct NewCollection {
    pub title: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CollectionStatus>,
}

/// Partial update payload for a collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CollectionStatus>,
}

/// Payload for creating or updating a question.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionPayload {
    pub question_text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub weight: f64,
    pub has_katex: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_input_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuestionOption>>,
}

impl QuestionPayload {
    /// Builds a recreate payload from an existing question, copying only
    /// the fields meaningful for its kind.
    pub fn copy_of(question: &Question) -> Self {
        let mut payload = Self {
            question_text: question.question_text.clone(),
            kind: question.kind,
            weight: question.weight,
            has_katex: question.has_katex,
            correct_input_answer: None,
            options: None,
        };

        match question.kind {
            QuestionKind::ShortAnswer => {
                payload.correct_input_answer = question.correct_input_answer.clone();
            }
            QuestionKind::Mcq | QuestionKind::SingleChoice => {
                payload.options = question.options.clone();
            }
        }

        payload
    }
}

/// One entry of a question reorder request.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionOrder {
    pub question_id: String,
    pub order: u32,
}

/// `{message, data}` envelope around collection lists.
#[derive(Debug, Deserialize)]
pub(crate) struct ListEnvelope {
    #[serde(default)]
    pub data: Vec<Collection>,
}

/// `{message, data}` envelope around a single collection.
#[derive(Debug, Deserialize)]
pub(crate) struct DetailEnvelope {
    pub data: Collection,
}

/// `{message, data}` envelope around a creation result.
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedEnvelope {
    pub data: CreatedCollection,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedCollection {
    pub collection_id: String,
}
