//! Collection endpoint operations.
//!
//! Typed calls over the authenticated request helper. Read failures
//! come back as `Load`, write failures as `Mutation`; the empty-title
//! guard on duplication is the one purely client-side rejection.

use std::collections::HashSet;

use serde_json::{Value, json};
use tracing::debug;

use super::{
    Collection, CollectionPatch, CollectionStatus, CreatedEnvelope, DetailEnvelope, ListEnvelope,
    NewCollection, QuestionOrder, QuestionPayload,
};
use crate::api::ApiClient;
use crate::error::ApiError;

/// Base path for the teacher-facing collection endpoints.
pub const COLLECTIONS_PATH: &str = "/exam/teacher/collections";

/// Typed client for the collection endpoints.
#[derive(Clone)]
pub struct CollectionApi {
    client: ApiClient,
}

impl CollectionApi {
    /// Creates the endpoint client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetches the visible collections: the user's own and the public
    /// set, read concurrently and merged by id.
    ///
    /// When an id appears in both sets the owned variant wins. Either
    /// read failing fails the whole load; no partial list is returned.
    pub async fn fetch_collections(&self) -> Result<Vec<Collection>, ApiError> {
        let own_path = format!("{COLLECTIONS_PATH}/");
        let public_path = format!("{COLLECTIONS_PATH}/public");
        let own = self.client.get::<ListEnvelope>(&own_path);
        let public = self.client.get::<ListEnvelope>(&public_path);

        let (own, public) = tokio::try_join!(own, public)
            .map_err(|e| ApiError::load("Failed to load collections", e))?;

        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(own.data.len() + public.data.len());
        for collection in own.data.into_iter().chain(public.data) {
            if seen.insert(collection.id.clone()) {
                merged.push(collection);
            }
        }
        Ok(merged)
    }

    /// Fetches one collection with its embedded questions.
    pub async fn get_collection(&self, id: &str) -> Result<Collection, ApiError> {
        self.client
            .get::<DetailEnvelope>(&format!("{COLLECTIONS_PATH}/{id}"))
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| ApiError::load(format!("Failed to load collection {id}"), e))
    }

    /// Creates a collection and returns its server-assigned id.
    pub async fn create_collection(&self, new: &NewCollection) -> Result<String, ApiError> {
        self.client
            .post::<CreatedEnvelope>(&format!("{COLLECTIONS_PATH}/"), to_body(new))
            .await
            .map(|envelope| envelope.data.collection_id)
            .map_err(|e| ApiError::mutation("Failed to create collection", e))
    }

    /// Applies a partial update to a collection.
    pub async fn update_collection(&self, id: &str, patch: &CollectionPatch) -> Result<(), ApiError> {
        self.client
            .put(&format!("{COLLECTIONS_PATH}/{id}"), to_body(patch))
            .await
            .map_err(|e| ApiError::mutation(format!("Failed to update collection {id}"), e))
    }

    /// Updates only the status field.
    ///
    /// Deliberately a pass-through: the transition graph is enforced by
    /// the affordance layer (`status::allowed_transitions`), not here.
    pub async fn update_status(&self, id: &str, status: CollectionStatus) -> Result<(), ApiError> {
        self.client
            .put(
                &format!("{COLLECTIONS_PATH}/{id}"),
                json!({ "status": status }),
            )
            .await
            .map_err(|e| ApiError::mutation(format!("Failed to update status of {id}"), e))
    }

    /// Deletes a collection.
    pub async fn delete_collection(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{COLLECTIONS_PATH}/{id}"))
            .await
            .map_err(|e| ApiError::mutation(format!("Failed to delete collection {id}"), e))
    }

    /// Duplicates a collection under a new title.
    ///
    /// Reads the source with its questions, creates the copy as a
    /// draft, then recreates each question in order with only its
    /// type-appropriate fields. A mid-sequence failure fails the whole
    /// operation without rolling back what was already created; the
    /// error reports how far the copy got.
    pub async fn duplicate_collection(
        &self,
        id: &str,
        title: &str,
        description: &str,
    ) -> Result<String, ApiError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::validation(
                "A title is required to duplicate a collection",
            ));
        }

        let source = self
            .client
            .get::<DetailEnvelope>(&format!("{COLLECTIONS_PATH}/{id}"))
            .await
            .map_err(|e| ApiError::mutation(format!("Failed to read source collection {id}"), e))?
            .data;

        let new_id = self
            .client
            .post::<CreatedEnvelope>(
                &format!("{COLLECTIONS_PATH}/"),
                json!({
                    "title": title,
                    "description": description.trim(),
                    "status": CollectionStatus::Draft,
                }),
            )
            .await
            .map_err(|e| ApiError::mutation("Failed to create the duplicate collection", e))?
            .data
            .collection_id;
        debug!("duplicated collection {} to {}", id, new_id);

        let questions = source.questions.unwrap_or_default();
        let total = questions.len();
        for (copied, question) in questions.iter().enumerate() {
            let payload = QuestionPayload::copy_of(question);
            self.add_question_raw(&new_id, to_body(&payload))
                .await
                .map_err(|e| {
                    ApiError::mutation(
                        format!(
                            "Duplicate {new_id} was created but only {copied} of {total} \
                             questions were copied"
                        ),
                        e,
                    )
                })?;
        }

        Ok(new_id)
    }

    /// Adds one question to a collection.
    pub async fn add_question(
        &self,
        collection_id: &str,
        question: &QuestionPayload,
    ) -> Result<(), ApiError> {
        self.add_question_raw(collection_id, to_body(question))
            .await
            .map_err(|e| {
                ApiError::mutation(format!("Failed to add question to {collection_id}"), e)
            })
    }

    async fn add_question_raw(&self, collection_id: &str, body: Value) -> Result<(), ApiError> {
        self.client
            .post::<Value>(&format!("{COLLECTIONS_PATH}/{collection_id}/questions"), body)
            .await
            .map(|_| ())
    }

    /// Adds a batch of questions in one request.
    pub async fn add_questions_bulk(
        &self,
        collection_id: &str,
        questions: &[QuestionPayload],
    ) -> Result<(), ApiError> {
        self.client
            .post::<Value>(
                &format!("{COLLECTIONS_PATH}/{collection_id}/questions/bulk"),
                to_body(&questions),
            )
            .await
            .map(|_| ())
            .map_err(|e| {
                ApiError::mutation(format!("Failed to add questions to {collection_id}"), e)
            })
    }

    /// Updates one question.
    pub async fn update_question(
        &self,
        collection_id: &str,
        question_id: &str,
        question: &QuestionPayload,
    ) -> Result<(), ApiError> {
        self.client
            .put(
                &format!("{COLLECTIONS_PATH}/{collection_id}/questions/{question_id}"),
                to_body(question),
            )
            .await
            .map_err(|e| ApiError::mutation(format!("Failed to update question {question_id}"), e))
    }

    /// Deletes one question.
    pub async fn delete_question(
        &self,
        collection_id: &str,
        question_id: &str,
    ) -> Result<(), ApiError> {
        self.client
            .delete(&format!(
                "{COLLECTIONS_PATH}/{collection_id}/questions/{question_id}"
            ))
            .await
            .map_err(|e| ApiError::mutation(format!("Failed to delete question {question_id}"), e))
    }

    /// Persists a new question ordering.
    pub async fn reorder_questions(
        &self,
        collection_id: &str,
        orders: &[QuestionOrder],
    ) -> Result<(), ApiError> {
        self.client
            .post::<Value>(
                &format!("{COLLECTIONS_PATH}/{collection_id}/questions/reorder"),
                json!({ "question_orders": orders }),
            )
            .await
            .map(|_| ())
            .map_err(|e| {
                ApiError::mutation(format!("Failed to reorder questions in {collection_id}"), e)
            })
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("request payloads serialize infallibly")
}
