//! User profile lookups.
//!
//! Profiles live in the `users` collection owned by the identity system.
//! The job board only reads them, to resolve poster and worker display
//! data, and tolerates ids with no profile document.

use std::collections::{HashMap, HashSet};

use jboard_models::{Role, UserProfile};
use tracing::debug;

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{Document, DocumentMask, FromFirestoreValue};

const USERS_COLLECTION: &str = "users";

/// batchGet accepts at most this many document names per call.
const BATCH_GET_LIMIT: usize = 100;

#[derive(Clone)]
pub struct UserRepository {
    client: FirestoreClient,
}

impl UserRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Resolve display names for a set of user ids. Ids with no profile
    /// are absent from the result.
    pub async fn resolve_names(
        &self,
        user_ids: &[String],
    ) -> FirestoreResult<HashMap<String, UserProfile>> {
        self.batch_resolve(user_ids, vec!["name".to_string()]).await
    }

    /// Resolve contact profiles (name, email, category) for a set of
    /// user ids.
    pub async fn resolve_contacts(
        &self,
        user_ids: &[String],
    ) -> FirestoreResult<HashMap<String, UserProfile>> {
        self.batch_resolve(
            user_ids,
            vec![
                "name".to_string(),
                "email".to_string(),
                "category".to_string(),
            ],
        )
        .await
    }

    async fn batch_resolve(
        &self,
        user_ids: &[String],
        field_paths: Vec<String>,
    ) -> FirestoreResult<HashMap<String, UserProfile>> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = user_ids
            .iter()
            .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
            .collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let names: Vec<String> = unique
            .iter()
            .map(|id| self.client.full_document_name(USERS_COLLECTION, id))
            .collect();

        let mut profiles = HashMap::with_capacity(unique.len());
        for chunk in names.chunks(BATCH_GET_LIMIT) {
            let mask = DocumentMask {
                field_paths: field_paths.clone(),
            };
            let docs = self
                .client
                .batch_get_documents(chunk.to_vec(), Some(mask))
                .await?;
            for doc in &docs {
                if let Some(profile) = document_to_profile(doc) {
                    profiles.insert(profile.user_id.clone(), profile);
                }
            }
        }

        debug!(
            requested = unique.len(),
            resolved = profiles.len(),
            "Resolved user profiles"
        );
        Ok(profiles)
    }
}

fn document_to_profile(doc: &Document) -> Option<UserProfile> {
    let user_id = doc.id()?.to_string();
    let fields = doc.fields.as_ref();
    let get_string = |key: &str| {
        fields
            .and_then(|f| f.get(key))
            .and_then(|v| String::from_firestore_value(v))
    };

    Some(UserProfile {
        user_id,
        name: get_string("name"),
        email: get_string("email"),
        category: get_string("category"),
        role: get_string("role").and_then(|s| Role::from_str(&s)),
    })
}
