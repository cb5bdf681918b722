//! Job posting persistence.
//!
//! Each posting is one document in the `jobs` collection with its
//! applications embedded as an array field. A second collection,
//! `application_index`, maps application ids back to their job so a
//! status change does not need to scan every posting. Index entries are
//! committed in the same transaction as the application they point at,
//! so neither can exist without the other.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jboard_models::{Application, ApplicationId, ApplicationStatus, JobId, JobPosting};
use tracing::{debug, info};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    json_to_value, value_to_json, ArrayValue, CollectionSelector, Document, DocumentMask,
    FieldReference, Filter, FromFirestoreValue, MapValue, Order, Precondition, StructuredQuery,
    ToFirestoreValue, Value, Write,
};

const JOBS_COLLECTION: &str = "jobs";
const APPLICATION_INDEX_COLLECTION: &str = "application_index";

/// Job document fields that are not part of the open-ended details map.
const RESERVED_JOB_FIELDS: [&str; 6] = [
    "job_id",
    "title",
    "posted_by",
    "applications",
    "created_at",
    "updated_at",
];

/// A posting together with the stored update time of its document. The
/// update time is the precondition for any follow-up write.
#[derive(Debug, Clone)]
pub struct VersionedJob {
    pub job: JobPosting,
    pub update_time: Option<String>,
}

/// Index entry mapping an application id to the job that embeds it.
#[derive(Debug, Clone)]
pub struct ApplicationIndexEntry {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub worker: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
}

impl JobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Persist a new posting.
    pub async fn create(&self, job: &JobPosting) -> FirestoreResult<()> {
        let fields = job_to_fields(job);
        self.client
            .create_document(JOBS_COLLECTION, job.id.as_str(), fields)
            .await?;
        info!(job_id = %job.id, title = %job.title, "Created job posting");
        Ok(())
    }

    /// Fetch one posting along with its stored version.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<VersionedJob>> {
        let doc = match self
            .client
            .get_document(JOBS_COLLECTION, job_id.as_str())
            .await?
        {
            Some(doc) => doc,
            None => return Ok(None),
        };
        let update_time = doc.update_time.clone();
        let job = document_to_job(&doc)?;
        Ok(Some(VersionedJob { job, update_time }))
    }

    /// All postings, oldest first. Pages through the whole collection;
    /// malformed documents are skipped.
    pub async fn list(&self) -> FirestoreResult<Vec<JobPosting>> {
        let mut jobs: Vec<JobPosting> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_documents(JOBS_COLLECTION, Some(300), page_token.as_deref())
                .await?;
            jobs.extend(
                page.documents
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|doc| document_to_job(doc).ok()),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    /// Postings created by one poster, oldest first.
    ///
    /// Needs the composite index on (posted_by, created_at).
    pub async fn list_by_poster(&self, poster_id: &str) -> FirestoreResult<Vec<JobPosting>> {
        let query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: JOBS_COLLECTION.to_string(),
                all_descendants: None,
            }],
            r#where: Some(Filter::field_equals(
                "posted_by",
                poster_id.to_firestore_value(),
            )),
            order_by: Some(vec![Order {
                field: FieldReference {
                    field_path: "created_at".to_string(),
                },
                direction: "ASCENDING".to_string(),
            }]),
            start_at: None,
            limit: None,
        };

        let docs = self.client.run_query(None, query).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| document_to_job(doc).ok())
            .collect())
    }

    /// Resolve which job holds an application. Returns `None` for ids
    /// with no index entry.
    pub async fn find_application(
        &self,
        application_id: &ApplicationId,
    ) -> FirestoreResult<Option<ApplicationIndexEntry>> {
        let doc = match self
            .client
            .get_document(APPLICATION_INDEX_COLLECTION, application_id.as_str())
            .await?
        {
            Some(doc) => doc,
            None => return Ok(None),
        };
        Ok(Some(document_to_index_entry(&doc)?))
    }

    /// Write the application that `job` now embeds, plus its index entry,
    /// in one transaction. The job write is guarded by the update time
    /// captured when the job was read; a concurrent writer fails the
    /// precondition and nothing is applied, the index entry included.
    pub async fn commit_new_application(
        &self,
        job: &JobPosting,
        application_id: &ApplicationId,
        expected_update_time: Option<&str>,
    ) -> FirestoreResult<()> {
        let application = job.application(application_id).ok_or_else(|| {
            FirestoreError::invalid_response(format!(
                "Application {} is not embedded in job {}",
                application_id, job.id
            ))
        })?;

        let entry = ApplicationIndexEntry {
            application_id: application_id.clone(),
            job_id: job.id.clone(),
            worker: application.worker.clone(),
            created_at: application.applied_at,
        };

        let job_write = Write {
            update: Some(Document {
                name: Some(
                    self.client
                        .full_document_name(JOBS_COLLECTION, job.id.as_str()),
                ),
                fields: Some(application_fields(job)),
                create_time: None,
                update_time: None,
            }),
            delete: None,
            update_mask: Some(DocumentMask {
                field_paths: vec!["applications".to_string(), "updated_at".to_string()],
            }),
            current_document: Some(write_precondition(expected_update_time)),
        };

        let index_write = Write {
            update: Some(Document {
                name: Some(self.client.full_document_name(
                    APPLICATION_INDEX_COLLECTION,
                    entry.application_id.as_str(),
                )),
                fields: Some(index_entry_to_fields(&entry)),
                create_time: None,
                update_time: None,
            }),
            delete: None,
            update_mask: None,
            current_document: Some(Precondition {
                exists: Some(false),
                update_time: None,
            }),
        };

        self.client.commit(vec![job_write, index_write]).await?;
        info!(
            job_id = %job.id,
            application_id = %entry.application_id,
            worker = %entry.worker,
            "Recorded application with index entry"
        );
        Ok(())
    }

    /// Persist a status change on an embedded application, guarded by the
    /// update time captured when the job was read.
    pub async fn commit_status_change(
        &self,
        job: &JobPosting,
        expected_update_time: Option<&str>,
    ) -> FirestoreResult<()> {
        self.client
            .update_document_with_precondition(
                JOBS_COLLECTION,
                job.id.as_str(),
                application_fields(job),
                Some(vec!["applications".to_string(), "updated_at".to_string()]),
                expected_update_time,
            )
            .await?;
        debug!(job_id = %job.id, "Updated embedded application statuses");
        Ok(())
    }
}

fn write_precondition(update_time: Option<&str>) -> Precondition {
    match update_time {
        Some(ts) => Precondition {
            exists: None,
            update_time: Some(ts.to_string()),
        },
        // No known version: at least require the document to exist.
        None => Precondition {
            exists: Some(true),
            update_time: None,
        },
    }
}

/// The fields touched when only the applications array changes.
fn application_fields(job: &JobPosting) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(
        "applications".to_string(),
        applications_to_value(&job.applications),
    );
    fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());
    fields
}

pub(crate) fn job_to_fields(job: &JobPosting) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("job_id".to_string(), job.id.as_str().to_firestore_value());
    fields.insert("title".to_string(), job.title.to_firestore_value());
    fields.insert("posted_by".to_string(), job.posted_by.to_firestore_value());
    fields.insert(
        "applications".to_string(),
        applications_to_value(&job.applications),
    );
    fields.insert("created_at".to_string(), job.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());

    for (key, value) in &job.details {
        if !RESERVED_JOB_FIELDS.contains(&key.as_str()) {
            fields.insert(key.clone(), json_to_value(value));
        }
    }

    fields
}

fn applications_to_value(applications: &[Application]) -> Value {
    Value::ArrayValue(ArrayValue {
        values: Some(applications.iter().map(application_to_value).collect()),
    })
}

fn application_to_value(app: &Application) -> Value {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), app.id.as_str().to_firestore_value());
    fields.insert("worker".to_string(), app.worker.to_firestore_value());
    fields.insert("applied_at".to_string(), app.applied_at.to_firestore_value());
    fields.insert("status".to_string(), app.status.as_str().to_firestore_value());
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

pub(crate) fn document_to_job(doc: &Document) -> FirestoreResult<JobPosting> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("Job document has no fields"))?;

    let get_string = |key: &str| -> Option<String> {
        fields.get(key).and_then(|v| String::from_firestore_value(v))
    };

    let id = get_string("job_id")
        .or_else(|| doc.id().map(str::to_string))
        .ok_or_else(|| FirestoreError::invalid_response("Job document missing job_id"))?;
    let title = get_string("title")
        .ok_or_else(|| FirestoreError::invalid_response(format!("Job {id} missing title")))?;
    // An absent poster id resolves to the unknown-poster sentinel at the
    // view layer.
    let posted_by = get_string("posted_by").unwrap_or_default();

    let applications = fields
        .get("applications")
        .map(parse_applications)
        .unwrap_or_default();
    let created_at = fields
        .get("created_at")
        .and_then(DateTime::from_firestore_value)
        .unwrap_or_else(Utc::now);
    let updated_at = fields
        .get("updated_at")
        .and_then(DateTime::from_firestore_value)
        .unwrap_or_else(Utc::now);

    let mut details = HashMap::new();
    for (key, value) in fields {
        if !RESERVED_JOB_FIELDS.contains(&key.as_str()) {
            details.insert(key.clone(), value_to_json(value));
        }
    }

    Ok(JobPosting {
        id: JobId::from_string(id),
        title,
        posted_by,
        details,
        applications,
        created_at,
        updated_at,
    })
}

fn parse_applications(value: &Value) -> Vec<Application> {
    let Value::ArrayValue(arr) = value else {
        return Vec::new();
    };
    arr.values
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(parse_application)
        .collect()
}

fn parse_application(value: &Value) -> Option<Application> {
    let Value::MapValue(map) = value else {
        return None;
    };
    let fields = map.fields.as_ref()?;
    let get_string = |key: &str| fields.get(key).and_then(|v| String::from_firestore_value(v));

    Some(Application {
        id: ApplicationId::from_string(get_string("id")?),
        worker: get_string("worker")?,
        applied_at: fields
            .get("applied_at")
            .and_then(DateTime::from_firestore_value)
            .unwrap_or_else(Utc::now),
        status: get_string("status")
            .map(|s| ApplicationStatus::from_str(&s))
            .unwrap_or_default(),
    })
}

fn index_entry_to_fields(entry: &ApplicationIndexEntry) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(
        "application_id".to_string(),
        entry.application_id.as_str().to_firestore_value(),
    );
    fields.insert("job_id".to_string(), entry.job_id.as_str().to_firestore_value());
    fields.insert("worker".to_string(), entry.worker.to_firestore_value());
    fields.insert("created_at".to_string(), entry.created_at.to_firestore_value());
    fields
}

fn document_to_index_entry(doc: &Document) -> FirestoreResult<ApplicationIndexEntry> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("Index document has no fields"))?;
    let get_string = |key: &str| fields.get(key).and_then(|v| String::from_firestore_value(v));

    let application_id = get_string("application_id")
        .or_else(|| doc.id().map(str::to_string))
        .ok_or_else(|| FirestoreError::invalid_response("Index entry missing application_id"))?;
    let job_id = get_string("job_id").ok_or_else(|| {
        FirestoreError::invalid_response(format!("Index entry {application_id} missing job_id"))
    })?;

    Ok(ApplicationIndexEntry {
        application_id: ApplicationId::from_string(application_id),
        job_id: JobId::from_string(job_id),
        worker: get_string("worker").unwrap_or_default(),
        created_at: fields
            .get("created_at")
            .and_then(DateTime::from_firestore_value)
            .unwrap_or_else(Utc::now),
    })
}
