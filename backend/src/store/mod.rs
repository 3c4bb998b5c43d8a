//! Collection-scoped document persistence.
//!
//! Handlers talk to a [`DocumentStore`] through the small [`Filter`] and
//! [`Update`] vocabularies below, so the same request logic runs against
//! MongoDB in production and against [`MemoryStore`] in tests.

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use thiserror::Error;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Packages,
    Bookings,
    Stories,
    GuideApplications,
    TourGuides,
    Payments,
}

impl Collection {
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Packages => "packages",
            Collection::Bookings => "bookings",
            Collection::Stories => "stories",
            Collection::GuideApplications => "guideApplications",
            Collection::TourGuides => "tourGuides",
            Collection::Payments => "payments",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("store returned a non-ObjectId identifier: {0}")]
    UnexpectedId(Bson),
    #[error("cannot apply {operator} to field `{field}`: {reason}")]
    InvalidUpdate {
        operator: &'static str,
        field: String,
        reason: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Selects documents within one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(ObjectId),
    Eq(String, Bson),
    /// Case-insensitive literal substring match against any of `fields`.
    ContainsAny {
        fields: Vec<String>,
        needle: String,
    },
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn contains_any(fields: &[&str], needle: impl Into<String>) -> Self {
        Filter::ContainsAny {
            fields: fields.iter().map(|field| field.to_string()).collect(),
            needle: needle.into(),
        }
    }

    /// Combines clauses, collapsing trivial cases.
    pub fn all_of(mut clauses: Vec<Filter>) -> Self {
        clauses.retain(|clause| *clause != Filter::All);
        match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        }
    }
}

/// A merge-style modification applied to at most one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Document,
    pub unset: Vec<String>,
    pub push: Option<(String, Vec<Bson>)>,
    pub pull: Option<(String, Bson)>,
}

impl Update {
    pub fn set(fields: Document) -> Self {
        Self {
            set: fields,
            ..Self::default()
        }
    }

    pub fn unset(field: impl Into<String>) -> Self {
        Self {
            unset: vec![field.into()],
            ..Self::default()
        }
    }

    pub fn pull(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            pull: Some((field.into(), value.into())),
            ..Self::default()
        }
    }

    pub fn with_push_each(mut self, field: impl Into<String>, values: Vec<Bson>) -> Self {
        self.push = Some((field.into(), values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.unset.is_empty()
            && self.push.as_ref().map_or(true, |(_, values)| values.is_empty())
            && self.pull.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted_id: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn find_one(&self, collection: Collection, filter: Filter)
        -> StoreResult<Option<Document>>;

    /// Returns matches in stored order.
    async fn find_many(&self, collection: Collection, filter: Filter) -> StoreResult<Vec<Document>>;

    /// Assigns a fresh `_id` when the document carries none.
    async fn insert_one(&self, collection: Collection, document: Document)
        -> StoreResult<InsertOutcome>;

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        update: Update,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome>;

    async fn delete_one(&self, collection: Collection, filter: Filter) -> StoreResult<DeleteOutcome>;

    async fn count(&self, collection: Collection, filter: Filter) -> StoreResult<u64>;

    /// Releases the underlying connection. Called once at process exit.
    async fn shutdown(&self) {}
}
