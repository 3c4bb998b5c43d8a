use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;

use super::{
    Collection, DeleteOutcome, DocumentStore, Filter, InsertOutcome, StoreError, StoreResult,
    Update, UpdateOutcome,
};

/// An in-process [`DocumentStore`] that keeps each collection as a vector in
/// insertion order.
///
/// Every operation takes the lock once, so single operations are atomic just
/// like on the real server; sequences of operations are not.
#[derive(Default, Clone)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Collection, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub async fn len(&self, collection: Collection) -> usize {
        let collections = self.collections.read().await;
        collections.get(&collection).map_or(0, Vec::len)
    }

    pub async fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection).await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|documents| documents.iter().find(|document| matches(&filter, document)))
            .cloned())
    }

    async fn find_many(&self, collection: Collection, filter: Filter) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(&filter, document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> StoreResult<InsertOutcome> {
        let inserted_id = match document.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => return Err(StoreError::UnexpectedId(other.clone())),
            None => {
                let id = ObjectId::new();
                let mut with_id = Document::new();
                with_id.insert("_id", id);
                for (key, value) in document {
                    with_id.insert(key, value);
                }
                document = with_id;
                id
            }
        };

        let mut collections = self.collections.write().await;
        collections.entry(collection).or_default().push(document);
        Ok(InsertOutcome { inserted_id })
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        update: Update,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection).or_default();

        if let Some(existing) = documents
            .iter_mut()
            .find(|document| matches(&filter, document))
        {
            let mut candidate = existing.clone();
            apply_update(&mut candidate, &update)?;
            let modified = candidate != *existing;
            if modified {
                *existing = candidate;
            }
            return Ok(UpdateOutcome {
                matched_count: 1,
                modified_count: u64::from(modified),
                upserted_id: None,
            });
        }

        if !upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut seeded = Document::new();
        seed_from_filter(&filter, &mut seeded);
        apply_update(&mut seeded, &update)?;
        let upserted_id = match seeded.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            _ => {
                let id = ObjectId::new();
                let mut with_id = Document::new();
                with_id.insert("_id", id);
                for (key, value) in seeded {
                    with_id.insert(key, value);
                }
                seeded = with_id;
                id
            }
        };
        documents.push(seeded);

        Ok(UpdateOutcome {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(upserted_id),
        })
    }

    async fn delete_one(&self, collection: Collection, filter: Filter) -> StoreResult<DeleteOutcome> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(DeleteOutcome::default());
        };

        match documents
            .iter()
            .position(|document| matches(&filter, document))
        {
            Some(index) => {
                documents.remove(index);
                Ok(DeleteOutcome { deleted_count: 1 })
            }
            None => Ok(DeleteOutcome::default()),
        }
    }

    async fn count(&self, collection: Collection, filter: Filter) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        let count = collections.get(&collection).map_or(0, |documents| {
            documents
                .iter()
                .filter(|document| matches(&filter, document))
                .count()
        });
        Ok(count as u64)
    }
}

fn matches(filter: &Filter, document: &Document) -> bool {
    match filter {
        Filter::All => true,
        Filter::Id(id) => matches!(document.get("_id"), Some(Bson::ObjectId(candidate)) if candidate == id),
        Filter::Eq(field, expected) => match document.get(field) {
            Some(actual) => actual == expected,
            None => *expected == Bson::Null,
        },
        Filter::ContainsAny { fields, needle } => {
            let needle = needle.to_lowercase();
            fields.iter().any(|field| match document.get(field) {
                Some(Bson::String(value)) => value.to_lowercase().contains(&needle),
                _ => false,
            })
        }
        Filter::And(clauses) => clauses.iter().all(|clause| matches(clause, document)),
    }
}

// Equality clauses become fields of an upserted document.
fn seed_from_filter(filter: &Filter, document: &mut Document) {
    match filter {
        Filter::Id(id) => {
            document.insert("_id", *id);
        }
        Filter::Eq(field, value) => {
            document.insert(field.clone(), value.clone());
        }
        Filter::And(clauses) => {
            for clause in clauses {
                seed_from_filter(clause, document);
            }
        }
        Filter::All | Filter::ContainsAny { .. } => {}
    }
}

fn apply_update(document: &mut Document, update: &Update) -> StoreResult<()> {
    for (field, value) in &update.set {
        if field == "_id" && document.get("_id").is_some_and(|current| current != value) {
            return Err(StoreError::InvalidUpdate {
                operator: "$set",
                field: field.clone(),
                reason: "_id is immutable".to_string(),
            });
        }
        document.insert(field.clone(), value.clone());
    }

    for field in &update.unset {
        document.remove(field);
    }

    if let Some((field, values)) = &update.push {
        if !values.is_empty() {
            match document.get_mut(field) {
                Some(Bson::Array(items)) => items.extend(values.iter().cloned()),
                Some(other) => {
                    return Err(StoreError::InvalidUpdate {
                        operator: "$push",
                        field: field.clone(),
                        reason: format!("expected an array, found {:?}", other.element_type()),
                    })
                }
                None => {
                    document.insert(field.clone(), Bson::Array(values.clone()));
                }
            }
        }
    }

    if let Some((field, value)) = &update.pull {
        match document.get_mut(field) {
            Some(Bson::Array(items)) => items.retain(|item| item != value),
            Some(other) => {
                return Err(StoreError::InvalidUpdate {
                    operator: "$pull",
                    field: field.clone(),
                    reason: format!("expected an array, found {:?}", other.element_type()),
                })
            }
            None => {}
        }
    }

    Ok(())
}
