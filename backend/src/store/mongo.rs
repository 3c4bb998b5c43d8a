use anyhow::{Context, Result};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{options::UpdateOptions, Client, Database};

use super::{
    Collection, DeleteOutcome, DocumentStore, Filter, InsertOutcome, StoreError, StoreResult,
    Update, UpdateOutcome,
};

pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connects and pings the deployment so a bad URI fails at start-up.
    pub async fn connect(uri: &str, database_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("failed to build MongoDB client")?;
        let database = client.database(database_name);
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .context("failed to reach MongoDB deployment")?;
        Ok(Self { client, database })
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.database.collection(collection.name())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> StoreResult<Option<Document>> {
        let found = self
            .collection(collection)
            .find_one(filter_document(&filter), None)
            .await?;
        Ok(found)
    }

    async fn find_many(&self, collection: Collection, filter: Filter) -> StoreResult<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .find(filter_document(&filter), None)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> StoreResult<InsertOutcome> {
        let result = self
            .collection(collection)
            .insert_one(document, None)
            .await?;
        Ok(InsertOutcome {
            inserted_id: object_id(result.inserted_id)?,
        })
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        update: Update,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome> {
        // The server rejects an update document without operators.
        if update.is_empty() {
            let matched = self
                .collection(collection)
                .count_documents(filter_document(&filter), None)
                .await?;
            return Ok(UpdateOutcome {
                matched_count: matched.min(1),
                ..UpdateOutcome::default()
            });
        }

        let options = UpdateOptions::builder().upsert(upsert).build();
        let result = self
            .collection(collection)
            .update_one(filter_document(&filter), update_document(&update), options)
            .await?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id.map(object_id).transpose()?,
        })
    }

    async fn delete_one(&self, collection: Collection, filter: Filter) -> StoreResult<DeleteOutcome> {
        let result = self
            .collection(collection)
            .delete_one(filter_document(&filter), None)
            .await?;
        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }

    async fn count(&self, collection: Collection, filter: Filter) -> StoreResult<u64> {
        let count = self
            .collection(collection)
            .count_documents(filter_document(&filter), None)
            .await?;
        Ok(count)
    }

    async fn shutdown(&self) {
        self.client.clone().shutdown().await;
    }
}

fn object_id(value: Bson) -> StoreResult<ObjectId> {
    match value {
        Bson::ObjectId(id) => Ok(id),
        other => Err(StoreError::UnexpectedId(other)),
    }
}

pub(crate) fn filter_document(filter: &Filter) -> Document {
    match filter {
        Filter::All => Document::new(),
        Filter::Id(id) => doc! { "_id": *id },
        Filter::Eq(field, value) => {
            let mut document = Document::new();
            document.insert(field.clone(), value.clone());
            document
        }
        Filter::ContainsAny { fields, needle } => {
            let pattern = regex::escape(needle);
            let clauses: Vec<Bson> = fields
                .iter()
                .map(|field| {
                    let mut clause = Document::new();
                    clause.insert(
                        field.clone(),
                        doc! { "$regex": pattern.clone(), "$options": "i" },
                    );
                    Bson::Document(clause)
                })
                .collect();
            doc! { "$or": clauses }
        }
        Filter::And(clauses) if clauses.is_empty() => Document::new(),
        Filter::And(clauses) => {
            let clauses: Vec<Bson> = clauses
                .iter()
                .map(|clause| Bson::Document(filter_document(clause)))
                .collect();
            doc! { "$and": clauses }
        }
    }
}

pub(crate) fn update_document(update: &Update) -> Document {
    let mut document = Document::new();
    if !update.set.is_empty() {
        document.insert("$set", update.set.clone());
    }
    if !update.unset.is_empty() {
        let fields: Document = update
            .unset
            .iter()
            .map(|field| (field.clone(), Bson::String(String::new())))
            .collect();
        document.insert("$unset", fields);
    }
    if let Some((field, values)) = &update.push {
        if !values.is_empty() {
            let mut push = Document::new();
            push.insert(field.clone(), doc! { "$each": values.clone() });
            document.insert("$push", push);
        }
    }
    if let Some((field, value)) = &update.pull {
        let mut pull = Document::new();
        pull.insert(field.clone(), value.clone());
        document.insert("$pull", pull);
    }
    document
}
