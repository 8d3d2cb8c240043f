//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, UpdateModifications},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::types::{DuplicateField, GarageError};

/// MongoDB error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;

    /// Map a unique-index violation message to the field it guards
    fn duplicate_field(_message: &str) -> Option<DuplicateField> {
        None
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, GarageError> {
        info!("Connecting to MongoDB at {}", uri);

        // fail fast on an unreachable server instead of hanging startup
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| GarageError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| GarageError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection with its indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, GarageError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, GarageError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), GarageError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| GarageError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document; unique index violations surface as `DuplicateKey`
    pub async fn insert_one(&self, item: T) -> Result<ObjectId, GarageError> {
        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| map_write_error::<T>(e, "Insert failed"))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| GarageError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, GarageError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| GarageError::Database(format!("Find failed: {}", e)))
    }

    /// Find one document and decode only the projected fields into `P`
    pub async fn find_one_projected<P>(
        &self,
        filter: Document,
        projection: Document,
    ) -> Result<Option<P>, GarageError>
    where
        P: DeserializeOwned + Unpin + Send + Sync,
    {
        self.inner
            .clone_with_type::<P>()
            .find_one(filter)
            .projection(projection)
            .await
            .map_err(|e| GarageError::Database(format!("Find failed: {}", e)))
    }

    /// Find documents by filter with sort and limit
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<T>, GarageError> {
        let mut find = self.inner.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        let cursor = find
            .await
            .map_err(|e| GarageError::Database(format!("Find failed: {}", e)))?;

        // a document that fails to decode fails the whole read
        cursor
            .try_collect()
            .await
            .map_err(|e| GarageError::Database(format!("Cursor read failed: {}", e)))
    }

    /// Update one document, returning how many documents matched the filter
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<u64, GarageError> {
        let result = self
            .inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| map_write_error::<T>(e, "Update failed"))?;

        Ok(result.matched_count)
    }

    /// Delete one document, returning how many were removed
    pub async fn delete_one(&self, filter: Document) -> Result<u64, GarageError> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| GarageError::Database(format!("Delete failed: {}", e)))?;

        Ok(result.deleted_count)
    }
}

fn map_write_error<T: IntoIndexes>(err: mongodb::error::Error, context: &str) -> GarageError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY_CODE {
            if let Some(field) = T::duplicate_field(&write_error.message) {
                return GarageError::DuplicateKey(field);
            }
        }
    }
    GarageError::Database(format!("{}: {}", context, err))
}
