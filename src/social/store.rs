//! Relation storage.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{RelationDoc, SOCIAL_COLLECTION};
use crate::social::RelationQuery;
use crate::types::Result;

/// Backing store for social relations.
#[async_trait]
pub trait SocialStore: Send + Sync {
    /// Insert one relation record.
    async fn insert(&self, relation: RelationDoc) -> Result<ObjectId>;

    /// All records matching `query`, unordered.
    async fn find(&self, query: &RelationQuery) -> Result<Vec<RelationDoc>>;

    /// Delete one record matching `query`; returns how many were removed.
    async fn delete(&self, query: &RelationQuery) -> Result<u64>;
}

/// MongoDB-backed relation store
#[derive(Clone)]
pub struct MongoSocialStore {
    relations: MongoCollection<RelationDoc>,
}

impl MongoSocialStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            relations: client.collection(SOCIAL_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl SocialStore for MongoSocialStore {
    async fn insert(&self, relation: RelationDoc) -> Result<ObjectId> {
        self.relations.insert_one(relation).await
    }

    async fn find(&self, query: &RelationQuery) -> Result<Vec<RelationDoc>> {
        self.relations
            .find_many(query.to_document(), Some(doc! { "_id": 1 }), None)
            .await
    }

    async fn delete(&self, query: &RelationQuery) -> Result<u64> {
        self.relations.delete_one(query.to_document()).await
    }
}
