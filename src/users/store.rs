//! User storage.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{UserDoc, UserIdentity, LAST_SEEN_KEEP, USER_COLLECTION};
use crate::types::Result;
use crate::users::ProfileSettings;

/// Backing store for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; duplicate login name or e-mail is `DuplicateKey`.
    async fn insert(&self, user: UserDoc) -> Result<ObjectId>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>>;

    async fn find_by_login(&self, login_name: &str) -> Result<Option<UserDoc>>;

    /// Only the fields credentials are built from.
    async fn identity(&self, id: ObjectId) -> Result<Option<UserIdentity>>;

    /// Append a login timestamp, keeping the most recent few.
    async fn push_last_seen(&self, id: ObjectId, at: DateTime) -> Result<()>;

    /// Replace the password hash; false when no such user exists.
    async fn set_password(&self, id: ObjectId, password_hash: &str) -> Result<bool>;

    /// Replace the editable profile fields; false when no such user exists.
    async fn update_settings(&self, id: ObjectId, settings: &ProfileSettings) -> Result<bool>;
}

/// MongoDB-backed user store
#[derive(Clone)]
pub struct MongoUserStore {
    users: MongoCollection<UserDoc>,
}

impl MongoUserStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: UserDoc) -> Result<ObjectId> {
        self.users.insert_one(user).await
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "_id": id }).await
    }

    async fn find_by_login(&self, login_name: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "login_name": login_name }).await
    }

    async fn identity(&self, id: ObjectId) -> Result<Option<UserIdentity>> {
        self.users
            .find_one_projected(doc! { "_id": id }, UserIdentity::projection())
            .await
    }

    async fn push_last_seen(&self, id: ObjectId, at: DateTime) -> Result<()> {
        self.users
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$push": {
                        "last_seen": { "$each": [at], "$slice": -LAST_SEEN_KEEP }
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn set_password(&self, id: ObjectId, password_hash: &str) -> Result<bool> {
        let matched = self
            .users
            .update_one(doc! { "_id": id }, doc! { "$set": { "password_hash": password_hash } })
            .await?;
        Ok(matched == 1)
    }

    async fn update_settings(&self, id: ObjectId, settings: &ProfileSettings) -> Result<bool> {
        let matched = self
            .users
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "xbox_tag": settings.xbox_tag.as_str(),
                        "privacy": i32::from(settings.privacy),
                        "language": settings.language.as_str(),
                    }
                },
            )
            .await?;
        Ok(matched == 1)
    }
}
