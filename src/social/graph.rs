//! Friend / follow graph over a single relation collection.
//!
//! Friendships are undirected and stored once, in whichever direction they
//! were created. Follower lists are the `following` records read backwards.
//! Every list is re-oriented so that `user_id` is the caller and
//! `reference_id` is the other party.

use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use serde::Serialize;
use tracing::{debug, info};

use crate::credentials::NameResolver;
use crate::db::bounded;
use crate::db::schemas::{RelationDoc, RelationKind};
use crate::social::{RelationQuery, SocialStore};
use crate::types::{DuplicateField, GarageError, Result};

/// Relation as seen from one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationView {
    Friend,
    Following,
    Follower,
}

/// Directed pointer from a user to another party
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRef {
    #[serde(serialize_with = "bson::serde_helpers::serialize_object_id_as_hex_string")]
    pub user_id: ObjectId,
    pub user_name: String,
    #[serde(serialize_with = "bson::serde_helpers::serialize_object_id_as_hex_string")]
    pub reference_id: ObjectId,
    pub reference_name: String,
    pub reference_type: String,
    pub relation_type: RelationView,
}

impl UserRef {
    /// View a stored record from `me`'s side.
    pub fn oriented(rel: &RelationDoc, me: ObjectId, view: RelationView) -> Self {
        if rel.user_id == me {
            Self {
                user_id: rel.user_id,
                user_name: rel.user_name.clone(),
                reference_id: rel.ref_id,
                reference_name: rel.ref_name.clone(),
                reference_type: rel.ref_type.clone(),
                relation_type: view,
            }
        } else {
            Self {
                user_id: rel.ref_id,
                user_name: rel.ref_name.clone(),
                reference_id: rel.user_id,
                reference_name: rel.user_name.clone(),
                reference_type: rel.ref_type.clone(),
                relation_type: view,
            }
        }
    }
}

/// Social graph service
pub struct SocialGraph {
    store: Arc<dyn SocialStore>,
    names: Arc<dyn NameResolver>,
    timeout: Duration,
}

impl SocialGraph {
    pub fn new(store: Arc<dyn SocialStore>, names: Arc<dyn NameResolver>, timeout: Duration) -> Self {
        Self {
            store,
            names,
            timeout,
        }
    }

    /// Friends of `user`, ordered by the friend's name
    pub async fn friends(&self, user: ObjectId) -> Result<Vec<UserRef>> {
        self.list(RelationQuery::friends_of(user), user, RelationView::Friend)
            .await
    }

    /// Users `user` follows, ordered by name
    pub async fn following(&self, user: ObjectId) -> Result<Vec<UserRef>> {
        self.list(RelationQuery::following_of(user), user, RelationView::Following)
            .await
    }

    /// Users following `user`, ordered by name
    pub async fn followers(&self, user: ObjectId) -> Result<Vec<UserRef>> {
        self.list(RelationQuery::followers_of(user), user, RelationView::Follower)
            .await
    }

    async fn list(
        &self,
        query: RelationQuery,
        me: ObjectId,
        view: RelationView,
    ) -> Result<Vec<UserRef>> {
        let records = bounded(self.timeout, "social.find", self.store.find(&query)).await?;

        let mut refs: Vec<UserRef> = records
            .iter()
            .map(|rel| UserRef::oriented(rel, me, view))
            .collect();
        refs.sort_by(|a, b| {
            a.reference_name
                .to_lowercase()
                .cmp(&b.reference_name.to_lowercase())
        });
        Ok(refs)
    }

    /// Make `user` and `friend` friends.
    pub async fn add_friend(&self, user: ObjectId, friend: ObjectId) -> Result<UserRef> {
        self.relate(
            RelationKind::Friend,
            RelationQuery::friendship(user, friend),
            user,
            friend,
        )
        .await
    }

    /// Make `user` follow `followee`.
    pub async fn follow(&self, user: ObjectId, followee: ObjectId) -> Result<UserRef> {
        self.relate(
            RelationKind::Following,
            RelationQuery::follow(user, followee),
            user,
            followee,
        )
        .await
    }

    async fn relate(
        &self,
        kind: RelationKind,
        existing: RelationQuery,
        user: ObjectId,
        other: ObjectId,
    ) -> Result<UserRef> {
        if user == other {
            return Err(GarageError::SelfReference);
        }

        let found = bounded(self.timeout, "social.find", self.store.find(&existing)).await?;
        if !found.is_empty() {
            debug!(%user, %other, %kind, "Relation already exists");
            return Err(GarageError::DuplicateKey(DuplicateField::Relation));
        }

        let user_name = bounded(self.timeout, "users.name", self.names.display_name(user)).await?;
        let other_name =
            bounded(self.timeout, "users.name", self.names.display_name(other)).await?;

        let mut rel = RelationDoc::new(kind, user, user_name, other, other_name);
        let id = bounded(self.timeout, "social.insert", self.store.insert(rel.clone())).await?;
        rel._id = Some(id);

        info!(%user, %other, %kind, "Relation added");

        let view = match kind {
            RelationKind::Friend => RelationView::Friend,
            RelationKind::Following => RelationView::Following,
        };
        Ok(UserRef::oriented(&rel, user, view))
    }

    /// End the friendship between `user` and `friend`; either side may do this.
    pub async fn remove_friend(&self, user: ObjectId, friend: ObjectId) -> Result<()> {
        self.unrelate(RelationQuery::friendship(user, friend), user, friend)
            .await
    }

    /// Stop `user` following `followee`.
    pub async fn unfollow(&self, user: ObjectId, followee: ObjectId) -> Result<()> {
        self.unrelate(RelationQuery::follow(user, followee), user, followee)
            .await
    }

    async fn unrelate(&self, query: RelationQuery, user: ObjectId, other: ObjectId) -> Result<()> {
        if user == other {
            return Err(GarageError::SelfReference);
        }

        let removed = bounded(self.timeout, "social.delete", self.store.delete(&query)).await?;
        if removed == 0 {
            return Err(GarageError::NoData(format!(
                "no {} relation between {} and {}",
                query.kind, user, other
            )));
        }

        info!(%user, %other, kind = %query.kind, "Relation removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemorySocialStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticNames(HashMap<ObjectId, String>);

    #[async_trait]
    impl NameResolver for StaticNames {
        async fn display_name(&self, user_id: ObjectId) -> Result<String> {
            self.0
                .get(&user_id)
                .cloned()
                .ok_or_else(|| GarageError::NoData(user_id.to_hex()))
        }
    }

    fn graph_with(names: &[(ObjectId, &str)]) -> SocialGraph {
        let names = names
            .iter()
            .map(|(id, name)| (*id, name.to_string()))
            .collect();
        SocialGraph::new(
            Arc::new(MemorySocialStore::new()),
            Arc::new(StaticNames(names)),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_friendship_is_symmetric_and_stored_once() {
        let (a, b, c) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let graph = graph_with(&[(a, "alice"), (b, "bob"), (c, "carol")]);

        graph.add_friend(a, b).await.unwrap();

        let of_a = graph.friends(a).await.unwrap();
        let of_b = graph.friends(b).await.unwrap();
        assert_eq!(of_a.len(), 1);
        assert_eq!(of_b.len(), 1);
        assert_eq!(of_a[0].user_id, a);
        assert_eq!(of_a[0].reference_id, b);
        assert_eq!(of_a[0].reference_name, "bob");
        assert_eq!(of_b[0].user_id, b);
        assert_eq!(of_b[0].reference_id, a);
        assert_eq!(of_b[0].reference_name, "alice");
        assert!(graph.friends(c).await.unwrap().is_empty());

        // the reverse direction is the same pair
        let err = graph.add_friend(b, a).await.unwrap_err();
        assert!(matches!(err, GarageError::DuplicateKey(DuplicateField::Relation)));
    }

    #[tokio::test]
    async fn test_friends_sorted_by_name() {
        let (me, x, y, z) = (ObjectId::new(), ObjectId::new(), ObjectId::new(), ObjectId::new());
        let graph = graph_with(&[(me, "me"), (x, "Zed"), (y, "amy"), (z, "Bert")]);

        graph.add_friend(me, x).await.unwrap();
        graph.add_friend(y, me).await.unwrap();
        graph.add_friend(me, z).await.unwrap();

        let names: Vec<_> = graph
            .friends(me)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.reference_name)
            .collect();
        assert_eq!(names, vec!["amy", "Bert", "Zed"]);
    }

    #[tokio::test]
    async fn test_follow_and_followers() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let graph = graph_with(&[(a, "alice"), (b, "bob")]);

        graph.follow(a, b).await.unwrap();

        let following = graph.following(a).await.unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].reference_id, b);
        assert_eq!(following[0].relation_type, RelationView::Following);

        let followers = graph.followers(b).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].user_id, b);
        assert_eq!(followers[0].reference_id, a);
        assert_eq!(followers[0].relation_type, RelationView::Follower);

        assert!(graph.following(b).await.unwrap().is_empty());
        assert!(graph.followers(a).await.unwrap().is_empty());

        // b may still follow a back
        graph.follow(b, a).await.unwrap();
        assert_eq!(graph.followers(a).await.unwrap().len(), 1);

        graph.unfollow(a, b).await.unwrap();
        assert!(graph.following(a).await.unwrap().is_empty());
        assert!(matches!(
            graph.unfollow(a, b).await.unwrap_err(),
            GarageError::NoData(_)
        ));
    }

    #[tokio::test]
    async fn test_self_reference_rejected() {
        let a = ObjectId::new();
        let graph = graph_with(&[(a, "alice")]);

        assert!(matches!(
            graph.add_friend(a, a).await.unwrap_err(),
            GarageError::SelfReference
        ));
        assert!(matches!(
            graph.follow(a, a).await.unwrap_err(),
            GarageError::SelfReference
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_cannot_be_related() {
        let a = ObjectId::new();
        let graph = graph_with(&[(a, "alice")]);

        let err = graph.add_friend(a, ObjectId::new()).await.unwrap_err();
        assert!(matches!(err, GarageError::NoData(_)));
        assert!(graph.friends(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_either_party_removes_friendship() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let graph = graph_with(&[(a, "alice"), (b, "bob")]);

        graph.add_friend(a, b).await.unwrap();
        graph.remove_friend(b, a).await.unwrap();

        assert!(graph.friends(a).await.unwrap().is_empty());
        assert!(graph.friends(b).await.unwrap().is_empty());
        assert!(matches!(
            graph.remove_friend(a, b).await.unwrap_err(),
            GarageError::NoData(_)
        ));
    }
}
