//! Direction-aware relation filters
//!
//! A relation record is stored once. Queries say which endpoint the caller
//! must occupy, and the same shape renders to a MongoDB filter or is matched
//! against an in-memory record.

use bson::{doc, oid::ObjectId, Document};

use crate::db::schemas::{RelationDoc, RelationKind};

/// Which endpoint(s) of a stored relation must match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `user_id` is the given user (forward read)
    From(ObjectId),
    /// `ref_id` is the given user (inverse read)
    To(ObjectId),
    /// Either endpoint is the given user
    Either(ObjectId),
    /// Exactly `user_id = a` and `ref_id = b`
    Pair(ObjectId, ObjectId),
    /// The pair in either stored direction
    EitherPair(ObjectId, ObjectId),
}

/// Filter over the relation collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationQuery {
    pub kind: RelationKind,
    pub endpoint: Endpoint,
}

impl RelationQuery {
    pub fn new(kind: RelationKind, endpoint: Endpoint) -> Self {
        Self { kind, endpoint }
    }

    /// Friend records touching `user`
    pub fn friends_of(user: ObjectId) -> Self {
        Self::new(RelationKind::Friend, Endpoint::Either(user))
    }

    /// Following records created by `user`
    pub fn following_of(user: ObjectId) -> Self {
        Self::new(RelationKind::Following, Endpoint::From(user))
    }

    /// Following records pointing at `user`
    pub fn followers_of(user: ObjectId) -> Self {
        Self::new(RelationKind::Following, Endpoint::To(user))
    }

    /// The friend record between `a` and `b`, whoever created it
    pub fn friendship(a: ObjectId, b: ObjectId) -> Self {
        Self::new(RelationKind::Friend, Endpoint::EitherPair(a, b))
    }

    /// The record of `follower` following `followee`
    pub fn follow(follower: ObjectId, followee: ObjectId) -> Self {
        Self::new(RelationKind::Following, Endpoint::Pair(follower, followee))
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! { "rel_type": self.kind.as_str() };
        match self.endpoint {
            Endpoint::From(user) => {
                filter.insert("user_id", user);
            }
            Endpoint::To(user) => {
                filter.insert("ref_id", user);
            }
            Endpoint::Either(user) => {
                filter.insert("$or", vec![doc! { "user_id": user }, doc! { "ref_id": user }]);
            }
            Endpoint::Pair(a, b) => {
                filter.insert("user_id", a);
                filter.insert("ref_id", b);
            }
            Endpoint::EitherPair(a, b) => {
                filter.insert(
                    "$or",
                    vec![
                        doc! { "user_id": a, "ref_id": b },
                        doc! { "user_id": b, "ref_id": a },
                    ],
                );
            }
        }
        filter
    }

    pub fn matches(&self, rel: &RelationDoc) -> bool {
        if rel.rel_type != self.kind {
            return false;
        }
        match self.endpoint {
            Endpoint::From(user) => rel.user_id == user,
            Endpoint::To(user) => rel.ref_id == user,
            Endpoint::Either(user) => rel.user_id == user || rel.ref_id == user,
            Endpoint::Pair(a, b) => rel.user_id == a && rel.ref_id == b,
            Endpoint::EitherPair(a, b) => {
                (rel.user_id == a && rel.ref_id == b) || (rel.user_id == b && rel.ref_id == a)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(kind: RelationKind, from: ObjectId, to: ObjectId) -> RelationDoc {
        RelationDoc::new(kind, from, "from".into(), to, "to".into())
    }

    #[test]
    fn test_friend_query_matches_both_directions() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let stored = rel(RelationKind::Friend, b, a);

        assert!(RelationQuery::friends_of(a).matches(&stored));
        assert!(RelationQuery::friends_of(b).matches(&stored));
        assert!(RelationQuery::friendship(a, b).matches(&stored));
        assert!(RelationQuery::friendship(b, a).matches(&stored));
        assert!(!RelationQuery::friends_of(ObjectId::new()).matches(&stored));
    }

    #[test]
    fn test_follow_query_is_directed() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let stored = rel(RelationKind::Following, a, b);

        assert!(RelationQuery::following_of(a).matches(&stored));
        assert!(!RelationQuery::following_of(b).matches(&stored));
        assert!(RelationQuery::followers_of(b).matches(&stored));
        assert!(RelationQuery::follow(a, b).matches(&stored));
        assert!(!RelationQuery::follow(b, a).matches(&stored));
        // kind is part of every query
        assert!(!RelationQuery::friendship(a, b).matches(&stored));
    }

    #[test]
    fn test_to_document_shapes() {
        let a = ObjectId::new();
        let b = ObjectId::new();

        let filter = RelationQuery::followers_of(a).to_document();
        assert_eq!(filter, doc! { "rel_type": "following", "ref_id": a });

        let filter = RelationQuery::friendship(a, b).to_document();
        assert_eq!(filter.get_str("rel_type").unwrap(), "friend");
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);
    }
}
