//! Caller-scoped course search filters
//!
//! A filter is built once per search from the query parameters and the
//! caller's credentials. It renders to a MongoDB query and can also be
//! evaluated against a document directly, so both stores apply the same
//! visibility rules.

use std::cmp::Ordering;

use bson::{doc, oid::ObjectId, Bson, Document};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::credentials::Credentials;
use crate::db::schemas::CourseDoc;
use crate::policy::Visibility;
use crate::types::{GarageError, Result};

/// Maximum number of courses returned by a search
pub const PAGE_SIZE: i64 = 20;

/// Sharing code used when the search term is not a number; never stored
pub const NO_SHARING_CODE: i32 = -1;

/// Query-string parameters of a course search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, rename = "type")]
    pub type_code: Option<i32>,
    #[serde(default)]
    pub series: Option<i32>,
    #[serde(default)]
    pub game: Option<i32>,
}

/// Which courses a caller may see in listings
#[derive(Debug, Clone, PartialEq)]
pub enum VisibilityScope {
    /// Admins see everything
    Unrestricted,
    /// Guests see public courses only
    PublicOnly,
    /// Members see public courses, their own, and friends-only courses of friends
    Member {
        user_id: ObjectId,
        friend_ids: Vec<ObjectId>,
    },
}

impl VisibilityScope {
    pub fn for_credentials(credentials: &Credentials) -> Self {
        if credentials.role.is_admin() {
            return Self::Unrestricted;
        }
        match credentials.user_id {
            Some(user_id) if !credentials.role.is_guest() => Self::Member {
                user_id,
                friend_ids: credentials.friend_ids(),
            },
            _ => Self::PublicOnly,
        }
    }

    fn to_document(&self) -> Option<Document> {
        match self {
            Self::Unrestricted => None,
            Self::PublicOnly => Some(doc! { "visibility": i32::from(Visibility::Public) }),
            Self::Member {
                user_id,
                friend_ids,
            } => {
                let friends: Vec<Bson> = friend_ids.iter().map(|id| Bson::ObjectId(*id)).collect();
                Some(doc! {
                    "$or": [
                        { "visibility": i32::from(Visibility::Public) },
                        { "header.created_id": *user_id },
                        {
                            "visibility": i32::from(Visibility::FriendsOnly),
                            "header.created_id": { "$in": friends },
                        },
                    ]
                })
            }
        }
    }

    fn matches(&self, course: &CourseDoc) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::PublicOnly => course.visibility == Visibility::Public,
            Self::Member {
                user_id,
                friend_ids,
            } => {
                course.visibility == Visibility::Public
                    || course.header.created_id == *user_id
                    || (course.visibility == Visibility::FriendsOnly
                        && friend_ids.contains(&course.header.created_id))
            }
        }
    }
}

/// Free-text term: name substring or exact sharing code
#[derive(Debug, Clone)]
pub struct SearchTerm {
    escaped: String,
    pattern: Regex,
    sharing_code: i32,
}

impl SearchTerm {
    /// `None` for an empty or blank term
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let term = raw.trim();
        if term.is_empty() {
            return Ok(None);
        }

        let escaped = regex::escape(term);
        let pattern = RegexBuilder::new(&escaped)
            .case_insensitive(true)
            .build()
            .map_err(|e| GarageError::Validation(format!("search term: {}", e)))?;
        let sharing_code = term.parse::<i32>().unwrap_or(NO_SHARING_CODE);

        Ok(Some(Self {
            escaped,
            pattern,
            sharing_code,
        }))
    }

    pub fn sharing_code(&self) -> i32 {
        self.sharing_code
    }

    fn to_document(&self) -> Document {
        doc! {
            "$or": [
                { "name": { "$regex": self.escaped.as_str(), "$options": "i" } },
                { "sharing_code": self.sharing_code },
            ]
        }
    }

    fn matches(&self, course: &CourseDoc) -> bool {
        self.pattern.is_match(&course.name) || course.sharing_code == self.sharing_code
    }
}

/// Complete search filter for one caller
#[derive(Debug, Clone)]
pub struct CourseFilter {
    pub scope: VisibilityScope,
    pub term: Option<SearchTerm>,
    pub type_code: Option<i32>,
    pub series_code: Option<i32>,
    pub game_code: Option<i32>,
}

impl CourseFilter {
    pub fn new(params: &SearchParams, credentials: &Credentials) -> Result<Self> {
        let term = match params.search.as_deref() {
            Some(raw) => SearchTerm::parse(raw)?,
            None => None,
        };

        Ok(Self {
            scope: VisibilityScope::for_credentials(credentials),
            term,
            type_code: params.type_code,
            series_code: params.series,
            game_code: params.game,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut clauses: Vec<Document> = Vec::new();

        if let Some(scope) = self.scope.to_document() {
            clauses.push(scope);
        }
        if let Some(term) = &self.term {
            clauses.push(term.to_document());
        }
        if let Some(code) = self.type_code {
            clauses.push(doc! { "type_code": code });
        }
        if let Some(code) = self.series_code {
            clauses.push(doc! { "series_code": code });
        }
        if let Some(code) = self.game_code {
            clauses.push(doc! { "game_code": code });
        }

        // scope and term are both $or clauses, so they can't share one document
        match clauses.len() {
            0 => Document::new(),
            1 => clauses.remove(0),
            _ => doc! { "$and": clauses },
        }
    }

    pub fn matches(&self, course: &CourseDoc) -> bool {
        self.scope.matches(course)
            && self.term.as_ref().map_or(true, |t| t.matches(course))
            && self.type_code.map_or(true, |c| course.type_code == c)
            && self.series_code.map_or(true, |c| course.series_code == c)
            && self.game_code.map_or(true, |c| course.game_code == c)
    }

    /// Best rated first, then most recently touched
    pub fn sort_document() -> Document {
        doc! { "header.rating": -1, "header.touched_ts": -1 }
    }

    /// In-memory equivalent of `sort_document`
    pub fn compare(a: &CourseDoc, b: &CourseDoc) -> Ordering {
        b.header
            .rating
            .partial_cmp(&a.header.rating)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.header.touched_ts.cmp(&a.header.touched_ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::schemas::Header;
    use crate::social::{RelationView, UserRef};

    fn course(creator: ObjectId, visibility: Visibility, name: &str, code: i32) -> CourseDoc {
        CourseDoc {
            _id: Some(ObjectId::new()),
            header: Header::new(creator, "creator".into()),
            visibility,
            type_code: 1,
            sharing_code: code,
            name: name.into(),
            series_code: 3,
            game_code: 5,
            car_class_code: 0,
        }
    }

    fn member(user_id: ObjectId, friends: &[ObjectId]) -> Credentials {
        Credentials {
            user_id: Some(user_id),
            login_name: Some("me".into()),
            role: Role::Member,
            language: "en".into(),
            friends: friends
                .iter()
                .map(|f| UserRef {
                    user_id,
                    user_name: "me".into(),
                    reference_id: *f,
                    reference_name: "friend".into(),
                    reference_type: "user".into(),
                    relation_type: RelationView::Friend,
                })
                .collect(),
        }
    }

    fn search(term: &str) -> SearchParams {
        SearchParams {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_scope_by_role() {
        let me = ObjectId::new();
        assert_eq!(
            VisibilityScope::for_credentials(&Credentials::anonymous()),
            VisibilityScope::PublicOnly
        );

        let mut admin = member(me, &[]);
        admin.role = Role::Admin;
        assert_eq!(
            VisibilityScope::for_credentials(&admin),
            VisibilityScope::Unrestricted
        );

        // a logged-in guest is still limited to public courses
        let mut guest = member(me, &[]);
        guest.role = Role::Guest;
        assert_eq!(
            VisibilityScope::for_credentials(&guest),
            VisibilityScope::PublicOnly
        );
    }

    #[test]
    fn test_member_scope_matches() {
        let me = ObjectId::new();
        let friend = ObjectId::new();
        let stranger = ObjectId::new();
        let filter = CourseFilter::new(&SearchParams::default(), &member(me, &[friend])).unwrap();

        assert!(filter.matches(&course(stranger, Visibility::Public, "a", 1)));
        assert!(filter.matches(&course(me, Visibility::Private, "b", 2)));
        assert!(filter.matches(&course(friend, Visibility::FriendsOnly, "c", 3)));
        assert!(!filter.matches(&course(friend, Visibility::Private, "d", 4)));
        assert!(!filter.matches(&course(stranger, Visibility::FriendsOnly, "e", 5)));
    }

    #[test]
    fn test_term_matches_name_or_sharing_code() {
        let creator = ObjectId::new();
        let anon = Credentials::anonymous();

        let by_name = CourseFilter::new(&search("GOLIATH"), &anon).unwrap();
        assert!(by_name.matches(&course(creator, Visibility::Public, "The Goliath", 111)));
        assert!(!by_name.matches(&course(creator, Visibility::Public, "Colossus", 111)));

        let by_code = CourseFilter::new(&search(" 123456789 "), &anon).unwrap();
        assert!(by_code.matches(&course(creator, Visibility::Public, "Anything", 123456789)));
        assert!(!by_code.matches(&course(creator, Visibility::Public, "Anything", 1)));

        let non_numeric = SearchTerm::parse("abc").unwrap().unwrap();
        assert_eq!(non_numeric.sharing_code(), NO_SHARING_CODE);

        assert!(SearchTerm::parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_term_is_literal() {
        let creator = ObjectId::new();
        let filter = CourseFilter::new(&search("a.c"), &Credentials::anonymous()).unwrap();
        assert!(filter.matches(&course(creator, Visibility::Public, "xa.cx", 1)));
        assert!(!filter.matches(&course(creator, Visibility::Public, "abc", 2)));
    }

    #[test]
    fn test_to_document_combines_or_clauses() {
        let me = ObjectId::new();
        let friend = ObjectId::new();
        let mut params = search("goliath");
        params.series = Some(3);
        let filter = CourseFilter::new(&params, &member(me, &[friend])).unwrap();

        assert_eq!(
            filter.to_document(),
            doc! {
                "$and": [
                    {
                        "$or": [
                            { "visibility": 0 },
                            { "header.created_id": me },
                            { "visibility": 1, "header.created_id": { "$in": [friend] } },
                        ]
                    },
                    {
                        "$or": [
                            { "name": { "$regex": "goliath", "$options": "i" } },
                            { "sharing_code": NO_SHARING_CODE },
                        ]
                    },
                    { "series_code": 3 },
                ]
            }
        );

        // a member without friends still gets the friends-only clause
        let lonely = CourseFilter::new(&SearchParams::default(), &member(me, &[])).unwrap();
        let empty: Vec<Bson> = Vec::new();
        assert_eq!(
            lonely.to_document(),
            doc! {
                "$or": [
                    { "visibility": 0 },
                    { "header.created_id": me },
                    { "visibility": 1, "header.created_id": { "$in": empty } },
                ]
            }
        );

        let anon = CourseFilter::new(&SearchParams::default(), &Credentials::anonymous()).unwrap();
        assert_eq!(anon.to_document(), doc! { "visibility": 0 });

        let mut admin = member(me, &[]);
        admin.role = Role::Admin;
        let unrestricted = CourseFilter::new(&SearchParams::default(), &admin).unwrap();
        assert!(unrestricted.to_document().is_empty());
    }

    #[test]
    fn test_compare_orders_by_rating_then_touched() {
        let creator = ObjectId::new();
        let mut low = course(creator, Visibility::Public, "low", 1);
        let mut high = course(creator, Visibility::Public, "high", 2);
        low.header.rating = 1.0;
        high.header.rating = 4.5;

        let mut courses = vec![low.clone(), high.clone()];
        courses.sort_by(CourseFilter::compare);
        assert_eq!(courses[0].name, "high");

        let mut older = course(creator, Visibility::Public, "older", 3);
        let mut newer = course(creator, Visibility::Public, "newer", 4);
        older.header.touched_ts = Some(bson::DateTime::from_millis(1_000));
        newer.header.touched_ts = Some(bson::DateTime::from_millis(2_000));
        let mut courses = vec![older, newer];
        courses.sort_by(CourseFilter::compare);
        assert_eq!(courses[0].name, "newer");
    }
}
