//! List filters
//!
//! [`ListArgs`] are the caller-supplied pagination, sort and search options;
//! [`FlowQuery`] is what the store evaluates, adding the visibility scope
//! the repository derives from the caller's grants.

use crate::error::RepoError;
use crate::types::{Flow, FlowId};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Field a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    Name,
    Description,
    UserId,
    DateCreated,
    DateUpdated,
}

impl FromStr for SortField {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "_id" | "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "userId" => Ok(Self::UserId),
            "dateCreated" => Ok(Self::DateCreated),
            "dateUpdated" => Ok(Self::DateUpdated),
            other => Err(RepoError::InvalidQuery(format!("unknown sort field: {other}"))),
        }
    }
}

impl SortField {
    /// Document key the field is stored under
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::Name => "name",
            Self::Description => "description",
            Self::UserId => "userId",
            Self::DateCreated => "dateCreated",
            Self::DateUpdated => "dateUpdated",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort specification, written `field:asc` or `field:desc`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl FromStr for SortOrder {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(':') {
            Some((field, "asc")) => (field, SortDirection::Ascending),
            Some((field, "desc")) => (field, SortDirection::Descending),
            Some((_, other)) => {
                return Err(RepoError::InvalidQuery(format!(
                    "unknown sort direction: {other}"
                )))
            }
            None => (s, SortDirection::Ascending),
        };
        Ok(Self {
            field: field.parse()?,
            direction,
        })
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        write!(f, "{}:{direction}", self.field.key())
    }
}

/// Caller-supplied listing options
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListArgs {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order: Option<SortOrder>,
    pub search: Option<String>,
}

impl ListArgs {
    /// Parse from URL query pairs
    ///
    /// Recognizes `limit`, `offset`, `order` and `search`; other keys are
    /// ignored. The first occurrence of a repeated key wins.
    ///
    /// # Errors
    /// `RepoError::InvalidQuery` for non-numeric pagination or a bad order.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self, RepoError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut args = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "limit" if args.limit.is_none() => args.limit = Some(parse_count("limit", value)?),
                "offset" if args.offset.is_none() => {
                    args.offset = Some(parse_count("offset", value)?);
                }
                "order" if args.order.is_none() => args.order = Some(value.parse()?),
                "search" if args.search.is_none() => args.search = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(args)
    }

    /// Inverse of [`ListArgs::from_query_pairs`]
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn with_order(mut self, field: SortField, direction: SortDirection) -> Self {
        self.order = Some(SortOrder { field, direction });
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

fn parse_count(name: &str, value: &str) -> Result<u64, RepoError> {
    value
        .parse()
        .map_err(|_| RepoError::InvalidQuery(format!("{name} must be a non-negative integer: {value}")))
}

/// Filter evaluated by a [`FlowStore`](crate::ports::FlowStore)
///
/// `owner_id` and `id_subset` form an OR-group when both are present;
/// `search` is ANDed with that group. `limit`/`offset` apply after
/// ordering and do not affect the reported total.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order: Option<SortOrder>,
    /// Regular expression matched against the flow name
    pub search: Option<String>,
    pub owner_id: Option<String>,
    pub id_subset: Option<BTreeSet<FlowId>>,
}

impl FlowQuery {
    /// Unscoped query carrying the caller's options
    #[must_use]
    pub fn from_args(args: ListArgs) -> Self {
        Self {
            limit: args.limit,
            offset: args.offset,
            order: args.order,
            search: args.search,
            owner_id: None,
            id_subset: None,
        }
    }

    /// Restrict to flows owned by `owner` or contained in `ids`
    #[must_use]
    pub fn owned_or_granted(mut self, owner: impl Into<String>, ids: BTreeSet<FlowId>) -> Self {
        self.owner_id = Some(owner.into());
        self.id_subset = Some(ids);
        self
    }

    /// Whether `flow` falls inside the owner/id scope
    #[must_use]
    pub fn in_scope(&self, flow: &Flow) -> bool {
        let by_owner = self.owner_id.as_ref().map(|owner| &flow.user_id == owner);
        let by_id = self
            .id_subset
            .as_ref()
            .map(|ids| flow.id.as_ref().is_some_and(|id| ids.contains(id)));

        match (by_owner, by_id) {
            (None, None) => true,
            (Some(a), None) | (None, Some(a)) => a,
            (Some(a), Some(b)) => a || b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_args() {
        let args = ListArgs::from_query_pairs([
            ("limit", "10"),
            ("offset", "5"),
            ("order", "name:desc"),
            ("search", "^p"),
            ("unrelated", "x"),
        ])
        .unwrap();

        assert_eq!(args.limit, Some(10));
        assert_eq!(args.offset, Some(5));
        assert_eq!(
            args.order,
            Some(SortOrder {
                field: SortField::Name,
                direction: SortDirection::Descending
            })
        );
        assert_eq!(args.search.as_deref(), Some("^p"));
    }

    #[test]
    fn query_pairs_reparse_to_same_args() {
        let args = ListArgs::default()
            .with_limit(3)
            .with_order(SortField::DateUpdated, SortDirection::Descending)
            .with_search("etl");
        let pairs = args.to_query_pairs();
        assert!(pairs.contains(&("order", "dateUpdated:desc".to_string())));
        assert_eq!(ListArgs::from_query_pairs(pairs).unwrap(), args);
    }

    #[test]
    fn first_value_wins() {
        let args = ListArgs::from_query_pairs([("limit", "1"), ("limit", "2")]).unwrap();
        assert_eq!(args.limit, Some(1));
    }

    #[test]
    fn rejects_malformed_args() {
        assert!(ListArgs::from_query_pairs([("limit", "abc")]).is_err());
        assert!(ListArgs::from_query_pairs([("offset", "-1")]).is_err());
        assert!(ListArgs::from_query_pairs([("order", "name:sideways")]).is_err());
        assert!(ListArgs::from_query_pairs([("order", "color:asc")]).is_err());
    }

    #[test]
    fn order_without_direction_is_ascending() {
        let order: SortOrder = "dateCreated".parse().unwrap();
        assert_eq!(order.field, SortField::DateCreated);
        assert_eq!(order.direction, SortDirection::Ascending);
    }

    #[test]
    fn scope_is_owner_or_granted() {
        let mut mine = Flow::new("mine");
        mine.id = Some(FlowId::new("1"));
        mine.user_id = "alice".into();
        let mut shared = Flow::new("shared");
        shared.id = Some(FlowId::new("2"));
        shared.user_id = "bob".into();
        let mut hidden = Flow::new("hidden");
        hidden.id = Some(FlowId::new("3"));
        hidden.user_id = "bob".into();

        let query = FlowQuery::default()
            .owned_or_granted("alice", BTreeSet::from([FlowId::new("2")]));

        assert!(query.in_scope(&mine));
        assert!(query.in_scope(&shared));
        assert!(!query.in_scope(&hidden));
        assert!(FlowQuery::default().in_scope(&hidden));
    }
}
