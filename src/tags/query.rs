//! Tag Query Engine.
//!
//! A search names up to four category groups. Each non-empty group is
//! reduced to a set of picture paths using its own operator, and the group
//! sets are intersected: a picture must satisfy every non-empty group.
//!
//! Example: persons = AND[Clara, Romaric], locations = OR[Paris, Compiegne]
//! matches pictures showing both Clara and Romaric, taken in either city.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::db::{CatalogStore, Picture, TagCategory};
use crate::error::{CatalogError, Result};

/// How tags inside one category group combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum GroupOperator {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl FromStr for GroupOperator {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(GroupOperator::And),
            "OR" => Ok(GroupOperator::Or),
            _ => Err(CatalogError::invalid_input(format!("invalid group operator: {}", s))),
        }
    }
}

impl TryFrom<String> for GroupOperator {
    type Error = CatalogError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCriteria {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub operator: GroupOperator,
}

impl TagCriteria {
    pub fn new<S: Into<String>>(tags: impl IntoIterator<Item = S>, operator: GroupOperator) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            operator,
        }
    }

    pub fn all<S: Into<String>>(tags: impl IntoIterator<Item = S>) -> Self {
        Self::new(tags, GroupOperator::And)
    }

    pub fn any<S: Into<String>>(tags: impl IntoIterator<Item = S>) -> Self {
        Self::new(tags, GroupOperator::Or)
    }
}

/// Per-category search request. Empty groups are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub persons: TagCriteria,
    #[serde(default)]
    pub locations: TagCriteria,
    #[serde(default)]
    pub events: TagCriteria,
    #[serde(default)]
    pub others: TagCriteria,
}

impl SearchCriteria {
    pub fn group(&self, category: TagCategory) -> &TagCriteria {
        match category {
            TagCategory::Person => &self.persons,
            TagCategory::Location => &self.locations,
            TagCategory::Event => &self.events,
            TagCategory::Other => &self.others,
        }
    }

    pub fn group_mut(&mut self, category: TagCategory) -> &mut TagCriteria {
        match category {
            TagCategory::Person => &mut self.persons,
            TagCategory::Location => &mut self.locations,
            TagCategory::Event => &mut self.events,
            TagCategory::Other => &mut self.others,
        }
    }

    /// Evaluation plan: one query per non-empty group, in category order.
    pub fn groups(&self) -> Vec<(TagCategory, GroupQuery)> {
        TagCategory::ALL
            .iter()
            .filter_map(|&category| {
                GroupQuery::from_criteria(self.group(category)).map(|query| (category, query))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        TagCategory::ALL
            .iter()
            .all(|&category| self.group(category).tags.is_empty())
    }
}

/// One group reduced to a set operation over the membership relation.
/// Tag lists are duplicate-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupQuery {
    /// Pictures carrying at least one of the tags
    Union(Vec<String>),
    /// Pictures carrying every one of the tags
    Intersection(Vec<String>),
}

impl GroupQuery {
    /// `None` for an inert (empty) group. A group with a single distinct tag
    /// is always a union.
    pub fn from_criteria(criteria: &TagCriteria) -> Option<Self> {
        let mut seen = HashSet::new();
        let tags: Vec<String> = criteria
            .tags
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect();

        if tags.is_empty() {
            return None;
        }

        if criteria.operator == GroupOperator::Or || tags.len() == 1 {
            Some(GroupQuery::Union(tags))
        } else {
            Some(GroupQuery::Intersection(tags))
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            GroupQuery::Union(tags) | GroupQuery::Intersection(tags) => tags,
        }
    }

    /// Parameterized SQL over `picture_tags` returning one `picture_path`
    /// column, plus its bound values.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let tags = self.tags();
        let placeholders = vec!["?"; tags.len()].join(", ");
        let mut params: Vec<Value> = tags.iter().map(|t| Value::Text(t.clone())).collect();

        let sql = match self {
            GroupQuery::Union(_) => format!(
                "SELECT DISTINCT picture_path FROM picture_tags WHERE tag_name IN ({})",
                placeholders
            ),
            GroupQuery::Intersection(_) => {
                params.push(Value::Integer(tags.len() as i64));
                format!(
                    "SELECT picture_path FROM picture_tags WHERE tag_name IN ({}) \
                     GROUP BY picture_path HAVING COUNT(DISTINCT tag_name) = ?",
                    placeholders
                )
            }
        };

        (sql, params)
    }
}

/// Evaluates [`SearchCriteria`] against the catalog. Read-only.
pub struct TagQueryEngine {
    store: Arc<dyn CatalogStore>,
}

impl TagQueryEngine {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Picture>> {
        self.store.ensure_ready()?;

        if criteria.is_empty() {
            return self.store.all_pictures();
        }

        let groups = criteria.groups();

        let mut matched: Option<HashSet<String>> = None;
        for (category, group) in &groups {
            let paths = self.store.group_paths(group)?;
            debug!("{} group {:?} matched {} pictures", category, group, paths.len());

            let narrowed = match matched.take() {
                None => paths,
                Some(mut acc) => {
                    acc.retain(|p| paths.contains(p));
                    acc
                }
            };

            if narrowed.is_empty() {
                return Ok(Vec::new());
            }
            matched = Some(narrowed);
        }

        let mut paths: Vec<String> = matched.unwrap_or_default().into_iter().collect();
        paths.sort();
        self.store.pictures_by_paths(&paths)
    }
}
