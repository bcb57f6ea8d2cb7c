//! User tags and their picture associations.

pub mod query;

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::db::{CatalogStore, Tag, TagCategory, TagWithCount};
use crate::error::{CatalogError, Result};

pub use query::{GroupOperator, GroupQuery, SearchCriteria, TagCriteria, TagQueryEngine};

pub struct TagService {
    store: Arc<dyn CatalogStore>,
}

impl TagService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Create a tag. The name is trimmed and must not be empty; an existing
    /// tag with the same name is left untouched.
    pub fn create_tag(&self, name: &str, category: TagCategory, color: &str) -> Result<Tag> {
        let name = validate_name(name)?;

        if self.store.find_tag(name)?.is_some() {
            return Err(CatalogError::AlreadyExists(format!("tag '{}'", name)));
        }

        let tag = Tag {
            name: name.to_string(),
            category,
            color: color.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_tag(&tag)?;
        info!("Created {} tag '{}'", category, name);
        Ok(tag)
    }

    pub fn update_tag(&self, name: &str, category: TagCategory, color: &str) -> Result<()> {
        if !self.store.update_tag(name, category, color)? {
            return Err(CatalogError::not_found(format!("tag '{}'", name)));
        }
        Ok(())
    }

    /// Delete a tag after removing all of its associations.
    pub fn delete_tag(&self, name: &str) -> Result<()> {
        if !self.store.delete_tag(name)? {
            return Err(CatalogError::not_found(format!("tag '{}'", name)));
        }
        info!("Deleted tag '{}'", name);
        Ok(())
    }

    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        self.store.all_tags()
    }

    pub fn all_tags_with_count(&self) -> Result<Vec<TagWithCount>> {
        self.store.all_tags_with_count()
    }

    /// Tag a picture. Tagging twice is not an error.
    pub fn add_tag_to_picture(&self, picture_path: &str, tag_name: &str) -> Result<()> {
        if self.store.find_picture(picture_path)?.is_none() {
            return Err(CatalogError::not_found(format!("picture {}", picture_path)));
        }
        if self.store.find_tag(tag_name)?.is_none() {
            return Err(CatalogError::not_found(format!("tag '{}'", tag_name)));
        }
        self.store.add_association(picture_path, tag_name)
    }

    /// Untag a picture. Removing an absent association is not an error.
    pub fn remove_tag_from_picture(&self, picture_path: &str, tag_name: &str) -> Result<()> {
        self.store.remove_association(picture_path, tag_name)?;
        Ok(())
    }

    pub fn tags_for_picture(&self, picture_path: &str) -> Result<Vec<Tag>> {
        self.store.tags_for_picture(picture_path)
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::invalid_input("tag name cannot be empty"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, Picture};

    fn service() -> (Arc<dyn CatalogStore>, TagService) {
        let store = db::open_in_memory().unwrap();
        (store.clone(), TagService::new(store))
    }

    fn add_picture(store: &Arc<dyn CatalogStore>, path: &str) {
        let now = Utc::now();
        store
            .upsert_picture(&Picture {
                path: path.to_string(),
                filename: "a.jpg".to_string(),
                size_bytes: 10,
                width: 2,
                height: 2,
                created_at: now,
                modified_at: now,
                indexed_at: now,
                thumbnail_path: None,
            })
            .unwrap();
    }

    #[test]
    fn test_create_trims_and_rejects_empty() {
        let (_, tags) = service();
        let tag = tags.create_tag("  Clara ", TagCategory::Person, "#F00").unwrap();
        assert_eq!(tag.name, "Clara");

        let err = tags.create_tag("   ", TagCategory::Person, "").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_create_keeps_original() {
        let (_, tags) = service();
        tags.create_tag("Paris", TagCategory::Location, "#00F").unwrap();

        let err = tags.create_tag("Paris", TagCategory::Event, "#0F0").unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists(_)));

        let all = tags.all_tags().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].category, TagCategory::Location);
        assert_eq!(all[0].color, "#00F");
    }

    #[test]
    fn test_update_and_delete_missing_tag() {
        let (_, tags) = service();
        assert!(tags
            .update_tag("Ghost", TagCategory::Other, "")
            .unwrap_err()
            .is_not_found());
        assert!(tags.delete_tag("Ghost").unwrap_err().is_not_found());

        tags.create_tag("Wedding", TagCategory::Other, "").unwrap();
        tags.update_tag("Wedding", TagCategory::Event, "#FFF").unwrap();
        let tag = &tags.all_tags().unwrap()[0];
        assert_eq!(tag.category, TagCategory::Event);
        assert_eq!(tag.color, "#FFF");
    }

    #[test]
    fn test_tagging_requires_existing_picture_and_tag() {
        let (store, tags) = service();
        add_picture(&store, "/p/a.jpg");
        tags.create_tag("Clara", TagCategory::Person, "").unwrap();

        assert!(tags.add_tag_to_picture("/p/missing.jpg", "Clara").unwrap_err().is_not_found());
        assert!(tags.add_tag_to_picture("/p/a.jpg", "Nobody").unwrap_err().is_not_found());

        tags.add_tag_to_picture("/p/a.jpg", "Clara").unwrap();
        tags.add_tag_to_picture("/p/a.jpg", "Clara").unwrap();
        assert_eq!(tags.tags_for_picture("/p/a.jpg").unwrap().len(), 1);
        assert_eq!(tags.all_tags_with_count().unwrap()[0].picture_count, 1);

        tags.remove_tag_from_picture("/p/a.jpg", "Clara").unwrap();
        tags.remove_tag_from_picture("/p/a.jpg", "Clara").unwrap();
        assert!(tags.tags_for_picture("/p/a.jpg").unwrap().is_empty());
    }

    #[test]
    fn test_deleted_tag_search_is_empty() {
        let (store, tags) = service();
        add_picture(&store, "/p/a.jpg");
        tags.create_tag("Clara", TagCategory::Person, "").unwrap();
        tags.add_tag_to_picture("/p/a.jpg", "Clara").unwrap();

        tags.delete_tag("Clara").unwrap();

        let engine = TagQueryEngine::new(store);
        let criteria = SearchCriteria {
            persons: TagCriteria::all(["Clara"]),
            ..Default::default()
        };
        assert!(engine.search(&criteria).unwrap().is_empty());
        assert!(tags.tags_for_picture("/p/a.jpg").unwrap().is_empty());
    }
}
