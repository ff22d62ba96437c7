use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContentData, ContentError, ContentItem};

pub const DEFAULT_THUMBNAIL: &str =
    "https://images.unsplash.com/photo-1456513080510-7bf3a84b82f8?w=400&h=250&fit=crop";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub category: String,
    pub author: Uuid,
    pub author_name: String,
    pub is_public: bool,
    pub contents: Vec<ContentItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn content(&self, id: Uuid) -> Option<&ContentItem> {
        self.contents.iter().find(|c| c.id == id)
    }

    pub fn content_mut(&mut self, id: Uuid) -> Option<&mut ContentItem> {
        self.contents.iter_mut().find(|c| c.id == id)
    }

    /// Contents in display order: ascending `order`, ties keep their
    /// stored position.
    pub fn ordered_contents(&self) -> Vec<&ContentItem> {
        let mut items: Vec<&ContentItem> = self.contents.iter().collect();
        items.sort_by_key(|c| c.order);
        items
    }

    /// Append a new item at the end of the collection.
    ///
    /// The new item's order is the current collection length. After a
    /// delete that value can tie with an existing item, and display order
    /// then falls back to position in the collection.
    pub fn add_content(
        &mut self,
        title: &str,
        body: ContentData,
    ) -> Result<&ContentItem, ContentError> {
        let order = self.contents.len() as u32;
        let item = ContentItem::new(title, body, order)?;
        self.contents.push(item);
        self.updated_at = Utc::now();
        Ok(&self.contents[self.contents.len() - 1])
    }

    /// Remove one item. Remaining items keep their order values; gaps do
    /// not affect sorting.
    pub fn remove_content(&mut self, id: Uuid) -> Option<ContentItem> {
        let index = self.contents.iter().position(|c| c.id == id)?;
        self.updated_at = Utc::now();
        Some(self.contents.remove(index))
    }

    /// Replace the collection with the items named in `ordered_ids`.
    ///
    /// Returns the stored items that were left out of `ordered_ids` and
    /// therefore dropped, so their files can be cleaned up.
    pub fn reorder_contents(&mut self, ordered_ids: &[Uuid]) -> Vec<ContentItem> {
        let (kept, dropped): (Vec<ContentItem>, Vec<ContentItem>) =
            std::mem::take(&mut self.contents)
                .into_iter()
                .partition(|item| ordered_ids.contains(&item.id));
        self.contents = reorder(kept, ordered_ids);
        self.updated_at = Utc::now();
        dropped
    }

    /// Every uploaded-file URL this course references: its thumbnail and
    /// the files owned by its contents.
    pub fn file_urls(&self) -> Vec<&str> {
        std::iter::once(self.thumbnail.as_str())
            .chain(self.contents.iter().flat_map(|c| c.body.file_urls()))
            .collect()
    }
}

/// Rebuild a content collection in the order given by `ordered_ids`.
///
/// Each listed item gets its index in `ordered_ids` as its new order.
/// Ids that match nothing are skipped, an id listed twice only counts the
/// first time, and items whose id is not listed are not returned.
pub fn reorder(items: Vec<ContentItem>, ordered_ids: &[Uuid]) -> Vec<ContentItem> {
    let mut by_id: HashMap<Uuid, ContentItem> =
        items.into_iter().map(|item| (item.id, item)).collect();

    ordered_ids
        .iter()
        .enumerate()
        .filter_map(|(index, id)| {
            by_id.remove(id).map(|mut item| {
                item.order = index as u32;
                item
            })
        })
        .collect()
}
