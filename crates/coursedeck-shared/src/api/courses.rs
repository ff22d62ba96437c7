use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContentData, Course};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// Partial course update. Empty strings leave the stored value unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddContentRequest {
    pub title: String,
    #[serde(flatten)]
    pub body: ContentData,
}

/// Partial content update. `data` is checked against the stored item's
/// kind; the kind itself cannot change.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderContentsRequest {
    pub content_ids: Vec<Uuid>,
}

/// A course as returned to clients, with its derived content count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    #[serde(flatten)]
    pub course: Course,
    pub content_count: usize,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        let content_count = course.contents.len();
        Self {
            course,
            content_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarkdownNote, NoteData, DEFAULT_THUMBNAIL};
    use chrono::Utc;

    #[test]
    fn course_response_carries_content_count() {
        let now = Utc::now();
        let mut course = Course {
            id: Uuid::new_v4(),
            title: "Tarih".into(),
            description: "Osmanlı".into(),
            thumbnail: DEFAULT_THUMBNAIL.into(),
            category: "Sosyal".into(),
            author: Uuid::new_v4(),
            author_name: "Robin".into(),
            is_public: true,
            contents: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        for text in ["a", "b"] {
            course
                .add_content(
                    text,
                    ContentData::Note(NoteData::Markdown(MarkdownNote {
                        content: text.into(),
                    })),
                )
                .unwrap();
        }

        let value = serde_json::to_value(CourseResponse::from(course)).unwrap();

        assert_eq!(value["contentCount"], 2);
        assert_eq!(value["title"], "Tarih");
        assert_eq!(value["isPublic"], true);
        assert_eq!(value["contents"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn reorder_request_uses_camel_case_ids() {
        let id = Uuid::new_v4();
        let req: ReorderContentsRequest =
            serde_json::from_value(serde_json::json!({ "contentIds": [id] })).unwrap();
        assert_eq!(req.content_ids, vec![id]);
    }
}
