use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a content payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("Content title is required")]
    MissingTitle,

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Quiz question {index}: correct answer must be between 0 and 3, got {value}")]
    CorrectAnswerOutOfRange { index: usize, value: u8 },

    #[error("Document notes must be flagged with isDocument")]
    NotADocument,

    #[error("Content kind cannot change from {from} to {to}")]
    KindMismatch {
        from: ContentKind,
        to: ContentKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Note,
    Flashcard,
    Quiz,
    Video,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Flashcard => "flashcard",
            Self::Quiz => "quiz",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved kind of an uploaded note document.
///
/// Older clients sent the browser MIME type instead of the short name, so
/// both spellings are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[serde(alias = "application/pdf")]
    Pdf,
    #[serde(alias = "application/msword")]
    Doc,
    #[serde(alias = "application/vnd.openxmlformats-officedocument.wordprocessingml.document")]
    Docx,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNote {
    pub file_url: String,
    #[serde(default)]
    pub file_name: String,
    pub file_type: DocumentKind,
    pub is_document: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownNote {
    pub content: String,
}

/// A note is either inline markdown or a reference to an uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteData {
    Document(DocumentNote),
    Markdown(MarkdownNote),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardData {
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: [String; 4],
    pub correct_answer: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizData {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoData {
    pub url: String,
    #[serde(default)]
    pub is_uploaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Kind-specific payload of a content item, serialized as
/// `{"type": <kind>, "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ContentData {
    Note(NoteData),
    Flashcard(FlashcardData),
    Quiz(QuizData),
    Video(VideoData),
}

impl ContentData {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Note(_) => ContentKind::Note,
            Self::Flashcard(_) => ContentKind::Flashcard,
            Self::Quiz(_) => ContentKind::Quiz,
            Self::Video(_) => ContentKind::Video,
        }
    }

    /// Decode a raw `data` object as the payload of `kind`.
    pub fn from_parts(
        kind: ContentKind,
        data: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "type": kind, "data": data }))
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        match self {
            Self::Note(NoteData::Markdown(_)) => Ok(()),
            Self::Note(NoteData::Document(doc)) => {
                if !doc.is_document {
                    return Err(ContentError::NotADocument);
                }
                if doc.file_url.trim().is_empty() {
                    return Err(ContentError::Empty("Document file URL"));
                }
                Ok(())
            }
            Self::Flashcard(data) => {
                if data.cards.is_empty() {
                    return Err(ContentError::Empty("Flashcard deck"));
                }
                for card in &data.cards {
                    if card.front.trim().is_empty() || card.back.trim().is_empty() {
                        return Err(ContentError::Empty("Flashcard side"));
                    }
                }
                Ok(())
            }
            Self::Quiz(data) => {
                if data.questions.is_empty() {
                    return Err(ContentError::Empty("Quiz"));
                }
                for (index, q) in data.questions.iter().enumerate() {
                    if q.question.trim().is_empty() {
                        return Err(ContentError::Empty("Quiz question"));
                    }
                    if q.options.iter().any(|o| o.trim().is_empty()) {
                        return Err(ContentError::Empty("Quiz option"));
                    }
                    if q.correct_answer > 3 {
                        return Err(ContentError::CorrectAnswerOutOfRange {
                            index,
                            value: q.correct_answer,
                        });
                    }
                }
                Ok(())
            }
            Self::Video(video) => {
                if video.url.trim().is_empty() {
                    return Err(ContentError::Empty("Video URL"));
                }
                Ok(())
            }
        }
    }

    /// URLs of uploaded files this payload owns.
    ///
    /// External videos (`isUploaded == false`) are links, not files, and
    /// are not returned.
    pub fn file_urls(&self) -> Vec<&str> {
        match self {
            Self::Note(NoteData::Document(doc)) => vec![doc.file_url.as_str()],
            Self::Video(video) if video.is_uploaded => vec![video.url.as_str()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    pub order: u32,
    #[serde(flatten)]
    pub body: ContentData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Build a validated item. `order` is assigned by the owning course.
    pub fn new(title: &str, body: ContentData, order: u32) -> Result<Self, ContentError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ContentError::MissingTitle);
        }
        body.validate()?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            order,
            body,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn kind(&self) -> ContentKind {
        self.body.kind()
    }

    /// Apply a partial update. The payload may only be replaced by one of
    /// the same kind.
    pub fn apply_update(
        &mut self,
        title: Option<&str>,
        body: Option<ContentData>,
    ) -> Result<(), ContentError> {
        if let Some(body) = &body {
            if body.kind() != self.kind() {
                return Err(ContentError::KindMismatch {
                    from: self.kind(),
                    to: body.kind(),
                });
            }
            body.validate()?;
        }

        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            self.title = title.to_string();
        }
        if let Some(body) = body {
            self.body = body;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiz(correct_answer: u8) -> ContentData {
        ContentData::Quiz(QuizData {
            questions: vec![QuizQuestion {
                id: "q_1".into(),
                question: "Başkent neresi?".into(),
                options: [
                    "Ankara".into(),
                    "İstanbul".into(),
                    "İzmir".into(),
                    "Bursa".into(),
                ],
                correct_answer,
            }],
        })
    }

    #[test]
    fn item_wire_shape_matches_front_end() {
        let item = ContentItem::new(
            "Intro",
            ContentData::Note(NoteData::Markdown(MarkdownNote {
                content: "# Hello".into(),
            })),
            3,
        )
        .unwrap();

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "note");
        assert_eq!(value["order"], 3);
        assert_eq!(value["data"]["content"], "# Hello");
        assert!(value.get("createdAt").is_some());

        let back: ContentItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn document_note_accepts_mime_file_type() {
        let data: ContentData = serde_json::from_value(json!({
            "type": "note",
            "data": {
                "fileUrl": "/uploads/file-1-2.pdf",
                "fileName": "ders.docx",
                "fileType": "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "isDocument": true
            }
        }))
        .unwrap();

        match &data {
            ContentData::Note(NoteData::Document(doc)) => {
                assert_eq!(doc.file_type, DocumentKind::Docx);
            }
            other => panic!("expected document note, got {other:?}"),
        }
        assert_eq!(data.file_urls(), vec!["/uploads/file-1-2.pdf"]);
    }

    #[test]
    fn payload_shape_must_match_kind() {
        let result: Result<ContentData, _> = serde_json::from_value(json!({
            "type": "quiz",
            "data": { "cards": [] }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn raw_data_is_decoded_against_stored_kind() {
        let data = json!({ "url": "https://example.com/v.mp4", "duration": "12:30" });

        let video = ContentData::from_parts(ContentKind::Video, data.clone()).unwrap();
        assert_eq!(video.kind(), ContentKind::Video);

        assert!(ContentData::from_parts(ContentKind::Flashcard, data).is_err());
    }

    #[test]
    fn quiz_answer_index_is_bounded() {
        assert!(quiz(3).validate().is_ok());
        assert_eq!(
            quiz(4).validate(),
            Err(ContentError::CorrectAnswerOutOfRange { index: 0, value: 4 })
        );
    }

    #[test]
    fn external_video_owns_no_file() {
        let video = ContentData::Video(VideoData {
            url: "https://youtube.com/watch?v=x".into(),
            is_uploaded: false,
            duration: None,
            description: None,
        });
        assert!(video.file_urls().is_empty());
    }

    #[test]
    fn update_rejects_kind_change() {
        let mut item = ContentItem::new("Quiz", quiz(0), 0).unwrap();
        let err = item
            .apply_update(
                None,
                Some(ContentData::Flashcard(FlashcardData {
                    cards: vec![Flashcard {
                        id: "fc_1".into(),
                        front: "a".into(),
                        back: "b".into(),
                    }],
                })),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ContentError::KindMismatch {
                from: ContentKind::Quiz,
                to: ContentKind::Flashcard
            }
        );
    }

    #[test]
    fn blank_title_is_rejected() {
        assert_eq!(
            ContentItem::new("   ", quiz(1), 0).unwrap_err(),
            ContentError::MissingTitle
        );
    }
}
