use serde::{Deserialize, Serialize};

/// Result of storing one uploaded file.
///
/// `url` is the file clients should use. For a converted Word document it
/// is the generated PDF and `pdf_url` repeats it; otherwise `pdf_url` is
/// null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub pdf_url: Option<String>,
    pub converted_to_pdf: bool,
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub mimetype: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarUploadResponse {
    pub url: String,
    pub filename: String,
}
