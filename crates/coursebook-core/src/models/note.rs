use serde::{Deserialize, Serialize};

use crate::utils::format_file_size;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "courseId")]
    pub course_id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoteInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "courseId", skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i64>,
}

/// A file attached to a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    #[serde(rename = "noteId")]
    pub note_id: i64,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileType")]
    pub file_type: Option<String>,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
    #[serde(rename = "fileSize", default)]
    pub file_size: u64,
    #[serde(rename = "linkUrl")]
    pub link_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

impl Attachment {
    pub fn size_display(&self) -> String {
        format_file_size(self.file_size)
    }
}
