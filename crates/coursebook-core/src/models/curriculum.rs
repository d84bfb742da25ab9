use serde::{Deserialize, Serialize};

/// An ordered study plan grouping several courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curriculum {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub goal: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumCourse {
    pub id: i64,
    #[serde(rename = "curriculumId")]
    pub curriculum_id: i64,
    #[serde(rename = "courseId")]
    pub course_id: i64,
    #[serde(rename = "orderIndex")]
    pub order_index: i32,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CurriculumInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}
