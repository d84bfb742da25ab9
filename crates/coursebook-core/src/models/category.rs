use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}
