//! Typed resource endpoints: courses, notes, todos, curriculums, categories,
//! and file attachments. Every method goes through the gateway, so each one
//! gets the same refresh-and-replay behavior.

use serde_json::json;

use super::client::{ApiClient, RequestOptions};
use super::error::ApiError;
use super::transport::MultipartPayload;
use crate::models::{
    Attachment, Category, Course, CourseInput, Curriculum, CurriculumCourse, CurriculumInput,
    Note, NoteInput, Todo, TodoInput, TodoStatus,
};

/// Upload payload: the whole file, read before the first attempt.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ApiClient {
    // ===== Courses =====

    pub async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.get("/courses").await
    }

    pub async fn get_course(&self, id: i64) -> Result<Course, ApiError> {
        self.get(&format!("/courses/{}", id)).await
    }

    pub async fn create_course(&self, input: &CourseInput) -> Result<Course, ApiError> {
        self.post("/courses", input).await
    }

    pub async fn update_course(&self, id: i64, input: &CourseInput) -> Result<Course, ApiError> {
        self.put(&format!("/courses/{}", id), input).await
    }

    pub async fn delete_course(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/courses/{}", id)).await
    }

    pub async fn update_course_progress(&self, id: i64, progress: u8) -> Result<Course, ApiError> {
        self.patch(&format!("/courses/{}/progress", id), &json!({ "progress": progress.min(100) }))
            .await
    }

    // ===== Notes =====

    pub async fn list_notes(&self, course_id: Option<i64>) -> Result<Vec<Note>, ApiError> {
        match course_id {
            Some(id) => self.get(&format!("/notes?courseId={}", id)).await,
            None => self.get("/notes").await,
        }
    }

    pub async fn get_note(&self, id: i64) -> Result<Note, ApiError> {
        self.get(&format!("/notes/{}", id)).await
    }

    pub async fn create_note(&self, input: &NoteInput) -> Result<Note, ApiError> {
        self.post("/notes", input).await
    }

    pub async fn update_note(&self, id: i64, input: &NoteInput) -> Result<Note, ApiError> {
        self.put(&format!("/notes/{}", id), input).await
    }

    pub async fn delete_note(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/notes/{}", id)).await
    }

    // ===== Todos =====

    pub async fn list_todos(&self, status: Option<TodoStatus>) -> Result<Vec<Todo>, ApiError> {
        match status {
            Some(status) => self.get(&format!("/todos?status={}", status.as_str())).await,
            None => self.get("/todos").await,
        }
    }

    pub async fn get_todo(&self, id: i64) -> Result<Todo, ApiError> {
        self.get(&format!("/todos/{}", id)).await
    }

    pub async fn create_todo(&self, input: &TodoInput) -> Result<Todo, ApiError> {
        self.post("/todos", input).await
    }

    pub async fn update_todo(&self, id: i64, input: &TodoInput) -> Result<Todo, ApiError> {
        self.put(&format!("/todos/{}", id), input).await
    }

    pub async fn delete_todo(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/todos/{}", id)).await
    }

    pub async fn update_todo_status(&self, id: i64, status: TodoStatus) -> Result<Todo, ApiError> {
        self.patch(&format!("/todos/{}/status", id), &json!({ "status": status }))
            .await
    }

    // ===== Curriculums =====

    pub async fn list_curriculums(&self) -> Result<Vec<Curriculum>, ApiError> {
        self.get("/curriculums").await
    }

    pub async fn get_curriculum(&self, id: i64) -> Result<Curriculum, ApiError> {
        self.get(&format!("/curriculums/{}", id)).await
    }

    pub async fn create_curriculum(&self, input: &CurriculumInput) -> Result<Curriculum, ApiError> {
        self.post("/curriculums", input).await
    }

    pub async fn update_curriculum(&self, id: i64, input: &CurriculumInput) -> Result<Curriculum, ApiError> {
        self.put(&format!("/curriculums/{}", id), input).await
    }

    pub async fn delete_curriculum(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/curriculums/{}", id)).await
    }

    /// Returns the join row when the backend sends one, `None` for an empty body.
    pub async fn add_curriculum_course(
        &self,
        curriculum_id: i64,
        course_id: i64,
    ) -> Result<Option<CurriculumCourse>, ApiError> {
        self.post_empty(&format!("/curriculums/{}/courses/{}", curriculum_id, course_id))
            .await
    }

    pub async fn remove_curriculum_course(&self, curriculum_id: i64, course_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/curriculums/{}/courses/{}", curriculum_id, course_id))
            .await
    }

    pub async fn reorder_curriculum_courses(&self, curriculum_id: i64, course_ids: &[i64]) -> Result<(), ApiError> {
        self.put(
            &format!("/curriculums/{}/courses/order", curriculum_id),
            &json!({ "courseIds": course_ids }),
        )
        .await
    }

    // ===== Categories =====

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get("/categories").await
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, ApiError> {
        self.post("/categories", &json!({ "name": name })).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/categories/{}", id)).await
    }

    // ===== Files =====

    pub async fn upload_file(&self, note_id: i64, file: FileUpload) -> Result<Attachment, ApiError> {
        let payload = MultipartPayload::new()
            .file("file", file.file_name, file.content_type, file.bytes)
            .text("noteId", note_id.to_string());
        self.request_multipart("/files/upload", payload, RequestOptions::default())
            .await
    }

    pub async fn list_attachments(&self, note_id: i64) -> Result<Vec<Attachment>, ApiError> {
        self.get(&format!("/files/note/{}", note_id)).await
    }

    pub async fn delete_attachment(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/files/{}", id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::Method;

    use super::*;
    use crate::models::{CourseStatus, Priority};
    use crate::testutil::{test_client, Reply, ScriptedTransport};

    const COURSE: &str = r#"{"id":3,"userId":1,"title":"Rust","status":"in_progress","progress":55}"#;
    const TODO: &str = r#"{"id":5,"userId":1,"title":"Exercises","priority":"high","status":"completed"}"#;

    #[tokio::test]
    async fn test_course_endpoints() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/courses/3", Reply::json(200, COURSE));
        transport.on("/courses/3/progress", Reply::json(200, COURSE));
        transport.on("/courses", Reply::json(200, COURSE));
        let (client, _) = test_client(transport.clone());

        let course = client.get_course(3).await.unwrap();
        assert_eq!(course.status, CourseStatus::InProgress);

        client.update_course_progress(3, 130).await.unwrap();
        assert_eq!(transport.json_bodies("/courses/3/progress")[0]["progress"], 100);
        assert_eq!(transport.methods("/courses/3/progress"), vec![Method::PATCH]);

        let input = CourseInput {
            title: Some("Rust".to_string()),
            status: Some(CourseStatus::NotStarted),
            ..Default::default()
        };
        client.create_course(&input).await.unwrap();
        assert_eq!(transport.json_bodies("/courses")[0]["status"], "not_started");
    }

    #[tokio::test]
    async fn test_filtered_lists() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/notes?courseId=3", Reply::json(200, "[]"));
        transport.on("/todos?status=in_progress", Reply::json(200, &format!("[{}]", TODO)));
        let (client, _) = test_client(transport);

        assert!(client.list_notes(Some(3)).await.unwrap().is_empty());
        let todos = client.list_todos(Some(TodoStatus::InProgress)).await.unwrap();
        assert_eq!(todos[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_todo_status_patch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/todos/5/status", Reply::json(200, TODO));
        let (client, _) = test_client(transport.clone());

        let todo = client.update_todo_status(5, TodoStatus::Completed).await.unwrap();
        assert!(todo.is_done());
        assert_eq!(transport.json_bodies("/todos/5/status")[0]["status"], "completed");
    }

    #[tokio::test]
    async fn test_curriculum_course_management() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/curriculums/2/courses/3", Reply::json(200, ""));
        transport.on("/curriculums/2/courses/order", Reply::json(204, ""));
        let (client, _) = test_client(transport.clone());

        assert!(client.add_curriculum_course(2, 3).await.unwrap().is_none());
        client.remove_curriculum_course(2, 3).await.unwrap();
        client.reorder_curriculum_courses(2, &[3, 1, 2]).await.unwrap();

        assert_eq!(transport.methods("/curriculums/2/courses/3"), vec![Method::POST, Method::DELETE]);
        assert_eq!(
            transport.json_bodies("/curriculums/2/courses/order")[0]["courseIds"],
            serde_json::json!([3, 1, 2])
        );
    }

    #[tokio::test]
    async fn test_upload_sends_file_and_note_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            "/files/upload",
            Reply::json(200, r#"{"id":1,"noteId":9,"fileName":"slides.pdf","fileType":"application/pdf","fileUrl":"/uploads/u.pdf","fileSize":2048}"#),
        );
        let (client, _) = test_client(transport.clone());

        let attachment = client
            .upload_file(
                9,
                FileUpload {
                    file_name: "slides.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    bytes: vec![0u8; 2048],
                },
            )
            .await
            .unwrap();

        assert_eq!(attachment.size_display(), "2.0 KB");
        let sent = transport.multipart_bodies("/files/upload").pop().unwrap();
        assert_eq!(sent.fields, vec![("noteId".to_string(), "9".to_string())]);
        assert_eq!(sent.files[0].file_name, "slides.pdf");
    }

    #[tokio::test]
    async fn test_category_create() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/categories", Reply::json(200, r#"{"id":1,"userId":1,"name":"Systems"}"#));
        let (client, _) = test_client(transport.clone());

        let category = client.create_category("Systems").await.unwrap();
        assert_eq!(category.name, "Systems");
        assert_eq!(transport.json_bodies("/categories")[0]["name"], "Systems");
    }
}
