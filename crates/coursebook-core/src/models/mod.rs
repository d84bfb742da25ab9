//! Data models for the learning-management REST resources.
//!
//! - `User`, `AuthResponse`, `TokenPair`: identity and credentials
//! - `Course`, `Note`, `Attachment`, `Todo`: the tracked material
//! - `Curriculum`, `CurriculumCourse`: ordered study plans
//! - `Category`: user-defined course categories
//!
//! Timestamps are kept as the strings the backend sends.

pub mod auth;
pub mod category;
pub mod course;
pub mod curriculum;
pub mod note;
pub mod todo;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest, TokenPair, User};
pub use category::Category;
pub use course::{Course, CourseInput, CourseStatus};
pub use curriculum::{Curriculum, CurriculumCourse, CurriculumInput};
pub use note::{Attachment, Note, NoteInput};
pub use todo::{Priority, Todo, TodoInput, TodoStatus};
