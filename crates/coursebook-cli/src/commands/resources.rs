//! Resource subcommands. List commands read through the local cache unless
//! `--refresh` is given or the cached copy is stale; mutations invalidate
//! the lists they affect.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::app::App;
use crate::{CategoryAction, CourseAction, CurriculumAction, FileAction, NoteAction, TodoAction};
use coursebook_core::api::FileUpload;
use coursebook_core::cache::CachedData;
use coursebook_core::models::{CourseInput, CurriculumInput, NoteInput, TodoInput, TodoStatus};
use coursebook_core::utils::{format_date, format_optional, truncate_string};

const TITLE_WIDTH: usize = 40;

/// Cached list when allowed and fresh
fn cached<T>(refresh: bool, entry: Option<CachedData<Vec<T>>>) -> Option<Vec<T>> {
    let cached = entry.filter(|_| !refresh)?;
    debug!(age = %cached.age_display(), "Using cached data");
    Some(cached.data)
}

fn log_store(result: Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to update cache");
    }
}

fn log_invalidate(result: Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to invalidate cache");
    }
}

// ===== Courses =====

pub async fn courses(app: &mut App, action: CourseAction) -> Result<()> {
    match action {
        CourseAction::List { refresh } => {
            let courses = match cached(refresh, app.cache.load_courses()) {
                Some(items) => items,
                None => {
                    let items = app.connect().await?.list_courses().await?;
                    log_store(app.cache.save_courses(&items));
                    items
                }
            };

            if courses.is_empty() {
                println!("No courses yet. Add one with `coursebook courses add <title>`.");
            }
            for course in courses {
                println!(
                    "{:>5}  {:<width$}  {:<12}  {}",
                    course.id,
                    truncate_string(&course.title, TITLE_WIDTH),
                    course.status.to_string(),
                    course.progress_bar(),
                    width = TITLE_WIDTH
                );
            }
        }
        CourseAction::Show { id } => {
            let course = app.connect().await?.get_course(id).await?;
            println!("{}", course.title);
            println!("Status:   {}", course.status);
            println!("Progress: {}", course.progress_bar());
            println!("Category: {}", format_optional(&course.category, "-"));
            if let Some(start) = course.start_date.as_deref() {
                println!("Started:  {}", format_date(start));
            }
            if let Some(end) = course.end_date.as_deref() {
                println!("Ends:     {}", format_date(end));
            }
            if let Some(description) = course.description.as_deref() {
                println!("\n{}", description);
            }
        }
        CourseAction::Add {
            title,
            description,
            category,
        } => {
            let input = CourseInput {
                title: Some(title),
                description,
                category,
                ..Default::default()
            };
            let course = app.connect().await?.create_course(&input).await?;
            log_invalidate(app.cache.invalidate_courses());
            println!("Created course #{} {}", course.id, course.title);
        }
        CourseAction::Progress { id, percent } => {
            let course = app.connect().await?.update_course_progress(id, percent).await?;
            log_invalidate(app.cache.invalidate_courses());
            println!("{} {}", course.title, course.progress_bar());
        }
        CourseAction::Status { id, status } => {
            let input = CourseInput {
                status: Some(status),
                ..Default::default()
            };
            let course = app.connect().await?.update_course(id, &input).await?;
            log_invalidate(app.cache.invalidate_courses());
            println!("{} is now {}", course.title, course.status);
        }
        CourseAction::Delete { id } => {
            app.connect().await?.delete_course(id).await?;
            log_invalidate(app.cache.invalidate_courses());
            println!("Deleted course #{}", id);
        }
    }
    Ok(())
}

// ===== Notes =====

pub async fn notes(app: &mut App, action: NoteAction) -> Result<()> {
    match action {
        NoteAction::List { course, refresh } => {
            let notes = match cached(refresh, app.cache.load_notes(course)) {
                Some(items) => items,
                None => {
                    let items = app.connect().await?.list_notes(course).await?;
                    log_store(app.cache.save_notes(course, &items));
                    items
                }
            };

            if notes.is_empty() {
                println!("No notes.");
            }
            for note in notes {
                let updated = note.updated_at.as_deref().map(format_date).unwrap_or_default();
                println!(
                    "{:>5}  {:<width$}  {}",
                    note.id,
                    truncate_string(&note.title, TITLE_WIDTH),
                    updated,
                    width = TITLE_WIDTH
                );
            }
        }
        NoteAction::Show { id } => {
            let api = app.connect().await?;
            let note = api.get_note(id).await?;
            let attachments = api.list_attachments(id).await?;
            println!("{}\n", note.title);
            println!("{}", format_optional(&note.content, ""));
            if !attachments.is_empty() {
                println!("\nAttachments:");
                for file in attachments {
                    println!("  #{} {} ({})", file.id, file.file_name, file.size_display());
                }
            }
        }
        NoteAction::Add { title, content, course } => {
            let input = NoteInput {
                title: Some(title),
                content,
                course_id: course,
            };
            let note = app.connect().await?.create_note(&input).await?;
            log_invalidate(app.cache.invalidate_notes());
            println!("Created note #{} {}", note.id, note.title);
        }
        NoteAction::Delete { id } => {
            app.connect().await?.delete_note(id).await?;
            log_invalidate(app.cache.invalidate_notes());
            println!("Deleted note #{}", id);
        }
    }
    Ok(())
}

// ===== Todos =====

pub async fn todos(app: &mut App, action: TodoAction) -> Result<()> {
    match action {
        TodoAction::List { status, refresh } => {
            let mut todos = match cached(refresh, app.cache.load_todos(status)) {
                Some(items) => items,
                None => {
                    let items = app.connect().await?.list_todos(status).await?;
                    log_store(app.cache.save_todos(status, &items));
                    items
                }
            };

            // Open items first, highest priority first
            todos.sort_by(|a, b| a.is_done().cmp(&b.is_done()).then(b.priority.cmp(&a.priority)));
            if todos.is_empty() {
                println!("Nothing to do.");
            }
            for todo in todos {
                let mark = if todo.is_done() { "x" } else { " " };
                let due = todo.due_date.as_deref().map(format_date).unwrap_or_default();
                println!(
                    "[{}] {:>5}  {:<width$}  {:<6}  {}",
                    mark,
                    todo.id,
                    truncate_string(&todo.title, TITLE_WIDTH),
                    todo.priority.to_string(),
                    due,
                    width = TITLE_WIDTH
                );
            }
        }
        TodoAction::Add {
            title,
            priority,
            due,
            course,
        } => {
            let input = TodoInput {
                title: Some(title),
                priority,
                due_date: due,
                course_id: course,
                ..Default::default()
            };
            let todo = app.connect().await?.create_todo(&input).await?;
            log_invalidate(app.cache.invalidate_todos());
            println!("Added todo #{} {}", todo.id, todo.title);
        }
        TodoAction::Status { id, status } => set_todo_status(app, id, status).await?,
        TodoAction::Done { id } => set_todo_status(app, id, TodoStatus::Completed).await?,
        TodoAction::Delete { id } => {
            app.connect().await?.delete_todo(id).await?;
            log_invalidate(app.cache.invalidate_todos());
            println!("Deleted todo #{}", id);
        }
    }
    Ok(())
}

async fn set_todo_status(app: &mut App, id: i64, status: TodoStatus) -> Result<()> {
    let todo = app.connect().await?.update_todo_status(id, status).await?;
    log_invalidate(app.cache.invalidate_todos());
    println!("{} is now {}", todo.title, todo.status);
    Ok(())
}

// ===== Curriculums =====

pub async fn curriculums(app: &mut App, action: CurriculumAction) -> Result<()> {
    match action {
        CurriculumAction::List { refresh } => {
            let curriculums = match cached(refresh, app.cache.load_curriculums()) {
                Some(items) => items,
                None => {
                    let items = app.connect().await?.list_curriculums().await?;
                    log_store(app.cache.save_curriculums(&items));
                    items
                }
            };

            if curriculums.is_empty() {
                println!("No curriculums.");
            }
            for curriculum in curriculums {
                println!(
                    "{:>5}  {:<width$}  {}",
                    curriculum.id,
                    truncate_string(&curriculum.title, TITLE_WIDTH),
                    format_optional(&curriculum.goal, ""),
                    width = TITLE_WIDTH
                );
            }
        }
        CurriculumAction::Add { title, goal } => {
            let input = CurriculumInput {
                title: Some(title),
                goal,
                ..Default::default()
            };
            let curriculum = app.connect().await?.create_curriculum(&input).await?;
            log_invalidate(app.cache.invalidate_curriculums());
            println!("Created curriculum #{} {}", curriculum.id, curriculum.title);
        }
        CurriculumAction::AddCourse { id, course } => {
            app.connect().await?.add_curriculum_course(id, course).await?;
            log_invalidate(app.cache.invalidate_curriculums());
            println!("Added course #{} to curriculum #{}", course, id);
        }
        CurriculumAction::RemoveCourse { id, course } => {
            app.connect().await?.remove_curriculum_course(id, course).await?;
            log_invalidate(app.cache.invalidate_curriculums());
            println!("Removed course #{} from curriculum #{}", course, id);
        }
        CurriculumAction::Reorder { id, courses } => {
            app.connect().await?.reorder_curriculum_courses(id, &courses).await?;
            log_invalidate(app.cache.invalidate_curriculums());
            println!("Reordered curriculum #{}", id);
        }
        CurriculumAction::Delete { id } => {
            app.connect().await?.delete_curriculum(id).await?;
            log_invalidate(app.cache.invalidate_curriculums());
            println!("Deleted curriculum #{}", id);
        }
    }
    Ok(())
}

// ===== Categories =====

pub async fn categories(app: &mut App, action: CategoryAction) -> Result<()> {
    match action {
        CategoryAction::List { refresh } => {
            let categories = match cached(refresh, app.cache.load_categories()) {
                Some(items) => items,
                None => {
                    let items = app.connect().await?.list_categories().await?;
                    log_store(app.cache.save_categories(&items));
                    items
                }
            };

            for category in categories {
                println!("{:>5}  {}", category.id, category.name);
            }
        }
        CategoryAction::Add { name } => {
            let category = app.connect().await?.create_category(&name).await?;
            log_invalidate(app.cache.invalidate_categories());
            println!("Created category #{} {}", category.id, category.name);
        }
        CategoryAction::Delete { id } => {
            app.connect().await?.delete_category(id).await?;
            log_invalidate(app.cache.invalidate_categories());
            println!("Deleted category #{}", id);
        }
    }
    Ok(())
}

// ===== Files =====

pub async fn files(app: &mut App, action: FileAction) -> Result<()> {
    match action {
        FileAction::List { note } => {
            let attachments = app.connect().await?.list_attachments(note).await?;
            if attachments.is_empty() {
                println!("No attachments.");
            }
            for file in attachments {
                println!(
                    "{:>5}  {:<width$}  {:>9}  {}",
                    file.id,
                    truncate_string(&file.file_name, TITLE_WIDTH),
                    file.size_display(),
                    file.file_url,
                    width = TITLE_WIDTH
                );
            }
        }
        FileAction::Upload { note, path } => {
            let upload = read_upload(&path)?;
            let attachment = app.connect().await?.upload_file(note, upload).await?;
            println!("Uploaded {} ({})", attachment.file_name, attachment.size_display());
        }
        FileAction::Delete { id } => {
            app.connect().await?.delete_attachment(id).await?;
            println!("Deleted attachment #{}", id);
        }
    }
    Ok(())
}

fn read_upload(path: &Path) -> Result<FileUpload> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(FileUpload {
        content_type: content_type_for(path).to_string(),
        file_name,
        bytes,
    })
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("slides.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("notes.md")), "text/markdown");
        assert_eq!(content_type_for(Path::new("Makefile")), "application/octet-stream");
    }

    #[test]
    fn test_read_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagram.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let upload = read_upload(&path).unwrap();
        assert_eq!(upload.file_name, "diagram.png");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.bytes, vec![1, 2, 3]);
    }
}
