// src/models/course.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{
    not_blank,
    unit::Unit,
    user::{Role, UserRef, format_username},
};

/// Course row joined with its instructor's identity.
pub const COURSE_SELECT: &str = r#"
    SELECT c.id, c.title, c.description, c.instructor_id,
           u.name AS instructor_name, u.role AS instructor_role,
           c.created_at, c.updated_at
    FROM courses c
    LEFT JOIN users u ON u.id = c.instructor_id
"#;

pub const CHAPTER_COLUMNS: &str = "id, course_id, title, position, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct CourseRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub instructor_id: Option<i64>,
    pub instructor_name: Option<String>,
    pub instructor_role: Option<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseRow {
    fn instructor(&self) -> Option<UserRef> {
        match (self.instructor_id, &self.instructor_name, self.instructor_role) {
            (Some(id), Some(name), Some(role)) => Some(UserRef {
                id,
                username: format_username(name, role),
            }),
            _ => None,
        }
    }
}

/// Represents the 'chapters' table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRow {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chapter with its units, in position order.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    #[serde(flatten)]
    pub chapter: ChapterRow,
    pub units: Vec<Unit>,
}

/// A course with its full curriculum tree and roster ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub instructor: Option<UserRef>,
    pub chapters: Vec<Chapter>,
    pub students: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct EnrollmentRow {
    pub course_id: i64,
    pub user_id: i64,
}

/// Assembles course trees from flat rows.
///
/// Children are attached through their parent-reference column only; rows
/// whose parent is not among the inputs are dropped. Chapters and units keep
/// the order they arrive in, so callers pass them sorted by position.
pub fn assemble(
    courses: Vec<CourseRow>,
    chapters: Vec<ChapterRow>,
    units: Vec<Unit>,
    enrollments: Vec<EnrollmentRow>,
) -> Vec<Course> {
    let mut units_by_chapter: HashMap<i64, Vec<Unit>> = HashMap::new();
    for unit in units {
        units_by_chapter.entry(unit.chapter_id).or_default().push(unit);
    }

    let mut chapters_by_course: HashMap<i64, Vec<Chapter>> = HashMap::new();
    for chapter in chapters {
        let units = units_by_chapter.remove(&chapter.id).unwrap_or_default();
        chapters_by_course
            .entry(chapter.course_id)
            .or_default()
            .push(Chapter { chapter, units });
    }

    let mut students_by_course: HashMap<i64, Vec<i64>> = HashMap::new();
    for enrollment in enrollments {
        students_by_course
            .entry(enrollment.course_id)
            .or_default()
            .push(enrollment.user_id);
    }

    courses
        .into_iter()
        .map(|row| Course {
            instructor: row.instructor(),
            chapters: chapters_by_course.remove(&row.id).unwrap_or_default(),
            students: students_by_course.remove(&row.id).unwrap_or_default(),
            id: row.id,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200), custom(function = not_blank))]
    pub title: String,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    /// Admin only: assign a teacher instead of the caller.
    pub instructor_id: Option<i64>,
}

/// DTO for updating a course. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200), custom(function = not_blank))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    pub instructor_id: Option<i64>,
}

/// DTO for creating or renaming a chapter.
#[derive(Debug, Deserialize, Validate)]
pub struct ChapterRequest {
    #[validate(length(min = 1, max = 200), custom(function = not_blank))]
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::unit::UnitContent;

    fn course(id: i64) -> CourseRow {
        CourseRow {
            id,
            title: format!("Course {}", id),
            description: None,
            instructor_id: Some(9),
            instructor_name: Some("grace".into()),
            instructor_role: Some(Role::Teacher),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn chapter(id: i64, course_id: i64, position: i64) -> ChapterRow {
        ChapterRow {
            id,
            course_id,
            title: format!("Chapter {}", id),
            position,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn unit(id: i64, chapter_id: i64) -> Unit {
        Unit {
            id,
            chapter_id,
            title: format!("Unit {}", id),
            content: UnitContent::Text { text: "body".into() },
            position: id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn children_attach_by_parent_reference() {
        let courses = assemble(
            vec![course(1), course(2)],
            vec![chapter(10, 1, 1), chapter(11, 1, 2), chapter(20, 2, 1)],
            vec![unit(100, 10), unit(101, 10), unit(200, 20)],
            vec![
                EnrollmentRow { course_id: 1, user_id: 5 },
                EnrollmentRow { course_id: 1, user_id: 6 },
            ],
        );

        assert_eq!(courses.len(), 2);
        let first = &courses[0];
        assert_eq!(
            first.chapters.iter().map(|c| c.chapter.id).collect::<Vec<_>>(),
            vec![10, 11]
        );
        assert_eq!(first.chapters[0].units.len(), 2);
        assert!(first.chapters[1].units.is_empty());
        assert_eq!(first.students, vec![5, 6]);
        assert_eq!(first.instructor.as_ref().unwrap().username, "grace@teacher");

        let second = &courses[1];
        assert_eq!(second.chapters[0].units[0].id, 200);
        assert!(second.students.is_empty());
    }

    #[test]
    fn orphans_are_unreachable() {
        let courses = assemble(
            vec![course(1)],
            vec![chapter(10, 1, 1)],
            vec![unit(100, 10), unit(999, 42)],
            vec![],
        );
        let reachable: Vec<i64> = courses[0]
            .chapters
            .iter()
            .flat_map(|c| c.units.iter().map(|u| u.id))
            .collect();
        assert_eq!(reachable, vec![100]);
    }

    #[test]
    fn course_without_instructor_serializes_null() {
        let mut row = course(3);
        row.instructor_id = None;
        row.instructor_name = None;
        row.instructor_role = None;
        let courses = assemble(vec![row], vec![], vec![], vec![]);
        let value = serde_json::to_value(&courses[0]).unwrap();
        assert!(value["instructor"].is_null());
        assert_eq!(value["chapters"], serde_json::json!([]));
    }
}
