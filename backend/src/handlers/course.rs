// src/handlers/course.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    db,
    error::{AppError, is_unique_violation},
    models::{
        course::{
            CHAPTER_COLUMNS, COURSE_SELECT, Chapter, ChapterRequest, ChapterRow, Course, CourseRow,
            CreateCourseRequest, EnrollmentRow, UpdateCourseRequest, assemble,
        },
        unit::{UNIT_COLUMNS, Unit, UnitRow},
        user::{Role, User, UserRef, format_username},
    },
    utils::html::clean_optional,
};

/// Checks that `user` may modify course `course_id`.
///
/// Admins may modify any course, teachers only the ones they instruct.
pub(crate) async fn authorize_course<'e, E>(
    executor: E,
    user: &User,
    course_id: i64,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let instructor_id =
        sqlx::query_scalar::<_, Option<i64>>("SELECT instructor_id FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    if user.is_admin() || instructor_id == Some(user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the course instructor or an admin can modify this course".to_string(),
        ))
    }
}

/// Loads course trees, either all of them or the one with `course_id`.
///
/// Chapter and unit lists are derived from the children's parent columns.
async fn load_courses(pool: &SqlitePool, course_id: Option<i64>) -> Result<Vec<Course>, AppError> {
    let sql = format!(
        "{} WHERE (? IS NULL OR c.id = ?) ORDER BY c.created_at, c.id",
        COURSE_SELECT
    );
    let courses = sqlx::query_as::<_, CourseRow>(&sql)
        .bind(course_id)
        .bind(course_id)
        .fetch_all(pool)
        .await?;

    let sql = format!(
        "SELECT {} FROM chapters WHERE (? IS NULL OR course_id = ?) \
         ORDER BY course_id, position, id",
        CHAPTER_COLUMNS
    );
    let chapters = sqlx::query_as::<_, ChapterRow>(&sql)
        .bind(course_id)
        .bind(course_id)
        .fetch_all(pool)
        .await?;

    let sql = format!(
        "SELECT {} FROM units WHERE chapter_id IN \
         (SELECT id FROM chapters WHERE ? IS NULL OR course_id = ?) \
         ORDER BY chapter_id, position, id",
        UNIT_COLUMNS
    );
    let units = sqlx::query_as::<_, UnitRow>(&sql)
        .bind(course_id)
        .bind(course_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(UnitRow::into_unit)
        .collect::<Result<Vec<Unit>, _>>()?;

    let enrollments = sqlx::query_as::<_, EnrollmentRow>(
        "SELECT course_id, user_id FROM enrollments WHERE (? IS NULL OR course_id = ?) \
         ORDER BY enrolled_at, user_id",
    )
    .bind(course_id)
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(assemble(courses, chapters, units, enrollments))
}

async fn load_course(pool: &SqlitePool, id: i64) -> Result<Course, AppError> {
    load_courses(pool, Some(id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
}

/// Resolves an admin-supplied instructor id; it must name a teacher.
async fn resolve_instructor(pool: &SqlitePool, instructor_id: i64) -> Result<i64, AppError> {
    match db::fetch_user(pool, instructor_id).await? {
        Some(user) if user.role == Role::Teacher => Ok(user.id),
        _ => Err(AppError::BadRequest(
            "instructorId must reference a teacher".to_string(),
        )),
    }
}

/// Lists all courses with their chapters, units and roster ids. Public.
pub async fn list_courses(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_courses(&pool, None).await?))
}

/// Retrieves a single course tree. Public.
pub async fn get_course(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_course(&pool, id).await?))
}

/// Creates a course taught by the caller.
/// Admins may assign a teacher through `instructorId`.
pub async fn create_course(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let instructor_id = match payload.instructor_id {
        Some(_) if !user.is_admin() => {
            return Err(AppError::Forbidden(
                "Only admins can assign an instructor".to_string(),
            ));
        }
        Some(id) => resolve_instructor(&pool, id).await?,
        None => user.id,
    };

    let now = Utc::now();
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO courses (title, description, instructor_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.title.trim())
    .bind(clean_optional(payload.description.as_deref()))
    .bind(instructor_id)
    .bind(now)
    .bind(now)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!("{} created course {}", user.username(), id);

    Ok((StatusCode::CREATED, Json(load_course(&pool, id).await?)))
}

/// Updates a course. Fields are optional.
pub async fn update_course(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    authorize_course(&pool, &user, id).await?;

    let instructor_id = match payload.instructor_id {
        Some(_) if !user.is_admin() => {
            return Err(AppError::Forbidden(
                "Only admins can assign an instructor".to_string(),
            ));
        }
        Some(instructor) => Some(resolve_instructor(&pool, instructor).await?),
        None => None,
    };

    if payload.title.is_none() && payload.description.is_none() && instructor_id.is_none() {
        return Ok(Json(load_course(&pool, id).await?));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE courses SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.trim().to_string());
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_optional(Some(&description)));
    }

    if let Some(instructor_id) = instructor_id {
        separated.push("instructor_id = ");
        separated.push_bind_unseparated(instructor_id);
    }

    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now());

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update course: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(load_course(&pool, id).await?))
}

/// Deletes a course together with its chapters, units and enrollments.
pub async fn delete_course(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    authorize_course(&pool, &user, id).await?;

    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete course: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    tracing::info!("{} deleted course {}", user.username(), id);
    Ok(Json(json!({ "message": "Course deleted" })))
}

/// Appends a chapter to a course.
///
/// The parent check, position assignment and insert share one transaction.
pub async fn add_chapter(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(course_id): Path<i64>,
    Json(payload): Json<ChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = db::begin_write(&pool).await?;

    authorize_course(&mut *tx, &user, course_id).await?;

    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO chapters (course_id, title, position, created_at, updated_at)
        VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM chapters WHERE course_id = ?), ?, ?)
        RETURNING {}
        "#,
        CHAPTER_COLUMNS
    );
    let chapter = sqlx::query_as::<_, ChapterRow>(&sql)
        .bind(course_id)
        .bind(payload.title.trim())
        .bind(course_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query("UPDATE courses SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(Chapter {
            chapter,
            units: Vec::new(),
        }),
    ))
}

/// Enrolls the calling student in a course.
pub async fn enroll(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    sqlx::query("INSERT INTO enrollments (course_id, user_id, enrolled_at) VALUES (?, ?, ?)")
        .bind(course_id)
        .bind(user.id)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Already enrolled".to_string())
            } else {
                tracing::error!("Failed to enroll: {:?}", e);
                AppError::from(e)
            }
        })?;

    tracing::info!("{} enrolled in course {}", user.username(), course_id);
    Ok(Json(json!({ "message": "Enrolled successfully" })))
}

#[derive(sqlx::FromRow)]
struct RosterRow {
    id: i64,
    name: String,
    role: Role,
}

/// Lists the students enrolled in a course. Admin or teacher.
pub async fn list_students(
    State(pool): State<SqlitePool>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let rows = sqlx::query_as::<_, RosterRow>(
        r#"
        SELECT u.id, u.name, u.role
        FROM enrollments e
        JOIN users u ON u.id = e.user_id
        WHERE e.course_id = ?
        ORDER BY e.enrolled_at, u.id
        "#,
    )
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    let students: Vec<UserRef> = rows
        .into_iter()
        .map(|row| UserRef {
            id: row.id,
            username: format_username(&row.name, row.role),
        })
        .collect();

    Ok(Json(students))
}
