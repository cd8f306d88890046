// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{get, patch, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, auth, chapter, course, quiz, registration, unit},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * `/api/auth`: login, self-registration, registration workflow, admin area.
/// * `/api/courses`, `/api/chapters`, `/api/units`: the curriculum tree.
/// * `/api/quizzes`: quiz CRUD and grading.
///
/// Role gates are layered per group: authentication runs first, then the
/// role check.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let authenticated = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/request-access", post(registration::request_access))
        .route("/check-status", post(registration::check_status))
        .route(
            "/complete-registration",
            post(registration::complete_registration),
        )
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(authenticated.clone()),
        )
        .merge(
            Router::new()
                .route(
                    "/admin/settings",
                    get(admin::get_settings).post(admin::update_settings),
                )
                .route(
                    "/admin/registration-requests",
                    get(registration::list_pending),
                )
                .route(
                    "/admin/approve-request/{id}",
                    post(registration::approve_request),
                )
                .route(
                    "/admin/reject-request/{id}",
                    post(registration::reject_request),
                )
                .route(
                    "/admin/unfreeze-student/{id}",
                    post(admin::unfreeze_student),
                )
                .route("/admin/add-teacher", post(admin::add_teacher))
                .route("/admin/add-student", post(admin::add_student))
                .route("/admin/teachers", get(admin::list_teachers))
                .route(
                    "/admin/teachers/{id}",
                    axum::routing::delete(admin::delete_teacher),
                )
                .route("/admin/students", get(admin::list_students))
                .route(
                    "/admin/students/{id}",
                    axum::routing::delete(admin::delete_student),
                )
                .layer(middleware::from_fn(admin_middleware))
                .layer(authenticated.clone()),
        );

    let course_routes = Router::new()
        .route("/", get(course::list_courses))
        .route("/{id}", get(course::get_course))
        .merge(
            Router::new()
                .route("/", post(course::create_course))
                .route(
                    "/{id}",
                    patch(course::update_course).delete(course::delete_course),
                )
                .route("/{id}/chapters", post(course::add_chapter))
                .route("/{id}/students", get(course::list_students))
                .layer(middleware::from_fn(staff_middleware))
                .layer(authenticated.clone()),
        )
        .merge(
            Router::new()
                .route("/{id}/enroll", post(course::enroll))
                .layer(middleware::from_fn(student_middleware))
                .layer(authenticated.clone()),
        );

    let chapter_routes = Router::new()
        .route(
            "/{id}",
            patch(chapter::update_chapter).delete(chapter::delete_chapter),
        )
        .route("/{id}/units", post(chapter::add_unit))
        .layer(middleware::from_fn(staff_middleware))
        .layer(authenticated.clone());

    let unit_routes = Router::new()
        .route("/{id}", patch(unit::update_unit).delete(unit::delete_unit))
        .layer(middleware::from_fn(staff_middleware))
        .layer(authenticated.clone());

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes))
        .route("/{id}", get(quiz::get_quiz))
        .merge(
            Router::new()
                .route("/", post(quiz::create_quiz))
                .route("/{id}", patch(quiz::update_quiz).delete(quiz::delete_quiz))
                .layer(middleware::from_fn(staff_middleware))
                .layer(authenticated.clone()),
        )
        .merge(
            Router::new()
                .route("/{id}/submit", post(quiz::submit_quiz))
                .layer(authenticated),
        );

    Router::new()
        .route("/", get(|| async { "LMS API is running..." }))
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/chapters", chapter_routes)
        .nest("/api/units", unit_routes)
        .nest("/api/quizzes", quiz_routes)
        // Global middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
