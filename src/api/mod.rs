pub mod auth;
pub mod response;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::routing::patch;
use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

pub use auth::{AuthUser, Claims};
pub use response::{
    ApiResponse, AssignmentData, AssignmentsData, CoursesData, HealthResponse, StatsData,
};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route("/assignments/stats", get(assignment_stats))
        .route("/assignments/courses", get(list_courses))
        .route(
            "/assignments/{id}",
            get(get_assignment).put(update_assignment).delete(delete_assignment),
        )
        .route("/assignments/{id}/toggle", patch(toggle_assignment));

    Router::new().nest("/api", api).with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(Json(HealthResponse {
        success: true,
        message: "Trackademic API is running",
        timestamp: state.clock.now(),
    }))
}

async fn list_assignments(
    State(state): State<AppState>,
    user: AuthUser,
    filters: Result<Query<AssignmentFilters>, QueryRejection>,
) -> Result<ApiResponse<AssignmentsData>, AppError> {
    let Query(filters) = filters?;
    let assignments =
        repository::fetch_assignments(&state.db, &user.user_id, &filters, state.clock.now()).await?;
    Ok(ApiResponse::data(AssignmentsData { assignments }))
}

async fn create_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<NewAssignmentRequest>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<AssignmentData>), AppError> {
    let Json(req) = payload?;
    let req = req.validate()?;
    let assignment =
        repository::insert_assignment(&state.db, &user.user_id, req, state.clock.now()).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::data(AssignmentData { assignment })
            .with_message("Assignment created successfully"),
    ))
}

async fn assignment_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<StatsData>, AppError> {
    let stats = repository::fetch_stats(&state.db, &user.user_id, state.clock.now()).await?;
    Ok(ApiResponse::data(StatsData { stats }))
}

async fn list_courses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<CoursesData>, AppError> {
    let courses = repository::fetch_courses(&state.db, &user.user_id).await?;
    Ok(ApiResponse::data(CoursesData { courses }))
}

async fn get_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<AssignmentData>, AppError> {
    let assignment = repository::fetch_assignment(&state.db, &user.user_id, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::data(AssignmentData { assignment }))
}

async fn update_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateAssignmentRequest>, JsonRejection>,
) -> Result<ApiResponse<AssignmentData>, AppError> {
    let Json(req) = payload?;
    let req = req.validate()?;
    let assignment =
        repository::update_assignment(&state.db, &user.user_id, &id, req, state.clock.now())
            .await?
            .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::data(AssignmentData { assignment })
        .with_message("Assignment updated successfully"))
}

async fn delete_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    let ok = repository::delete_assignment(&state.db, &user.user_id, &id).await?;
    if ok {
        Ok(ApiResponse::message("Assignment deleted successfully"))
    } else {
        Err(AppError::NotFound)
    }
}

async fn toggle_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<AssignmentData>, AppError> {
    let assignment =
        repository::toggle_assignment(&state.db, &user.user_id, &id, state.clock.now())
            .await?
            .ok_or(AppError::NotFound)?;
    let message = if assignment.is_completed {
        "Assignment marked as complete"
    } else {
        "Assignment marked as pending"
    };
    Ok(ApiResponse::data(AssignmentData { assignment }).with_message(message))
}
