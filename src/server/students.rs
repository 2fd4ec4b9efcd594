//! Student record routes. Each cohort gets its own static set of paths, so an
//! unknown cohort slug never reaches a handler.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use super::extract::{ApiKeyAuth, JsonBody};
use super::AppState;
use crate::cohort::Cohort;
use crate::error::AppResult;
use crate::repository::{list_every_cohort, SearchQuery, StudentCandidate};
use crate::storage::StudentPatch;

/// Register the list, create, update, delete and search routes for every cohort.
pub fn cohort_routes(mut router: Router<AppState>) -> Router<AppState> {
    for cohort in Cohort::ALL {
        let slug = cohort.slug();
        router = router
            .route(
                &format!("/{{key}}/students/{slug}"),
                get(move |state: State<AppState>, key: Path<String>| list_cohort(state, key, cohort)),
            )
            .route(
                &format!("/{{key}}/students/post{slug}"),
                post(move |state: State<AppState>, key: Path<String>, body: JsonBody<StudentCandidate>| {
                    create(state, key, body, cohort)
                }),
            )
            .route(
                &format!("/students/{{target}}/{slug}"),
                patch(move |state: State<AppState>, auth: ApiKeyAuth, target: Path<String>, body: JsonBody<StudentPatch>| {
                    update(state, auth, target, body, cohort)
                })
                .delete(move |state: State<AppState>, auth: ApiKeyAuth, target: Path<String>| {
                    delete(state, auth, target, cohort)
                }),
            )
            .route(
                &format!("/search/{slug}"),
                get(move |state: State<AppState>, auth: ApiKeyAuth, query: Query<SearchQuery>| {
                    search(state, auth, query, cohort)
                }),
            );
    }
    router
}

/// Every cohort's records, in year order.
pub async fn list_all(State(state): State<AppState>, Path(key): Path<String>) -> AppResult<Json<Value>> {
    state.keys.resolve(Some(&key)).await?;
    let students = list_every_cohort(&state.registry, state.store_timeout).await?;
    Ok(Json(json!({ "students": students })))
}

pub async fn list_cohort(State(state): State<AppState>, Path(key): Path<String>, cohort: Cohort) -> AppResult<Json<Value>> {
    state.keys.resolve(Some(&key)).await?;
    let students = state.repository(cohort).list_all().await?;
    Ok(Json(json!({ "students": students })))
}

pub async fn create(
    State(state): State<AppState>,
    Path(key): Path<String>,
    JsonBody(candidate): JsonBody<StudentCandidate>,
    cohort: Cohort,
) -> AppResult<(StatusCode, Json<Value>)> {
    let account = state.keys.resolve(Some(&key)).await?;
    let student = state.repository(cohort).create(&candidate).await?;
    info!(cohort = %cohort, account = %account.id, id = %student.id, "student added");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Student added to year {} successfully", cohort.year()),
            "student": student,
        })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    ApiKeyAuth(account): ApiKeyAuth,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<StudentPatch>,
    cohort: Cohort,
) -> AppResult<Json<Value>> {
    let student = state.repository(cohort).update(&id, &patch).await?;
    info!(cohort = %cohort, account = %account.id, id = %student.id, "student updated");
    Ok(Json(json!({
        "message": format!("Student updated in year {}", cohort.year()),
        "student": student,
    })))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiKeyAuth(account): ApiKeyAuth,
    Path(hall_ticket): Path<String>,
    cohort: Cohort,
) -> AppResult<Json<Value>> {
    state.repository(cohort).delete(&hall_ticket).await?;
    info!(cohort = %cohort, account = %account.id, hall_ticket = %hall_ticket, "student deleted");
    Ok(Json(json!({
        "message": format!(
            "Student with Hall Ticket {} deleted successfully from year {}",
            hall_ticket,
            cohort.year()
        ),
    })))
}

pub async fn search(
    State(state): State<AppState>,
    ApiKeyAuth(_): ApiKeyAuth,
    Query(query): Query<SearchQuery>,
    cohort: Cohort,
) -> AppResult<Json<Value>> {
    let student = state.repository(cohort).search(&query).await?;
    Ok(Json(json!(student)))
}
