use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use weather_store::{
    Account, NewAccount, PrecipitationSummary, Reading, ReadingInput, ReadingPresentation,
    ReadingSnapshot, Role, TemperatureSummary, TimeRange,
};

use crate::error::AppError;
use crate::state::AppState;

const TEACHERS: &[Role] = &[Role::Teacher];
const READERS: &[Role] = &[Role::Teacher, Role::Student];
const SENSORS: &[Role] = &[Role::Teacher, Role::Sensor];

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(rename = "UserName", alias = "userName")]
    pub user_name: String,
    #[serde(rename = "Email", alias = "email")]
    pub email: String,
    #[serde(rename = "Role", alias = "role")]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LastAccessQuery {
    pub role: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceRenameQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub device_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PrecipitationQuery {
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub term: String,
}

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    #[serde(default)]
    pub device_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadingQuery {
    #[serde(default)]
    pub device_name: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Affected {
    pub affected: u64,
}

/// Runs `operation` on the blocking pool after the gate has accepted the
/// request's credential for one of `roles`. Nothing in `operation` runs for
/// a rejected request.
async fn authorized<F, R>(
    state: &Arc<AppState>,
    headers: HeaderMap,
    roles: &'static [Role],
    operation: F,
) -> Result<R, AppError>
where
    F: FnOnce(&AppState) -> Result<R, AppError> + Send + 'static,
    R: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        state.gate.authorize(&headers, roles)?;
        operation(&state)
    })
    .await
    .map_err(|err| AppError::internal(err.to_string()))?
}

fn required_text(value: &str, message: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(message));
    }
    Ok(())
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = authorized(&state, headers, TEACHERS, move |state| {
        let Json(request) = payload?;
        let role: Role = request.role.parse()?;
        Ok(state.accounts.create_account(NewAccount {
            name: request.user_name,
            email: request.email,
            role,
        })?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        if state.accounts.delete_by_id(&id)? {
            info!(account_id = %id, "account deleted");
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(AppError::not_found(format!("no account with id {id}")))
        }
    })
    .await
}

pub async fn delete_users_by_last_access(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<LastAccessQuery>, QueryRejection>,
) -> Result<Json<Affected>, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        let Query(query) = query?;
        let role = match query.role.as_deref().map(str::trim) {
            None | Some("") => Role::Student,
            Some(text) => text.parse()?,
        };
        let range = TimeRange::inclusive(query.start, query.end);
        let affected = state
            .accounts
            .delete_by_role_and_last_access_range(role, &range)?;
        Ok(Json(Affected { affected }))
    })
    .await
}

pub async fn update_roles_by_creation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RoleUpdateQuery>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        let Query(query) = query?;
        let range = TimeRange::ordered(query.start, query.end)?;
        let role = query.role.unwrap_or_default();
        required_text(&role, "The new access level must be provided.")?;
        let role: Role = role.parse()?;
        state.accounts.update_role_by_creation_range(&range, role)?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Reading>>, AppError> {
    authorized(&state, headers, READERS, |state| {
        Ok(Json(state.telemetry.find_all()?))
    })
    .await
}

pub async fn get_reading(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Reading>, AppError> {
    authorized(&state, headers, READERS, move |state| {
        Ok(Json(state.telemetry.find_by_id(&id)?))
    })
    .await
}

pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ReadingInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), AppError> {
    let reading = authorized(&state, headers, SENSORS, move |state| {
        let Json(input) = payload?;
        Ok(state.telemetry.insert_one(input)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

pub async fn create_readings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Vec<ReadingInput>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Reading>>), AppError> {
    let readings = authorized(&state, headers, SENSORS, move |state| {
        let Json(inputs) = payload?;
        Ok(state.telemetry.insert_many(inputs)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(readings)))
}

pub async fn batch_insert_precipitation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Vec<ReadingInput>>, JsonRejection>,
) -> Result<Json<Affected>, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        let Json(inputs) = payload?;
        let stored = state.telemetry.insert_many(inputs)?;
        Ok(Json(Affected {
            affected: stored.len() as u64,
        }))
    })
    .await
}

pub async fn update_reading(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ReadingInput>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        let Json(input) = payload?;
        state.telemetry.update_fields(&id, input)?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

pub async fn delete_reading(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        if state.telemetry.delete_by_id(&id)? {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(AppError::not_found(format!("no reading with id {id}")))
        }
    })
    .await
}

pub async fn delete_readings_by_time(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Affected>, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        let Query(query) = query?;
        let range = TimeRange::ordered(query.start, query.end)?;
        let affected = state.telemetry.delete_by_time_range(&range)?;
        Ok(Json(Affected { affected }))
    })
    .await
}

pub async fn rename_device(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<DeviceRenameQuery>, QueryRejection>,
) -> Result<Json<Affected>, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        let Query(query) = query?;
        required_text(&query.device_name, "The device name must be provided.")?;
        let range = TimeRange::inclusive(query.start, query.end);
        let affected = state
            .telemetry
            .bulk_set_device_name_by_time_range(&range, &query.device_name)?;
        Ok(Json(Affected { affected }))
    })
    .await
}

pub async fn update_precipitation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    query: Result<Query<PrecipitationQuery>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    authorized(&state, headers, TEACHERS, move |state| {
        let Query(query) = query?;
        state.telemetry.update_precipitation_by_id(&id, query.value)?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

pub async fn search_readings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Reading>>, AppError> {
    authorized(&state, headers, READERS, move |state| {
        let Query(query) = query?;
        Ok(Json(state.telemetry.search(&query.term)?))
    })
    .await
}

pub async fn max_precipitation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Json<PrecipitationSummary>, AppError> {
    authorized(&state, headers, READERS, move |state| {
        let Query(query) = query?;
        required_text(&query.device_name, "Device name must be provided.")?;
        Ok(Json(
            state
                .telemetry
                .max_precipitation_for_device(&query.device_name)?,
        ))
    })
    .await
}

pub async fn max_temperature(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<TemperatureSummary>>, AppError> {
    authorized(&state, headers, READERS, move |state| {
        let Query(query) = query?;
        let range = TimeRange::ordered(query.start, query.end)?;
        Ok(Json(
            state.telemetry.max_temperature_per_device_in_range(&range)?,
        ))
    })
    .await
}

pub async fn find_reading(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<ReadingQuery>, QueryRejection>,
) -> Result<Json<ReadingSnapshot>, AppError> {
    authorized(&state, headers, READERS, move |state| {
        let Query(query) = query?;
        required_text(&query.device_name, "The device name must be provided.")?;
        Ok(Json(state.telemetry.find_by_device_and_exact_timestamp(
            &query.device_name,
            &query.time,
        )?))
    })
    .await
}

pub async fn newest_per_temperature(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ReadingPresentation>>, AppError> {
    authorized(&state, headers, READERS, |state| {
        Ok(Json(state.telemetry.newest_per_temperature()?))
    })
    .await
}
