use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Query, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use openpath_data_management::{
    analysis::{
        durations::{aggregate_durations, DurationReport},
        segment_crossing::{MatchOrder, SegmentQuery},
    },
    map_data::{MapData, MapMode},
    push::{PushPlan, PushRequest, Receivers},
    statistics::DailyCount,
    DataManagerError,
};
use openpath_lib::{
    permissions::Permissions,
    segment_crossing::SegmentCrossing,
    table::Row,
    time_range::{TimeRange, TimezoneMode},
    token::{Token, TokenRequest},
    zone::{Zone, ZoneShape},
    ModelError,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{
    auth::require_auth,
    error::{ApiError, ApiResult},
    server_state::ServerState,
};

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/uuids", get(uuids))
        .route("/trips", get(trips))
        .route("/demographics", get(demographics))
        .route("/trajectories", get(trajectories))
        .route("/tokens", get(tokens).post(generate_tokens))
        .route("/push", post(push))
        .route("/map/trips", get(map_trips))
        .route("/stats/summary", get(summary))
        .route("/stats/signups", get(signups))
        .route("/stats/trips", get(trip_trend))
        .route("/segment_trip_time", post(segment_trip_time))
        .route("/permissions", get(permissions))
        .route("/permissions/refresh", post(refresh_permissions))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        DataManagerError::from(err).into()
    }
}

/// Optional date filter shared by the table endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub timezone: TimezoneMode,
}

impl DateQuery {
    fn range(&self) -> Result<TimeRange, ApiError> {
        Ok(TimeRange::from_dates(self.start_date, self.end_date, self.timezone)?)
    }
}

/// Current permissions if `allowed` grants the request.
async fn permitted(state: &ServerState, allowed: impl Fn(&Permissions) -> bool) -> Result<Permissions, ApiError> {
    let permissions = state.permissions().await;
    if allowed(&permissions) {
        Ok(permissions)
    } else {
        Err(ApiError::Forbidden)
    }
}

pub async fn uuids(State(state): State<Arc<ServerState>>, Query(query): Query<DateQuery>) -> ApiResult<Vec<Row>> {
    let permissions = permitted(&state, |p| p.data_uuids).await?;
    Ok(Json(state.data_manager.query_uuids(&permissions, &query.range()?).await?))
}

pub async fn trips(State(state): State<Arc<ServerState>>, Query(query): Query<DateQuery>) -> ApiResult<Vec<Row>> {
    let permissions = permitted(&state, |p| p.data_trips).await?;
    Ok(Json(state.data_manager.query_confirmed_trips(&permissions, &query.range()?).await?))
}

pub async fn demographics(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<Row>> {
    permitted(&state, |p| p.data_demographics).await?;
    Ok(Json(state.data_manager.query_demographics().await?))
}

pub async fn trajectories(State(state): State<Arc<ServerState>>, Query(query): Query<DateQuery>) -> ApiResult<Vec<Row>> {
    let permissions = permitted(&state, |p| p.data_trajectories).await?;
    Ok(Json(state.data_manager.query_trajectories(&permissions, &query.range()?).await?))
}

pub async fn tokens(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<Token>> {
    permitted(&state, |p| p.token_generate).await?;
    Ok(Json(state.data_manager.query_tokens().await?))
}

pub async fn generate_tokens(State(state): State<Arc<ServerState>>, Json(request): Json<TokenRequest>) -> ApiResult<Vec<Token>> {
    let permissions = permitted(&state, |p| p.token_generate).await?;
    Ok(Json(state.data_manager.generate_tokens(&permissions, &request).await?))
}

pub async fn push(State(state): State<Arc<ServerState>>, Json(request): Json<PushRequest>) -> ApiResult<PushPlan> {
    permitted(&state, |p| match request.receivers {
        Receivers::All => p.push_send,
        Receivers::Emails(_) => p.push_send && p.options_emails,
        Receivers::Uuids(_) => p.push_send && p.options_uuids,
    }).await?;
    Ok(Json(state.data_manager.prepare_push(&request).await?))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapQuery {
    #[serde(default)]
    pub mode: MapMode,
    #[serde(flatten)]
    pub dates: DateQuery,
}

pub async fn map_trips(State(state): State<Arc<ServerState>>, Query(query): Query<MapQuery>) -> ApiResult<MapData> {
    permitted(&state, |p| match query.mode {
        MapMode::Lines => p.map_trip_lines,
        MapMode::Heatmap => p.map_heatmap,
        MapMode::Bubble => p.map_bubble,
    }).await?;
    Ok(Json(state.data_manager.map_data(&query.dates.range()?, query.mode).await?))
}

/// Overview cards, each present only when its permission is on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_users_today: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trips: Option<usize>,
}

pub async fn summary(State(state): State<Arc<ServerState>>, Query(query): Query<DateQuery>) -> ApiResult<SummaryResponse> {
    let permissions = permitted(&state, |p| p.overview_users || p.overview_active_users || p.overview_trips).await?;
    let stats = state.data_manager.summary_stats(&query.range()?, Utc::now().date_naive()).await?;

    Ok(Json(SummaryResponse {
        total_users: permissions.overview_users.then_some(stats.total_users),
        new_users_today: permissions.overview_users.then_some(stats.new_users_today),
        active_users: permissions.overview_active_users.then_some(stats.active_users),
        trips: permissions.overview_trips.then_some(stats.trips),
    }))
}

pub async fn signups(State(state): State<Arc<ServerState>>, Query(query): Query<DateQuery>) -> ApiResult<Vec<DailyCount>> {
    permitted(&state, |p| p.overview_signup_trends).await?;
    Ok(Json(state.data_manager.signup_trend(&query.range()?).await?))
}

pub async fn trip_trend(State(state): State<Arc<ServerState>>, Query(query): Query<DateQuery>) -> ApiResult<Vec<DailyCount>> {
    permitted(&state, |p| p.overview_trips_trend).await?;
    Ok(Json(state.data_manager.trip_trend(&query.range()?).await?))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentTimeRequest {
    pub start: ZoneShape,
    pub end: ZoneShape,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub timezone: TimezoneMode,
    #[serde(default)]
    pub match_order: MatchOrder,
}

/// `report` is absent both when nothing crossed and when too few users did.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentTimeResponse {
    pub report: Option<DurationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crossings: Option<Vec<SegmentCrossing>>,
}

pub async fn segment_trip_time(State(state): State<Arc<ServerState>>, Json(request): Json<SegmentTimeRequest>) -> ApiResult<SegmentTimeResponse> {
    let permissions = permitted(&state, |p| p.segment_trip_time).await?;

    let query = SegmentQuery {
        start_zone: Zone::try_from(request.start)?,
        end_zone: Zone::try_from(request.end)?,
        range: TimeRange::from_dates(request.start_date, request.end_date, request.timezone)?,
        excluded_user_ids: permissions.excluded_uuids.iter().cloned().collect::<HashSet<_>>(),
        min_distinct_users: permissions.segment_trip_time_min_users,
        match_order: request.match_order,
    };

    let crossings = state.data_manager.query_segments_crossing_endpoints(&query).await?;
    let report = aggregate_durations(&crossings);
    let crossings = (permissions.segment_trip_time_full_trips && report.is_some()).then_some(crossings);

    Ok(Json(SegmentTimeResponse { report, crossings }))
}

pub async fn permissions(State(state): State<Arc<ServerState>>) -> Json<Permissions> {
    Json(state.permissions().await)
}

pub async fn refresh_permissions(State(state): State<Arc<ServerState>>) -> ApiResult<Permissions> {
    Ok(Json(state.refresh_permissions().await?))
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use chrono::{DateTime, TimeZone};
    use openpath_data_management::DataManager;
    use openpath_lib::{location_ping::LocationPing, motion_mode::MotionMode, user::UserEntry};

    use super::*;
    use crate::config::ServerConfig;

    async fn state() -> Arc<ServerState> {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        let data_manager = DataManager::in_memory().await.unwrap();
        Arc::new(ServerState::new(data_manager, config).await.unwrap())
    }

    async fn set_permissions(state: &ServerState, permissions: Permissions) {
        *state.permissions.write().await = permissions;
    }

    fn ping(section: &str, user: &str, ts: DateTime<Utc>, idx: i64, [longitude, latitude]: [f64; 2]) -> LocationPing {
        LocationPing {
            section_id: section.into(),
            user_id: user.into(),
            timestamp: ts,
            fmt_time: ts.to_rfc3339(),
            longitude,
            latitude,
            idx,
            mode: MotionMode::Bicycling,
        }
    }

    const HOME: [f64; 2] = [12.50, 55.60];
    const WORK: [f64; 2] = [12.60, 55.70];

    async fn seed_crossings(state: &ServerState) {
        let mut pings = Vec::new();
        for (n, user) in ["u1", "u2", "u2"].iter().enumerate() {
            let start = Utc.with_ymd_and_hms(2023, 5, 1 + n as u32, 8, 0, 0).unwrap();
            let section = format!("s{n}");
            pings.push(ping(&section, user, start, 0, HOME));
            pings.push(ping(&section, user, start + chrono::Duration::minutes(20 + n as i64), 1, WORK));
        }
        state.data_manager.insert_locations(&pings).await.unwrap();
    }

    fn segment_request() -> SegmentTimeRequest {
        serde_json::from_value(serde_json::json!({
            "start": { "center": HOME, "radius": 200.0 },
            "end": { "center": WORK, "radius": 200.0 },
        })).unwrap()
    }

    #[tokio::test]
    async fn segment_time_reports_medians() {
        let state = state().await;
        seed_crossings(&state).await;

        let Json(response) = segment_trip_time(State(state.clone()), Json(segment_request())).await.unwrap();

        let report = response.report.unwrap();
        assert_eq!(report.trip_count, 3);
        assert_eq!(report.median_seconds, 21.0 * 60.0);
        assert_eq!(response.crossings.map(|c| c.len()), Some(3));
    }

    #[tokio::test]
    async fn segment_time_is_empty_below_user_floor() {
        let state = state().await;
        seed_crossings(&state).await;
        set_permissions(&state, Permissions {
            segment_trip_time: true,
            segment_trip_time_min_users: 3,
            ..Permissions::default()
        }).await;

        let Json(response) = segment_trip_time(State(state.clone()), Json(segment_request())).await.unwrap();

        assert!(response.report.is_none());
        assert!(response.crossings.is_none());
    }

    #[tokio::test]
    async fn excluded_users_are_left_out() {
        let state = state().await;
        seed_crossings(&state).await;
        set_permissions(&state, Permissions {
            segment_trip_time: true,
            excluded_uuids: vec!["u2".into()],
            ..Permissions::default()
        }).await;

        let Json(response) = segment_trip_time(State(state.clone()), Json(segment_request())).await.unwrap();

        assert_eq!(response.report.unwrap().trip_count, 1);
        assert!(response.crossings.is_none());
    }

    #[tokio::test]
    async fn disabled_pages_are_forbidden() {
        let state = state().await;
        set_permissions(&state, Permissions::default()).await;

        let err = uuids(State(state.clone()), Query(DateQuery::default())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err = segment_trip_time(State(state.clone()), Json(segment_request())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn reversed_dates_are_bad_requests() {
        let state = state().await;
        let query = DateQuery {
            start_date: NaiveDate::from_ymd_opt(2023, 5, 2),
            end_date: NaiveDate::from_ymd_opt(2023, 5, 1),
            timezone: TimezoneMode::Utc,
        };

        let err = trips(State(state), Query(query)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn summary_hides_cards_without_permission() {
        let state = state().await;
        state.data_manager.insert_users(&[UserEntry::new("u1".into(), "a".into(), Utc::now())]).await.unwrap();
        set_permissions(&state, Permissions { overview_users: true, ..Permissions::default() }).await;

        let Json(response) = summary(State(state), Query(DateQuery::default())).await.unwrap();

        assert_eq!(response, SummaryResponse {
            total_users: Some(1),
            new_users_today: Some(1),
            active_users: None,
            trips: None,
        });
    }

    #[tokio::test]
    async fn push_to_uuids_needs_uuid_option() {
        let state = state().await;
        state.data_manager.insert_users(&[UserEntry::new("u1".into(), "a".into(), Utc::now())]).await.unwrap();
        set_permissions(&state, Permissions { push_send: true, ..Permissions::default() }).await;

        let request = PushRequest {
            receivers: Receivers::Uuids(vec!["u1".into()]),
            title: "Hello".into(),
            message: "World".into(),
        };
        let err = push(State(state.clone()), Json(request.clone())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let Json(plan) = push(State(state), Json(PushRequest { receivers: Receivers::All, ..request })).await.unwrap();
        assert_eq!(plan.recipients, vec!["u1"]);
    }

    #[tokio::test]
    async fn refresh_without_study_is_permissive() {
        let state = state().await;
        set_permissions(&state, Permissions::default()).await;

        let Json(refreshed) = refresh_permissions(State(state.clone())).await.unwrap();

        assert_eq!(refreshed, Permissions::permissive());
        assert_eq!(permissions(State(state)).await.0, Permissions::permissive());
    }
}
