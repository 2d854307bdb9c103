//! JSON API over the assignment engine and the admin services.
//!
//! Every handler resolves a correlation id first (taken from the
//! `x-correlation-id` header or freshly generated) and reports failures as
//! `{ error, detail, correlation_id }`.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadflow_core::config::RoutingConfig;
use leadflow_core::{
    ApplicationError, Contact, ContactDirectory, ContactId, DomainError, InterfaceError,
    LeadDistributor, LeadWithContacts, Operator, OperatorAdmin, OperatorChanges, OperatorId,
    OperatorSourceWeight, Source, SourceAdmin, SourceId, Stores, WeightAssignment,
};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    pub distributor: LeadDistributor,
    pub operators: Arc<OperatorAdmin>,
    pub sources: Arc<SourceAdmin>,
    pub directory: Arc<ContactDirectory>,
}

impl ApiState {
    pub fn new(stores: Stores, distributor: LeadDistributor, routing: &RoutingConfig) -> Self {
        Self {
            distributor,
            operators: Arc::new(OperatorAdmin::new(
                stores.operators.clone(),
                routing.default_max_active_leads,
            )),
            sources: Arc::new(SourceAdmin::new(
                stores.sources.clone(),
                stores.operators.clone(),
                stores.weights.clone(),
            )),
            directory: Arc::new(ContactDirectory::new(stores.leads, stores.contacts)),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/v1/contacts", post(create_contact))
        .route("/api/v1/contacts/", post(create_contact))
        .route("/api/v1/contacts/{id}/status", put(update_contact_status))
        .route("/api/v1/operators", post(create_operator).get(list_operators))
        .route("/api/v1/operators/", post(create_operator).get(list_operators))
        .route("/api/v1/operators/{id}", patch(update_operator).get(get_operator))
        .route("/api/v1/operators/{id}/status", put(update_operator_status))
        .route("/api/v1/sources", post(create_source).get(list_sources))
        .route("/api/v1/sources/", post(create_source).get(list_sources))
        .route("/api/v1/sources/{id}/weights", get(source_weights).put(replace_source_weights))
        .route("/api/v1/leads/{external_id}", get(lead_with_contacts))
        .with_state(state)
}

/// Correlation id for one request.
#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= 128);

        Ok(Self(supplied.map_or_else(|| Uuid::new_v4().to_string(), str::to_string)))
    }
}

pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

impl ApiError {
    fn from_app(error: ApplicationError, correlation_id: &CorrelationId) -> Self {
        Self(error.into_interface(correlation_id.0.clone()))
    }

    fn bad_request(message: impl Into<String>, correlation_id: &CorrelationId) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.0.clone(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(
                event_name = "api.request.failed",
                correlation_id = self.0.correlation_id(),
                status = status.as_u16(),
                detail = self.0.message(),
                "request failed"
            );
        } else {
            tracing::info!(
                event_name = "api.request.rejected",
                correlation_id = self.0.correlation_id(),
                status = status.as_u16(),
                detail = self.0.message(),
                "request rejected"
            );
        }

        let body = ErrorBody {
            error: self.0.user_message().to_string(),
            detail: self.0.message().to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &CorrelationId,
) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text(), correlation_id))
}

fn query_params<T>(
    query: Result<Query<T>, QueryRejection>,
    correlation_id: &CorrelationId,
) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text(), correlation_id))
}

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub lead_external_id: String,
    pub source_id: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub id: i64,
    pub lead_id: i64,
    pub source_id: i64,
    pub operator_id: Option<i64>,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id.0,
            lead_id: contact.lead_id.0,
            source_id: contact.source_id.0,
            operator_id: contact.operator_id.map(|id| id.0),
            message: contact.message,
            status: contact.status.as_str().to_string(),
            created_at: contact.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOperatorRequest {
    pub name: String,
    #[serde(default)]
    pub max_active_leads: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOperatorRequest {
    pub name: Option<String>,
    pub status: Option<String>,
    pub max_active_leads: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OperatorResponse {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub max_active_leads: u32,
}

impl From<Operator> for OperatorResponse {
    fn from(operator: Operator) -> Self {
        Self {
            id: operator.id.0,
            name: operator.name,
            status: operator.status.as_str().to_string(),
            max_active_leads: operator.max_active_leads,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdated {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSourceRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl From<Source> for SourceResponse {
    fn from(source: Source) -> Self {
        Self { id: source.id.0, name: source.name, description: source.description }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplaceWeightsRequest {
    pub weights: Vec<WeightAssignment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeightResponse {
    pub operator_id: i64,
    pub source_id: i64,
    pub weight: u32,
}

impl From<OperatorSourceWeight> for WeightResponse {
    fn from(entry: OperatorSourceWeight) -> Self {
        Self {
            operator_id: entry.operator_id.0,
            source_id: entry.source_id.0,
            weight: entry.weight,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeightsUpdated {
    pub updated_weights: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeadResponse {
    pub id: i64,
    pub external_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub contacts: Vec<ContactResponse>,
}

impl From<LeadWithContacts> for LeadResponse {
    fn from(view: LeadWithContacts) -> Self {
        Self {
            id: view.lead.id.0,
            external_id: view.lead.external_id,
            email: view.lead.email,
            phone: view.lead.phone,
            created_at: view.lead.created_at,
            contacts: view.contacts.into_iter().map(ContactResponse::from).collect(),
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Lead Distribution CRM API" }))
}

async fn create_contact(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    payload: Result<Json<CreateContactRequest>, JsonRejection>,
) -> ApiResult<ContactResponse> {
    let request = json_body(payload, &correlation_id)?;
    tracing::info!(
        event_name = "api.contacts.create",
        correlation_id = %correlation_id.0,
        source_id = request.source_id,
        "routing inbound contact"
    );

    let contact = state
        .distributor
        .assign(&request.lead_external_id, SourceId(request.source_id), request.message)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(contact.into()))
}

async fn update_contact_status(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<i64>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult<ContactResponse> {
    let query = query_params(query, &correlation_id)?;
    let contact = state
        .directory
        .update_contact_status(ContactId(id), &query.status)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(contact.into()))
}

async fn create_operator(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    payload: Result<Json<CreateOperatorRequest>, JsonRejection>,
) -> ApiResult<OperatorResponse> {
    let request = json_body(payload, &correlation_id)?;
    let operator = state
        .operators
        .create_operator(&request.name, request.max_active_leads)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(operator.into()))
}

async fn list_operators(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
) -> ApiResult<Vec<OperatorResponse>> {
    let operators = state
        .operators
        .list_operators()
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(operators.into_iter().map(OperatorResponse::from).collect()))
}

async fn get_operator(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<i64>,
) -> ApiResult<OperatorResponse> {
    let operator = state
        .operators
        .get_operator(OperatorId(id))
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(operator.into()))
}

async fn update_operator(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateOperatorRequest>, JsonRejection>,
) -> ApiResult<OperatorResponse> {
    let request = json_body(payload, &correlation_id)?;
    let changes = OperatorChanges {
        name: request.name,
        status: request.status,
        max_active_leads: request.max_active_leads,
    };
    let operator = state
        .operators
        .update_operator(OperatorId(id), changes)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(operator.into()))
}

async fn update_operator_status(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<i64>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult<StatusUpdated> {
    let query = query_params(query, &correlation_id)?;
    state
        .operators
        .update_operator_status(OperatorId(id), &query.status)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(StatusUpdated { status: "updated".to_string() }))
}

async fn create_source(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    payload: Result<Json<CreateSourceRequest>, JsonRejection>,
) -> ApiResult<SourceResponse> {
    let request = json_body(payload, &correlation_id)?;
    let source = state
        .sources
        .create_source(&request.name, request.description)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(source.into()))
}

async fn list_sources(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
) -> ApiResult<Vec<SourceResponse>> {
    let sources = state
        .sources
        .list_sources()
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(sources.into_iter().map(SourceResponse::from).collect()))
}

async fn source_weights(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<i64>,
) -> ApiResult<Vec<WeightResponse>> {
    let weights = state
        .sources
        .source_weights(SourceId(id))
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(weights.into_iter().map(WeightResponse::from).collect()))
}

async fn replace_source_weights(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<i64>,
    payload: Result<Json<ReplaceWeightsRequest>, JsonRejection>,
) -> ApiResult<WeightsUpdated> {
    let request = json_body(payload, &correlation_id)?;
    let stored = state
        .sources
        .replace_source_weights(SourceId(id), request.weights)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(WeightsUpdated { updated_weights: stored.len() }))
}

async fn lead_with_contacts(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(external_id): Path<String>,
) -> ApiResult<LeadResponse> {
    if external_id.trim().is_empty() {
        let error = DomainError::InvariantViolation("lead external id must not be empty".into());
        return Err(ApiError::from_app(error.into(), &correlation_id));
    }

    let view = state
        .directory
        .lead_with_contacts(&external_id)
        .await
        .map_err(|error| ApiError::from_app(error, &correlation_id))?;
    Ok(Json(view.into()))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use tower::ServiceExt;

    use leadflow_core::config::RoutingConfig;
    use leadflow_core::{LeadDistributor, WeightedSelector};
    use leadflow_db::{connect_with_settings, migrations, sql_stores};

    use super::{
        router, ApiState, ContactResponse, ErrorBody, LeadResponse, OperatorResponse,
        SourceResponse, StatusUpdated, WeightResponse, WeightsUpdated, CORRELATION_HEADER,
    };

    async fn app() -> Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        let stores = sql_stores(&pool);
        let routing = RoutingConfig::default();
        let distributor = LeadDistributor::new(stores.clone(), WeightedSelector::seeded(3), 8);
        router(ApiState::new(stores, distributor, &routing))
    }

    async fn send<T: DeserializeOwned>(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, T) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header(CORRELATION_HEADER, "test-correlation");
        let request = builder
            .body(body.map_or_else(Body::empty, |value| Body::from(value.to_string())))
            .expect("build request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        let payload = serde_json::from_slice(&bytes).expect("json body");
        (status, payload)
    }

    async fn seed(app: &Router) -> (OperatorResponse, OperatorResponse, SourceResponse) {
        let (_, alice): (_, OperatorResponse) = send(
            app,
            "POST",
            "/api/v1/operators/",
            Some(json!({ "name": "Alice", "max_active_leads": 1 })),
        )
        .await;
        let (_, bob): (_, OperatorResponse) =
            send(app, "POST", "/api/v1/operators/", Some(json!({ "name": "Bob" }))).await;
        let (_, source): (_, SourceResponse) = send(
            app,
            "POST",
            "/api/v1/sources/",
            Some(json!({ "name": "website", "description": "landing page form" })),
        )
        .await;
        (alice, bob, source)
    }

    #[tokio::test]
    async fn root_identifies_the_service() {
        let (status, body): (_, serde_json::Value) = send(&app().await, "GET", "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Lead Distribution CRM API");
    }

    #[tokio::test]
    async fn contact_routing_end_to_end() {
        let app = app().await;
        let (alice, bob, source) = seed(&app).await;
        assert_eq!(bob.max_active_leads, 10, "default capacity comes from config");

        let (status, updated): (_, WeightsUpdated) = send(
            &app,
            "PUT",
            &format!("/api/v1/sources/{}/weights", source.id),
            Some(json!({ "weights": [
                { "operator_id": alice.id, "weight": 5 },
                { "operator_id": bob.id, "weight": 0 }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated.updated_weights, 2);

        let (status, first): (_, ContactResponse) = send(
            &app,
            "POST",
            "/api/v1/contacts/",
            Some(json!({ "lead_external_id": "crm-1", "source_id": source.id, "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first.operator_id, Some(alice.id));
        assert_eq!(first.status, "new");
        assert_eq!(first.message.as_deref(), Some("hi"));

        // Alice is full and Bob has weight zero.
        let (_, second): (_, ContactResponse) = send(
            &app,
            "POST",
            "/api/v1/contacts/",
            Some(json!({ "lead_external_id": "crm-1", "source_id": source.id })),
        )
        .await;
        assert_eq!(second.operator_id, None);
        assert_eq!(second.lead_id, first.lead_id);

        let (status, lead): (_, LeadResponse) =
            send(&app, "GET", "/api/v1/leads/crm-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(lead.contacts.len(), 2);

        let (status, closed): (_, ContactResponse) = send(
            &app,
            "PUT",
            &format!("/api/v1/contacts/{}/status?status=closed", first.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed.status, "closed");

        let (_, third): (_, ContactResponse) = send(
            &app,
            "POST",
            "/api/v1/contacts/",
            Some(json!({ "lead_external_id": "crm-2", "source_id": source.id })),
        )
        .await;
        assert_eq!(third.operator_id, Some(alice.id));
    }

    #[tokio::test]
    async fn unknown_source_is_not_found_with_correlation_id() {
        let (status, body): (_, ErrorBody) = send(
            &app().await,
            "POST",
            "/api/v1/contacts/",
            Some(json!({ "lead_external_id": "crm-1", "source_id": 404 })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.correlation_id, "test-correlation");
        assert_eq!(body.detail, "source `404` was not found");
    }

    #[tokio::test]
    async fn operator_status_endpoint_validates_input() {
        let app = app().await;
        let (alice, _, _) = seed(&app).await;

        let (status, body): (_, StatusUpdated) = send(
            &app,
            "PUT",
            &format!("/api/v1/operators/{}/status?status=inactive", alice.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "updated");

        let (status, _): (_, ErrorBody) = send(
            &app,
            "PUT",
            &format!("/api/v1/operators/{}/status?status=sleeping", alice.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _): (_, ErrorBody) =
            send(&app, "PUT", "/api/v1/operators/999/status?status=active", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, operators): (_, Vec<OperatorResponse>) =
            send(&app, "GET", "/api/v1/operators/", None).await;
        assert_eq!(operators[0].status, "inactive");
    }

    #[tokio::test]
    async fn operator_patch_rejects_negative_capacity() {
        let app = app().await;
        let (alice, _, _) = seed(&app).await;

        let (status, body): (_, ErrorBody) = send(
            &app,
            "PATCH",
            &format!("/api/v1/operators/{}", alice.id),
            Some(json!({ "max_active_leads": -3 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.detail.contains("max_active_leads"));

        let (status, patched): (_, OperatorResponse) = send(
            &app,
            "PATCH",
            &format!("/api/v1/operators/{}", alice.id),
            Some(json!({ "name": "Alice M.", "max_active_leads": 4 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!((patched.name.as_str(), patched.max_active_leads), ("Alice M.", 4));
    }

    #[tokio::test]
    async fn weight_replacement_rejects_negative_and_duplicate_entries() {
        let app = app().await;
        let (alice, _, source) = seed(&app).await;
        let uri = format!("/api/v1/sources/{}/weights", source.id);

        let (status, _): (_, ErrorBody) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({ "weights": [{ "operator_id": alice.id, "weight": -1 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _): (_, ErrorBody) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({ "weights": [
                { "operator_id": alice.id, "weight": 1 },
                { "operator_id": alice.id, "weight": 2 }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, weights): (_, Vec<WeightResponse>) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(weights.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let (status, body): (_, ErrorBody) = send(
            &app().await,
            "POST",
            "/api/v1/contacts/",
            Some(json!({ "lead_external_id": "crm-1" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.correlation_id, "test-correlation");
    }

    #[tokio::test]
    async fn unknown_lead_is_not_found() {
        let (status, body): (_, ErrorBody) =
            send(&app().await, "GET", "/api/v1/leads/crm-missing", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "The referenced resource does not exist.");
    }
}
