//! `RestCatalog` against an in-process fake of the catalog backend.
//!
//! The fake speaks the subset of the PostgREST table API and the token auth
//! API the client uses, and records every request it sees.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use herbgarden::catalog::{
    CatalogBackend, CatalogError, HerbForm, RestCatalog, Session, SessionContext, User,
};

const ANON_KEY: &str = "anon-key";

#[derive(Debug, Clone)]
struct Seen {
    route: &'static str,
    query: HashMap<String, String>,
    bearer: Option<String>,
    prefer: Option<String>,
    body: Option<Value>,
}

#[derive(Default)]
struct Backend {
    herbs: Mutex<Vec<Value>>,
    seen: Mutex<Vec<Seen>>,
    logged_out: Mutex<Vec<String>>,
}

impl Backend {
    fn seen(&self, route: &str) -> Vec<Seen> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.route == route)
            .cloned()
            .collect()
    }

    fn record(
        &self,
        route: &'static str,
        query: &HashMap<String, String>,
        headers: &HeaderMap,
        body: Option<Value>,
    ) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen.lock().unwrap().push(Seen {
            route,
            query: query.clone(),
            bearer: header("authorization").and_then(|v| v.strip_prefix("Bearer ").map(str::to_string)),
            prefer: header("prefer"),
            body,
        });
    }
}

fn rejected(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Every request must carry the project key.
fn check_apikey(headers: &HeaderMap) -> Option<Response> {
    (headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON_KEY)).then(|| {
        rejected(
            StatusCode::UNAUTHORIZED,
            json!({ "message": "Invalid API key", "hint": "Double check your key" }),
        )
    })
}

fn eq_filter<'a>(query: &'a HashMap<String, String>, column: &str) -> Option<&'a str> {
    query.get(column).and_then(|v| v.strip_prefix("eq."))
}

async fn select_herbs(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    backend.record("select_herbs", &query, &headers, None);
    if let Some(denied) = check_apikey(&headers) {
        return denied;
    }

    let herbs = backend.herbs.lock().unwrap().clone();
    match eq_filter(&query, "id") {
        Some("boom") => rejected(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "message": "connection to database lost" }),
        ),
        // Two rows sharing an id
        Some("dup") => Json(vec![herbs[0].clone(), herbs[0].clone()]).into_response(),
        Some(id) => {
            let rows: Vec<Value> = herbs.into_iter().filter(|h| h["id"] == id).collect();
            Json(rows).into_response()
        }
        None => Json(herbs).into_response(),
    }
}

async fn insert_herb(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> Response {
    backend.record("insert_herb", &HashMap::new(), &headers, Some(row.clone()));
    if let Some(denied) = check_apikey(&headers) {
        return denied;
    }

    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
    if bearer != Some("Bearer access-admin") && bearer != Some("Bearer access-admin-2") {
        return rejected(
            StatusCode::FORBIDDEN,
            json!({
                "code": "42501",
                "message": "new row violates row-level security policy for table \"herbs\""
            }),
        );
    }

    let mut herbs = backend.herbs.lock().unwrap();
    row["id"] = json!(format!("h{}", herbs.len() + 1));
    row["created_at"] = json!("2025-03-01T09:00:00+00:00");
    herbs.push(row.clone());

    // Without the header PostgREST answers 201 with an empty body
    if headers.get("prefer").and_then(|v| v.to_str().ok()) != Some("return=representation") {
        return StatusCode::CREATED.into_response();
    }
    (StatusCode::CREATED, Json(vec![row])).into_response()
}

async fn select_roles(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    backend.record("select_roles", &query, &headers, None);
    if let Some(denied) = check_apikey(&headers) {
        return denied;
    }

    let is_admin_row = eq_filter(&query, "user_id") == Some("u-admin")
        && eq_filter(&query, "role") == Some("admin");
    if is_admin_row {
        Json(json!([{ "role": "admin" }])).into_response()
    } else {
        Json(json!([])).into_response()
    }
}

fn token_body(user_id: &str, email: &str, access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 3600,
        "user": { "id": user_id, "email": email, "role": "authenticated" }
    })
}

fn invalid_grant(description: &str) -> Response {
    rejected(
        StatusCode::BAD_REQUEST,
        json!({ "error": "invalid_grant", "error_description": description }),
    )
}

async fn token(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record("token", &query, &headers, Some(body.clone()));
    if let Some(denied) = check_apikey(&headers) {
        return denied;
    }

    match query.get("grant_type").map(String::as_str) {
        Some("password") => match (body["email"].as_str(), body["password"].as_str()) {
            (Some("admin@example.com"), Some("hunter2")) => Json(token_body(
                "u-admin",
                "admin@example.com",
                "access-admin",
                "refresh-admin",
            ))
            .into_response(),
            (Some("reader@example.com"), Some("hunter2")) => Json(token_body(
                "u-reader",
                "reader@example.com",
                "access-reader",
                "refresh-reader",
            ))
            .into_response(),
            _ => invalid_grant("Invalid login credentials"),
        },
        Some("refresh_token") => match body["refresh_token"].as_str() {
            Some("refresh-admin") => Json(token_body(
                "u-admin",
                "admin@example.com",
                "access-admin-2",
                "refresh-admin-2",
            ))
            .into_response(),
            _ => invalid_grant("Invalid Refresh Token: Refresh Token Not Found"),
        },
        _ => invalid_grant("unsupported grant_type"),
    }
}

async fn logout(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.record("logout", &HashMap::new(), &headers, None);
    if let Some(denied) = check_apikey(&headers) {
        return denied;
    }
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(bearer) if bearer != format!("Bearer {}", ANON_KEY) => {
            backend.logged_out.lock().unwrap().push(bearer.to_string());
            StatusCode::NO_CONTENT.into_response()
        }
        _ => rejected(StatusCode::UNAUTHORIZED, json!({ "msg": "This endpoint requires a Bearer token" })),
    }
}

fn tulsi() -> Value {
    json!({
        "id": "h1",
        "name": "Tulsi",
        "scientific_name": "Ocimum tenuiflorum",
        "description": "Holy basil",
        "category": "Medicinal",
        "benefits": ["Calms the mind"],
        "uses": null,
        "growing_conditions": null,
        "medicinal_properties": null,
        "culinary_uses": null,
        "precautions": null,
        "image_url": null,
        "amazon_link": null,
        "created_at": "2025-01-15T10:30:00.123456+00:00"
    })
}

fn mint() -> Value {
    let mut mint = tulsi();
    mint["id"] = json!("h2");
    mint["name"] = json!("Mint");
    mint["category"] = json!("Culinary");
    mint
}

async fn start(herbs: Vec<Value>) -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend {
        herbs: Mutex::new(herbs),
        ..Default::default()
    });
    let router = Router::new()
        .route("/rest/v1/herbs", get(select_herbs).post(insert_herb))
        .route("/rest/v1/user_roles", get(select_roles))
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (url, backend)
}

fn catalog(url: &str) -> RestCatalog {
    RestCatalog::new(url, ANON_KEY, 10).unwrap()
}

fn session(user_id: &str, access: &str) -> Session {
    Session {
        access_token: access.to_string(),
        refresh_token: format!("{}-refresh", access),
        expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        user: User {
            id: user_id.to_string(),
            email: None,
        },
    }
}

// ===== Reads =====

#[tokio::test]
async fn test_list_herbs() {
    let (url, backend) = start(vec![tulsi(), mint()]).await;

    let herbs = catalog(&url).list_herbs().await.unwrap();

    assert_eq!(herbs.len(), 2);
    assert_eq!(herbs[0].name, "Tulsi");
    assert!(herbs[0].uses.is_empty());
    assert_eq!(herbs[1].category, "Culinary");

    let seen = backend.seen("select_herbs");
    assert_eq!(seen[0].query.get("select").map(String::as_str), Some("*"));
    assert!(!seen[0].query.contains_key("id"));
    // Signed out: the anon key doubles as the bearer token
    assert_eq!(seen[0].bearer.as_deref(), Some(ANON_KEY));
}

#[tokio::test]
async fn test_get_herb_uses_eq_filter() {
    let (url, backend) = start(vec![tulsi(), mint()]).await;

    let herb = catalog(&url).get_herb("h2").await.unwrap();
    assert_eq!(herb.name, "Mint");

    let seen = backend.seen("select_herbs");
    assert_eq!(seen[0].query.get("id").map(String::as_str), Some("eq.h2"));
    assert_eq!(seen[0].query.get("select").map(String::as_str), Some("*"));
}

#[tokio::test]
async fn test_get_herb_zero_rows_is_not_found() {
    let (url, _) = start(vec![tulsi()]).await;

    match catalog(&url).get_herb("missing").await {
        Err(CatalogError::NotFound(id)) => assert_eq!(id, "missing"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_herb_many_rows_is_invalid() {
    let (url, _) = start(vec![tulsi()]).await;

    match catalog(&url).get_herb("dup").await {
        Err(CatalogError::InvalidResponse(msg)) => assert!(msg.contains("got 2")),
        other => panic!("Expected InvalidResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_backend_error() {
    let (url, _) = start(vec![tulsi()]).await;

    match catalog(&url).get_herb("boom").await {
        Err(CatalogError::Backend { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "connection to database lost");
        }
        other => panic!("Expected Backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wrong_project_key_is_auth_error() {
    let (url, _) = start(vec![tulsi()]).await;
    let catalog = RestCatalog::new(&url, "not-the-key", 10).unwrap();

    match catalog.list_herbs().await {
        Err(CatalogError::Auth(msg)) => assert_eq!(msg, "Invalid API key"),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

// ===== Auth =====

#[tokio::test]
async fn test_sign_in_and_refresh() {
    let (url, backend) = start(Vec::new()).await;
    let catalog = catalog(&url);

    let signed_in = catalog.sign_in("admin@example.com", "hunter2").await.unwrap();
    assert_eq!(signed_in.user.id, "u-admin");
    assert_eq!(signed_in.access_token, "access-admin");
    assert!(signed_in.expires_at > chrono::Utc::now());

    let refreshed = catalog.refresh(&signed_in).await.unwrap();
    assert_eq!(refreshed.access_token, "access-admin-2");
    assert_eq!(refreshed.refresh_token, "refresh-admin-2");

    let seen = backend.seen("token");
    assert_eq!(seen[0].query.get("grant_type").map(String::as_str), Some("password"));
    assert_eq!(
        seen[0].body,
        Some(json!({ "email": "admin@example.com", "password": "hunter2" }))
    );
    assert_eq!(seen[1].query.get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(seen[1].body, Some(json!({ "refresh_token": "refresh-admin" })));
}

#[tokio::test]
async fn test_bad_credentials_are_auth_error() {
    let (url, _) = start(Vec::new()).await;

    match catalog(&url).sign_in("admin@example.com", "wrong").await {
        Err(CatalogError::Auth(msg)) => assert_eq!(msg, "Invalid login credentials"),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_refresh_token_is_auth_error() {
    let (url, _) = start(Vec::new()).await;

    let stale = session("u-admin", "access-old");
    assert!(matches!(
        catalog(&url).refresh(&stale).await,
        Err(CatalogError::Auth(_))
    ));
}

#[tokio::test]
async fn test_role_query() {
    let (url, backend) = start(Vec::new()).await;
    let catalog = catalog(&url);

    assert!(catalog.is_admin(&session("u-admin", "access-admin")).await.unwrap());
    assert!(!catalog.is_admin(&session("u-reader", "access-reader")).await.unwrap());

    let seen = backend.seen("select_roles");
    assert_eq!(seen[0].query.get("select").map(String::as_str), Some("role"));
    assert_eq!(seen[0].query.get("user_id").map(String::as_str), Some("eq.u-admin"));
    assert_eq!(seen[0].query.get("role").map(String::as_str), Some("eq.admin"));
    assert_eq!(seen[0].bearer.as_deref(), Some("access-admin"));
}

#[tokio::test]
async fn test_sign_out_sends_access_token() {
    let (url, backend) = start(Vec::new()).await;

    catalog(&url)
        .sign_out(&session("u-admin", "access-admin"))
        .await
        .unwrap();
    assert_eq!(*backend.logged_out.lock().unwrap(), vec!["Bearer access-admin"]);
}

// ===== Writes =====

fn ashwagandha() -> HerbForm {
    HerbForm {
        name: "Ashwagandha".to_string(),
        description: "Adaptogenic root".to_string(),
        category: "Medicinal".to_string(),
        benefits: "Stress relief, Sleep".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_insert_returns_representation() {
    let (url, backend) = start(vec![tulsi()]).await;
    let catalog = catalog(&url);
    let new = ashwagandha().into_new_herb().unwrap();

    let inserted = catalog
        .insert_herb(&session("u-admin", "access-admin"), &new)
        .await
        .unwrap();

    assert_eq!(inserted.id, "h2");
    assert_eq!(inserted.name, "Ashwagandha");
    assert_eq!(inserted.benefits, vec!["Stress relief", "Sleep"]);
    assert!(inserted.created_at.is_some());

    let seen = backend.seen("insert_herb");
    assert_eq!(seen[0].prefer.as_deref(), Some("return=representation"));
    assert_eq!(seen[0].bearer.as_deref(), Some("access-admin"));
    let body = seen[0].body.clone().unwrap();
    assert!(body.get("id").is_none());
    assert_eq!(body["scientific_name"], Value::Null);

    assert_eq!(catalog.list_herbs().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_insert_denied_by_row_security() {
    let (url, _) = start(Vec::new()).await;
    let new = ashwagandha().into_new_herb().unwrap();

    match catalog(&url)
        .insert_herb(&session("u-reader", "access-reader"), &new)
        .await
    {
        Err(CatalogError::Auth(msg)) => assert!(msg.contains("row-level security")),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

// ===== Session lifecycle over HTTP =====

#[tokio::test]
async fn test_session_context_over_rest() {
    let (url, backend) = start(Vec::new()).await;
    let catalog = catalog(&url);

    let mut admin = SessionContext::acquire(&catalog, "admin@example.com", "hunter2")
        .await
        .unwrap();
    assert!(admin.is_admin());

    admin.refresh(&catalog).await.unwrap();
    assert!(admin.is_admin());
    assert_eq!(admin.session().unwrap().access_token, "access-admin-2");

    let inserted = catalog
        .insert_herb(
            admin.require_admin().unwrap(),
            &ashwagandha().into_new_herb().unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(inserted.name, "Ashwagandha");

    admin.sign_out(&catalog).await.unwrap();
    assert!(!admin.is_signed_in());
    assert_eq!(*backend.logged_out.lock().unwrap(), vec!["Bearer access-admin-2"]);

    let reader = SessionContext::acquire(&catalog, "reader@example.com", "hunter2")
        .await
        .unwrap();
    assert!(reader.is_signed_in());
    assert!(!reader.is_admin());
}
