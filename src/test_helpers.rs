//! Shared test fixtures: an in-process fake backend and recording sinks.
//!
//! The fake backend speaks the same REST surface as the real todo API
//! (FastAPI-style `{"detail": ...}` errors included) and records every call
//! as `"METHOD /path"` so tests can assert exact request sequences.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Multipart, Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::config::ClientConfig;
use crate::net::http::{ApiClient, SessionExpiredHook};
use crate::net::types::{Todo, User};
use crate::state::session::SessionStore;
use crate::util::notify::{Notice, Notifier};

pub const DEMO_PASSWORD: &str = "demo123";
pub const IMAGE_BYTES: &[u8] = b"\x89PNG-fake-image";

/// Bearer token the fake backend issues for `username`.
#[must_use]
pub fn token_for(username: &str) -> String {
    format!("token-{username}")
}

/// The seeded demo user as the backend reports it.
#[must_use]
pub fn demo_user() -> User {
    User { id: 1, username: "demo".into(), email: "demo@example.com".into() }
}

#[must_use]
pub fn todo(id: i64, title: &str, is_completed: bool) -> Todo {
    Todo {
        id,
        title: title.into(),
        description: format!("{title} details"),
        is_completed,
        user_id: 1,
        added_by: "demo".into(),
        image_url: None,
    }
}

// =============================================================================
// RECORDING SINKS
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notifier lock").push(notice);
    }
}

/// A session-expired hook that counts its invocations.
pub fn counting_hook() -> (SessionExpiredHook, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let hook: SessionExpiredHook = Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (hook, count)
}

// =============================================================================
// FAKE BACKEND
// =============================================================================

pub struct FakeUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Default)]
pub struct FakeDb {
    pub users: Vec<FakeUser>,
    pub todos: Vec<Todo>,
    pub next_todo_id: i64,
    pub calls: Vec<String>,
    pub auth_headers: Vec<Option<String>>,
    /// Reject every bearer token with 401.
    pub revoked: bool,
    pub fail_status_updates: bool,
    pub fail_deletes: bool,
    /// Answer `POST /todos` with `{message, todo_id}` instead of the record.
    pub ack_only_create: bool,
    /// `(file_name, content_type, byte_len)` of every uploaded image.
    pub uploads: Vec<(String, String, usize)>,
}

type Shared = Arc<Mutex<FakeDb>>;

pub struct FakeBackend {
    pub base_url: String,
    db: Shared,
}

impl FakeBackend {
    /// Start a backend seeded with `demo` / `demo123` and no todos.
    pub async fn start() -> Self {
        let db = FakeDb {
            users: vec![FakeUser {
                id: 1,
                username: "demo".into(),
                email: "demo@example.com".into(),
                password: DEMO_PASSWORD.into(),
            }],
            next_todo_id: 1,
            ..FakeDb::default()
        };
        let db: Shared = Arc::new(Mutex::new(db));

        let app = Router::new()
            .route("/login", post(login))
            .route("/signup", post(signup))
            .route("/me", get(me))
            .route("/todos", get(list_todos).post(create_todo))
            .route("/todos/{id}", put(update_todo).delete(delete_todo))
            .route("/todos/{id}/status", put(update_status))
            .route("/images/{filename}", get(image))
            .layer(axum::middleware::from_fn_with_state(db.clone(), record_call))
            .with_state(db.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend serve");
        });

        Self { base_url: format!("http://{addr}"), db }
    }

    pub fn db(&self) -> MutexGuard<'_, FakeDb> {
        self.db.lock().expect("fake db lock")
    }

    pub fn calls(&self) -> Vec<String> {
        self.db().calls.clone()
    }

    /// Insert a todo owned by `user_id` and return its id.
    pub fn seed_todo(&self, user_id: i64, title: &str, is_completed: bool) -> i64 {
        let mut db = self.db();
        let id = db.next_todo_id;
        db.next_todo_id += 1;
        let added_by = db
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map_or_else(|| "someone".to_owned(), |u| u.username.clone());
        db.todos.push(Todo { id, user_id, added_by, ..todo(id, title, is_completed) });
        id
    }

    pub fn add_user(&self, username: &str, password: &str) -> i64 {
        let mut db = self.db();
        let id = i64::try_from(db.users.len()).expect("user count") + 1;
        db.users.push(FakeUser {
            id,
            username: username.into(),
            email: format!("{username}@example.com"),
            password: password.into(),
        });
        id
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url, PathBuf::from("unused-session.json")).expect("fake backend config")
    }

    pub fn client(&self, session: SessionStore, hook: SessionExpiredHook) -> ApiClient {
        ApiClient::new(&self.config(), session, hook).expect("api client")
    }
}

async fn record_call(State(db): State<Shared>, request: Request, next: Next) -> Response {
    let call = format!("{} {}", request.method(), request.uri().path());
    let auth = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    {
        let mut db = db.lock().expect("fake db lock");
        db.calls.push(call);
        db.auth_headers.push(auth);
    }
    next.run(request).await
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

/// Resolve the bearer header to a user id.
fn authorize(db: &FakeDb, headers: &HeaderMap) -> Option<i64> {
    if db.revoked {
        return None;
    }
    let header = headers.get("authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    db.users
        .iter()
        .find(|u| token_for(&u.username) == token)
        .map(|u| u.id)
}

async fn login(State(db): State<Shared>, Json(body): Json<Value>) -> Response {
    let db = db.lock().expect("fake db lock");
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match db.users.iter().find(|u| u.username == username && u.password == password) {
        Some(user) => Json(json!({
            "access_token": token_for(&user.username),
            "token_type": "bearer",
            "user_id": user.id,
            "username": user.username,
        }))
        .into_response(),
        None => detail(StatusCode::UNAUTHORIZED, "Incorrect username or password"),
    }
}

async fn signup(State(db): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut db = db.lock().expect("fake db lock");
    let username = body["username"].as_str().unwrap_or_default().to_owned();
    let email = body["email"].as_str().unwrap_or_default().to_owned();
    let password = body["password"].as_str().unwrap_or_default().to_owned();
    if username.len() < 3 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [{ "loc": ["body", "username"], "msg": "String should have at least 3 characters" }] })),
        )
            .into_response();
    }
    if db.users.iter().any(|u| u.username == username) {
        return detail(StatusCode::BAD_REQUEST, "Username already registered");
    }
    let id = i64::try_from(db.users.len()).expect("user count") + 1;
    db.users.push(FakeUser { id, username, email, password });
    Json(json!({ "message": "User created successfully", "user_id": id })).into_response()
}

async fn me(State(db): State<Shared>, headers: HeaderMap) -> Response {
    let db = db.lock().expect("fake db lock");
    let Some(user_id) = authorize(&db, &headers) else {
        return unauthorized();
    };
    let user = db.users.iter().find(|u| u.id == user_id).expect("authorized user exists");
    Json(json!({ "id": user.id, "username": user.username, "email": user.email })).into_response()
}

async fn list_todos(State(db): State<Shared>, headers: HeaderMap) -> Response {
    let db = db.lock().expect("fake db lock");
    let Some(user_id) = authorize(&db, &headers) else {
        return unauthorized();
    };
    let todos: Vec<&Todo> = db.todos.iter().filter(|t| t.user_id == user_id).collect();
    Json(json!(todos)).into_response()
}

#[derive(Default)]
struct TodoForm {
    title: Option<String>,
    description: Option<String>,
    is_completed: Option<bool>,
    image: Option<(String, String, usize)>,
}

async fn read_form(mut multipart: Multipart) -> TodoForm {
    let mut form = TodoForm::default();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.expect("image bytes");
                form.image = Some((file_name, content_type, bytes.len()));
            }
            "title" => form.title = Some(field.text().await.expect("title text")),
            "description" => form.description = Some(field.text().await.expect("description text")),
            "is_completed" => form.is_completed = Some(field.text().await.expect("flag text") == "true"),
            _ => {}
        }
    }
    form
}

async fn create_todo(State(db): State<Shared>, headers: HeaderMap, multipart: Multipart) -> Response {
    let form = read_form(multipart).await;
    let mut db = db.lock().expect("fake db lock");
    let Some(user_id) = authorize(&db, &headers) else {
        return unauthorized();
    };
    let Some(title) = form.title.filter(|t| !t.is_empty()) else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "title is required");
    };
    let id = db.next_todo_id;
    db.next_todo_id += 1;
    let image_url = form.image.as_ref().map(|(name, _, _)| format!("uploads/{name}"));
    if let Some(upload) = form.image {
        db.uploads.push(upload);
    }
    let added_by = db
        .users
        .iter()
        .find(|u| u.id == user_id)
        .map(|u| u.username.clone())
        .unwrap_or_default();
    let record = Todo {
        id,
        title,
        description: form.description.unwrap_or_default(),
        is_completed: false,
        user_id,
        added_by,
        image_url,
    };
    db.todos.push(record.clone());
    if db.ack_only_create {
        return Json(json!({ "message": "Todo added successfully", "todo_id": id })).into_response();
    }
    Json(json!(record)).into_response()
}

/// Look up a todo for the caller, mirroring the backend's 404/403 split.
fn owned_todo<'a>(db: &'a mut FakeDb, id: i64, user_id: i64) -> Result<&'a mut Todo, Response> {
    match db.todos.iter_mut().find(|t| t.id == id) {
        None => Err(detail(StatusCode::NOT_FOUND, "Todo not found")),
        Some(t) if t.user_id != user_id => Err(detail(StatusCode::FORBIDDEN, "Not authorized to update this todo")),
        Some(t) => Ok(t),
    }
}

async fn update_todo(
    State(db): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let form = read_form(multipart).await;
    let mut db = db.lock().expect("fake db lock");
    let Some(user_id) = authorize(&db, &headers) else {
        return unauthorized();
    };
    if let Some(upload) = form.image.clone() {
        db.uploads.push(upload);
    }
    let todo = match owned_todo(&mut db, id, user_id) {
        Ok(todo) => todo,
        Err(response) => return response,
    };
    if let Some(title) = form.title {
        todo.title = title;
    }
    if let Some(description) = form.description {
        todo.description = description;
    }
    if let Some(flag) = form.is_completed {
        todo.is_completed = flag;
    }
    if let Some((name, _, _)) = form.image {
        todo.image_url = Some(format!("uploads/{name}"));
    }
    Json(json!({ "message": "Todo updated successfully" })).into_response()
}

async fn update_status(
    State(db): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = db.lock().expect("fake db lock");
    let Some(user_id) = authorize(&db, &headers) else {
        return unauthorized();
    };
    if db.fail_status_updates {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update todo status");
    }
    let todo = match owned_todo(&mut db, id, user_id) {
        Ok(todo) => todo,
        Err(response) => return response,
    };
    todo.is_completed = body["is_completed"].as_bool().unwrap_or_default();
    Json(json!(todo)).into_response()
}

async fn delete_todo(State(db): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    let mut db = db.lock().expect("fake db lock");
    let Some(user_id) = authorize(&db, &headers) else {
        return unauthorized();
    };
    if db.fail_deletes {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete todo");
    }
    if let Err(response) = owned_todo(&mut db, id, user_id) {
        return response;
    }
    db.todos.retain(|t| t.id != id);
    Json(json!({ "message": "Todo deleted successfully" })).into_response()
}

async fn image(Path(filename): Path<String>) -> Response {
    if filename == "missing.png" {
        return detail(StatusCode::NOT_FOUND, "Image not found");
    }
    (StatusCode::OK, IMAGE_BYTES.to_vec()).into_response()
}
