use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use actix_files::Files;
use actix_session::config::PersistentSession;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::{time, Key};
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::app::{AppState, RefreshMode, Role};
use crate::documents::{AppSettings, AuthSettings};
use crate::error::AppError;
use crate::schedule::{ClassLabel, Day, SlotKey};

const ROLE_KEY: &str = "role";

pub struct WebState {
    app: Mutex<AppState>,
}

impl WebState {
    pub fn new(app: AppState) -> Self {
        WebState { app: Mutex::new(app) }
    }

    /// Never hold the guard across an await
    fn lock(&self) -> Result<MutexGuard<'_, AppState>, AppError> {
        self.app
            .lock()
            .map_err(|_| AppError::Internal("application state lock poisoned".to_string()))
    }
}

type Shared = web::Data<WebState>;

fn current_role(session: &Session) -> Result<Role, AppError> {
    session
        .get::<Role>(ROLE_KEY)
        .map_err(|e| AppError::Internal(format!("Unreadable session: {}", e)))?
        .ok_or_else(|| AppError::Authentication("Please log in first".to_string()))
}

fn parse_day(raw: &str) -> Result<Day, AppError> {
    raw.parse()
}

fn parse_class(raw: &str) -> Result<ClassLabel, AppError> {
    raw.parse()
}

fn csv_download(body: Vec<u8>, filename: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)))
        .body(body)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    password: String,
}

async fn login(req: web::Json<LoginRequest>, session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = state
        .lock()?
        .authenticate(req.username.as_deref(), &req.password)
        .inspect_err(|e| e.log_and_record("login"))?;
    session
        .insert(ROLE_KEY, &role)
        .map_err(|e| AppError::Internal(format!("Could not store session: {}", e)))?;
    info!(?role, "Signed in");
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "role": role})))
}

async fn logout(session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::Ok().json(serde_json::json!({"success": true}))
}

async fn status(session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = current_role(&session).ok();
    let app = state.lock()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "role": role,
        "settings": app.settings(),
        "sync": app.sync_status(),
        "classes": app.layout().classes,
        "teachers": app.roster().teachers().len(),
        "assignments": app.assignments().len(),
    })))
}

#[derive(Deserialize)]
pub struct GridQuery {
    /// Comma-separated codes to keep highlighted
    #[serde(default)]
    filter: Option<String>,
}

async fn get_schedule(
    day: web::Path<String>,
    query: web::Query<GridQuery>,
    session: Session,
    state: Shared,
) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let day = parse_day(&day)?;
    let filter: BTreeSet<String> = query
        .filter
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    let grid = state.lock()?.day_grid(day, &filter)?;
    Ok(HttpResponse::Ok().json(grid))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    code: String,
}

async fn put_cell(
    path: web::Path<(String, u8, String)>,
    req: web::Json<AssignRequest>,
    session: Session,
    state: Shared,
) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    let (day, period, class) = path.into_inner();
    let slot = SlotKey::new(parse_day(&day)?, period, parse_class(&class)?);
    let previous = state.lock()?.assign(&role, slot, &req.code)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "previous": previous})))
}

async fn get_eligible(
    path: web::Path<(String, u8, String)>,
    session: Session,
    state: Shared,
) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let (day, period, class) = path.into_inner();
    let slot = SlotKey::new(parse_day(&day)?, period, parse_class(&class)?);
    let codes = state.lock()?.eligible(&slot)?;
    Ok(HttpResponse::Ok().json(codes))
}

async fn get_monitor(session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let rows = state.lock()?.monitor();
    Ok(HttpResponse::Ok().json(rows))
}

async fn get_class_timetable(
    class: web::Path<String>,
    session: Session,
    state: Shared,
) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let entries = state.lock()?.class_timetable(&parse_class(&class)?)?;
    Ok(HttpResponse::Ok().json(entries))
}

async fn get_teacher_timetable(
    name: web::Path<String>,
    session: Session,
    state: Shared,
) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let entries = state.lock()?.teacher_timetable(&name)?;
    Ok(HttpResponse::Ok().json(entries))
}

#[derive(Deserialize)]
pub struct BlocksQuery {
    date: NaiveDate,
}

async fn get_teaching_blocks(
    name: web::Path<String>,
    query: web::Query<BlocksQuery>,
    session: Session,
    state: Shared,
) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let blocks = state.lock()?.teaching_blocks(&name, query.date);
    let labelled: Vec<serde_json::Value> = blocks
        .iter()
        .map(|b| serde_json::json!({"label": b.label(), "block": b}))
        .collect();
    Ok(HttpResponse::Ok().json(labelled))
}

async fn import_schedule(body: web::Bytes, session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    let summary = state.lock()?.import_sheet(&role, body.as_ref())?;
    Ok(HttpResponse::Ok().json(summary))
}

async fn import_roster(body: web::Bytes, session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    let count = state.lock()?.import_roster(&role, body.as_ref())?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "teachers": count})))
}

async fn export_sheet(kind: web::Path<String>, session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let mut buf = Vec::new();
    let filename = match kind.as_str() {
        "template" => {
            state.lock()?.export_template(&mut buf)?;
            "jadwal_template.csv"
        }
        "master" => {
            state.lock()?.export_master(&mut buf)?;
            "jadwal_master.csv"
        }
        other => return Err(AppError::NotFound(format!("Unknown export: {}", other))),
    };
    Ok(csv_download(buf, filename))
}

async fn save(session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    let queue = state.lock()?.save_schedule(&role)?;
    queue.flush().await;
    let sync = state.lock()?.sync_status();
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "sync": sync})))
}

#[derive(Deserialize)]
pub struct RefreshQuery {
    #[serde(default = "interactive")]
    mode: RefreshMode,
    #[serde(default)]
    confirm: bool,
}

fn interactive() -> RefreshMode {
    RefreshMode::Interactive
}

async fn refresh(query: web::Query<RefreshQuery>, session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    // overriding the suspicious-snapshot guard replaces shared data
    if query.confirm {
        role.require_admin()?;
    }
    let remote = state.lock()?.remote();
    let snapshot = if remote.is_configured() { remote.fetch_all().await } else { None };
    let outcome = state.lock()?.apply_remote(snapshot, query.mode, query.confirm)?;
    Ok(HttpResponse::Ok().json(outcome))
}

async fn toggle_unavailable(
    path: web::Path<(String, String)>,
    session: Session,
    state: Shared,
) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    let (code, day) = path.into_inner();
    let blocked = state.lock()?.toggle_unavailable(&role, &code, parse_day(&day)?)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "unavailable": blocked})))
}

async fn get_unavailable(session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    current_role(&session)?;
    let app = state.lock()?;
    Ok(HttpResponse::Ok().json(app.unavailability()))
}

async fn put_settings(req: web::Json<AppSettings>, session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    state.lock()?.update_settings(&role, req.into_inner())?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn put_auth(req: web::Json<AuthSettings>, session: Session, state: Shared) -> Result<HttpResponse, AppError> {
    let role = current_role(&session)?;
    state.lock()?.update_auth(&role, req.into_inner())?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn index() -> HttpResponse {
    let html = include_str!("../templates/index.html");
    HttpResponse::Ok().content_type("text/html").body(html)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/api/login", web::post().to(login))
        .route("/api/logout", web::post().to(logout))
        .route("/api/status", web::get().to(status))
        .route("/api/schedule/{day}", web::get().to(get_schedule))
        .route("/api/schedule/{day}/{period}/{class}", web::put().to(put_cell))
        .route("/api/eligible/{day}/{period}/{class}", web::get().to(get_eligible))
        .route("/api/monitor", web::get().to(get_monitor))
        .route("/api/timetable/class/{class}", web::get().to(get_class_timetable))
        .route("/api/timetable/teacher/{name}", web::get().to(get_teacher_timetable))
        .route("/api/blocks/{name}", web::get().to(get_teaching_blocks))
        .route("/api/import", web::post().to(import_schedule))
        .route("/api/roster", web::post().to(import_roster))
        .route("/api/export/{kind}", web::get().to(export_sheet))
        .route("/api/save", web::post().to(save))
        .route("/api/refresh", web::post().to(refresh))
        .route("/api/unavailable", web::get().to(get_unavailable))
        .route("/api/unavailable/{code}/{day}", web::put().to(toggle_unavailable))
        .route("/api/settings", web::put().to(put_settings))
        .route("/api/auth", web::put().to(put_auth));
}

pub async fn start_server(port: u16, app: AppState) -> std::io::Result<()> {
    let state = web::Data::new(WebState::new(app));
    // sessions end with the process
    let key = Key::generate();

    info!(port, "Starting web server");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
                    .cookie_secure(false)
                    .session_lifecycle(PersistentSession::default().session_ttl(time::Duration::hours(12)))
                    .build(),
            )
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "static"))
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::default_layout;
    use crate::store::{MemoryStore, PersistenceGateway, SheetEndpoint};
    use actix_web::test;
    use std::sync::Arc;
    use std::time::Duration;

    fn web_state() -> web::Data<WebState> {
        let remote = Arc::new(SheetEndpoint::new(None, Duration::from_secs(1)).unwrap());
        let gateway = PersistenceGateway::new(Box::new(MemoryStore::new()), remote, Duration::from_millis(50));
        web::Data::new(WebState::new(AppState::load(default_layout(), gateway, "rahasia")))
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .wrap(SessionMiddleware::new(CookieSessionStore::default(), Key::generate()))
                    .configure(configure),
            )
            .await
        };
    }

    macro_rules! login_cookie {
        ($app:expr, $password:expr) => {{
            let req = test::TestRequest::post()
                .uri("/api/login")
                .set_json(serde_json::json!({"password": $password}))
                .to_request();
            let resp = test::call_service(&$app, req).await;
            assert!(resp.status().is_success());
            resp.response().cookies().next().map(|c| c.into_owned()).unwrap()
        }};
    }

    #[actix_web::test]
    async fn requests_without_session_are_rejected() {
        let state = web_state();
        let app = test_app!(state);
        let req = test::TestRequest::get().uri("/api/monitor").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn admin_assigns_and_reads_back() {
        let state = web_state();
        let app = test_app!(state);
        let cookie = login_cookie!(app, "rahasia");

        let req = test::TestRequest::put()
            .uri("/api/schedule/SENIN/1/VII%20A")
            .cookie(cookie.clone())
            .set_json(serde_json::json!({"code": "mtk-1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::get()
            .uri("/api/export/template")
            .cookie(cookie)
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("SENIN,1,07.40 - 08.20,MTK-1"));
    }

    #[actix_web::test]
    async fn wrong_password_is_unauthorized() {
        let state = web_state();
        let app = test_app!(state);
        let req = test::TestRequest::post()
            .uri("/api/login")
            .set_json(serde_json::json!({"password": "salah"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_without_endpoint_reports_it() {
        let state = web_state();
        let app = test_app!(state);
        let cookie = login_cookie!(app, "rahasia");
        let req = test::TestRequest::post().uri("/api/refresh").cookie(cookie).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "not_configured");
    }

    #[actix_web::test]
    async fn only_admin_confirms_a_refresh() {
        let state = web_state();
        let mut auth = AuthSettings::default();
        auth.teacher_passwords.insert("Budi".to_string(), "budi1".to_string());
        state.lock().unwrap().update_auth(&Role::Admin, auth).unwrap();
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/login")
            .set_json(serde_json::json!({"username": "Budi", "password": "budi1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let cookie = resp.response().cookies().next().map(|c| c.into_owned()).unwrap();

        let req = test::TestRequest::post()
            .uri("/api/refresh?confirm=true")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);

        let req = test::TestRequest::post().uri("/api/refresh").cookie(cookie).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "not_configured");
    }
}
