//! HTTP service module.
//!
//! Exposes the record store and the search engine over HTTP:
//!
//! - `GET /` welcome message
//! - `GET /all` every stored record, unranked, as `{ "count", "faculty" }`
//! - `GET /healthz` liveness probe
//! - `GET /search?q=..&top_k=..&min_score=..` ranked hits as JSON
//! - `GET /dashboard?q=..` the same search rendered as an HTML page
//!
//! A missing database is never an error at this layer: it renders as an
//! empty result. An unavailable embedding model maps to 503.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::models::{FacultyRecord, SearchResult, SearchSettings};
use crate::query::{QueryError, SearchEngine, SearchQuery};
use crate::storage::{RecordStore, StorageError};

const WELCOME: &str = "Welcome to the Faculty API. Use /all to see data.";

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The embedding model cannot serve requests right now
    #[error("Search unavailable: {0}")]
    Unavailable(String),

    /// Storage access failed
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryError> for ServerError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidQuery(msg) => ServerError::InvalidRequest(msg),
            QueryError::EmbeddingUnavailable(msg) => ServerError::Unavailable(msg),
            QueryError::NoData(msg) | QueryError::StorageError(msg) => ServerError::Storage(msg),
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        ServerError::Storage(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (host:port)
    pub bind: String,

    /// SQLite database holding the faculty table
    pub db_path: PathBuf,

    /// Model cache directory; `None` uses the fastembed default
    pub model_cache_dir: Option<PathBuf>,

    /// Defaults for `/search` and `/dashboard`
    pub settings: SearchSettings,

    /// Upper bound on `top_k` accepted from clients
    pub max_top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            db_path: PathBuf::from("faculty_data.db"),
            model_cache_dir: None,
            settings: SearchSettings::DASHBOARD,
            max_top_k: 50,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<dyn SearchEngine>,
    store: Arc<dyn RecordStore>,
    settings: SearchSettings,
    max_top_k: usize,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        store: Arc<dyn RecordStore>,
        settings: SearchSettings,
        max_top_k: usize,
    ) -> Self {
        Self {
            engine,
            store,
            settings,
            max_top_k: max_top_k.max(1),
        }
    }

    /// Run a search, turning a missing database into an empty result.
    ///
    /// The flag is `true` when there was no data to search.
    async fn search(&self, query: SearchQuery) -> ServerResult<(Vec<SearchResult>, bool)> {
        match self.engine.search(&query).await {
            Ok(results) => Ok((results, false)),
            Err(QueryError::NoData(msg)) => {
                warn!("Search without data: {}", msg);
                Ok((Vec::new(), true))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Number of stored records; `None` when there is no database yet.
    async fn record_count(&self) -> ServerResult<Option<usize>> {
        match self.store.count().await {
            Ok(count) => Ok(Some(count)),
            Err(StorageError::NoData(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/all", get(all_faculty))
        .route("/healthz", get(healthz))
        .route("/search", get(search_handler))
        .route("/dashboard", get(dashboard))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct WelcomeBody {
    message: &'static str,
}

async fn home() -> Json<WelcomeBody> {
    Json(WelcomeBody { message: WELCOME })
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
struct AllFacultyBody {
    count: usize,
    faculty: Vec<FacultyRecord>,
}

async fn all_faculty(State(state): State<AppState>) -> ServerResult<Json<AllFacultyBody>> {
    let faculty = match state.store.read_all().await {
        Ok(records) => records,
        Err(StorageError::NoData(msg)) => {
            warn!("Listing without data: {}", msg);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(AllFacultyBody {
        count: faculty.len(),
        faculty,
    }))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    min_score: Option<f32>,
}

#[derive(Debug, Serialize)]
struct SearchBody {
    query: String,
    count: usize,
    no_data: bool,
    results: Vec<SearchResult>,
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ServerResult<Json<SearchBody>> {
    let text = params.q.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ServerError::InvalidRequest("query parameter 'q' must not be empty".to_string()));
    }

    let settings = SearchSettings::new(
        params.top_k.unwrap_or(state.settings.top_k).min(state.max_top_k),
        params.min_score.unwrap_or(state.settings.min_score),
    );
    let (results, no_data) = state.search(SearchQuery::new(text.clone(), settings)).await?;

    Ok(Json(SearchBody {
        query: text,
        count: results.len(),
        no_data,
        results,
    }))
}

#[derive(Debug, Deserialize)]
struct DashboardParams {
    #[serde(default)]
    q: Option<String>,
}

async fn dashboard(State(state): State<AppState>, Query(params): Query<DashboardParams>) -> Response {
    let query = params.q.unwrap_or_default();
    let query = query.trim();

    let count = match state.record_count().await {
        Ok(count) => count,
        Err(e) => return render_error(&e),
    };

    let mut body = String::new();
    match count {
        Some(n) => body.push_str(&format!(
            "<p class=\"status ok\">Connected: {} faculty members found.</p>\n",
            n
        )),
        None => body.push_str(
            "<p class=\"status missing\">No data found. Run the ingestion step to build the database.</p>\n",
        ),
    }

    if !query.is_empty() {
        match state.search(SearchQuery::new(query, state.settings)).await {
            Ok((_, true)) => {}
            Ok((results, false)) => body.push_str(&render_results(query, &results)),
            Err(e) => return render_error(&e),
        }
    }

    Html(page(query, &body)).into_response()
}

fn page(query: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Faculty Finder</title>\n</head>\n<body>\n\
         <h1>Faculty Recommender System</h1>\n\
         <p>Search by research topic, name, or specialization.</p>\n\
         <form method=\"get\" action=\"/dashboard\">\n\
         <input type=\"text\" name=\"q\" value=\"{}\" placeholder=\"e.g. 'Arpit Rana' or 'Machine Learning'\">\n\
         <button type=\"submit\">Search</button>\n</form>\n{}</body>\n</html>\n",
        escape_html(query),
        body
    )
}

fn render_error(err: &ServerError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!("{}", err);
    }
    let body = format!("<p class=\"status error\">{}</p>\n", escape_html(&err.to_string()));
    (status, Html(page("", &body))).into_response()
}

fn render_results(query: &str, results: &[SearchResult]) -> String {
    let mut html = format!("<h2>Top Matches for '{}'</h2>\n", escape_html(query));
    if results.is_empty() {
        html.push_str("<p>No matching faculty found.</p>\n");
        return html;
    }

    for result in results {
        let record = &result.record;
        html.push_str("<div class=\"hit\">\n");
        html.push_str(&format!(
            "<h3>{}</h3>\n<p class=\"score\">Match Score: {:.1}%</p>\n<ul>\n",
            escape_html(record.display_name()),
            result.score
        ));

        let fields = [
            ("Email", record.email.as_deref(), "N/A"),
            ("Phone", record.phone.as_deref(), "N/A"),
            ("Address", record.address.as_deref(), "N/A"),
            ("Education", record.education.as_deref(), "N/A"),
            ("Specialization", record.specialization.as_deref(), "N/A"),
            ("Biography", record.biography.as_deref(), "No biography provided."),
            ("Teaching", record.teaching.as_deref(), "No teaching info available."),
            ("Research", record.research.as_deref(), "N/A"),
            ("Publications", record.publications.as_deref(), "N/A"),
        ];
        for (label, value, fallback) in fields {
            let value = value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback);
            html.push_str(&format!(
                "<li><strong>{}:</strong> {}</li>\n",
                label,
                escape_html(value)
            ));
        }
        html.push_str("</ul>\n");

        if let Some(url) = record.profile_url.as_deref().filter(|u| !u.trim().is_empty()) {
            html.push_str(&format!(
                "<a href=\"{}\">View Full Profile</a>\n",
                escape_html(url)
            ));
        }
        html.push_str("</div>\n<hr>\n");
    }

    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, EmbeddingProvider};
    use crate::models::NOT_AVAILABLE;
    use crate::query::SemanticSearchEngine;
    use crate::storage::UpsertOutcome;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    /// One dimension per known keyword, so rankings are easy to predict.
    struct KeywordEmbedding {
        available: bool,
    }

    const KEYWORDS: [&str; 4] = ["retrieval", "robotics", "vlsi", "rana"];

    fn keyword_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        // Keeps unmatched text away from the zero vector
        vector.push(0.1);
        vector
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if !self.available {
                return Err(EmbeddingError::Unavailable("model not downloaded".to_string()));
            }
            Ok(keyword_vector(text))
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if !self.available {
                return Err(EmbeddingError::Unavailable("model not downloaded".to_string()));
            }
            Ok(texts.iter().map(|t| keyword_vector(t)).collect())
        }

        fn dimension(&self) -> usize {
            KEYWORDS.len() + 1
        }

        fn model_name(&self) -> &str {
            "keywords"
        }
    }

    struct MemoryStore {
        records: Option<Vec<FacultyRecord>>,
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn initialize(&self) -> Result<u32, StorageError> {
            Ok(3)
        }

        async fn upsert_all(&self, _records: &[FacultyRecord]) -> Result<UpsertOutcome, StorageError> {
            Ok(UpsertOutcome::default())
        }

        async fn read_all(&self) -> Result<Vec<FacultyRecord>, StorageError> {
            self.records
                .clone()
                .ok_or_else(|| StorageError::NoData("faculty_data.db does not exist".to_string()))
        }

        async fn count(&self) -> Result<usize, StorageError> {
            self.read_all().await.map(|records| records.len())
        }
    }

    fn records() -> Vec<FacultyRecord> {
        vec![
            FacultyRecord {
                id: Some(1),
                name: Some("Arpit Rana".to_string()),
                profile_url: Some("https://www.daiict.ac.in/faculty/arpit-rana".to_string()),
                email: Some("arpit_rana@daiict.ac.in".to_string()),
                research: Some("Information Retrieval".to_string()),
                specialization: Some(NOT_AVAILABLE.to_string()),
                ..FacultyRecord::default()
            },
            FacultyRecord {
                id: Some(2),
                name: Some("Abhishek Gupta".to_string()),
                profile_url: Some("https://www.daiict.ac.in/faculty/abhishek-gupta".to_string()),
                research: Some("Robotics <and> control".to_string()),
                specialization: Some(NOT_AVAILABLE.to_string()),
                ..FacultyRecord::default()
            },
        ]
    }

    fn app(records: Option<Vec<FacultyRecord>>, available: bool) -> Router {
        let store = Arc::new(MemoryStore { records });
        let engine = SemanticSearchEngine::new(KeywordEmbedding { available }, Arc::clone(&store));
        router(AppState::new(
            Arc::new(engine),
            store,
            SearchSettings::DASHBOARD,
            50,
        ))
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_home_and_health() {
        let (status, body) = fetch(app(Some(records()), true), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Welcome to the Faculty API"));

        let (status, _) = fetch(app(None, false), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_all_returns_every_record() {
        let (status, body) = fetch(app(Some(records()), true), "/all").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["faculty"][0]["name"], "Arpit Rana");
        assert_eq!(json["faculty"][1]["id"], 2);
    }

    #[tokio::test]
    async fn test_all_without_database_is_empty() {
        let (status, body) = fetch(app(None, true), "/all").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 0);
        assert!(json["faculty"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_matching_record_first() {
        let (status, body) = fetch(app(Some(records()), true), "/search?q=robotics").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["results"][0]["record"]["name"], "Abhishek Gupta");
        assert!(json["results"][0]["score"].as_f64().unwrap() > 90.0);
        assert_eq!(json["no_data"], false);
    }

    #[tokio::test]
    async fn test_search_respects_top_k_and_min_score() {
        let (_, body) = fetch(app(Some(records()), true), "/search?q=robotics&top_k=1&min_score=-100").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 1);

        let (_, body) = fetch(app(Some(records()), true), "/search?q=robotics&min_score=100").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let (status, _) = fetch(app(Some(records()), true), "/search?q=%20%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = fetch(app(Some(records()), true), "/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_without_model_is_unavailable() {
        let (status, body) = fetch(app(Some(records()), false), "/search?q=robotics").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("model not downloaded"));
    }

    #[tokio::test]
    async fn test_search_without_database_is_empty() {
        let (status, body) = fetch(app(None, true), "/search?q=robotics").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 0);
        assert_eq!(json["no_data"], true);
    }

    #[tokio::test]
    async fn test_dashboard_renders_hits_with_fallbacks() {
        let (status, body) = fetch(app(Some(records()), true), "/dashboard?q=robotics").await;
        assert_eq!(status, StatusCode::OK);

        assert!(body.contains("Connected: 2 faculty members found."));
        assert!(body.contains("<h3>Abhishek Gupta</h3>"));
        assert!(body.contains("Robotics &lt;and&gt; control"));
        assert!(body.contains("<strong>Email:</strong> N/A"));
        assert!(body.contains("No biography provided."));
        assert!(body.contains("href=\"https://www.daiict.ac.in/faculty/abhishek-gupta\""));
    }

    #[tokio::test]
    async fn test_dashboard_without_match() {
        let store_records = vec![records().remove(1)];
        let (status, body) = fetch(app(Some(store_records), true), "/dashboard?q=vlsi").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No matching faculty found."));
    }

    #[tokio::test]
    async fn test_dashboard_without_database() {
        let (status, body) = fetch(app(None, true), "/dashboard?q=robotics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No data found."));
        assert!(!body.contains("Top Matches"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }
}
