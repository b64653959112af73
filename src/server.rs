use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::store::{slot_time, BallotLog, VoteRow, VoteTable, TIME_FORMAT};
use crate::tally::{HistogramBucket, Tally, Window};
use crate::validate::{named_player, parse_time, validate_slot};

#[derive(Clone)]
struct ApiState {
    config: Config,
    votes_path: PathBuf,
    ballots_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ResultsResponse {
    rows: Vec<VoteRow>,
    best_window: Option<Window>,
}

#[derive(Debug, Serialize)]
struct HistogramResponse {
    buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Deserialize)]
struct VoteRequest {
    date: NaiveDate,
    time: String,
    player: Option<String>,
}

#[derive(Debug, Serialize)]
struct VoteOutcome {
    #[serde(with = "slot_time")]
    start_time: NaiveDateTime,
    votes: u32,
}

#[derive(Debug, Deserialize)]
struct VoteForm {
    date: NaiveDate,
    time: String,
    #[serde(default)]
    player: String,
}

enum Banner {
    Recorded(String),
    Rejected(String),
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState {
        votes_path: config.resolved_votes_path(),
        ballots_path: config.resolved_ballots_path(),
        config,
    };

    let app = Router::new()
        .route("/", get(poll_page))
        .route("/vote", post(submit_form))
        .route("/health", get(health))
        .route("/v1/results", get(results))
        .route("/v1/window", get(window))
        .route("/v1/histogram", get(histogram))
        .route("/v1/vote", post(vote))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("poll page on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn results(State(state): State<ApiState>) -> ApiResult<ResultsResponse> {
    let table = load_table(&state)?;
    let tally = Tally::from_table(&table, state.config.poll.span_hours);
    Ok(ok(ResultsResponse {
        rows: table.sorted_rows(),
        best_window: tally.best_window(state.config.poll.span_hours),
    }))
}

async fn window(State(state): State<ApiState>) -> ApiResult<Option<Window>> {
    let table = load_table(&state)?;
    let tally = Tally::from_table(&table, state.config.poll.span_hours);
    Ok(ok(tally.best_window(state.config.poll.span_hours)))
}

async fn histogram(State(state): State<ApiState>) -> ApiResult<HistogramResponse> {
    let table = load_table(&state)?;
    let tally = Tally::from_table(&table, state.config.poll.span_hours);
    Ok(ok(HistogramResponse {
        buckets: tally.buckets(),
    }))
}

async fn vote(
    State(state): State<ApiState>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<VoteOutcome> {
    let player = request.player.as_deref().and_then(named_player);
    let outcome = cast_vote(&state, request.date, &request.time, player)?;
    Ok(ok(outcome))
}

async fn poll_page(State(state): State<ApiState>) -> std::result::Result<Html<String>, ApiError> {
    render_page(&state, None)
}

async fn submit_form(
    State(state): State<ApiState>,
    Form(form): Form<VoteForm>,
) -> std::result::Result<Html<String>, ApiError> {
    let player = named_player(&form.player);
    let banner = match cast_vote(&state, form.date, &form.time, player) {
        Ok(outcome) => Banner::Recorded(format!(
            "Recorded vote for {} ({} total).",
            outcome.start_time.format(TIME_FORMAT),
            outcome.votes
        )),
        Err(err) if err.status == StatusCode::BAD_REQUEST => Banner::Rejected(err.message),
        Err(err) => return Err(err),
    };
    render_page(&state, Some(banner))
}

/// Validate, upsert, append the ballot when a player is named, persist.
/// Reload-mutate-save per request; the files are unlocked shared state and
/// concurrent submissions are last-writer-wins.
fn cast_vote(
    state: &ApiState,
    date: NaiveDate,
    time: &str,
    player: Option<&str>,
) -> std::result::Result<VoteOutcome, ApiError> {
    let time = parse_time(time).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let slot = date.and_time(time);
    let deadline = state.config.parsed_deadline().map_err(ApiError::internal)?;
    validate_slot(slot, deadline).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut table = load_table(state)?;
    let votes = table.upsert(slot);
    if let Some(player) = player {
        BallotLog::record(&state.ballots_path, player).map_err(ApiError::internal)?;
    }
    table.save(&state.votes_path).map_err(ApiError::internal)?;
    Ok(VoteOutcome {
        start_time: slot,
        votes,
    })
}

fn load_table(state: &ApiState) -> std::result::Result<VoteTable, ApiError> {
    VoteTable::load(&state.votes_path).map_err(ApiError::internal)
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const PAGE_STYLE: &str = r#"
body { font-family: sans-serif; max-width: 54rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
h1 { margin-bottom: 0.2rem; }
h2 { color: #555; font-size: 1.1rem; margin-top: 0; }
form { border: 1px solid #ccc; border-radius: 6px; padding: 1rem; margin: 1rem 0; }
fieldset { border: none; padding: 0.4rem 0; }
table { border-collapse: collapse; margin: 0.6rem 0; }
th, td { border: 1px solid #bbb; padding: 0.3rem 0.8rem; text-align: left; }
.banner-ok { background: #e6f4e6; border: 1px solid #3a3; padding: 0.6rem; border-radius: 4px; }
.banner-err { background: #fbe9e9; border: 1px solid #c33; padding: 0.6rem; border-radius: 4px; }
.bar { background: #4a7fd4; color: #fff; padding: 0.1rem 0.3rem; margin: 0.15rem 0; white-space: nowrap; }
.best { font-weight: bold; }
"#;

fn render_page(
    state: &ApiState,
    banner: Option<Banner>,
) -> std::result::Result<Html<String>, ApiError> {
    let poll = &state.config.poll;
    let table = load_table(state)?;
    let tally = Tally::from_table(&table, poll.span_hours);
    let best = tally.best_window(poll.span_hours);
    let buckets = tally.buckets();
    let max_weight = buckets.iter().map(|b| b.weight).max().unwrap_or(0).max(1);
    let today = Local::now().date_naive();

    let mut page = String::new();
    let _ = write!(
        page,
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title><style>{PAGE_STYLE}</style></head><body>",
        html_escape(&poll.title)
    );
    let _ = write!(page, "<h1>{}</h1>", html_escape(&poll.title));
    if !poll.league.is_empty() {
        let _ = write!(page, "<h2>LEAGUE: {}</h2>", html_escape(&poll.league));
    }
    let _ = write!(
        page,
        "<p>Select your preferred date and time. The most common time window wins.</p><p>{}</p>",
        html_escape(&poll.notes)
    );

    match banner {
        Some(Banner::Recorded(message)) => {
            let _ = write!(page, "<p class=\"banner-ok\">{}</p>", html_escape(&message));
        }
        Some(Banner::Rejected(message)) => {
            let _ = write!(page, "<p class=\"banner-err\">{}</p>", html_escape(&message));
        }
        None => {}
    }

    // Submission form: date picker, hour-granularity time picker, optional
    // roster radio list.
    let _ = write!(
        page,
        "<form method=\"post\" action=\"/vote\">\
         <fieldset><label>Choose a date <input type=\"date\" name=\"date\" value=\"{today}\" required></label></fieldset>\
         <fieldset><label>Choose a time <input type=\"time\" name=\"time\" value=\"09:00\" step=\"3600\" required></label></fieldset>"
    );
    if !poll.players.is_empty() {
        page.push_str("<fieldset>Who is voting?");
        let _ = write!(
            page,
            "<label><input type=\"radio\" name=\"player\" value=\"None\" checked> None</label>"
        );
        for player in &poll.players {
            let escaped = html_escape(player);
            let _ = write!(
                page,
                "<label><input type=\"radio\" name=\"player\" value=\"{escaped}\"> {escaped}</label>"
            );
        }
        page.push_str("</fieldset>");
    }
    page.push_str("<button type=\"submit\">Vote</button></form>");

    // Results table, sorted by start time.
    page.push_str("<h3>Vote Results</h3>");
    if table.is_empty() {
        page.push_str("<p>No votes recorded yet.</p>");
    } else {
        page.push_str("<table><tr><th>Start Time</th><th>Votes</th></tr>");
        for row in table.sorted_rows() {
            let _ = write!(
                page,
                "<tr><td>{}</td><td>{}</td></tr>",
                row.start_time.format(TIME_FORMAT),
                row.votes
            );
        }
        page.push_str("</table>");
    }

    match best {
        Some(window) => {
            let _ = write!(
                page,
                "<p class=\"best\">The most common time window is from {} to {}.</p>",
                window.start.format(TIME_FORMAT),
                window.end.format(TIME_FORMAT)
            );
        }
        None => page.push_str("<p>No common time window determined yet.</p>"),
    }

    // Per-hour frequency chart as CSS bars scaled to the heaviest slot.
    page.push_str("<h3>Vote Frequency by Time</h3>");
    for bucket in &buckets {
        let percent = (u64::from(bucket.weight) * 100).div_ceil(u64::from(max_weight));
        let _ = write!(
            page,
            "<div class=\"bar\" style=\"width: {percent}%\">{} — {}</div>",
            bucket.slot.format("%Y-%m-%d %H:%M"),
            bucket.weight
        );
    }

    if !poll.players.is_empty() {
        let log = BallotLog::load(&state.ballots_path).map_err(ApiError::internal)?;
        page.push_str("<h3>Recorded Ballots</h3>");
        if log.is_empty() {
            page.push_str("<p>No ballots recorded yet.</p>");
        } else {
            page.push_str("<table><tr><th>Voted At</th><th>Player</th></tr>");
            for entry in log.entries() {
                let _ = write!(
                    page,
                    "<tr><td>{}</td><td>{}</td></tr>",
                    entry.voted_at.format(TIME_FORMAT),
                    html_escape(&entry.player)
                );
            }
            page.push_str("</table>");
        }
    }

    page.push_str("</body></html>");
    Ok(Html(page))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn test_state(dir: &TempDir) -> ApiState {
        ApiState {
            config: Config::default(),
            votes_path: dir.path().join("votes.csv"),
            ballots_path: dir.path().join("ballots.csv"),
        }
    }

    fn request(time: &str, player: Option<&str>) -> Json<VoteRequest> {
        Json(VoteRequest {
            date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            time: time.to_string(),
            player: player.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn vote_endpoint_persists_and_results_reflect_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);

        let Json(first) = vote(State(state.clone()), request("09:00", Some("Nick")))
            .await
            .expect("first vote");
        assert_eq!(first.data.votes, 1);

        let Json(second) = vote(State(state.clone()), request("09:00", None))
            .await
            .expect("second vote");
        assert_eq!(second.data.votes, 2);

        let Json(results) = results(State(state.clone())).await.expect("results");
        assert!(results.ok);
        assert_eq!(results.data.rows.len(), 1);
        assert_eq!(results.data.rows[0].votes, 2);
        let window = results.data.best_window.expect("window");
        assert_eq!(
            window.start,
            NaiveDate::from_ymd_opt(2024, 9, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );

        let log = BallotLog::load(&state.ballots_path).expect("ballots");
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].player, "Nick");
    }

    #[tokio::test]
    async fn non_hour_aligned_vote_is_rejected_and_not_stored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);

        let err = vote(State(state.clone()), request("09:30", None))
            .await
            .err()
            .expect("rejection");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let Json(results) = results(State(state)).await.expect("results");
        assert!(results.data.rows.is_empty());
    }

    #[tokio::test]
    async fn form_submission_renders_banner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);

        let form = |time: &str| {
            Form(VoteForm {
                date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                time: time.to_string(),
                player: "None".to_string(),
            })
        };

        let Html(page) = submit_form(State(state.clone()), form("19:00"))
            .await
            .expect("page");
        assert!(page.contains("Recorded vote for 2024-09-01 19:00:00"));

        let Html(page) = submit_form(State(state), form("19:15"))
            .await
            .expect("page");
        assert!(page.contains("banner-err"));
        assert!(page.contains("not on the hour"));
    }

    #[test]
    fn escapes_markup_in_names() {
        assert_eq!(html_escape("<b>&\"x\""), "&lt;b&gt;&amp;&quot;x&quot;");
    }
}
