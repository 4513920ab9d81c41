use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Form, State};
use axum::response::Html;
use axum::routing::{get, post};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::model::{Outcome, TeamSnapshot, WinClassifier, feature_vector};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const MESSAGE_SLOT: &str = "<!-- message -->";

const WIN_MESSAGE: &str = "You are a true winner.";
const LOSS_MESSAGE: &str = "Try focusing on dragons and bottom lane vision.";

pub async fn serve(model: WinClassifier, port: u16) -> Result<()> {
    let app = router(Arc::new(model));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!(port = listener.local_addr()?.port(), "prediction endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(model: Arc<WinClassifier>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/test", post(predict))
        .with_state(model)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn predict(
    State(model): State<Arc<WinClassifier>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Html<String> {
    match evaluate(&model, &fields) {
        Ok(Outcome::Favorable) => Html(render_message(WIN_MESSAGE)),
        Ok(Outcome::Unfavorable) => Html(render_message(LOSS_MESSAGE)),
        // Input faults come back as their bare text, framework-default
        // status. Non-production tooling, the transparency is wanted.
        Err(err) => Html(format!("{:#}", err)),
    }
}

fn evaluate(model: &WinClassifier, fields: &HashMap<String, String>) -> Result<Outcome> {
    let snapshot = snapshot_from_fields(fields)?;
    Ok(model.predict(&feature_vector(&snapshot)).into())
}

fn snapshot_from_fields(fields: &HashMap<String, String>) -> Result<TeamSnapshot> {
    Ok(TeamSnapshot {
        top_vs: required_int(fields, "top_vs")?,
        jun_vs: required_int(fields, "jun_vs")?,
        mid_vs: required_int(fields, "mid_vs")?,
        adc_vs: required_int(fields, "adc_vs")?,
        sup_vs: required_int(fields, "sup_vs")?,
        top_mastery: required_int(fields, "top_mastery")?,
        jun_mastery: required_int(fields, "jun_mastery")?,
        mid_mastery: required_int(fields, "mid_mastery")?,
        adc_mastery: required_int(fields, "adc_mastery")?,
        sup_mastery: required_int(fields, "sup_mastery")?,
        // Checkbox semantics: presence is all that matters.
        first_blood: fields.contains_key("first_blood"),
        first_brick: fields.contains_key("first_brick"),
        first_dragon: fields.contains_key("first_dragon"),
        first_herald: fields.contains_key("first_herald"),
    })
}

fn required_int(fields: &HashMap<String, String>, name: &str) -> Result<i64> {
    let raw = fields
        .get(name)
        .with_context(|| format!("missing field {}", name))?;
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("field {} is not an integer: {:?}", name, raw))
}

fn render_message(message: &str) -> String {
    INDEX_HTML.replace(
        MESSAGE_SLOT,
        &format!("<p class=\"result\">{}</p>", message),
    )
}
