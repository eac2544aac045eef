use axum::extract::DefaultBodyLimit;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::server::api;
use crate::server::AppState;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(api::health))
        .route("/process", post(api::process))
        .route("/process_dashboard", post(api::process_dashboard))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>SKU Ledger</title>
  <style>
    body { font-family: Arial, sans-serif; max-width: 720px; margin: 24px auto; padding: 0 12px; }
    h1 { margin-bottom: 8px; }
    .card { border: 1px solid #ddd; border-radius: 8px; padding: 14px; margin: 14px 0; }
    label { display:block; margin: 8px 0 4px; font-weight: 600; }
    input, select { width: 100%; padding: 8px; box-sizing: border-box; }
    button { margin-top: 12px; padding: 8px 14px; }
  </style>
</head>
<body>
  <h1>SKU Ledger</h1>
  <p>Upload order exports, settlement statements and the consumption sheet to get the SKU financial workbook.</p>

  <form class="card" method="post" action="/process" enctype="multipart/form-data">
    <label for="analysis_type">Region</label>
    <select id="analysis_type" name="analysis_type">
      <option value="indonesia">Indonesia (IDR)</option>
      <option value="malaysia">Malaysia (MYR)</option>
    </select>
    <label for="orders">Order files</label>
    <input id="orders" name="orders" type="file" accept=".xlsx,.xls" multiple required />
    <label for="settlements">Settlement files</label>
    <input id="settlements" name="settlements" type="file" accept=".xlsx,.xls" multiple required />
    <label for="consumption">Consumption file</label>
    <input id="consumption" name="consumption" type="file" accept=".xlsx,.xls" required />
    <button type="submit">Download workbook</button>
  </form>
</body>
</html>
"#;
