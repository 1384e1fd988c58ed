//! Supported recognition languages

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ocr::LanguageCode;
use crate::state::AppState;

#[derive(Serialize)]
pub struct LanguageOption {
    pub code: LanguageCode,
    pub name: &'static str,
}

#[derive(Serialize)]
pub struct LanguagesResponse {
    pub default: LanguageCode,
    pub languages: Vec<LanguageOption>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_languages))
}

async fn list_languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        default: state.config().ocr.default_language,
        languages: LanguageCode::ALL
            .into_iter()
            .map(|code| LanguageOption {
                code,
                name: code.display_name(),
            })
            .collect(),
    })
}
