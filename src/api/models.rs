use tracing::warn;

use crate::api::{ModelInfo, ModelsResponse};
use crate::utils::url::construct_api_url;

/// Candidates tried first when no model is configured, in order of
/// preference. Flash models come first for their friendlier quotas.
pub const PREFERRED_MODELS: &[&str] = &[
    "gemini-flash-latest",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-pro-latest",
];

const GENERATE_CONTENT_METHOD: &str = "generateContent";

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<ModelsResponse, Box<dyn std::error::Error>> {
    let models_url = construct_api_url(base_url, "models");
    let response = client
        .get(models_url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", api_key)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(format!("API request failed with status {status}: {error_text}").into());
    }

    let models_response = response.json::<ModelsResponse>().await?;
    Ok(models_response)
}

/// Strip the `models/` prefix the listing endpoint puts on every name.
pub fn short_model_name(name: &str) -> &str {
    name.strip_prefix("models/").unwrap_or(name)
}

pub fn supports_generation(model: &ModelInfo) -> bool {
    model
        .supported_generation_methods
        .iter()
        .any(|method| method == GENERATE_CONTENT_METHOD)
}

/// Names of the listed models that can serve chat completions.
pub fn generation_capable_models(response: &ModelsResponse) -> Vec<String> {
    response
        .models
        .iter()
        .filter(|model| supports_generation(model))
        .map(|model| short_model_name(&model.name).to_string())
        .collect()
}

/// Pick a chat model from the available names: preferred candidates first
/// (substring match), then any non-experimental flash model.
pub fn select_model(available: &[String]) -> Option<String> {
    for preferred in PREFERRED_MODELS {
        if let Some(name) = available
            .iter()
            .find(|name| name.to_lowercase().contains(preferred))
        {
            return Some(name.clone());
        }
    }

    available
        .iter()
        .find(|name| {
            let lower = name.to_lowercase();
            lower.contains("flash") && !lower.contains("exp")
        })
        .cloned()
}

/// Resolve the model to use at startup. Lists the models the key can reach
/// and picks the best match; when listing fails, falls back to the first
/// preferred candidate and lets the first send surface any problem.
pub async fn resolve_startup_model(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> String {
    match fetch_models(client, base_url, api_key).await {
        Ok(response) => {
            let available = generation_capable_models(&response);
            match select_model(&available) {
                Some(model) => model,
                None => {
                    warn!("no usable model in listing, falling back to default candidate");
                    PREFERRED_MODELS[0].to_string()
                }
            }
        }
        Err(e) => {
            warn!("model listing failed ({e}), falling back to default candidate");
            PREFERRED_MODELS[0].to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, methods: &[&str]) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            display_name: None,
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn short_model_name_strips_prefix() {
        assert_eq!(short_model_name("models/gemini-2.5-flash"), "gemini-2.5-flash");
        assert_eq!(short_model_name("gemini-2.5-flash"), "gemini-2.5-flash");
    }

    #[test]
    fn generation_capable_models_filters_by_method() {
        let response = ModelsResponse {
            models: vec![
                model("models/gemini-2.5-flash", &["generateContent", "countTokens"]),
                model("models/embedding-001", &["embedContent"]),
            ],
        };

        assert_eq!(
            generation_capable_models(&response),
            vec!["gemini-2.5-flash".to_string()]
        );
    }

    #[test]
    fn select_model_prefers_candidates_in_order() {
        let available = vec![
            "gemini-pro-latest".to_string(),
            "gemini-2.0-flash".to_string(),
            "gemini-2.5-flash".to_string(),
        ];

        assert_eq!(select_model(&available), Some("gemini-2.5-flash".to_string()));
    }

    #[test]
    fn select_model_falls_back_to_non_experimental_flash() {
        let available = vec![
            "gemini-weird-exp-flash".to_string(),
            "gemini-1.5-flash-002".to_string(),
        ];

        assert_eq!(
            select_model(&available),
            Some("gemini-1.5-flash-002".to_string())
        );
    }

    #[test]
    fn select_model_with_no_match_returns_none() {
        let available = vec!["embedding-001".to_string()];
        assert_eq!(select_model(&available), None);
    }
}
