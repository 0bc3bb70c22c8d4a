//! Model listing for the `models` subcommand.

use std::error::Error;

use crate::api::models::{fetch_models, short_model_name, supports_generation};
use crate::core::config::Config;
use crate::core::credentials::resolve_api_key;

pub async fn list_models(config: &Config, base_url: &str) -> Result<(), Box<dyn Error>> {
    let api_key = resolve_api_key(config)?;

    let client = reqwest::Client::new();
    let models_response = fetch_models(&client, base_url, &api_key).await?;

    if models_response.models.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    if let Some(default_model) = &config.default_model {
        println!("Default model: {default_model} (from config)");
        println!();
    }

    println!("Found {} models:", models_response.models.len());
    for model in &models_response.models {
        let name = short_model_name(&model.name);
        let marker = if supports_generation(model) {
            "chat"
        } else {
            "    "
        };
        match &model.display_name {
            Some(display_name) => println!("  [{marker}] {name}  ({display_name})"),
            None => println!("  [{marker}] {name}"),
        }
    }

    Ok(())
}
