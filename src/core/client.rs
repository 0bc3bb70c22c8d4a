use reqwest::Client;

/// Default endpoint for the hosted completion API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Handle to the remote completion endpoint.
///
/// Sessions hold this as an `Option`: `None` means the client could not be
/// initialized at startup and every send is rejected until restart.
#[derive(Clone)]
pub struct ChatClient {
    pub http: Client,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ChatClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}
