//! Known chat-completions backends.

/// Chat endpoint relative to a backend's API base.
pub const CHAT_COMPLETIONS: &str = "/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <key>`, key required.
    Bearer,
    /// Local servers.
    Anonymous,
}

/// A named backend speaking the OpenAI chat dialect.
#[derive(Debug, Clone)]
pub struct Backend {
    pub id: &'static str,
    pub api_base: &'static str,
    /// Environment variables holding the key, tried in order.
    pub key_vars: &'static [&'static str],
    pub auth: Auth,
    /// Environment variable that relocates `api_base`.
    pub base_var: Option<&'static str>,
}

const fn hosted(id: &'static str, api_base: &'static str, key_vars: &'static [&'static str]) -> Backend {
    Backend { id, api_base, key_vars, auth: Auth::Bearer, base_var: None }
}

static BACKENDS: &[Backend] = &[
    Backend { base_var: Some("OPENAI_BASE_URL"), ..hosted("openai", "https://api.openai.com/v1", &["OPENAI_API_KEY"]) },
    hosted("openrouter", "https://openrouter.ai/api/v1", &["OPENROUTER_API_KEY"]),
    hosted("groq", "https://api.groq.com/openai/v1", &["GROQ_API_KEY"]),
    hosted("mistral", "https://api.mistral.ai/v1", &["MISTRAL_API_KEY"]),
    Backend {
        id: "ollama",
        api_base: "http://localhost:11434/v1",
        key_vars: &[],
        auth: Auth::Anonymous,
        base_var: Some("OLLAMA_HOST"),
    },
];

/// Find a backend by id or alias.
pub fn lookup(name: &str) -> Option<&'static Backend> {
    let name = name.trim().to_ascii_lowercase();
    let id = match name.as_str() {
        "chatgpt" => "openai",
        "mistralai" => "mistral",
        other => other,
    };
    BACKENDS.iter().find(|b| b.id == id)
}

pub fn ids() -> Vec<&'static str> {
    BACKENDS.iter().map(|b| b.id).collect()
}
