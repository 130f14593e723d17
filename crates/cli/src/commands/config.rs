use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use toml::Value;
use tripdesk_core::config::{AppConfig, LoadOptions};

use crate::commands::{load_config, CommandResult};

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = explicit_path.filter(|path| path.exists()).or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];
    for (key, env_key, value) in effective_values(&config) {
        let source = field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, &'static str, String)> {
    vec![
        ("database.url", "TRIPDESK_DATABASE_URL", config.database.url.clone()),
        (
            "database.max_connections",
            "TRIPDESK_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        ("database.timeout_secs", "TRIPDESK_DATABASE_TIMEOUT_SECS", config.database.timeout_secs.to_string()),
        ("llm.provider", "TRIPDESK_LLM_PROVIDER", config.llm.provider.as_str().to_string()),
        ("llm.model", "TRIPDESK_LLM_MODEL", config.llm.model.clone()),
        ("llm.base_url", "TRIPDESK_LLM_BASE_URL", config.llm.effective_base_url()),
        ("llm.api_key", "TRIPDESK_LLM_API_KEY", redact_optional(config.llm.api_key.as_ref())),
        ("llm.temperature", "TRIPDESK_LLM_TEMPERATURE", config.llm.temperature.to_string()),
        ("llm.timeout_secs", "TRIPDESK_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        ("llm.max_retries", "TRIPDESK_LLM_MAX_RETRIES", config.llm.max_retries.to_string()),
        ("agent.history_limit", "TRIPDESK_AGENT_HISTORY_LIMIT", config.agent.history_limit.to_string()),
        ("agent.pacing_millis", "TRIPDESK_AGENT_PACING_MILLIS", config.agent.pacing_millis.to_string()),
        (
            "agent.serialize_conversations",
            "TRIPDESK_AGENT_SERIALIZE_CONVERSATIONS",
            config.agent.serialize_conversations.to_string(),
        ),
        (
            "agent.system_prompt",
            "",
            if config.agent.system_prompt.is_some() { "<custom>" } else { "<built-in>" }.to_string(),
        ),
        (
            "messenger.verify_token",
            "TRIPDESK_MESSENGER_VERIFY_TOKEN",
            redact_secret(&config.messenger.verify_token),
        ),
        (
            "messenger.page_access_token",
            "TRIPDESK_MESSENGER_PAGE_ACCESS_TOKEN",
            redact_secret(&config.messenger.page_access_token),
        ),
        (
            "messenger.app_secret",
            "TRIPDESK_MESSENGER_APP_SECRET",
            redact_optional(config.messenger.app_secret.as_ref()),
        ),
        (
            "messenger.graph_api_base",
            "TRIPDESK_MESSENGER_GRAPH_API_BASE",
            config.messenger.graph_api_base.clone(),
        ),
        ("server.bind_address", "TRIPDESK_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        ("server.port", "TRIPDESK_SERVER_PORT", config.server.port.to_string()),
        (
            "server.graceful_shutdown_secs",
            "TRIPDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        ("logging.level", "TRIPDESK_LOGGING_LEVEL", config.logging.level.clone()),
        ("logging.format", "TRIPDESK_LOGGING_FORMAT", format!("{:?}", config.logging.format).to_lowercase()),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("tripdesk.toml"), PathBuf::from("config/tripdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if !env_key.is_empty() && env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    secret.map_or_else(|| "<unset>".to_string(), redact_secret)
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{contains_path, redact_optional, redact_secret};

    #[test]
    fn secrets_never_render_their_value() {
        assert_eq!(redact_secret(&SecretString::from("EAAG-page-token".to_string())), "<redacted>");
        assert_eq!(redact_secret(&SecretString::from("  ".to_string())), "<empty>");
        assert_eq!(redact_optional(None), "<unset>");
    }

    #[test]
    fn nested_keys_are_found_in_the_config_document() {
        let doc: toml::Value = "[messenger]\nverify_token = \"x\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "messenger.verify_token"));
        assert!(!contains_path(&doc, "messenger.app_secret"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
