use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tripdesk_agent::{AgentRuntime, AgentSettings, OracleTurn, ScriptedOracle, ToolCallRequest};
use tripdesk_cli::commands::{chat, config, migrate, seed};
use tripdesk_core::config::LoadOptions;
use tripdesk_db::{connect_with_settings, migrations, SqlSessionFactory};

struct Workspace {
    dir: TempDir,
    config_path: PathBuf,
}

impl Workspace {
    fn new(extra_toml: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("tripdesk.toml");
        let database_url = format!("sqlite://{}", dir.path().join("tripdesk.db").display());
        fs::write(&config_path, format!("[database]\nurl = \"{database_url}\"\n\n{extra_toml}"))
            .expect("write config");
        Self { dir, config_path }
    }

    fn options(&self) -> LoadOptions {
        LoadOptions {
            config_path: Some(self.config_path.clone()),
            require_file: true,
            ..LoadOptions::default()
        }
    }

    fn database_path(&self) -> PathBuf {
        self.dir.path().join("tripdesk.db")
    }

    fn database_url(&self) -> String {
        format!("sqlite://{}", self.database_path().display())
    }
}

#[test]
fn migrate_creates_the_database_and_reports_success() {
    let workspace = Workspace::new("");

    let result = migrate::run(workspace.options());

    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "migrate");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["error_class"], Value::Null);
    assert!(workspace.database_path().exists());
}

#[test]
fn missing_explicit_config_file_is_a_config_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = LoadOptions {
        config_path: Some(dir.path().join("absent.toml")),
        require_file: true,
        ..LoadOptions::default()
    };

    let result = migrate::run(options);

    assert_eq!(result.exit_code, 2);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "config_validation");
}

#[test]
fn invalid_config_values_fail_before_touching_the_database() {
    let workspace = Workspace::new("[llm]\nprovider = \"openai\"\n");

    let result = seed::run(workspace.options());

    assert_eq!(result.exit_code, 2);
    let payload = parse_payload(&result.output);
    assert!(payload["message"].as_str().unwrap_or_default().contains("llm.api_key"));
    assert!(!workspace.database_path().exists());
}

#[test]
fn seed_loads_the_demo_catalogue_once() {
    let workspace = Workspace::new("");

    let first = seed::run(workspace.options());
    let second = seed::run(workspace.options());

    assert_eq!(first.exit_code, 0, "unexpected output: {}", first.output);
    assert_eq!(parse_payload(&first.output)["message"], "seeded 6 demo trips");
    assert_eq!(second.exit_code, 0);
    assert_eq!(
        parse_payload(&second.output)["message"],
        "inventory already has trips; demo catalogue not loaded"
    );
}

#[test]
fn config_redacts_secrets_and_names_their_source() {
    let workspace = Workspace::new(
        "[messenger]\nverify_token = \"verify-secret-value\"\npage_access_token = \"EAAG-page-secret\"\n",
    );

    let result = config::run(workspace.options());

    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
    let payload = parse_payload(&result.output);
    let message = payload["message"].as_str().expect("message");
    assert!(!message.contains("verify-secret-value"));
    assert!(!message.contains("EAAG-page-secret"));
    let file_source = format!("(source: file ({}))", workspace.config_path.display());
    assert!(message.contains(&format!("- messenger.verify_token = <redacted> {file_source}")));
    assert!(message.contains("- messenger.app_secret = <unset> (source: default)"));
    assert!(message.contains("- agent.pacing_millis = 1000 (source: default)"));
}

// The commands drive their own runtime, so they run before the test runtime starts.
#[test]
fn chat_turn_answers_from_the_seeded_inventory() {
    let workspace = Workspace::new("");
    assert_eq!(seed::run(workspace.options()).exit_code, 0);

    let oracle = Arc::new(ScriptedOracle::new([
        OracleTurn::ToolRequests(vec![ToolCallRequest::new(
            "call-1",
            "search_trips",
            json!({"origin": "Tunis", "destination": "Paris"}),
        )]),
        OracleTurn::answer("Two departures to Paris are open."),
    ]));
    let result = block_on(async {
        let agent = runtime_for(&workspace.database_url(), oracle.clone()).await;
        chat::execute(&agent, "psid-cli", "Any trips to Paris?").await
    });

    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
    assert_eq!(parse_payload(&result.output)["message"], "Two departures to Paris are open.");
    let transcripts = oracle.transcripts();
    let tool_result = transcripts[1].last().expect("tool result entry");
    assert!(format!("{tool_result:?}").contains("Paris"));
}

#[test]
fn failed_chat_turn_reports_the_error_class() {
    let workspace = Workspace::new("");
    assert_eq!(migrate::run(workspace.options()).exit_code, 0);

    let oracle = Arc::new(ScriptedOracle::default().then_fail("provider unreachable"));
    let result = block_on(async {
        let agent = runtime_for(&workspace.database_url(), oracle).await;
        chat::execute(&agent, "psid-cli", "hello").await
    });

    assert_eq!(result.exit_code, 7);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "chat");
    assert_eq!(payload["error_class"], "oracle");
}

async fn runtime_for(database_url: &str, oracle: Arc<ScriptedOracle>) -> AgentRuntime {
    let pool = connect_with_settings(database_url, 2, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    AgentRuntime::new(
        Arc::new(SqlSessionFactory::new(pool)),
        oracle,
        AgentSettings { pacing: Duration::ZERO, ..AgentSettings::default() },
    )
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
        .block_on(future)
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}
