use std::sync::Arc;

use tripdesk_agent::{AgentRuntime, AgentSettings, ChatCompletionsOracle, APOLOGY_REPLY};
use tripdesk_core::config::LoadOptions;
use tripdesk_db::SqlSessionFactory;
use uuid::Uuid;

use crate::commands::{async_runtime, load_config, open_migrated_pool, CommandResult};

/// Runs one turn for `user` against the configured database and oracle.
pub fn run(options: LoadOptions, user: &str, text: &str) -> CommandResult {
    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let pool = match open_migrated_pool(&config).await {
            Ok(pool) => pool,
            Err(failure) => return CommandResult::from_step("chat", failure),
        };
        let oracle = match ChatCompletionsOracle::from_config(&config.llm) {
            Ok(oracle) => oracle,
            Err(error) => {
                pool.close().await;
                return CommandResult::failure("chat", "oracle_config", error.to_string(), 6);
            }
        };

        let agent = AgentRuntime::new(
            Arc::new(SqlSessionFactory::new(pool.clone())),
            Arc::new(oracle),
            AgentSettings::from(&config.agent),
        );
        let result = execute(&agent, user, text).await;
        pool.close().await;
        result
    })
}

/// One turn through `agent`; a failed turn reports its class instead of the apology.
pub async fn execute(agent: &AgentRuntime, user: &str, text: &str) -> CommandResult {
    match agent.run_turn(Uuid::new_v4(), user, text).await {
        Ok(reply) => CommandResult::success("chat", reply),
        Err(error) => CommandResult::failure(
            "chat",
            error.class(),
            format!("{error} (the customer would receive: {APOLOGY_REPLY})"),
            7,
        ),
    }
}
