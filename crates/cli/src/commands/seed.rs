use chrono::Utc;
use tripdesk_core::config::LoadOptions;
use tripdesk_db::{seed_demo_trips, SeedResult, SqlSession};

use crate::commands::{async_runtime, load_config, open_migrated_pool, CommandResult, StepFailure};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("seed", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let seeded = {
            let mut session = SqlSession::acquire(&pool)
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
            seed_demo_trips(&mut session, Utc::now())
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 6u8))?
        };
        pool.close().await;
        Ok::<SeedResult, StepFailure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", seed_message(&seeded)),
        Err(failure) => CommandResult::from_step("seed", failure),
    }
}

fn seed_message(result: &SeedResult) -> String {
    if result.skipped {
        "inventory already has trips; demo catalogue not loaded".to_string()
    } else {
        format!("seeded {} demo trips", result.trips_created)
    }
}
