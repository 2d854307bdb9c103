use serde_json::json;

use crate::commands::{migrated_pool, prepare, CommandResult, Failure};
use leadflow_db::DemoDataset;

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_load", error.to_string(), 5u8))?;
        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verify", error.to_string(), 5u8))?;
        pool.close().await;

        if !verification.all_present {
            let missing: Vec<_> = verification
                .checks
                .iter()
                .filter(|(_, present)| !present)
                .map(|(label, _)| label.as_str())
                .collect();
            let message = format!("missing seeded rows: {}", missing.join(", "));
            return Err(("seed_verify", message, 5u8));
        }
        Ok::<_, Failure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success_with_data(
            "seed",
            format!(
                "seeded {} sources, {} operators, {} weights",
                seeded.sources, seeded.operators, seeded.weights
            ),
            Some(json!({
                "sources": seeded.sources,
                "operators": seeded.operators,
                "weights": seeded.weights,
            })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
