use serde_json::json;

use crate::commands::{migrated_pool, prepare, CommandResult};
use leadflow_core::{LeadDistributor, SourceId};
use leadflow_db::sql_stores;

pub struct AssignArgs {
    pub lead: String,
    pub source: i64,
    pub message: Option<String>,
}

pub fn run(args: AssignArgs) -> CommandResult {
    let (config, runtime) = match prepare("assign") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let distributor = LeadDistributor::from_config(sql_stores(&pool), &config.routing);
        let outcome = distributor.assign(&args.lead, SourceId(args.source), args.message).await;
        pool.close().await;
        outcome.map_err(|error| ("assignment", error.to_string(), 5u8))
    });

    match result {
        Ok(contact) => {
            let message = match contact.operator_id {
                Some(operator_id) => {
                    format!("contact {} assigned to operator {operator_id}", contact.id)
                }
                None => format!("contact {} recorded without an operator", contact.id),
            };
            CommandResult::success_with_data(
                "assign",
                message,
                Some(json!({
                    "contact_id": contact.id,
                    "lead_id": contact.lead_id,
                    "source_id": contact.source_id,
                    "operator_id": contact.operator_id,
                    "status": contact.status.as_str(),
                })),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("assign", error_class, message, exit_code)
        }
    }
}

