//! Scripted conversation for the first demo user, ending in checkout.

use echoshop_agent::cart::Receipt;
use echoshop_agent::PipelineReply;
use echoshop_agent::SystemStatus;
use echoshop_core::config::LoadOptions;
use serde::Serialize;

use crate::commands::{correlation_id, open_session, CommandResult};

pub const DEMO_USER: &str = "1";
pub const DEMO_SCRIPT: [&str; 5] = [
    "hello",
    "find me something vegetarian",
    "order a pizza with extra cheese",
    "add 2 quinoa salads",
    "checkout",
];

#[derive(Debug, Serialize)]
struct DemoTurn {
    utterance: &'static str,
    reply: PipelineReply,
}

#[derive(Debug, Serialize)]
struct DemoOutput {
    user_id: &'static str,
    turns: Vec<DemoTurn>,
    receipt: Receipt,
    status: SystemStatus,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let session = match open_session("demo", options) {
        Ok(session) => session,
        Err(failure) => return failure,
    };

    let turns = DEMO_SCRIPT
        .iter()
        .copied()
        .map(|utterance| DemoTurn {
            utterance,
            reply: session.executor.block_on(session.runtime.process_utterance(DEMO_USER, utterance)),
        })
        .collect::<Vec<_>>();

    let receipt = match session.executor.block_on(session.runtime.checkout(DEMO_USER)) {
        Ok(receipt) => receipt,
        Err(error) => {
            let error = error.into_interface(correlation_id("demo"));
            return CommandResult::interface_failure("demo", &error);
        }
    };

    let output = DemoOutput {
        user_id: DEMO_USER,
        turns,
        status: session.runtime.system_status(),
        receipt,
    };
    CommandResult::with_data(
        "demo",
        format!("{} turns, checkout total ${}", output.turns.len(), output.receipt.total),
        output,
    )
}
