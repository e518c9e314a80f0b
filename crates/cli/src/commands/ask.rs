use echoshop_agent::PipelineReply;
use echoshop_core::config::LoadOptions;
use echoshop_core::domain::cart::CartItem;
use serde::Serialize;

use crate::commands::{open_session, CommandResult};

#[derive(Debug, Serialize)]
struct AskOutput {
    user_id: String,
    provider: &'static str,
    reply: PipelineReply,
    cart: Vec<CartItem>,
}

pub fn run(options: LoadOptions, user_id: &str, utterance: &str) -> CommandResult {
    let session = match open_session("ask", options) {
        Ok(session) => session,
        Err(failure) => return failure,
    };

    let reply = session.executor.block_on(session.runtime.process_utterance(user_id, utterance));
    let message = if reply.stopped {
        "stop phrase received; no stages ran".to_string()
    } else {
        format!("pipeline ran {} tasks", reply.task_ids.len())
    };

    let output = AskOutput {
        user_id: user_id.to_string(),
        provider: session.config.llm.provider.as_str(),
        cart: session.runtime.cart(user_id),
        reply,
    };
    CommandResult::with_data("ask", message, output)
}
