use echoshop_core::config::LoadOptions;

use crate::commands::{open_session, warm_up, CommandResult};

pub fn run(options: LoadOptions, user_id: &str, utterances: &[String]) -> CommandResult {
    let session = match open_session("status", options) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    warm_up(&session, user_id, utterances);

    let status = session.runtime.system_status();
    CommandResult::with_data(
        "status",
        format!("{} active agents, {} messages", status.active_agents, status.total_messages),
        status,
    )
}
