use echoshop_core::config::LoadOptions;

use crate::commands::{open_session, warm_up, CommandResult};

pub fn run(options: LoadOptions, user_id: &str, utterances: &[String]) -> CommandResult {
    let session = match open_session("agents", options) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    warm_up(&session, user_id, utterances);

    let agents = session.runtime.agent_status();
    CommandResult::with_data("agents", format!("{} registered agents", agents.len()), agents)
}
