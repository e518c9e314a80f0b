use echoshop_core::config::LoadOptions;
use echoshop_core::errors::{ApplicationError, KnowledgeError};

use crate::commands::{correlation_id, open_session, CommandResult};

pub fn run(options: LoadOptions, user_id: &str) -> CommandResult {
    let session = match open_session("recommend", options) {
        Ok(session) => session,
        Err(failure) => return failure,
    };

    let knowledge = session.runtime.knowledge();
    let store = session.executor.block_on(knowledge.read());
    if store.user_profile(user_id).is_none() {
        let error = ApplicationError::from(KnowledgeError::UnknownUser(user_id.to_string()))
            .into_interface(correlation_id("recommend"));
        return CommandResult::interface_failure("recommend", &error);
    }

    let recommendations = store.personalized_recommendations(user_id);
    CommandResult::with_data(
        "recommend",
        format!("{} restaurants ranked for user {user_id}", recommendations.len()),
        recommendations,
    )
}
