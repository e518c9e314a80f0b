use echoshop_core::config::LoadOptions;

use crate::commands::{open_session, CommandResult};

pub fn run(options: LoadOptions, export: bool) -> CommandResult {
    let session = match open_session("graph", options) {
        Ok(session) => session,
        Err(failure) => return failure,
    };

    let knowledge = session.runtime.knowledge();
    let store = session.executor.block_on(knowledge.read());
    let stats = store.stats();
    let message = format!(
        "{} nodes, {} relationships, {} users",
        stats.nodes, stats.relationships, stats.users
    );

    if export {
        CommandResult::with_data("graph", message, store.export())
    } else {
        CommandResult::with_data("graph", message, stats)
    }
}
