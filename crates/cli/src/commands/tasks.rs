use echoshop_core::config::LoadOptions;
use echoshop_core::domain::task::TaskStatus;

use crate::commands::{open_session, warm_up, CommandResult};

pub fn run(options: LoadOptions, user_id: &str, utterances: &[String]) -> CommandResult {
    let session = match open_session("tasks", options) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    warm_up(&session, user_id, utterances);

    let tasks = session.runtime.task_status();
    let failed = tasks.iter().filter(|task| task.status == TaskStatus::Failed).count();
    CommandResult::with_data("tasks", format!("{} tasks, {failed} failed", tasks.len()), tasks)
}
