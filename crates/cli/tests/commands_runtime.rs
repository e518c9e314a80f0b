use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use echoshop_cli::commands::{agents, ask, config, demo, graph, recommend, status, tasks};
use echoshop_core::config::LoadOptions;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn ask_runs_the_pipeline_offline() {
    with_env(&[], || {
        let result = ask::run(LoadOptions::default(), "1", "order a pizza");
        assert_eq!(result.exit_code, 0, "expected successful ask");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "pipeline ran 6 tasks");
        assert_eq!(payload["data"]["provider"], "disabled");
        assert_eq!(payload["data"]["reply"]["source"], "rule_based");
        assert_eq!(payload["data"]["reply"]["intent"], "add_to_cart");
        assert_eq!(payload["data"]["cart"][0]["name"], "Margherita Pizza");
    });
}

#[test]
fn ask_with_stop_phrase_runs_nothing() {
    with_env(&[], || {
        let result = ask::run(LoadOptions::default(), "1", "stop listening");
        let payload = parse_payload(&result.output);

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["data"]["reply"]["stopped"], true);
        assert_eq!(payload["data"]["reply"]["task_ids"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn groq_without_api_key_is_a_config_failure() {
    with_env(&[("ECHOSHOP_LLM_PROVIDER", "groq")], || {
        let result = ask::run(LoadOptions::default(), "1", "hello");
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn demo_ends_with_a_receipt() {
    with_env(&[], || {
        let result = demo::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected demo to succeed");

        let payload = parse_payload(&result.output);
        let data = &payload["data"];
        assert_eq!(data["turns"].as_array().map(Vec::len), Some(5));
        assert_eq!(data["receipt"]["item_count"], 2);
        assert_eq!(data["receipt"]["total"], "52.97");
        assert_eq!(data["status"]["pending_tasks"], 0);
        assert_eq!(data["status"]["active_agents"], 7);
    });
}

#[test]
fn status_reports_counts_after_warmup_runs() {
    with_env(&[], || {
        let result = status::run(LoadOptions::default(), "2", &["hello".to_string()]);
        let payload = parse_payload(&result.output);

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["data"]["active_agents"], 7);
        assert_eq!(payload["data"]["in_flight_tasks"], 0);
        assert_eq!(payload["data"]["total_messages"], 8);
    });
}

#[test]
fn agents_and_tasks_list_full_state() {
    with_env(&[], || {
        let agents_payload = parse_payload(&agents::run(LoadOptions::default(), "1", &[]).output);
        let agents = agents_payload["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(agents.len(), 7);
        assert!(agents.iter().all(|agent| agent["current_task"].is_null()));

        let tasks_payload =
            parse_payload(&tasks::run(LoadOptions::default(), "1", &["find pizza".to_string()]).output);
        let tasks = tasks_payload["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(tasks.len(), 6);
        assert!(tasks.iter().all(|task| task["status"] == "COMPLETED"));
        assert_eq!(tasks_payload["message"], "6 tasks, 0 failed");
    });
}

#[test]
fn graph_reports_seeded_counts_and_exports() {
    with_env(&[], || {
        let stats = parse_payload(&graph::run(LoadOptions::default(), false).output);
        assert_eq!(stats["data"]["users"], 3);
        assert_eq!(stats["data"]["nodes"], 19);

        let export = parse_payload(&graph::run(LoadOptions::default(), true).output);
        assert_eq!(export["data"]["nodes"].as_array().map(Vec::len), Some(19));
        assert_eq!(export["data"]["relationships"].as_array().map(Vec::len), Some(16));
    });
}

#[test]
fn recommend_ranks_known_users_and_rejects_unknown_ones() {
    with_env(&[], || {
        let result = recommend::run(LoadOptions::default(), "1");
        let payload = parse_payload(&result.output);
        assert_eq!(result.exit_code, 0);
        let names: Vec<String> = payload["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(|rec| rec["restaurant"]["name"].as_str().map(str::to_string))
            .collect();
        assert!(names.contains(&"Tony's Italian".to_string()));
        assert!(!names.contains(&"Golden Dragon".to_string()));

        let missing = recommend::run(LoadOptions::default(), "404");
        let payload = parse_payload(&missing.output);
        assert_eq!(missing.exit_code, 4);
        assert_eq!(payload["error_class"], "bad_request");
        assert!(payload["correlation_id"].as_str().is_some_and(|id| id.starts_with("recommend-")));
    });
}

#[test]
fn config_attributes_sources_and_redacts_keys() {
    with_env(
        &[("ECHOSHOP_LLM_PROVIDER", "groq"), ("ECHOSHOP_LLM_API_KEY", "gsk_secretvalue")],
        || {
            let temp_dir = TempDir::new().expect("temp dir");
            let path = temp_dir.path().join("echoshop.toml");
            fs::write(&path, "[orchestrator]\nrecommendation_limit = 5\n").expect("write config");

            let options = LoadOptions { config_path: Some(path.clone()), ..LoadOptions::default() };
            let result = config::run(options);
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            let entries = payload["data"].as_array().cloned().unwrap_or_default();
            let entry = |key: &str| {
                entries.iter().find(|entry| entry["key"] == key).cloned().unwrap_or(Value::Null)
            };

            assert_eq!(entry("llm.provider")["source"], "env (ECHOSHOP_LLM_PROVIDER)");
            assert_eq!(entry("llm.api_key")["value"], "gsk_***");
            assert!(!result.output.contains("secretvalue"));
            assert_eq!(entry("orchestrator.recommendation_limit")["value"], "5");
            assert_eq!(
                entry("orchestrator.recommendation_limit")["source"],
                format!("file ({})", path.display())
            );
            assert_eq!(entry("orchestrator.history_window")["source"], "default");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let keys = [
        "ECHOSHOP_LLM_PROVIDER",
        "ECHOSHOP_LLM_API_KEY",
        "ECHOSHOP_LLM_BASE_URL",
        "ECHOSHOP_LLM_MODEL",
        "ECHOSHOP_LLM_TIMEOUT_SECS",
        "ECHOSHOP_LLM_TEMPERATURE",
        "ECHOSHOP_LLM_MAX_TOKENS",
        "ECHOSHOP_ORCHESTRATOR_WAIT_TIMEOUT_MS",
        "ECHOSHOP_ORCHESTRATOR_RECOMMENDATION_LIMIT",
        "ECHOSHOP_ORCHESTRATOR_HISTORY_WINDOW",
        "ECHOSHOP_ORCHESTRATOR_TASK_RETENTION_SECS",
        "ECHOSHOP_LOGGING_LEVEL",
        "ECHOSHOP_LOGGING_FORMAT",
        "ECHOSHOP_LOG_LEVEL",
        "ECHOSHOP_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
