use jarvis_core::config::{AppConfig, LoadOptions};

use crate::bootstrap::bootstrap_with_config;
use crate::commands::{current_thread_runtime, escape_json, CommandResult};

pub fn run(question: &str, json: bool) -> CommandResult {
    let question = question.trim();
    if question.is_empty() {
        return CommandResult::failure("ask", "invalid_input", "question must not be empty", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let app = bootstrap_with_config(config).await?;
        let answer = app.agent_runtime.answer_detailed(question).await;
        app.db_pool.close().await;
        Ok::<_, crate::bootstrap::BootstrapError>(answer)
    });

    match result {
        Ok(answer) if json => {
            let output = serde_json::to_string(&answer).unwrap_or_else(|error| {
                format!(
                    "{{\"intent\":\"unknown\",\"text\":\"\",\"error\":\"{}\"}}",
                    escape_json(&error.to_string())
                )
            });
            CommandResult { exit_code: 0, output }
        }
        Ok(answer) => CommandResult { exit_code: 0, output: answer.text },
        Err(error) => {
            let (error_class, exit_code) = error.classify();
            CommandResult::failure("ask", error_class, error.to_string(), exit_code)
        }
    }
}
