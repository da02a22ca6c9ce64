use clap::Subcommand;
use fanfou_core::{CredentialSource, resolve};
use fanfou_mcp_runtime::{Endpoints, ToolDefinition, Toolbox, tool_definitions};
use serde_json::{Map, Value, json};

use crate::util::{StoredToken, config_path, exit_error, save_token_to, to_pretty_json};

#[derive(Subcommand)]
pub enum ToolsCommands {
    /// List every tool with its input schema
    List,
    /// Call one tool and print its JSON result
    Call {
        /// Tool name (see `fanfou tools list`)
        name: String,
        /// Arguments as a JSON object, e.g. '{"count": 10}'
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

/// Returns the process exit code: 0 for a result, 1 when the tool reported an error.
pub async fn run(endpoints: Endpoints, source: &dyn CredentialSource, command: ToolsCommands) -> i32 {
    match command {
        ToolsCommands::List => {
            let tools: Vec<Value> = tool_definitions().iter().map(ToolDefinition::to_value).collect();
            println!("{}", to_pretty_json(&Value::Array(tools)));
            0
        }
        ToolsCommands::Call { name, args } => call(endpoints, source, &name, &args).await,
    }
}

async fn call(endpoints: Endpoints, source: &dyn CredentialSource, name: &str, raw_args: &str) -> i32 {
    let args = match parse_args(raw_args) {
        Ok(args) => args,
        Err(message) => exit_error(&message, Some("Pass --args a JSON object, e.g. '{\"count\": 10}'.")),
    };

    let toolbox = Toolbox::new(endpoints, resolve(source));
    let output = match toolbox.call(name, &args).await {
        Ok(output) => output,
        Err(err) => exit_error(&err.to_string(), Some("Run `fanfou tools list` to see available tools.")),
    };

    if let Some(pair) = output.minted {
        let path = config_path();
        match save_token_to(&path, &StoredToken::new(pair, None)) {
            Ok(()) => eprintln!(
                "{}",
                to_pretty_json(&json!({
                    "notice": "oauth_token_minted",
                    "stored_at": path.display().to_string(),
                }))
            ),
            Err(err) => tracing::warn!(event = "minted_token_not_stored", error = %err),
        }
    }

    println!("{}", to_pretty_json(&output.value));
    i32::from(output.is_error)
}

fn parse_args(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err("--args must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON in --args: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_must_be_an_object() {
        assert_eq!(parse_args(r#"{"count": 3}"#).unwrap()["count"], 3);
        assert!(parse_args("null").unwrap().is_empty());
        assert!(parse_args("[1]").is_err());
        assert!(parse_args("{oops").unwrap_err().contains("Invalid JSON"));
    }
}
