//! JSON-lines Adapter
//!
//! A minimal line-oriented front end for `CommandService`: one JSON request
//! per input line, one JSON response per output line. Requests are handled
//! concurrently, so responses may come back out of order; callers correlate
//! them with the optional `request_id` echoed on every response.
//!
//! # Example
//!
//! ```json
//! {"request_id": 1, "op": "execute_command", "command": "mkdir", "args": ["x"]}
//! {"request_id": 1, "status": "pending", "command_id": "6b1f...", "message": "..."}
//! {"request_id": 2, "op": "approve_command", "id": "6b1f..."}
//! {"request_id": 2, "status": "ok", "result": {"stdout": "", "stderr": ""}}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::CommandError;
use crate::service::{CommandOutcome, CommandService, ExecuteOptions};
use crate::tools::bare_command_name;
use crate::whitelist::{SecurityLevel, WhitelistEntry};

/// One request line
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    /// Opaque correlation value echoed on the response
    #[serde(default)]
    pub request_id: Option<Value>,

    #[serde(flatten)]
    pub request: Request,
}

/// Operations, tagged by `op`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ExecuteCommand {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        requested_by: Option<String>,
    },
    GetWhitelist,
    AddToWhitelist {
        entry: WhitelistEntry,
    },
    UpdateSecurityLevel {
        command: String,
        security_level: SecurityLevel,
    },
    RemoveFromWhitelist {
        command: String,
    },
    GetPendingCommands,
    ApproveCommand {
        id: Uuid,
    },
    DenyCommand {
        id: Uuid,
        #[serde(default)]
        reason: Option<String>,
    },
    GetPlatformInfo,
}

/// One response line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,

    #[serde(flatten)]
    pub body: ResponseBody,
}

/// Response payload, tagged by `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseBody {
    Ok {
        result: Value,
    },
    /// Queued for approval; not an error
    Pending {
        command_id: Uuid,
        message: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<CommandError>,
    },
}

impl ResponseBody {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(result) => ResponseBody::Ok { result },
            Err(e) => ResponseBody::Error {
                message: format!("Failed to serialize result: {}", e),
                error: None,
            },
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        ResponseBody::Error {
            message: message.into(),
            error: None,
        }
    }
}

impl From<CommandError> for ResponseBody {
    fn from(error: CommandError) -> Self {
        ResponseBody::Error {
            message: error.to_string(),
            error: Some(error),
        }
    }
}

/// Run one request against the service
pub async fn handle(service: &CommandService, request: Request) -> ResponseBody {
    match request {
        Request::ExecuteCommand {
            command,
            args,
            timeout_ms,
            requested_by,
        } => {
            let options = ExecuteOptions {
                timeout: timeout_ms.map(Duration::from_millis),
                requested_by,
            };
            match service.execute_command(&command, args, options).await {
                Ok(CommandOutcome::Completed(result)) => ResponseBody::ok(&result),
                Ok(CommandOutcome::Pending(handle)) => ResponseBody::Pending {
                    command_id: handle.id(),
                    message: format!(
                        "Command requires approval. Use approve_command with ID {}",
                        handle.id()
                    ),
                },
                Err(e) => {
                    // Policy rejections are already logged by the service
                    if !e.is_policy_rejection() {
                        tracing::warn!("Command {} failed: {}", command, e);
                    }
                    e.into()
                }
            }
        }
        Request::GetWhitelist => ResponseBody::ok(&service.get_whitelist()),
        Request::AddToWhitelist { entry } => {
            if bare_command_name(&entry.command).trim().is_empty() {
                return ResponseBody::invalid_request(format!(
                    "Whitelist entry has empty command: {:?}",
                    entry.command
                ));
            }
            service.add_to_whitelist(entry);
            ResponseBody::ok(&Value::Null)
        }
        Request::UpdateSecurityLevel {
            command,
            security_level,
        } => {
            let updated = service.update_security_level(&command, security_level);
            ResponseBody::ok(&serde_json::json!({ "updated": updated }))
        }
        Request::RemoveFromWhitelist { command } => {
            let removed = service.remove_from_whitelist(&command);
            ResponseBody::ok(&serde_json::json!({ "removed": removed }))
        }
        Request::GetPendingCommands => ResponseBody::ok(&service.get_pending_commands()),
        Request::ApproveCommand { id } => match service.approve_command(id).await {
            Ok(result) => ResponseBody::ok(&result),
            Err(e) => e.into(),
        },
        Request::DenyCommand { id, reason } => match service.deny_command(id, reason) {
            Ok(()) => ResponseBody::ok(&Value::Null),
            Err(e) => e.into(),
        },
        Request::GetPlatformInfo => ResponseBody::ok(service.platform_info()),
    }
}

/// Serve requests from `reader` until it reaches EOF, writing responses to
/// `writer`
///
/// Returns once every accepted request has been answered.
pub async fn serve<R, W>(service: Arc<CommandService>, reader: R, writer: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let mut lines = reader.lines();
    let mut input_open = true;
    let mut in_flight = 0usize;

    while input_open || in_flight > 0 {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line.context("Failed to read request line")? else {
                    tracing::debug!("Request stream closed, {} in flight", in_flight);
                    input_open = false;
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<RequestEnvelope>(&line) {
                    Ok(envelope) => {
                        in_flight += 1;
                        let service = Arc::clone(&service);
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let body = handle(&service, envelope.request).await;
                            // Receiver only goes away if serve itself failed
                            let _ = tx.send(Response {
                                request_id: envelope.request_id,
                                body,
                            });
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Invalid request: {}", e);
                        let response = Response {
                            request_id: None,
                            body: ResponseBody::invalid_request(format!("Invalid request: {}", e)),
                        };
                        write_response(writer, &response).await?;
                    }
                }
            }
            Some(response) = rx.recv() => {
                in_flight -= 1;
                write_response(writer, &response).await?;
            }
        }
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> Result<()> {
    let json = serde_json::to_string(response).context("Failed to serialize response")?;
    tracing::debug!("Sending response: {}", json);

    writer
        .write_all(json.as_bytes())
        .await
        .context("Failed to write response")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush response")?;

    Ok(())
}
