//! Command execution.

use crate::Commands;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use colored::Colorize;
use hermodr_client::Client;
use hermodr_protocol::{NetworkStats, Op};
use serde_json::{json, Value};
use std::time::Instant;

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &Client,
    cmd: Commands,
    as_json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ping => {
            let started = Instant::now();
            client.ping().await?;
            let elapsed = started.elapsed();
            if as_json {
                return Ok(format_json(&json!({ "rtt_ms": elapsed.as_secs_f64() * 1000.0 })));
            }
            Ok(format!(
                "{} ({:.2} ms)",
                "PONG".green(),
                elapsed.as_secs_f64() * 1000.0
            ))
        }

        Commands::Users => {
            let users = client.connected_users().await?;
            if as_json {
                return Ok(format_json(&json!(users)));
            }
            Ok(format_users(&users))
        }

        Commands::World => {
            let name = client.world_name().await?;
            if as_json {
                return Ok(format_json(&json!({ "world_name": name })));
            }
            Ok(format!("{}: {}", "World".bold(), name.cyan()))
        }

        Commands::NetStats => {
            let stats = client.network_stats().await?;
            if as_json {
                return Ok(format_json(&serde_json::to_value(stats)?));
            }
            Ok(format_net_stats(&stats))
        }

        Commands::StartTime => {
            let millis = client.start_time_millis().await?;
            let started = start_time(millis);
            if as_json {
                return Ok(format_json(&json!({
                    "start_time_ms": millis,
                    "start_time": started.map(|t| t.to_rfc3339()),
                })));
            }
            match started {
                Some(t) => Ok(format!(
                    "{}: {} (up {})",
                    "Started".bold(),
                    t.to_rfc3339().cyan(),
                    format_uptime((Utc::now() - t).num_seconds())
                )),
                None => Ok(format!("{}: {} ms (out of range)", "Started".bold(), millis)),
            }
        }

        Commands::Status => {
            let status = client.status().await?;
            if as_json {
                return Ok(format_json(&serde_json::to_value(&status)?));
            }
            Ok(format!(
                "{}: {}\n{}",
                "World".bold(),
                status.world_name.cyan(),
                format_users(&status.users)
            ))
        }

        Commands::Broadcast { message } => {
            client.broadcast(&message).await?;
            if as_json {
                return Ok(format_json(&json!({ "sent": message })));
            }
            Ok(format!("{} \"{}\"", "Broadcast".green(), message))
        }

        Commands::Raw { op, payload } => {
            let payload = match payload {
                Some(text) => parse_hex(&text)?,
                None => Bytes::new(),
            };
            let frame = client.raw(op, payload).await?;
            let op_name = op_label(frame.op);
            if as_json {
                return Ok(format_json(&json!({
                    "id": frame.id,
                    "op": frame.op,
                    "op_name": op_name,
                    "payload_len": frame.payload.len(),
                    "payload_hex": hex::encode(&frame.payload),
                    "error": frame.error_message(),
                })));
            }

            let mut output = format!(
                "{} id={} op={} ({}) {} bytes",
                "Response".bold(),
                frame.id,
                frame.op,
                op_name,
                frame.payload.len()
            );
            if let Some(message) = frame.error_message() {
                output.push_str(&format!("\n{}: {}", "Error".red(), message));
            } else if !frame.payload.is_empty() {
                output.push('\n');
                output.push_str(&hex::encode(&frame.payload));
            }
            Ok(output)
        }
    }
}

fn format_users(users: &[String]) -> String {
    if users.is_empty() {
        return "No users connected".yellow().to_string();
    }
    let mut output = format!("{} ({}):", "Users".bold(), users.len());
    for user in users {
        output.push_str(&format!("\n  {}", user.cyan()));
    }
    output
}

fn format_net_stats(stats: &NetworkStats) -> String {
    format!(
        "{}\n  local quality:  {:.2}\n  remote quality: {:.2}\n  ping:           {} ms\n  out:            {}/s\n  in:             {}/s",
        "Network".bold(),
        stats.local_quality,
        stats.remote_quality,
        stats.ping_ms,
        format_bytes(stats.out_bytes_per_sec),
        format_bytes(stats.in_bytes_per_sec)
    )
}

/// Name of a response op, for display.
fn op_label(op: i32) -> &'static str {
    match Op::from_code(op) {
        Some(op) => op.name(),
        None if op == hermodr_protocol::ERROR_OP => "ERROR",
        None => "UNKNOWN",
    }
}

fn start_time(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Formats a byte rate as a human-readable string.
fn format_bytes(bytes: f32) -> String {
    let bytes = f64::from(bytes);
    if bytes >= 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else if bytes >= 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else {
        format!("{:.0} B", bytes)
    }
}

fn format_uptime(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (days, rest) = (seconds / 86_400, seconds % 86_400);
    let (hours, rest) = (rest / 3600, rest % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, seconds)
    }
}

/// Parses a hex payload argument. Accepts an optional `0x` prefix and
/// ignores whitespace.
fn parse_hex(arg: &str) -> Result<Bytes, hex::FromHexError> {
    let trimmed = arg.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let compact: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(Bytes::from(hex::decode(compact)?))
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
