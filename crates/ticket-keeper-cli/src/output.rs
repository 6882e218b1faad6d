//! Rendering of service responses for the terminal.

use crate::{CliError, OutputFormat};
use serde::Serialize;
use std::fmt::Write as _;
use ticket_keeper_api::{
    AdvanceResponse, FollowUpResponse, SlaBody, StatusResponse, SubmitResponse,
};

/// Render `value` in `format`, using `text` for the human-readable form
pub fn render<T: Serialize>(
    value: &T,
    format: &OutputFormat,
    text: impl FnOnce(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Text => Ok(text(value)),
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| CliError::Output {
            message: e.to_string(),
        }),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| CliError::Output {
            message: e.to_string(),
        }),
    }
}

fn sla_lines(out: &mut String, sla: &SlaBody) {
    let flag = |breached: bool| if breached { " (breached)" } else { "" };

    let _ = writeln!(
        out,
        "Response due: {}{}",
        sla.response_due_at,
        flag(sla.response_breached)
    );
    let _ = writeln!(
        out,
        "Resolve due:  {}{}",
        sla.resolve_due_at,
        flag(sla.resolution_breached)
    );
    if let Some(minutes) = sla.minutes_to_resolve {
        if minutes >= 0 {
            let _ = writeln!(out, "Time left:    {} min", minutes);
        } else {
            let _ = writeln!(out, "Overdue by:   {} min", -minutes);
        }
    }
}

pub fn submit_text(response: &SubmitResponse) -> String {
    let mut out = String::new();

    if response.status == "created" {
        let _ = writeln!(
            out,
            "Ticket {} created ({}, status {}, priority {})",
            response.id,
            response.lifecycle.as_deref().unwrap_or("-"),
            response.ticket_status.as_deref().unwrap_or("-"),
            response
                .priority
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    } else {
        let _ = writeln!(out, "Submission failed ({})", response.id);
        if let Some(error) = &response.error {
            let _ = writeln!(out, "Error: {}", error);
        }
    }

    if let Some(reply) = &response.assistant_reply {
        let _ = writeln!(out, "Reply: {}", reply);
    }
    if let Some(sla) = &response.sla {
        sla_lines(&mut out, sla);
    }

    out
}

pub fn status_text(response: &StatusResponse) -> String {
    let body = match response {
        StatusResponse::Found(body) => body,
        StatusResponse::Unavailable { status } => return format!("Status lookup: {}\n", status),
    };

    let mut out = String::new();
    let _ = writeln!(out, "Ticket {} ({})", body.id, body.lifecycle);
    let _ = writeln!(
        out,
        "Status:       {}{}",
        body.current_status,
        if body.terminal { " (terminal)" } else { "" }
    );
    let _ = writeln!(out, "Priority:     {}", body.priority);
    let _ = writeln!(out, "Requester:    {}", body.requester_id);
    let _ = writeln!(out, "Description:  {}", body.description);
    sla_lines(&mut out, &body.sla);
    for (key, value) in &body.attributes {
        let _ = writeln!(out, "  {} = {}", key, value);
    }
    let _ = writeln!(out, "Updated:      {}", body.updated_at);
    out
}

pub fn advance_text(response: &AdvanceResponse) -> String {
    let current = response.current_status.as_deref().unwrap_or("-");
    match (response.ok, response.applied) {
        (true, true) => format!("Status is now {}\n", current),
        (true, false) => format!(
            "Status unchanged at {} ({})\n",
            current,
            response.reason.as_deref().unwrap_or("already current")
        ),
        (false, _) => format!(
            "Advance failed: {}\n",
            response.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub fn follow_ups_text(response: &FollowUpResponse) -> String {
    if !response.ok {
        return format!(
            "Follow-up scheduling failed: {}\n",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    let mut out = format!(
        "Follow-ups: {} scheduled, {} skipped, {} failed\n",
        response.scheduled.len(),
        response.skipped.len(),
        response.failed.len()
    );
    for name in &response.scheduled {
        let _ = writeln!(out, "  scheduled {}", name);
    }
    for name in &response.failed {
        let _ = writeln!(out, "  failed    {}", name);
    }
    out
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
