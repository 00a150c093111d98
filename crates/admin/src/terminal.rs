//! Terminal I/O: confirmation prompt, notification printer, table rendering.

use std::fmt::Write as _;
use std::io::{BufRead, Write as _};

use async_trait::async_trait;
use peduli_core::lifecycle::{self, EntityKind, Tone};
use peduli_core::notify::{Notification, Severity};
use peduli_core::remote::{Confirmer, ListRow};
use peduli_core::types::DbId;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Asks on stderr and reads the answer from stdin. Anything but `y`/`yes` declines.
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "{prompt} [y/N] ");
            let _ = stderr.flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Could not read confirmation");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Confirmation task failed");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Print every notification to stderr until the bus is dropped.
pub fn spawn_printer(mut receiver: broadcast::Receiver<Notification>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(notification) => eprintln!("{}", format_notification(&notification)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

pub fn format_notification(notification: &Notification) -> String {
    let tag = match notification.severity {
        Severity::Success => "ok",
        Severity::Warning => "warn",
        Severity::Error => "error",
    };
    format!("[{tag}] {}", notification.message)
}

fn tone_tag(tone: Tone) -> &'static str {
    match tone {
        Tone::Neutral => "neutral",
        Tone::Info => "info",
        Tone::Warning => "warning",
        Tone::Success => "success",
        Tone::Danger => "danger",
    }
}

/// One page of rows as a plain-text table. Selected rows are starred.
pub fn render_rows(
    kind: EntityKind,
    rows: &[ListRow],
    total: u64,
    offset: u32,
    selected: &[DbId],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<3}{:>8}  {:<22}  TITLE", "", "ID", "STATUS");
    for row in rows {
        let mark = if selected.contains(&row.id) { "*" } else { "" };
        let status = match &row.status {
            Some(status) => lifecycle::status_badge(kind, status).label,
            None => "-".to_string(),
        };
        let title = row.title.as_deref().unwrap_or("");
        let _ = writeln!(out, "{mark:<3}{:>8}  {status:<22}  {title}", row.id);
    }
    let shown_to = offset as u64 + rows.len() as u64;
    if rows.is_empty() {
        let _ = writeln!(out, "No {} rows (total {total})", kind.label().to_lowercase());
    } else {
        let _ = writeln!(out, "Rows {}-{shown_to} of {total}", offset as u64 + 1);
    }
    out
}

/// The kind's status table: label, tone, and what each state permits.
pub fn render_badges(kind: EntityKind) -> String {
    let Some(lifecycle) = kind.lifecycle() else {
        return format!(
            "{} rows carry no status; delete and edit are always allowed.\n",
            kind.label()
        );
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<14}{:<22}{:<9}{:<7}{:<6}NEXT",
        "STATE", "LABEL", "TONE", "EDIT", "DEL"
    );
    for rule in lifecycle.rules() {
        let next = if rule.successors.is_empty() {
            "-".to_string()
        } else {
            rule.successors.join(", ")
        };
        let _ = writeln!(
            out,
            "{:<14}{:<22}{:<9}{:<7}{:<6}{next}",
            rule.state,
            rule.label,
            tone_tag(rule.tone),
            if rule.editable { "yes" } else { "no" },
            if lifecycle.is_deletable(rule.state) { "yes" } else { "no" },
        );
    }
    out
}
