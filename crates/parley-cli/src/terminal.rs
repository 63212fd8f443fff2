use chrono::{DateTime, Local, Utc};

use parley_core::render::{self, DisplayBody, Segment};
use parley_types::api::{AccountStatus, AdminUser, ReportCategory};
use parley_types::models::{Message, MessageId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Reply { to: MessageId, body: String },
    Older,
    /// `None` opens the user's own thread.
    Private(Option<UserId>),
    Public,
    Notifications,
    Contacts,
    /// Admin user table, 1-based page.
    Users(u32),
    Audit(u32),
    Stats,
    Report {
        message: MessageId,
        category: ReportCategory,
        reason: String,
    },
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let (name, args) = split_word(rest);
    let command = match name {
        "older" => Command::Older,
        "public" => Command::Public,
        "notifications" => Command::Notifications,
        "contacts" => Command::Contacts,
        "stats" => Command::Stats,
        "users" => Command::Users(page_arg(args, "/users")?),
        "audit" => Command::Audit(page_arg(args, "/audit")?),
        "quit" | "exit" => Command::Quit,
        "private" => {
            let (owner, _) = split_word(args);
            Command::Private((!owner.is_empty()).then(|| UserId::from(owner)))
        }
        "reply" => {
            let (id, body) = split_word(args);
            if id.is_empty() || body.is_empty() {
                return Err("usage: /reply <id> <text>".into());
            }
            Command::Reply {
                to: MessageId::from(id),
                body: body.to_string(),
            }
        }
        "report" => {
            let (id, rest) = split_word(args);
            let (category, reason) = split_word(rest);
            if id.is_empty() || category.is_empty() {
                return Err("usage: /report <id> <category> [reason]".into());
            }
            let category = ReportCategory::parse(category).ok_or_else(|| {
                let names: Vec<_> = ReportCategory::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown category, pick one of: {}", names.join(", "))
            })?;
            Command::Report {
                message: MessageId::from(id),
                category,
                reason: reason.to_string(),
            }
        }
        other => return Err(format!("unknown command /{}", other)),
    };
    Ok(Some(command))
}

fn page_arg(args: &str, command: &str) -> Result<u32, String> {
    let (page, _) = split_word(args);
    if page.is_empty() {
        return Ok(1);
    }
    match page.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("usage: {} [page]", command)),
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

/// `[hh:mm] alias: body`, with a reply header line and `*@me*` markers.
pub fn format_message(message: &Message, my_alias: &str) -> String {
    let time = message.created_at.with_timezone(&Local).format("%H:%M");
    let mut out = String::new();

    if let Some(preview) = render::reply_preview(message) {
        out.push_str(&format!("  ↪ {}: {}\n", preview.author_alias, preview.snippet));
    }
    out.push_str(&format!("[{}] {}: ", time, message.author.alias));

    match render::display_body(message, Some(my_alias)) {
        DisplayBody::Segments(segments) => {
            for segment in segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Mention { name, is_self: true } => {
                        out.push_str(&format!("*@{}*", name))
                    }
                    Segment::Mention { name, is_self: false } => {
                        out.push_str(&format!("@{}", name))
                    }
                }
            }
        }
        moderated => out.push_str(moderated.placeholder().unwrap_or_default()),
    }

    out.push_str(&format!("  ({})", message.id));
    out
}

/// One line of the admin user table.
pub fn user_row(user: &AdminUser, now: DateTime<Utc>) -> String {
    let status = match user.status {
        Some(AccountStatus::Pending) => "pending",
        Some(AccountStatus::Approved) | None => "approved",
        Some(AccountStatus::Rejected) => "rejected",
        Some(AccountStatus::Other) => "?",
    };
    let mut flags = Vec::new();
    if user.is_banned {
        flags.push("banned".to_string());
    }
    if user.is_muted_at(now) {
        flags.push("muted".to_string());
    }
    if user.warn_count > 0 {
        flags.push(format!("{} warn", user.warn_count));
    }
    format!(
        "{} {} ({}, {}) {} {}",
        user.id,
        user.alias,
        user.nim,
        user.role,
        status,
        flags.join(" ")
    )
    .trim_end()
    .to_string()
}

pub fn typing_line(alias: Option<&str>) -> Option<String> {
    alias.map(|alias| format!("{} is typing...", alias))
}
