//! Display rules for message bodies: mention highlighting, reply previews
//! and moderation placeholders.

use parley_types::models::{Message, UserId};

pub const DELETED_PLACEHOLDER: &str = "[This message was removed by a moderator]";
pub const BANNED_PLACEHOLDER: &str = "Messages from this user have been removed.";

const SNIPPET_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// `name` excludes the leading `@`.
    Mention { name: &'a str, is_self: bool },
}

fn is_mention_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '#'
}

/// Split a body into plain text and `@mention` tokens.
pub fn segments<'a>(body: &'a str, my_alias: Option<&str>) -> Vec<Segment<'a>> {
    let me = my_alias.map(|alias| alias.trim_start_matches('@'));
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut rest = body;
    let mut offset = 0;

    while let Some(at) = rest.find('@') {
        let after = &rest[at + 1..];
        let name_len = after
            .find(|c: char| !is_mention_char(c))
            .unwrap_or(after.len());

        if name_len == 0 {
            offset += at + 1;
            rest = after;
            continue;
        }

        let start = offset + at;
        if start > text_start {
            out.push(Segment::Text(&body[text_start..start]));
        }
        let name = &after[..name_len];
        out.push(Segment::Mention {
            name,
            is_self: me == Some(name),
        });

        offset = start + 1 + name_len;
        text_start = offset;
        rest = &body[offset..];
    }

    if text_start < body.len() {
        out.push(Segment::Text(&body[text_start..]));
    }
    out
}

/// What to show in place of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBody<'a> {
    Deleted,
    AuthorBanned,
    Segments(Vec<Segment<'a>>),
}

impl DisplayBody<'_> {
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            DisplayBody::Deleted => Some(DELETED_PLACEHOLDER),
            DisplayBody::AuthorBanned => Some(BANNED_PLACEHOLDER),
            DisplayBody::Segments(_) => None,
        }
    }
}

pub fn display_body<'a>(message: &'a Message, my_alias: Option<&str>) -> DisplayBody<'a> {
    if message.is_deleted {
        DisplayBody::Deleted
    } else if message.author_is_banned {
        DisplayBody::AuthorBanned
    } else {
        DisplayBody::Segments(segments(&message.body, my_alias))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPreview<'a> {
    pub author_alias: &'a str,
    pub snippet: String,
}

/// Reply header as captured at send time; never re-resolved.
pub fn reply_preview(message: &Message) -> Option<ReplyPreview<'_>> {
    let reply = message.reply_to.as_ref()?;
    Some(ReplyPreview {
        author_alias: &reply.author_alias,
        snippet: truncate(&reply.snippet, SNIPPET_CHARS),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn is_moderated(message: &Message) -> bool {
    message.is_deleted || message.author_is_banned
}

pub fn can_reply(message: &Message) -> bool {
    !is_moderated(message)
}

/// Only other non-staff users' visible messages can be reported.
pub fn can_report(message: &Message, me: &UserId) -> bool {
    !message.is_from(me) && !is_moderated(message) && !message.author.role.is_staff()
}

/// Visual emphasis of a message bubble, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Moderated,
    MentionsMe,
    Mine,
    Normal,
}

pub fn tone(message: &Message, me: &UserId) -> Tone {
    if is_moderated(message) {
        Tone::Moderated
    } else if message.mentions_user(me) {
        Tone::MentionsMe
    } else if message.is_from(me) {
        Tone::Mine
    } else {
        Tone::Normal
    }
}
