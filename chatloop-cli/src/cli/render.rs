//! Terminal rendering of what the bot does in the console channel

use chatloop_core::models::{Embed, Message};
use chatloop_core::transport::TransportCall;
use crossterm::style::Stylize;

fn embed_lines(embed: &Embed) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &embed.title {
        lines.push(format!("  │ {}", title.as_str().bold()));
    }
    if let Some(description) = &embed.description {
        for line in description.lines() {
            lines.push(format!("  │ {}", line));
        }
    }
    if let Some(footer) = &embed.footer {
        lines.push(format!("  │ {}", footer.as_str().dark_grey()));
    }
    lines.join("\n")
}

fn with_embed(head: String, embed: Option<&Embed>) -> String {
    match embed {
        Some(embed) => format!("{}\n{}", head, embed_lines(embed)),
        None => head,
    }
}

/// One line (plus embed block) for an outbound call
pub fn render_call(call: &TransportCall) -> String {
    match call {
        TransportCall::Send { message, embed } => {
            let head = format!(
                "{} {} {}",
                format!("[{}]", message.id).dark_grey(),
                "bot:".cyan().bold(),
                message.content
            );
            with_embed(head, embed.as_ref())
        }
        TransportCall::Edit {
            message_id,
            content,
        } => {
            let head = format!(
                "{} {} {}",
                format!("[{}]", message_id).dark_grey(),
                "bot (edited):".cyan(),
                content.content
            );
            with_embed(head, content.embed.as_ref())
        }
        TransportCall::Delete { message_id } => {
            format!("{} {}", format!("[{}]", message_id).dark_grey(), "deleted".red())
        }
        TransportCall::AddReaction { message_id, emoji } => format!(
            "{} {} {}",
            format!("[{}]", message_id).dark_grey(),
            "+".green(),
            emoji
        ),
        TransportCall::RemoveReaction {
            message_id,
            user_id,
            emoji,
        } => format!(
            "{} {} {} (user {})",
            format!("[{}]", message_id).dark_grey(),
            "-".yellow(),
            emoji,
            user_id
        ),
        TransportCall::RemoveAllReactions { message_id } => format!(
            "{} {}",
            format!("[{}]", message_id).dark_grey(),
            "reactions cleared".yellow()
        ),
    }
}

/// Echo of a message typed into the console
pub fn render_inbound(message: &Message) -> String {
    format!(
        "{} {} {}",
        format!("[{}]", message.id).dark_grey(),
        format!("user {}:", message.author_id).green().bold(),
        message.content
    )
}
