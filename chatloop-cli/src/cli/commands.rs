//! Bot commands triggered by `!` messages

use anyhow::{Context, Result};
use chatloop_core::interact::Validator;
use chatloop_core::models::{Embed, Message, OutgoingMessage};
use chatloop_core::services::InteractionService;

/// Prefix that marks a message as a bot command
pub const COMMAND_PREFIX: char = '!';

const PAGES: &[(&str, &str)] = &[
    (
        "Prompts",
        "`!pick` asks you for a number. Answer in this channel, or press the cancel reaction.",
    ),
    (
        "Validation",
        "Answers that are not numbers are rejected and the prompt keeps waiting. Every rejection restarts its timeout.",
    ),
    (
        "Pagination",
        "⏮ first page, ◀ back, ⏹ stop, ▶ forward, ⏭ last page. Only the user who asked can turn pages.",
    ),
    (
        "Idle timeout",
        "Pagination stops on its own once nobody has pressed a button for a while.",
    ),
];

/// Known bot commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pick,
    Pages,
    Help,
}

impl Command {
    /// Parse the first word of `content`, e.g. `!pick`
    pub fn parse(content: &str) -> Option<Command> {
        let word = content.trim().split_whitespace().next()?;
        let name = word.strip_prefix(COMMAND_PREFIX)?;
        match name.to_ascii_lowercase().as_str() {
            "pick" => Some(Command::Pick),
            "pages" => Some(Command::Pages),
            "help" => Some(Command::Help),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Pick => "pick",
            Command::Pages => "pages",
            Command::Help => "help",
        }
    }
}

/// Run `command` as triggered by `trigger`
pub async fn run(service: InteractionService, command: Command, trigger: Message) -> Result<()> {
    chatloop_core::services::logging::log_command(
        command.name(),
        trigger.channel_id.get(),
        trigger.author_id.get(),
    );

    match command {
        Command::Pick => pick(&service, &trigger).await,
        Command::Pages => pages(&service, &trigger).await,
        Command::Help => help(&service, &trigger).await,
    }
}

fn is_number(content: &str) -> bool {
    let content = content.trim();
    !content.is_empty() && content.chars().all(|c| c.is_ascii_digit())
}

async fn pick(service: &InteractionService, trigger: &Message) -> Result<()> {
    let notices = service.clone();
    let validator = Validator::new_async(move |response: Message| {
        let notices = notices.clone();
        async move {
            if is_number(&response.content) {
                return true;
            }
            let notice = format!("`{}` is not a number, try again", response.content.trim());
            if let Err(error) = notices.send(response.channel_id, notice).await {
                tracing::warn!(error = %error, "failed to send validation notice");
            }
            false
        }
    });

    let options = service.default_prompt_options().validator(validator);
    let answer = service
        .prompt_author(trigger, "Pick a number", options)
        .await
        .context("pick prompt failed")?;

    let reply = match answer {
        Some(response) => format!("You picked {}", response.content.trim()),
        None => "Nothing picked".to_string(),
    };
    service.send(trigger.channel_id, reply).await?;
    Ok(())
}

fn page(index: i64) -> Result<OutgoingMessage> {
    let (title, body) = usize::try_from(index)
        .ok()
        .and_then(|index| PAGES.get(index))
        .with_context(|| format!("no page {}", index))?;

    let embed = Embed {
        title: Some(title.to_string()),
        description: Some(body.to_string()),
        footer: Some(format!("Page {}/{}", index + 1, PAGES.len())),
        ..Embed::default()
    };
    Ok(OutgoingMessage::default().with_embed(embed))
}

async fn show_page(service: InteractionService, message: Message, index: i64) -> Result<()> {
    service
        .transport()
        .edit_message(&message, &page(index)?)
        .await
        .map_err(|error| anyhow::anyhow!("failed to edit page: {}", error))?;
    Ok(())
}

async fn pages(service: &InteractionService, trigger: &Message) -> Result<()> {
    let message = service.send(trigger.channel_id, page(0)?).await?;
    let last = PAGES.len() as i64 - 1;

    let renderer = service.clone();
    let shown = message.clone();
    let index = service
        .paginate(
            &message,
            trigger.author_id,
            0..=last,
            service.default_pagination_options(),
            move |index| show_page(renderer.clone(), shown.clone(), index),
        )
        .await
        .context("pagination failed")?;

    tracing::debug!(message = %message.id, index, "pages closed");
    Ok(())
}

async fn help(service: &InteractionService, trigger: &Message) -> Result<()> {
    let text = format!(
        "Commands: {p}pick asks for a number, {p}pages shows paginated help, {p}help shows this",
        p = COMMAND_PREFIX
    );
    service.send(trigger.channel_id, text).await?;
    Ok(())
}
