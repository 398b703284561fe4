//! Line-oriented chat view for the terminal.
//!
//! Plain lines are sent to the selected conversation. Lines starting with `/`
//! are commands; see `print_help` for the list.

use serde_json::Value;
use thiserror::Error;

use crate::app::AppMsg;
use crate::config::APP_NAME;
use crate::models::{Conversation, Message, Role, Template};
use crate::providers::CustomMethod;
use crate::services::preferences::{SidebarSections, Theme};
use crate::services::ChatState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0} (type /help for a list)")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// A collapsible sidebar section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Pinned,
    Recent,
    Folders,
    Templates,
}

impl Section {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pinned" => Some(Section::Pinned),
            "recent" => Some(Section::Recent),
            "folders" => Some(Section::Folders),
            "templates" => Some(Section::Templates),
            _ => None,
        }
    }

    pub fn toggle(self, sections: &mut SidebarSections) {
        let flag = match self {
            Section::Pinned => &mut sections.pinned,
            Section::Recent => &mut sections.recent,
            Section::Folders => &mut sections.folders,
            Section::Templates => &mut sections.templates,
        };
        *flag = !*flag;
    }
}

pub fn parse_line(input: &str) -> AppMsg {
    parse_command(input).unwrap_or_else(|e| AppMsg::Invalid(e.to_string()))
}

pub fn parse_command(input: &str) -> Result<AppMsg, CommandError> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Ok(AppMsg::Send(input.to_string()));
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "/new" => Ok(AppMsg::NewChat),
        "/list" | "/ls" => Ok(AppMsg::List),
        "/show" => Ok(AppMsg::Show),
        "/open" => Ok(AppMsg::Open(index(rest, "/open <n>")?)),
        "/pin" => {
            if rest.is_empty() {
                Ok(AppMsg::TogglePin(None))
            } else {
                Ok(AppMsg::TogglePin(Some(index(rest, "/pin [n]")?)))
            }
        }
        "/search" => Ok(AppMsg::Search(rest.to_string())),
        "/edit" => {
            let (n, text) = split_first(rest).ok_or(CommandError::Usage("/edit <n> <text>"))?;
            Ok(AppMsg::Edit(index(n, "/edit <n> <text>")?, text.to_string()))
        }
        "/resend" => Ok(AppMsg::Resend(index(rest, "/resend <n>")?)),
        "/pause" | "/stop" => Ok(AppMsg::Pause),
        "/folder" => Ok(AppMsg::CreateFolder(rest.to_string())),
        "/template" | "/templates" => parse_template(rest),
        "/theme" => Ok(AppMsg::ToggleTheme),
        "/collapse" => Section::parse(rest)
            .map(AppMsg::ToggleSection)
            .ok_or(CommandError::Usage("/collapse <pinned|recent|folders|templates>")),
        "/sidebar" => Ok(AppMsg::ToggleSidebar),
        "/set" => parse_setting(rest),
        "/api" => parse_api(rest),
        "/mcp" => parse_mcp(rest),
        "/help" => Ok(AppMsg::Help),
        "/quit" | "/exit" => Ok(AppMsg::Quit),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn index(arg: &str, usage: &'static str) -> Result<usize, CommandError> {
    arg.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or(CommandError::Usage(usage))
}

fn split_first(rest: &str) -> Option<(&str, &str)> {
    let (head, tail) = rest.split_once(char::is_whitespace)?;
    let tail = tail.trim();
    (!tail.is_empty()).then_some((head, tail))
}

/// `title | content`
fn title_and_body(rest: &str) -> Option<(String, String)> {
    let (title, body) = rest.split_once('|')?;
    let title = title.trim();
    (!title.is_empty()).then(|| (title.to_string(), body.trim().replace("\\n", "\n")))
}

fn parse_template(rest: &str) -> Result<AppMsg, CommandError> {
    const USAGE: &str = "/template [add <title> | <body>|edit <n> <title> | <body>|rm <n>|use <n>]";

    let (sub, args) = split_first(rest).unwrap_or((rest, ""));
    match sub {
        "" | "list" => Ok(AppMsg::ListTemplates),
        "add" => {
            let (title, body) = title_and_body(args).ok_or(CommandError::Usage(USAGE))?;
            Ok(AppMsg::AddTemplate(title, body))
        }
        "edit" => {
            let (n, args) = split_first(args).ok_or(CommandError::Usage(USAGE))?;
            let (title, body) = title_and_body(args).ok_or(CommandError::Usage(USAGE))?;
            Ok(AppMsg::UpdateTemplate(index(n, USAGE)?, title, body))
        }
        "rm" => Ok(AppMsg::RemoveTemplate(index(args, USAGE)?)),
        "use" => Ok(AppMsg::UseTemplate(index(args, USAGE)?)),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn parse_setting(rest: &str) -> Result<AppMsg, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::Usage("/set <key> [value]"));
    }
    match split_first(rest) {
        None => Ok(AppMsg::GetSetting(rest.to_string())),
        Some((key, raw)) => {
            // bare words are taken as strings
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok(AppMsg::UpdateSetting(key.to_string(), value))
        }
    }
}

fn parse_api(rest: &str) -> Result<AppMsg, CommandError> {
    const USAGE: &str = "/api [add <name> <endpoint> [key]|rm <id>|get <id> <prompt>|post <id> <prompt>]";

    let mut words = rest.split_whitespace();
    match words.next() {
        Some("add") => {
            let name = words.next().ok_or(CommandError::Usage(USAGE))?;
            let endpoint = words.next().ok_or(CommandError::Usage(USAGE))?;
            Ok(AppMsg::AddCustomApi {
                name: name.to_string(),
                endpoint: endpoint.to_string(),
                key: words.next().map(str::to_string),
            })
        }
        Some("rm") => Ok(AppMsg::RemoveCustomApi(
            words.next().ok_or(CommandError::Usage(USAGE))?.to_string(),
        )),
        Some(verb @ ("get" | "post")) => {
            let id = words.next().ok_or(CommandError::Usage(USAGE))?;
            let prompt = words.collect::<Vec<_>>().join(" ");
            if prompt.is_empty() {
                return Err(CommandError::Usage(USAGE));
            }
            let method = if verb == "get" {
                CustomMethod::Get
            } else {
                CustomMethod::Post
            };
            Ok(AppMsg::CallCustomApi {
                id: id.to_string(),
                method,
                prompt,
            })
        }
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn parse_mcp(rest: &str) -> Result<AppMsg, CommandError> {
    const USAGE: &str = "/mcp [add <name> <command...>|rm <id>|toggle <id>]";

    let (sub, args) = split_first(rest).ok_or(CommandError::Usage(USAGE))?;
    match sub {
        "add" => {
            let (name, command) = split_first(args).ok_or(CommandError::Usage(USAGE))?;
            Ok(AppMsg::AddMcp(name.to_string(), command.to_string()))
        }
        "rm" => Ok(AppMsg::RemoveMcp(args.to_string())),
        "toggle" => Ok(AppMsg::ToggleMcp(args.to_string())),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

/// Conversation ids in the order `print_sidebar` numbers them: pinned, then
/// recent.
pub fn listed_ids(state: &ChatState) -> Vec<String> {
    state
        .pinned()
        .into_iter()
        .chain(state.recent())
        .map(|c| c.id.clone())
        .collect()
}

pub fn print_banner(theme: Theme) {
    println!("{} ({:?} theme). Type /help for commands.", APP_NAME, theme);
}

pub fn print_sidebar(state: &ChatState, sections: &SidebarSections) {
    if !state.query.is_empty() {
        println!("Search: {}", state.query);
    }

    let selected = state.selected_id.as_deref();
    let line = |n: usize, conv: &Conversation| {
        let marker = if Some(conv.id.as_str()) == selected { '*' } else { ' ' };
        println!(
            "{}{:>3}. {} ({}) - {}",
            marker, n, conv.title, conv.message_count, conv.preview
        );
    };

    let pinned = state.pinned();
    let recent = state.recent();

    println!("Pinned{}", if sections.pinned { " [collapsed]" } else { "" });
    if !sections.pinned {
        for (i, conv) in pinned.iter().copied().enumerate() {
            line(i + 1, conv);
        }
    }

    println!("Recent{}", if sections.recent { " [collapsed]" } else { "" });
    if !sections.recent {
        for (i, conv) in recent.iter().copied().enumerate() {
            line(pinned.len() + i + 1, conv);
        }
    }

    println!("Folders{}", if sections.folders { " [collapsed]" } else { "" });
    if !sections.folders {
        for (folder, count) in state.folder_counts() {
            println!("      {} ({})", folder.name, count);
        }
    }

    println!("Templates{}", if sections.templates { " [collapsed]" } else { "" });
    if !sections.templates {
        for (i, template) in state.templates.iter().enumerate() {
            println!("   {:>3}. {}", i + 1, template.title);
        }
    }
}

pub fn print_conversation(conv: &Conversation, show_timestamps: bool) {
    println!("== {} ==", conv.title);
    for (i, message) in conv.messages.iter().enumerate() {
        print!("[{}] ", i + 1);
        print_message(message, show_timestamps);
    }
}

pub fn print_message(message: &Message, show_timestamps: bool) {
    let who = match message.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
        Role::System => "System",
    };
    let edited = if message.edited_at.is_some() { " (edited)" } else { "" };
    if show_timestamps {
        println!(
            "{} {}{}: {}",
            message.created_at.format("%H:%M"),
            who,
            edited,
            message.content
        );
    } else {
        println!("{}{}: {}", who, edited, message.content);
    }

    if let Some(url) = &message.image_url {
        if url.starts_with("data:") {
            println!("    [image, {} bytes inline]", url.len());
        } else {
            println!("    [image] {}", url);
        }
    }
    if let Some(mime) = &message.audio_mime {
        println!("    [audio {}]", mime);
    }
}

pub fn print_templates(templates: &[Template]) {
    for (i, template) in templates.iter().enumerate() {
        println!("{:>3}. {}", i + 1, template.title);
    }
}

pub fn print_draft(draft: &str) {
    println!("Draft (your next line is appended):\n{}", draft);
}

pub fn print_thinking() {
    println!("Thinking... (/pause to stop waiting)");
}

pub fn print_info(text: &str) {
    println!("{}", text);
}

pub fn print_error(text: &str) {
    eprintln!("! {}", text);
}

pub fn print_help() {
    println!(
        "\
Type a message to send it to the selected conversation.
  /new                     start a new conversation
  /list                    show pinned, recent, folders and templates
  /open <n>                select conversation n from /list
  /show                    reprint the selected conversation
  /pin [n]                 toggle pin (selected conversation by default)
  /search [text]           filter the list; no text clears it
  /edit <n> <text>         replace message n
  /resend <n>              send message n again
  /pause                   stop waiting for the current reply
  /folder <name>           create a folder
  /template ...            list, add, edit, rm or use templates
  /theme                   switch between light and dark
  /collapse <section>      collapse or expand a list section
  /sidebar                 hide or show the list
  /set <key> [value]       read or change a setting
  /api ...                 manage and call custom APIs
  /mcp ...                 manage MCP entries
  /quit                    exit"
    );
}
