use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::models::insert_template;
use crate::providers::{ApiError, CustomMethod, PollinationsClient};
use crate::services::chat::{self, AssistantReply, PendingTurn};
use crate::services::preferences::{platform_prefers_dark, SidebarSections, Theme};
use crate::services::{AppSettings, ChatStore, Database, PreferencesService, SettingsService};
use crate::ui::terminal::{self, Section};

/// Input events, one per line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum AppMsg {
    Send(String),
    NewChat,
    List,
    Open(usize),
    Show,
    TogglePin(Option<usize>),
    Search(String),
    Edit(usize, String),
    Resend(usize),
    Pause,
    CreateFolder(String),
    ListTemplates,
    AddTemplate(String, String),
    UpdateTemplate(usize, String, String),
    RemoveTemplate(usize),
    UseTemplate(usize),
    ToggleTheme,
    ToggleSection(Section),
    ToggleSidebar,
    GetSetting(String),
    UpdateSetting(String, Value),
    AddCustomApi {
        name: String,
        endpoint: String,
        key: Option<String>,
    },
    RemoveCustomApi(String),
    CallCustomApi {
        id: String,
        method: CustomMethod,
        prompt: String,
    },
    AddMcp(String, String),
    RemoveMcp(String),
    ToggleMcp(String),
    Help,
    Quit,
    Invalid(String),
}

/// Results of background work, delivered back to the loop.
#[derive(Debug)]
pub enum AppCmd {
    ReplyReady(PendingTurn, Result<AssistantReply, ApiError>),
    CustomResult(String, Result<Value, ApiError>),
}

pub struct App {
    db: Database,
    store: ChatStore,
    client: Arc<PollinationsClient>,
    settings: AppSettings,
    theme: Theme,
    sections: SidebarSections,
    sidebar_collapsed: bool,
    draft: String,
    cmd_tx: mpsc::UnboundedSender<AppCmd>,
    cmd_rx: mpsc::UnboundedReceiver<AppCmd>,
}

impl App {
    pub fn new(db: Database, client: PollinationsClient) -> Self {
        let settings = SettingsService::load(&db);
        let theme = PreferencesService::load_theme(&db, platform_prefers_dark());
        let sections = PreferencesService::load_sidebar_sections(&db);
        let sidebar_collapsed = PreferencesService::load_sidebar_collapsed(&db);

        let mut store = ChatStore::new(Arc::new(db.clone()));
        store.hydrate(Utc::now());

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        Self {
            db,
            store,
            client: Arc::new(client),
            settings,
            theme,
            sections,
            sidebar_collapsed,
            draft: String::new(),
            cmd_tx,
            cmd_rx,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        terminal::print_banner(self.theme);
        self.show_selected();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let msg = terminal::parse_line(&line);
                    if msg == AppMsg::Quit {
                        break;
                    }
                    self.update(msg);
                }
                Some(cmd) = self.cmd_rx.recv() => {
                    self.update_cmd(cmd);
                }
            }
        }

        tracing::info!("Exiting");
        Ok(())
    }

    fn selected_id(&self) -> Option<String> {
        self.store.state().selected_id.clone()
    }

    fn message_id(&self, index: usize) -> Option<String> {
        let conv = self.store.state().selected()?;
        conv.messages.get(index.checked_sub(1)?).map(|m| m.id.clone())
    }

    fn template_id(&self, index: usize) -> Option<String> {
        let templates = &self.store.state().templates;
        templates.get(index.checked_sub(1)?).map(|t| t.id.clone())
    }

    fn show_selected(&self) {
        if let Some(conv) = self.store.state().selected() {
            terminal::print_conversation(conv, self.settings.show_timestamps);
        }
    }

    fn dispatch(&self, turn: PendingTurn) {
        terminal::print_thinking();

        let client = self.client.clone();
        let settings = self.settings.clone();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = chat::respond(client.as_ref(), &settings, &turn).await;
            let _ = tx.send(AppCmd::ReplyReady(turn, result));
        });
    }

    pub fn update(&mut self, msg: AppMsg) {
        let now = Utc::now();

        match msg {
            AppMsg::Send(text) => {
                let Some(conv_id) = self.selected_id() else {
                    terminal::print_error("No conversation selected");
                    return;
                };
                let text = if self.draft.is_empty() {
                    text
                } else {
                    insert_template(&std::mem::take(&mut self.draft), &text)
                };
                match self.store.begin_send(&conv_id, &text, now) {
                    Ok(Some(turn)) => self.dispatch(turn),
                    Ok(None) => {}
                    Err(e) => terminal::print_error(&e.to_string()),
                }
            }
            AppMsg::NewChat => {
                self.store.create(now);
                self.show_selected();
            }
            AppMsg::List => {
                if self.sidebar_collapsed {
                    terminal::print_info("Sidebar is collapsed (/sidebar to expand)");
                } else {
                    terminal::print_sidebar(self.store.state(), &self.sections);
                }
            }
            AppMsg::Open(index) => {
                let id = terminal::listed_ids(self.store.state())
                    .get(index.saturating_sub(1))
                    .cloned();
                match id {
                    Some(id) => {
                        if let Err(e) = self.store.select(&id) {
                            terminal::print_error(&e.to_string());
                        }
                        self.show_selected();
                    }
                    None => terminal::print_error("No conversation with that number"),
                }
            }
            AppMsg::Show => self.show_selected(),
            AppMsg::TogglePin(index) => {
                let id = match index {
                    Some(i) => terminal::listed_ids(self.store.state())
                        .get(i.saturating_sub(1))
                        .cloned(),
                    None => self.selected_id(),
                };
                match id.map(|id| self.store.toggle_pin(&id)) {
                    Some(Ok(())) => terminal::print_info("Pin toggled"),
                    Some(Err(e)) => terminal::print_error(&e.to_string()),
                    None => terminal::print_error("No conversation with that number"),
                }
            }
            AppMsg::Search(query) => {
                self.store.set_query(&query);
                terminal::print_sidebar(self.store.state(), &self.sections);
            }
            AppMsg::Edit(index, content) => {
                let (Some(conv_id), Some(msg_id)) = (self.selected_id(), self.message_id(index))
                else {
                    terminal::print_error("No message with that number");
                    return;
                };
                match self.store.edit_message(&conv_id, &msg_id, &content, now) {
                    Ok(()) => self.show_selected(),
                    Err(e) => terminal::print_error(&e.to_string()),
                }
            }
            AppMsg::Resend(index) => {
                let (Some(conv_id), Some(msg_id)) = (self.selected_id(), self.message_id(index))
                else {
                    terminal::print_error("No message with that number");
                    return;
                };
                match self.store.begin_resend(&conv_id, &msg_id, now) {
                    Ok(Some(turn)) => self.dispatch(turn),
                    Ok(None) => {}
                    Err(e) => terminal::print_error(&e.to_string()),
                }
            }
            AppMsg::Pause => {
                self.store.pause();
                terminal::print_info("Stopped waiting; a late reply will still be added");
            }
            AppMsg::CreateFolder(name) => match self.store.create_folder(&name) {
                Ok(()) => terminal::print_info(&format!("Created folder {}", name.trim())),
                Err(e) => terminal::print_error(&e.to_string()),
            },
            AppMsg::ListTemplates => terminal::print_templates(&self.store.state().templates),
            AppMsg::AddTemplate(title, content) => {
                self.store.add_template(&title, &content);
                terminal::print_templates(&self.store.state().templates);
            }
            AppMsg::UpdateTemplate(index, title, content) => {
                let result = self
                    .template_id(index)
                    .map(|id| self.store.update_template(&id, &title, &content));
                self.report_template_result(result);
            }
            AppMsg::RemoveTemplate(index) => {
                let result = self
                    .template_id(index)
                    .map(|id| self.store.remove_template(&id));
                self.report_template_result(result);
            }
            AppMsg::UseTemplate(index) => {
                let body = self
                    .template_id(index)
                    .and_then(|id| self.store.state().template(&id).map(|t| t.content.clone()));
                match body {
                    Some(body) => {
                        self.draft = insert_template(&self.draft, &body);
                        terminal::print_draft(&self.draft);
                    }
                    None => terminal::print_error("No template with that number"),
                }
            }
            AppMsg::ToggleTheme => {
                self.theme = self.theme.toggled();
                PreferencesService::save_theme(&self.db, self.theme);
                terminal::print_info(&format!("Theme: {:?}", self.theme));
            }
            AppMsg::ToggleSection(section) => {
                section.toggle(&mut self.sections);
                PreferencesService::save_sidebar_sections(&self.db, &self.sections);
                terminal::print_sidebar(self.store.state(), &self.sections);
            }
            AppMsg::ToggleSidebar => {
                self.sidebar_collapsed = !self.sidebar_collapsed;
                PreferencesService::save_sidebar_collapsed(&self.db, self.sidebar_collapsed);
            }
            AppMsg::GetSetting(key) => match SettingsService::get_value(&self.db, &key) {
                Some(value) => terminal::print_info(&format!("{} = {}", key, value)),
                None => terminal::print_error(&format!("Unknown setting {}", key)),
            },
            AppMsg::UpdateSetting(key, value) => {
                match SettingsService::update(&self.db, &key, value) {
                    Ok(settings) => {
                        self.settings = settings;
                        if let Some(value) = SettingsService::get_value(&self.db, &key) {
                            terminal::print_info(&format!("{} = {}", key, value));
                        }
                    }
                    Err(e) => terminal::print_error(&e.to_string()),
                }
            }
            AppMsg::AddCustomApi { name, endpoint, key } => {
                let added = self
                    .settings
                    .add_custom_api(&name, &endpoint, key.as_deref())
                    .map(|api| api.id.clone());
                match added {
                    Ok(id) => {
                        SettingsService::save(&self.db, &self.settings);
                        terminal::print_info(&format!("Added API {}", id));
                    }
                    Err(e) => terminal::print_error(&e.to_string()),
                }
            }
            AppMsg::RemoveCustomApi(id) => {
                let result = self.settings.remove_custom_api(&id);
                self.save_settings_result(result.map(|_| "Removed API".to_string()));
            }
            AppMsg::CallCustomApi { id, method, prompt } => {
                let Some(api) = self.settings.custom_api(&id).cloned() else {
                    terminal::print_error(&format!("No custom API {}", id));
                    return;
                };
                let client = self.client.clone();
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let key = Some(api.key.as_str()).filter(|k| !k.is_empty());
                    let result = client
                        .call_custom(&api.endpoint, key, &prompt, method)
                        .await;
                    let _ = tx.send(AppCmd::CustomResult(api.name, result));
                });
            }
            AppMsg::AddMcp(name, command) => {
                let result = self.settings.add_mcp(&name, &command).map(|m| m.id.clone());
                self.save_settings_result(result.map(|id| format!("Added MCP {}", id)));
            }
            AppMsg::RemoveMcp(id) => {
                let result = self.settings.remove_mcp(&id);
                self.save_settings_result(result.map(|_| "Removed MCP".to_string()));
            }
            AppMsg::ToggleMcp(id) => {
                let result = self.settings.toggle_mcp(&id);
                self.save_settings_result(
                    result.map(|on| format!("MCP {}", if on { "enabled" } else { "disabled" })),
                );
            }
            AppMsg::Help => terminal::print_help(),
            AppMsg::Quit => {}
            AppMsg::Invalid(reason) => terminal::print_error(&reason),
        }
    }

    fn update_cmd(&mut self, cmd: AppCmd) {
        match cmd {
            AppCmd::ReplyReady(turn, result) => {
                match self.store.finish_send(&turn, result, Utc::now()) {
                    Ok(()) => {
                        if self.selected_id().as_deref() == Some(turn.conversation_id.as_str()) {
                            if let Some(message) = self
                                .store
                                .state()
                                .conversation(&turn.conversation_id)
                                .and_then(|c| c.messages.last())
                            {
                                terminal::print_message(message, self.settings.show_timestamps);
                            }
                        } else {
                            terminal::print_info("Reply added to another conversation");
                        }
                    }
                    Err(e) => terminal::print_error(&e.to_string()),
                }
            }
            AppCmd::CustomResult(name, result) => match result {
                Ok(value) => terminal::print_info(&format!("{}: {}", name, value)),
                Err(e) => terminal::print_error(&format!("{}: {}", name, e)),
            },
        }
    }

    fn report_template_result(
        &self,
        result: Option<Result<(), crate::services::StateError>>,
    ) {
        match result {
            Some(Ok(())) => terminal::print_templates(&self.store.state().templates),
            Some(Err(e)) => terminal::print_error(&e.to_string()),
            None => terminal::print_error("No template with that number"),
        }
    }

    fn save_settings_result(
        &self,
        result: Result<String, crate::services::settings::SettingsError>,
    ) {
        match result {
            Ok(info) => {
                SettingsService::save(&self.db, &self.settings);
                terminal::print_info(&info);
            }
            Err(e) => terminal::print_error(&e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::providers::TextReply;
    use crate::services::KeyValueStore;

    fn app() -> App {
        App::new(Database::new_in_memory().unwrap(), PollinationsClient::new())
    }

    #[test]
    fn test_startup_selects_a_conversation() {
        let app = app();
        assert!(app.store.is_hydrated());
        assert!(app.store.state().selected().is_some());
    }

    #[test]
    fn test_template_goes_into_the_draft() {
        let mut app = app();
        app.update(AppMsg::AddTemplate("Greeting".to_string(), "Hello team,".to_string()));
        let n = app.store.state().templates.len();

        app.update(AppMsg::UseTemplate(n));
        assert_eq!(app.draft, "Hello team,");
        app.update(AppMsg::UseTemplate(n));
        assert_eq!(app.draft, "Hello team,\n\nHello team,");
    }

    #[test]
    fn test_theme_and_sidebar_are_persisted() {
        let mut app = app();
        let before = app.theme;
        app.update(AppMsg::ToggleTheme);
        assert_eq!(
            PreferencesService::load_theme(&app.db, false),
            before.toggled()
        );

        app.update(AppMsg::ToggleSection(Section::Recent));
        assert!(PreferencesService::load_sidebar_sections(&app.db).recent);

        app.update(AppMsg::ToggleSidebar);
        assert!(PreferencesService::load_sidebar_collapsed(&app.db));
    }

    #[test]
    fn test_settings_commands_persist() {
        let mut app = app();
        app.update(AppMsg::UpdateSetting(
            "defaultTextModel".to_string(),
            serde_json::json!("mistral"),
        ));
        assert_eq!(app.settings.default_text_model, "mistral");

        app.update(AppMsg::UpdateSetting("fooBar".to_string(), serde_json::json!(1)));
        assert_eq!(app.settings.default_text_model, "mistral");
        assert!(!app.db.get(config::SETTINGS_KEY).unwrap().unwrap().contains("fooBar"));

        app.update(AppMsg::AddMcp("files".to_string(), "mcp-files".to_string()));
        app.update(AppMsg::AddCustomApi {
            name: "Mine".to_string(),
            endpoint: "https://api.example.com".to_string(),
            key: None,
        });

        let saved = SettingsService::load(&app.db);
        assert_eq!(saved.mcps.len(), 1);
        assert_eq!(saved.custom_apis.len(), 1);
        assert!(app.db.get(config::SETTINGS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_late_reply_lands_after_pause() {
        let mut app = app();
        let id = app.store.state().selected_id.clone().unwrap();
        let turn = app
            .store
            .begin_send(&id, "hello", Utc::now())
            .unwrap()
            .unwrap();

        app.update(AppMsg::Pause);
        assert!(app.store.state().thinking.is_none());

        app.update_cmd(AppCmd::ReplyReady(
            turn,
            Ok(AssistantReply::Text(TextReply::text("hi"))),
        ));
        assert_eq!(app.store.state().selected().unwrap().message_count, 2);
    }
}
