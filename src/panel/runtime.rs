use std::sync::Arc;

use crate::{
    commands::NativeCommands,
    guard::SettingGuard,
    notice::NoticeQueue,
    panel::patch_guard,
    settings::{SettingsPatch, SettingsStore, ThemeMode},
};

pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "zh"];

const DOCS_URL: &str = "https://github.com/proxydesk/proxydesk/wiki";

fn theme_patch(mode: ThemeMode) -> SettingsPatch {
    SettingsPatch {
        theme_mode: Some(mode),
        ..Default::default()
    }
}

fn language_patch(language: String) -> SettingsPatch {
    SettingsPatch {
        language: Some(language),
        ..Default::default()
    }
}

/// Application-runtime settings: theme and language. Both take free-form
/// input, so the format slot does real validation here.
pub struct RuntimePanel {
    store: SettingsStore,
    commands: Arc<dyn NativeCommands>,
    notices: NoticeQueue,
    theme_mode: SettingGuard<String, ThemeMode>,
    language: SettingGuard<String, String>,
}

impl RuntimePanel {
    pub fn new(
        store: SettingsStore,
        commands: Arc<dyn NativeCommands>,
        notices: NoticeQueue,
    ) -> Self {
        let theme_mode = patch_guard(
            "theme_mode",
            &store,
            &commands,
            &notices,
            |raw: String, _current| ThemeMode::parse(&raw),
            theme_patch,
        );
        let language = patch_guard(
            "language",
            &store,
            &commands,
            &notices,
            |raw: String, _current| {
                let raw = raw.trim().to_lowercase();
                if SUPPORTED_LANGUAGES.contains(&raw.as_str()) {
                    Ok(raw)
                } else {
                    Err(format!("unsupported language '{raw}'"))
                }
            },
            language_patch,
        );

        Self {
            store,
            commands,
            notices,
            theme_mode,
            language,
        }
    }

    pub async fn set_theme_mode(&self, raw: &str) -> bool {
        let current = self.store.snapshot().theme_mode;
        self.theme_mode
            .request_change(raw.to_string(), &current)
            .await
            .is_some()
    }

    pub async fn set_language(&self, raw: &str) -> bool {
        let current = self.store.snapshot().language;
        self.language
            .request_change(raw.to_string(), &current)
            .await
            .is_some()
    }

    pub fn open_docs(&self) {
        if let Err(error) = self.commands.open_url(DOCS_URL) {
            self.notices.error(error);
        }
    }
}
