use std::sync::Arc;

use futures::future;

use crate::{
    commands::NativeCommands,
    guard::SettingGuard,
    notice::NoticeQueue,
    panel::{patch_guard, patch_toggle_guard},
    settings::{EngineLogLevel, SettingsPatch, SettingsStore},
};

fn port_patch(port: u16) -> SettingsPatch {
    SettingsPatch {
        mixed_port: Some(port),
        ..Default::default()
    }
}

fn allow_lan_patch(enable: bool) -> SettingsPatch {
    SettingsPatch {
        allow_lan: Some(enable),
        ..Default::default()
    }
}

fn log_level_patch(level: EngineLogLevel) -> SettingsPatch {
    SettingsPatch {
        engine_log_level: Some(level),
        ..Default::default()
    }
}

/// Unprivileged ports are refused up front; the engine would fail to bind
/// them anyway and report it much later.
fn parse_port(raw: &str) -> Result<u16, String> {
    let port: u16 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a port number"))?;
    if port < 1024 {
        return Err(format!("port {port} is reserved; use 1024-65535"));
    }
    Ok(port)
}

/// Proxy-engine settings: the mixed listener port, LAN exposure, and the
/// engine's own log level.
pub struct EnginePanel {
    store: SettingsStore,
    mixed_port: SettingGuard<String, u16>,
    allow_lan: SettingGuard<bool, bool>,
    log_level: SettingGuard<String, EngineLogLevel>,
}

impl EnginePanel {
    pub fn new(
        store: SettingsStore,
        commands: Arc<dyn NativeCommands>,
        notices: NoticeQueue,
    ) -> Self {
        // Rebinding the listener needs an engine restart after the patch is
        // persisted; plain toggles only persist.
        let mixed_port = {
            let change_store = store.clone();
            let guard_commands = commands.clone();
            SettingGuard::with_format(
                "mixed_port",
                |raw: String, _current: &u16| parse_port(&raw),
                move |port: u16| {
                    Box::pin(future::ready(change_store.apply_patch(&port_patch(port))))
                },
                notices.guard_sink(),
            )
            .guarded(move |port: u16| {
                let commands = guard_commands.clone();
                Box::pin(async move {
                    commands.persist_config_patch(port_patch(port)).await?;
                    commands.restart_engine().await
                })
            })
        };

        let allow_lan =
            patch_toggle_guard("allow_lan", &store, &commands, &notices, allow_lan_patch);
        let log_level = patch_guard(
            "engine_log_level",
            &store,
            &commands,
            &notices,
            |raw: String, _current| EngineLogLevel::parse(raw.trim()),
            log_level_patch,
        );

        Self {
            store,
            mixed_port,
            allow_lan,
            log_level,
        }
    }

    pub async fn set_mixed_port(&self, raw: &str) -> bool {
        let current = self.store.snapshot().mixed_port;
        self.mixed_port
            .request_change(raw.to_string(), &current)
            .await
            .is_some()
    }

    pub async fn set_allow_lan(&self, enable: bool) -> bool {
        let current = self.store.snapshot().allow_lan;
        self.allow_lan
            .request_change(enable, &current)
            .await
            .is_some()
    }

    pub async fn set_log_level(&self, raw: &str) -> bool {
        let current = self.store.snapshot().engine_log_level;
        self.log_level
            .request_change(raw.to_string(), &current)
            .await
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use tempfile::tempdir;

    use super::*;
    use crate::commands::testing::MockCommands;
    use crate::settings::SETTINGS_FILE;

    fn panel_with(
        commands: std::sync::Arc<MockCommands>,
    ) -> (EnginePanel, SettingsStore, NoticeQueue, tempfile::TempDir) {
        let directory = tempdir().unwrap();
        let store = SettingsStore::load(directory.path().join(SETTINGS_FILE));
        let notices = NoticeQueue::new();
        let panel = EnginePanel::new(store.clone(), commands, notices.clone());
        (panel, store, notices, directory)
    }

    #[test]
    fn port_change_persists_then_restarts() {
        let commands = MockCommands::new();
        let (panel, store, notices, _directory) = panel_with(commands.clone());

        assert!(block_on(panel.set_mixed_port("7891")));

        assert_eq!(store.snapshot().mixed_port, 7891);
        assert!(notices.is_empty());
        assert_eq!(
            commands.calls(),
            vec!["persist_config_patch".to_string(), "restart_engine".to_string()]
        );
    }

    #[test]
    fn unparsable_port_never_reaches_the_native_layer() {
        let commands = MockCommands::new();
        let (panel, store, notices, _directory) = panel_with(commands.clone());

        assert!(!block_on(panel.set_mixed_port("http")));

        assert_eq!(store.snapshot().mixed_port, 7890);
        assert_eq!(notices.len(), 1);
        assert!(commands.calls().is_empty());
    }

    #[test]
    fn reserved_port_is_rejected() {
        let commands = MockCommands::new();
        let (panel, store, notices, _directory) = panel_with(commands.clone());

        assert!(!block_on(panel.set_mixed_port("80")));

        assert_eq!(store.snapshot().mixed_port, 7890);
        let recorded = notices.snapshot();
        assert!(recorded[0].message.contains("reserved"));
    }

    #[test]
    fn failed_restart_rolls_the_port_back() {
        let commands = MockCommands::new();
        *commands.restart_result.lock().unwrap() = Err("engine is not running".into());
        let (panel, store, notices, _directory) = panel_with(commands.clone());

        assert!(!block_on(panel.set_mixed_port("7891")));

        assert_eq!(store.snapshot().mixed_port, 7890, "snapshot stays on the confirmed value");
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn allow_lan_and_log_level_commit_directly() {
        let commands = MockCommands::new();
        let (panel, store, notices, _directory) = panel_with(commands.clone());

        assert!(block_on(panel.set_allow_lan(true)));
        assert!(block_on(panel.set_log_level("debug")));

        let snapshot = store.snapshot();
        assert!(snapshot.allow_lan);
        assert_eq!(snapshot.engine_log_level, EngineLogLevel::Debug);
        assert!(notices.is_empty());
        assert_eq!(commands.calls_named("restart_engine"), 0);
    }
}
