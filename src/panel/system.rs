use std::sync::Arc;

use chrono::Utc;
use futures::future;

use crate::{
    commands::{NativeCommands, ServiceStatus, ServiceStatusCache},
    guard::SettingGuard,
    notice::NoticeQueue,
    panel::patch_toggle_guard,
    settings::{SettingsPatch, SettingsStore},
    system::{ENGINE_COMPONENT, PrivilegeStrategy},
};

fn tun_patch(enable: bool) -> SettingsPatch {
    SettingsPatch {
        enable_tun_mode: Some(enable),
        ..Default::default()
    }
}

fn service_patch(enable: bool) -> SettingsPatch {
    SettingsPatch {
        enable_service_mode: Some(enable),
        ..Default::default()
    }
}

fn system_proxy_patch(enable: bool) -> SettingsPatch {
    SettingsPatch {
        enable_system_proxy: Some(enable),
        ..Default::default()
    }
}

fn auto_launch_patch(enable: bool) -> SettingsPatch {
    SettingsPatch {
        enable_auto_launch: Some(enable),
        ..Default::default()
    }
}

fn silent_start_patch(enable: bool) -> SettingsPatch {
    SettingsPatch {
        enable_silent_start: Some(enable),
        ..Default::default()
    }
}

/// System settings: tun mode, service mode, system proxy, auto launch,
/// silent start. One guard per control; a failure on one never touches
/// its siblings.
pub struct SystemPanel {
    store: SettingsStore,
    commands: Arc<dyn NativeCommands>,
    status_cache: Arc<ServiceStatusCache>,
    notices: NoticeQueue,
    tun_mode: SettingGuard<bool, bool>,
    service_mode: SettingGuard<bool, bool>,
    system_proxy: SettingGuard<bool, bool>,
    auto_launch: SettingGuard<bool, bool>,
    silent_start: SettingGuard<bool, bool>,
}

impl SystemPanel {
    pub fn new(
        store: SettingsStore,
        commands: Arc<dyn NativeCommands>,
        strategy: PrivilegeStrategy,
        notices: NoticeQueue,
    ) -> Self {
        let status_cache = Arc::new(ServiceStatusCache::new());

        let tun_mode = {
            let change_store = store.clone();
            let guard_commands = commands.clone();
            let guard_store = store.clone();
            let guard_cache = status_cache.clone();
            SettingGuard::new(
                "tun_mode",
                move |enable: bool| {
                    Box::pin(future::ready(change_store.apply_patch(&tun_patch(enable))))
                },
                notices.guard_sink(),
            )
            .guarded(move |enable: bool| {
                let commands = guard_commands.clone();
                let store = guard_store.clone();
                let cache = guard_cache.clone();
                Box::pin(async move {
                    // Switching off needs no precondition.
                    if enable {
                        privilege_step(&commands, &store, &cache, strategy).await?;
                    }
                    commands.persist_config_patch(tun_patch(enable)).await
                })
            })
        };

        let service_mode =
            patch_toggle_guard("service_mode", &store, &commands, &notices, service_patch);
        let system_proxy = patch_toggle_guard(
            "system_proxy",
            &store,
            &commands,
            &notices,
            system_proxy_patch,
        );
        let auto_launch = patch_toggle_guard(
            "auto_launch",
            &store,
            &commands,
            &notices,
            auto_launch_patch,
        );
        let silent_start = patch_toggle_guard(
            "silent_start",
            &store,
            &commands,
            &notices,
            silent_start_patch,
        );

        Self {
            store,
            commands,
            status_cache,
            notices,
            tun_mode,
            service_mode,
            system_proxy,
            auto_launch,
            silent_start,
        }
    }

    pub async fn set_tun_mode(&self, enable: bool) -> bool {
        let current = self.store.snapshot().enable_tun_mode;
        self.tun_mode.request_change(enable, &current).await.is_some()
    }

    /// Service mode is only offered while the helper service exists.
    pub async fn service_mode_available(&self) -> Result<bool, String> {
        let status = self.status_cache.get(&self.commands).await?;
        Ok(status.allows_service_mode())
    }

    pub async fn set_service_mode(&self, enable: bool) -> bool {
        // The control renders disabled without the helper; a change request
        // cannot even start.
        match self.service_mode_available().await {
            Ok(true) => {}
            Ok(false) => {
                self.notices
                    .error("Service is not installed; service mode is unavailable");
                return false;
            }
            Err(error) => {
                self.notices.error(error);
                return false;
            }
        }
        let current = self.store.snapshot().enable_service_mode;
        self.service_mode
            .request_change(enable, &current)
            .await
            .is_some()
    }

    pub async fn set_system_proxy(&self, enable: bool) -> bool {
        let current = self.store.snapshot().enable_system_proxy;
        self.system_proxy
            .request_change(enable, &current)
            .await
            .is_some()
    }

    pub async fn set_auto_launch(&self, enable: bool) -> bool {
        let current = self.store.snapshot().enable_auto_launch;
        self.auto_launch
            .request_change(enable, &current)
            .await
            .is_some()
    }

    pub async fn set_silent_start(&self, enable: bool) -> bool {
        let current = self.store.snapshot().enable_silent_start;
        self.silent_start
            .request_change(enable, &current)
            .await
            .is_some()
    }

    /// The explicit re-grant action next to the tun-mode control.
    pub async fn grant_engine_permission(&self) {
        match self.commands.grant_permission(ENGINE_COMPONENT).await {
            Ok(()) => {
                if let Err(error) = self.commands.restart_engine().await {
                    self.notices.error(error);
                    return;
                }
                self.notices
                    .success(format!("Granted permission to {ENGINE_COMPONENT}"));
            }
            Err(error) => self.notices.error(error),
        }
    }
}

async fn privilege_step(
    commands: &Arc<dyn NativeCommands>,
    store: &SettingsStore,
    cache: &Arc<ServiceStatusCache>,
    strategy: PrivilegeStrategy,
) -> Result<(), String> {
    match strategy {
        PrivilegeStrategy::PosixPermission => {
            commands.grant_permission(ENGINE_COMPONENT).await?;
            commands.restart_engine().await
        }
        PrivilegeStrategy::WindowsService => ensure_service_mode(commands, store, cache).await,
        PrivilegeStrategy::None => Ok(()),
    }
}

/// Makes sure the helper service exists and service mode is on. Install is
/// retried once before the failure surfaces.
async fn ensure_service_mode(
    commands: &Arc<dyn NativeCommands>,
    store: &SettingsStore,
    cache: &Arc<ServiceStatusCache>,
) -> Result<(), String> {
    let healthy = match commands.check_service_status().await {
        Ok(status) => status.allows_service_mode(),
        Err(error) => {
            log::warn!("[service] status check failed: {error}");
            false
        }
    };

    if !healthy {
        if let Err(first) = commands.install_service().await {
            log::warn!("[service] install failed, retrying once: {first}");
            commands.install_service().await?;
        }
        cache.store(ServiceStatus::Installed, Utc::now());
    }

    commands.persist_config_patch(service_patch(true)).await?;
    store.apply_patch(&service_patch(true))
}
