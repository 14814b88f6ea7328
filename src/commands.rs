use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use futures::future::LocalBoxFuture;
use serde::Deserialize;

use crate::settings::SettingsPatch;

pub type CommandFuture = LocalBoxFuture<'static, Result<(), String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceStatus {
    Active,
    Installed,
    NotInstalled,
    Error(i32),
}

impl ServiceStatus {
    /// Service mode can only be switched on while the helper service exists.
    pub fn allows_service_mode(self) -> bool {
        matches!(self, Self::Active | Self::Installed)
    }

    pub fn label(self) -> String {
        match self {
            Self::Active => "active".into(),
            Self::Installed => "installed".into(),
            Self::NotInstalled => "not installed".into(),
            Self::Error(code) => format!("error (code {code})"),
        }
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    code: i32,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<StatusData>,
}

#[derive(Deserialize)]
struct StatusData {
    #[serde(default)]
    status: String,
}

/// Parses the JSON the service helper prints for its `status` subcommand.
pub fn parse_status_response(body: &str) -> Result<ServiceStatus, String> {
    let response: StatusResponse = serde_json::from_str(body)
        .map_err(|error| format!("Failed to parse service status: {error}"))?;

    if response.code != 0 {
        log::warn!(
            "[service] helper reported code {}: {}",
            response.code,
            response.msg
        );
        return Ok(ServiceStatus::Error(response.code));
    }

    let status = response.data.map(|data| data.status).unwrap_or_default();
    match status.as_str() {
        "active" => Ok(ServiceStatus::Active),
        "installed" => Ok(ServiceStatus::Installed),
        "not_installed" | "" => Ok(ServiceStatus::NotInstalled),
        other => Err(format!("unknown service status '{other}'")),
    }
}

/// The native command surface the shell drives. Everything behind it is a
/// black box: a call either succeeds or fails with a message.
pub trait NativeCommands {
    fn check_service_status(&self) -> LocalBoxFuture<'static, Result<ServiceStatus, String>>;

    fn grant_permission(&self, component: &str) -> CommandFuture;

    fn install_service(&self) -> CommandFuture;

    fn restart_engine(&self) -> CommandFuture;

    fn persist_config_patch(&self, patch: SettingsPatch) -> CommandFuture;

    fn open_url(&self, url: &str) -> Result<(), String>;
}

struct CachedStatus {
    status: ServiceStatus,
    checked_at: DateTime<Utc>,
}

/// Service status is polled and cached; a fresh value is not re-queried
/// for an hour.
pub struct ServiceStatusCache {
    inner: Mutex<Option<CachedStatus>>,
}

impl ServiceStatusCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub fn refresh_interval() -> Duration {
        Duration::hours(1)
    }

    pub fn fresh(&self, now: DateTime<Utc>) -> Option<ServiceStatus> {
        let cached = match self.inner.lock() {
            Ok(cached) => cached,
            Err(_) => return None,
        };
        cached.as_ref().and_then(|entry| {
            if now - entry.checked_at < Self::refresh_interval() {
                Some(entry.status)
            } else {
                None
            }
        })
    }

    pub fn store(&self, status: ServiceStatus, checked_at: DateTime<Utc>) {
        if let Ok(mut cached) = self.inner.lock() {
            *cached = Some(CachedStatus { status, checked_at });
        }
    }

    pub async fn get(
        &self,
        commands: &Arc<dyn NativeCommands>,
    ) -> Result<ServiceStatus, String> {
        let now = Utc::now();
        if let Some(status) = self.fresh(now) {
            log::debug!("[service] using cached status: {}", status.label());
            return Ok(status);
        }

        let status = commands.check_service_status().await?;
        log::info!("[service] status: {}", status.label());
        self.store(status, now);
        Ok(status)
    }
}

#[cfg(test)]
pub mod testing {
    use futures::future;

    use super::*;

    type CallResult = Result<(), String>;

    /// Scriptable native layer for panel and app tests. Records every call
    /// in order; each command returns whatever the test configured.
    pub struct MockCommands {
        calls: Mutex<Vec<String>>,
        pub service_status: Mutex<Result<ServiceStatus, String>>,
        pub grant_result: Mutex<CallResult>,
        pub install_result: Mutex<CallResult>,
        pub restart_result: Mutex<CallResult>,
        pub persist_result: Mutex<CallResult>,
    }

    impl MockCommands {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                service_status: Mutex::new(Ok(ServiceStatus::Active)),
                grant_result: Mutex::new(Ok(())),
                install_result: Mutex::new(Ok(())),
                restart_result: Mutex::new(Ok(())),
                persist_result: Mutex::new(Ok(())),
            })
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_named(&self, name: &str) -> usize {
            self.calls()
                .iter()
                .filter(|call| call.starts_with(name))
                .count()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    impl NativeCommands for MockCommands {
        fn check_service_status(
            &self,
        ) -> LocalBoxFuture<'static, Result<ServiceStatus, String>> {
            self.record("check_service_status");
            let result = self.service_status.lock().unwrap().clone();
            Box::pin(future::ready(result))
        }

        fn grant_permission(&self, component: &str) -> CommandFuture {
            self.record(format!("grant_permission({component})"));
            let result = self.grant_result.lock().unwrap().clone();
            Box::pin(future::ready(result))
        }

        fn install_service(&self) -> CommandFuture {
            self.record("install_service");
            let result = self.install_result.lock().unwrap().clone();
            Box::pin(future::ready(result))
        }

        fn restart_engine(&self) -> CommandFuture {
            self.record("restart_engine");
            let result = self.restart_result.lock().unwrap().clone();
            Box::pin(future::ready(result))
        }

        fn persist_config_patch(&self, _patch: SettingsPatch) -> CommandFuture {
            self.record("persist_config_patch");
            let result = self.persist_result.lock().unwrap().clone();
            Box::pin(future::ready(result))
        }

        fn open_url(&self, url: &str) -> Result<(), String> {
            self.record(format!("open_url({url})"));
            Ok(())
        }
    }
}
