use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use futures::future::LocalBoxFuture;

use crate::{
    commands::{CommandFuture, NativeCommands, ServiceStatus},
    settings::{self, SettingsPatch},
};

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// The engine binary the shell grants privileges to.
pub const ENGINE_COMPONENT: &str = "proxydesk-core";

/// The helper service used for service mode on Windows.
#[cfg(target_os = "windows")]
pub const SERVICE_HELPER: &str = "proxydesk-service";

/// Which precondition gates a tun-mode switch, decided once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrivilegeStrategy {
    /// Grant the engine binary its capabilities, then restart it.
    PosixPermission,
    /// Ensure the helper service exists and flip the service-mode flag.
    WindowsService,
    /// No precondition; the change commits directly.
    None,
}

pub fn privilege_strategy() -> PrivilegeStrategy {
    if cfg!(any(target_os = "macos", target_os = "linux")) {
        PrivilegeStrategy::PosixPermission
    } else if cfg!(target_os = "windows") {
        PrivilegeStrategy::WindowsService
    } else {
        PrivilegeStrategy::None
    }
}

#[cfg(target_os = "linux")]
pub struct LinuxCommands {
    settings_path: PathBuf,
}

#[cfg(target_os = "macos")]
pub struct MacCommands {
    settings_path: PathBuf,
}

#[cfg(target_os = "windows")]
pub struct WindowsCommands {
    settings_path: PathBuf,
}

#[cfg(target_os = "linux")]
pub fn native_commands(settings_path: PathBuf) -> Arc<dyn NativeCommands> {
    Arc::new(LinuxCommands { settings_path })
}

#[cfg(target_os = "macos")]
pub fn native_commands(settings_path: PathBuf) -> Arc<dyn NativeCommands> {
    Arc::new(MacCommands { settings_path })
}

#[cfg(target_os = "windows")]
pub fn native_commands(settings_path: PathBuf) -> Arc<dyn NativeCommands> {
    Arc::new(WindowsCommands { settings_path })
}

#[cfg(target_os = "linux")]
impl NativeCommands for LinuxCommands {
    fn check_service_status(&self) -> LocalBoxFuture<'static, Result<ServiceStatus, String>> {
        // The helper service is a Windows concern.
        Box::pin(async { Ok(ServiceStatus::NotInstalled) })
    }

    fn grant_permission(&self, component: &str) -> CommandFuture {
        let component = component.to_string();
        Box::pin(async move { linux::grant_permission(&component) })
    }

    fn install_service(&self) -> CommandFuture {
        Box::pin(async { Err("Service install is not supported on this platform".into()) })
    }

    fn restart_engine(&self) -> CommandFuture {
        let pid_path = engine_pid_path(&self.settings_path);
        Box::pin(async move { restart_engine_unix(&pid_path) })
    }

    fn persist_config_patch(&self, patch: SettingsPatch) -> CommandFuture {
        let settings_path = self.settings_path.clone();
        Box::pin(async move { persist_patch(&settings_path, &patch) })
    }

    fn open_url(&self, url: &str) -> Result<(), String> {
        open_url_with("xdg-open", url)
    }
}

#[cfg(target_os = "macos")]
impl NativeCommands for MacCommands {
    fn check_service_status(&self) -> LocalBoxFuture<'static, Result<ServiceStatus, String>> {
        Box::pin(async { Ok(ServiceStatus::NotInstalled) })
    }

    fn grant_permission(&self, component: &str) -> CommandFuture {
        let component = component.to_string();
        Box::pin(async move { macos::grant_permission(&component) })
    }

    fn install_service(&self) -> CommandFuture {
        Box::pin(async { Err("Service install is not supported on this platform".into()) })
    }

    fn restart_engine(&self) -> CommandFuture {
        let pid_path = engine_pid_path(&self.settings_path);
        Box::pin(async move { restart_engine_unix(&pid_path) })
    }

    fn persist_config_patch(&self, patch: SettingsPatch) -> CommandFuture {
        let settings_path = self.settings_path.clone();
        Box::pin(async move { persist_patch(&settings_path, &patch) })
    }

    fn open_url(&self, url: &str) -> Result<(), String> {
        open_url_with("open", url)
    }
}

#[cfg(target_os = "windows")]
impl NativeCommands for WindowsCommands {
    fn check_service_status(&self) -> LocalBoxFuture<'static, Result<ServiceStatus, String>> {
        Box::pin(async { windows::check_service_status() })
    }

    fn grant_permission(&self, _component: &str) -> CommandFuture {
        Box::pin(async { Err("Permission grant is not supported on this platform".into()) })
    }

    fn install_service(&self) -> CommandFuture {
        Box::pin(async { windows::install_service() })
    }

    fn restart_engine(&self) -> CommandFuture {
        Box::pin(async { windows::restart_engine() })
    }

    fn persist_config_patch(&self, patch: SettingsPatch) -> CommandFuture {
        let settings_path = self.settings_path.clone();
        Box::pin(async move { persist_patch(&settings_path, &patch) })
    }

    fn open_url(&self, url: &str) -> Result<(), String> {
        if run_silent("cmd", &["/C", "start", "", url]) {
            Ok(())
        } else {
            Err(format!("Failed to open {url}"))
        }
    }
}

/// Applies a partial record to the persisted settings file. The in-memory
/// snapshot is the caller's business; this only touches disk.
fn persist_patch(settings_path: &Path, patch: &SettingsPatch) -> Result<(), String> {
    if patch.is_empty() {
        return Ok(());
    }
    let mut persisted = settings::load_settings(settings_path);
    patch.apply_to(&mut persisted);
    settings::save_settings(settings_path, &persisted)?;
    log::info!("[system] settings persisted to {}", settings_path.display());
    Ok(())
}

fn engine_pid_path(settings_path: &Path) -> PathBuf {
    settings_path.with_file_name("engine.pid")
}

#[cfg(unix)]
fn restart_engine_unix(pid_path: &Path) -> Result<(), String> {
    let content = std::fs::read_to_string(pid_path).map_err(|_| {
        format!(
            "Engine is not running (no pid file at {})",
            pid_path.display()
        )
    })?;
    let pid: u32 = content
        .trim()
        .parse()
        .map_err(|_| format!("Invalid pid file {}", pid_path.display()))?;

    log::info!("[system] restarting engine process {pid}");
    if run_silent("kill", &["-HUP", &pid.to_string()]) {
        Ok(())
    } else {
        Err(format!("Failed to signal engine process {pid}"))
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn engine_binary_path(component: &str) -> Result<String, String> {
    let path = std::env::current_exe()
        .map_err(|error| format!("Failed to locate executable: {error}"))?
        .with_file_name(component);
    let path = path
        .canonicalize()
        .map_err(|error| format!("Engine binary {} not found: {error}", path.display()))?;
    Ok(path.display().to_string())
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn open_url_with(opener: &str, url: &str) -> Result<(), String> {
    if run_silent(opener, &[url]) {
        Ok(())
    } else {
        Err(format!("Failed to open {url}"))
    }
}

#[cfg(target_os = "windows")]
pub(crate) const CREATE_NO_WINDOW: u32 = 0x08000000;

pub fn run_silent_with_output(program: &str, arguments: &[&str]) -> (bool, String) {
    log::debug!("[cmd] {} {}", program, arguments.join(" "));
    let mut command = Command::new(program);
    command
        .args(arguments)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    match command.output() {
        Ok(output) => {
            let success = output.status.success();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            if !success {
                log::debug!(
                    "[cmd] FAILED (exit {}): {} {}\n  stdout: {}\n  stderr: {}",
                    output.status.code().unwrap_or(-1),
                    program,
                    arguments.join(" "),
                    stdout.trim(),
                    stderr.trim(),
                );
            }
            // Failures report stderr, where setcap/pkexec and the helper
            // put their diagnostics; the payload otherwise is stdout.
            if success || stderr.trim().is_empty() {
                (success, stdout)
            } else {
                (false, stderr)
            }
        }
        Err(error) => {
            log::debug!("[cmd] spawn error for {}: {}", program, error);
            (false, error.to_string())
        }
    }
}

pub fn run_silent(program: &str, arguments: &[&str]) -> bool {
    run_silent_with_output(program, arguments).0
}
