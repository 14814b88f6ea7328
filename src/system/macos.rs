use std::process::Command;

use super::engine_binary_path;

/// Marks the engine binary setuid root so tun mode can run unelevated.
/// Prompts for administrator rights through osascript, as the Finder would.
pub fn grant_permission(component: &str) -> Result<(), String> {
    let path = engine_binary_path(component)?;

    if already_privileged(&path) {
        log::info!("[permission] {path} already has the required bits");
        return Ok(());
    }

    let escaped = path.replace(' ', "\\\\ ");
    let shell = format!("chown root:admin {escaped}\nchmod +sx {escaped}");
    let script = format!(r#"do shell script "{shell}" with administrator privileges"#);

    log::info!("[permission] requesting administrator rights for {path}");
    let output = Command::new("osascript")
        .args(["-e", &script])
        .output()
        .map_err(|error| format!("Failed to run osascript: {error}"))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        if detail.is_empty() {
            Err("Administrator authorization was refused".into())
        } else {
            Err(detail.to_string())
        }
    }
}

/// Owner root, group admin, setuid and setgid all present.
fn already_privileged(path: &str) -> bool {
    use std::os::unix::fs::MetadataExt;

    match std::fs::metadata(path) {
        Ok(metadata) => {
            let mode = metadata.mode();
            metadata.uid() == 0
                && metadata.gid() == 80
                && mode & 0o4000 != 0
                && mode & 0o2000 != 0
        }
        Err(_) => false,
    }
}
