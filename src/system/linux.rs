use super::{engine_binary_path, run_silent, run_silent_with_output};

/// Gives the engine binary the capabilities tun mode needs. Elevates through
/// pkexec when present, sudo otherwise.
pub fn grant_permission(component: &str) -> Result<(), String> {
    let path = engine_binary_path(component)?;
    let escaped = path.replace(' ', "\\ ");
    let shell = format!("setcap cap_net_bind_service,cap_net_admin=+ep {escaped}");

    let elevator = if run_silent("which", &["pkexec"]) {
        "pkexec"
    } else {
        "sudo"
    };

    log::info!("[permission] {elevator} sh -c {shell}");
    let (success, output) = run_silent_with_output(elevator, &["sh", "-c", &shell]);
    if success {
        Ok(())
    } else {
        let detail = output.trim();
        if detail.is_empty() {
            Err(format!("Failed to grant permission to {component}"))
        } else {
            Err(detail.to_string())
        }
    }
}
