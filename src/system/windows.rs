use super::{SERVICE_HELPER, run_silent_with_output};
use crate::commands::{ServiceStatus, parse_status_response};

pub fn check_service_status() -> Result<ServiceStatus, String> {
    let (success, output) = run_silent_with_output(SERVICE_HELPER, &["status", "--json"]);
    if !success {
        // Missing or broken helper; either way there is nothing to talk to.
        log::info!("[service] helper not reachable: {}", output.trim());
        return Ok(ServiceStatus::NotInstalled);
    }
    parse_status_response(output.trim())
}

pub fn install_service() -> Result<(), String> {
    log::info!("[service] installing helper service");
    let (success, output) = run_silent_with_output(SERVICE_HELPER, &["install"]);
    if success {
        Ok(())
    } else {
        let detail = output.trim();
        if detail.is_empty() {
            Err("Failed to install the helper service".into())
        } else {
            Err(detail.to_string())
        }
    }
}

pub fn restart_engine() -> Result<(), String> {
    log::info!("[service] restarting engine through the helper");
    let (success, output) = run_silent_with_output(SERVICE_HELPER, &["restart"]);
    if success {
        Ok(())
    } else {
        let detail = output.trim();
        if detail.is_empty() {
            Err("Failed to restart the engine".into())
        } else {
            Err(detail.to_string())
        }
    }
}
