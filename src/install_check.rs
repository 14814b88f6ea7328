use std::path::Path;

/// The "move to Applications" choice is wired but stays switched off; the
/// gate currently only offers quitting.
pub const MOVE_ACTION_ENABLED: bool = false;

/// Walks up from the executable to the enclosing `.app` bundle and checks
/// whether it lives under /Applications. `Err` when the executable does not
/// run from a bundle at all.
pub fn bundle_installed(executable: &Path) -> Result<bool, String> {
    let bundle = executable
        .ancestors()
        .find(|path| path.extension().and_then(|extension| extension.to_str()) == Some("app"))
        .ok_or_else(|| "Not running from an .app bundle".to_string())?;
    Ok(bundle.starts_with("/Applications/"))
}

/// Desktop-placement check, consumed once at startup. Only macOS cares.
#[cfg(target_os = "macos")]
pub fn installed_in_applications() -> bool {
    let executable = match std::env::current_exe() {
        Ok(executable) => executable,
        Err(error) => {
            log::warn!("[install] failed to resolve current executable: {error}");
            return true;
        }
    };
    match bundle_installed(&executable) {
        Ok(installed) => {
            log::info!(
                "[install] bundle at {} installed={installed}",
                executable.display()
            );
            installed
        }
        Err(error) => {
            // Development builds run outside a bundle; do not block them.
            log::info!("[install] {error}, skipping placement gate");
            true
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn installed_in_applications() -> bool {
    true
}

#[cfg(target_os = "macos")]
pub fn move_to_applications() -> Result<(), String> {
    use std::process::Command;

    let executable =
        std::env::current_exe().map_err(|error| format!("Failed to locate executable: {error}"))?;
    let bundle = executable
        .ancestors()
        .find(|path| path.extension().and_then(|extension| extension.to_str()) == Some("app"))
        .ok_or_else(|| "Not running from an .app bundle".to_string())?;

    let bundle_str = bundle
        .to_str()
        .ok_or_else(|| "Bundle path is not valid UTF-8".to_string())?
        .replace('"', "\\\"");
    let name = bundle
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| "Failed to read bundle name".to_string())?;
    let target = format!("/Applications/{name}");

    let shell = if Path::new(&target).exists() {
        format!("rm -R '{target}' && cp -R '{bundle_str}' '{target}' && rm -R '{bundle_str}'")
    } else {
        format!("cp -R '{bundle_str}' '{target}' && rm -R '{bundle_str}'")
    };
    let script = format!(r#"do shell script "{shell}" with administrator privileges"#);

    log::info!("[install] moving bundle to {target}");
    let output = Command::new("osascript")
        .args(["-e", &script])
        .output()
        .map_err(|error| format!("Failed to run osascript: {error}"))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

#[cfg(not(target_os = "macos"))]
pub fn move_to_applications() -> Result<(), String> {
    Err("Unsupported on this platform".into())
}

#[derive(Debug, PartialEq, Eq)]
pub enum GateAction {
    Quit,
    Move,
    Unknown,
}

/// Interprets input while the placement gate blocks the shell. Nothing else
/// is reachable until the user quits (or the move action, once enabled).
pub fn gate_action(line: &str) -> GateAction {
    match line.trim() {
        "quit" | "q" | "exit" => GateAction::Quit,
        "move" => GateAction::Move,
        _ => GateAction::Unknown,
    }
}

/// Blocks until the user quits. Runs instead of the shell when the bundle
/// sits outside /Applications.
pub fn run_gate(input: &mut impl std::io::BufRead) {
    let mut line = String::new();
    loop {
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {}
            Err(error) => {
                log::error!("[install] input read failed: {error}");
                return;
            }
        }
        match gate_action(&line) {
            GateAction::Quit => return,
            GateAction::Move => {
                if MOVE_ACTION_ENABLED {
                    match move_to_applications() {
                        Ok(()) => {
                            println!("Moved to /Applications; start the application again.");
                            return;
                        }
                        Err(error) => println!("Move failed: {error}"),
                    }
                } else {
                    println!("Moving is currently disabled; move the bundle manually and restart.");
                }
            }
            GateAction::Unknown => println!("Type 'quit' to exit."),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn bundle_under_applications_is_installed() {
        let path = PathBuf::from("/Applications/ProxyDesk.app/Contents/MacOS/proxydesk-ui");
        assert_eq!(bundle_installed(&path), Ok(true));
    }

    #[test]
    fn bundle_elsewhere_is_not_installed() {
        let path = PathBuf::from("/Users/dev/Downloads/ProxyDesk.app/Contents/MacOS/proxydesk-ui");
        assert_eq!(bundle_installed(&path), Ok(false));
    }

    #[test]
    fn bare_binary_is_not_a_bundle() {
        let path = PathBuf::from("/usr/local/bin/proxydesk-ui");
        assert!(bundle_installed(&path).is_err());
    }

    #[test]
    fn gate_only_recognizes_quit_and_move() {
        assert_eq!(gate_action("quit"), GateAction::Quit);
        assert_eq!(gate_action("  q "), GateAction::Quit);
        assert_eq!(gate_action("move"), GateAction::Move);
        assert_eq!(gate_action("tun on"), GateAction::Unknown);
    }

    #[test]
    fn gate_swallows_everything_until_quit() {
        let mut input = std::io::Cursor::new("tun on\nmove\nstatus\nquit\nafter\n");
        run_gate(&mut input);

        // Only the line after quit is left unread.
        let mut rest = String::new();
        std::io::BufRead::read_line(&mut input, &mut rest).unwrap();
        assert_eq!(rest, "after\n");
    }

    #[test]
    fn gate_stops_at_end_of_input() {
        let mut input = std::io::Cursor::new("move\n");
        run_gate(&mut input);
    }
}
