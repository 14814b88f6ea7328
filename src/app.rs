use std::{io::BufRead, sync::Arc};

use futures::executor::block_on;

use crate::{
    commands::NativeCommands,
    notice::NoticeQueue,
    panel::{engine::EnginePanel, runtime::RuntimePanel, system::SystemPanel},
    settings::SettingsStore,
    system::PrivilegeStrategy,
};

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

/// The interactive shell. Each settings panel owns its guards; the shell
/// only routes lines to them and prints the result.
pub struct App {
    store: SettingsStore,
    notices: NoticeQueue,
    system: SystemPanel,
    runtime: RuntimePanel,
    engine: EnginePanel,
}

impl App {
    pub fn new(
        store: SettingsStore,
        commands: Arc<dyn NativeCommands>,
        strategy: PrivilegeStrategy,
    ) -> Self {
        let notices = NoticeQueue::new();
        let system = SystemPanel::new(store.clone(), commands.clone(), strategy, notices.clone());
        let runtime = RuntimePanel::new(store.clone(), commands.clone(), notices.clone());
        let engine = EnginePanel::new(store.clone(), commands, notices.clone());

        Self {
            store,
            notices,
            system,
            runtime,
            engine,
        }
    }

    pub fn run(&self, input: &mut impl BufRead) {
        self.print_status();
        println!("Type 'help' for the command list.");

        let mut line = String::new();
        loop {
            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(error) => {
                    log::error!("[app] input read failed: {error}");
                    break;
                }
            }
            if self.dispatch(&line) == Outcome::Quit {
                break;
            }
        }
    }

    pub fn dispatch(&self, line: &str) -> Outcome {
        let mut parts = line.split_whitespace();
        let command = parts.next();
        let argument = parts.next();

        match (command, argument) {
            (None, _) => {}
            (Some("quit" | "q" | "exit"), _) => return Outcome::Quit,
            (Some("help"), _) => print_help(),
            (Some("status"), _) => self.print_status(),
            (Some("notices"), _) => self.print_notices(),
            (Some("dismiss"), argument) => self.dismiss(argument),
            (Some("tun"), Some(value)) => {
                self.toggle(value, |enable| block_on(self.system.set_tun_mode(enable)));
            }
            (Some("proxy"), Some(value)) => {
                self.toggle(value, |enable| block_on(self.system.set_system_proxy(enable)));
            }
            (Some("service"), Some(value)) => {
                self.toggle(value, |enable| block_on(self.system.set_service_mode(enable)));
            }
            (Some("autolaunch"), Some(value)) => {
                self.toggle(value, |enable| block_on(self.system.set_auto_launch(enable)));
            }
            (Some("silent"), Some(value)) => {
                self.toggle(value, |enable| block_on(self.system.set_silent_start(enable)));
            }
            (Some("lan"), Some(value)) => {
                self.toggle(value, |enable| block_on(self.engine.set_allow_lan(enable)));
            }
            (Some("theme"), Some(value)) => {
                self.report(block_on(self.runtime.set_theme_mode(value)));
            }
            (Some("language"), Some(value)) => {
                self.report(block_on(self.runtime.set_language(value)));
            }
            (Some("port"), Some(value)) => {
                self.report(block_on(self.engine.set_mixed_port(value)));
            }
            (Some("loglevel"), Some(value)) => {
                self.report(block_on(self.engine.set_log_level(value)));
            }
            (Some("grant"), _) => {
                block_on(self.system.grant_engine_permission());
                self.print_latest();
            }
            (Some("docs"), _) => self.runtime.open_docs(),
            (Some(other), _) => {
                println!("unknown or incomplete command '{other}'; type 'help'");
            }
        }
        Outcome::Continue
    }

    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    fn toggle(&self, raw: &str, apply: impl FnOnce(bool) -> bool) {
        match parse_switch(raw) {
            Some(enable) => self.report(apply(enable)),
            None => println!("expected 'on' or 'off', got '{raw}'"),
        }
    }

    fn report(&self, applied: bool) {
        if applied {
            println!("ok");
        } else {
            self.print_latest();
        }
    }

    fn print_latest(&self) {
        if let Some(notice) = self.notices.snapshot().last() {
            println!("{}: {}", notice.level.label(), notice.message);
        }
    }

    fn print_status(&self) {
        let snapshot = self.store.snapshot();
        println!("tun mode      {}", switch_label(snapshot.enable_tun_mode));
        println!("system proxy  {}", switch_label(snapshot.enable_system_proxy));
        println!("service mode  {}", switch_label(snapshot.enable_service_mode));
        println!("auto launch   {}", switch_label(snapshot.enable_auto_launch));
        println!("silent start  {}", switch_label(snapshot.enable_silent_start));
        println!("theme         {}", snapshot.theme_mode.label());
        println!("language      {}", snapshot.language);
        println!("mixed port    {}", snapshot.mixed_port);
        println!("allow lan     {}", switch_label(snapshot.allow_lan));
        println!("engine log    {}", snapshot.engine_log_level.label());
    }

    fn print_notices(&self) {
        let notices = self.notices.snapshot();
        if notices.is_empty() {
            println!("no notices");
            return;
        }
        for (index, notice) in notices.iter().enumerate() {
            println!(
                "[{index}] {} {} {}",
                notice.at.format("%H:%M:%S"),
                notice.level.label(),
                notice.message
            );
        }
    }

    fn dismiss(&self, argument: Option<&str>) {
        match argument {
            Some("all") => self.notices.dismiss_all(),
            Some(raw) => match raw.parse::<usize>() {
                Ok(index) if self.notices.dismiss(index) => {}
                _ => println!("no notice '{raw}'"),
            },
            None => println!("usage: dismiss <index>|all"),
        }
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn switch_label(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn print_help() {
    println!("  status                  show current settings");
    println!("  tun on|off              tun mode (may prompt for privileges)");
    println!("  proxy on|off            system proxy");
    println!("  service on|off          service mode (needs the helper service)");
    println!("  autolaunch on|off       start with the system");
    println!("  silent on|off           start without a window");
    println!("  theme light|dark|system application theme");
    println!("  language <code>         interface language");
    println!("  port <number>           engine mixed port (restarts the engine)");
    println!("  lan on|off              allow LAN connections");
    println!("  loglevel <level>        engine log level");
    println!("  grant                   re-grant engine privileges");
    println!("  docs                    open the documentation");
    println!("  notices / dismiss <n>   review and clear notifications");
    println!("  quit                    exit");
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::commands::testing::MockCommands;
    use crate::settings::{SETTINGS_FILE, ThemeMode};

    fn app_with(commands: Arc<MockCommands>) -> (App, SettingsStore, tempfile::TempDir) {
        let directory = tempdir().unwrap();
        let store = SettingsStore::load(directory.path().join(SETTINGS_FILE));
        let app = App::new(store.clone(), commands, PrivilegeStrategy::None);
        (app, store, directory)
    }

    #[test]
    fn switch_values_parse() {
        assert_eq!(parse_switch("on"), Some(true));
        assert_eq!(parse_switch("off"), Some(false));
        assert_eq!(parse_switch("yes"), None);
    }

    #[test]
    fn lines_route_to_the_right_panel() {
        let commands = MockCommands::new();
        let (app, store, _directory) = app_with(commands.clone());

        assert_eq!(app.dispatch("proxy on"), Outcome::Continue);
        assert_eq!(app.dispatch("theme dark"), Outcome::Continue);
        assert_eq!(app.dispatch("port 7891"), Outcome::Continue);

        let snapshot = store.snapshot();
        assert!(snapshot.enable_system_proxy);
        assert_eq!(snapshot.theme_mode, ThemeMode::Dark);
        assert_eq!(snapshot.mixed_port, 7891);
        assert_eq!(commands.calls_named("restart_engine"), 1);
    }

    #[test]
    fn quit_stops_the_loop_and_blank_lines_do_not() {
        let commands = MockCommands::new();
        let (app, _store, _directory) = app_with(commands);

        assert_eq!(app.dispatch(""), Outcome::Continue);
        assert_eq!(app.dispatch("   "), Outcome::Continue);
        assert_eq!(app.dispatch("q"), Outcome::Quit);
        assert_eq!(app.dispatch("exit"), Outcome::Quit);
    }

    #[test]
    fn bad_switch_value_changes_nothing() {
        let commands = MockCommands::new();
        let (app, store, _directory) = app_with(commands.clone());

        app.dispatch("tun maybe");

        assert!(!store.snapshot().enable_tun_mode);
        assert!(commands.calls().is_empty());
    }

    #[test]
    fn failed_change_leaves_a_dismissable_notice() {
        let commands = MockCommands::new();
        *commands.persist_result.lock().unwrap() = Err("disk full".into());
        let (app, store, _directory) = app_with(commands);

        app.dispatch("proxy on");

        assert!(!store.snapshot().enable_system_proxy);
        assert_eq!(app.notices().len(), 1);
        app.dispatch("dismiss 0");
        assert!(app.notices().is_empty());
    }

    #[test]
    fn run_consumes_input_until_quit() {
        let commands = MockCommands::new();
        let (app, store, _directory) = app_with(commands);

        let mut input = std::io::Cursor::new("lan on\nquit\nlan off\n");
        app.run(&mut input);

        // The line after quit was never dispatched.
        assert!(store.snapshot().allow_lan);
    }

    #[test]
    fn unknown_command_is_ignored() {
        let commands = MockCommands::new();
        let (app, store, _directory) = app_with(commands.clone());

        assert_eq!(app.dispatch("frobnicate"), Outcome::Continue);

        assert_eq!(store.snapshot().mixed_port, 7890);
        assert!(commands.calls().is_empty());
    }
}
