mod app;
mod commands;
mod guard;
mod install_check;
mod notice;
mod panel;
mod settings;
mod single_instance;
mod system;

use std::io;

use crate::{
    app::App,
    settings::{SETTINGS_FILE, SettingsStore, settings_directory},
};

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("proxydesk_ui=info"),
    )
    .init();

    log::info!(
        "proxydesk-ui v{} starting (RUST_LOG={})",
        env!("CARGO_PKG_VERSION"),
        std::env::var("RUST_LOG").unwrap_or_else(|_| "<default: info>".into()),
    );

    let directory = settings_directory();
    let Some(_instance) = single_instance::acquire(&directory) else {
        log::error!("[startup] another instance is already running");
        std::process::exit(1);
    };

    if !install_check::installed_in_applications() {
        println!("ProxyDesk runs from outside the Applications folder.");
        println!("Move the bundle to /Applications and start it again, or type 'quit' to exit.");
        install_check::run_gate(&mut io::stdin().lock());
        return;
    }

    let settings_path = directory.join(SETTINGS_FILE);
    log::info!("[startup] settings path: {}", settings_path.display());

    let store = SettingsStore::load(settings_path.clone());
    let commands = system::native_commands(settings_path);
    let strategy = system::privilege_strategy();
    log::info!("[startup] privilege strategy: {strategy:?}");

    App::new(store, commands, strategy).run(&mut io::stdin().lock());
}
