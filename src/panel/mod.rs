use std::sync::Arc;

use futures::future;

use crate::{
    commands::NativeCommands,
    guard::{SettingGuard, StepFuture},
    notice::NoticeQueue,
    settings::{SettingsPatch, SettingsStore},
};

pub mod engine;
pub mod runtime;
pub mod system;

/// The standard wiring for a setting without a native precondition: the
/// guard step persists the patch, the commit step updates the shared
/// snapshot. This is the contract every plain control on every panel uses.
pub(crate) fn patch_guard<Raw, T: Clone + 'static>(
    label: &'static str,
    store: &SettingsStore,
    commands: &Arc<dyn NativeCommands>,
    notices: &NoticeQueue,
    format: impl Fn(Raw, &T) -> Result<T, String> + 'static,
    make_patch: fn(T) -> SettingsPatch,
) -> SettingGuard<Raw, T> {
    let persist = {
        let commands = commands.clone();
        move |value: T| -> StepFuture { commands.persist_config_patch(make_patch(value)) }
    };
    let change = {
        let store = store.clone();
        move |value: T| -> StepFuture {
            Box::pin(future::ready(store.apply_patch(&make_patch(value))))
        }
    };
    SettingGuard::with_format(label, format, change, notices.guard_sink()).guarded(persist)
}

pub(crate) fn patch_toggle_guard(
    label: &'static str,
    store: &SettingsStore,
    commands: &Arc<dyn NativeCommands>,
    notices: &NoticeQueue,
    make_patch: fn(bool) -> SettingsPatch,
) -> SettingGuard<bool, bool> {
    patch_guard(
        label,
        store,
        commands,
        notices,
        |raw, _current| Ok(raw),
        make_patch,
    )
}
