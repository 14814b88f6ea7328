use std::fmt;

use futures::future::LocalBoxFuture;

/// A guard or commit step: resolves once the side effect finished or failed.
pub type StepFuture = LocalBoxFuture<'static, Result<(), String>>;

pub enum GuardError {
    Format(String),
    Declined(String),
    Commit(String),
}

impl GuardError {
    pub fn message(&self) -> &str {
        match self {
            Self::Format(message) | Self::Declined(message) | Self::Commit(message) => message,
        }
    }
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(message) => write!(f, "invalid value: {message}"),
            Self::Declined(message) => write!(f, "change declined: {message}"),
            Self::Commit(message) => write!(f, "failed to apply: {message}"),
        }
    }
}

/// Mediates between a control's raw change events and the confirmed value.
///
/// A change request runs format → guard → change. The guard step always
/// resolves to completion before the change step; the change step never runs
/// for a declined or failed guard, so the host's confirmed value stays
/// untouched on any failure. Every failure reaches the catch sink exactly
/// once and nothing escapes past it.
///
/// The guard keeps no state across cycles and takes no in-flight lock:
/// overlapping cycles on the same control are last-write-wins (the cycle
/// that resolves last determines the confirmed value).
pub struct SettingGuard<Raw, T> {
    label: &'static str,
    format: Box<dyn Fn(Raw, &T) -> Result<T, String>>,
    guard: Option<Box<dyn Fn(T) -> StepFuture>>,
    change: Box<dyn Fn(T) -> StepFuture>,
    catch: Box<dyn Fn(GuardError)>,
}

impl<T: Clone + 'static> SettingGuard<T, T> {
    /// Guard with the identity format: the raw event already is the value.
    pub fn new(
        label: &'static str,
        change: impl Fn(T) -> StepFuture + 'static,
        catch: impl Fn(GuardError) + 'static,
    ) -> Self {
        Self::with_format(label, |raw, _current| Ok(raw), change, catch)
    }
}

impl<Raw, T: Clone + 'static> SettingGuard<Raw, T> {
    pub fn with_format(
        label: &'static str,
        format: impl Fn(Raw, &T) -> Result<T, String> + 'static,
        change: impl Fn(T) -> StepFuture + 'static,
        catch: impl Fn(GuardError) + 'static,
    ) -> Self {
        Self {
            label,
            format: Box::new(format),
            guard: None,
            change: Box::new(change),
            catch: Box::new(catch),
        }
    }

    pub fn guarded(mut self, guard: impl Fn(T) -> StepFuture + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Runs one guard cycle. Returns the confirmed candidate on success;
    /// on failure the error has already been routed to the catch sink.
    pub async fn request_change(&self, raw: Raw, current: &T) -> Option<T> {
        let candidate = match (self.format)(raw, current) {
            Ok(candidate) => candidate,
            Err(message) => {
                log::debug!("[guard] {}: format rejected: {message}", self.label);
                (self.catch)(GuardError::Format(message));
                return None;
            }
        };

        if let Some(guard) = &self.guard
            && let Err(message) = guard(candidate.clone()).await
        {
            log::debug!("[guard] {}: declined: {message}", self.label);
            (self.catch)(GuardError::Declined(message));
            return None;
        }

        if let Err(message) = (self.change)(candidate.clone()).await {
            log::debug!("[guard] {}: commit failed: {message}", self.label);
            (self.catch)(GuardError::Commit(message));
            return None;
        }

        log::debug!("[guard] {}: change confirmed", self.label);
        Some(candidate)
    }
}
