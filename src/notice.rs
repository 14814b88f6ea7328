use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};

use crate::guard::GuardError;

const MAX_NOTICES: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl NoticeLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Transient, dismissable notifications. A failed guard cycle lands here as
/// exactly one error notice; nothing in the queue affects sibling controls.
#[derive(Clone)]
pub struct NoticeQueue {
    inner: Arc<Mutex<VecDeque<Notice>>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn push(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        let Ok(mut notices) = self.inner.lock() else {
            log::warn!("[notice] queue lock poisoned, dropping: {message}");
            return;
        };
        notices.push_back(Notice {
            level,
            message,
            at: Utc::now(),
        });
        if notices.len() > MAX_NOTICES {
            notices.pop_front();
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        match self.inner.lock() {
            Ok(notices) => notices.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn dismiss(&self, index: usize) -> bool {
        match self.inner.lock() {
            Ok(mut notices) => notices.remove(index).is_some(),
            Err(_) => false,
        }
    }

    pub fn dismiss_all(&self) {
        if let Ok(mut notices) = self.inner.lock() {
            notices.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|notices| notices.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The catch sink wired into every guard on a panel.
    pub fn guard_sink(&self) -> impl Fn(GuardError) + 'static {
        let queue = self.clone();
        move |error| {
            log::warn!("[notice] {error}");
            queue.error(error.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_arrive_in_order_and_dismiss_by_index() {
        let queue = NoticeQueue::new();
        queue.info("first");
        queue.error("second");

        let notices = queue.snapshot();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, "first");
        assert_eq!(notices[1].level, NoticeLevel::Error);

        assert!(queue.dismiss(0));
        assert_eq!(queue.snapshot()[0].message, "second");
        assert!(!queue.dismiss(5));
    }

    #[test]
    fn queue_drops_oldest_beyond_capacity() {
        let queue = NoticeQueue::new();
        for index in 0..MAX_NOTICES + 3 {
            queue.info(format!("notice {index}"));
        }
        let notices = queue.snapshot();
        assert_eq!(notices.len(), MAX_NOTICES);
        assert_eq!(notices[0].message, "notice 3");
    }

    #[test]
    fn guard_sink_records_one_error_notice() {
        let queue = NoticeQueue::new();
        let sink = queue.guard_sink();
        sink(GuardError::Declined("permission denied".into()));

        let notices = queue.snapshot();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("permission denied"));
    }
}
