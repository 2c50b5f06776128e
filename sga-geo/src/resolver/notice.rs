//! One-time notice that a fallback source is in use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::coord::Coordinate;

/// Short notice text shown to users.
pub const FALLBACK_NOTICE_TITLE: &str = "Usando servidor de mapas alternativo.";

/// Secondary notice line.
pub const FALLBACK_NOTICE_DESCRIPTION: &str = "Endereços sendo carregados normalmente.";

/// Details of the request that triggered the notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackNotice {
    /// Coordinate of the triggering request.
    pub coordinate: String,
    /// Provider that answered, `None` if every provider failed.
    pub provider: Option<String>,
}

impl FallbackNotice {
    pub fn title(&self) -> &'static str {
        FALLBACK_NOTICE_TITLE
    }

    pub fn description(&self) -> &'static str {
        FALLBACK_NOTICE_DESCRIPTION
    }

    /// True if the request degraded to the coordinate label.
    pub fn degraded(&self) -> bool {
        self.provider.is_none()
    }
}

/// Receives the fallback notice, e.g. to show a toast.
pub trait FallbackNotifier: Send + Sync {
    fn notify(&self, notice: &FallbackNotice);
}

/// Notifier that writes the notice to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl FallbackNotifier for LogNotifier {
    fn notify(&self, notice: &FallbackNotice) {
        info!(
            coordinate = %notice.coordinate,
            provider = notice.provider.as_deref().unwrap_or("none"),
            "{} {}",
            notice.title(),
            notice.description()
        );
    }
}

/// Fires the notifier at most once per resolver.
pub(crate) struct NoticeGate {
    fired: AtomicBool,
    notifier: Option<Arc<dyn FallbackNotifier>>,
}

impl NoticeGate {
    pub(crate) fn new(notifier: Option<Arc<dyn FallbackNotifier>>) -> Self {
        Self {
            fired: AtomicBool::new(false),
            notifier,
        }
    }

    /// Emits the notice unless it was already emitted. Returns whether this
    /// call emitted it.
    pub(crate) fn trigger(&self, coordinate: Coordinate, provider: Option<&str>) -> bool {
        let Some(notifier) = &self.notifier else {
            return false;
        };
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        notifier.notify(&FallbackNotice {
            coordinate: coordinate.to_string(),
            provider: provider.map(str::to_string),
        });
        true
    }
}
