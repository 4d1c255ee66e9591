//! EventSink port - where progress events go.
//!
//! # 実装
//! - NoopEventSink: 何もしない
//! - RecordingEventSink: 発行順のトレースを保持（テスト用）
//! - 標準出力向けの sink は `reaper-cli` 側にある

use std::sync::{Arc, Mutex};

use crate::domain::ReapEvent;

/// Receives batch progress events.
///
/// Called from executor workers concurrently, so implementations must be
/// `Send + Sync` and must not block for long.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ReapEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &ReapEvent) {}
}

/// Keeps every event in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<ReapEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReapEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &ReapEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}
