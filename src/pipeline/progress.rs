use crate::scraper::SkipReason;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Per-station notifications from the fetch stage.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Retrying {
        station_id: String,
        attempt: u32,
        wait: Duration,
        error: String,
    },
    Skipped {
        station_id: String,
        reason: SkipReason,
    },
    Completed {
        station_id: String,
        done: usize,
        total: usize,
    },
}

/// Optional event sender. Nobody listening is fine.
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<UnboundedSender<FetchEvent>>);

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<FetchEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self(Some(tx)), rx)
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn emit(&self, event: FetchEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
