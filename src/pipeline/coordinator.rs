//! Bounded-parallel fetch of every station page.

use crate::pipeline::progress::{EventSink, FetchEvent};
use crate::pipeline::retry::{fetch_with_retry, RetryPolicy};
use crate::scraper::{Outcome, SkipReason, StationSource};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

pub struct Coordinator {
    source: Arc<dyn StationSource>,
    policy: RetryPolicy,
    concurrency: usize,
    deadline: Option<Duration>,
    events: EventSink,
}

impl Coordinator {
    pub fn new(source: Arc<dyn StationSource>, policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            source,
            policy,
            concurrency: concurrency.max(1),
            deadline: None,
            events: EventSink::none(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Fetch every distinct id. Each one appears exactly once in the result,
    /// with an empty string when the station was skipped.
    pub async fn fetch_all(&self, station_ids: &[String]) -> HashMap<String, String> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = station_ids.iter().filter(|id| seen.insert(*id)).collect();
        let total = unique.len();

        info!(
            "Fetching {} stations ({} in flight)",
            total, self.concurrency
        );

        let sem = Arc::new(Semaphore::new(self.concurrency));
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let mut set = JoinSet::new();
        let mut pending = HashMap::new();

        for station_id in unique {
            let id = station_id.clone();
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&sem);
            let policy = self.policy;
            let events = self.events.clone();

            let handle = set.spawn(async move {
                let unit = async {
                    let Ok(_permit) = sem.acquire().await else {
                        return Outcome::Skip(SkipReason::Aborted);
                    };
                    fetch_with_retry(source.as_ref(), &id, &policy, &events).await
                };

                let outcome = match deadline {
                    Some(at) => timeout_at(at, unit)
                        .await
                        .unwrap_or(Outcome::Skip(SkipReason::DeadlineExceeded)),
                    None => unit.await,
                };

                (id, outcome)
            });

            pending.insert(handle.id(), station_id.clone());
        }

        let mut contents = HashMap::with_capacity(total);

        while let Some(joined) = set.join_next_with_id().await {
            let (station_id, outcome) = match joined {
                Ok((task_id, (station_id, outcome))) => {
                    pending.remove(&task_id);
                    (station_id, outcome)
                }
                Err(e) => {
                    let Some(station_id) = pending.remove(&e.id()) else {
                        error!("Fetch task for unknown station failed: {}", e);
                        continue;
                    };
                    error!("Fetch task panic for {}: {}", station_id, e);
                    (station_id, Outcome::Skip(SkipReason::Aborted))
                }
            };

            if let Outcome::Skip(reason) = &outcome {
                warn!("{}: no data this run ({})", station_id, reason);
                self.events.emit(FetchEvent::Skipped {
                    station_id: station_id.clone(),
                    reason: reason.clone(),
                });
            }

            contents.insert(station_id.clone(), outcome.into_content());
            self.events.emit(FetchEvent::Completed {
                station_id,
                done: contents.len(),
                total,
            });
        }

        contents
    }
}
