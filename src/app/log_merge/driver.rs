//! Run orchestration: discovery, adapter construction, and the pull loop.
//!
//! ```text
//! Idle -> Discovering -> Streaming -> Completed
//!                            |    \-> Cancelled
//!                            \------> Failed
//! ```
//!
//! In follow mode each caught-up stream polls again on its own schedule while
//! the others keep streaming. Only when every stream is caught up does the
//! driver sleep out the poll interval.
//!
//! Cancellation is cooperative. The token is checked between merge steps and
//! while waiting out a follow-mode poll interval, never in the middle of a page
//! fetch, so a cancelled run never leaves half an event on the sink.

#![warn(clippy::all, rust_2018_idioms)]

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::app::data_plane::cloudwatch_logs::LogsApi;
use crate::app::time_window::TimeWindow;

use super::adapter::{EventStreamAdapter, DEFAULT_POLL_INTERVAL};
use super::discovery::{SourceDiscovery, StreamSelector};
use super::merge::{MergeCoordinator, MergeStep};
use super::output::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Discovering,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { events: u64, streams: usize },
    Cancelled { events: u64, streams: usize },
}

impl RunOutcome {
    pub fn events(&self) -> u64 {
        match self {
            RunOutcome::Completed { events, .. } | RunOutcome::Cancelled { events, .. } => *events,
        }
    }
}

/// Everything a run needs besides the API client.
#[derive(Debug, Clone)]
pub struct TailRequest {
    pub selector: StreamSelector,
    pub window: TimeWindow,
    /// Keep polling caught-up streams instead of finishing
    pub follow: bool,
    pub poll_interval: Duration,
    pub page_limit: Option<i32>,
}

impl TailRequest {
    pub fn new(selector: StreamSelector, window: TimeWindow) -> Self {
        Self {
            selector,
            window,
            follow: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            page_limit: None,
        }
    }

    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_page_limit(mut self, page_limit: Option<i32>) -> Self {
        self.page_limit = page_limit;
        self
    }
}

pub struct Driver {
    api: Arc<dyn LogsApi>,
    request: TailRequest,
    cancel: CancellationToken,
    state: DriverState,
}

impl Driver {
    pub fn new(api: Arc<dyn LogsApi>, request: TailRequest, cancel: CancellationToken) -> Self {
        Self {
            api,
            request,
            cancel,
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    fn transition(&mut self, next: DriverState) {
        trace_debug!("Driver state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Discover, merge and forward events to `sink` until the merged
    /// sequence ends, the token is cancelled, or something fails.
    pub async fn run<S: EventSink>(&mut self, sink: &mut S) -> Result<RunOutcome> {
        match self.run_inner(sink).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                trace_error!("Run failed: {:#}", e);
                self.transition(DriverState::Failed);
                Err(e)
            }
        }
    }

    async fn run_inner<S: EventSink>(&mut self, sink: &mut S) -> Result<RunOutcome> {
        self.transition(DriverState::Discovering);
        let discovery = SourceDiscovery::new(self.api.clone());
        let streams = discovery.discover(&self.request.selector).await?;

        if streams.is_empty() {
            trace_warn!(
                "No log streams matched groups /{}/ and streams /{}/",
                self.request.selector.group_pattern,
                self.request.selector.stream_pattern
            );
        }

        let adapters: Vec<EventStreamAdapter> = streams
            .into_iter()
            .map(|stream| {
                EventStreamAdapter::new(self.api.clone(), stream, self.request.window)
                    .with_follow(self.request.follow)
                    .with_poll_interval(self.request.poll_interval)
                    .with_page_limit(self.request.page_limit)
            })
            .collect();
        let mut merge = MergeCoordinator::new(adapters);
        let streams = merge.registered_streams();

        self.transition(DriverState::Streaming);

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.finish_cancelled(&merge));
            }

            match merge.next_step().await? {
                MergeStep::Event(event) => sink.emit(&event)?,
                MergeStep::Finished => {
                    self.transition(DriverState::Completed);
                    trace_info!(
                        "Merged {} events from {} streams",
                        merge.emitted(),
                        streams
                    );
                    return Ok(RunOutcome::Completed {
                        events: merge.emitted(),
                        streams,
                    });
                }
                MergeStep::Idle => {
                    trace_trace!(
                        "All {} streams caught up, sleeping {:?}",
                        merge.active_streams(),
                        self.request.poll_interval
                    );
                    let cancel = self.cancel.clone();
                    let cancelled = tokio::select! {
                        _ = cancel.cancelled() => true,
                        _ = tokio::time::sleep(self.request.poll_interval) => false,
                    };
                    if cancelled {
                        return Ok(self.finish_cancelled(&merge));
                    }
                    merge.rearm_idle();
                }
            }
        }
    }

    fn finish_cancelled(&mut self, merge: &MergeCoordinator) -> RunOutcome {
        self.transition(DriverState::Cancelled);
        trace_info!("Cancelled after {} events", merge.emitted());
        RunOutcome::Cancelled {
            events: merge.emitted(),
            streams: merge.registered_streams(),
        }
    }
}
