//! Streaming k-way merge across log streams.
//!
//! Each step refreshes the head of every active cursor, drops cursors whose
//! adapter is exhausted, and emits the earliest head. Ties go to the cursor
//! registered first. A caught-up follow cursor is skipped until its adapter
//! polls again, so one busy stream never holds back the quiet ones for longer
//! than a poll interval. Selection is a linear scan: the number of streams in one
//! query is small and the scan keeps the tie-break trivially stable.
//!
//! Only the adapters buffer events (at most one page each); the coordinator
//! itself holds nothing between steps.

#![warn(clippy::all, rust_2018_idioms)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::app::data_plane::cloudwatch_logs::{LogEvent, LogStream};

use super::adapter::{EventStreamAdapter, Peek};

/// An event together with the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEvent {
    pub stream: Arc<LogStream>,
    pub event: LogEvent,
}

/// Result of one merge step.
#[derive(Debug, PartialEq, Eq)]
pub enum MergeStep {
    /// The globally earliest pending event
    Event(MergedEvent),
    /// Every remaining cursor is caught up; call
    /// [`MergeCoordinator::rearm_idle`] after waiting to poll again
    Idle,
    /// All cursors are exhausted
    Finished,
}

enum Head {
    Ready(DateTime<Utc>),
    Pending,
    Exhausted,
}

#[derive(Debug)]
struct StreamCursor {
    adapter: EventStreamAdapter,
    /// Registration index, kept for logging after earlier cursors are dropped
    registration: usize,
}

#[derive(Debug)]
pub struct MergeCoordinator {
    /// Active cursors in registration order
    cursors: Vec<StreamCursor>,
    registered: usize,
    emitted: u64,
}

impl MergeCoordinator {
    pub fn new(adapters: impl IntoIterator<Item = EventStreamAdapter>) -> Self {
        let cursors: Vec<StreamCursor> = adapters
            .into_iter()
            .enumerate()
            .map(|(registration, adapter)| StreamCursor {
                adapter,
                registration,
            })
            .collect();

        Self {
            registered: cursors.len(),
            cursors,
            emitted: 0,
        }
    }

    /// Cursors not yet exhausted
    pub fn active_streams(&self) -> usize {
        self.cursors.len()
    }

    /// Cursors handed to [`MergeCoordinator::new`]
    pub fn registered_streams(&self) -> usize {
        self.registered
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Run one selection round.
    pub async fn next_step(&mut self) -> Result<MergeStep> {
        let mut earliest: Option<(usize, DateTime<Utc>)> = None;
        let mut index = 0;

        while index < self.cursors.len() {
            let head = match self.cursors[index].adapter.peek().await? {
                Peek::Event(event) => Head::Ready(event.timestamp),
                Peek::Pending => Head::Pending,
                Peek::Exhausted => Head::Exhausted,
            };

            match head {
                Head::Ready(timestamp) => {
                    // Strict comparison keeps the earliest-registered cursor on ties
                    if earliest.map_or(true, |(_, best)| timestamp < best) {
                        earliest = Some((index, timestamp));
                    }
                    index += 1;
                }
                Head::Pending => index += 1,
                Head::Exhausted => {
                    let cursor = self.cursors.remove(index);
                    trace_debug!(
                        "Dropping exhausted stream #{} {} ({} active)",
                        cursor.registration,
                        cursor.adapter.stream().display_name(),
                        self.cursors.len()
                    );
                }
            }
        }

        let Some((index, _)) = earliest else {
            return Ok(if self.cursors.is_empty() {
                MergeStep::Finished
            } else {
                MergeStep::Idle
            });
        };

        let cursor = &mut self.cursors[index];
        match cursor.adapter.advance().await? {
            Some(event) => {
                self.emitted += 1;
                trace_trace!(
                    "Selected {} @ {}",
                    cursor.adapter.stream().display_name(),
                    event.timestamp
                );
                Ok(MergeStep::Event(MergedEvent {
                    stream: cursor.adapter.stream().clone(),
                    event,
                }))
            }
            None => anyhow::bail!(
                "stream {} lost its peeked event",
                cursor.adapter.stream().display_name()
            ),
        }
    }

    /// Let every caught-up cursor fetch again on the next step.
    pub fn rearm_idle(&mut self) {
        for cursor in &mut self.cursors {
            cursor.adapter.rearm();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::data_plane::cloudwatch_logs::LogsApi;
    use crate::app::log_merge::testing::FakeLogsApi;
    use crate::app::data_plane::cloudwatch_logs::{
        GetEventsRequest, LogEventPage, LogGroupPage, LogStreamPage,
    };
    use crate::app::time_window::TimeWindow;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;

    fn coordinator(api: &Arc<FakeLogsApi>, streams: &[&str], follow: bool) -> MergeCoordinator {
        let shared: Arc<dyn LogsApi> = api.clone();
        MergeCoordinator::new(streams.iter().map(|name| {
            EventStreamAdapter::new(
                shared.clone(),
                LogStream::new("g", *name, None),
                TimeWindow::unbounded(),
            )
            .with_follow(follow)
        }))
    }

    fn as_refs(events: &[(i64, String)]) -> Vec<(i64, &str)> {
        events.iter().map(|(t, m)| (*t, m.as_str())).collect()
    }

    async fn collect(merge: &mut MergeCoordinator) -> Vec<String> {
        let mut out = Vec::new();
        while let MergeStep::Event(merged) = merge.next_step().await.unwrap() {
            out.push(merged.event.message);
        }
        out
    }

    #[tokio::test]
    async fn test_two_stream_interleave() {
        let api = Arc::new(
            FakeLogsApi::new(10)
                .with_events("g", "A", &[(5, "a1"), (15, "a2")])
                .with_events("g", "B", &[(10, "b1")]),
        );
        let mut merge = coordinator(&api, &["A", "B"], false);

        assert_eq!(collect(&mut merge).await, vec!["a1", "b1", "a2"]);
        assert_eq!(merge.next_step().await.unwrap(), MergeStep::Finished);
        assert_eq!(merge.emitted(), 3);
    }

    #[tokio::test]
    async fn test_ties_follow_registration_order() {
        let api = Arc::new(
            FakeLogsApi::new(10)
                .with_events("g", "A", &[(1, "a1"), (2, "a2")])
                .with_events("g", "B", &[(1, "b1"), (2, "b2")])
                .with_events("g", "C", &[(1, "c1")]),
        );
        let mut merge = coordinator(&api, &["C", "A", "B"], false);

        assert_eq!(
            collect(&mut merge).await,
            vec!["c1", "a1", "b1", "a2", "b2"]
        );
    }

    #[tokio::test]
    async fn test_matches_sorted_union_across_pages() {
        let a: Vec<(i64, String)> = (0..25).map(|i| (i * 3, format!("a{}", i))).collect();
        let b: Vec<(i64, String)> = (0..17).map(|i| (i * 4 + 1, format!("b{}", i))).collect();
        let c: Vec<(i64, String)> = (0..9).map(|i| (i * 7 + 2, format!("c{}", i))).collect();

        let api = Arc::new(
            FakeLogsApi::new(4)
                .with_events("g", "A", &as_refs(&a))
                .with_events("g", "B", &as_refs(&b))
                .with_events("g", "C", &as_refs(&c)),
        );
        let mut merge = coordinator(&api, &["A", "B", "C"], false);

        let mut expected: Vec<(i64, usize, String)> = Vec::new();
        for (rank, source) in [&a, &b, &c].into_iter().enumerate() {
            expected.extend(source.iter().map(|(t, m)| (*t, rank, m.clone())));
        }
        expected.sort();
        let expected: Vec<String> = expected.into_iter().map(|(_, _, m)| m).collect();

        assert_eq!(collect(&mut merge).await, expected);
    }

    #[tokio::test]
    async fn test_exhausted_cursor_is_never_queried_again() {
        let api = Arc::new(
            FakeLogsApi::new(10)
                .with_events("g", "short", &[(1, "s1")])
                .with_events("g", "long", &[(2, "l1"), (3, "l2"), (4, "l3")]),
        );
        let mut merge = coordinator(&api, &["short", "long"], false);

        assert_eq!(collect(&mut merge).await, vec!["s1", "l1", "l2", "l3"]);
        assert_eq!(merge.active_streams(), 0);
        assert_eq!(merge.registered_streams(), 2);

        let short_calls = api.event_requests_for("short");
        assert_eq!(merge.next_step().await.unwrap(), MergeStep::Finished);
        assert_eq!(api.event_requests_for("short"), short_calls);
    }

    #[tokio::test]
    async fn test_no_streams_finishes_immediately() {
        let mut merge = MergeCoordinator::new(Vec::new());
        assert_eq!(merge.next_step().await.unwrap(), MergeStep::Finished);
    }

    #[tokio::test]
    async fn test_follow_mode_goes_idle_then_resumes() {
        let api = Arc::new(
            FakeLogsApi::new(10)
                .with_events("g", "A", &[(1, "a1")])
                .with_events("g", "B", &[(2, "b1")]),
        );
        let mut merge = coordinator(&api, &["A", "B"], true);

        assert_eq!(collect(&mut merge).await, vec!["a1", "b1"]);
        assert_eq!(merge.next_step().await.unwrap(), MergeStep::Idle);

        api.append_events("g", "B", &[(5, "b2")]);
        api.append_events("g", "A", &[(4, "a2")]);
        merge.rearm_idle();

        assert_eq!(collect(&mut merge).await, vec!["a2", "b2"]);
        assert_eq!(merge.active_streams(), 2);
    }

    /// Every fetch of stream `B` finds exactly one new event.
    struct BusyStream {
        inner: FakeLogsApi,
        next_timestamp: Mutex<i64>,
    }

    #[async_trait]
    impl LogsApi for BusyStream {
        async fn describe_log_groups(&self, next_token: Option<String>) -> Result<LogGroupPage> {
            self.inner.describe_log_groups(next_token).await
        }

        async fn describe_log_streams(
            &self,
            log_group_name: &str,
            next_token: Option<String>,
        ) -> Result<LogStreamPage> {
            self.inner.describe_log_streams(log_group_name, next_token).await
        }

        async fn get_log_events(&self, request: &GetEventsRequest) -> Result<LogEventPage> {
            if request.log_stream_name == "B" {
                let timestamp = {
                    let mut next = self.next_timestamp.lock().unwrap();
                    *next += 1;
                    *next
                };
                self.inner.append_events("g", "B", &[(timestamp, "b")]);
            }
            self.inner.get_log_events(request).await
        }
    }

    #[tokio::test]
    async fn test_busy_stream_does_not_starve_caught_up_stream() {
        let api = Arc::new(BusyStream {
            inner: FakeLogsApi::new(10).with_events("g", "A", &[(1, "a1")]),
            next_timestamp: Mutex::new(0),
        });
        let shared: Arc<dyn LogsApi> = api.clone();
        let mut merge = MergeCoordinator::new(["A", "B"].into_iter().map(|name| {
            EventStreamAdapter::new(shared.clone(), LogStream::new("g", name, None), TimeWindow::unbounded())
                .with_follow(true)
                .with_poll_interval(Duration::from_millis(10))
        }));

        let mut late_event_seen = false;
        let mut appended = false;
        for _ in 0..500 {
            match merge.next_step().await.unwrap() {
                MergeStep::Event(merged) => {
                    if merged.event.message == "a2" {
                        late_event_seen = true;
                        break;
                    }
                }
                MergeStep::Idle => panic!("stream B is never caught up"),
                MergeStep::Finished => panic!("follow merge never finishes"),
            }
            if !appended && api.inner.event_requests_for("A") >= 2 {
                // A has caught up; new data lands while B keeps streaming
                api.inner.append_events("g", "A", &[(15, "a2")]);
                appended = true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(appended);
        assert!(late_event_seen, "a2 was never merged while B stayed busy");
        assert!(api.inner.event_requests_for("A") > 2);
    }

    #[tokio::test]
    async fn test_adapter_error_fails_the_step() {
        let api = Arc::new(
            FakeLogsApi::new(10)
                .with_events("g", "ok", &[(1, "fine")])
                .with_failing_stream("g", "broken"),
        );
        let mut merge = coordinator(&api, &["ok", "broken"], false);

        assert!(merge.next_step().await.is_err());
    }
}
