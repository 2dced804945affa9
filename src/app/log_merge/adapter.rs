//! Lazy, peekable reader over one log stream.
//!
//! An [`EventStreamAdapter`] turns `GetLogEvents` pagination into a
//! forward-only sequence with one-element lookahead:
//!
//! - [`EventStreamAdapter::peek`] shows the next event without consuming it,
//!   fetching pages only when the local buffer is empty
//! - [`EventStreamAdapter::advance`] consumes and returns that event
//!
//! The exclusive end bound of the [`TimeWindow`] is applied locally. The first
//! event at or past it ends the sequence; that event and any later pages are
//! discarded.
//!
//! In follow mode a caught-up adapter reports [`Peek::Pending`] and polls
//! again on its own once its poll interval has passed, independently of the
//! other streams in the merge.

#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::app::data_plane::cloudwatch_logs::{GetEventsRequest, LogEvent, LogStream, LogsApi};
use crate::app::time_window::TimeWindow;

/// How long a caught-up follow reader waits before polling again.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What sits at the head of an adapter.
#[derive(Debug, PartialEq, Eq)]
pub enum Peek<'a> {
    /// The next event, still unconsumed
    Event(&'a LogEvent),
    /// Caught up with the stream; more may arrive later (follow mode only)
    Pending,
    /// No more events, ever
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// The next page should be fetched when the buffer runs dry
    Fetching,
    /// Caught up in follow mode; polls again once the poll interval has
    /// passed or on [`EventStreamAdapter::rearm`]
    CaughtUp,
    Exhausted,
}

pub struct EventStreamAdapter {
    api: Arc<dyn LogsApi>,
    stream: Arc<LogStream>,
    window: TimeWindow,
    follow: bool,
    poll_interval: Duration,
    caught_up_at: Option<Instant>,
    page_limit: Option<i32>,
    buffer: VecDeque<LogEvent>,
    next_token: Option<String>,
    state: ReaderState,
    pages_fetched: usize,
}

impl EventStreamAdapter {
    pub fn new(api: Arc<dyn LogsApi>, stream: LogStream, window: TimeWindow) -> Self {
        Self {
            api,
            stream: Arc::new(stream),
            window,
            follow: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            caught_up_at: None,
            page_limit: None,
            buffer: VecDeque::new(),
            next_token: None,
            state: ReaderState::Fetching,
            pages_fetched: 0,
        }
    }

    /// Keep the forward token when caught up instead of finishing.
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Minimum wait between polls of a caught-up follow reader.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Maximum events per `GetLogEvents` page.
    pub fn with_page_limit(mut self, page_limit: Option<i32>) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn stream(&self) -> &Arc<LogStream> {
        &self.stream
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ReaderState::Exhausted && self.buffer.is_empty()
    }

    /// Look at the next event without consuming it.
    ///
    /// Repeated calls without an intervening [`advance`](Self::advance) return
    /// the same event and never fetch more than once. A caught-up reader
    /// whose poll interval has passed fetches one page before answering.
    pub async fn peek(&mut self) -> Result<Peek<'_>> {
        let mut fetched = false;
        while self.buffer.is_empty() {
            match self.state {
                ReaderState::Exhausted => return Ok(Peek::Exhausted),
                // At most one poll per call, even with a zero interval
                ReaderState::CaughtUp if !fetched && self.poll_due() => self.rearm(),
                ReaderState::CaughtUp => return Ok(Peek::Pending),
                ReaderState::Fetching => {
                    self.fetch_page().await?;
                    fetched = true;
                }
            }
        }

        Ok(self
            .buffer
            .front()
            .map(Peek::Event)
            .unwrap_or(Peek::Exhausted))
    }

    /// Consume and return the next event. `None` when pending or exhausted.
    pub async fn advance(&mut self) -> Result<Option<LogEvent>> {
        if self.buffer.is_empty() {
            self.peek().await?;
        }
        Ok(self.buffer.pop_front())
    }

    /// Allow a caught-up follow reader to poll again from its last token.
    pub fn rearm(&mut self) {
        if self.state == ReaderState::CaughtUp {
            trace_trace!("Re-arming {}", self.stream.display_name());
            self.state = ReaderState::Fetching;
            self.caught_up_at = None;
        }
    }

    fn poll_due(&self) -> bool {
        self.caught_up_at
            .is_some_and(|at| at.elapsed() >= self.poll_interval)
    }

    fn request(&self) -> GetEventsRequest {
        GetEventsRequest::new(&self.stream.group_name, &self.stream.name)
            .with_start_time(self.window.wire_start())
            .with_end_time(self.window.wire_end())
            .with_limit(self.page_limit)
            .with_next_token(self.next_token.clone())
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let request = self.request();
        let page = self
            .api
            .get_log_events(&request)
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch page {} of {}",
                    self.pages_fetched + 1,
                    self.stream.display_name()
                )
            })?;
        self.pages_fetched += 1;

        let received = page.events.len();
        for event in page.events {
            if self.window.is_past_end(event.timestamp) {
                trace_debug!(
                    "{} reached end of window at {}",
                    self.stream.display_name(),
                    event.timestamp
                );
                self.state = ReaderState::Exhausted;
                return Ok(());
            }
            self.buffer.push_back(event);
        }

        let token_moved =
            page.next_forward_token.is_some() && page.next_forward_token != request.next_token;
        if let Some(token) = page.next_forward_token {
            self.next_token = Some(token);
        }

        trace_trace!(
            "{} page {}: {} events, token moved: {}",
            self.stream.display_name(),
            self.pages_fetched,
            received,
            token_moved
        );

        if received == 0 && !token_moved {
            if self.follow {
                self.state = ReaderState::CaughtUp;
                self.caught_up_at = Some(Instant::now());
            } else {
                self.state = ReaderState::Exhausted;
            }
            trace_debug!(
                "{} {} after {} pages",
                self.stream.display_name(),
                if self.follow { "caught up" } else { "exhausted" },
                self.pages_fetched
            );
        }

        Ok(())
    }
}

impl std::fmt::Debug for EventStreamAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamAdapter")
            .field("stream", &self.stream.display_name())
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("pages_fetched", &self.pages_fetched)
            .finish()
    }
}
