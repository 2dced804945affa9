//! Output sinks for merged events.

#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

use super::merge::MergedEvent;

/// `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `ingestion_time: ..., timestamp: ..., msg: ...`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Receives merged events in output order.
pub trait EventSink {
    fn emit(&mut self, event: &MergedEvent) -> Result<()>;
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    log_group: &'a str,
    log_stream: &'a str,
    timestamp: String,
    ingestion_time: String,
    message: &'a str,
}

/// Writes one line per event.
pub struct LineSink<W: Write> {
    writer: W,
    format: OutputFormat,
    flush_each: bool,
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            flush_each: false,
        }
    }

    /// Flush after every line (follow mode, so lines show up as they arrive).
    pub fn with_flush_each(mut self, flush_each: bool) -> Self {
        self.flush_each = flush_each;
        self
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush output")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render(&self, merged: &MergedEvent) -> Result<String> {
        let event = &merged.event;
        match self.format {
            OutputFormat::Text => Ok(format!(
                "ingestion_time: {}, timestamp: {}, msg: {}",
                format_utc(event.ingestion_time),
                format_utc(event.timestamp),
                event.message.trim_end_matches(['\r', '\n'])
            )),
            OutputFormat::Json => {
                let record = JsonRecord {
                    log_group: &merged.stream.group_name,
                    log_stream: &merged.stream.name,
                    timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                    ingestion_time: event
                        .ingestion_time
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                    message: &event.message,
                };
                serde_json::to_string(&record).context("Failed to encode event as JSON")
            }
        }
    }
}

impl<W: Write> EventSink for LineSink<W> {
    fn emit(&mut self, event: &MergedEvent) -> Result<()> {
        let line = self.render(event)?;
        writeln!(self.writer, "{}", line).context("Failed to write event")?;
        if self.flush_each {
            self.flush()?;
        }
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &MergedEvent) -> Result<()> {
        (**self).emit(event)
    }
}

impl EventSink for Vec<MergedEvent> {
    fn emit(&mut self, event: &MergedEvent) -> Result<()> {
        self.push(event.clone());
        Ok(())
    }
}
