//! Acceleration sources and sensor subscriptions
//!
//! A [`SensorSubscription`] ties an [`AccelerationSource`] to a session for as
//! long as it is alive. Detaching, explicitly or on drop, persists the running
//! count the way a host would when the app leaves the foreground.

use std::io::BufRead;

use crate::error::TallyError;
use crate::session::StepSession;
use crate::types::{AccelerationSample, StepEvent};

/// Anything that produces accelerometer readings
pub trait AccelerationSource {
    /// Next reading, or `None` once the stream has ended
    fn next_sample(&mut self) -> Option<Result<AccelerationSample, TallyError>>;
}

impl<S: AccelerationSource + ?Sized> AccelerationSource for Box<S> {
    fn next_sample(&mut self) -> Option<Result<AccelerationSample, TallyError>> {
        (**self).next_sample()
    }
}

impl AccelerationSource for std::vec::IntoIter<AccelerationSample> {
    fn next_sample(&mut self) -> Option<Result<AccelerationSample, TallyError>> {
        self.next().map(Ok)
    }
}

/// Line format of a recorded sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// One JSON object per line: `{"x":..,"y":..,"z":..,"timestamp_ms":..}`
    Ndjson,
    /// `timestamp_ms,x,y,z` per line
    Csv,
}

/// Replays a recorded stream line by line.
///
/// Blank lines and lines starting with `#` are skipped. A CSV header line whose
/// first field is `timestamp_ms` is skipped too.
pub struct ReplaySource<R> {
    reader: R,
    format: SampleFormat,
    line_number: usize,
    buffer: String,
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R, format: SampleFormat) -> Self {
        Self {
            reader,
            format,
            line_number: 0,
            buffer: String::new(),
        }
    }

    fn parse_line(&self, line: &str) -> Result<AccelerationSample, TallyError> {
        let invalid = |reason: String| TallyError::InvalidSample {
            line: self.line_number,
            reason,
        };

        match self.format {
            SampleFormat::Ndjson => {
                serde_json::from_str(line).map_err(|e| invalid(e.to_string()))
            }
            SampleFormat::Csv => {
                let fields: Vec<&str> = line.split(',').map(str::trim).collect();
                let [ts, x, y, z] = fields.as_slice() else {
                    return Err(invalid(format!(
                        "expected 4 fields (timestamp_ms,x,y,z), got {}",
                        fields.len()
                    )));
                };
                let axis = |name: &str, value: &str| {
                    value
                        .parse::<f32>()
                        .map_err(|e| invalid(format!("{}: {}", name, e)))
                };
                Ok(AccelerationSample::new(
                    axis("x", *x)?,
                    axis("y", *y)?,
                    axis("z", *z)?,
                    ts.parse::<i64>()
                        .map_err(|e| invalid(format!("timestamp_ms: {}", e)))?,
                ))
            }
        }
    }
}

impl<R: BufRead> AccelerationSource for ReplaySource<R> {
    fn next_sample(&mut self) -> Option<Result<AccelerationSample, TallyError>> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_number += 1;

            let line = self.buffer.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.format == SampleFormat::Csv && line.starts_with("timestamp_ms") {
                continue;
            }

            return Some(self.parse_line(line));
        }
    }
}

/// Live attachment of a source to a session
pub struct SensorSubscription<'a, S: AccelerationSource> {
    session: &'a mut StepSession,
    source: S,
    attached: bool,
}

impl<'a, S: AccelerationSource> SensorSubscription<'a, S> {
    pub(crate) fn new(session: &'a mut StepSession, source: S) -> Self {
        log::debug!("Accelerometer subscription attached");
        Self {
            session,
            source,
            attached: true,
        }
    }

    /// Feed every available sample to the session and return accepted steps.
    ///
    /// Stops at the first malformed sample; steps accepted before it stay counted.
    pub fn pump(&mut self) -> Result<Vec<StepEvent>, TallyError> {
        let mut events = Vec::new();
        while let Some(sample) = self.source.next_sample() {
            if let Some(event) = self.session.on_sample(&sample?) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Feed at most one sample; `Ok(None)` means the stream has ended
    pub fn pump_one(&mut self) -> Result<Option<Option<StepEvent>>, TallyError> {
        match self.source.next_sample() {
            Some(sample) => Ok(Some(self.session.on_sample(&sample?))),
            None => Ok(None),
        }
    }

    /// Session the subscription is feeding
    pub fn session(&self) -> &StepSession {
        &*self.session
    }

    /// Detach and persist the running count
    pub fn detach(mut self) -> Result<u32, TallyError> {
        self.attached = false;
        self.session.persist()?;
        log::debug!("Accelerometer subscription detached");
        Ok(self.session.running_count())
    }
}

impl<S: AccelerationSource> Drop for SensorSubscription<'_, S> {
    fn drop(&mut self) {
        if !self.attached {
            return;
        }
        if let Err(err) = self.session.persist() {
            log::warn!("Failed to persist running count on detach: {err}");
        }
    }
}
