//! Structured reporting of a fit.
//!
//! The fitting engine never prints: it emits [`FitEvent`]s to an injected
//! [`DiagnosticsSink`]. Timings come from [`TimedScope`] guards created by a
//! [`Printer`], which report when dropped.

use std::cell::Cell;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[cfg(test)]
mod tests;

/// Events emitted during a fit.
#[derive(Debug, Clone, PartialEq)]
pub enum FitEvent {
    /// State of the Newton iterations of one output column. Iteration `0` is
    /// reported before the first Newton step.
    NonlinearIteration {
        iteration: usize,
        column: usize,
        gradient_norm: f64,
        objective: f64,
    },

    /// A timed scope has completed. `depth` is its nesting level, starting
    /// at `1`.
    Timing {
        label: String,
        depth: usize,
        elapsed: Duration,
    },

    /// Arbitrary informational message.
    Message { message: String },
}

/// Sink that consumes fit events.
pub trait DiagnosticsSink: Send + Sync + Debug {
    fn emit(&self, event: FitEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn emit(&self, event: FitEvent) {
        match event {
            FitEvent::NonlinearIteration {
                iteration,
                column,
                gradient_norm,
                objective,
            } => log::info!(
                "nonlinear iteration {:>3} (column {}): gradient norm {:.3e}, objective {:.6e}",
                iteration,
                column,
                gradient_norm,
                objective
            ),
            FitEvent::Timing {
                label,
                depth,
                elapsed,
            } => log::debug!(
                "{:indent$}{} ({:.3} s)",
                "",
                label,
                elapsed.as_secs_f64(),
                indent = 2 * depth.saturating_sub(1)
            ),
            FitEvent::Message { message } => log::info!("{}", message),
        }
    }
}

/// Stores every event, for inspection after the fit.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FitEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    /// A copy of the events received so far.
    pub fn events(&self) -> Vec<FitEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The `(iteration, column, gradient_norm, objective)` tuples of the
    /// nonlinear iteration events.
    pub fn iterations(&self) -> Vec<(usize, usize, f64, f64)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                FitEvent::NonlinearIteration {
                    iteration,
                    column,
                    gradient_norm,
                    objective,
                } => Some((iteration, column, gradient_norm, objective)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(&self, event: FitEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Front-end of a sink for one fit: tracks the nesting of timed scopes and
/// drops timings and messages nested deeper than `max_print_depth`.
#[derive(Debug)]
pub struct Printer {
    sink: Arc<dyn DiagnosticsSink>,
    max_print_depth: usize,
    depth: Cell<usize>,
}

impl Printer {
    pub fn new(sink: Arc<dyn DiagnosticsSink>, max_print_depth: usize) -> Self {
        Printer {
            sink,
            max_print_depth,
            depth: Cell::new(0),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Opens a nested timed scope, reported when the guard is dropped.
    pub fn timed(&self, label: impl Into<String>) -> TimedScope<'_> {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        TimedScope {
            printer: self,
            label: label.into(),
            depth,
            start: Instant::now(),
        }
    }

    /// Emits a message attached to the current scope.
    pub fn message(&self, message: impl Into<String>) {
        if self.depth.get() < self.max_print_depth {
            self.sink.emit(FitEvent::Message {
                message: message.into(),
            });
        }
    }

    /// Emits the state of a Newton iteration. Iterations are always reported.
    pub fn iteration(&self, iteration: usize, column: usize, gradient_norm: f64, objective: f64) {
        self.sink.emit(FitEvent::NonlinearIteration {
            iteration,
            column,
            gradient_norm,
            objective,
        });
    }
}

/// Guard of a timed scope.
#[derive(Debug)]
pub struct TimedScope<'a> {
    printer: &'a Printer,
    label: String,
    depth: usize,
    start: Instant,
}

impl TimedScope<'_> {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimedScope<'_> {
    fn drop(&mut self) {
        self.printer.depth.set(self.depth - 1);
        if self.depth <= self.printer.max_print_depth {
            self.printer.sink.emit(FitEvent::Timing {
                label: std::mem::take(&mut self.label),
                depth: self.depth,
                elapsed: self.start.elapsed(),
            });
        }
    }
}
