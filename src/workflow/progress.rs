//! Progress events emitted while a query runs.

use std::sync::Mutex;

/// One step of a workflow invocation, in the order it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// The run is being submitted; the caller is about to block.
    Submitting,
    /// The run finished successfully.
    Submitted { run_page_url: Option<String> },
    /// Looking up where the run wrote its output.
    Resolving,
    /// Opening or reusing the SQL connection to read the output table.
    Connecting { table_name: String },
    /// The output table was read.
    Done { row_count: usize },
    /// A stage failed; `message` is what the user sees.
    Failed { message: String },
}

/// Receives workflow events as they happen.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &WorkflowEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: &WorkflowEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events and clears the log.
    pub fn take(&self) -> Vec<WorkflowEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &WorkflowEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_take_clears() {
        let reporter = RecordingReporter::new();
        reporter.report(&WorkflowEvent::Submitting);
        reporter.report(&WorkflowEvent::Resolving);

        assert_eq!(
            reporter.take(),
            vec![WorkflowEvent::Submitting, WorkflowEvent::Resolving]
        );
        assert!(reporter.take().is_empty());
    }
}
