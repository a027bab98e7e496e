//! Background batch processing.
//!
//! A [`PipelineWorker`] owns one thread that runs a queue of files through a
//! shared [`SubtitlePipeline`] and reports back over a channel. The caller
//! only ever receives events; it never touches pipeline state directly.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cancel::CancellationToken;
use crate::error::PipelineError;
use crate::pipeline::runtime::SubtitlePipeline;
use crate::types::{PipelineInput, PipelineOutput};

type InputLoader = Box<dyn FnOnce() -> Result<PipelineInput, PipelineError> + Send>;

/// One queued file. Loading is deferred to the worker thread so decoding
/// large audio does not block the caller.
pub struct FileJob {
    pub name: String,
    load: InputLoader,
}

impl FileJob {
    pub fn ready(name: impl Into<String>, input: PipelineInput) -> Self {
        Self {
            name: name.into(),
            load: Box::new(move || Ok(input)),
        }
    }

    pub fn deferred<F>(name: impl Into<String>, load: F) -> Self
    where
        F: FnOnce() -> Result<PipelineInput, PipelineError> + Send + 'static,
    {
        Self {
            name: name.into(),
            load: Box::new(load),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Log(String),
    /// Overall progress across the whole queue, in `[0, 1]`.
    Progress(f32),
    /// A file finished. `output` is `None` when the file failed to load.
    Done {
        file: String,
        output: Option<PipelineOutput>,
        is_final: bool,
    },
    /// Cancellation was observed; no further files are processed.
    Stopped,
    Finished,
}

pub struct PipelineWorker {
    cancel: CancellationToken,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl PipelineWorker {
    pub fn spawn(
        pipeline: Arc<SubtitlePipeline>,
        jobs: Vec<FileJob>,
    ) -> Result<Self, PipelineError> {
        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::channel();
        let worker_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name("subtitle-pipeline".to_string())
            .spawn(move || run_queue(&pipeline, jobs, &worker_cancel, &tx))
            .map_err(|e| PipelineError::io("spawn pipeline worker", e))?;

        Ok(Self {
            cancel,
            events,
            handle: Some(handle),
        })
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Requests a stop. The current file is abandoned at the next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the worker thread to exit.
    pub fn join(mut self) -> Result<(), PipelineError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PipelineError::runtime("pipeline worker", "worker thread panicked")),
            None => Ok(()),
        }
    }
}

fn run_queue(
    pipeline: &SubtitlePipeline,
    jobs: Vec<FileJob>,
    cancel: &CancellationToken,
    tx: &Sender<WorkerEvent>,
) {
    // a dropped receiver does not stop the queue, only cancellation does
    let emit = |event: WorkerEvent| {
        let _ = tx.send(event);
    };

    let total = jobs.len();
    for (index, job) in jobs.into_iter().enumerate() {
        if cancel.is_cancelled() {
            emit(WorkerEvent::Stopped);
            return;
        }
        let is_final = index + 1 == total;
        let base = index as f32 / total as f32;
        emit(WorkerEvent::Log(format!("processing {} ({}/{})", job.name, index + 1, total)));
        emit(WorkerEvent::Progress(base));

        let input = match (job.load)() {
            Ok(input) => input,
            Err(err) => {
                tracing::warn!(file = %job.name, error = %err, "failed to load input");
                emit(WorkerEvent::Log(format!("{}: {err}", job.name)));
                emit(WorkerEvent::Done {
                    file: job.name,
                    output: None,
                    is_final,
                });
                continue;
            }
        };

        let run = pipeline.process_with_progress(input, cancel, |stage| {
            emit(WorkerEvent::Progress(base + stage.progress() / total as f32));
        });
        let Some(run) = run else {
            tracing::info!(file = %job.name, "processing cancelled");
            emit(WorkerEvent::Stopped);
            return;
        };

        tracing::info!(
            file = %job.name,
            segments = run.report.output_segments,
            words = run.report.output_words,
            "file processed"
        );
        emit(WorkerEvent::Progress((index + 1) as f32 / total as f32));
        emit(WorkerEvent::Done {
            file: job.name,
            output: Some(run.output),
            is_final,
        });
    }
    emit(WorkerEvent::Finished);
}
