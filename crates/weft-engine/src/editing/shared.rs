//! A document owned by its own worker thread.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use log::info;
use thiserror::Error;
use uuid::Uuid;

use crate::editing::{Cmd, Document, Patch};
use crate::flat::FlatText;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document worker is no longer running")]
    WorkerUnavailable,
    #[error("failed to spawn document worker: {0}")]
    Spawn(#[from] std::io::Error),
}

type Job = Box<dyn FnOnce(&mut Document) + Send>;

/// Handle to a [`Document`] living on a dedicated thread.
///
/// Jobs run one at a time in the order they were sent, so edits queued with
/// [`SharedDocument::edit`] are visible to every later read.
pub struct SharedDocument {
    id: Uuid,
    jobs: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SharedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDocument")
            .field("id", &self.id)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl SharedDocument {
    /// Moves `document` onto a new thread named `weft-document-<id>`.
    pub fn spawn(mut document: Document) -> Result<Self, DocumentError> {
        let id = document.id();
        let (jobs, queue) = mpsc::channel::<Job>();

        let thread = thread::Builder::new()
            .name(format!("weft-document-{id}"))
            .spawn(move || {
                info!("document worker {id} started");
                for job in queue {
                    job(&mut document);
                }
                info!("document worker {id} stopped");
            })?;

        Ok(Self {
            id,
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn send(&self, job: Job) -> Result<(), DocumentError> {
        self.jobs
            .as_ref()
            .ok_or(DocumentError::WorkerUnavailable)?
            .send(job)
            .map_err(|_| DocumentError::WorkerUnavailable)
    }

    /// Runs `f` against the document on the worker and waits for its result.
    pub fn read<R, F>(&self, f: F) -> Result<R, DocumentError>
    where
        R: Send + 'static,
        F: FnOnce(&Document) -> R + Send + 'static,
    {
        let (reply, result) = mpsc::channel();
        self.send(Box::new(move |document| {
            let _ = reply.send(f(document));
        }))?;
        result.recv().map_err(|_| DocumentError::WorkerUnavailable)
    }

    pub fn html(&self) -> Result<String, DocumentError> {
        self.read(Document::html)
    }

    pub fn flat_text(&self) -> Result<FlatText, DocumentError> {
        self.read(Document::flat_text)
    }

    pub fn len(&self) -> Result<usize, DocumentError> {
        self.read(Document::len)
    }

    pub fn is_empty(&self) -> Result<bool, DocumentError> {
        self.read(Document::is_empty)
    }

    /// Queues a command and returns without waiting for it.
    pub fn edit(&self, cmd: Cmd) -> Result<(), DocumentError> {
        self.send(Box::new(move |document| {
            document.apply(cmd);
        }))
    }

    /// Applies a command and waits for the resulting patch.
    pub fn apply(&self, cmd: Cmd) -> Result<Patch, DocumentError> {
        let (reply, result) = mpsc::channel();
        self.send(Box::new(move |document| {
            let _ = reply.send(document.apply(cmd));
        }))?;
        result.recv().map_err(|_| DocumentError::WorkerUnavailable)
    }
}

impl Drop for SharedDocument {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain it and exit.
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
