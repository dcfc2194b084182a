//! Pipeline stages
//!
//! A stage is a worker thread which owns one collaborator and answers requests from the
//! dispatcher over a pair of bounded channels. The dispatcher sends one request and blocks until
//! the matching response arrives, so at most one request is ever in flight per stage.

// -----------------------------------------------------------------------------------------------
// INCLUDES
// -----------------------------------------------------------------------------------------------

use std::{
    sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, warn};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Handle held by the dispatcher to a running stage.
pub struct StageHandle<Req, Resp> {
    name: String,

    /// Sender for requests. Taken on drop so the worker sees the channel close.
    sender: Option<SyncSender<Req>>,

    receiver: Receiver<Resp>,

    worker_jh: Option<JoinHandle<()>>,

    /// Maximum time to wait for a response, `None` waits indefinitely.
    timeout: Option<Duration>,

    /// Set once a response has not arrived in time.
    stalled: bool,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Could not start the {0} stage thread: {1}")]
    SpawnError(String, std::io::Error),

    #[error("The {0} stage did not respond within {1:?}")]
    Timeout(String, Duration),

    #[error("The {0} stage stalled on an earlier request and is no longer used")]
    Stalled(String),

    #[error("The {0} stage has stopped")]
    Disconnected(String),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl<Req, Resp> StageHandle<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Start a stage which answers each request with `handler`.
    pub fn spawn<F>(name: &str, timeout: Option<Duration>, handler: F) -> Result<Self, StageError>
    where
        F: FnMut(Req) -> Resp + Send + 'static,
    {
        let (sender, worker_receiver) = sync_channel(1);
        let (worker_sender, receiver) = sync_channel(1);

        let worker_jh = thread::Builder::new()
            .name(format!("stage_{}", name))
            .spawn(move || stage_thread(handler, worker_sender, worker_receiver))
            .map_err(|e| StageError::SpawnError(name.to_string(), e))?;

        debug!("{} stage started", name);

        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            receiver,
            worker_jh: Some(worker_jh),
            timeout,
            stalled: false,
        })
    }
}

impl<Req, Resp> StageHandle<Req, Resp> {
    #[cfg(test)]
    fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Send a request to the stage and block until its response arrives.
    ///
    /// If the stage times out it is marked as stalled and every later request fails
    /// immediately, so a late response can never be paired with a later request.
    pub fn request(&mut self, req: Req) -> Result<Resp, StageError> {
        if self.stalled {
            return Err(StageError::Stalled(self.name.clone()));
        }

        let sender = match self.sender {
            Some(ref s) => s,
            None => return Err(StageError::Disconnected(self.name.clone())),
        };

        // Only one request is in flight, so the send never blocks on a live worker
        sender
            .send(req)
            .map_err(|_| StageError::Disconnected(self.name.clone()))?;

        match self.timeout {
            Some(t) => match self.receiver.recv_timeout(t) {
                Ok(r) => Ok(r),
                Err(RecvTimeoutError::Timeout) => {
                    warn!("{} stage timed out, marking as stalled", self.name);
                    self.stalled = true;
                    Err(StageError::Timeout(self.name.clone(), t))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    Err(StageError::Disconnected(self.name.clone()))
                }
            },
            None => self
                .receiver
                .recv()
                .map_err(|_| StageError::Disconnected(self.name.clone())),
        }
    }
}

impl<Req, Resp> Drop for StageHandle<Req, Resp> {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.sender.take();

        if let Some(jh) = self.worker_jh.take() {
            // A stalled worker may never return, leave it detached
            if self.stalled {
                warn!("Detaching stalled {} stage", self.name);
                return;
            }

            if jh.join().is_err() {
                warn!("{} stage thread panicked", self.name);
            } else {
                debug!("{} stage stopped", self.name);
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn stage_thread<Req, Resp, F>(mut handler: F, sender: SyncSender<Resp>, receiver: Receiver<Req>)
where
    F: FnMut(Req) -> Resp,
{
    while let Ok(req) = receiver.recv() {
        if sender.send(handler(req)).is_err() {
            break;
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
