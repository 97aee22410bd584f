//! Display sinks: where rendered frames leave the process.
//!
//! [`PipeSink`] appends binary records to a FIFO (or plain file) read by the
//! device driver:
//!
//! ```text
//! 'F' | width: u16 BE | height: u16 BE | width*height RGB565 pixels, BE
//! 'V' | pattern: u8
//! ```
//!
//! [`TimedSink`] runs any sink on a worker thread and bounds every call by a
//! timeout, so a stalled reader cannot block the event loop.  A call that
//! times out leaves the worker busy; further calls fail fast with
//! [`SinkError::Busy`] until it has finished.

use crate::command::Vibration;
use crate::frame::Frame;
use crate::traits::DisplaySink;
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {width}x{height} does not fit the record header")]
    TooLarge { width: u32, height: u32 },
    #[error("display did not respond within {0:?}")]
    Timeout(Duration),
    #[error("display is still busy with request #{0}")]
    Busy(u64),
    #[error("display worker has stopped")]
    Disconnected,
    #[error("display error: {0}")]
    Backend(String),
}

//  PipeSink

/// Writes frame and vibration records to a path.
///
/// The file is opened on first use and reopened after a write error.
/// Without a path every record is discarded.
#[derive(Debug, Default)]
pub struct PipeSink {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl PipeSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        if path.is_none() {
            info!("no frame sink configured, frames are discarded");
        }
        Self { path, file: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write_record(&mut self, record: &[u8]) -> Result<(), SinkError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| SinkError::Open {
                    path: path.clone(),
                    source,
                })?;
            debug!("opened frame sink {}", path.display());
            self.file = Some(file);
        }
        let result = match self.file.as_mut() {
            Some(file) => file.write_all(record),
            None => return Ok(()),
        };
        if let Err(e) = result {
            // reopen on the next record
            self.file = None;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Encode `frame` as an `'F'` record.
pub fn frame_record(frame: &Frame) -> Result<Vec<u8>, SinkError> {
    let too_large = || SinkError::TooLarge {
        width: frame.width(),
        height: frame.height(),
    };
    let width = u16::try_from(frame.width()).map_err(|_| too_large())?;
    let height = u16::try_from(frame.height()).map_err(|_| too_large())?;
    let pixels = frame.to_be_bytes();
    let mut record = Vec::with_capacity(5 + pixels.len());
    record.push(b'F');
    record.extend_from_slice(&width.to_be_bytes());
    record.extend_from_slice(&height.to_be_bytes());
    record.extend_from_slice(&pixels);
    Ok(record)
}

impl DisplaySink for PipeSink {
    type Error = SinkError;

    fn submit(&mut self, frame: &Frame) -> Result<(), SinkError> {
        if self.path.is_none() {
            return Ok(());
        }
        let record = frame_record(frame)?;
        self.write_record(&record)
    }

    fn vibrate(&mut self, pattern: Vibration) -> Result<(), SinkError> {
        self.write_record(&[b'V', pattern.code()])
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        match self.file.as_mut() {
            Some(file) => file.flush().map_err(SinkError::from),
            None => Ok(()),
        }
    }
}

//  TimedSink

enum Op {
    Submit(Frame),
    Vibrate(Vibration),
    Flush,
}

struct Request {
    seq: u64,
    op: Op,
}

type Response = (u64, Result<(), String>);

/// Runs a sink on its own thread and waits at most `timeout` per call.
pub struct TimedSink {
    requests: Option<mpsc::Sender<Request>>,
    responses: mpsc::Receiver<Response>,
    timeout: Duration,
    next_seq: u64,
    pending: Option<u64>,
    worker: Option<JoinHandle<()>>,
}

impl TimedSink {
    pub fn spawn<S>(mut sink: S, timeout: Duration) -> Self
    where
        S: DisplaySink + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (resp_tx, resp_rx) = mpsc::channel::<Response>();
        let worker = std::thread::spawn(move || {
            for Request { seq, op } in req_rx {
                let result = match &op {
                    Op::Submit(frame) => sink.submit(frame),
                    Op::Vibrate(pattern) => sink.vibrate(*pattern),
                    Op::Flush => sink.flush(),
                };
                if resp_tx.send((seq, result.map_err(|e| e.to_string()))).is_err() {
                    break;
                }
            }
            debug!("display worker stopped");
        });
        Self {
            requests: Some(req_tx),
            responses: resp_rx,
            timeout,
            next_seq: 0,
            pending: None,
            worker: Some(worker),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Collect late responses so a worker that caught up is usable again.
    fn drain_late(&mut self) {
        while let Ok((seq, result)) = self.responses.try_recv() {
            if let Err(e) = result {
                warn!("late display error for request #{}: {}", seq, e);
            }
            if self.pending == Some(seq) {
                debug!("display request #{} finished late", seq);
                self.pending = None;
            }
        }
    }

    fn call(&mut self, op: Op) -> Result<(), SinkError> {
        self.drain_late();
        if let Some(seq) = self.pending {
            return Err(SinkError::Busy(seq));
        }
        let requests = self.requests.as_ref().ok_or(SinkError::Disconnected)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        requests
            .send(Request { seq, op })
            .map_err(|_| SinkError::Disconnected)?;
        self.pending = Some(seq);

        let deadline = Instant::now().checked_add(self.timeout);
        loop {
            let remaining = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()),
                None => self.timeout,
            };
            match self.responses.recv_timeout(remaining) {
                Ok((s, result)) if s == seq => {
                    self.pending = None;
                    return result.map_err(SinkError::Backend);
                }
                Ok((s, _)) => debug!("dropping stale display response #{}", s),
                Err(mpsc::RecvTimeoutError::Timeout) => return Err(SinkError::Timeout(self.timeout)),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    self.pending = None;
                    return Err(SinkError::Disconnected);
                }
            }
        }
    }
}

impl DisplaySink for TimedSink {
    type Error = SinkError;

    fn submit(&mut self, frame: &Frame) -> Result<(), SinkError> {
        self.call(Op::Submit(frame.clone()))
    }

    fn vibrate(&mut self, pattern: Vibration) -> Result<(), SinkError> {
        self.call(Op::Vibrate(pattern))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.call(Op::Flush)
    }
}

impl Drop for TimedSink {
    fn drop(&mut self) {
        self.requests.take();
        let Some(worker) = self.worker.take() else {
            return;
        };
        if self.pending.is_some() {
            // Stuck in a write; joining could hang forever.
            warn!("display worker still busy at exit, detaching it");
            return;
        }
        let _ = worker.join();
    }
}
