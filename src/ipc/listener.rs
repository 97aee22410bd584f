//! Unix-socket [`EventSource`] implementation.
//!
//! Binds a Unix stream socket and serves every connection on its own
//! thread, so the device bridge can keep a connection open while scripts
//! and the dashboard come and go.
//!
//! # Wire format
//!
//! Each request is a single line of JSON followed by `\n`; each request gets
//! exactly one reply line, in order:
//!
//! ```text
//! → {"TouchStart":{"touches":[{"x":80,"y":10}]}}
//! ← "Ok"
//! → {"CreatePage":{"title":"Media"}}
//! ← {"Page":"media"}
//! → not json
//! ← {"Error":"bad command: expected value at line 1 column 1"}
//! ```

use crate::command::{Command, Event, Reply};
use crate::traits::EventSource;
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// How long a client waits for the event loop to answer.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// An [`EventSource`] that listens on a Unix stream socket for
/// JSON-encoded commands.
pub struct UnixSocketListener {
    path: PathBuf,
    reply_timeout: Duration,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum UnixSocketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UnixSocketListener {
    /// Create a new listener bound to `path`.
    ///
    /// The socket file is created when [`run`](EventSource::run) is called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reply_timeout: REPLY_TIMEOUT,
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for UnixSocketListener {
    type Error = UnixSocketError;

    /// Bind the socket and start accepting connections.
    ///
    /// This method **blocks** indefinitely.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Event>) -> Result<(), Self::Error> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("listening on {}", self.path.display());

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let sink = sink.clone();
                    let timeout = self.reply_timeout;
                    std::thread::spawn(move || {
                        debug!("client connected");
                        if let Err(e) = serve_client(stream, &sink, timeout) {
                            debug!("client error: {}", e);
                        }
                        debug!("client disconnected");
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
        Ok(())
    }
}

/// Answer every line from `stream` until it closes.
fn serve_client(
    stream: UnixStream,
    sink: &mpsc::Sender<Event>,
    timeout: Duration,
) -> Result<(), UnixSocketError> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let text = line?;
        if text.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Command>(&text) {
            Ok(cmd) => {
                debug!("received {:?}", cmd);
                match request(sink, cmd, timeout) {
                    Some(reply) => reply,
                    None => {
                        info!("event loop gone, closing connection");
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                warn!("bad command: {}: {}", text, e);
                Reply::Error(format!("bad command: {}", e))
            }
        };
        let mut out = serde_json::to_string(&reply)?;
        out.push('\n');
        writer.write_all(out.as_bytes())?;
    }
    Ok(())
}

/// Forward `cmd` to the event loop and wait for its reply.  `None` when the
/// event loop has stopped.
fn request(sink: &mpsc::Sender<Event>, cmd: Command, timeout: Duration) -> Option<Reply> {
    let (reply_tx, reply_rx) = mpsc::channel();
    sink.send(Event::Command(cmd, Some(reply_tx))).ok()?;
    match reply_rx.recv_timeout(timeout) {
        Ok(reply) => Some(reply),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!("no reply within {:?}", timeout);
            Some(Reply::Error(format!("no reply within {:?}", timeout)))
        }
        // dropped without answering: the loop is shutting down
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(Reply::Error("request dropped".into())),
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TouchPoint;
    use std::io::{BufRead, BufReader, Write};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    /// Helper: create a unique temporary socket path for each test.
    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("deckgrd-test-{}-{}.sock", std::process::id(), id))
    }

    /// Start a listener and a fake event loop that answers `ShowPage(id)`
    /// with `Page(id)`, ignores `Redraw` and answers everything else with
    /// `Ok`.  Returns the socket path and the log of received commands.
    fn start(timeout: Duration) -> (PathBuf, mpsc::Receiver<Command>) {
        let path = tmp_socket_path();
        let path_clone = path.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut listener = UnixSocketListener::new(&path_clone).with_reply_timeout(timeout);
            let _ = listener.run(tx);
        });

        let (log_tx, log_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for event in rx {
                if let Event::Command(cmd, reply) = event {
                    // logged before answering so the client never outruns the log
                    let _ = log_tx.send(cmd.clone());
                    let answer = match &cmd {
                        Command::ShowPage(id) => Some(Reply::Page(id.clone())),
                        Command::Redraw => None,
                        _ => Some(Reply::Ok),
                    };
                    match (reply, answer) {
                        (Some(r), Some(a)) => {
                            let _ = r.send(a);
                        }
                        (Some(r), None) => held.push(r),
                        _ => {}
                    }
                }
            }
        });

        // Give the listener a moment to bind.
        std::thread::sleep(Duration::from_millis(150));
        (path, log_rx)
    }

    fn exchange(path: &Path, lines: &[&str]) -> Vec<Reply> {
        let mut stream = UnixStream::connect(path).expect("connect");
        for line in lines {
            writeln!(stream, "{}", line).unwrap();
        }
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        BufReader::new(stream)
            .lines()
            .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn round_trip_commands_over_socket() {
        let (path, log) = start(REPLY_TIMEOUT);
        let replies = exchange(
            &path,
            &[
                r#"{"TouchStart":{"touches":[{"x":80,"y":10}]}}"#,
                r#"{"ShowPage":"media"}"#,
                r#""NextPage""#,
            ],
        );
        assert_eq!(replies, vec![Reply::Ok, Reply::Page("media".into()), Reply::Ok]);

        let cmds: Vec<Command> = log.try_iter().collect();
        assert_eq!(
            cmds[0],
            Command::TouchStart {
                touches: vec![TouchPoint { x: 80, y: 10 }]
            }
        );
        assert_eq!(cmds[2], Command::NextPage);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_json_gets_error_reply_and_connection_survives() {
        let (path, log) = start(REPLY_TIMEOUT);
        let replies = exchange(&path, &["not json at all", "", r#""Reload""#]);
        assert_eq!(replies.len(), 2);
        assert!(matches!(&replies[0], Reply::Error(msg) if msg.starts_with("bad command")));
        assert_eq!(replies[1], Reply::Ok);
        // only the valid command reached the event loop
        let cmds: Vec<Command> = log.try_iter().collect();
        assert_eq!(cmds, vec![Command::Reload]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn slow_event_loop_times_out() {
        let (path, _log) = start(Duration::from_millis(100));
        let replies = exchange(&path, &[r#""Redraw""#, r#""Reload""#]);
        assert!(matches!(&replies[0], Reply::Error(msg) if msg.contains("no reply")));
        assert_eq!(replies[1], Reply::Ok);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn concurrent_clients_are_served() {
        let (path, _log) = start(REPLY_TIMEOUT);
        let idle = UnixStream::connect(&path).expect("connect");
        let replies = exchange(&path, &[r#"{"ShowPage":"home"}"#]);
        assert_eq!(replies, vec![Reply::Page("home".into())]);
        drop(idle);
        let _ = std::fs::remove_file(&path);
    }
}
