//! Unix datagram queue between analysis processes and the filler.
//!
//! Datagrams keep message boundaries, the kernel bounds the queue, and only
//! the filler binds the path. A zero-length datagram is the flush delimiter.

use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cstruct_core::errors::TransportError;

use super::message::Message;

/// Sending end, one per analysis process.
pub struct QueueSender {
    socket: UnixDatagram,
    path: PathBuf,
    max_message_size: usize,
}

impl QueueSender {
    /// Connect to the filler's socket. Fails if the filler is not running.
    pub fn connect(path: &Path, max_message_size: usize) -> Result<Self, TransportError> {
        let open_err = |e: std::io::Error| TransportError::QueueOpen {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        let socket = UnixDatagram::unbound().map_err(open_err)?;
        socket.connect(path).map_err(open_err)?;
        Ok(Self {
            socket,
            path: path.to_path_buf(),
            max_message_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send one message. Blocks while the kernel queue is full.
    pub fn send(&self, message: &Message<'_>) -> Result<(), TransportError> {
        let bytes = message.encode()?;
        if bytes.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                len: bytes.len(),
                max: self.max_message_size,
            });
        }
        self.socket
            .send(&bytes)
            .map_err(|e| TransportError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Ask the filler to commit its current batch.
    pub fn send_flush(&self) -> Result<(), TransportError> {
        self.send(&Message::flush())
    }
}

/// Receiving end, owned by the filler. Dropping it removes the socket.
pub struct QueueReceiver {
    socket: UnixDatagram,
    path: PathBuf,
    buf: Vec<u8>,
    max_message_size: usize,
}

impl QueueReceiver {
    /// Bind `path`. An existing socket file is an error unless
    /// `unlink_stale` is set, in which case it is removed first.
    ///
    /// `poll` bounds each [`recv`](Self::recv) so the caller can check for
    /// a stop request and run its idle flush.
    pub fn bind(
        path: &Path,
        max_message_size: usize,
        unlink_stale: bool,
        poll: Duration,
    ) -> Result<Self, TransportError> {
        let open_err = |e: std::io::Error| TransportError::QueueOpen {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if unlink_stale {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!(path = %path.display(), "removed stale queue socket"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(open_err(e)),
            }
        }

        let socket = UnixDatagram::bind(path).map_err(open_err)?;
        socket.set_read_timeout(Some(poll)).map_err(open_err)?;
        tracing::info!(path = %path.display(), max_message_size, "queue bound");

        Ok(Self {
            socket,
            path: path.to_path_buf(),
            buf: vec![0; max_message_size + 1],
            max_message_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait up to the poll interval for one datagram.
    ///
    /// `Ok(None)` means nothing arrived; `Ok(Some(&[]))` is a flush.
    pub fn recv(&mut self) -> Result<Option<&[u8]>, TransportError> {
        let len = match self.socket.recv(&mut self.buf) {
            Ok(len) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                return Ok(None)
            }
            Err(e) => {
                return Err(TransportError::ReceiveFailed {
                    message: e.to_string(),
                })
            }
        };
        if len > self.max_message_size {
            return Err(TransportError::Malformed {
                reason: format!("datagram exceeds {} bytes", self.max_message_size),
            });
        }
        Ok(Some(&self.buf[..len]))
    }
}

impl Drop for QueueReceiver {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove queue socket");
            }
        }
    }
}
