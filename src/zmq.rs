//! ZeroMQ plumbing between the web server (PUSH) and the worker (PULL).

use std::sync::Mutex;

use thiserror::Error;

use crate::models::zmq::WorkerMessage;

#[derive(Debug, Error)]
pub enum ZmqError {
    #[error("zmq error: {0}")]
    Socket(#[from] ::zmq::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("socket lock poisoned")]
    Poisoned,
}

/// Hands work to the background worker.
#[cfg_attr(feature = "test-mocks", mockall::automock)]
pub trait WorkerNotifier: Send + Sync {
    fn notify(&self, message: &WorkerMessage) -> Result<(), ZmqError>;
}

pub struct ZmqSender {
    socket: Mutex<::zmq::Socket>,
    _context: ::zmq::Context,
}

impl ZmqSender {
    /// Connects a PUSH socket; messages are dropped when no worker picks them up in time.
    pub fn connect(endpoint: &str) -> Result<Self, ZmqError> {
        let context = ::zmq::Context::new();
        let socket = context.socket(::zmq::PUSH)?;
        socket.set_linger(0)?;
        socket.set_sndtimeo(1000)?;
        socket.connect(endpoint)?;
        Ok(Self {
            socket: Mutex::new(socket),
            _context: context,
        })
    }
}

impl WorkerNotifier for ZmqSender {
    fn notify(&self, message: &WorkerMessage) -> Result<(), ZmqError> {
        let payload = serde_json::to_vec(message)?;
        let socket = self.socket.lock().map_err(|_| ZmqError::Poisoned)?;
        socket.send(payload, 0)?;
        Ok(())
    }
}

pub struct ZmqReceiver {
    socket: ::zmq::Socket,
    _context: ::zmq::Context,
}

impl ZmqReceiver {
    pub fn bind(endpoint: &str) -> Result<Self, ZmqError> {
        let context = ::zmq::Context::new();
        let socket = context.socket(::zmq::PULL)?;
        socket.bind(endpoint)?;
        Ok(Self {
            socket,
            _context: context,
        })
    }

    /// Blocks until the next message arrives.
    pub fn recv(&self) -> Result<WorkerMessage, ZmqError> {
        let bytes = self.socket.recv_bytes(0)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
