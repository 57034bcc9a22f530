//! Sending commands to the watchlist server over TCP.
//!
//! One connection per command: write the `Command` line, read the `Reply` line.
use log::debug;
use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use watchlist_common::command::{read_line, write_line};
use watchlist_common::{Command, Reply, Result, WatchlistError};

/// Connect timeout toward the server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reply timeout; a dispatch waits on the remote quote API, so this is generous.
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Helper type for sending commands to the server.
pub struct CommandSender {
    server: String,
}

impl CommandSender {
    /// Sender targeting `server` (`host:port`).
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    /// Send `command` and wait for the reply.
    pub fn send(&self, command: &Command) -> Result<Reply> {
        let stream = self.connect()?;
        stream.set_read_timeout(Some(REPLY_TIMEOUT))?;
        let mut writer = BufWriter::new(stream.try_clone()?);
        let mut reader = BufReader::new(stream);

        debug!("Sending command: {:?}", command);
        write_line(&mut writer, command)?;
        let reply: Reply = read_line(&mut reader)?;
        debug!("Received reply: {:?}", reply);
        Ok(reply)
    }

    fn connect(&self) -> Result<TcpStream> {
        let mut last_error = None;
        for addr in self.server.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => WatchlistError::Format(format!(
                "Failed to connect to server {}: {}",
                self.server, e
            )),
            None => WatchlistError::Format(format!("No address for server {}", self.server)),
        })
    }
}
