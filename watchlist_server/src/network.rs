//! Connectivity checks.
//!
//! Every dispatch cycle starts by asking a `Connectivity` whether the network is up;
//! the periodic timer asks the same question before it fires. `TcpProbe` answers by
//! opening (and immediately dropping) a TCP connection to a known host.

use log::debug;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Answers "is the network reachable right now?".
pub trait Connectivity: Send + Sync {
    /// Current reachability.
    fn is_connected(&self) -> bool;
}

/// Probe that treats a successful TCP connect to `target` as connectivity.
pub struct TcpProbe {
    target: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `target` (`host:port`), waiting at most `timeout` per resolved address.
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

impl Connectivity for TcpProbe {
    fn is_connected(&self) -> bool {
        let addrs = match self.target.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Cannot resolve probe target {}: {}", self.target, e);
                return false;
            }
        };
        for addr in addrs {
            if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
                return true;
            }
        }
        debug!("Probe target {} unreachable", self.target);
        false
    }
}

/// Connectivity flag flipped by hand; for embedders with their own network signal.
#[derive(Debug)]
pub struct ManualConnectivity {
    connected: AtomicBool,
}

impl ManualConnectivity {
    /// New flag with the given initial state.
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    /// Change the reported state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Connectivity for ManualConnectivity {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
