use crate::dispatcher::DispatchHandle;
use crate::model::store::QuoteStore;
use log::{debug, error, info, warn};
use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use watchlist_common::command::{read_line, write_line};
use watchlist_common::{Command, Reply, Result};

/// How long a client may take to send its command.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP command receiver.
///
/// Each accepted connection is served on its own thread: one `Command` line in, one
/// `Reply` line out. A malformed command only affects the connection that sent it.
pub struct CommandReceiver {
    listener: TcpListener,
}

impl CommandReceiver {
    /// Bind to `bind_addr` (e.g., `127.0.0.1:8080`).
    pub fn bind(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)?;
        Ok(Self { listener })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is set.
    ///
    /// The flag is checked after each accepted connection; whoever sets it should open
    /// one more connection to wake the loop.
    pub fn serve(self, dispatcher: DispatchHandle, store: Arc<dyn QuoteStore>, shutdown: Arc<AtomicBool>) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Command TCP server is started on {}", addr),
            Err(e) => warn!("Command TCP server started on unknown address: {}", e),
        }

        for stream in self.listener.incoming() {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let dispatcher = dispatcher.clone();
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        let peer = stream.peer_addr().ok();
                        if let Err(e) = handle_connection(stream, &dispatcher, store.as_ref()) {
                            error!("Client {:?} error: {}", peer, e);
                        }
                    });
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        info!("Command TCP server stopped");
    }
}

fn handle_connection(stream: TcpStream, dispatcher: &DispatchHandle, store: &dyn QuoteStore) -> Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    let reply = match read_line::<_, Command>(&mut reader) {
        Ok(command) => {
            info!("Received command {:?}", command);
            serve_command(command, dispatcher, store)
        }
        Err(e) => {
            debug!("Rejecting undecodable command: {}", e);
            Reply::Error(format!("invalid command: {e}"))
        }
    };
    write_line(&mut writer, &reply)
}

/// Compute the reply for one decoded command.
pub fn serve_command(command: Command, dispatcher: &DispatchHandle, store: &dyn QuoteStore) -> Reply {
    match command {
        Command::Dispatch(request) => match dispatcher.dispatch(request) {
            Ok(outcome) => Reply::Outcome(outcome),
            Err(e) => Reply::Error(e.to_string()),
        },
        Command::List => Reply::Quotes(store.current()),
        Command::History(symbol) => Reply::Quotes(store.history(&symbol)),
    }
}
