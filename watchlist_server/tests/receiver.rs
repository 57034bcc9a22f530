//! Command channel round trips over a real socket.
mod common;

use common::{Harness, stored, sym};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use watchlist_common::command::{read_line, write_line};
use watchlist_common::{Command, DispatchOutcome, MutationRequest, Reply};
use watchlist_server::QuoteStore;
use watchlist_server::receiver::CommandReceiver;

struct Running {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Running {
    fn start(h: &Harness) -> Self {
        let receiver = CommandReceiver::bind("127.0.0.1:0").expect("bind");
        let addr = receiver.local_addr().expect("addr");
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = h.dispatcher.handle();
        let store: Arc<dyn QuoteStore> = h.store.clone();
        let flag = Arc::clone(&shutdown);
        let thread = thread::spawn(move || receiver.serve(handle, store, flag));
        Self {
            addr,
            shutdown,
            thread: Some(thread),
        }
    }

    fn send(&self, command: &Command) -> Reply {
        let stream = TcpStream::connect(self.addr).expect("connect");
        let mut writer = BufWriter::new(stream.try_clone().expect("clone"));
        let mut reader = BufReader::new(stream);
        write_line(&mut writer, command).expect("write");
        read_line(&mut reader).expect("read")
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[test]
fn list_returns_current_quotes() {
    let h = Harness::start(vec![stored("MSFT", 400.0), stored("AAPL", 180.0)]);
    let server = Running::start(&h);

    match server.send(&Command::List) {
        Reply::Quotes(quotes) => {
            let symbols: Vec<String> = quotes.iter().map(|q| q.symbol.to_string()).collect();
            assert_eq!(symbols, ["AAPL", "MSFT"]);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn dispatch_waits_for_the_outcome() {
    let h = Harness::start(vec![stored("AAPL", 180.0)]);
    let server = Running::start(&h);

    let reply = server.send(&Command::Dispatch(MutationRequest::Add(sym("aapl"))));
    assert_eq!(
        reply,
        Reply::Outcome(DispatchOutcome::NoOpAlreadyPresent(sym("AAPL")))
    );

    let reply = server.send(&Command::Dispatch(MutationRequest::Add(sym("nflx"))));
    assert!(matches!(reply, Reply::Outcome(ref o) if o.is_applied()), "{reply:?}");

    match server.send(&Command::History(sym("AAPL"))) {
        Reply::Quotes(history) => {
            assert_eq!(history.len(), 2);
            assert!(history[0].is_current);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn undecodable_command_gets_an_error_reply() {
    let h = Harness::start(Vec::new());
    let server = Running::start(&h);

    let mut stream = TcpStream::connect(server.addr).expect("connect");
    stream.write_all(b"{\"Bogus\":1}\n").expect("write");
    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).expect("read");
    let reply: Reply = serde_json::from_str(line.trim()).expect("reply json");
    assert!(matches!(reply, Reply::Error(_)), "{reply:?}");

    // The server keeps accepting commands.
    assert!(matches!(server.send(&Command::List), Reply::Quotes(_)));
}
