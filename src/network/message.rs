// Wire protocol: one JSON message each way per TCP connection.
// The requester writes its message and half-closes; the responder reads exactly one
// message, writes at most one reply, and closes.

use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::Peer;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::io::{self, BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Bound on connecting to a peer; past it the peer counts as unreachable
pub const TCP_CONNECT_TIMEOUT: u64 = 5000;
/// Bound on waiting for a reply or a request body
pub const TCP_READ_TIMEOUT: u64 = 60000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Sender's listening port
    Hello(u16),
    RequestChain,
    SendChain(Vec<Block>),
    NewBlock(Block),
    NewTx(Transaction),
    /// Sender's listening port
    Disconnect(u16),
    Ack,
}

impl Message {
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Hello(_) => "HELLO",
            Message::RequestChain => "REQUEST_CHAIN",
            Message::SendChain(_) => "SEND_CHAIN",
            Message::NewBlock(_) => "NEW_BLOCK",
            Message::NewTx(_) => "NEW_TX",
            Message::Disconnect(_) => "DISCONNECT",
            Message::Ack => "ACK",
        }
    }
}

/// The other side went away mid-exchange. Expected in a gossip network.
fn is_closed(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

pub fn write_message(mut stream: &TcpStream, message: &Message) -> Result<()> {
    let data = serde_json::to_vec(message)?;
    stream.write_all(&data)?;
    stream.flush()?;
    Ok(())
}

/// Next message on the stream, or `None` if the peer closed without sending one
pub fn read_message(stream: &TcpStream) -> Result<Option<Message>> {
    let reader = BufReader::new(stream);
    match Deserializer::from_reader(reader).into_iter::<Message>().next() {
        None => Ok(None),
        Some(Ok(message)) => Ok(Some(message)),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) if e.is_io() => {
            let err = io::Error::from(e);
            if is_closed(err.kind()) {
                Ok(None)
            } else {
                Err(BlockchainError::Network(format!("Failed to read message: {err}")))
            }
        }
        Some(Err(e)) => Err(BlockchainError::Serialization(format!(
            "Malformed message: {e}"
        ))),
    }
}

/// One request/reply round trip with `peer`.
///
/// `Err(PeerUnreachable)` when the connection cannot be opened at all.
/// `Ok(None)` when the peer accepted but closed without replying.
pub fn exchange(peer: &Peer, message: &Message) -> Result<Option<Message>> {
    let addr = peer.resolve()?;
    let stream = TcpStream::connect_timeout(&addr, Duration::from_millis(TCP_CONNECT_TIMEOUT))
        .map_err(|e| BlockchainError::PeerUnreachable(format!("{peer}: {e}")))?;
    stream.set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))?;
    stream.set_write_timeout(Some(Duration::from_millis(TCP_CONNECT_TIMEOUT)))?;

    debug!("Sending {} to {peer}", message.tag());
    match write_message(&stream, message) {
        Ok(()) => {}
        Err(BlockchainError::Io(msg)) => {
            debug!("{peer} closed before the request was written: {msg}");
            return Ok(None);
        }
        Err(e) => return Err(e),
    }
    if let Err(e) = stream.shutdown(Shutdown::Write) {
        if is_closed(e.kind()) {
            return Ok(None);
        }
        return Err(e.into());
    }

    read_message(&stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::genesis;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_wire_format_is_tagged() {
        let json = serde_json::to_string(&Message::Hello(2001)).unwrap();
        assert_eq!(json, r#"{"type":"HELLO","data":2001}"#);

        let json = serde_json::to_string(&Message::RequestChain).unwrap();
        assert_eq!(json, r#"{"type":"REQUEST_CHAIN"}"#);

        let parsed: Message = serde_json::from_str(r#"{"type":"ACK"}"#).unwrap();
        assert_eq!(parsed, Message::Ack);
    }

    #[test]
    fn test_chain_payload_survives_the_wire() {
        let message = Message::SendChain(vec![genesis::genesis_block()]);
        let json = serde_json::to_vec(&message).unwrap();
        let parsed: Message = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, message);
        assert_eq!(parsed.tag(), "SEND_CHAIN");
    }

    #[test]
    fn test_exchange_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let request = read_message(&stream).unwrap();
            write_message(&stream, &Message::Ack).unwrap();
            request
        });

        let reply = exchange(&Peer::new("127.0.0.1", port), &Message::Hello(9)).unwrap();
        assert_eq!(reply, Some(Message::Ack));
        assert_eq!(server.join().unwrap(), Some(Message::Hello(9)));
    }

    #[test]
    fn test_closed_without_reply_is_benign() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let _ = read_message(&stream);
            drop(stream);
        });

        let reply = exchange(&Peer::new("127.0.0.1", port), &Message::Disconnect(1)).unwrap();
        assert_eq!(reply, None);
        server.join().unwrap();
    }

    #[test]
    fn test_refused_connection_is_unreachable() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = exchange(&Peer::new("127.0.0.1", port), &Message::Ack);
        assert!(matches!(result, Err(BlockchainError::PeerUnreachable(_))));
    }
}
