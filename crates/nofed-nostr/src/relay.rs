//! Relay connections.
//!
//! The pool talks to relays only through [`RelayConnector`] and
//! [`RelayConnection`], so the fan-out logic can run against in-process fakes.
//! [`WsConnector`] is the production implementation over `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::{error::NostrError, event::Event, filter::Filter};

/// Opens connections to relays.
#[async_trait]
pub trait RelayConnector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayConnection>, NostrError>;
}

/// An open connection to a single relay.
#[async_trait]
pub trait RelayConnection: Send {
    /// Run `filter` and forward every stored event to `sink` until the relay
    /// signals end of stored events. Returns the number of events forwarded.
    ///
    /// Stops early without error when `sink` is closed.
    async fn query(&mut self, filter: &Filter, sink: &mpsc::Sender<Event>) -> Result<usize, NostrError>;

    /// Close the connection. Errors are ignored.
    async fn close(self: Box<Self>);
}

// ─── Relay → client messages ─────────────────────────────────────────────────

/// A relay-to-client message.
#[derive(Debug, PartialEq)]
pub enum RelayMessage {
    Event { subscription: String, event: Box<Event> },
    Eose { subscription: String },
    Closed { subscription: String, reason: String },
    Notice(String),
    Other,
}

impl RelayMessage {
    /// Parse a text frame. Returns `None` for anything that is not a JSON array
    /// with a string label.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let arr = value.as_array()?;
        let label = arr.first()?.as_str()?;
        let str_at = |i: usize| arr.get(i).and_then(Value::as_str).unwrap_or_default().to_owned();

        let msg = match label {
            "EVENT" => {
                let event = serde_json::from_value(arr.get(2)?.clone()).ok()?;
                RelayMessage::Event { subscription: str_at(1), event: Box::new(event) }
            }
            "EOSE" => RelayMessage::Eose { subscription: str_at(1) },
            "CLOSED" => RelayMessage::Closed { subscription: str_at(1), reason: str_at(2) },
            "NOTICE" => RelayMessage::Notice(str_at(1)),
            _ => RelayMessage::Other,
        };
        Some(msg)
    }
}

// ─── WebSocket implementation ────────────────────────────────────────────────

/// Connects to relays over WebSocket.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl RelayConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayConnection>, NostrError> {
        let (stream, _response) = connect_async(url).await?;
        debug!("Connected to relay {}", url);
        Ok(Box::new(WsConnection { url: url.to_owned(), stream }))
    }
}

struct WsConnection {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RelayConnection for WsConnection {
    async fn query(&mut self, filter: &Filter, sink: &mpsc::Sender<Event>) -> Result<usize, NostrError> {
        let subscription = format!("nofed-{:016x}", rand::random::<u64>());
        let req = serde_json::json!(["REQ", subscription, filter]);
        self.stream.send(Message::Text(req.to_string().into())).await?;

        let mut forwarded = 0;
        while let Some(msg) = self.stream.next().await {
            let text = match msg? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match RelayMessage::parse(&text) {
                Some(RelayMessage::Event { subscription: sub, event }) if sub == subscription => {
                    if sink.send(*event).await.is_err() {
                        break;
                    }
                    forwarded += 1;
                }
                Some(RelayMessage::Eose { subscription: sub }) if sub == subscription => break,
                Some(RelayMessage::Closed { subscription: sub, reason }) if sub == subscription => {
                    return Err(NostrError::Closed(self.url.clone(), reason));
                }
                Some(RelayMessage::Notice(notice)) => debug!("Relay {} notice: {}", self.url, notice),
                _ => {}
            }
        }

        let close = serde_json::json!(["CLOSE", subscription]);
        let _ = self.stream.send(Message::Text(close.to_string().into())).await;
        Ok(forwarded)
    }

    async fn close(mut self: Box<Self>) {
        let _ = self.stream.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::kind;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn ws_connection_streams_until_eose() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let Some(Ok(Message::Text(req))) = ws.next().await else {
                panic!("expected REQ");
            };
            let req: Value = serde_json::from_str(&req).unwrap();
            assert_eq!(req[0], "REQ");
            assert_eq!(req[2], serde_json::json!({ "kinds": [1] }));
            let sub = req[1].as_str().unwrap().to_owned();

            for content in ["one", "two"] {
                let event = Event::new("ab", 1, kind::NOTE, vec![], content);
                let frame = serde_json::json!(["EVENT", sub, event]).to_string();
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            let other = serde_json::json!(["EVENT", "someone-else", Event::new("ab", 1, 1, vec![], "x")]);
            ws.send(Message::Text(other.to_string().into())).await.unwrap();
            ws.send(Message::Text(serde_json::json!(["EOSE", sub]).to_string().into()))
                .await
                .unwrap();

            let Some(Ok(Message::Text(close))) = ws.next().await else {
                panic!("expected CLOSE");
            };
            let close: Value = serde_json::from_str(&close).unwrap();
            assert_eq!(close, serde_json::json!(["CLOSE", sub]));
        });

        let (tx, mut rx) = mpsc::channel(8);
        let mut conn = WsConnector.connect(&url).await.unwrap();
        let forwarded = conn.query(&Filter::new().kind(kind::NOTE), &tx).await.unwrap();
        conn.close().await;
        server.await.unwrap();

        assert_eq!(forwarded, 2);
        assert_eq!(rx.recv().await.unwrap().content, "one");
        assert_eq!(rx.recv().await.unwrap().content, "two");
    }

    #[test]
    fn parses_relay_messages() {
        let event = Event::new("ab", 1, kind::NOTE, vec![], "hi");
        let frame = serde_json::json!(["EVENT", "sub1", event]).to_string();
        assert_eq!(
            RelayMessage::parse(&frame),
            Some(RelayMessage::Event { subscription: "sub1".into(), event: Box::new(event) })
        );
        assert_eq!(
            RelayMessage::parse(r#"["EOSE","sub1"]"#),
            Some(RelayMessage::Eose { subscription: "sub1".into() })
        );
        assert_eq!(
            RelayMessage::parse(r#"["CLOSED","sub1","rate-limited"]"#),
            Some(RelayMessage::Closed { subscription: "sub1".into(), reason: "rate-limited".into() })
        );
        assert_eq!(RelayMessage::parse(r#"["AUTH","x"]"#), Some(RelayMessage::Other));
        assert_eq!(RelayMessage::parse("not json"), None);
        assert_eq!(RelayMessage::parse(r#"["EVENT","sub1",{"broken":true}]"#), None);
    }
}
