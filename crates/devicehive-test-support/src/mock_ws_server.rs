//! A mock DeviceHive WebSocket server for testing client sessions.
//!
//! Accepts connections on ws://localhost:<port> and answers every inbound
//! action with a generic `status: success` reply carrying the same
//! `requestId`, unless a canned response was registered for that action via
//! [`MockWsServer::set_response`]. Also exposes [`MockWsServer::push`] to
//! send an unsolicited action (e.g. `command/insert`) to every connected
//! client, for exercising the server-initiated push path.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

type Clients = Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>>;
type CannedResponses = Arc<Mutex<HashMap<String, Value>>>;

/// A mock DeviceHive WebSocket server for integration testing.
///
/// Binds to a random port so tests can run concurrently without colliding.
pub struct MockWsServer {
    addr: SocketAddr,
    clients: Clients,
    responses: CannedResponses,
    _task: tokio::task::JoinHandle<()>,
}

impl MockWsServer {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        let responses: CannedResponses = Arc::new(Mutex::new(HashMap::new()));

        let accept_clients = Arc::clone(&clients);
        let accept_responses = Arc::clone(&responses);
        let task = tokio::spawn(async move {
            Self::accept_loop(listener, accept_clients, accept_responses).await;
        });

        Ok(Self { addr, clients, responses, _task: task })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Register a canned reply for a given inbound action name. The
    /// registered value is sent verbatim except `requestId` is filled in
    /// from the inbound request.
    pub fn set_response(&self, action: &str, mut response: Value) {
        if let Some(obj) = response.as_object_mut() {
            obj.entry("action").or_insert_with(|| json!(action));
            obj.entry("status").or_insert_with(|| json!("success"));
        }
        self.responses.lock().unwrap().insert(action.to_owned(), response);
    }

    /// Push an unsolicited action to every currently connected client.
    pub fn push(&self, action_json: Value) {
        let text = serde_json::to_string(&action_json).expect("serializable push payload");
        let clients = self.clients.lock().unwrap();
        for tx in clients.iter() {
            let _ = tx.send(Message::Text(text.clone().into()));
        }
    }

    async fn accept_loop(listener: TcpListener, clients: Clients, responses: CannedResponses) {
        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let clients = Arc::clone(&clients);
                    let responses = Arc::clone(&responses);
                    tokio::spawn(async move {
                        let _ = Self::handle_connection(stream, clients, responses).await;
                    });
                }
                Err(_) => break,
            }
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        clients: Clients,
        responses: CannedResponses,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        let (mut write, mut read) = ws.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        clients.lock().unwrap().push(tx.clone());

        loop {
            tokio::select! {
                outbound = rx.recv() => {
                    match outbound {
                        Some(msg) => write.send(msg).await?,
                        None => break,
                    }
                }
                inbound = read.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            let reply = Self::build_reply(&text, &responses);
                            if let Some(reply) = reply {
                                write.send(Message::Text(reply.into())).await?;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    }
                }
            }
        }
        Ok(())
    }

    fn build_reply(text: &str, responses: &CannedResponses) -> Option<String> {
        let parsed: Value = serde_json::from_str(text).ok()?;
        let action = parsed.get("action")?.as_str()?.to_owned();
        let request_id = parsed.get("requestId").cloned();

        let mut reply = responses
            .lock()
            .unwrap()
            .get(&action)
            .cloned()
            .unwrap_or_else(|| json!({ "action": action, "status": "success" }));

        if let Some(obj) = reply.as_object_mut() {
            if let Some(id) = request_id {
                obj.insert("requestId".to_owned(), id);
            }
        }
        Some(serde_json::to_string(&reply).expect("serializable reply"))
    }
}
