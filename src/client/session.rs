//! Session Client
//!
//! A [`SessionClient`] owns at most one TCP connection to a TideKV server and
//! serializes every request/reply exchange over it. When an exchange fails
//! the connection is discarded; the next call dials a fresh one.

use crate::config::ClientConfig;
use crate::protocol::{read_frame, write_frame, CodecError, Command, Reply};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors returned by [`SessionClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Dialing took longer than the configured timeout
    #[error("timed out connecting to {addr} after {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },

    /// Sending the request or reading the reply failed
    #[error("transport error: {0}")]
    Codec(#[from] CodecError),

    /// Closing the connection failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server answered with `-ERR`
    #[error("server error: {0}")]
    Server(String),

    /// The reply was well framed but not what the command expects
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The key is empty or contains whitespace, so it cannot be sent as one token
    #[error("invalid key '{0}': keys must be non-empty and contain no whitespace")]
    InvalidKey(String),
}

/// A client holding one reusable connection.
///
/// All methods take `&self`; concurrent callers queue on an internal async
/// mutex so request and reply frames never interleave.
///
/// # Example
///
/// ```no_run
/// use tidekv::client::SessionClient;
/// use tidekv::config::ClientConfig;
///
/// # async fn demo() -> Result<(), tidekv::client::ClientError> {
/// let client = SessionClient::connect(ClientConfig::new("127.0.0.1:6380")).await?;
/// client.set("name", "naato").await?;
/// assert_eq!(client.get("name").await?, Some("naato".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionClient {
    config: ClientConfig,
    conn: Mutex<Option<TcpStream>>,
}

impl SessionClient {
    /// Creates a client without connecting. The first request dials.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Creates a client and dials immediately.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Self::new(config);
        let stream = client.dial().await?;
        *client.conn.lock().await = Some(stream);
        Ok(client)
    }

    /// Address this client talks to.
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    async fn dial(&self) -> Result<TcpStream, ClientError> {
        let addr = &self.config.addr;
        let timeout = self.config.dial_timeout;

        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                debug!(server = %addr, "Connected");
                Ok(stream)
            }
            Ok(Err(source)) => Err(ClientError::Dial {
                addr: addr.clone(),
                source,
            }),
            Err(_) => Err(ClientError::DialTimeout {
                addr: addr.clone(),
                timeout,
            }),
        }
    }

    /// Sends one raw command line and returns the raw reply payload.
    ///
    /// Dials first if there is no live connection. On any transport or
    /// framing error the connection is dropped before the error is returned.
    pub async fn send_request(&self, command: &str) -> Result<String, ClientError> {
        let mut conn = self.conn.lock().await;

        let mut stream = match conn.take() {
            Some(stream) => stream,
            None => self.dial().await?,
        };

        match exchange(&mut stream, command).await {
            Ok(reply) => {
                *conn = Some(stream);
                Ok(reply)
            }
            Err(e) => {
                debug!(server = %self.config.addr, error = %e, "Dropping connection");
                Err(e.into())
            }
        }
    }

    async fn request(&self, command: Command) -> Result<Reply, ClientError> {
        let payload = self.send_request(&command.to_string()).await?;
        match Reply::parse(&payload) {
            Some(Reply::Error(msg)) => Err(ClientError::Server(msg)),
            Some(reply) => Ok(reply),
            None => Err(ClientError::UnexpectedReply(payload)),
        }
    }

    /// Stores `value` under `key` without expiry.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        check_key(key)?;
        let reply = self
            .request(Command::Set {
                key: key.to_string(),
                value: value.to_string(),
            })
            .await?;
        expect_ok(reply)
    }

    /// Stores `value` under `key` for `ttl`, rounded down to whole seconds.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ClientError> {
        check_key(key)?;
        let reply = self
            .request(Command::SetEx {
                key: key.to_string(),
                ttl,
                value: value.to_string(),
            })
            .await?;
        expect_ok(reply)
    }

    /// Fetches `key`. A missing or expired key is `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        check_key(key)?;
        match self.request(Command::Get { key: key.to_string() }).await? {
            Reply::Value(value) => Ok(Some(value)),
            Reply::NotFound => Ok(None),
            other => Err(ClientError::UnexpectedReply(other.serialize())),
        }
    }

    /// Deletes `key`. Deleting a missing key succeeds.
    pub async fn del(&self, key: &str) -> Result<(), ClientError> {
        check_key(key)?;
        let reply = self.request(Command::Del { key: key.to_string() }).await?;
        expect_ok(reply)
    }

    /// Round-trips a PING.
    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.request(Command::Ping).await? {
            Reply::Pong => Ok(()),
            other => Err(ClientError::UnexpectedReply(other.serialize())),
        }
    }

    /// Closes the current connection, if any. The client stays usable.
    pub async fn close(&self) -> Result<(), ClientError> {
        if let Some(mut stream) = self.conn.lock().await.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }

    /// Returns true if a connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }
}

async fn exchange(stream: &mut TcpStream, command: &str) -> Result<String, CodecError> {
    write_frame(stream, command).await?;
    read_frame(stream).await
}

/// Keys travel as a single space-delimited token on the request line.
fn check_key(key: &str) -> Result<(), ClientError> {
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(ClientError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn expect_ok(reply: Reply) -> Result<(), ClientError> {
    match reply {
        Reply::Ok => Ok(()),
        other => Err(ClientError::UnexpectedReply(other.serialize())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::protocol::encode;
    use crate::server::Server;
    use crate::storage::StorageEngine;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn start_server() -> String {
        let storage = Arc::new(StorageEngine::new());
        let server = Server::bind(&ServerConfig::new("127.0.0.1:0"), storage)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.run(std::future::pending()));
        addr
    }

    #[tokio::test]
    async fn test_set_get_del() {
        let addr = start_server().await;
        let client = SessionClient::connect(ClientConfig::new(addr)).await.unwrap();

        client.set("my_name", "Naato").await.unwrap();
        assert_eq!(client.get("my_name").await.unwrap(), Some("Naato".to_string()));

        client.del("my_name").await.unwrap();
        assert_eq!(client.get("my_name").await.unwrap(), None);

        // Deleting again is fine
        client.del("my_name").await.unwrap();
        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_values_with_spaces_and_markers() {
        let addr = start_server().await;
        let client = SessionClient::new(ClientConfig::new(addr));

        client.set("a", "hello wide world").await.unwrap();
        client.set("b", "-NOTFOUND").await.unwrap();

        assert_eq!(client.get("a").await.unwrap().as_deref(), Some("hello wide world"));
        assert_eq!(client.get("b").await.unwrap().as_deref(), Some("-NOTFOUND"));
    }

    #[tokio::test]
    async fn test_rejects_keys_with_whitespace() {
        let addr = start_server().await;
        let client = SessionClient::connect(ClientConfig::new(addr)).await.unwrap();

        let err = client.set("user 42", "alice").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidKey(ref k) if k == "user 42"));

        // Nothing reached the server under the first token
        assert_eq!(client.get("user").await.unwrap(), None);

        for key in ["", "tab\tkey", "line\nkey", " lead"] {
            assert!(matches!(client.get(key).await, Err(ClientError::InvalidKey(_))));
            assert!(matches!(client.del(key).await, Err(ClientError::InvalidKey(_))));
            assert!(matches!(
                client.set_with_ttl(key, "v", Duration::from_secs(5)).await,
                Err(ClientError::InvalidKey(_))
            ));
        }

        // Rejection happens before any I/O, so the connection is untouched
        assert!(client.is_connected().await);
        client.set("user_42", "alice").await.unwrap();
        assert_eq!(client.get("user_42").await.unwrap().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_set_with_ttl() {
        let addr = start_server().await;
        let client = SessionClient::new(ClientConfig::new(addr));

        client
            .set_with_ttl("session", "tok", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(client.get("session").await.unwrap().as_deref(), Some("tok"));

        // Sub-second TTLs truncate to zero, which the server refuses
        let err = client
            .set_with_ttl("session", "tok", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server(_)));
    }

    #[tokio::test]
    async fn test_server_error_keeps_connection() {
        let addr = start_server().await;
        let client = SessionClient::connect(ClientConfig::new(addr)).await.unwrap();

        let raw = client.send_request("NOPE").await.unwrap();
        assert!(raw.starts_with("-ERR"));

        let err = client.set("k", "").await.unwrap_err();
        assert!(matches!(err, ClientError::Server(_)));
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_lazy_client_dials_on_first_request() {
        let addr = start_server().await;
        let client = SessionClient::new(ClientConfig::new(addr));

        assert!(!client.is_connected().await);
        client.ping().await.unwrap();
        assert!(client.is_connected().await);

        client.close().await.unwrap();
        assert!(!client.is_connected().await);

        // Usable again after close
        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_failure() {
        // Reserve a port, then free it so nothing listens there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = SessionClient::connect(ClientConfig::new(addr))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Dial { .. }));
    }

    #[tokio::test]
    async fn test_reconnects_after_server_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            // First connection: read the request, hang up without replying
            let (mut first, _) = listener.accept().await.unwrap();
            read_frame(&mut first).await.unwrap();
            drop(first);

            // Second connection: answer normally
            let (mut second, _) = listener.accept().await.unwrap();
            assert_eq!(read_frame(&mut second).await.unwrap(), "PING");
            second.write_all(&encode("+PONG")).await.unwrap();
        });

        let client = SessionClient::connect(ClientConfig::new(addr)).await.unwrap();

        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, ClientError::Codec(_)));
        assert!(!client.is_connected().await);

        client.ping().await.unwrap();
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_connection() {
        let addr = start_server().await;
        let client = Arc::new(SessionClient::new(ClientConfig::new(addr)));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let client = Arc::clone(&client);
            tasks.push(tokio::spawn(async move {
                let key = format!("k{}", i);
                let value = format!("v{}", i);
                client.set(&key, &value).await.unwrap();
                assert_eq!(client.get(&key).await.unwrap(), Some(value));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }
}
