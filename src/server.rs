/*!
 * Network Front End
 *
 * Newline-delimited JSON over TCP. Every connection gets its own address
 * space and client, so payloads still cross the validated boundary exactly
 * as a local caller's would.
 */

use crate::client::DictClient;
use crate::core::config::ServerConfig;
use crate::core::errors::{DictError, Status};
use crate::core::types::{Generation, Tag, ValueType};
use crate::ioctl::IoctlDispatcher;
use crate::store::{SetOutcome, SharedStore, StoreStats};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

fn default_tag() -> Tag {
    ValueType::Char.tag()
}

/// One request line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WireRequest {
    Set {
        key: Vec<u8>,
        #[serde(default = "default_tag")]
        key_type: Tag,
        value: Vec<u8>,
        #[serde(default = "default_tag")]
        value_type: Tag,
    },
    Get {
        key: Vec<u8>,
        #[serde(default = "default_tag")]
        key_type: Tag,
    },
    GetSize {
        key: Vec<u8>,
        #[serde(default = "default_tag")]
        key_type: Tag,
    },
    GetType {
        key: Vec<u8>,
        #[serde(default = "default_tag")]
        key_type: Tag,
    },
    Info {
        key: Vec<u8>,
        #[serde(default = "default_tag")]
        key_type: Tag,
    },
    Delete {
        key: Vec<u8>,
        #[serde(default = "default_tag")]
        key_type: Tag,
    },
    Stats,
}

/// One response line; only the fields relevant to the request are present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SetOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Generation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StoreStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WireResponse {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            outcome: None,
            value: None,
            value_type: None,
            value_size: None,
            token: None,
            removed: None,
            stats: None,
            message: None,
        }
    }

    pub fn error(error: &DictError) -> Self {
        Self {
            status: error.status(),
            message: Some(error.to_string()),
            ..Self::ok()
        }
    }
}

/// Parse and execute one request line
pub fn handle_line(client: &DictClient, line: &str) -> WireResponse {
    let request: WireRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "malformed request line");
            return WireResponse::error(&DictError::invalid_argument(format!(
                "malformed request: {}",
                e
            )));
        }
    };

    let result = match request {
        WireRequest::Set {
            key,
            key_type,
            value,
            value_type,
        } => client
            .set(&key, key_type, &value, value_type)
            .map(|outcome| WireResponse {
                outcome: Some(outcome),
                ..WireResponse::ok()
            }),
        WireRequest::Get { key, key_type } => client.get(&key, key_type).map(|value| {
            WireResponse {
                value_size: Some(value.bytes.len()),
                value: Some(value.bytes),
                value_type: Some(value.value_type),
                ..WireResponse::ok()
            }
        }),
        WireRequest::GetSize { key, key_type } => {
            client
                .get_size(&key, key_type)
                .map(|value_size| WireResponse {
                    value_size: Some(value_size),
                    ..WireResponse::ok()
                })
        }
        WireRequest::GetType { key, key_type } => {
            client
                .get_type(&key, key_type)
                .map(|value_type| WireResponse {
                    value_type: Some(value_type),
                    ..WireResponse::ok()
                })
        }
        WireRequest::Info { key, key_type } => client.info(&key, key_type).map(|info| {
            WireResponse {
                value_size: Some(info.value_size),
                value_type: Some(info.value_type),
                token: Some(info.token),
                ..WireResponse::ok()
            }
        }),
        WireRequest::Delete { key, key_type } => {
            client.delete(&key, key_type).map(|removed| WireResponse {
                removed: Some(removed),
                ..WireResponse::ok()
            })
        }
        WireRequest::Stats => Ok(WireResponse {
            stats: Some(client.dispatcher().store().stats()),
            ..WireResponse::ok()
        }),
    };

    result.unwrap_or_else(|error| WireResponse::error(&error))
}

/// Accept connections until `shutdown` resolves
///
/// Open connections are then told to close and drained, so no request is
/// still running against the store once this returns.
pub async fn serve<F>(
    listener: TcpListener,
    store: SharedStore,
    config: ServerConfig,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    let dispatcher = IoctlDispatcher::new(store);
    let (closing_tx, closing_rx) = watch::channel(false);
    let mut connections = JoinSet::new();
    info!(addr = %listener.local_addr()?, "kdict server listening");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting connections");
                break;
            }
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                log_join(joined);
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let dispatcher = dispatcher.clone();
                    let max_frame = config.max_frame_size;
                    let closing = closing_rx.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, dispatcher, max_frame, closing).await {
                            warn!(%peer, error = %e, "connection failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    let _ = closing_tx.send(true);
    let open = connections.len();
    if open > 0 {
        info!(open, "draining open connections");
    }
    while let Some(joined) = connections.join_next().await {
        log_join(joined);
    }

    Ok(())
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "connection task aborted");
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: IoctlDispatcher,
    max_frame: usize,
    mut closing: watch::Receiver<bool>,
) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let client = DictClient::new(dispatcher);
    let mut frame = Vec::new();

    debug!(%peer, "connection opened");
    loop {
        if *closing.borrow() {
            debug!(%peer, "closing connection for shutdown");
            break;
        }

        frame.clear();
        let mut limited = (&mut reader).take(max_frame as u64 + 1);
        let read = tokio::select! {
            read = limited.read_until(b'\n', &mut frame) => read?,
            changed = closing.changed() => match changed {
                Ok(()) => continue,
                Err(_) => break,
            },
        };
        if read == 0 {
            break;
        }

        if frame.last() != Some(&b'\n') && frame.len() > max_frame {
            warn!(%peer, max_frame, "oversized frame rejected");
            discard_line(&mut reader, &mut frame, max_frame).await?;
            let error = DictError::invalid_argument(format!("frame exceeds {} bytes", max_frame));
            write_response(&mut write_half, &WireResponse::error(&error)).await?;
            continue;
        }

        let line = String::from_utf8_lossy(&frame);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(&client, line);
        write_response(&mut write_half, &response).await?;
    }
    debug!(%peer, "connection closed");

    Ok(())
}

/// Skip the remainder of an oversized line without buffering it
async fn discard_line(
    reader: &mut BufReader<OwnedReadHalf>,
    scratch: &mut Vec<u8>,
    chunk: usize,
) -> io::Result<()> {
    loop {
        scratch.clear();
        let read = (&mut *reader)
            .take(chunk.max(1) as u64)
            .read_until(b'\n', scratch)
            .await?;
        if read == 0 || scratch.last() == Some(&b'\n') {
            return Ok(());
        }
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &WireResponse) -> io::Result<()> {
    let mut bytes = serde_json::to_vec(response)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StoreConfig;
    use crate::store::DictStore;
    use pretty_assertions::assert_eq;

    fn client() -> DictClient {
        DictClient::new(IoctlDispatcher::new(
            DictStore::create(StoreConfig::default()).unwrap(),
        ))
    }

    #[test]
    fn test_set_then_get_line() {
        let c = client();
        let set = handle_line(&c, r#"{"op":"set","key":[107],"value":[1,2,3],"value_type":1}"#);
        assert_eq!(set.status, Status::Ok);
        assert_eq!(set.outcome, Some(SetOutcome::Inserted));

        let get = handle_line(&c, r#"{"op":"get","key":[107]}"#);
        assert_eq!(get.status, Status::Ok);
        assert_eq!(get.value, Some(vec![1, 2, 3]));
        assert_eq!(get.value_type, Some(1));
        assert_eq!(get.value_size, Some(3));
    }

    #[test]
    fn test_largest_set_fits_default_frame() {
        use crate::core::limits::{MAX_FRAME_SIZE, MAX_KEY_SIZE, MAX_VALUE_SIZE};

        let request = WireRequest::Set {
            key: vec![255; MAX_KEY_SIZE],
            key_type: 255,
            value: vec![255; MAX_VALUE_SIZE],
            value_type: 255,
        };
        let line = serde_json::to_vec(&request).unwrap();
        assert!(line.len() + 1 <= MAX_FRAME_SIZE);
    }

    #[test]
    fn test_malformed_line() {
        let c = client();
        let response = handle_line(&c, "{not json");
        assert_eq!(response.status, Status::InvalidArgument);
        assert!(response.message.is_some());
    }

    #[test]
    fn test_error_serialization_omits_empty_fields() {
        let response = WireResponse::error(&DictError::not_found("no such key"));
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"status":"not_found","message":"Key not found: no such key"}"#
        );
    }
}
