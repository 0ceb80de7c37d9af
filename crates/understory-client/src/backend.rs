//! WebSocket link to the analysis backend

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::protocol::{decode_event, encode_request, OutboundRequest};
use crate::transport::{ChannelTransport, TransportError};

/// Connect to `url`. Text frames from the backend are decoded and published
/// on `bus`; requests sent through the returned transport are written to
/// the socket. The handle completes when either direction closes.
pub async fn connect(
    url: &str,
    bus: Arc<EventBus>,
) -> Result<(ChannelTransport, JoinHandle<()>), TransportError> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(format!("Failed to connect to {url}: {e}")))?;
    info!("Connected to analysis backend at {}", url);

    let (transport, requests) = ChannelTransport::new();
    let (sink, stream) = ws_stream.split();

    let handle = tokio::spawn(async move {
        let mut send_task = tokio::spawn(write_requests(sink, requests));
        let mut recv_task = tokio::spawn(read_events(stream, bus));

        tokio::select! {
            _ = (&mut send_task) => {
                recv_task.abort();
            }
            _ = (&mut recv_task) => {
                send_task.abort();
            }
        }
        info!("Backend connection closed");
    });

    Ok((transport, handle))
}

async fn write_requests<S>(mut sink: S, mut requests: mpsc::UnboundedReceiver<OutboundRequest>)
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(request) = requests.recv().await {
        let text = match encode_request(&request) {
            Ok(text) => text,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            warn!("Failed to write request to backend: {}", e);
            break;
        }
    }
}

async fn read_events<S, E>(mut stream: S, bus: Arc<EventBus>)
where
    S: futures_util::Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode_event(&text) {
                Ok(event) => {
                    debug!("Backend event: {:?}", event.kind());
                    bus.publish(event);
                }
                Err(e) => warn!("{}", e),
            },
            Ok(Message::Close(_)) => {
                debug!("Backend closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Backend connection error: {}", e);
                break;
            }
        }
    }
}
