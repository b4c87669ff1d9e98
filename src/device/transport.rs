use async_trait::async_trait;
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use log::{debug, info};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::device::endpoint::Endpoint;
use crate::device::types::Frame;
use crate::error::LinkError;

/// Inbound frames of one connection. The stream ends when the remote end closes the connection.
pub type FrameStream = BoxStream<'static, Result<Frame, LinkError>>;

/// Opens streaming connections to a device. Dropping the returned stream closes the connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &Endpoint) -> Result<FrameStream, LinkError>;
}

#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

fn into_frame(message: Result<Message, tokio_tungstenite::tungstenite::Error>) -> Option<Result<Frame, LinkError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(data)) => Some(Ok(Frame::Binary(data.to_vec()))),
        // pings are answered by tungstenite itself
        Ok(_) => None,
        Err(err) => Some(Err(LinkError::from(err))),
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<FrameStream, LinkError> {
        debug!("Opening websocket to {}", endpoint);
        let (stream, response) = connect_async(endpoint.as_str()).await?;
        info!("Websocket handshake with {} completed ({})", endpoint, response.status());

        let frames = stream
            .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
            .filter_map(|message| future::ready(into_frame(message)))
            .boxed();

        Ok(frames)
    }
}
