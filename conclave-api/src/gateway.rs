//! Request dispatch for one signaling connection
//!
//! Transport-agnostic: the WebSocket handler feeds text frames in and sends
//! the returned replies back out. Room notifications travel separately on
//! the receiver returned by `SfuManager::connect`.

use conclave_sfu::{EndpointId, SignalingSession};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{decode_request, ErrorBody, Reply, Request};

pub struct MessageHandler {
    session: SignalingSession,
}

impl MessageHandler {
    #[must_use]
    pub fn new(session: SignalingSession) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn client_id(&self) -> &EndpointId {
        self.session.client_id()
    }

    /// Handle one text frame and produce the reply to send back
    pub async fn handle_text(&mut self, text: &str) -> Reply {
        match decode_request(text) {
            Ok((id, request)) => self.handle_request(id, request).await,
            Err(invalid) => {
                warn!(
                    client_id = %self.client_id(),
                    request_id = ?invalid.id,
                    error = %invalid.error,
                    "Rejected malformed request"
                );
                Reply::error(invalid.id, ErrorBody::from(&invalid.error))
            }
        }
    }

    pub async fn handle_request(&mut self, id: u64, request: Request) -> Reply {
        let method = request.method();
        debug!(client_id = %self.client_id(), request_id = id, method, "Handling request");

        match self.dispatch(request).await {
            Ok(data) => Reply::ok(id, data),
            Err(error) => {
                debug!(
                    client_id = %self.client_id(),
                    request_id = id,
                    method,
                    code = %error.code,
                    message = %error.message,
                    "Request failed"
                );
                Reply::error(Some(id), error)
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Value, ErrorBody> {
        let session = &mut self.session;
        match request {
            Request::Join(join) => reply_data(session.join(join.room_id)),
            Request::GetRtpCapabilities => reply_data(session.rtp_capabilities().await),
            Request::CreateTransport => reply_data(session.create_transport().await),
            Request::ConnectTransport(connect) => reply_data(
                session
                    .connect_transport(&connect.transport_id, connect.dtls_parameters)
                    .await,
            ),
            Request::Produce(produce) => reply_data(
                session
                    .produce(&produce.transport_id, produce.kind, produce.rtp_parameters)
                    .await,
            ),
            Request::Consume(consume) => reply_data(
                session
                    .consume(
                        &consume.transport_id,
                        &consume.producer_id,
                        consume.rtp_capabilities,
                    )
                    .await,
            ),
            Request::ResumeConsumer(resume) => {
                reply_data(session.resume_consumer(&resume.consumer_id).await)
            }
        }
    }

    /// Tear down the session. Safe to call more than once.
    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }
}

fn reply_data<T: Serialize>(result: conclave_sfu::Result<T>) -> Result<Value, ErrorBody> {
    let value = result.map_err(|err| ErrorBody::from(&err))?;
    serde_json::to_value(value).map_err(|e| ErrorBody::internal(format!("Failed to encode reply: {e}")))
}
