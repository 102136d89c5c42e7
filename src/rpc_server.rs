use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use futures::Future;
use prost::Message;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::{
    dto::{MetricName, MetricReading},
    poll_service::{PollError, PollService, ReadingSink, SendError},
    proto::telemetry::TelemetryDatum,
};

pub const POLL_ONCE_PATH: &str = "/telemetry.Telemetry/PollOnce";
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

type Frame = Result<Vec<u8>, PollError>;

/// Feeds length-delimited `TelemetryDatum` frames into a response body.
struct FrameSink(mpsc::Sender<Frame>);

impl ReadingSink for FrameSink {
    async fn send(&mut self, reading: MetricReading) -> Result<(), SendError> {
        let frame = TelemetryDatum::from(reading).encode_length_delimited_to_vec();
        self.0
            .send(Ok(frame))
            .await
            .map_err(|_| SendError("response body dropped".into()))
    }
}

async fn poll_once(State(service): State<Arc<PollService>>) -> impl IntoResponse {
    let (sender, receiver) = mpsc::channel::<Frame>(MetricName::ORDER.len());

    tokio::spawn(async move {
        let mut sink = FrameSink(sender);
        match service.poll_once(&mut sink).await {
            Ok(sent) => debug!("PollOnce sent {} readings", sent),
            Err(err) => {
                error!("PollOnce failed: {}", err);
                // Aborts the body so the caller sees a failed stream rather
                // than a short one.
                let _ = sink.0.send(Err(err)).await;
            }
        }
    });

    (
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        Body::from_stream(ReceiverStream::new(receiver)),
    )
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 Not Found")
}

pub fn router(service: Arc<PollService>) -> Router {
    Router::new()
        .route(POLL_ONCE_PATH, post(poll_once))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn bind(rpc_addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(rpc_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serves until `shutdown` resolves, then lets in-flight streams finish
/// before returning.
pub async fn start_server<F>(
    listener: TcpListener,
    service: Arc<PollService>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("RPC server is running");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("RPC server stopped");
    Ok(())
}
