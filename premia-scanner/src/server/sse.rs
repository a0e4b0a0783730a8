use std::convert::Infallible;

use actix_web::HttpResponse;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

/// `event: <name>\ndata: <json>\n\n`
pub fn frame<T: Serialize + ?Sized>(event: &str, data: &T) -> Bytes {
    let data = serde_json::to_string(data).unwrap_or_else(|error| {
        warn!(event, error = %error, "failed to serialise event payload");
        "null".to_string()
    });
    Bytes::from(format!("event: {event}\ndata: {data}\n\n"))
}

pub fn comment(text: &str) -> Bytes {
    Bytes::from(format!(": {text}\n\n"))
}

/// Event stream response fed by `rx`. The stream ends once every sender is dropped.
pub fn response(rx: mpsc::UnboundedReceiver<Bytes>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>))
}
