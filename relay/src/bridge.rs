use doacore::relay::{Session, SubscriberRegistry};
use doacore::telemetry::MetricsSnapshot;
use futures::stream::{self, StreamExt};
use log::{info, warn};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use warp::http::header::{HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use warp::http::Response;
use warp::hyper::Body;
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Serialize)]
struct StatsReply {
    subscribers: usize,
    #[serde(flatten)]
    counters: MetricsSnapshot,
}

/// All viewer-facing routes: `/`, `/events` and `/stats`.
pub fn routes(
    registry: Arc<SubscriberRegistry>,
    keepalive: Duration,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let registry_filter = warp::any().map(move || registry.clone());

    let index_route = warp::path::end().and(warp::get()).map(|| {
        warp::reply::with_header(warp::reply::html(INDEX_HTML), "cache-control", "no-store")
    });

    let events_route = warp::path("events")
        .and(warp::path::end())
        .and(warp::get())
        .and(registry_filter.clone())
        .map(move |registry: Arc<SubscriberRegistry>| event_stream(&registry, keepalive));

    let stats_route = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(registry_filter)
        .map(|registry: Arc<SubscriberRegistry>| {
            let reply = StatsReply {
                subscribers: registry.len(),
                counters: registry.metrics().snapshot(),
            };
            warp::reply::with_header(warp::reply::json(&reply), "cache-control", "no-store")
        });

    index_route.or(events_route).or(stats_route)
}

/// Opens a session and streams its frames until the viewer goes away or the
/// registry evicts it. Hyper drops the body on disconnect, which drops the
/// session and releases its registry slot.
fn event_stream(registry: &Arc<SubscriberRegistry>, keepalive: Duration) -> Response<Body> {
    let session = Session::open(registry, keepalive);
    info!("viewer session {} opened", session.id());

    let frames = stream::unfold(session, |mut session| async move {
        let frame = session.next_frame().await?;
        Some((frame, session))
    })
    .filter_map(|frame| async move {
        match frame.encode() {
            Ok(text) => Some(Ok::<_, Infallible>(text)),
            Err(err) => {
                warn!("dropping unencodable frame: {}", err);
                None
            }
        }
    });

    let mut response = Response::new(Body::wrap_stream(frames));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
