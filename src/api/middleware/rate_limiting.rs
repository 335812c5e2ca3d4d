use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::{Stream, StreamExt};
use std::{
    net::{IpAddr, SocketAddr},
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{ready, Context, Poll},
};
use tracing::warn;

use crate::api::errors::ApiError;
use crate::application::rate_limiter::{Admission, RateLimiter};

/// Admission control around the whole request lifecycle.
///
/// The concurrency slot is held until the response body has been sent (or
/// dropped), and every request and response body byte is charged to the
/// remote address. A request abandoned mid-flight is still charged for the
/// bytes it delivered.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let remote = remote_address(&request);

    let admission = match limiter.acquire(&remote) {
        Ok(admission) => admission,
        Err(e) => {
            warn!(remote = %remote, reason = %e, "request rejected by rate limiter");
            return ApiError::from(e).into_response();
        }
    };

    let received = Arc::new(AtomicU64::new(0));
    let transfer = TransferGuard {
        admission: Some(admission),
        received: Arc::clone(&received),
        sent: 0,
    };

    let (parts, body) = request.into_parts();
    let body = Body::from_stream(body.into_data_stream().inspect(move |chunk| {
        if let Ok(bytes) = chunk {
            received.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        }
    }));

    // Dropping this future mid-request drops `transfer`, which settles it
    let response = next.run(Request::from_parts(parts, body)).await;

    let (parts, body) = response.into_parts();
    let body = Body::from_stream(MeteredBody {
        inner: body.into_data_stream(),
        transfer,
    });

    Response::from_parts(parts, body)
}

/// Charges transferred bytes and frees the slot when dropped
struct TransferGuard {
    admission: Option<Admission>,
    received: Arc<AtomicU64>,
    sent: u64,
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            let total = self.received.load(Ordering::Relaxed) + self.sent;
            admission.record_transferred(total);
            admission.release();
        }
    }
}

/// Response body stream that owns the request's [`TransferGuard`]
struct MeteredBody<S> {
    inner: S,
    transfer: TransferGuard,
}

impl<S> Stream for MeteredBody<S>
where
    S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let item = ready!(self.inner.poll_next_unpin(cx));
        if let Some(Ok(bytes)) = &item {
            self.transfer.sent += bytes.len() as u64;
        }
        Poll::Ready(item)
    }
}

/// Extract the remote IP address.
///
/// The connection's peer address wins; forwarding headers are only
/// consulted when the server was started without connect info.
pub fn remote_address(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    // Try X-Forwarded-For header first (for proxies/load balancers)
    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    {
        return real_ip.to_string();
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::rate_limiter::LimiterOptions;
    use axum::{
        http::{header, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn limiter(max_connections: usize, max_requests: u64, max_bytes: u64) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(LimiterOptions {
            max_connection_per_ip: max_connections,
            max_request_per_second: max_requests,
            max_bytes_per_ip: max_bytes,
            window: Duration::from_secs(60),
        }))
    }

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/", post(|body: String| async move { body }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    }

    fn request(ip: &str, body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_counts_request_and_response_bytes() {
        let limiter = limiter(1, 100, 1024);
        let response = app(Arc::clone(&limiter))
            .oneshot(request("10.0.0.1", "hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Slot and bytes are settled once the body is consumed
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(limiter.bytes_transferred("10.0.0.1"), 10);
        assert!(limiter.acquire("10.0.0.1").is_ok());
    }

    #[tokio::test]
    async fn test_slot_held_until_response_body_dropped() {
        let limiter = limiter(1, 100, 1024);
        let response = app(Arc::clone(&limiter))
            .oneshot(request("10.0.0.2", "x"))
            .await
            .unwrap();

        let second = app(Arc::clone(&limiter))
            .oneshot(request("10.0.0.2", "y"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers().get(header::RETRY_AFTER).unwrap(), "1");

        drop(response);
        assert!(limiter.acquire("10.0.0.2").is_ok());
    }

    #[tokio::test]
    async fn test_byte_quota_rejects_later_requests() {
        let limiter = limiter(1, 100, 4);
        let response = app(Arc::clone(&limiter))
            .oneshot(request("10.0.0.3", "payload"))
            .await
            .unwrap();
        drop(response);

        let rejected = app(limiter).oneshot(request("10.0.0.3", "x")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_aborted_upload_is_charged() {
        let limiter = limiter(1, 100, 1024 * 1024);
        let (tx, rx) = tokio::sync::mpsc::channel::<Vec<u8>>(4);
        let body = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|chunk| (Ok::<_, std::io::Error>(chunk), rx))
        });
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("x-forwarded-for", "10.0.0.4")
            .body(Body::from_stream(body))
            .unwrap();

        let in_flight = tokio::spawn(app(Arc::clone(&limiter)).oneshot(request));
        tx.send(vec![b'x'; 1000]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The slot is still held while the body is streaming
        assert!(limiter.acquire("10.0.0.4").is_err());

        in_flight.abort();
        assert!(in_flight.await.unwrap_err().is_cancelled());

        assert_eq!(limiter.bytes_transferred("10.0.0.4"), 1000);
        assert!(limiter.acquire("10.0.0.4").is_ok());
        drop(tx);
    }

    #[tokio::test]
    async fn test_unread_response_keeps_slot_and_charges_on_drop() {
        let limiter = limiter(1, 100, 1024);
        let response = app(Arc::clone(&limiter))
            .oneshot(request("10.0.0.5", "hello world"))
            .await
            .unwrap();

        assert!(limiter.acquire("10.0.0.5").is_err());
        assert_eq!(limiter.bytes_transferred("10.0.0.5"), 0);

        drop(response);
        assert_eq!(limiter.bytes_transferred("10.0.0.5"), 11);
        assert!(limiter.acquire("10.0.0.5").is_ok());
    }

    #[test]
    fn test_remote_address_prefers_connect_info() {
        let mut request = request("10.0.0.9", "");
        request
            .extensions_mut()
            .insert(ConnectInfo("192.168.0.7:4711".parse::<SocketAddr>().unwrap()));

        assert_eq!(remote_address(&request), "192.168.0.7");
    }

    #[test]
    fn test_remote_address_fallbacks() {
        let forwarded = Request::builder()
            .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(remote_address(&forwarded), "203.0.113.5");

        let real_ip = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(remote_address(&real_ip), "198.51.100.2");

        assert_eq!(remote_address(&Request::default()), "unknown");
    }
}
