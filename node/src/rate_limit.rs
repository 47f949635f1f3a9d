// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Fixed-window rate limiting per client.
//!
//! The client key is the first `x-forwarded-for` hop, else the socket peer,
//! else one shared `anonymous` bucket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;

use crate::errors::LoopError;

const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateLimiter {
    /// `max_requests == 0` admits everything.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Admission {
        if self.max_requests == 0 {
            return Admission::Allowed { remaining: u32::MAX };
        }

        let mut windows = self.windows.lock();
        if windows.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return Admission::Limited { retry_after };
        }

        entry.count += 1;
        Admission::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }
}

/// Middleware: admit or reject with 429 and `retry-after`.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, LoopError> {
    let key = client_key(request.headers(), request.extensions().get::<ConnectInfo<SocketAddr>>());

    match limiter.check(&key) {
        Admission::Limited { retry_after } => {
            tracing::debug!(client = %key, "Rate limit exceeded");
            Err(LoopError::RateLimited { retry_after })
        }
        Admission::Allowed { remaining } => {
            let mut response = next.run(request).await;
            if limiter.max_requests > 0 {
                let headers = response.headers_mut();
                headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.max_requests));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            }
            Ok(response)
        }
    }
}

fn client_key(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(ConnectInfo(addr))) => addr.ip().to_string(),
        (None, None) => "anonymous".to_string(),
    }
}
