use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::warn;

use super::session::SessionContext;
use crate::error::ApiError;
use crate::state::AppState;

pub const RECIPE_LIMIT_MESSAGE: &str = "Too many recipes submitted. Please wait before trying again.";

/// Key count above which idle keys are swept on the next check
const PRUNE_THRESHOLD: usize = 10_000;

/// Sliding-window log: at most `limit` admitted requests per key in any `window`.
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            hits: DashMap::new(),
        }
    }

    /// Admits and records a request, or returns how long until the oldest hit leaves the window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let outcome = self.check_at(key, now);
        if self.hits.len() > PRUNE_THRESHOLD {
            let dropped = self.prune_idle(now);
            tracing::debug!("Pruned {} idle rate limit keys", dropped);
        }
        outcome
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut entry = self.hits.entry(key.to_string()).or_default();
        while let Some(&oldest) = entry.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() >= self.limit {
            let retry_after = entry
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }

        entry.push_back(now);
        Ok(())
    }

    /// Drops keys whose every hit has aged out of the window.
    pub fn prune_idle(&self, now: Instant) -> usize {
        let before = self.hits.len();
        self.hits.retain(|_, hits| {
            hits.back()
                .map(|last| now.saturating_duration_since(*last) < self.window)
                .unwrap_or(false)
        });
        before - self.hits.len()
    }
}

/// Keys recipe submissions by session username, falling back to the client address.
pub async fn recipe_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.api.enable_rate_limiting {
        return next.run(request).await;
    }

    let key = request
        .extensions()
        .get::<SessionContext>()
        .and_then(|session| session.username.clone())
        .map(|username| format!("user:{}", username))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        })
        .unwrap_or_else(|| "ip:unknown".to_string());

    if let Err(retry_after) = state.create_limiter.check(&key) {
        warn!("Recipe creation rate limit hit for {}", key);
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        return ApiError::too_many_requests(RECIPE_LIMIT_MESSAGE, Some(secs.max(1))).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_within_window() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("bob", start).is_ok());
        assert!(limiter.check_at("bob", start + Duration::from_secs(10)).is_ok());

        let retry = limiter
            .check_at("bob", start + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(40));

        // Other keys are unaffected
        assert!(limiter.check_at("alice", start + Duration::from_secs(20)).is_ok());
    }

    #[test]
    fn window_slides_per_hit() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check_at("bob", start).unwrap();
        limiter.check_at("bob", start + Duration::from_secs(30)).unwrap();

        // First hit has aged out, second has not
        assert!(limiter.check_at("bob", start + Duration::from_secs(60)).is_ok());
        assert!(limiter.check_at("bob", start + Duration::from_secs(61)).is_err());
        assert!(limiter.check_at("bob", start + Duration::from_secs(90)).is_ok());
    }

    #[test]
    fn rejected_attempts_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check_at("bob", start).unwrap();
        for secs in 1..30 {
            assert!(limiter.check_at("bob", start + Duration::from_secs(secs)).is_err());
        }
        assert!(limiter.check_at("bob", start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn prune_idle_drops_stale_keys() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check_at("old", start).unwrap();
        limiter.check_at("fresh", start + Duration::from_secs(50)).unwrap();

        assert_eq!(limiter.prune_idle(start + Duration::from_secs(70)), 1);
        assert!(limiter.hits.contains_key("fresh"));
    }
}
