use std::{
    env,
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use tracing::{debug, instrument, warn};

/// Per-client allowance for game creation, refilled on a fixed interval.
#[derive(Debug)]
pub struct TokenBucket {
    last_refill: Instant,
    tokens: u32,
    capacity: u32,
    refill_rate: u32,
    refill_interval: Duration,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: u32, refill_interval: Duration) -> Self {
        debug!(
            "Creating new token bucket: capacity={}, refill_rate={}, interval={}s",
            capacity,
            refill_rate,
            refill_interval.as_secs()
        );
        Self {
            last_refill: Instant::now(),
            tokens: capacity,
            capacity,
            refill_rate,
            refill_interval,
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill(Instant::now());
        if self.tokens > 0 {
            self.tokens -= 1;
            debug!("Token consumed, remaining: {}", self.tokens);
            true
        } else {
            debug!("No tokens available for consumption");
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let interval = self.refill_interval.as_secs().max(1);
        let intervals = now.duration_since(self.last_refill).as_secs() / interval;

        if intervals > 0 {
            let old_tokens = self.tokens;
            let tokens_to_add = (intervals as u32).saturating_mul(self.refill_rate);
            self.tokens = self.tokens.saturating_add(tokens_to_add).min(self.capacity);
            self.last_refill = now;
            if self.tokens != old_tokens {
                debug!(
                    "Token bucket refilled: {} -> {} tokens",
                    old_tokens, self.tokens
                );
            }
        }
    }

    fn is_full(&self) -> bool {
        self.tokens >= self.capacity
    }
}

pub type RateLimiter = Arc<DashMap<IpAddr, TokenBucket>>;

pub fn create_rate_limiter() -> RateLimiter {
    Arc::new(DashMap::new())
}

/// Forgets clients whose bucket has refilled completely by `now`. A full
/// bucket is indistinguishable from a client never seen before.
pub fn prune_idle_buckets(rate_limiter: &RateLimiter, now: Instant) -> usize {
    let before = rate_limiter.len();
    rate_limiter.retain(|_, bucket| {
        bucket.refill(now);
        !bucket.is_full()
    });
    let pruned = before.saturating_sub(rate_limiter.len());
    if pruned > 0 {
        debug!("Pruned {} idle rate limit buckets", pruned);
    }
    pruned
}

/// Caller address, preferring proxy headers over the socket peer.
pub struct ClientIp(pub IpAddr);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|header| header.split(',').next())
            .and_then(|ip| ip.trim().parse().ok())
            .or_else(|| {
                req.headers()
                    .get_one("X-Real-IP")
                    .and_then(|ip| ip.parse().ok())
            })
            .or_else(|| req.client_ip());

        match ip {
            Some(ip) => request::Outcome::Success(ClientIp(ip)),
            None => {
                warn!("Could not determine client address");
                request::Outcome::Error((Status::BadRequest, ()))
            }
        }
    }
}

#[instrument(level = "trace", skip(rate_limiter))]
pub fn check_rate_limit(rate_limiter: &RateLimiter, ip: &IpAddr) -> Result<(), Status> {
    let capacity: u32 = env::var("RATE_LIMIT_GAMES_PER_MINUTE")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);

    let refill_interval = Duration::from_secs(60);
    let refill_rate = capacity;

    let mut entry = rate_limiter
        .entry(*ip)
        .or_insert_with(|| TokenBucket::new(capacity, refill_rate, refill_interval));

    if entry.try_consume() {
        debug!("Rate limit check passed for {}", ip);
        Ok(())
    } else {
        warn!("Rate limit exceeded for {} - rejecting request", ip);
        Err(Status::TooManyRequests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_drains_and_refills_per_interval() {
        let mut bucket = TokenBucket::new(2, 2, Duration::from_secs(60));
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());

        let later = bucket.last_refill + Duration::from_secs(61);
        bucket.refill(later);
        assert_eq!(bucket.tokens, 2);

        bucket.refill(later + Duration::from_secs(600));
        assert_eq!(bucket.tokens, 2);
    }

    #[test]
    fn idle_buckets_are_pruned_once_refilled() {
        let limiter = create_rate_limiter();
        let now = Instant::now();
        for index in 0..5000u32 {
            let ip = IpAddr::from(index.to_be_bytes());
            assert!(check_rate_limit(&limiter, &ip).is_ok());
        }
        let untouched: IpAddr = "192.168.1.1".parse().unwrap();
        limiter.insert(untouched, TokenBucket::new(10, 10, Duration::from_secs(60)));

        assert_eq!(prune_idle_buckets(&limiter, now), 1);
        assert_eq!(limiter.len(), 5000);

        assert_eq!(prune_idle_buckets(&limiter, now + Duration::from_secs(61)), 5000);
        assert!(limiter.is_empty());
    }

    #[test]
    fn limiter_tracks_clients_separately() {
        let limiter = create_rate_limiter();
        let first: IpAddr = "10.0.0.1".parse().unwrap();
        let second: IpAddr = "10.0.0.2".parse().unwrap();

        for _ in 0..10 {
            assert!(check_rate_limit(&limiter, &first).is_ok());
        }
        assert_eq!(check_rate_limit(&limiter, &first), Err(Status::TooManyRequests));
        assert!(check_rate_limit(&limiter, &second).is_ok());
    }
}
