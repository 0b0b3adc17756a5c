//! Rate cache with a last-known-good fallback.
//!
//! Every write lands in two tiers: a short-lived *current* entry and a
//! long-lived *fallback* entry. When the upstream feed is down the quote path
//! can still price against the fallback for up to an hour.
//!
//! Expiry is checked lazily on read; [`RateCache::purge_expired`] drops dead
//! entries so memory stays bounded between reads.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::{CryptoRate, TokenSymbol};

/// Lifetime of a current entry.
pub const CURRENT_TTL_SECONDS: i64 = 30;

/// Lifetime of a fallback entry.
pub const FALLBACK_TTL_SECONDS: i64 = 3_600;

#[derive(Debug, Clone, Copy)]
struct Entry {
    rate: CryptoRate,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn live_at(&self, now: DateTime<Utc>) -> Option<CryptoRate> {
        (now <= self.expires_at).then_some(self.rate)
    }
}

#[derive(Debug, Default)]
struct Tiers {
    current: HashMap<TokenSymbol, Entry>,
    fallback: HashMap<TokenSymbol, Entry>,
}

/// Two-tier TTL cache of rates keyed by token.
#[derive(Debug)]
pub struct RateCache {
    current_ttl: Duration,
    fallback_ttl: Duration,
    tiers: RwLock<Tiers>,
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new(
            Duration::seconds(CURRENT_TTL_SECONDS),
            Duration::seconds(FALLBACK_TTL_SECONDS),
        )
    }
}

impl RateCache {
    /// Create a cache with explicit lifetimes.
    #[must_use]
    pub fn new(current_ttl: Duration, fallback_ttl: Duration) -> Self {
        Self {
            current_ttl,
            fallback_ttl,
            tiers: RwLock::new(Tiers::default()),
        }
    }

    /// Store a fresh rate in both tiers.
    pub fn set_current(&self, rate: CryptoRate) {
        self.set_current_at(rate, Utc::now());
    }

    /// Store a fresh rate in both tiers as of `now`.
    pub fn set_current_at(&self, rate: CryptoRate, now: DateTime<Utc>) {
        let mut tiers = self.write();
        tiers.current.insert(
            rate.symbol,
            Entry {
                rate,
                expires_at: now + self.current_ttl,
            },
        );
        tiers.fallback.insert(
            rate.symbol,
            Entry {
                rate,
                expires_at: now + self.fallback_ttl,
            },
        );
    }

    /// Store a rate in the fallback tier only.
    ///
    /// Used for seed and persisted rates that should be served when nothing
    /// fresher exists but must never masquerade as a live price. The entry
    /// lives for the fallback TTL counted from `rate.last_updated`; a rate
    /// already older than that is dropped and `false` returned.
    pub fn seed_fallback_at(&self, rate: CryptoRate, now: DateTime<Utc>) -> bool {
        let expires_at = rate.last_updated + self.fallback_ttl;
        if now > expires_at {
            return false;
        }
        self.write()
            .fallback
            .insert(rate.symbol, Entry { rate, expires_at });
        true
    }

    /// The current rate, if one is still live.
    #[must_use]
    pub fn get_current(&self, symbol: TokenSymbol) -> Option<CryptoRate> {
        self.get_current_at(symbol, Utc::now())
    }

    /// The current rate as of `now`.
    #[must_use]
    pub fn get_current_at(&self, symbol: TokenSymbol, now: DateTime<Utc>) -> Option<CryptoRate> {
        self.read().current.get(&symbol).and_then(|e| e.live_at(now))
    }

    /// The last-known-good rate, if one is still live.
    #[must_use]
    pub fn get_fallback(&self, symbol: TokenSymbol) -> Option<CryptoRate> {
        self.get_fallback_at(symbol, Utc::now())
    }

    /// The last-known-good rate as of `now`.
    #[must_use]
    pub fn get_fallback_at(&self, symbol: TokenSymbol, now: DateTime<Utc>) -> Option<CryptoRate> {
        self.read().fallback.get(&symbol).and_then(|e| e.live_at(now))
    }

    /// Drop both tiers for a token.
    pub fn clear(&self, symbol: TokenSymbol) {
        let mut tiers = self.write();
        tiers.current.remove(&symbol);
        tiers.fallback.remove(&symbol);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Drop every entry expired as of `now`.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut tiers = self.write();
        let before = tiers.current.len() + tiers.fallback.len();
        tiers.current.retain(|_, e| now <= e.expires_at);
        tiers.fallback.retain(|_, e| now <= e.expires_at);
        before - (tiers.current.len() + tiers.fallback.len())
    }

    /// Number of entries held across both tiers, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        let tiers = self.read();
        tiers.current.len() + tiers.fallback.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a half-written map behind:
    // every mutation is a single insert/remove/retain.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tiers> {
        self.tiers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tiers> {
        self.tiers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn btc(price: i64) -> CryptoRate {
        CryptoRate::observed_at(TokenSymbol::Btc, price, t0()).unwrap()
    }

    #[test]
    fn current_is_visible_immediately() {
        let cache = RateCache::default();
        cache.set_current_at(btc(95_420_000), t0());
        assert_eq!(cache.get_current_at(TokenSymbol::Btc, t0()), Some(btc(95_420_000)));
        assert_eq!(cache.get_current_at(TokenSymbol::Eth, t0()), None);
    }

    #[test]
    fn current_expires_before_fallback() {
        let cache = RateCache::default();
        cache.set_current_at(btc(95_420_000), t0());

        let after_short = t0() + Duration::seconds(CURRENT_TTL_SECONDS + 1);
        assert_eq!(cache.get_current_at(TokenSymbol::Btc, after_short), None);
        assert_eq!(
            cache.get_fallback_at(TokenSymbol::Btc, after_short),
            Some(btc(95_420_000))
        );

        let after_long = t0() + Duration::seconds(FALLBACK_TTL_SECONDS + 1);
        assert_eq!(cache.get_fallback_at(TokenSymbol::Btc, after_long), None);
    }

    #[test]
    fn refresh_overwrites_both_tiers() {
        let cache = RateCache::default();
        cache.set_current_at(btc(1), t0());
        cache.set_current_at(btc(2), t0() + Duration::seconds(10));
        let later = t0() + Duration::seconds(20);
        assert_eq!(cache.get_current_at(TokenSymbol::Btc, later).unwrap().price_minor, 2);
        assert_eq!(cache.get_fallback_at(TokenSymbol::Btc, later).unwrap().price_minor, 2);
    }

    #[test]
    fn seeded_rates_are_fallback_only() {
        let cache = RateCache::default();
        cache.seed_fallback_at(btc(7), t0());
        assert_eq!(cache.get_current_at(TokenSymbol::Btc, t0()), None);
        assert_eq!(cache.get_fallback_at(TokenSymbol::Btc, t0()).unwrap().price_minor, 7);
    }

    #[test]
    fn seeded_rates_age_from_their_observation() {
        let cache = RateCache::default();
        let half_way = t0() + Duration::seconds(FALLBACK_TTL_SECONDS / 2);
        assert!(cache.seed_fallback_at(btc(7), half_way));

        let past_observed_ttl = t0() + Duration::seconds(FALLBACK_TTL_SECONDS + 1);
        assert_eq!(cache.get_fallback_at(TokenSymbol::Btc, past_observed_ttl), None);

        let week_later = t0() + Duration::days(7);
        let cache = RateCache::default();
        assert!(!cache.seed_fallback_at(btc(7), week_later));
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_drops_only_dead_entries() {
        let cache = RateCache::default();
        cache.set_current_at(btc(95_420_000), t0());
        assert_eq!(cache.len(), 2);

        let removed = cache.purge_expired_at(t0() + Duration::seconds(CURRENT_TTL_SECONDS + 1));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);

        let removed = cache.purge_expired_at(t0() + Duration::seconds(FALLBACK_TTL_SECONDS + 1));
        assert_eq!(removed, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_removes_both_tiers() {
        let cache = RateCache::default();
        cache.set_current_at(btc(95_420_000), t0());
        cache.clear(TokenSymbol::Btc);
        assert_eq!(cache.get_fallback_at(TokenSymbol::Btc, t0()), None);
        assert!(cache.is_empty());
    }
}
