//! Freshness decisions for stored entries
//!
//! [`evaluate`] is a pure function of the entry, the current time and the
//! new request's directives.

use std::time::{Duration, SystemTime};

use super::cache_control::CacheControl;
use super::cache_entry::CacheEntry;

/// What the cache may do with a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve without contacting the origin
    Fresh { age: Duration },
    /// Stale, but the request tolerates it through `max-stale`
    StaleAcceptable { age: Duration },
    /// Stale or revalidation forced, and validators allow a conditional request
    StaleRevalidatable { age: Duration },
    /// Nothing to validate with; fetch in full
    Unusable,
}

impl Freshness {
    #[must_use]
    pub fn is_servable(&self) -> bool {
        matches!(self, Freshness::Fresh { .. } | Freshness::StaleAcceptable { .. })
    }
}

/// Classify `entry` for a request carrying `request` directives
///
/// Request `no-cache`, `max-age=0` (or an unreadable `max-age`) and a
/// response `no-cache` force revalidation. Otherwise the entry is fresh
/// while its age is below the stored lifetime, within the request's
/// `max-age` and with `min-fresh` still to go. A stale entry may still be
/// served under `max-stale` unless the response demands revalidation.
#[must_use]
pub fn evaluate(
    entry: &CacheEntry,
    now: SystemTime,
    request: &CacheControl,
    shared: bool,
) -> Freshness {
    let age = entry.current_age(now);
    let lifetime = entry.freshness_lifetime();
    let response = entry.directives();

    let forced = request.no_cache
        || request.max_age == Some(Duration::ZERO)
        || request.has_malformed("max-age")
        || response.no_cache;
    if forced {
        return revalidate_or_refetch(entry, age);
    }

    let within_request_max_age = request.max_age.is_none_or(|max_age| age <= max_age);
    let within_min_fresh = request
        .min_fresh
        .is_none_or(|min_fresh| age + min_fresh <= lifetime);

    if age < lifetime && within_request_max_age && within_min_fresh {
        return Freshness::Fresh { age };
    }

    let must_revalidate = response.must_revalidate || (shared && response.proxy_revalidate);
    if age >= lifetime && within_request_max_age && !must_revalidate {
        let staleness = age - lifetime;
        let tolerated = match request.max_stale {
            Some(None) => true,
            Some(Some(limit)) => staleness <= limit,
            None => false,
        };
        if tolerated {
            return Freshness::StaleAcceptable { age };
        }
    }

    revalidate_or_refetch(entry, age)
}

/// Whether a stale entry may cover for a failed transport
#[must_use]
pub fn allows_stale_on_error(entry: &CacheEntry, shared: bool) -> bool {
    let response = entry.directives();
    !(response.must_revalidate || response.no_cache || (shared && response.proxy_revalidate))
}

fn revalidate_or_refetch(entry: &CacheEntry, age: Duration) -> Freshness {
    if entry.has_validators() {
        Freshness::StaleRevalidatable { age }
    } else {
        Freshness::Unusable
    }
}
