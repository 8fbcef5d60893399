//! IP geolocation
//!
//! Turns a client-supplied IP string into a coarse [`Location`]. Input that
//! is not an IP literal is not an error: it resolves to nothing and the
//! caller matches on empty location fields. Dataset faults are returned to
//! the caller of that one lookup.

pub mod maxmind;

use maxminddb::{geoip2, MaxMindDbError};
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::models::Location;

pub use maxmind::MaxMindLookup;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("failed to open geolocation database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: MaxMindDbError,
    },
    #[error("geolocation lookup failed for {ip}: {source}")]
    Lookup {
        ip: IpAddr,
        #[source]
        source: MaxMindDbError,
    },
}

pub type GeoResult<T> = Result<T, GeoError>;

/// Point lookup against a read-only geolocation dataset.
pub trait GeoLookup: Send + Sync {
    /// Returns `Ok(None)` when the dataset has no entry for `ip`.
    fn lookup(&self, ip: IpAddr) -> GeoResult<Option<Location>>;
}

/// Flatten a GeoIP2 City record into a [`Location`] using English names.
///
/// The state is taken from the first (largest) subdivision. Records without
/// any subdivision, or without an English name, yield empty fields.
pub fn location_from_city(city: &geoip2::City<'_>) -> Location {
    Location {
        city: english(city.city.names.english),
        state: english(
            city.subdivisions
                .first()
                .and_then(|subdivision| subdivision.names.english),
        ),
        country: english(city.country.names.english),
    }
}

fn english(name: Option<&str>) -> String {
    name.map(str::to_string).unwrap_or_default()
}

/// Resolves raw IP strings through an injected [`GeoLookup`].
#[derive(Clone)]
pub struct GeoResolver {
    lookup: Arc<dyn GeoLookup>,
}

impl GeoResolver {
    pub fn new(lookup: Arc<dyn GeoLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve `ip` to a location.
    ///
    /// `Ok(None)` means unresolved: either `ip` is not an IPv4/IPv6 literal
    /// or the dataset has no entry for it.
    pub fn resolve(&self, ip: &str) -> GeoResult<Option<Location>> {
        let addr = match ip.parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                debug!(ip, "not an IP literal, leaving location unresolved");
                return Ok(None);
            }
        };

        self.lookup.lookup(addr)
    }
}
