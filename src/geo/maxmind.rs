//! City lookups against a memory-mapped MaxMind GeoLite2/GeoIP2 database

use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use super::{location_from_city, GeoError, GeoLookup, GeoResult};
use crate::models::Location;

/// Thread-safe reader over a City `.mmdb` file.
///
/// The file is mapped once at startup and shared read-only; clones share
/// the same mapping.
#[derive(Clone)]
pub struct MaxMindLookup {
    reader: Arc<Reader<Mmap>>,
}

impl MaxMindLookup {
    /// Open a GeoLite2-City or GeoIP2-City database.
    pub fn open(path: impl AsRef<Path>) -> GeoResult<Self> {
        let path = path.as_ref();
        let reader = unsafe { Reader::open_mmap(path) }.map_err(|source| GeoError::Open {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            reader: Arc::new(reader),
        })
    }
}

impl GeoLookup for MaxMindLookup {
    fn lookup(&self, ip: IpAddr) -> GeoResult<Option<Location>> {
        let result = self
            .reader
            .lookup(ip)
            .map_err(|source| GeoError::Lookup { ip, source })?;

        let record = result
            .decode::<geoip2::City>()
            .map_err(|source| GeoError::Lookup { ip, source })?;

        Ok(record.as_ref().map(location_from_city))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // Minimal MMDB writer for a four-network IPv4 City database:
    //   0.0.0.0/2   London, England, United Kingdom
    //   64.0.0.0/2  Oslo, Norway (no subdivision)
    //   128.0.0.0/2 a bare string where a City map is expected
    //   192.0.0.0/2 no data
    const NODE_COUNT: u32 = 3;

    fn string(value: &str) -> Vec<u8> {
        assert!(value.len() < 29);
        let mut out = vec![0x40 | value.len() as u8];
        out.extend_from_slice(value.as_bytes());
        out
    }

    fn uint(type_bits: u8, value: u64, width: usize) -> Vec<u8> {
        let bytes = value.to_be_bytes();
        let mut out = vec![type_bits | width as u8];
        out.extend_from_slice(&bytes[8 - width..]);
        out
    }

    fn uint64(value: u64) -> Vec<u8> {
        let mut out = vec![8, 0x02];
        out.extend_from_slice(&value.to_be_bytes());
        out
    }

    fn array(items: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![items.len() as u8, 0x04];
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }

    fn map(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![0xE0 | entries.len() as u8];
        for (key, value) in entries {
            out.extend(string(key));
            out.extend_from_slice(value);
        }
        out
    }

    fn names(english: &str) -> Vec<u8> {
        map(&[("names", map(&[("de", string("x")), ("en", string(english))]))])
    }

    fn record_bytes(left: u32, right: u32) -> Vec<u8> {
        let mut out = left.to_be_bytes()[1..].to_vec();
        out.extend_from_slice(&right.to_be_bytes()[1..]);
        out
    }

    fn city_database() -> Vec<u8> {
        let london = map(&[
            ("city", names("London")),
            ("country", names("United Kingdom")),
            ("subdivisions", array(&[names("England"), names("Greater London")])),
        ]);
        let oslo = map(&[("city", names("Oslo")), ("country", names("Norway"))]);
        let corrupt = string("corrupt");

        let pointer = |offset: usize| NODE_COUNT + 16 + offset as u32;
        let london_at = 0;
        let oslo_at = london.len();
        let corrupt_at = oslo_at + oslo.len();

        let mut db = Vec::new();
        db.extend(record_bytes(1, 2));
        db.extend(record_bytes(pointer(london_at), pointer(oslo_at)));
        db.extend(record_bytes(pointer(corrupt_at), NODE_COUNT));
        db.extend([0u8; 16]);
        db.extend(london);
        db.extend(oslo);
        db.extend(corrupt);

        db.extend_from_slice(b"\xab\xcd\xefMaxMind.com");
        db.extend(map(&[
            ("binary_format_major_version", uint(0xA0, 2, 2)),
            ("binary_format_minor_version", uint(0xA0, 0, 2)),
            ("build_epoch", uint64(1_700_000_000)),
            ("database_type", string("GeoLite2-City")),
            ("description", map(&[("en", string("visitor-id test"))])),
            ("ip_version", uint(0xA0, 4, 2)),
            ("languages", array(&[string("en")])),
            ("node_count", uint(0xC0, NODE_COUNT as u64, 4)),
            ("record_size", uint(0xA0, 24, 2)),
        ]));
        db
    }

    /// Database file removed when dropped
    struct TempDatabase(PathBuf);

    impl TempDatabase {
        fn write(bytes: &[u8]) -> Self {
            let path = std::env::temp_dir().join(format!(
                "visitor-id-{}.mmdb",
                uuid::Uuid::new_v4().simple()
            ));
            std::fs::write(&path, bytes).unwrap();
            Self(path)
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_open_invalid_path() {
        let result = MaxMindLookup::open("/nonexistent/GeoLite2-City.mmdb");
        match result {
            Err(GeoError::Open { path, .. }) => {
                assert_eq!(path, "/nonexistent/GeoLite2-City.mmdb");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opening a missing database should fail"),
        }
    }

    #[test]
    fn test_open_rejects_file_without_metadata() {
        let file = TempDatabase::write(b"definitely not a maxmind database");
        assert!(matches!(
            MaxMindLookup::open(&file.0),
            Err(GeoError::Open { .. })
        ));
    }

    #[test]
    fn test_lookup_decodes_city_record() {
        let file = TempDatabase::write(&city_database());
        let lookup = MaxMindLookup::open(&file.0).unwrap();

        let location = lookup.lookup("10.0.0.1".parse().unwrap()).unwrap().unwrap();
        assert_eq!(
            location,
            Location {
                city: "London".to_string(),
                state: "England".to_string(),
                country: "United Kingdom".to_string(),
            }
        );
    }

    #[test]
    fn test_lookup_without_subdivisions() {
        let file = TempDatabase::write(&city_database());
        let lookup = MaxMindLookup::open(&file.0).unwrap();

        let location = lookup.lookup("81.2.69.142".parse().unwrap()).unwrap().unwrap();
        assert_eq!(location.city, "Oslo");
        assert_eq!(location.state, "");
        assert_eq!(location.country, "Norway");
    }

    #[test]
    fn test_lookup_absent_network() {
        let file = TempDatabase::write(&city_database());
        let lookup = MaxMindLookup::open(&file.0).unwrap();

        assert!(lookup.lookup("200.1.1.1".parse().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_lookup_undecodable_record() {
        let file = TempDatabase::write(&city_database());
        let lookup = MaxMindLookup::open(&file.0).unwrap();
        let ip: IpAddr = "130.1.2.3".parse().unwrap();

        match lookup.lookup(ip) {
            Err(GeoError::Lookup { ip: failed, .. }) => assert_eq!(failed, ip),
            other => panic!("expected a lookup error, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup_ipv6_in_ipv4_database() {
        let file = TempDatabase::write(&city_database());
        let lookup = MaxMindLookup::open(&file.0).unwrap();

        let result = lookup.lookup("2001:db8::1".parse().unwrap());
        assert!(matches!(result, Err(GeoError::Lookup { .. })), "{result:?}");
    }

    #[test]
    fn test_clones_share_the_mapping() {
        let file = TempDatabase::write(&city_database());
        let lookup = MaxMindLookup::open(&file.0).unwrap();
        let clone = lookup.clone();

        assert!(Arc::ptr_eq(&lookup.reader, &clone.reader));
        assert_eq!(
            clone.lookup("10.0.0.1".parse().unwrap()).unwrap(),
            lookup.lookup("10.0.0.1".parse().unwrap()).unwrap()
        );
    }
}
