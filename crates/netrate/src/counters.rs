//! Per-interface counter reader.
//!
//! Parses the kernel's `/proc/net/dev` table:
//!
//! ```text
//! Inter-|   Receive                                                |  Transmit
//!  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
//!     lo: 2776770   11307    0    0    0     0          0         0  2776770   11307    0    0    0     0       0          0
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use crate::rate::Totals;

/// Separates the interface name from its counters.
const NAME_DELIMITER: char = ':';

/// Receive-side counters of one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStats {
    pub bytes: u64,
    pub packets: u64,
    pub errors: u64,
    pub drops: u64,
    pub fifo: u64,
    /// Framing errors
    pub frame: u64,
    pub compressed: u64,
    pub multicast: u64,
}

/// Transmit-side counters of one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitStats {
    pub bytes: u64,
    pub packets: u64,
    pub errors: u64,
    pub drops: u64,
    pub fifo: u64,
    pub collisions: u64,
    /// Carrier losses
    pub carrier: u64,
    pub compressed: u64,
}

/// Counters of a single interface at the time of a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub receive: ReceiveStats,
    pub transmit: TransmitStats,
}

impl InterfaceStats {
    /// Maps the 16 positional counter columns of one line.
    ///
    /// Values that are missing or not a valid unsigned integer are read as 0.
    fn from_fields<'a>(fields: impl Iterator<Item = &'a str>) -> Self {
        let mut fields = fields.map(|field| field.parse::<u64>().unwrap_or(0));
        let mut next = || fields.next().unwrap_or(0);

        let receive = ReceiveStats {
            bytes: next(),
            packets: next(),
            errors: next(),
            drops: next(),
            fifo: next(),
            frame: next(),
            compressed: next(),
            multicast: next(),
        };
        let transmit = TransmitStats {
            bytes: next(),
            packets: next(),
            errors: next(),
            drops: next(),
            fifo: next(),
            collisions: next(),
            carrier: next(),
            compressed: next(),
        };

        Self { receive, transmit }
    }
}

/// One full parse of the counter source, keyed by interface name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    interfaces: BTreeMap<String, InterfaceStats>,
}

impl Snapshot {
    /// Returns the counters for an interface, if present.
    pub fn get(&self, interface: &str) -> Option<&InterfaceStats> {
        self.interfaces.get(interface)
    }

    /// Number of interfaces in the snapshot.
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Returns true if no interface was read.
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Iterates over interfaces in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InterfaceStats)> {
        self.interfaces
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
    }

    /// Interface names in the snapshot, sorted.
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    /// Sums receive and transmit bytes over every interface in the snapshot.
    pub fn totals(&self) -> Totals {
        self.iter()
            .fold(Totals::default(), |acc, (_, stats)| Totals {
                rx_bytes: acc.rx_bytes.saturating_add(stats.receive.bytes),
                tx_bytes: acc.tx_bytes.saturating_add(stats.transmit.bytes),
            })
    }
}

/// Returns true if the interface passes the allow-list.
///
/// A missing or empty allow-list admits every interface.
fn is_allowed(interface: &str, allow_list: Option<&[String]>) -> bool {
    match allow_list {
        Some(list) if !list.is_empty() => list.iter().any(|name| name == interface),
        _ => true,
    }
}

/// Parses counter lines from a reader.
///
/// Lines without a `:` are headers and are skipped. A later line for the same
/// interface replaces an earlier one. Any I/O error aborts the parse. The
/// reader is consumed and dropped before returning.
pub fn parse_counters<R: BufRead>(
    mut reader: R,
    allow_list: Option<&[String]>,
) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let Some((name, counters)) = line.split_once(NAME_DELIMITER) else {
            continue;
        };

        let name = name.trim();
        if !is_allowed(name, allow_list) {
            continue;
        }

        let stats = InterfaceStats::from_fields(counters.split_whitespace());
        snapshot.interfaces.insert(name.to_string(), stats);
    }

    Ok(snapshot)
}

/// Reads and parses the counter file at `path`.
pub fn read_counters<P: AsRef<Path>>(
    path: P,
    allow_list: Option<&[String]>,
) -> Result<Snapshot> {
    let file = File::open(path.as_ref())?;
    parse_counters(BufReader::new(file), allow_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PROC_NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 2776770   11307    0    0    0     0          0         0  2776770   11307    0    0    0     0       0          0
  eth0: 1000 10 1 2 3 4 5 6 2000 20 7 8 9 10 11 12
 wlan0: 300 3 0 0 0 0 0 0 400 4 0 0 0 0 0 0
";

    fn allow(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    /// Reader that tracks how many instances are alive and can fail mid-scan.
    struct TrackedReader {
        inner: Cursor<Vec<u8>>,
        open: Arc<AtomicUsize>,
        fail_after: Option<usize>,
    }

    impl TrackedReader {
        fn new(content: &str, open: &Arc<AtomicUsize>, fail_after: Option<usize>) -> Self {
            open.fetch_add(1, Ordering::SeqCst);
            Self {
                inner: Cursor::new(content.as_bytes().to_vec()),
                open: open.clone(),
                fail_after,
            }
        }
    }

    impl Read for TrackedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(limit) = self.fail_after {
                if self.inner.position() as usize >= limit {
                    return Err(io::Error::new(io::ErrorKind::Other, "device went away"));
                }
                let remaining = limit - self.inner.position() as usize;
                let len = buf.len().min(remaining);
                return self.inner.read(&mut buf[..len]);
            }
            self.inner.read(buf)
        }
    }

    impl Drop for TrackedReader {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_field_mapping() {
        let snapshot = parse_counters(
            Cursor::new("eth0: 100 2 0 0 0 0 0 0 200 3 0 0 0 0 0 0\n"),
            None,
        )
        .unwrap();

        let eth0 = snapshot.get("eth0").unwrap();
        assert_eq!(eth0.receive.bytes, 100);
        assert_eq!(eth0.receive.packets, 2);
        assert_eq!(eth0.transmit.bytes, 200);
        assert_eq!(eth0.transmit.packets, 3);
        assert_eq!(eth0.receive.errors + eth0.receive.multicast, 0);
        assert_eq!(eth0.transmit.collisions + eth0.transmit.carrier, 0);
    }

    #[test]
    fn test_all_columns_in_order() {
        let snapshot = parse_counters(Cursor::new(PROC_NET_DEV), None).unwrap();
        let eth0 = snapshot.get("eth0").unwrap();

        assert_eq!(
            eth0.receive,
            ReceiveStats {
                bytes: 1000,
                packets: 10,
                errors: 1,
                drops: 2,
                fifo: 3,
                frame: 4,
                compressed: 5,
                multicast: 6,
            }
        );
        assert_eq!(
            eth0.transmit,
            TransmitStats {
                bytes: 2000,
                packets: 20,
                errors: 7,
                drops: 8,
                fifo: 9,
                collisions: 10,
                carrier: 11,
                compressed: 12,
            }
        );
    }

    #[test]
    fn test_header_lines_skipped() {
        let snapshot = parse_counters(Cursor::new(PROC_NET_DEV), None).unwrap();
        assert_eq!(
            snapshot.interfaces().collect::<Vec<_>>(),
            vec!["eth0", "lo", "wlan0"]
        );
    }

    #[test]
    fn test_allow_list() {
        let list = allow(&["eth0", "wlan0", "missing0"]);
        let snapshot = parse_counters(Cursor::new(PROC_NET_DEV), Some(list.as_slice())).unwrap();
        assert_eq!(
            snapshot.interfaces().collect::<Vec<_>>(),
            vec!["eth0", "wlan0"]
        );

        let list = allow(&["lo"]);
        let snapshot = parse_counters(Cursor::new(PROC_NET_DEV), Some(list.as_slice())).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("lo").is_some());
    }

    #[test]
    fn test_empty_allow_list_admits_all() {
        let snapshot = parse_counters(Cursor::new(PROC_NET_DEV), Some(&[][..])).unwrap();
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_malformed_fields_are_zero() {
        let snapshot =
            parse_counters(Cursor::new("eth0: 12 x -4 1.5\nbr0: 7 8\n"), None).unwrap();

        let eth0 = snapshot.get("eth0").unwrap();
        assert_eq!(eth0.receive.bytes, 12);
        assert_eq!(eth0.receive.packets, 0);
        assert_eq!(eth0.receive.errors, 0);
        assert_eq!(eth0.receive.drops, 0);
        assert_eq!(eth0.transmit, TransmitStats::default());

        let br0 = snapshot.get("br0").unwrap();
        assert_eq!(br0.receive.packets, 8);
        assert_eq!(br0.transmit.bytes, 0);
    }

    #[test]
    fn test_no_space_after_delimiter() {
        let snapshot = parse_counters(
            Cursor::new("eth0:4294967296 1 0 0 0 0 0 0 5 1 0 0 0 0 0 0\n"),
            None,
        )
        .unwrap();
        let eth0 = snapshot.get("eth0").unwrap();
        assert_eq!(eth0.receive.bytes, 4_294_967_296);
        assert_eq!(eth0.transmit.bytes, 5);
    }

    #[test]
    fn test_duplicate_interface_overwrites() {
        let snapshot = parse_counters(
            Cursor::new(concat!(
                "eth0: 1 0 0 0 0 0 0 0 1 0 0 0 0 0 0 0\n",
                "eth0: 9 0 0 0 0 0 0 0 8 0 0 0 0 0 0 0\n",
            )),
            None,
        )
        .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("eth0").unwrap().receive.bytes, 9);
    }

    #[test]
    fn test_totals() {
        let snapshot = parse_counters(Cursor::new(PROC_NET_DEV), None).unwrap();
        assert_eq!(
            snapshot.totals(),
            Totals {
                rx_bytes: 2776770 + 1000 + 300,
                tx_bytes: 2776770 + 2000 + 400,
            }
        );
    }

    #[test]
    fn test_reader_released_on_success() {
        let open = Arc::new(AtomicUsize::new(0));
        let reader = BufReader::new(TrackedReader::new(PROC_NET_DEV, &open, None));
        assert_eq!(open.load(Ordering::SeqCst), 1);

        assert!(parse_counters(reader, None).is_ok());
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_read_error_aborts_and_releases() {
        let open = Arc::new(AtomicUsize::new(0));
        let reader = BufReader::new(TrackedReader::new(PROC_NET_DEV, &open, Some(250)));

        let result = parse_counters(reader, None);
        assert!(matches!(result, Err(crate::Error::Io(_))));
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_read_counters_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, PROC_NET_DEV.as_bytes()).unwrap();

        let snapshot = read_counters(file.path(), None).unwrap();
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_counters(dir.path().join("dev"), None);
        match result {
            Err(crate::Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_iter_in_name_order() {
        let snapshot = parse_counters(Cursor::new(PROC_NET_DEV), None).unwrap();
        let rx: Vec<(&str, u64)> = snapshot
            .iter()
            .map(|(name, stats)| (name, stats.receive.bytes))
            .collect();
        assert_eq!(rx, vec![("eth0", 1000), ("lo", 2776770), ("wlan0", 300)]);
    }

    #[test]
    fn test_snapshot_serializes_by_name() {
        let snapshot = parse_counters(
            Cursor::new("eth0: 100 2 0 0 0 0 0 0 200 3 0 0 0 0 0 0\n"),
            None,
        )
        .unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["eth0"]["receive"]["bytes"], 100);
        assert_eq!(json["eth0"]["transmit"]["packets"], 3);
    }
}
