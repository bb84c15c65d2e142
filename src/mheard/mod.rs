//! Directory of recently heard stations
//!
//! A fixed hash of singly linked chains. Nodes are only ever added, never
//! removed, and a node is fully built before it is linked in, so readers
//! walk the chains without taking the lock. Writers serialize on one mutex
//! around the link step. Per-station fields are atomics.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chrono::Utc;
use tracing::{debug, error, info};

use crate::ax25::{Packet, REPEATER_1, SOURCE};
use crate::core::AudioLevel;

/// Number of hash buckets
pub const HASH_SIZE: usize = 73;

/// A longer path heard within this many seconds of a shorter one is
/// ignored.
pub const BETTER_PATH_WINDOW: i64 = 15;

/// Mean earth radius used for distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

fn hash_index(callsign: &str) -> usize {
    callsign.bytes().map(usize::from).sum::<usize>() % HASH_SIZE
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Great circle distance in km.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) =
        (lat1.to_radians(), lon1.to_radians(), lat2.to_radians(), lon2.to_radians());
    let a = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

struct Node {
    callsign: String,
    /// Times heard by either path
    count: AtomicU32,
    /// Most recent radio channel
    chan: AtomicUsize,
    /// Digipeater hops before we heard it
    hops: AtomicI32,
    /// Receive level and FCS fix effort of the last accepted RF frame
    alevel: [AtomicI32; 3],
    retries: AtomicUsize,
    /// Unix seconds, 0 for never
    last_heard_rf: AtomicI64,
    last_heard_is: AtomicI64,
    /// f64 bits, NaN for unknown
    lat: AtomicU64,
    lon: AtomicU64,
    /// Message sender position reports allowed
    msp: AtomicI32,
    next: OnceLock<Box<Node>>,
}

impl Node {
    fn new(callsign: &str) -> Self {
        Node {
            callsign: callsign.to_string(),
            count: AtomicU32::new(1),
            chan: AtomicUsize::new(0),
            hops: AtomicI32::new(0),
            alevel: [AtomicI32::new(-1), AtomicI32::new(-1), AtomicI32::new(-1)],
            retries: AtomicUsize::new(0),
            last_heard_rf: AtomicI64::new(0),
            last_heard_is: AtomicI64::new(0),
            lat: AtomicU64::new(f64::NAN.to_bits()),
            lon: AtomicU64::new(f64::NAN.to_bits()),
            msp: AtomicI32::new(0),
            next: OnceLock::new(),
        }
    }

    fn record_rf(&self, chan: usize, hops: i32, alevel: AudioLevel, retries: usize, now: i64) {
        self.chan.store(chan, Ordering::Relaxed);
        self.hops.store(hops, Ordering::Relaxed);
        for (slot, v) in self.alevel.iter().zip([alevel.rec, alevel.mark, alevel.space]) {
            slot.store(v, Ordering::Relaxed);
        }
        self.retries.store(retries, Ordering::Relaxed);
        self.last_heard_rf.store(now, Ordering::Relaxed);
    }

    fn set_position(&self, position: Option<(f64, f64)>) {
        if let Some((lat, lon)) = position {
            self.lat.store(lat.to_bits(), Ordering::Relaxed);
            self.lon.store(lon.to_bits(), Ordering::Relaxed);
        }
    }

    fn position(&self) -> Option<(f64, f64)> {
        let lat = f64::from_bits(self.lat.load(Ordering::Relaxed));
        let lon = f64::from_bits(self.lon.load(Ordering::Relaxed));
        (!lat.is_nan() && !lon.is_nan()).then_some((lat, lon))
    }

    fn snapshot(&self) -> Station {
        Station {
            callsign: self.callsign.clone(),
            count: self.count.load(Ordering::Relaxed),
            chan: self.chan.load(Ordering::Relaxed),
            hops: self.hops.load(Ordering::Relaxed),
            alevel: AudioLevel::new(
                self.alevel[0].load(Ordering::Relaxed),
                self.alevel[1].load(Ordering::Relaxed),
                self.alevel[2].load(Ordering::Relaxed),
            ),
            retries: self.retries.load(Ordering::Relaxed),
            last_heard_rf: self.last_heard_rf.load(Ordering::Relaxed),
            last_heard_is: self.last_heard_is.load(Ordering::Relaxed),
            position: self.position(),
            msp: self.msp.load(Ordering::Relaxed),
        }
    }
}

/// Copy of one station's record.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub callsign: String,
    pub count: u32,
    pub chan: usize,
    pub hops: i32,
    pub alevel: AudioLevel,
    pub retries: usize,
    /// Unix seconds, 0 for never
    pub last_heard_rf: i64,
    pub last_heard_is: i64,
    pub position: Option<(f64, f64)>,
    pub msp: i32,
}

/// The station directory.
pub struct Mheard {
    buckets: Vec<OnceLock<Box<Node>>>,
    /// Held while linking a new node
    insert: Mutex<()>,
}

impl Default for Mheard {
    fn default() -> Self {
        Mheard {
            buckets: (0..HASH_SIZE).map(|_| OnceLock::new()).collect(),
            insert: Mutex::new(()),
        }
    }
}

impl std::fmt::Debug for Mheard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mheard").field("stations", &self.len()).finish()
    }
}

impl Mheard {
    /// Creates an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self, bucket: usize) -> impl Iterator<Item = &Node> {
        let mut cur = self.buckets[bucket].get().map(Box::as_ref);
        std::iter::from_fn(move || {
            let node = cur?;
            cur = node.next.get().map(Box::as_ref);
            Some(node)
        })
    }

    fn nodes(&self) -> impl Iterator<Item = &Node> {
        (0..HASH_SIZE).flat_map(move |b| self.chain(b))
    }

    fn find(&self, callsign: &str) -> Option<&Node> {
        self.chain(hash_index(callsign)).find(|n| n.callsign == callsign)
    }

    /// Links a node at the tail of its chain. If another writer added the
    /// same station first, that node is returned with `false` and the new
    /// one is dropped.
    fn insert(&self, node: Node) -> (&Node, bool) {
        let _guard = self.insert.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = self.find(&node.callsign) {
            return (existing, false);
        }
        let bucket = hash_index(&node.callsign);
        let mut slot = &self.buckets[bucket];
        while let Some(next) = slot.get() {
            slot = &next.next;
        }
        (slot.get_or_init(|| Box::new(node)), true)
    }

    /// Number of stations held
    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records a station heard over the radio.
    ///
    /// `position` comes from the decoded APRS content, if it had one.
    pub fn save_rf(
        &self,
        chan: usize,
        position: Option<(f64, f64)>,
        pp: &Packet,
        alevel: AudioLevel,
        retries: usize,
    ) {
        self.save_rf_at(chan, position, pp, alevel, retries, unix_now());
    }

    fn save_rf_at(
        &self,
        chan: usize,
        position: Option<(f64, f64)>,
        pp: &Packet,
        alevel: AudioLevel,
        retries: usize,
        now: i64,
    ) {
        let source = pp.get_addr_with_ssid(SOURCE);
        let hops = digi_hops(pp);

        let node = match self.find(&source) {
            Some(node) => node,
            None => {
                let node = Node::new(&source);
                node.record_rf(chan, hops, alevel, retries, now);
                node.set_position(position);
                match self.insert(node) {
                    (_, true) => {
                        debug!(%source, hops, "mheard: added new");
                        return;
                    }
                    // Lost a race with another writer; update theirs.
                    (existing, false) => existing,
                }
            }
        };

        let prev_hops = node.hops.load(Ordering::Relaxed);
        let ago = now - node.last_heard_rf.load(Ordering::Relaxed);
        if hops > prev_hops && ago < BETTER_PATH_WINDOW {
            debug!(%source, hops, prev_hops, ago, "mheard: keeping shorter recent path");
        } else {
            node.count.fetch_add(1, Ordering::Relaxed);
            node.record_rf(chan, hops, alevel, retries, now);
        }
        node.set_position(position);
    }

    /// Records a station heard from an Internet server. Only the source
    /// callsign of the monitor text is used.
    pub fn save_is(&self, text: &str) {
        self.save_is_at(text, unix_now());
    }

    fn save_is_at(&self, text: &str, now: i64) {
        let first_line = text.lines().next().unwrap_or("");
        let source = first_line.split('>').next().unwrap_or("");
        let source: String = source.chars().take(crate::ax25::MAX_ADDR_LEN - 1).collect();
        if source.is_empty() {
            return;
        }
        let node = match self.find(&source) {
            Some(node) => node,
            None => {
                let node = Node::new(&source);
                node.last_heard_is.store(now, Ordering::Relaxed);
                match self.insert(node) {
                    (_, true) => {
                        debug!(%source, "mheard: added new from internet");
                        return;
                    }
                    (existing, false) => existing,
                }
            }
        };
        node.count.fetch_add(1, Ordering::Relaxed);
        node.last_heard_is.store(now, Ordering::Relaxed);
    }

    /// Stations heard over the radio in the last `minutes` with at most
    /// `max_hops` digipeater hops.
    pub fn count(&self, max_hops: i32, minutes: i64) -> usize {
        self.count_at(max_hops, minutes, unix_now())
    }

    fn count_at(&self, max_hops: i32, minutes: i64, now: i64) -> usize {
        let since = now.saturating_sub(minutes.saturating_mul(60));
        self.nodes()
            .filter(|n| {
                n.last_heard_rf.load(Ordering::Relaxed) >= since
                    && n.hops.load(Ordering::Relaxed) <= max_hops
            })
            .count()
    }

    /// Whether a station was heard over the radio recently, close by in
    /// hops and, when both positions are known, within `km` of the given
    /// location. A non-empty `role` logs the reasoning.
    #[allow(clippy::too_many_arguments)]
    pub fn was_recently_nearby(
        &self,
        role: &str,
        callsign: &str,
        minutes: i64,
        max_hops: i32,
        lat: Option<f64>,
        lon: Option<f64>,
        km: Option<f64>,
    ) -> bool {
        self.was_recently_nearby_at(role, callsign, minutes, max_hops, lat, lon, km, unix_now())
    }

    #[allow(clippy::too_many_arguments)]
    fn was_recently_nearby_at(
        &self,
        role: &str,
        callsign: &str,
        minutes: i64,
        max_hops: i32,
        lat: Option<f64>,
        lon: Option<f64>,
        km: Option<f64>,
        now: i64,
    ) -> bool {
        let explain = !role.is_empty();
        let Some(node) = self.find(callsign).filter(|n| n.last_heard_rf.load(Ordering::Relaxed) != 0)
        else {
            if explain {
                info!("No, we have not heard {} {} over the radio.", role, callsign);
            }
            return false;
        };

        let hops = node.hops.load(Ordering::Relaxed);
        let heard_ago = (now - node.last_heard_rf.load(Ordering::Relaxed)) / 60;
        if heard_ago > minutes {
            if explain {
                info!("No, {} was last heard over the radio {} minutes ago with {} digipeater hops.", callsign, heard_ago, hops);
            }
            return false;
        }
        if hops > max_hops {
            if explain {
                info!("No, {} was last heard over the radio with {} digipeater hops {} minutes ago.", callsign, hops, heard_ago);
            }
            return false;
        }

        if let (Some(lat), Some(lon), Some(km), Some((slat, slon))) = (lat, lon, km, node.position()) {
            let dist = distance_km(slat, slon, lat, lon);
            if dist > km {
                if explain {
                    info!("No, {} was {:.1} km away although it was {} digipeater hops {} minutes ago.", callsign, dist, hops, heard_ago);
                }
                return false;
            }
        }
        if explain {
            info!("Yes, {} last heard over radio {} minutes ago, {} digipeater hops.", callsign, heard_ago, hops);
        }
        true
    }

    /// Sets how many position reports a message sender may get.
    pub fn set_msp(&self, callsign: &str, num: i32) {
        match self.find(callsign) {
            Some(node) => node.msp.store(num, Ordering::Relaxed),
            None => error!("Can't find {} to set MSP.", callsign),
        }
    }

    /// Position reports still allowed, 0 for unknown stations.
    pub fn get_msp(&self, callsign: &str) -> i32 {
        self.find(callsign).map_or(0, |n| n.msp.load(Ordering::Relaxed))
    }

    /// Copy of one station's record.
    pub fn station(&self, callsign: &str) -> Option<Station> {
        self.find(callsign).map(Node::snapshot)
    }

    /// All stations, most recently heard first.
    pub fn stations(&self) -> Vec<Station> {
        let mut all: Vec<Station> = self.nodes().map(Node::snapshot).collect();
        all.sort_by_key(|s| std::cmp::Reverse(s.last_heard_rf.max(s.last_heard_is)));
        all
    }

    /// Station list as a text table.
    pub fn dump(&self) -> String {
        self.dump_at(unix_now())
    }

    fn dump_at(&self, now: i64) -> String {
        let mut out = String::from("callsign  cnt chan hops    RF      IS    lat     long  msp\n");
        for s in self.stations() {
            let position = match s.position {
                Some((lat, lon)) => format!("{:6.2} {:7.2}", lat, lon),
                None => "   -       -  ".to_string(),
            };
            out.push_str(&format!(
                "{:<9} {:3}   {}   {}  {:>7} {:>7}  {}  {}\n",
                s.callsign,
                s.count,
                s.chan,
                s.hops,
                age(now, s.last_heard_rf),
                age(now, s.last_heard_is),
                position,
                s.msp
            ));
        }
        out
    }
}

/// Hours and minutes since `t`.
fn age(now: i64, t: i64) -> String {
    if t == 0 {
        return "-  ".to_string();
    }
    let m = (now - t) / 60;
    format!("{:4}:{:02}", m / 60, m % 60)
}

/// Used digipeaters before we heard the frame. Leftover `WIDEn-0`
/// addresses don't count as hops.
fn digi_hops(pp: &Packet) -> i32 {
    let mut hops = pp.heard() as i32 - SOURCE as i32;
    if hops > 1 {
        for n in REPEATER_1..pp.num_addr() {
            let call = pp.get_addr_no_ssid(n);
            let b = call.as_bytes();
            if pp.get_h(n)
                && b.len() == 5
                && call.starts_with("WIDE")
                && b[4].is_ascii_digit()
                && pp.get_ssid(n) == 0
            {
                hops -= 1;
            }
        }
    }
    hops
}

static GLOBAL: OnceLock<Arc<Mheard>> = OnceLock::new();

/// The process-wide directory.
pub fn global() -> Arc<Mheard> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(Mheard::new())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkt(text: &str) -> Packet {
        Packet::from_text(text, true).unwrap()
    }

    const T0: i64 = 1_700_000_000;
    const AL: AudioLevel = AudioLevel { rec: 40, mark: 30, space: 20 };

    #[test]
    fn test_hops_ignore_wide_n_zero() {
        assert_eq!(digi_hops(&pkt("A>B:x")), 0);
        assert_eq!(digi_hops(&pkt("A>B,N3LLO-3*:x")), 1);
        assert_eq!(digi_hops(&pkt("A>B,K1EQX-7,WIDE1,N3LLO-3,WIDE2*,ARISS:x")), 2);
        assert_eq!(digi_hops(&pkt("A>B,K1EQX-7*,RELAY*,N3LLO-3*:x")), 3);
    }

    #[test]
    fn test_shorter_path_kept() {
        let mh = Mheard::new();
        mh.save_rf_at(0, None, &pkt("W1AW>APRS:x"), AL, 0, T0);
        mh.save_rf_at(1, None, &pkt("W1AW>APRS,N0CALL*:x"), AL, 0, T0 + 5);
        let s = mh.station("W1AW").unwrap();
        assert_eq!((s.count, s.chan, s.hops, s.last_heard_rf), (1, 0, 0, T0));

        mh.save_rf_at(1, None, &pkt("W1AW>APRS,N0CALL*:x"), AL, 0, T0 + 20);
        let s = mh.station("W1AW").unwrap();
        assert_eq!((s.count, s.chan, s.hops, s.last_heard_rf), (2, 1, 1, T0 + 20));
    }

    #[test]
    fn test_signal_details_follow_accepted_frame() {
        let mh = Mheard::new();
        mh.save_rf_at(0, None, &pkt("W1AW>APRS:x"), AL, 0, T0);
        let s = mh.station("W1AW").unwrap();
        assert_eq!((s.alevel, s.retries), (AL, 0));

        // Suppressed longer path leaves them alone.
        mh.save_rf_at(0, None, &pkt("W1AW>APRS,N0CALL*:x"), AudioLevel::new(9, 9, 9), 2, T0 + 1);
        assert_eq!(mh.station("W1AW").unwrap().alevel, AL);

        mh.save_rf_at(0, None, &pkt("W1AW>APRS:x"), AudioLevel::new(80, 70, 60), 1, T0 + 2);
        let s = mh.station("W1AW").unwrap();
        assert_eq!((s.alevel, s.retries), (AudioLevel::new(80, 70, 60), 1));
    }

    #[test]
    fn test_count() {
        let mh = Mheard::new();
        mh.save_rf_at(0, None, &pkt("A1>APRS:x"), AL, 0, T0);
        mh.save_rf_at(0, None, &pkt("A2>APRS,D1*,D2*:x"), AL, 0, T0);
        mh.save_rf_at(0, None, &pkt("A3>APRS:x"), AL, 0, T0 - 3600);
        mh.save_is_at("A4>APRS,TCPIP*,qAC,T2:hello", T0);

        assert_eq!(mh.len(), 4);
        assert_eq!(mh.count_at(0, 30, T0), 1);
        assert_eq!(mh.count_at(2, 30, T0), 2);
        assert_eq!(mh.count_at(8, 120, T0), 3);
    }

    #[test]
    fn test_count_monotone() {
        let mh = Mheard::new();
        let mut last = 0;
        for i in 0..200 {
            mh.save_rf_at(0, None, &pkt(&format!("N{}>APRS:x", i % 50)), AL, 0, T0);
            let c = mh.count_at(i32::MAX, i64::MAX, T0);
            assert!(c >= last);
            last = c;
        }
        assert_eq!(last, 50);
    }

    #[test]
    fn test_save_is() {
        let mh = Mheard::new();
        mh.save_is_at("KA1BTK-5>APDR13,TCPIP*,qAC,T2IRELAND:=4237.62N/07040.68W$", T0);
        let s = mh.station("KA1BTK-5").unwrap();
        assert_eq!((s.last_heard_rf, s.last_heard_is), (0, T0));
        assert!(!mh.was_recently_nearby_at("", "KA1BTK-5", 180, 8, None, None, None, T0));
        mh.save_is_at("KA1BTK-5>APDR13:again", T0 + 1);
        assert_eq!(mh.station("KA1BTK-5").unwrap().count, 2);
    }

    #[test]
    fn test_msp_metering() {
        let mh = Mheard::new();
        mh.save_rf_at(0, Some((42.60, -71.35)), &pkt("W1XYZ>APRS:x"), AL, 0, T0);
        mh.set_msp("W1XYZ", 1);
        assert_eq!(mh.get_msp("W1XYZ"), 1);
        let near = |mh: &Mheard| {
            mh.was_recently_nearby_at("*", "W1XYZ", 180, 8, Some(42.65), Some(-71.30), Some(10.0), T0 + 60)
        };
        assert!(near(&mh));

        mh.set_msp("W1XYZ", 0);
        assert_eq!(mh.get_msp("W1XYZ"), 0);
        assert!(near(&mh));
        assert_eq!(mh.get_msp("NOBODY"), 0);
    }

    #[test]
    fn test_nearby_predicates() {
        let mh = Mheard::new();
        mh.save_rf_at(0, Some((42.60, -71.35)), &pkt("W1XYZ>APRS,D1*,D2*,D3*:x"), AL, 0, T0);
        let f = |minutes, hops, km| {
            mh.was_recently_nearby_at("", "W1XYZ", minutes, hops, Some(42.60), Some(-70.0), km, T0 + 600)
        };
        assert!(f(180, 8, None));
        assert!(!f(5, 8, None));
        assert!(!f(180, 2, None));
        assert!(!f(180, 8, Some(50.0)));
        assert!(f(180, 8, Some(150.0)));
    }

    #[test]
    fn test_distance() {
        let d = distance_km(42.0, -71.0, 43.0, -71.0);
        assert!((d - 111.19).abs() < 0.1, "{}", d);
        assert_eq!(distance_km(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_collisions_share_bucket() {
        let mh = Mheard::new();
        // Same byte sum, same bucket.
        mh.save_rf_at(0, None, &pkt("AB>APRS:x"), AL, 0, T0);
        mh.save_rf_at(0, None, &pkt("BA>APRS:x"), AL, 0, T0 + 1);
        assert_eq!(hash_index("AB"), hash_index("BA"));
        assert_eq!(mh.chain(hash_index("AB")).count(), 2);
        assert!(mh.station("AB").is_some() && mh.station("BA").is_some());
    }

    #[test]
    fn test_losing_insert_still_counts() {
        let mh = Mheard::new();
        assert!(mh.insert(Node::new("W1AW")).1);
        let (existing, added) = mh.insert(Node::new("W1AW"));
        assert!(!added);
        assert_eq!(existing.count.load(Ordering::Relaxed), 1);
        assert_eq!(mh.len(), 1);

        let frames: Vec<Packet> = (0..4).map(|i| pkt(&format!("K{}ABC>APRS:x", i))).collect();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        for pp in &frames {
                            mh.save_rf_at(0, None, pp, AL, 0, T0);
                        }
                    }
                });
            }
        });
        for i in 0..4 {
            assert_eq!(mh.station(&format!("K{}ABC", i)).unwrap().count, 400);
        }
        assert_eq!(mh.len(), 5);
    }

    #[test]
    fn test_dump_sorted() {
        let mh = Mheard::new();
        mh.save_rf_at(2, Some((1.5, -2.25)), &pkt("OLD>APRS:x"), AL, 0, T0 - 7200);
        mh.save_rf_at(0, None, &pkt("NEW>APRS:x"), AL, 0, T0);
        let dump = mh.dump_at(T0);
        let lines: Vec<&str> = dump.lines().collect();
        assert!(lines[0].starts_with("callsign"));
        assert!(lines[1].starts_with("NEW "));
        assert!(lines[2].starts_with("OLD "));
        assert!(lines[2].contains("   2:00"));
        assert!(lines[2].contains("  1.50   -2.25"));
    }
}
