//! NMEA waypoint output
//!
//! Turns station positions into waypoint sentences for a GPS display or
//! mapping application, sent to a serial port and/or a UDP destination.
//! Every sentence is `$...*HH\r\n` with an XOR checksum.

use std::io::Write;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serialport::SerialPort;
use tracing::{debug, error, info, warn};
use trust_dns_resolver::TokioAsyncResolver;

use crate::core::{Error, Result, WaypointConfig, WaypointFormats};

/// Waypoint serial ports always run at this speed.
pub const WAYPOINT_BAUD: u32 = 4800;

/// Longest waypoint name carried.
const MAX_NAME_LEN: usize = 11;

/// Longest sentence sent, including CR LF.
const MAX_SENTENCE_LEN: usize = 255;

/// Something with a position to put on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// Object name or station callsign
    pub name: String,
    /// Degrees, south negative
    pub lat: Option<f64>,
    /// Degrees, west negative
    pub lon: Option<f64>,
    /// Symbol table or overlay character
    pub symtab: char,
    /// Symbol code
    pub symbol: char,
    /// Meters
    pub alt: Option<f32>,
    /// Degrees
    pub course: Option<f32>,
    /// Knots
    pub speed: Option<f32>,
}

/// XOR of every byte after the leading `$`.
pub fn nmea_checksum(sentence: &str) -> u8 {
    sentence.bytes().skip(1).fold(0, |cs, b| cs ^ b)
}

/// Appends `*HH` to a sentence starting with `$`.
pub fn append_checksum(sentence: &mut String) {
    let cs = nmea_checksum(sentence);
    sentence.push_str(&format!("*{:02X}", cs));
}

/// Replaces the NMEA field delimiters `,` and `*`.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ',' => '|',
            '*' => '~',
            c => c,
        })
        .collect()
}

fn degrees_to_nmea(deg: f64, width: usize) -> String {
    let mut ideg = deg as u32;
    let mut smin = format!("{:07.4}", (deg - ideg as f64) * 60.0);
    // 59.99999 rounds to "60.0000"
    if smin.starts_with('6') {
        smin.replace_range(0..1, "0");
        ideg += 1;
    }
    format!("{:0width$}{}", ideg, smin, width = width)
}

/// Latitude as `DDMM.mmmm` plus hemisphere. Unknown gives empty fields.
pub fn latitude_to_nmea(lat: Option<f64>) -> (String, &'static str) {
    let lat = match lat {
        Some(l) => l,
        None => return (String::new(), ""),
    };
    if !(-90.0..=90.0).contains(&lat) {
        warn!(lat, "Latitude out of range, clamped");
    }
    let lat = lat.clamp(-90.0, 90.0);
    let hemi = if lat < 0.0 { "S" } else { "N" };
    (degrees_to_nmea(lat.abs(), 2), hemi)
}

/// Longitude as `DDDMM.mmmm` plus hemisphere. Unknown gives empty fields.
pub fn longitude_to_nmea(lon: Option<f64>) -> (String, &'static str) {
    let lon = match lon {
        Some(l) => l,
        None => return (String::new(), ""),
    };
    if !(-180.0..=180.0).contains(&lon) {
        warn!(lon, "Longitude out of range, clamped");
    }
    let lon = lon.clamp(-180.0, 180.0);
    let hemi = if lon < 0.0 { "W" } else { "E" };
    (degrees_to_nmea(lon.abs(), 3), hemi)
}

fn opt_field(v: Option<f32>) -> String {
    v.map(|v| format!("{:.1}", v)).unwrap_or_default()
}

/// Renders the enabled sentence formats for one waypoint, checksummed but
/// without CR LF. The Kenwood sentence carries `now` as its time stamp.
pub fn sentences(formats: &WaypointFormats, wp: &Waypoint, now: DateTime<Utc>) -> Vec<String> {
    let name: String = sanitize(&wp.name).chars().take(MAX_NAME_LEN).collect();
    let (slat, ns) = latitude_to_nmea(wp.lat);
    let (slon, ew) = longitude_to_nmea(wp.lon);
    let mut out = Vec::new();

    if formats.nmea_generic {
        let mut s = format!("$GPWPL,{},{},{},{},{}", slat, ns, slon, ew, name);
        append_checksum(&mut s);
        out.push(s);
    }

    if formats.kenwood {
        let symbol = match wp.symbol {
            ',' => '|',
            '*' => '~',
            c => c,
        };
        let mut s = format!(
            "$PKWDWPL,{},V,{},{},{},{},{},{},{},{},{},{}{}",
            now.format("%H%M%S"),
            slat,
            ns,
            slon,
            ew,
            opt_field(wp.speed),
            opt_field(wp.course),
            now.format("%d%m%y"),
            opt_field(wp.alt),
            name,
            wp.symtab,
            symbol
        );
        append_checksum(&mut s);
        out.push(s);
    }
    out
}

/// Where sentences go.
pub struct WaypointSender {
    formats: WaypointFormats,
    serial: Option<Mutex<Box<dyn SerialPort>>>,
    udp: Option<(UdpSocket, SocketAddr)>,
}

impl std::fmt::Debug for WaypointSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaypointSender")
            .field("formats", &self.formats)
            .field("serial", &self.serial.is_some())
            .field("udp", &self.udp.as_ref().map(|(_, dest)| *dest))
            .finish()
    }
}

/// Resolves a host name, trying a literal address first.
pub async fn resolve_host(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let resolver = TokioAsyncResolver::tokio_from_system_conf()
        .map_err(|e| Error::network(format!("Failed to create resolver: {}", e)))?;
    let found = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| Error::network(format!("Couldn't get address for {}: {}", host, e)))?;
    let mut addrs: Vec<IpAddr> = found.iter().collect();
    addrs.sort_by_key(|ip| !ip.is_ipv4());
    addrs
        .into_iter()
        .next()
        .ok_or_else(|| Error::network(format!("No address for {}", host)))
}

impl WaypointSender {
    /// Opens whichever outputs are configured. An output that fails to
    /// open is logged and left out.
    pub async fn open(config: &WaypointConfig) -> Self {
        let udp = match (&config.udp_host, config.udp_port) {
            (Some(host), Some(port)) if port > 0 => match Self::open_udp(host, port).await {
                Ok(u) => Some(u),
                Err(e) => {
                    error!("Waypoint: {}", e);
                    None
                }
            },
            _ => None,
        };

        let serial = config.serial_port.as_ref().and_then(|device| {
            match serialport::new(device, WAYPOINT_BAUD).open() {
                Ok(p) => {
                    info!(device = %device, "Waypoint serial output opened");
                    Some(Mutex::new(p))
                }
                Err(e) => {
                    error!(device = %device, "Unable to open serial port for waypoint output: {}", e);
                    None
                }
            }
        });

        WaypointSender { formats: config.formats, serial, udp }
    }

    async fn open_udp(host: &str, port: u16) -> Result<(UdpSocket, SocketAddr)> {
        let dest = SocketAddr::new(resolve_host(host).await?, port);
        let bind: SocketAddr = if dest.is_ipv4() { ([0, 0, 0, 0], 0).into() } else { ([0u16; 8], 0).into() };
        let sock = UdpSocket::bind(bind)
            .map_err(|e| Error::network(format!("Couldn't create socket for waypoint send to {}: {}", host, e)))?;
        sock.set_nonblocking(true)
            .map_err(|e| Error::network(format!("Failed to set non-blocking: {}", e)))?;
        info!(%dest, "Waypoint UDP output ready");
        Ok((sock, dest))
    }

    /// True if there is anywhere to send to
    pub fn is_active(&self) -> bool {
        self.serial.is_some() || self.udp.is_some()
    }

    /// Sends a position as every enabled sentence format.
    pub fn send_waypoint(&self, wp: &Waypoint) {
        if !self.is_active() {
            return;
        }
        for s in sentences(&self.formats, wp, Utc::now()) {
            self.send_sentence(&s);
        }
    }

    /// Passes an AIS sentence, already checksummed, through unchanged.
    pub fn send_ais(&self, sentence: &str) {
        if self.is_active() && self.formats.ais {
            self.send_sentence(sentence);
        }
    }

    fn send_sentence(&self, sentence: &str) {
        debug!(sentence, "waypoint send sentence");
        let mut line = format!("{}\r\n", sentence).into_bytes();
        line.truncate(MAX_SENTENCE_LEN);

        if let Some(port) = &self.serial {
            let mut port = port.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = port.write_all(&line) {
                error!("Waypoint serial write failed: {}", e);
            }
        }
        if let Some((sock, dest)) = &self.udp {
            match sock.send_to(&line, dest) {
                Ok(n) if n == line.len() => {}
                Ok(n) => error!(sent = n, len = line.len(), "Short waypoint UDP send"),
                Err(e) => error!("Failed to send waypoint via UDP: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn wp() -> Waypoint {
        Waypoint {
            name: "test,5".into(),
            lat: Some(42.619),
            lon: Some(-71.347166667),
            symtab: '/',
            symbol: '\'',
            alt: None,
            course: None,
            speed: None,
        }
    }

    #[test]
    fn test_checksum() {
        let mut s = String::from("$GPWPL,4237.1400,N,07120.8300,W,test");
        append_checksum(&mut s);
        let body = &s[1..s.len() - 3];
        let cs = body.bytes().fold(0u8, |a, b| a ^ b);
        assert_eq!(&s[s.len() - 2..], format!("{:02X}", cs));
        assert_eq!(nmea_checksum("$"), 0);
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(latitude_to_nmea(Some(42.619)), ("4237.1400".to_string(), "N"));
        assert_eq!(longitude_to_nmea(Some(-71.347166667)), ("07120.8300".to_string(), "W"));
        assert_eq!(latitude_to_nmea(None), (String::new(), ""));
        // Rounds up to a whole degree rather than 60 minutes.
        assert_eq!(latitude_to_nmea(Some(-10.9999999999)), ("1100.0000".to_string(), "S"));
        assert_eq!(longitude_to_nmea(Some(200.0)).0, "18000.0000");
    }

    #[test]
    fn test_sentences() {
        let now = Utc.with_ymd_and_hms(2016, 3, 20, 20, 47, 14).unwrap();
        let all = WaypointFormats { nmea_generic: true, kenwood: true, ais: true };
        let out = sentences(&all, &wp(), now);
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("$GPWPL,4237.1400,N,07120.8300,W,test|5*"));
        assert_eq!(out[1], "$PKWDWPL,204714,V,4237.1400,N,07120.8300,W,,,200316,,test|5,/'*61");

        let mut star = wp();
        star.name = "test4".into();
        star.symbol = '*';
        let only_kw = WaypointFormats { nmea_generic: false, kenwood: true, ais: false };
        let out = sentences(&only_kw, &star, now);
        assert_eq!(out.len(), 1);
        assert!(out[0].contains(",test4,/~*"));
    }

    #[test]
    fn test_long_name_cut() {
        let mut w = wp();
        w.name = "ABCDEFGHIJKLMNOP".into();
        let f = WaypointFormats { nmea_generic: true, kenwood: false, ais: false };
        let out = sentences(&f, &w, Utc::now());
        assert!(out[0].contains(",ABCDEFGHIJK*"));
    }

    #[tokio::test]
    async fn test_udp_output() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let config = WaypointConfig {
            serial_port: None,
            udp_host: Some("127.0.0.1".into()),
            udp_port: Some(rx.local_addr().unwrap().port()),
            formats: WaypointFormats { nmea_generic: true, kenwood: false, ais: true },
        };
        let sender = WaypointSender::open(&config).await;
        assert!(sender.is_active());

        sender.send_waypoint(&wp());
        let mut buf = [0u8; 512];
        let n = rx.recv(&mut buf).unwrap();
        let line = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(line.starts_with("$GPWPL,"));
        assert!(line.ends_with("\r\n"));

        let ais = "!AIVDM,1,1,,A,35NO=dPOiAJriVDH@94E84AJ0000,0*4B";
        sender.send_ais(ais);
        let n = rx.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], format!("{}\r\n", ais).as_bytes());
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let sender = WaypointSender::open(&WaypointConfig::default()).await;
        assert!(!sender.is_active());
        sender.send_waypoint(&wp());
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        assert_eq!(resolve_host("10.1.2.3").await.unwrap(), IpAddr::from([10, 1, 2, 3]));
    }
}
