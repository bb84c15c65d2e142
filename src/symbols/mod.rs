//! APRS symbols
//!
//! A symbol is a table identifier (`/` primary, `\` alternate, or an
//! overlay character A-Z / 0-9 on the alternate table) plus a code from
//! `!` to `~`. Besides the information field, it can be carried in the
//! destination address (GPSCnn, GPSEnn, GPSxy[z], SPCxy, SYMxy) or implied
//! by the source SSID.
//!
//! The built-in tables never change. Overlay meanings keep evolving and are
//! read from `symbols-new.txt` when available.

mod tables;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use tracing::{debug, warn};

use self::tables::{ALTERNATE, PRIMARY};

/// Entries in each built-in table, space through tilde.
pub const SYMTAB_SIZE: usize = 95;

/// Where `symbols-new.txt` is looked for, in order.
pub const SEARCH_LOCATIONS: &[&str] = &[
    "symbols-new.txt",
    "data/symbols-new.txt",
    "../data/symbols-new.txt",
    "/usr/local/share/direwolf/symbols-new.txt",
    "/usr/share/direwolf/symbols-new.txt",
];

/// Symbol implied by the source SSID, primary table.
const SSID_TO_SYM: [char; 16] = [
    ' ', 'a', 'U', 'f', 'b', 'Y', 'X', '\'', 's', '>', '<', 'O', 'j', 'R', 'k', 'v',
];

/// Symbol table identifier and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub table: char,
    pub code: char,
}

impl Symbol {
    pub fn new(table: char, code: char) -> Self {
        Symbol { table, code }
    }
}

fn is_overlay(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit()
}

fn is_code(c: char) -> bool {
    ('!'..='~').contains(&c)
}

fn index(code: char) -> usize {
    (code as usize).wrapping_sub(' ' as usize)
}

/// A meaning given to an overlaid symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSymbol {
    pub overlay: char,
    pub symbol: char,
    pub description: String,
}

/// Parses one line of `symbols-new.txt`: `<overlay><symbol> = <description>`,
/// with `-` accepted in place of `=`. `None` for anything else.
fn parse_new_symbol(line: &str) -> Option<NewSymbol> {
    let b = line.as_bytes();
    if b.len() <= 6 || !line.is_ascii() {
        return None;
    }
    let (overlay, symbol) = (b[0] as char, b[1] as char);
    let good = (overlay == '/' || overlay == '\\' || is_overlay(overlay))
        && is_code(symbol)
        && b[2] == b' '
        && (b[3] == b'=' || b[3] == b'-')
        && b[4] == b' '
        && b[5] != b' ';
    if !good {
        return None;
    }
    Some(NewSymbol {
        overlay,
        symbol,
        description: line[5..].trim_end().to_string(),
    })
}

/// Symbol dictionary: the built-in tables plus the new-symbol list.
#[derive(Debug, Clone, Default)]
pub struct Symbols {
    new_syms: Vec<NewSymbol>,
}

impl Symbols {
    /// Built-in tables only
    pub fn builtin() -> Self {
        Symbols::default()
    }

    /// Reads the new-symbol list from a reader. Lines that look like
    /// entries but do not parse are skipped with a warning.
    pub fn from_reader<R: BufRead>(reader: R) -> Self {
        let mut new_syms = Vec::new();
        for line in reader.lines().map_while(|l| l.ok()) {
            match parse_new_symbol(&line) {
                Some(sym) => new_syms.push(sym),
                None => {
                    let b = line.as_bytes();
                    if b.len() > 4 && b[2] == b' ' && (b[3] == b'=' || b[3] == b'-') && b[4] == b' ' {
                        warn!(line = %line, "Skipping malformed symbol line");
                    }
                }
            }
        }
        Symbols { new_syms }
    }

    /// Reads `symbols-new.txt` from the first of `locations` that opens.
    pub fn load_from<P: AsRef<Path>>(locations: &[P]) -> Self {
        for loc in locations {
            if let Ok(f) = File::open(loc) {
                let syms = Symbols::from_reader(BufReader::new(f));
                debug!(path = %loc.as_ref().display(), count = syms.new_syms.len(), "Loaded new symbols");
                return syms;
            }
        }
        warn!("Could not open 'symbols-new.txt'. The \"new\" OVERLAID character information will not be available.");
        Symbols::builtin()
    }

    /// Process-wide dictionary, loaded from `SEARCH_LOCATIONS` on first use.
    pub fn global() -> &'static Symbols {
        static GLOBAL: OnceLock<Symbols> = OnceLock::new();
        GLOBAL.get_or_init(|| Symbols::load_from(SEARCH_LOCATIONS))
    }

    /// The loaded overlay meanings
    pub fn new_symbols(&self) -> &[NewSymbol] {
        &self.new_syms
    }

    /// Human readable description. Invalid symbols describe as
    /// "--no-symbol--".
    pub fn get_description(&self, sym: Symbol) -> String {
        let no_symbol = PRIMARY[0].1.to_string();
        if sym.table != '/' && sym.table != '\\' && !is_overlay(sym.table) {
            warn!(table = %sym.table, "Symbol table identifier is not '/', '\\', or an overlay character");
            return no_symbol;
        }
        let code = if (' '..='~').contains(&sym.code) {
            sym.code
        } else {
            warn!("Symbol code is not a printable character");
            ' '
        };

        if let Some(n) = self.new_syms.iter().find(|n| n.overlay == sym.table && n.symbol == code) {
            return n.description.clone();
        }
        match sym.table {
            '/' => PRIMARY[index(code)].1.to_string(),
            '\\' => ALTERNATE[index(code)].1.to_string(),
            overlay => format!("{} w/overlay {}", ALTERNATE[index(code)].1, overlay),
        }
    }

    /// Finds a symbol whose description contains `description`, ignoring
    /// case. With an overlay, the alternate table is tried first with that
    /// overlay. `None` when nothing matches; house, `/-`, is the usual
    /// fallback.
    pub fn code_from_description(&self, overlay: Option<char>, description: &str) -> Option<Symbol> {
        let want = description.to_lowercase();
        let matches = |d: &str| d.to_lowercase().contains(&want);

        if let Some(ov) = overlay.filter(|&c| is_overlay(c)) {
            if let Some(j) = (1..SYMTAB_SIZE).find(|&j| matches(ALTERNATE[j].1)) {
                return Some(Symbol::new(ov, (b' ' + j as u8) as char));
            }
        }
        if let Some(j) = (1..SYMTAB_SIZE).find(|&j| matches(PRIMARY[j].1)) {
            return Some(Symbol::new('/', (b' ' + j as u8) as char));
        }
        if let Some(j) = (1..SYMTAB_SIZE).find(|&j| matches(ALTERNATE[j].1)) {
            return Some(Symbol::new('\\', (b' ' + j as u8) as char));
        }
        self.new_syms
            .iter()
            .find(|n| matches(&n.description))
            .map(|n| Symbol::new(n.overlay, n.symbol))
    }
}

/// Symbol carried by the destination address, or implied by the source
/// SSID for `$` (raw GPS) reports. Not for Mic-E, whose destination holds
/// position data.
pub fn from_dest_or_src(dti: char, src: &str, dest: &str) -> Option<Symbol> {
    if dti != '\'' && dti != '`' {
        if let Some(sym) = from_dest(dest) {
            return Some(sym);
        }
    }

    if dti == '$' {
        if let Some((_, ssid)) = src.split_once('-') {
            if let Ok(ssid @ 1..=15) = ssid.parse::<usize>() {
                return Some(Symbol::new('/', SSID_TO_SYM[ssid]));
            }
        }
    }
    None
}

fn leading_number(s: &str) -> Option<usize> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn from_dest(dest: &str) -> Option<Symbol> {
    let numbered = |prefix: &str| {
        dest.strip_prefix(prefix)
            .and_then(leading_number)
            .filter(|nn| (1..=94).contains(nn))
            .map(|nn| (b' ' + nn as u8) as char)
    };
    if let Some(code) = numbered("GPSC") {
        return Some(Symbol::new('/', code));
    }
    if let Some(code) = numbered("GPSE") {
        return Some(Symbol::new('\\', code));
    }

    if !["GPS", "SPC", "SYM"].iter().any(|p| dest.starts_with(p)) {
        return None;
    }
    let xy = dest.get(3..5)?;
    if let Some(j) = (1..SYMTAB_SIZE).find(|&j| PRIMARY[j].0 == xy) {
        return Some(Symbol::new('/', (b' ' + j as u8) as char));
    }
    let j = (1..SYMTAB_SIZE).find(|&j| ALTERNATE[j].0 == xy)?;
    let table = match dest.get(5..).and_then(|z| z.chars().next()) {
        Some(z) if is_overlay(z) => z,
        _ => '\\',
    };
    Some(Symbol::new(table, (b' ' + j as u8) as char))
}

/// Destination address encoding: GPSCnn primary, GPSEnn alternate,
/// GPSxyz alternate with overlay `z`.
pub fn into_dest(sym: Symbol) -> Option<String> {
    if !is_code(sym.code) {
        warn!("Could not convert symbol \"{}{}\" to GPSxyz destination format", sym.table, sym.code);
        return None;
    }
    let nn = index(sym.code);
    match sym.table {
        '/' => Some(format!("GPSC{:02}", nn)),
        '\\' => Some(format!("GPSE{:02}", nn)),
        ov if is_overlay(ov) => Some(format!("GPS{}{}", ALTERNATE[nn].0, ov)),
        _ => {
            warn!("Could not convert symbol \"{}{}\" to GPSxyz destination format", sym.table, sym.code);
            None
        }
    }
}

/// Touch tone keypad, two-key method: row is the key, column the press.
const TWO_KEY: [[Option<char>; 4]; 10] = [
    [Some(' '), None, None, None],
    [None, None, None, None],
    [Some('A'), Some('B'), Some('C'), None],
    [Some('D'), Some('E'), Some('F'), None],
    [Some('G'), Some('H'), Some('I'), None],
    [Some('J'), Some('K'), Some('L'), None],
    [Some('M'), Some('N'), Some('O'), None],
    [Some('P'), Some('Q'), Some('R'), Some('S')],
    [Some('T'), Some('U'), Some('V'), None],
    [Some('W'), Some('X'), Some('Y'), Some('Z')],
];

fn two_key(c: char) -> String {
    if c.is_ascii_digit() {
        return c.to_string();
    }
    let c = c.to_ascii_uppercase();
    for (row, keys) in TWO_KEY.iter().enumerate() {
        if let Some(col) = keys.iter().position(|&k| k == Some(c)) {
            return format!("{}{}", row, (b'A' + col as u8) as char);
        }
    }
    String::new()
}

/// APRStt tone sequence: AB1nn primary, AB2nn alternate, AB0nn plus the
/// two-key overlay for overlaid symbols.
pub fn to_tones(sym: Symbol) -> String {
    let nn = index(sym.code);
    match sym.table {
        '/' => format!("AB1{:02}", nn),
        ov if is_overlay(ov) => format!("AB0{:02}{}", nn, two_key(ov)),
        _ => format!("AB2{:02}", nn),
    }
}
