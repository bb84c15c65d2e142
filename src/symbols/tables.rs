//! Built-in APRS symbol tables, indexed by symbol code minus space.
//! Each entry is the GPSxy destination code and a description.

use super::SYMTAB_SIZE;

/// Primary table, `/`
pub(super) const PRIMARY: [(&str, &str); SYMTAB_SIZE] = [
    ("~~", "--no-symbol--"), // sp
    ("BB", "Police, Sheriff"), // !
    ("BC", "reserved  (was rain)"), // "
    ("BD", "DIGI (white center)"), // #
    ("BE", "PHONE"), // $
    ("BF", "DX CLUSTER"), // %
    ("BG", "HF GATEway"), // &
    ("BH", "Small AIRCRAFT"), // '
    ("BI", "Mobile Satellite Station"), // (
    ("BJ", "Wheelchair (handicapped)"), // )
    ("BK", "SnowMobile"), // *
    ("BL", "Red Cross"), // +
    ("BM", "Boy Scouts"), // ,
    ("BN", "House QTH (VHF)"), // -
    ("BO", "X"), // .
    ("BP", "Red Dot"), // /
    ("P0", "# circle (obsolete)"), // 0
    ("P1", "TBD"), // 1
    ("P2", "TBD"), // 2
    ("P3", "TBD"), // 3
    ("P4", "TBD"), // 4
    ("P5", "TBD"), // 5
    ("P6", "TBD"), // 6
    ("P7", "TBD"), // 7
    ("P8", "TBD"), // 8
    ("P9", "TBD"), // 9
    ("MR", "FIRE"), // :
    ("MS", "Campground (Portable ops)"), // ;
    ("MT", "Motorcycle"), // <
    ("MU", "RAILROAD ENGINE"), // =
    ("MV", "CAR"), // >
    ("MW", "SERVER for Files"), // ?
    ("MX", "HC FUTURE predict (dot)"), // @
    ("PA", "Aid Station"), // A
    ("PB", "BBS or PBBS"), // B
    ("PC", "Canoe"), // C
    ("PD", ""), // D
    ("PE", "EYEBALL (Eye catcher!)"), // E
    ("PF", "Farm Vehicle (tractor)"), // F
    ("PG", "Grid Square (6 digit)"), // G
    ("PH", "HOTEL (blue bed symbol)"), // H
    ("PI", "TcpIp on air network stn"), // I
    ("PJ", ""), // J
    ("PK", "School"), // K
    ("PL", "PC user"), // L
    ("PM", "MacAPRS"), // M
    ("PN", "NTS Station"), // N
    ("PO", "BALLOON"), // O
    ("PP", "Police"), // P
    ("PQ", "TBD"), // Q
    ("PR", "REC. VEHICLE"), // R
    ("PS", "SHUTTLE"), // S
    ("PT", "SSTV"), // T
    ("PU", "BUS"), // U
    ("PV", "ATV"), // V
    ("PW", "National WX Service Site"), // W
    ("PX", "HELO"), // X
    ("PY", "YACHT (sail)"), // Y
    ("PZ", "WinAPRS"), // Z
    ("HS", "Human/Person (HT)"), // [
    ("HT", "TRIANGLE(DF station)"), // \
    ("HU", "MAIL/PostOffice(was PBBS)"), // ]
    ("HV", "LARGE AIRCRAFT"), // ^
    ("HW", "WEATHER Station (blue)"), // _
    ("HX", "Dish Antenna"), // `
    ("LA", "AMBULANCE"), // a
    ("LB", "BIKE"), // b
    ("LC", "Incident Command Post"), // c
    ("LD", "Fire dept"), // d
    ("LE", "HORSE (equestrian)"), // e
    ("LF", "FIRE TRUCK"), // f
    ("LG", "Glider"), // g
    ("LH", "HOSPITAL"), // h
    ("LI", "IOTA (islands on the air)"), // i
    ("LJ", "JEEP"), // j
    ("LK", "TRUCK"), // k
    ("LL", "Laptop"), // l
    ("LM", "Mic-E Repeater"), // m
    ("LN", "Node (black bulls-eye)"), // n
    ("LO", "EOC"), // o
    ("LP", "ROVER (puppy, or dog)"), // p
    ("LQ", "GRID SQ shown above 128 m"), // q
    ("LR", "Repeater"), // r
    ("LS", "SHIP (pwr boat)"), // s
    ("LT", "TRUCK STOP"), // t
    ("LU", "TRUCK (18 wheeler)"), // u
    ("LV", "VAN"), // v
    ("LW", "WATER station"), // w
    ("LX", "xAPRS (Unix)"), // x
    ("LY", "YAGI @ QTH"), // y
    ("LZ", "TBD"), // z
    ("J1", ""), // {
    ("J2", "TNC Stream Switch"), // |
    ("J3", ""), // }
    ("J3", "TNC Stream Switch"), // ~
];

/// Alternate table, `\` or an overlay
pub(super) const ALTERNATE: [(&str, &str); SYMTAB_SIZE] = [
    ("~~", "--no-symbol--"), // sp
    ("OB", "EMERGENCY (!)"), // !
    ("OC", "reserved"), // "
    ("OD", "OVERLAY DIGI (green star)"), // #
    ("OE", "Bank or ATM  (green box)"), // $
    ("OF", "Power Plant with overlay"), // %
    ("OG", "I=Igte IGate R=RX T=1hopTX 2=2hopTX"), // &
    ("OH", "Crash (& now Incident sites)"), // '
    ("OI", "CLOUDY (other clouds w ovrly)"), // (
    ("OJ", "Firenet MEO, MODIS Earth Obs."), // )
    ("OK", "SNOW (& future ovrly codes)"), // *
    ("OL", "Church"), // +
    ("OM", "Girl Scouts"), // ,
    ("ON", "House (H=HF) (O = Op Present)"), // -
    ("OO", "Ambiguous (Big Question mark)"), // .
    ("OP", "Waypoint Destination"), // /
    ("A0", "CIRCLE (E/I/W=IRLP/Echolink/WIRES)"), // 0
    ("A1", ""), // 1
    ("A2", ""), // 2
    ("A3", ""), // 3
    ("A4", ""), // 4
    ("A5", ""), // 5
    ("A6", ""), // 6
    ("A7", ""), // 7
    ("A8", "802.11 or other network node"), // 8
    ("A9", "Gas Station (blue pump)"), // 9
    ("NR", "Hail (& future ovrly codes)"), // :
    ("NS", "Park/Picnic area"), // ;
    ("NT", "ADVISORY (one WX flag)"), // <
    ("NU", "APRStt Touchtone (DTMF users)"), // =
    ("NV", "OVERLAID CAR"), // >
    ("NW", "INFO Kiosk  (Blue box with ?)"), // ?
    ("NX", "HURRICANE/Trop-Storm"), // @
    ("AA", "overlayBOX DTMF & RFID & XO"), // A
    ("AB", "Blwng Snow (& future codes)"), // B
    ("AC", "Coast Guard"), // C
    ("AD", "Drizzle (proposed APRStt)"), // D
    ("AE", "Smoke (& other vis codes)"), // E
    ("AF", "Freezng rain (&future codes)"), // F
    ("AG", "Snow Shwr (& future ovrlys)"), // G
    ("AH", "Haze (& Overlay Hazards)"), // H
    ("AI", "Rain Shower"), // I
    ("AJ", "Lightning (& future ovrlys)"), // J
    ("AK", "Kenwood HT (W)"), // K
    ("AL", "Lighthouse"), // L
    ("AM", "MARS (A=Army,N=Navy,F=AF)"), // M
    ("AN", "Navigation Buoy"), // N
    ("AO", "Rocket"), // O
    ("AP", "Parking"), // P
    ("AQ", "QUAKE"), // Q
    ("AR", "Restaurant"), // R
    ("AS", "Satellite/Pacsat"), // S
    ("AT", "Thunderstorm"), // T
    ("AU", "SUNNY"), // U
    ("AV", "VORTAC Nav Aid"), // V
    ("AW", "# NWS site (NWS options)"), // W
    ("AX", "Pharmacy Rx (Apothicary)"), // X
    ("AY", "Radios and devices"), // Y
    ("AZ", ""), // Z
    ("DS", "W.Cloud (& humans w Ovrly)"), // [
    ("DT", "New overlayable GPS symbol"), // \
    ("DU", ""), // ]
    ("DV", "# Aircraft (shows heading)"), // ^
    ("DW", "# WX site (green digi)"), // _
    ("DX", "Rain (all types w ovrly)"), // `
    ("SA", "ARRL, ARES, WinLINK"), // a
    ("SB", "Blwng Dst/Snd (& others)"), // b
    ("SC", "CD triangle RACES/SATERN/etc"), // c
    ("SD", "DX spot by callsign"), // d
    ("SE", "Sleet (& future ovrly codes)"), // e
    ("SF", "Funnel Cloud"), // f
    ("SG", "Gale Flags"), // g
    ("SH", "Store. or HAMFST Hh=HAM store"), // h
    ("SI", "BOX or points of Interest"), // i
    ("SJ", "WorkZone (Steam Shovel)"), // j
    ("SK", "Special Vehicle SUV,ATV,4x4"), // k
    ("SL", "Areas      (box,circles,etc)"), // l
    ("SM", "Value Sign (3 digit display)"), // m
    ("SN", "OVERLAY TRIANGLE"), // n
    ("SO", "small circle"), // o
    ("SP", "Prtly Cldy (& future ovrlys)"), // p
    ("SQ", ""), // q
    ("SR", "Restrooms"), // r
    ("SS", "OVERLAY SHIP/boat (top view)"), // s
    ("ST", "Tornado"), // t
    ("SU", "OVERLAID TRUCK"), // u
    ("SV", "OVERLAID Van"), // v
    ("SW", "Flooding"), // w
    ("SX", "Wreck or Obstruction ->X<-"), // x
    ("SY", "Skywarn"), // y
    ("SZ", "OVERLAID Shelter"), // z
    ("Q1", "Fog (& future ovrly codes)"), // {
    ("Q2", "TNC Stream Switch"), // |
    ("Q3", ""), // }
    ("Q4", "TNC Stream Switch"), // ~
];
