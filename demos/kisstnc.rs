use ax25_tnc::core::TncConfig;
use ax25_tnc::util::logging::init_logging;
use ax25_tnc::Tnc;

#[tokio::main]
async fn main() {
    // Optional JSON configuration file, otherwise one radio channel with
    // KISS on 8001 and AGW on 8000.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Can't read {}: {}", path, e);
                std::process::exit(1);
            });
            serde_json::from_str::<TncConfig>(&text).unwrap_or_else(|e| {
                eprintln!("Bad configuration in {}: {}", path, e);
                std::process::exit(1);
            })
        }
        None => TncConfig::default(),
    };
    init_logging(&config.log);

    println!("Starting TNC:");
    for (i, chan) in config.channels.iter().enumerate() {
        println!("- Channel {}: {:?} {}", i, chan.medium, chan.mycall);
    }

    let tnc = match Tnc::start(config).await {
        Ok(tnc) => tnc,
        Err(e) => {
            eprintln!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };
    for addr in tnc.kiss_addrs() {
        println!("- KISS TCP on {}", addr);
    }
    if let Some(addr) = tnc.agw_addr() {
        println!("- AGW on {}", addr);
    }
    if let Some(name) = tnc.pty_name() {
        println!("- KISS pseudo terminal {}", name);
    }
    println!("\nPress Ctrl-C to stop");

    if let Err(e) = tnc.run_until_signal().await {
        eprintln!("{}", e);
    }
}
