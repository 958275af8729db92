//! tracker-beacon CLI - provision a beacon and exercise its payloads on the host

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracker_beacon_lib::advertisement::AdvertisementPayload;
use tracker_beacon_lib::config::KEY_FILE_NAME;
use tracker_beacon_lib::keystore::generate_key;
use tracker_beacon_lib::{
    Beacon, BeaconConfig, Clock, DeviceIdentity, FileKeyStore, FixedClock, Flags, KeyStore,
    LogTransport, SystemClock, VALIDATION_LEN, ValidationVerifier,
};

#[derive(Parser)]
#[command(name = "tracker-beacon")]
#[command(about = "Identity advertisement and validation tooling for tracking beacons", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the platform data directory)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration and provision a fresh random key
    Init {
        /// Device short identifier (12 hex digits)
        identity: String,

        /// Overwrite an existing configuration and key
        #[arg(short = 'f', long)]
        force: bool,
    },
    /// Show the configuration
    Show,
    /// Encode the advertisement and hand it to the (logging) radio
    Advertise {
        /// Flags byte (e.g. 0x01 for low battery)
        #[arg(long)]
        flags: Option<String>,

        /// Battery reading in millivolts; sets the low-battery flag below threshold
        #[arg(long)]
        battery_mv: Option<u16>,
    },
    /// Simulate a read of the validation attribute
    Read {
        /// Unix time to sign instead of the system clock
        #[arg(long)]
        at: Option<u32>,

        /// Size of the read buffer offered by the transport
        #[arg(long, default_value_t = VALIDATION_LEN)]
        mtu: usize,
    },
    /// Decode and checksum-verify an advertisement payload
    DecodeAdv {
        /// Payload hex
        payload: String,
    },
    /// Verify a validation response with the configured key
    Verify {
        /// Response hex
        response: String,

        /// Reject responses older than this many seconds
        #[arg(long)]
        max_age: Option<u32>,

        /// Allowed clock skew for responses from the future, in seconds
        #[arg(long, default_value_t = 5)]
        max_skew: u32,

        /// Reader time instead of the system clock
        #[arg(long)]
        at: Option<u32>,
    },
}

/// Parse a byte from "0x01" or "1"
fn parse_byte(s: &str) -> Result<u8, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value '{s}': {e}"))
    } else {
        s.parse::<u8>()
            .map_err(|e| format!("Invalid byte value '{s}': {e}"))
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    hex::decode(&cleaned).map_err(|e| format!("Invalid hex '{s}': {e}"))
}

fn config_path(cli_path: Option<&Path>) -> Result<PathBuf, String> {
    match cli_path {
        Some(p) => Ok(p.to_path_buf()),
        None => BeaconConfig::default_path().map_err(|e| e.to_string()),
    }
}

fn load_config(path: &Path) -> Result<BeaconConfig, String> {
    BeaconConfig::load_from_file(path).map_err(|e| {
        format!(
            "Failed to load configuration {}: {e}\nRun 'tracker-beacon init <identity>' first.",
            path.display()
        )
    })
}

fn init(path: &Path, identity: &str, force: bool) -> Result<(), String> {
    let identity: DeviceIdentity = identity.parse().map_err(|e| format!("{e}"))?;

    if path.exists() && !force {
        return Err(format!(
            "Configuration {} already exists (use --force to overwrite)",
            path.display()
        ));
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let config = BeaconConfig::new(identity, PathBuf::from(KEY_FILE_NAME));
    config.save_to_file(path).map_err(|e| e.to_string())?;

    let key = generate_key().map_err(|e| e.to_string())?;
    let store = FileKeyStore::new(dir.join(KEY_FILE_NAME));
    store.provision(&key[..]).map_err(|e| e.to_string())?;

    println!("✓ Beacon {identity} provisioned");
    println!("  Config: {}", path.display());
    println!("  Key:    {}", store.path().display());
    Ok(())
}

fn show(config: &BeaconConfig) {
    println!("\nBeacon configuration:");
    println!("  Identity:        {}", config.identity);
    println!("  Device type:     0x{:02x}", config.device_type);
    println!("  Firmware major:  {}", config.firmware_major);
    println!("  Vendor tag:      0x{:04x}", config.vendor_tag);
    println!("  Service UUID:    {}", hex::encode(config.service_uuid));
    println!("  Key file:        {}", config.key_file.display());
    println!("  Low battery:     < {} mV", config.low_battery_threshold_mv);
}

fn advertise(
    config: &BeaconConfig,
    flags: Option<&str>,
    battery_mv: Option<u16>,
) -> Result<(), String> {
    let store = FileKeyStore::new(&config.key_file);
    let mut beacon = Beacon::from_key_store(config, &store, SystemClock, LogTransport)
        .map_err(|e| e.to_string())?;

    if let Some(flags) = flags {
        beacon
            .set_flags(Flags::from_bits(parse_byte(flags)?))
            .map_err(|e| e.to_string())?;
    }
    if let Some(mv) = battery_mv {
        beacon.update_battery(mv).map_err(|e| e.to_string())?;
    }
    beacon.start().map_err(|e| e.to_string())?;

    println!("Flags:         {}", beacon.flags());
    println!("Advertisement: {}", hex::encode(beacon.advertisement()));
    Ok(())
}

fn read(config: &BeaconConfig, at: Option<u32>, mtu: usize) -> Result<(), String> {
    let store = FileKeyStore::new(&config.key_file);
    let clock = FixedClock::new(at.unwrap_or_else(|| SystemClock.now()));
    let beacon = Beacon::from_key_store(config, &store, clock, LogTransport)
        .map_err(|e| e.to_string())?;

    let mut buf = vec![0u8; mtu];
    let n = beacon.on_validation_read(&mut buf);
    if n == 0 {
        return Err(format!(
            "No response: read buffer of {mtu} bytes is smaller than {VALIDATION_LEN}"
        ));
    }
    println!("{}", hex::encode(&buf[..n]));
    Ok(())
}

fn decode_adv(payload: &str) -> Result<(), String> {
    let bytes = decode_hex(payload)?;
    let adv = AdvertisementPayload::parse(&bytes).map_err(|e| e.to_string())?;
    println!("✓ Checksum OK");
    println!("  Device type:    0x{:02x}", adv.device_type);
    println!("  Firmware major: {}", adv.fw_major);
    println!("  Flags:          {}", adv.flags);
    println!("  Identity:       {}", adv.identity);
    Ok(())
}

fn verify(
    config: &BeaconConfig,
    response: &str,
    max_age: Option<u32>,
    max_skew: u32,
    at: Option<u32>,
) -> Result<(), String> {
    let bytes = decode_hex(response)?;
    let key = FileKeyStore::new(&config.key_file)
        .load_signing_key()
        .map_err(|e| e.to_string())?;

    let mut verifier = ValidationVerifier::new(key).with_expected_identity(config.identity);
    if let Some(max_age) = max_age {
        verifier = verifier.with_freshness(max_age, max_skew);
    } else {
        log::warn!("No --max-age given: replayed responses will be accepted");
    }

    let now = at.unwrap_or_else(|| SystemClock.now());
    let payload = verifier.verify(&bytes, now).map_err(|e| e.to_string())?;

    println!("✓ Signature valid");
    println!("  Identity:  {}", payload.identity);
    println!("  Signed at: {}", payload.timestamp);
    if let Some(signed) = chrono::DateTime::from_timestamp(i64::from(payload.timestamp), 0) {
        println!("             {}", signed.to_rfc3339());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    let path = config_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { identity, force } => init(&path, &identity, force),
        Commands::Show => {
            show(&load_config(&path)?);
            Ok(())
        }
        Commands::Advertise { flags, battery_mv } => {
            advertise(&load_config(&path)?, flags.as_deref(), battery_mv)
        }
        Commands::Read { at, mtu } => read(&load_config(&path)?, at, mtu),
        Commands::DecodeAdv { payload } => decode_adv(&payload),
        Commands::Verify {
            response,
            max_age,
            max_skew,
            at,
        } => verify(&load_config(&path)?, &response, max_age, max_skew, at),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
