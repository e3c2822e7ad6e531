//! WXT520 CLI
//!
//! Finds a Vaisala WXT520 on the serial ports, switches it into automatic
//! mode and prints the decoded readings. Captured lines can be decoded
//! offline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wxt520_core::cli::print_exit_codes;
use wxt520_core::config::ConfigError;
use wxt520_core::core::protocol::{compute_checksum, decode_line, verify_checksum};
use wxt520_core::core::transport::list_ports;
use wxt520_core::{
    discover, AppConfig, CliResult, Discovery, ExitCodes, OutputFormat, ReadingSink,
    SerialOpener, Session, SessionError, TransportError, WriterSink,
};

/// WXT520 CLI
#[derive(Parser, Debug)]
#[command(
    name = "wxt520",
    version,
    about = "Reader for the Vaisala WXT520 weather transmitter",
    long_about = None
)]
struct Cli {
    /// Output format (overrides the config file)
    #[arg(short, long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "WXT520_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Scan ports and baud rates for a WXT520
    Discover {
        /// Baud rates to try (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        bauds: Vec<u32>,
    },

    /// Stream readings from a device in automatic mode
    Run {
        /// Serial port of the device (skips discovery once an address is known)
        #[arg(short, long)]
        port: Option<String>,

        /// Device address
        #[arg(short, long)]
        address: Option<char>,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Stop after this many readings
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Verify and decode captured lines from a file or stdin
    Decode {
        /// Capture file (stdin when omitted)
        file: Option<PathBuf>,

        /// Fail when any line is rejected
        #[arg(long)]
        strict: bool,
    },

    /// Append the checksum to a payload
    Checksum {
        /// Payload, e.g. "0r1,Dm=090D,Sm=2.2M"
        payload: String,
    },

    /// Show exit codes
    ExitCodes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = execute(&cli).unwrap_or_else(into_cli_result);
    if let Some(msg) = result.message() {
        if result.is_success() {
            info!("{}", msg);
        } else {
            eprintln!("Error: {}", msg);
        }
    }
    result.to_exit_code()
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

fn execute(cli: &Cli) -> anyhow::Result<CliResult> {
    let mut config = load_config(cli)?;
    let format = cli.format.unwrap_or(config.output.format);

    match &cli.command {
        Commands::ListPorts { detailed } => show_ports(format, *detailed),
        Commands::Discover { bauds } => {
            if !bauds.is_empty() {
                config.discovery.bauds = bauds.clone();
            }
            discover_device(&config, format)
        }
        Commands::Run {
            port,
            address,
            baud,
            count,
        } => {
            if port.is_some() {
                config.serial.port = port.clone();
            }
            if address.is_some() {
                config.serial.address = *address;
            }
            if let Some(baud) = baud {
                config.serial.baud = *baud;
            }
            run_session(&config, format, *count)
        }
        Commands::Decode { file, strict } => decode_capture(file.as_deref(), format, *strict),
        Commands::Checksum { payload } => {
            let checksum = compute_checksum(payload.as_bytes());
            println!("{}{}", payload, String::from_utf8_lossy(&checksum));
            Ok(CliResult::success())
        }
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
    }
}

fn into_cli_result(err: anyhow::Error) -> CliResult {
    let err = match err.downcast::<SessionError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    let err = match err.downcast::<TransportError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    let err = match err.downcast::<ConfigError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    match err.downcast::<io::Error>() {
        Ok(e) => e.into(),
        Err(err) => CliResult::error(ExitCodes::ERROR, format!("{:#}", err)),
    }
}

fn show_ports(format: OutputFormat, detailed: bool) -> anyhow::Result<CliResult> {
    let ports = list_ports()?;

    if ports.is_empty() {
        info!("No serial ports found");
        return Ok(CliResult::success());
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Csv => {
            println!("name,type");
            for port in &ports {
                println!("{},{:?}", port.port_name, port.port_type);
            }
        }
        OutputFormat::Text => {
            if detailed {
                println!("Available Serial Ports:");
                println!("{:-<60}", "");
                for port in &ports {
                    println!("  {} [{:?}]", port.port_name, port.port_type);
                }
            } else {
                for port in &ports {
                    println!("{}", port.port_name);
                }
            }
        }
    }

    Ok(CliResult::success())
}

fn discover_device(config: &AppConfig, format: OutputFormat) -> anyhow::Result<CliResult> {
    let location = match discover(&SerialOpener, &config.discovery_config())? {
        Discovery::Found(location) => location,
        Discovery::NotFound => {
            return Ok(CliResult::device_not_found(format!(
                "No {} found",
                config.discovery.model_id
            )))
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&location)?),
        OutputFormat::Csv => {
            println!("port,address,baud");
            println!("{},{},{}", location.port, location.address, location.baud);
        }
        OutputFormat::Text => println!(
            "{} address {} @ {} baud",
            location.port, location.address, location.baud
        ),
    }

    Ok(CliResult::success())
}

fn run_session(
    config: &AppConfig,
    format: OutputFormat,
    count: Option<u64>,
) -> anyhow::Result<CliResult> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Cannot install Ctrl+C handler")?;

    let opener = SerialOpener;
    let location = match config.device_location() {
        Some(location) => location,
        None => match discover(&opener, &config.discovery_config())? {
            Discovery::Found(location) => location,
            Discovery::NotFound => {
                return Ok(CliResult::device_not_found(format!(
                    "No {} found",
                    config.discovery.model_id
                )))
            }
        },
    };

    let mut session = Session::establish(&opener, &location, &config.session_config())?;
    let mut sink = WriterSink::new(io::stdout().lock(), format);
    let mut delivered = 0u64;

    while running.load(Ordering::SeqCst) && count.map_or(true, |n| delivered < n) {
        match session.next_reading() {
            Ok(Some(reading)) => {
                sink.deliver(&reading)?;
                delivered += 1;
            }
            Ok(None) => {}
            Err(SessionError::Decode(e)) => warn!("Dropping frame: {}", e),
            Err(e) => return Err(e.into()),
        }
    }

    let stats = session.stats().clone();
    session.close();

    let summary = format!(
        "{} readings, {} checksum failures, {} decode errors",
        delivered, stats.checksum_failures, stats.decode_errors
    );
    Ok(run_outcome(running.load(Ordering::SeqCst), summary))
}

/// Ctrl+C before the requested count was reached reports a cancelled run
fn run_outcome(completed: bool, summary: String) -> CliResult {
    if completed {
        CliResult::success_with_message(summary)
    } else {
        CliResult::cancelled(format!("Interrupted after {}", summary))
    }
}

fn decode_capture(
    file: Option<&Path>,
    format: OutputFormat,
    strict: bool,
) -> anyhow::Result<CliResult> {
    let reader: Box<dyn BufRead> = match file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Cannot open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let mut sink = WriterSink::new(io::stdout().lock(), format);
    let (mut decoded, mut ignored, mut rejected) = (0u64, 0u64, 0u64);

    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.trim_ascii().is_empty() {
            continue;
        }

        if !verify_checksum(&line) {
            rejected += 1;
            warn!("Line {}: bad checksum", index + 1);
            continue;
        }

        match decode_line(&line) {
            Ok(Some(reading)) => {
                sink.deliver(&reading)?;
                decoded += 1;
            }
            Ok(None) => ignored += 1,
            Err(e) => {
                rejected += 1;
                warn!("Line {}: {}", index + 1, e);
            }
        }
    }

    info!(
        "{} decoded, {} ignored, {} rejected",
        decoded, ignored, rejected
    );

    if strict && rejected > 0 {
        return Ok(CliResult::validation_failed(format!(
            "{} line(s) rejected",
            rejected
        )));
    }
    Ok(CliResult::success())
}
