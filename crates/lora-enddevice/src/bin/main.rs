//! Command-line front end for the LoRa end-device driver.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lora_enddevice::protocol::{mdot, Rn2903Command};
use lora_enddevice::{metric_defs, Credentials, DeviceConfig, EndDevice, Message, Radio, RadioType};
use tracing::{error, info, warn};

/// Drive an mDot or RN2903 LoRaWAN module over a serial port.
#[derive(Parser, Debug)]
#[command(name = "lora-enddevice")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Radio type (mdot or rn2903), overrides the configuration.
    #[arg(short, long, global = true)]
    radio: Option<String>,

    /// Serial port, overrides the configuration.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate, overrides the configuration.
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the module identity and join status.
    Info,
    /// Join the network, then send a message on an interval until interrupted.
    Run {
        /// Network id / AppEUI.
        #[arg(long)]
        app_eui: String,
        /// Network key / AppKey.
        #[arg(long)]
        app_key: String,
        /// Join procedure (otaa or abp).
        #[arg(long, default_value = "otaa")]
        join_mode: String,
        /// Message to send.
        #[arg(short, long, default_value = "hello")]
        message: String,
        /// Seconds between messages.
        #[arg(short, long, default_value_t = 120)]
        interval: u64,
        /// Request confirmed uplinks.
        #[arg(long)]
        confirmed: bool,
        /// Application port.
        #[arg(long, default_value_t = 1)]
        app_port: u8,
    },
    /// Send a raw command line and print the reply.
    Raw {
        /// The command line, without terminator.
        line: String,
    },
    /// Print the effective configuration as YAML.
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose {
        "lora_enddevice=debug,lora_at_protocol=debug"
    } else {
        "lora_enddevice=info,lora_at_protocol=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
    metric_defs::describe_metrics();

    let config = load_config(&args)?;
    if let Command::ShowConfig = args.command {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let mut device = EndDevice::connect(config)?;
    let result = match args.command {
        Command::Info => info_command(&device).await,
        Command::Run {
            app_eui,
            app_key,
            join_mode,
            message,
            interval,
            confirmed,
            app_port,
        } => {
            let credentials = Credentials::new(app_eui, app_key).with_join_mode(join_mode);
            let mut message = Message::new(message.into_bytes()).on_port(app_port);
            if confirmed {
                message = message.confirmed();
            }
            run_command(&device, credentials, message, Duration::from_secs(interval)).await
        }
        Command::Raw { line } => raw_command(&device, line).await,
        Command::ShowConfig => Ok(()),
    };
    device.shutdown();
    result
}

fn load_config(args: &Args) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => DeviceConfig::load(path)?,
        None => DeviceConfig::default(),
    };
    if let Some(radio) = &args.radio {
        config.radio_type = RadioType::from(radio.as_str());
    }
    if let Some(port) = &args.port {
        config.serial_port.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial_port.baud_rate = baud;
    }
    Ok(config)
}

async fn info_command(device: &EndDevice) -> Result<(), Box<dyn std::error::Error>> {
    let joined = device.adapter().get_join_status().await?;
    match device.identity() {
        Some(identity) => println!("identity: {}", identity),
        None => println!("identity: unknown"),
    }
    println!("radio:    {}", device.config().radio_type);
    println!("joined:   {}", joined);
    Ok(())
}

async fn raw_command(device: &EndDevice, line: String) -> Result<(), Box<dyn std::error::Error>> {
    let reply = match device.radio() {
        Radio::Rn2903(adapter) => adapter.execute(&Rn2903Command::Raw(line)).await?,
        Radio::Mdot(_) => {
            device
                .queue()
                .enqueue("raw", line, mdot::ANY_RESPONSE)
                .await?
        }
    };
    for token in reply {
        println!("{}", token);
    }
    Ok(())
}

async fn run_command(
    device: &EndDevice,
    credentials: Credentials,
    message: Message,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    match device.network_start(credentials).await {
        Ok(outcome) if outcome.is_joined() => info!("joined"),
        Ok(outcome) => warn!(reason = outcome.reason().unwrap_or(""), "join refused, will retry"),
        Err(e) => warn!("join failed, will retry: {}", e),
    }

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {
                match device.network_send_message(&message).await {
                    Ok(downlinks) => {
                        for line in downlinks {
                            match device.network().decode_downlink(&line) {
                                Ok(bytes) => info!(downlink = %String::from_utf8_lossy(&bytes), "downlink"),
                                Err(e) => warn!("undecodable downlink {:?}: {}", line, e),
                            }
                        }
                    }
                    Err(e) => error!("send failed: {}", e),
                }
            }
        }
    }
}
