use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use mihome_rs::rpc::to_wire_message;
use mihome_rs::util::{decode_hex, encode_hex_upper};
use mihome_rs::{decode_payload, init_logger_with_level, CommandBuilder, Product, Transmission, ValveState};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mihome-cli")]
#[command(about = "CLI tool for Energenie MiHome radio devices")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a hex payload and print the message and its wire form
    Decode { payload: String },
    /// Print the payload a command would transmit
    Build {
        /// Product code, e.g. 3 or 0x03 for an eTRV, 0xF1 for socket 1
        #[arg(value_parser = parse_u32)]
        product: u32,
        /// Sensor id, or house address for sockets (0 = default)
        #[arg(value_parser = parse_u32)]
        sensor: u32,
        #[command(subcommand)]
        command: DeviceCommand,
    },
    /// Receive and print messages until interrupted
    #[cfg(feature = "raspberry-pi")]
    Listen {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
        /// Overrides the configured receive mode
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// Transmit a command
    #[cfg(feature = "raspberry-pi")]
    Send {
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
        #[arg(value_parser = parse_u32)]
        product: u32,
        #[arg(value_parser = parse_u32)]
        sensor: u32,
        #[command(subcommand)]
        command: DeviceCommand,
    },
}

#[derive(Subcommand, Clone)]
enum DeviceCommand {
    On,
    Off,
    Join,
    Identify,
    Diagnostics,
    Exercise,
    BatteryLevel,
    TargetTemperature { celsius: f64 },
    ReportInterval { seconds: u64 },
    /// open, closed or normal
    ValveState { state: String },
    LowPowerMode { enabled: bool },
}

fn parse_u32(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{value}': {e}"))
}

fn parse_valve_state(value: &str) -> Result<ValveState> {
    match value.to_ascii_lowercase().as_str() {
        "open" => Ok(ValveState::Open),
        "closed" => Ok(ValveState::Closed),
        "normal" => Ok(ValveState::Normal),
        other => Err(anyhow!(
            "invalid valve state '{other}'. Possible values are open, closed, normal"
        )),
    }
}

fn product(code: u32) -> Result<Product> {
    let code = u8::try_from(code).map_err(|_| anyhow!("product code {code} out of range"))?;
    Ok(Product::try_from(code)?)
}

fn build(product_code: u32, sensor: u32, command: &DeviceCommand) -> Result<Transmission> {
    let builder = CommandBuilder::new();
    let product = product(product_code)?;
    let transmission = match command {
        DeviceCommand::On => builder.switch_on(product, sensor)?,
        DeviceCommand::Off => builder.switch_off(product, sensor)?,
        DeviceCommand::Join => builder.join(product, sensor)?,
        DeviceCommand::Identify => builder.identify(product, sensor)?,
        DeviceCommand::Diagnostics => builder.diagnostics(product, sensor)?,
        DeviceCommand::Exercise => builder.exercise(product, sensor)?,
        DeviceCommand::BatteryLevel => builder.battery_level(product, sensor)?,
        DeviceCommand::TargetTemperature { celsius } => {
            builder.target_temperature(product, sensor, *celsius)?
        }
        DeviceCommand::ReportInterval { seconds } => {
            builder.report_interval(product, sensor, Duration::from_secs(*seconds))?
        }
        DeviceCommand::ValveState { state } => {
            builder.valve_state(product, sensor, parse_valve_state(state)?)?
        }
        DeviceCommand::LowPowerMode { enabled } => {
            builder.low_power_mode(product, sensor, *enabled)?
        }
    };
    Ok(transmission)
}

#[cfg(feature = "raspberry-pi")]
async fn open_gateway(
    config: Option<std::path::PathBuf>,
) -> Result<mihome_rs::MiHome<mihome_rs::radio::hal::RaspberryPiHal>> {
    use mihome_rs::radio::hal::RaspberryPiHal;
    use mihome_rs::{GatewayConfig, MiHome};

    let config = match config {
        Some(path) => GatewayConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    let hal = RaspberryPiHal::new(config.spi_slave, config.spi_speed_hz, &config.radio_pins())?;
    Ok(MiHome::open(hal, config).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger_with_level(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    match cli.command {
        Commands::Decode { payload } => {
            let bytes = decode_hex(&payload).context("payload is not valid hex")?;
            let message = decode_payload(&bytes)?;
            println!("{message}");
            let wire = to_wire_message(&message)?;
            println!("{}", serde_json::to_string_pretty(&wire)?);
        }
        Commands::Build {
            product,
            sensor,
            command,
        } => {
            let transmission = build(product, sensor, &command)?;
            println!("payload: {}", encode_hex_upper(&transmission.payload));
            println!("repeat:  {}", transmission.repeat);
            println!("mode:    {}", transmission.mode);
        }
        #[cfg(feature = "raspberry-pi")]
        Commands::Listen { config, mode } => {
            let gateway = open_gateway(config).await?;
            let mode = match mode {
                Some(mode) => mode.parse()?,
                None => gateway.config().rx_mode()?,
            };
            let cancel = tokio_util::sync::CancellationToken::new();
            let mut messages = gateway.subscribe();
            let runner = gateway.clone();
            let run_cancel = cancel.clone();
            let receive = tokio::spawn(async move { runner.run(mode, run_cancel, None).await });

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    message = messages.recv() => match message {
                        Some(message) => println!("{message}"),
                        None => break,
                    },
                }
            }
            cancel.cancel();
            receive.await??;
            println!("{}", serde_json::to_string_pretty(&gateway.stats())?);
        }
        #[cfg(feature = "raspberry-pi")]
        Commands::Send {
            config,
            product,
            sensor,
            command,
        } => {
            let transmission = build(product, sensor, &command)?;
            let gateway = open_gateway(config).await?;
            gateway.send(&transmission).await?;
            println!("sent {transmission}");
        }
    }

    Ok(())
}
