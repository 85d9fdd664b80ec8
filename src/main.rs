use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pmd_lib::control_point::{PmdActiveMeasurement, PmdControlPointCommand, PmdControlPointResponse, PmdOfflineTrigger};
use pmd_lib::frame::{DecodeContext, PmdData, TimedSample, decode_frame};
use pmd_lib::measurement::PmdFeature;
use pmd_lib::timestamp::device_time_to_utc;
use pmd_lib::{PmdSecret, PmdSetting, SecretStrategy};

/// Offline decoder for Polar Measurement Data (PMD) notifications.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode consecutive data frames of one stream, given as hex strings.
    Frame {
        frames: Vec<String>,
        /// Nominal sample rate of the stream in Hz.
        #[arg(short, long, default_value_t = 0)]
        sample_rate: u32,
        /// Scale applied to integer motion samples.
        #[arg(short, long, default_value_t = 1.0)]
        factor: f32,
        /// Timestamp of the frame preceding the first one given.
        #[arg(short, long, default_value_t = 0)]
        previous_timestamp: u64,
        #[arg(long, value_enum, default_value_t = Strategy::None)]
        secret_strategy: Strategy,
        /// Secret key as hex.
        #[arg(long)]
        key: Option<String>,
    },
    /// Parse a settings TLV sequence as advertised by the device.
    Settings { data: String },
    /// Parse a control point response notification.
    Response { data: String },
    /// Parse the parameters of an offline trigger status response.
    Trigger { data: String },
    /// Parse a measurement status byte.
    Status { data: String },
    /// Parse a PMD feature read.
    Features { data: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    None,
    Xor,
    Aes128,
    Aes256,
}

impl From<Strategy> for SecretStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::None => SecretStrategy::None,
            Strategy::Xor => SecretStrategy::Xor,
            Strategy::Aes128 => SecretStrategy::Aes128,
            Strategy::Aes256 => SecretStrategy::Aes256,
        }
    }
}

/// Decoded output goes to stdout, so diagnostics stay on stderr and in the
/// optional log file.
fn setup_logging(log_file_path: Option<&Path>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = match log_file_path {
        Some(path) => {
            let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {path:?}"))?;
            let (writer, guard) = tracing_appender::non_blocking(log_file);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // RUST_LOG wins; otherwise only our crates log at the requested level
    let level = verbosity.tracing_level_filter();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,pmd_rs={level},pmd_lib={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        debug!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

/// Accepts plain hex as well as space or colon separated bytes.
fn parse_hex(input: &str) -> Result<Bytes> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(&compact).with_context(|| format!("Invalid hex input: {input}"))?;
    Ok(Bytes::from(bytes))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_deref(), &cli.verbose)?;

    let result = match cli.command {
        Command::Frame {
            frames,
            sample_rate,
            factor,
            previous_timestamp,
            secret_strategy,
            key,
        } => run_frames(&frames, sample_rate, factor, previous_timestamp, secret_strategy, key.as_deref()),
        Command::Settings { data } => run_settings(&data),
        Command::Response { data } => run_response(&data),
        Command::Trigger { data } => run_trigger(&data),
        Command::Status { data } => run_status(&data),
        Command::Features { data } => run_features(&data),
    };

    if let Err(e) = result {
        error!("Decoding failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

fn run_frames(
    frames: &[String],
    sample_rate: u32,
    factor: f32,
    previous_timestamp: u64,
    strategy: Strategy,
    key: Option<&str>,
) -> Result<()> {
    if frames.is_empty() {
        bail!("No frames given");
    }

    let mut ctx = DecodeContext {
        factor,
        ..DecodeContext::new(sample_rate).with_previous_timestamp(previous_timestamp)
    };
    let strategy = SecretStrategy::from(strategy);
    if strategy != SecretStrategy::None || key.is_some() {
        let key = key.map(parse_hex).transpose()?.unwrap_or_default();
        let secret = PmdSecret::new(strategy, key.to_vec()).context("Invalid stream secret")?;
        ctx = ctx.with_secret(secret);
    }

    for (index, input) in frames.iter().enumerate() {
        let bytes = parse_hex(input)?;
        let frame = decode_frame(bytes, &ctx).with_context(|| format!("Frame #{index} could not be decoded"))?;
        let header = &frame.header;
        let utc = device_time_to_utc(header.timestamp)
            .map(|time| time.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "Frame #{index}: {} type {}{} at {} ({}), {} samples",
            header.measurement_type,
            header.frame_type,
            if header.compressed { " compressed" } else { "" },
            header.timestamp,
            utc,
            frame.data.len()
        );
        print_data(&frame.data);
        ctx = ctx.advance(&frame);
    }

    Ok(())
}

fn print_timed<T: Debug>(samples: &[TimedSample<T>]) {
    for sample in samples {
        println!("  {:>20}  {:?}", sample.timestamp, sample.sample);
    }
}

fn print_data(data: &PmdData) {
    match data {
        PmdData::Ecg(samples) => print_timed(samples),
        PmdData::Ppg(samples) => print_timed(samples),
        PmdData::Acc(samples) => {
            for sample in samples {
                println!("  {:>20}  {} mG", sample.timestamp, sample.sample);
            }
        }
        PmdData::Gyro(samples) | PmdData::Magnetometer(samples) => {
            for sample in samples {
                println!("  {:>20}  {:.3}", sample.timestamp, sample.sample);
            }
        }
        PmdData::Pressure(samples) | PmdData::Temperature(samples) | PmdData::SkinTemperature(samples) => {
            for sample in samples {
                println!("  {:>20}  {:.3}", sample.timestamp, sample.sample);
            }
        }
        PmdData::Ppi(samples) => {
            for sample in samples {
                println!(
                    "  HR {} bpm, PPI {} ms (±{} ms), blocker: {}, skin contact: {}",
                    sample.hr, sample.ppi_ms, sample.error_estimate_ms, sample.blocker, sample.skin_contact
                );
            }
        }
        PmdData::Location(samples) => print_timed(samples),
        PmdData::OfflineHr(samples) => print_timed(samples),
    }
}

fn print_setting(setting: &PmdSetting) {
    for (setting_type, values) in &setting.settings {
        let values: Vec<String> = values.iter().map(u32::to_string).collect();
        println!("  {}: {}", setting_type, values.join(", "));
    }
    for (setting_type, value) in &setting.selected {
        println!("  {} (selected): {}", setting_type, value);
    }
    if let Some(secret) = &setting.secret {
        println!("  Secret: {}, {} key bytes", secret.strategy(), secret.key().len());
    }
}

fn run_settings(data: &str) -> Result<()> {
    let setting = PmdSetting::from_bytes(&parse_hex(data)?).context("Failed to parse settings")?;
    println!("Available settings:");
    print_setting(&setting);

    let max = setting.max_settings();
    println!("Start request settings: {}", hex::encode(max.serialize_selected()));
    Ok(())
}

fn run_response(data: &str) -> Result<()> {
    let response = PmdControlPointResponse::from_bytes(&parse_hex(data)?).context("Failed to parse response")?;
    println!(
        "{} for {}: {}{}",
        response.op_code,
        response.measurement_type,
        response.status,
        if response.more { " (more to follow)" } else { "" }
    );
    let response = response.into_result()?;

    match response.op_code {
        PmdControlPointCommand::GetMeasurementSettings | PmdControlPointCommand::GetSdkModeSettings => {
            print_setting(&response.setting()?);
        }
        PmdControlPointCommand::GetMeasurementStatus => {
            let active = PmdActiveMeasurement::from_status_response_params(&response.parameters)?;
            println!("  {active}");
        }
        PmdControlPointCommand::GetOfflineRecordingTriggerStatus => {
            print_trigger(&PmdOfflineTrigger::parse_from_response(&response.parameters)?);
        }
        PmdControlPointCommand::Unknown(op) => warn!("Unknown op code {op:#04x}"),
        _ if !response.parameters.is_empty() => {
            println!("  Parameters: {}", hex::encode(&response.parameters));
        }
        _ => {}
    }
    Ok(())
}

fn print_trigger(trigger: &PmdOfflineTrigger) {
    println!("  Mode: {}", trigger.mode);
    for entry in &trigger.triggers {
        println!("  {}: {}", entry.measurement_type, entry.status);
        if let Some(setting) = &entry.setting {
            print_setting(setting);
        }
    }
}

fn run_trigger(data: &str) -> Result<()> {
    let trigger =
        PmdOfflineTrigger::parse_from_response(&parse_hex(data)?).context("Failed to parse offline trigger status")?;
    println!("Offline recording triggers:");
    print_trigger(&trigger);
    Ok(())
}

fn run_status(data: &str) -> Result<()> {
    let active = PmdActiveMeasurement::from_status_response_params(&parse_hex(data)?)?;
    println!("{active}");
    Ok(())
}

fn run_features(data: &str) -> Result<()> {
    let feature = PmdFeature::from_bytes(&parse_hex(data)?).context("Failed to parse feature read")?;
    println!("Supported measurements:");
    for measurement_type in &feature.supported {
        println!("  {measurement_type}");
    }
    Ok(())
}
