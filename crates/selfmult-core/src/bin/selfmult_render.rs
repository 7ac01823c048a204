//! SelfMult offline renderer
//!
//! Streams a WAV file through the self-multiplication effect block by block,
//! the way a host would call it, and writes the result as 32-bit float WAV.
//!
//! ```text
//! selfmult-render <input.wav> <output.wav> [--config PATH] [--delay MS]
//!     [--exponent X] [--volume V] [--mix M] [--mode rms|calibration]
//!     [--calibrate] [--block-size N]
//! ```
//!
//! Settings come from `--config`, else the default config file, else
//! built-in defaults; the remaining flags override them. Set `RUST_LOG=debug`
//! for verbose output.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use selfmult_core::config::{default_config_path, load_config, ProcessorConfig};
use selfmult_core::normalize::GainMode;
use selfmult_core::{AudioBuffer, Effect, SelfMultEffect, DEFAULT_BLOCK_SIZE};

const CONFIG_FILENAME: &str = "processor.yaml";

const USAGE: &str = "usage: selfmult-render <input.wav> <output.wav> [--config PATH] [--delay MS] \
[--exponent X] [--volume V] [--mix M] [--mode rms|calibration] [--calibrate] [--block-size N]";

/// Parsed command line
#[derive(Debug, Clone, PartialEq)]
struct RenderArgs {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    delay_ms: Option<f32>,
    exponent: Option<f32>,
    volume: Option<f32>,
    mix: Option<f32>,
    mode: Option<GainMode>,
    calibrate: bool,
    block_size: usize,
}

fn parse_args(args: &[String]) -> Result<RenderArgs> {
    let mut positional = Vec::new();
    let mut parsed = RenderArgs {
        input: PathBuf::new(),
        output: PathBuf::new(),
        config: None,
        delay_ms: None,
        exponent: None,
        volume: None,
        mix: None,
        mode: None,
        calibrate: false,
        block_size: DEFAULT_BLOCK_SIZE,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .with_context(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value(arg)?)),
            "--delay" => parsed.delay_ms = Some(parse_number(arg, &value(arg)?)?),
            "--exponent" => parsed.exponent = Some(parse_number(arg, &value(arg)?)?),
            "--volume" => parsed.volume = Some(parse_number(arg, &value(arg)?)?),
            "--mix" => parsed.mix = Some(parse_number(arg, &value(arg)?)?),
            "--mode" => {
                let mode = value(arg)?;
                parsed.mode = Some(mode.parse::<GainMode>().map_err(anyhow::Error::msg)?);
            }
            "--calibrate" => parsed.calibrate = true,
            "--block-size" => {
                let size = value(arg)?;
                parsed.block_size = size
                    .parse()
                    .with_context(|| format!("invalid block size '{}'", size))?;
                if parsed.block_size == 0 {
                    bail!("block size must be at least 1");
                }
            }
            flag if flag.starts_with("--") => bail!("unknown flag '{}'\n{}", flag, USAGE),
            path => positional.push(PathBuf::from(path)),
        }
    }

    match <[PathBuf; 2]>::try_from(positional) {
        Ok([input, output]) => {
            parsed.input = input;
            parsed.output = output;
            Ok(parsed)
        }
        Err(_) => bail!("expected an input and an output path\n{}", USAGE),
    }
}

fn parse_number(flag: &str, value: &str) -> Result<f32> {
    value
        .parse()
        .with_context(|| format!("{}: '{}' is not a number", flag, value))
}

/// Resolve the processor config: file first, then command line overrides
fn build_config(args: &RenderArgs) -> ProcessorConfig {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(CONFIG_FILENAME));
    let mut config: ProcessorConfig = load_config(&path);

    if let Some(mode) = args.mode {
        config.gain_mode = mode;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.params.delay_ms = delay_ms;
    }
    if let Some(exponent) = args.exponent {
        config.params.exponent = exponent;
    }
    if let Some(volume) = args.volume {
        config.params.volume = volume;
    }
    if let Some(mix) = args.mix {
        config.params.mix = mix;
    }
    config
}

/// Read a WAV file as interleaved f32 in -1.0..1.0
fn read_wav(path: &Path) -> Result<(WavSpec, Vec<f32>)> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to decode {:?}", path))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Failed to decode {:?}", path))?
        }
    };
    Ok((spec, samples))
}

fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[f32]) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize {:?}", path))?;
    Ok(())
}

/// Process interleaved audio in host-sized blocks
fn render(effect: &mut SelfMultEffect, input: &[f32], channels: usize, block_size: usize) -> Vec<f32> {
    let mut output = vec![0.0; input.len()];
    let mut buffer = AudioBuffer::silence(channels, block_size);

    for (block_in, block_out) in input
        .chunks(block_size * channels)
        .zip(output.chunks_mut(block_size * channels))
    {
        buffer.set_len_from_capacity(block_in.len() / channels);
        for (frame, samples) in block_in.chunks_exact(channels).enumerate() {
            for (ch, &sample) in samples.iter().enumerate() {
                buffer.channel_mut(ch)[frame] = sample;
            }
        }
        effect.process(&mut buffer);
        buffer.to_interleaved(block_out);
    }
    output
}

/// Peak and RMS (averaged over channels) of interleaved audio
fn levels(samples: &[f32], channels: usize) -> (f32, f32) {
    // A trailing partial frame is dropped
    let whole = samples.len() - samples.len() % channels;
    let buffer = AudioBuffer::from_interleaved(&samples[..whole], channels);
    let frames = buffer.num_frames();
    let mean_square = (0..channels)
        .map(|ch| buffer.rms(ch, 0..frames).powi(2))
        .sum::<f32>()
        / channels as f32;
    (buffer.peak(), mean_square.sqrt())
}

fn run(args: RenderArgs) -> Result<()> {
    let (spec, input) = read_wav(&args.input)?;
    let channels = spec.channels as usize;
    if channels == 0 {
        bail!("{:?} has no channels", args.input);
    }
    log::info!(
        "Read {:?}: {} Hz, {} channels, {} frames",
        args.input,
        spec.sample_rate,
        channels,
        input.len() / channels
    );

    let mut config = build_config(&args);
    config.input_channels = channels;
    config.validate()?;

    let (mut effect, mut handle) = SelfMultEffect::new(config);
    effect.prepare(spec.sample_rate as f32, args.block_size)?;

    if args.calibrate {
        if effect.gain_mode() == GainMode::Calibration {
            handle.start_calibration()?;
        } else {
            log::warn!("--calibrate ignored in {} mode", effect.gain_mode().name());
        }
    }

    let output = render(&mut effect, &input, channels, args.block_size);
    effect.release();

    if let Some(status) = effect.calibration_status() {
        log::info!(
            "Calibration: {} window(s) completed, peak {:.4}, auto gain {:.4}",
            status.completed,
            status.expected_max_amplitude,
            status.auto_gain
        );
    }

    write_wav(&args.output, spec.channels, spec.sample_rate, &output)?;

    let (input_peak, input_rms) = levels(&input, channels);
    let (output_peak, output_rms) = levels(&output, channels);
    log::info!(
        "Wrote {:?}: input peak {:.4} rms {:.4}, output peak {:.4} rms {:.4}",
        args.output,
        input_peak,
        input_rms,
        output_peak,
        output_rms
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args)?;
    run(args)
}
