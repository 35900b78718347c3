//! Native tone/noise player.
//!
//! Plays through the default output device and takes one command per line
//! on stdin. Control values are saved to the user's config directory after
//! every change.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{info, warn};
use pollster::block_on;

use tonefinder_core::engine::{Autoplay, ContextOptions, SoftwareContext};
use tonefinder_core::params::{
    PlaybackState, clamp_frequency, clamp_q_factor, clamp_volume, volume_to_gain,
};
use tonefinder_core::prefs::{JsonFileStore, MemoryStore, PreferenceStore, Preferences};
use tonefinder_core::{AudioSignalController, ToneError};

const HELP: &str = "\
commands:
  sound | tone      play the sine tone
  noise             play notch-filtered white noise
  idle | stop       silence
  freq <hz>         set frequency (1-22000)
  vol <0-100>       set volume
  q <0-5>           set notch Q
  spectrum          print the current spectrum
  status            print state and controls
  quit";

/// Find your frequency: a sine tone and notch-filtered white noise generator
#[derive(Parser, Debug)]
#[command(name = "tonefinder", version, about, long_about = None)]
struct Args {
    /// Start frequency in Hz (overrides the saved value)
    #[arg(long, value_name = "HZ")]
    frequency: Option<f64>,

    /// Start volume, 0-100 (overrides the saved value)
    #[arg(long, value_name = "LEVEL")]
    volume: Option<f64>,

    /// Start notch Q, 0-5 (overrides the saved value)
    #[arg(long, value_name = "Q")]
    q_factor: Option<f64>,

    /// State to enter on startup: idle, sound or noise
    #[arg(long, default_value = "idle")]
    state: PlaybackState,

    /// Preference file (defaults to the platform config directory)
    #[arg(long, value_name = "FILE")]
    prefs: Option<PathBuf>,

    /// Do not read or write preferences
    #[arg(long)]
    no_save: bool,
}

fn open_store(args: &Args) -> Result<Box<dyn PreferenceStore>, ToneError> {
    if args.no_save {
        return Ok(Box::new(MemoryStore::new()));
    }
    match args.prefs.clone().or_else(JsonFileStore::default_path) {
        Some(path) => Ok(Box::new(JsonFileStore::open(path)?)),
        None => {
            warn!("no config directory available; preferences will not be saved");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

fn spectrum_line(bins: &[u8]) -> String {
    const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    bins.chunks(4)
        .map(|chunk| {
            let peak = chunk.iter().copied().max().unwrap_or(0) as usize;
            LEVELS[peak * (LEVELS.len() - 1) / 255]
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut store = open_store(&args)?;
    let mut prefs = Preferences::load(store.as_ref())?;
    if let Some(hz) = args.frequency {
        prefs.frequency = clamp_frequency(hz);
    }
    if let Some(level) = args.volume {
        prefs.volume = clamp_volume(level);
    }
    if let Some(q) = args.q_factor {
        prefs.q_factor = clamp_q_factor(q);
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("No audio output device found")?;
    let config = device.default_output_config()?;
    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(format!("Unsupported sample format {:?}", config.sample_format()).into());
    }
    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0 as f64;
    info!(
        "output: {} @ {sample_rate} Hz, {channels} channels",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let engine = SoftwareContext::new(ContextOptions {
        sample_rate,
        autoplay: Autoplay::Allowed,
    });
    let render_side = engine.clone();
    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render_side.render(data, channels),
        |err| log::error!("audio stream error: {err}"),
        None,
    )?;
    stream.play()?;

    let mut controller = AudioSignalController::with_engine(engine, prefs.to_parameters());
    block_on(controller.initialize())?;
    block_on(controller.set_state(args.state))?;

    println!("{HELP}");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let value = words.next().map(str::parse::<f64>);

        let result = match (command, value) {
            ("quit" | "exit", _) => break,
            ("stop", None) => block_on(controller.set_state(PlaybackState::Idle)),
            ("freq", Some(Ok(hz))) => {
                prefs.frequency = clamp_frequency(hz);
                controller
                    .set_frequency(prefs.frequency)
                    .and_then(|_| prefs.save(store.as_mut()))
            }
            ("vol", Some(Ok(level))) => {
                prefs.volume = clamp_volume(level);
                controller
                    .set_volume(volume_to_gain(prefs.volume))
                    .and_then(|_| prefs.save(store.as_mut()))
            }
            ("q", Some(Ok(q))) => {
                prefs.q_factor = clamp_q_factor(q);
                controller
                    .set_q_factor(prefs.q_factor)
                    .and_then(|_| prefs.save(store.as_mut()))
            }
            ("spectrum", None) => controller.spectrum_sample().map(|bins| {
                println!("|{}|", spectrum_line(bins));
            }),
            ("status", None) => {
                println!(
                    "{} | {} Hz | volume {} | Q {}",
                    controller.state(),
                    prefs.frequency,
                    prefs.volume,
                    prefs.q_factor
                );
                Ok(())
            }
            (name, None) => match name.parse::<PlaybackState>() {
                Ok(state) => block_on(controller.set_state(state)),
                Err(_) => {
                    println!("{HELP}");
                    Ok(())
                }
            },
            _ => {
                println!("{HELP}");
                Ok(())
            }
        };

        if let Err(e) = result {
            eprintln!("error: {e}");
        }
        io::stdout().flush()?;
    }

    block_on(controller.set_state(PlaybackState::Idle))?;
    drop(stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_line_has_one_cell_per_four_bins() {
        let mut bins = [0u8; 128];
        bins[0] = 255;
        let line = spectrum_line(&bins);
        assert_eq!(line.chars().count(), 32);
        assert_eq!(line.chars().next(), Some('█'));
        assert_eq!(line.chars().nth(1), Some(' '));
    }

    #[test]
    fn args_parse_state_names() {
        let args = Args::parse_from(["tonefinder", "--state", "noise", "--frequency", "440"]);
        assert_eq!(args.state, PlaybackState::Noise);
        assert_eq!(args.frequency, Some(440.0));
        assert!(!args.no_save);
    }
}
