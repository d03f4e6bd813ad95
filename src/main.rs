// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use ensemble::audio;
use ensemble::config::{self, Ensemble, MissingSamplePolicy};
use ensemble::instrument::{Instrument, InstrumentTable, SoundEvent};
use ensemble::playsync::CancelHandle;
use ensemble::samples::Resolver;
use ensemble::sequencer::{Schedule, ScheduledEvent};
use ensemble::service::SampleService;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long a finished sequence may ring out before the process exits.
const MAX_RING_OUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample-based instrument sequencer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the sample file each event resolves to.
    Resolve {
        /// The path to the configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The instrument, e.g. violin or bass-drum.
        instrument: Instrument,
        /// Events such as Cs4:quarter:forte or hit:half.
        #[arg(required = true)]
        events: Vec<SoundEvent>,
    },
    /// Prints the start offset of each event at a tempo.
    Schedule {
        /// The length of a half note.
        #[arg(short, long, default_value = "500ms")]
        tempo: String,
        /// Print the schedule as JSON.
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        events: Vec<SoundEvent>,
    },
    /// Plays a sequence of events on an instrument.
    Play {
        /// The path to the configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The output device. Overrides the configuration.
        #[arg(short, long)]
        device: Option<String>,
        /// The length of a half note. Overrides the configuration.
        #[arg(short, long)]
        tempo: Option<String>,
        /// The sample asset root. Overrides the configuration.
        #[arg(short, long)]
        assets: Option<PathBuf>,
        /// What to do with samples that fail to load: abort, skip or synthesize.
        #[arg(short, long)]
        missing_sample: Option<MissingSamplePolicy>,
        instrument: Instrument,
        #[arg(required = true)]
        events: Vec<SoundEvent>,
    },
    /// Loads every sample the events need and reports what failed.
    Preload {
        /// The path to the configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The sample asset root. Overrides the configuration.
        #[arg(short, long)]
        assets: Option<PathBuf>,
        instrument: Instrument,
        #[arg(required = true)]
        events: Vec<SoundEvent>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Resolve {
            config,
            instrument,
            events,
        } => {
            let config = Ensemble::load(config.as_deref())?;
            let table = InstrumentTable::with_overrides(&config.instruments());
            let resolver = Resolver::new(config.extension());
            let profile = table.profile(instrument);

            for event in events.iter() {
                let path = resolver.resolve(profile, event);
                println!("{} -> {}", event, config.assets().join(path.asset_path()).display());
            }
        }
        Commands::Schedule {
            tempo,
            json,
            events,
        } => {
            let tempo = config::parse_tempo(&tempo)?;
            let schedule = Schedule::build(&events, tempo);

            if json {
                let entries: Vec<serde_json::Value> = schedule
                    .entries()
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "event": entry.event.to_string(),
                            "offset_ms": entry.offset.as_millis() as u64,
                            "duration_ms": entry.duration.as_millis() as u64,
                        })
                    })
                    .collect();
                let output = serde_json::json!({
                    "tempo_ms": tempo.as_millis() as u64,
                    "total_ms": schedule.total().as_millis() as u64,
                    "events": entries,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            for entry in schedule.entries() {
                println!(
                    "{:>3}  {:>6}ms  {}",
                    entry.index,
                    entry.offset.as_millis(),
                    entry.event
                );
            }
            println!("Total: {}ms", schedule.total().as_millis());
        }
        Commands::Play {
            config,
            device,
            tempo,
            assets,
            missing_sample,
            instrument,
            events,
        } => {
            let mut config = Ensemble::load(config.as_deref())?;
            if let Some(device) = device {
                config.set_device(&device);
            }
            if let Some(assets) = assets {
                config.set_assets(&assets);
            }
            if let Some(policy) = missing_sample {
                config.set_missing_sample(policy);
            }
            let tempo = match tempo {
                Some(tempo) => Some(config::parse_tempo(&tempo)?),
                None => None,
            };

            let audio = config.audio();
            let output = match audio::get_output(audio.device(), audio.sample_rate()) {
                Ok(output) => output,
                Err(e) => {
                    warn!(device = audio.device(), err = %e, "Falling back to silent output");
                    audio::get_output("silent", audio.sample_rate())?
                }
            };
            let service = SampleService::from_config(&config, output)?;

            let cancel = CancelHandle::new();
            let ctrl_c = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupted, stopping playback");
                        cancel.cancel();
                    }
                })
            };

            let mut print_event = |entry: &ScheduledEvent| {
                println!("{:>6}ms  {}", entry.offset.as_millis(), entry.event);
            };
            let report = service
                .play_sequence(
                    instrument,
                    &events,
                    tempo,
                    Some(&cancel),
                    Some(&mut print_event),
                )
                .await?;

            if report.cancelled {
                service.stop()?;
            } else {
                // Let the last notes ring out.
                let deadline = tokio::time::Instant::now() + MAX_RING_OUT;
                while service.voices().active_count() > 0
                    && tokio::time::Instant::now() < deadline
                    && !cancel.is_cancelled()
                {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
            ctrl_c.abort();

            println!(
                "Triggered {} (synthesized {}), skipped {}{} in {}ms.",
                report.triggered,
                report.synthesized,
                report.skipped,
                if report.cancelled { ", cancelled" } else { "" },
                report.elapsed.as_millis()
            );
            service.dispose();
        }
        Commands::Preload {
            config,
            assets,
            instrument,
            events,
        } => {
            let mut config = Ensemble::load(config.as_deref())?;
            if let Some(assets) = assets {
                config.set_assets(&assets);
            }

            let output = audio::get_output("silent", config.audio().sample_rate())?;
            let service = SampleService::from_config(&config, output)?;
            let requests: Vec<(Instrument, SoundEvent)> =
                events.into_iter().map(|event| (instrument, event)).collect();

            let report = service
                .preload_batch(&requests, |completed, total| {
                    println!("Loaded {}/{}", completed, total);
                })
                .await?;

            for key in report.failed.iter() {
                println!("- failed: {}", key);
            }
            for key in report.timed_out.iter() {
                println!("- timed out: {}", key);
            }
            println!(
                "{} loaded, {} failed, {} timed out ({} bytes cached).",
                report.loaded.len(),
                report.failed.len(),
                report.timed_out.len(),
                service.loader().total_memory_usage()
            );
            service.dispose();

            if !report.is_complete() {
                return Err("not every sample could be loaded".into());
            }
        }
    }

    Ok(())
}
