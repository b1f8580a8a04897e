// src/main.rs
use anyhow::{bail, Context, Result};
use audioscope::engine;
use audioscope::scope::{Oscilloscope, PcmReader, ScopeSettings};
use audioscope::types::{ChannelId, ScopeMessage};
use clap::{arg, value_parser, Command};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Display refresh period of the consumer loop.
const REFRESH: Duration = Duration::from_millis(50);

fn cli() -> Command {
    Command::new("audioscope")
        .about("Two-channel triggered oscilloscope over raw mono s16le recordings")
        .arg(
            arg!(--settings <FILE> "JSON settings file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(--realtime "Play the recordings back at their sample rate"))
        .arg(
            arg!(<INPUT> ... "Recording for CH1, then optionally CH2")
                .value_parser(value_parser!(PathBuf))
                .num_args(1..=2),
        )
}

fn log_channel(scope: &Oscilloscope, id: ChannelId) {
    let channel = scope.channel(id);
    if !channel.take_redraw() {
        return;
    }
    let snapshot = channel.snapshot();
    if !snapshot.enabled {
        return;
    }
    match snapshot.stats() {
        Some(stats) => log::info!(
            "{id}: {:.3} s window, min {:.4} max {:.4} rms {:.4}{}",
            snapshot.duration_seconds(),
            stats.min,
            stats.max,
            stats.rms,
            if snapshot.holding { " [hold]" } else { "" }
        ),
        None => log::info!("{id}: empty window"),
    }
}

fn log_spectrum(scope: &Oscilloscope) {
    let spectrum = scope.spectrum();
    if let (Some(bin), Some(freq)) = (spectrum.peak_bin(), spectrum.peak_frequency_hz()) {
        log::info!(
            "spectrum of {}: peak {:.1} Hz (bin {}, magnitude {:.4})",
            scope.spectral_source(),
            freq,
            bin,
            spectrum.magnitudes[bin]
        );
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let matches = cli().get_matches();
    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("INPUT")
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    let settings = match matches.get_one::<PathBuf>("settings") {
        Some(path) => ScopeSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => ScopeSettings::default(),
    };
    let scope = Arc::new(Oscilloscope::new(&settings).context("building oscilloscope")?);

    let block_size = settings.spectral.block_size;
    let pace = matches
        .get_flag("realtime")
        .then(|| Duration::from_secs_f32(block_size as f32 / settings.sample_rate_hz));

    let (tx, rx) = mpsc::channel();
    let mut workers = Vec::new();
    for (id, path) in ChannelId::ALL.into_iter().zip(&inputs) {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let source = PcmReader::new(BufReader::new(file), block_size);
        let worker = engine::spawn_capture(id, source, Arc::clone(&scope), tx.clone(), pace)
            .with_context(|| format!("starting {id} capture"))?;
        workers.push(worker);
    }
    for id in ChannelId::ALL.into_iter().skip(inputs.len()) {
        scope.set_channel_enabled(id, false);
    }
    drop(tx);

    let mut remaining = workers.len();
    let mut failures = 0usize;
    let mut last_refresh = Instant::now();
    while remaining > 0 {
        match rx.recv_timeout(REFRESH) {
            Ok(ScopeMessage::Log(line)) => log::debug!("{line}"),
            Ok(ScopeMessage::BlockIngested { .. }) => {}
            Ok(ScopeMessage::Finished { channel, blocks }) => {
                log::info!("{channel}: finished after {blocks} blocks");
                remaining -= 1;
            }
            Ok(ScopeMessage::Failed { channel, reason }) => {
                log::error!("{channel}: {reason}");
                failures += 1;
                remaining -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if last_refresh.elapsed() >= REFRESH {
            last_refresh = Instant::now();
            for id in ChannelId::ALL {
                log_channel(&scope, id);
            }
            log_spectrum(&scope);
        }
    }

    for worker in workers {
        if worker.join().is_err() {
            failures += 1;
        }
    }
    for id in ChannelId::ALL {
        log_channel(&scope, id);
    }
    log_spectrum(&scope);
    if scope.rejected_blocks() > 0 {
        log::warn!("{} blocks were not accepted by the spectrum", scope.rejected_blocks());
    }
    if failures > 0 {
        bail!("{failures} capture worker(s) failed");
    }
    Ok(())
}
