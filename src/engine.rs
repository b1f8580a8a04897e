// src/engine.rs
use crate::scope::{BlockSource, IngestOutcome, Oscilloscope};
use crate::types::*;
use std::io;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Run one capture worker: pull blocks from `source` and feed them to `channel` in order.
///
/// With `pace` set the worker sleeps that long after every block, which plays a recording
/// back at its real rate. The worker ends on end of stream or on the first source error and
/// reports either to `tx`.
pub fn spawn_capture<S>(
    channel: ChannelId,
    mut source: S,
    scope: Arc<Oscilloscope>,
    tx: Sender<ScopeMessage>,
    pace: Option<Duration>,
) -> io::Result<JoinHandle<()>>
where
    S: BlockSource + Send + 'static,
{
    thread::Builder::new()
        .name(format!("capture-{channel}"))
        .spawn(move || {
            tx.send(ScopeMessage::Log(format!("{channel} capture started"))).ok();
            log::info!("{channel}: capture started");
            let mut blocks = 0u64;
            let mut triggers = 0u64;

            loop {
                let block = match source.next_block() {
                    Ok(Some(block)) => block,
                    Ok(None) => break,
                    Err(err) => {
                        log::error!("{channel}: capture failed after {blocks} blocks: {err}");
                        tx.send(ScopeMessage::Failed {
                            channel,
                            reason: err.to_string(),
                        })
                        .ok();
                        return;
                    }
                };

                if let IngestOutcome::Triggered { index, .. } = scope.ingest(channel, &block) {
                    triggers += 1;
                    log::trace!("{channel}: trigger {triggers} in block {blocks} at {index}");
                }
                blocks += 1;
                tx.send(ScopeMessage::BlockIngested {
                    channel,
                    samples: block.len(),
                })
                .ok();

                if let Some(pace) = pace {
                    thread::sleep(pace);
                }
            }

            log::info!("{channel}: end of stream after {blocks} blocks, {triggers} triggers");
            tx.send(ScopeMessage::Finished { channel, blocks }).ok();
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{ManualSource, PcmReader, ScopeError, ScopeSettings, TriggerMode};
    use std::io::{Cursor, Read};
    use std::sync::mpsc::channel;

    fn scope() -> Arc<Oscilloscope> {
        let mut settings = ScopeSettings::default();
        settings.sample_rate_hz = 1_000.0;
        settings.time_scale = crate::scope::TimeScale::new(0.01).unwrap();
        settings.spectral.fifo_capacity = 64;
        settings.spectral.block_size = 4;
        settings.spectral.window_size = 16;
        Arc::new(Oscilloscope::new(&settings).unwrap())
    }

    fn drain(rx: &std::sync::mpsc::Receiver<ScopeMessage>) -> Vec<ScopeMessage> {
        rx.iter().collect()
    }

    #[test]
    fn worker_feeds_blocks_in_order() {
        let scope = scope();
        let (tx, rx) = channel();
        let blocks = (0..5).map(|b| vec![b as f32; 4]).collect::<Vec<_>>();
        let handle = spawn_capture(
            ChannelId::One,
            ManualSource::new(blocks),
            Arc::clone(&scope),
            tx,
            None,
        )
        .unwrap();
        handle.join().unwrap();

        let messages = drain(&rx);
        let ingested = messages
            .iter()
            .filter(|m| matches!(m, ScopeMessage::BlockIngested { samples: 4, .. }))
            .count();
        assert_eq!(ingested, 5);
        assert!(matches!(
            messages.last(),
            Some(ScopeMessage::Finished {
                channel: ChannelId::One,
                blocks: 5
            })
        ));
        // ten samples per screen: the last ten of the stream
        let window = scope.snapshot(ChannelId::One).samples;
        assert_eq!(window, vec![2.0, 2.0, 3.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn pcm_stream_triggers_channel_two() {
        let scope = scope();
        scope.set_trigger_mode(ChannelId::Two, TriggerMode::Normal);
        scope.set_trigger_level(ChannelId::Two, 0.25);
        let pcm: Vec<u8> = [0i16, 0, 0, 16384, 16384, 16384]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let (tx, rx) = channel();
        spawn_capture(
            ChannelId::Two,
            PcmReader::new(Cursor::new(pcm), 6),
            Arc::clone(&scope),
            tx,
            None,
        )
        .unwrap()
        .join()
        .unwrap();

        assert!(matches!(
            drain(&rx).last(),
            Some(ScopeMessage::Finished { blocks: 1, .. })
        ));
        let snapshot = scope.snapshot(ChannelId::Two);
        assert!(snapshot.holding);
        assert_eq!(snapshot.write_cursor, 3);
        assert_eq!(snapshot.samples[..3], [0.5, 0.5, 0.5]);
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
    }

    #[test]
    fn source_error_is_reported() {
        let (tx, rx) = channel();
        spawn_capture(
            ChannelId::One,
            PcmReader::new(Broken, 4),
            scope(),
            tx,
            None,
        )
        .unwrap()
        .join()
        .unwrap();
        let messages = drain(&rx);
        match messages.last() {
            Some(ScopeMessage::Failed { channel, reason }) => {
                assert_eq!(*channel, ChannelId::One);
                assert!(reason.contains("unplugged"));
            }
            other => panic!("expected a failure report, got {other:?}"),
        }
        // the library error carries the io error through
        let err: ScopeError = io::Error::new(io::ErrorKind::BrokenPipe, "unplugged").into();
        assert!(matches!(err, ScopeError::Io(_)));
    }
}
