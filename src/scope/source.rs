use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use crate::scope::ScopeError;
/// Anything that can yield sample blocks for one channel on demand.
pub trait BlockSource {
    fn next_block(&mut self) -> Result<Option<Vec<f32>>, ScopeError>;
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<Vec<f32>>,
}
impl ManualSource {
    pub fn new(blocks: impl IntoIterator<Item = Vec<f32>>) -> Self {
        Self {
            queue: blocks.into_iter().collect(),
        }
    }
}
impl BlockSource for ManualSource {
    fn next_block(&mut self) -> Result<Option<Vec<f32>>, ScopeError> {
        Ok(self.queue.pop_front())
    }
}
/// Convert little-endian signed 16-bit PCM to floats in `[-1, 1)`. A trailing odd byte is
/// ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}
/// Mono s16le stream cut into blocks of `samples_per_block` samples. The final block may be
/// shorter.
pub struct PcmReader<R> {
    reader: R,
    buf: Vec<u8>,
}
impl<R: Read> PcmReader<R> {
    pub fn new(reader: R, samples_per_block: usize) -> Self {
        Self {
            reader,
            buf: vec![0; samples_per_block.max(1) * 2],
        }
    }
}
impl<R: Read> BlockSource for PcmReader<R> {
    fn next_block(&mut self) -> Result<Option<Vec<f32>>, ScopeError> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < 2 {
            return Ok(None);
        }
        Ok(Some(decode_pcm16(&self.buf[..filled])))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    fn encode(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
    #[test]
    fn decodes_full_scale() {
        let decoded = decode_pcm16(&encode(&[0, 16384, -32768, 32767]));
        assert_eq!(decoded[0], 0.0);
        assert_eq!(decoded[1], 0.5);
        assert_eq!(decoded[2], -1.0);
        assert!(decoded[3] < 1.0 && decoded[3] > 0.9999);
        assert_eq!(decode_pcm16(&[0x00, 0x40, 0x7f]), vec![0.5]);
    }
    #[test]
    fn reader_cuts_fixed_blocks_and_short_tail() {
        let bytes = encode(&[1, 2, 3, 4, 5, 6, 7]);
        let mut reader = PcmReader::new(Cursor::new(bytes), 3);
        assert_eq!(reader.next_block().unwrap().unwrap().len(), 3);
        assert_eq!(reader.next_block().unwrap().unwrap().len(), 3);
        assert_eq!(
            reader.next_block().unwrap(),
            Some(vec![7.0 / 32768.0])
        );
        assert_eq!(reader.next_block().unwrap(), None);
    }
    #[test]
    fn manual_source_drains_in_order() {
        let mut source = ManualSource::new(vec![vec![1.0], vec![2.0, 3.0]]);
        assert_eq!(source.next_block().unwrap(), Some(vec![1.0]));
        assert_eq!(source.next_block().unwrap(), Some(vec![2.0, 3.0]));
        assert_eq!(source.next_block().unwrap(), None);
    }
}
