// Bounded sample ring between the core and the host audio callback. The
// core never blocks: when the consumer falls behind, the oldest samples
// are overwritten — the emulator's timeline is authoritative.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const SAMPLE_RATE: u32 = 44_100;

/// About three quarters of a second of audio at 44.1 kHz.
pub(crate) const RING_CAPACITY: usize = 32 * 1024;

/// Cloneable handle to the shared mono i16 sample queue. The producer
/// side lives inside the APU; the host clones a handle and drains it from
/// its audio thread.
#[derive(Clone)]
pub struct AudioRing {
    inner: Arc<Mutex<VecDeque<i16>>>,
}

impl AudioRing {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(RING_CAPACITY))),
        }
    }

    pub(crate) fn push(&self, sample: i16) {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= RING_CAPACITY {
            queue.pop_front();
        }
        queue.push_back(sample);
    }

    /// Fill `out` from the front of the queue; returns how many samples
    /// were written. The remainder of `out` is left untouched.
    pub fn drain_into(&self, out: &mut [i16]) -> usize {
        let mut queue = self.inner.lock().unwrap();
        let mut written = 0;
        for slot in out.iter_mut() {
            match queue.pop_front() {
                Some(sample) => {
                    *slot = sample;
                    written += 1;
                }
                None => break,
            }
        }
        written
    }

    pub fn take_all(&self) -> Vec<i16> {
        let mut queue = self.inner.lock().unwrap();
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AudioRing {
    fn default() -> Self {
        Self::new()
    }
}

// The ring is shared with the host and intentionally invisible to save
// states: it encodes as zero bytes and decodes as a fresh empty queue.
impl bincode::Encode for AudioRing {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        _encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        Ok(())
    }
}

impl<Context> bincode::Decode<Context> for AudioRing {
    fn decode<D: bincode::de::Decoder>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::new())
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for AudioRing {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::new())
    }
}
