// 2A03 APU: two pulses, triangle, noise, and a DMC stub, mixed through
// the canonical nonlinear formula into a 44.1 kHz i16 stream.

mod audio;
mod channel;
mod tables;

pub use audio::{AudioRing, SAMPLE_RATE};

use channel::{Dmc, Noise, Pulse, Triangle};
use tables::LENGTH_TABLE;

pub(crate) const CPU_CLOCK_RATE: f64 = 1_789_773.0;
const CYCLES_PER_SAMPLE: f64 = CPU_CLOCK_RATE / SAMPLE_RATE as f64;

/// One-pole DC blocker coefficient.
const DC_BLOCK_R: f32 = 0.995;

// Frame sequencer boundaries in integer CPU cycles. The hardware counts
// half-cycles; the one-cycle jitter this costs is accepted everywhere.
const SEQ_STEP1: u32 = 3729;
const SEQ_STEP2: u32 = 7457;
const SEQ_STEP3: u32 = 11186;
const SEQ_STEP4: u32 = 14915;
const SEQ_STEP5: u32 = 18641;

/// The low-rate clock driving envelopes (quarter frames) and length
/// counters (half frames), and raising the frame IRQ in 4-step mode.
#[derive(Clone, Copy, bincode::Encode, bincode::Decode)]
struct FrameSequencer {
    five_step: bool,
    irq_inhibit: bool,
    irq_flag: bool,
    cycle: u32,
}

impl FrameSequencer {
    fn new() -> Self {
        Self {
            five_step: false,
            irq_inhibit: false,
            irq_flag: false,
            cycle: 0,
        }
    }

    /// Advance one CPU cycle; returns (quarter, half) events.
    fn clock(&mut self) -> (bool, bool) {
        self.cycle += 1;
        match self.cycle {
            SEQ_STEP1 | SEQ_STEP3 => (true, false),
            SEQ_STEP2 => (true, true),
            SEQ_STEP4 => {
                if self.five_step {
                    (false, false)
                } else {
                    if !self.irq_inhibit {
                        self.irq_flag = true;
                    }
                    self.cycle = 0;
                    (true, true)
                }
            }
            SEQ_STEP5 => {
                // Only reachable in 5-step mode; no IRQ here.
                self.cycle = 0;
                (true, true)
            }
            _ => (false, false),
        }
    }
}

#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Apu {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame: FrameSequencer,
    /// Pulse and noise timers clock on every second CPU cycle.
    odd_cycle: bool,
    sample_counter: f64,
    dc_prev_in: f32,
    dc_prev_out: f32,
    ring: AudioRing,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    pub fn new() -> Self {
        Self {
            pulse1: Pulse::new(),
            pulse2: Pulse::new(),
            triangle: Triangle::new(),
            noise: Noise::new(),
            dmc: Dmc::new(),
            frame: FrameSequencer::new(),
            odd_cycle: false,
            sample_counter: 0.0,
            dc_prev_in: 0.0,
            dc_prev_out: 0.0,
            ring: AudioRing::new(),
        }
    }

    pub fn reset(&mut self) {
        self.write_register(0x4015, 0);
        self.write_register(0x4017, 0);
        self.frame.cycle = 0;
        self.odd_cycle = false;
        self.sample_counter = 0.0;
        self.dc_prev_in = 0.0;
        self.dc_prev_out = 0.0;
    }

    /// Handle to the shared sample queue for the host audio thread.
    pub fn audio_ring(&self) -> AudioRing {
        self.ring.clone()
    }

    /// Re-point the producer at an existing ring (after save-state load,
    /// which decodes a fresh detached ring).
    pub(crate) fn adopt_ring(&mut self, ring: AudioRing) {
        self.ring = ring;
    }

    /// Frame IRQ line, level-held until read through $4015 or inhibited.
    pub fn frame_irq(&self) -> bool {
        self.frame.irq_flag
    }

    /// One CPU cycle.
    pub fn step(&mut self) {
        self.triangle.tick_timer();
        if self.odd_cycle {
            self.pulse1.tick_timer();
            self.pulse2.tick_timer();
            self.noise.tick_timer();
        }
        self.odd_cycle = !self.odd_cycle;

        let (quarter, half) = self.frame.clock();
        if quarter {
            self.quarter_frame();
        }
        if half {
            self.half_frame();
        }

        self.sample_counter += 1.0;
        if self.sample_counter >= CYCLES_PER_SAMPLE {
            self.sample_counter -= CYCLES_PER_SAMPLE;
            self.emit_sample();
        }
    }

    fn quarter_frame(&mut self) {
        self.pulse1.envelope.quarter_clock();
        self.pulse2.envelope.quarter_clock();
        self.noise.envelope.quarter_clock();
        self.triangle.quarter_clock();
    }

    fn half_frame(&mut self) {
        self.pulse1.half_clock();
        self.pulse2.half_clock();
        self.triangle.half_clock();
        self.noise.half_clock();
    }

    /// $4015 read: channel length status plus the frame IRQ flag, which
    /// the read acknowledges.
    pub fn read_status(&mut self) -> u8 {
        let mut status = 0u8;
        if self.pulse1.length_counter > 0 {
            status |= 0x01;
        }
        if self.pulse2.length_counter > 0 {
            status |= 0x02;
        }
        if self.triangle.length_counter > 0 {
            status |= 0x04;
        }
        if self.noise.length_counter > 0 {
            status |= 0x08;
        }
        if self.dmc.enabled {
            status |= 0x10;
        }
        if self.frame.irq_flag {
            status |= 0x40;
        }
        self.frame.irq_flag = false;
        status
    }

    pub fn write_register(&mut self, addr: u16, data: u8) {
        match addr {
            0x4000 => self.pulse1.write_control(data),
            0x4001 => {} // pulse 1 sweep: accepted, not modeled
            0x4002 => self.pulse1.write_timer_low(data),
            0x4003 => self
                .pulse1
                .write_timer_high(data, LENGTH_TABLE[(data >> 3) as usize]),

            0x4004 => self.pulse2.write_control(data),
            0x4005 => {} // pulse 2 sweep: accepted, not modeled
            0x4006 => self.pulse2.write_timer_low(data),
            0x4007 => self
                .pulse2
                .write_timer_high(data, LENGTH_TABLE[(data >> 3) as usize]),

            0x4008 => self.triangle.write_linear(data),
            0x400A => self.triangle.write_timer_low(data),
            0x400B => self
                .triangle
                .write_timer_high(data, LENGTH_TABLE[(data >> 3) as usize]),

            0x400C => self.noise.write_control(data),
            0x400E => self.noise.write_period(data),
            0x400F => self.noise.write_length(LENGTH_TABLE[(data >> 3) as usize]),

            0x4010 => self.dmc.write_control(data),
            0x4011 => self.dmc.write_level(data),
            0x4012 => self.dmc.write_sample_addr(data),
            0x4013 => self.dmc.write_sample_length(data),

            0x4015 => {
                self.pulse1.set_enabled(data & 0x01 != 0);
                self.pulse2.set_enabled(data & 0x02 != 0);
                self.triangle.set_enabled(data & 0x04 != 0);
                self.noise.set_enabled(data & 0x08 != 0);
                self.dmc.enabled = data & 0x10 != 0;
            }

            0x4017 => {
                self.frame.five_step = data & 0x80 != 0;
                self.frame.irq_inhibit = data & 0x40 != 0;
                if self.frame.irq_inhibit {
                    self.frame.irq_flag = false;
                }
                self.frame.cycle = 0;
                if self.frame.five_step {
                    // The write immediately clocks both units.
                    self.quarter_frame();
                    self.half_frame();
                }
            }

            _ => {}
        }
    }

    fn emit_sample(&mut self) {
        let pulse_sum = (self.pulse1.output() + self.pulse2.output()) as f32;
        let pulse_out = if pulse_sum > 0.0 {
            95.88 / (8128.0 / pulse_sum + 100.0)
        } else {
            0.0
        };

        let t = self.triangle.output() as f32;
        let n = self.noise.output() as f32;
        let d = self.dmc.output() as f32;
        let tnd_out = if t > 0.0 || n > 0.0 || d > 0.0 {
            159.79 / (1.0 / (t / 8227.0 + n / 12241.0 + d / 22638.0) + 100.0)
        } else {
            0.0
        };

        // One-pole DC blocker keeps the stream centered.
        let x = pulse_out + tnd_out;
        let y = x - self.dc_prev_in + DC_BLOCK_R * self.dc_prev_out;
        self.dc_prev_in = x;
        self.dc_prev_out = y;

        let sample = (y * 32767.0).clamp(-32767.0, 32767.0) as i16;
        self.ring.push(sample);
    }

    #[cfg(test)]
    pub(crate) fn pulse1_length(&self) -> u8 {
        self.pulse1.length_counter
    }

    #[cfg(test)]
    pub(crate) fn triangle_length(&self) -> u8 {
        self.triangle.length_counter
    }
}
