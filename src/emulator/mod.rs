use std::error::Error;
use std::path::Path;

use crate::apu::AudioRing;
use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;

/// The wired machine: CPU plus the bus that owns PPU, APU, cartridge and
/// controller. One `clock` call advances a single PPU dot.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl Emulator {
    /// Parse an iNES image, wire the machine, and run the reset sequence.
    pub fn load_rom(rom: &[u8]) -> Result<Self, Box<dyn Error>> {
        let cartridge = Cartridge::from_ines(rom)?;
        let mut emulator = Self {
            cpu: Cpu::new(),
            bus: Bus::new(cartridge),
        };
        emulator.reset();
        Ok(emulator)
    }

    pub fn reset(&mut self) {
        self.bus.reset(&mut self.cpu);
    }

    /// One master tick.
    pub fn clock(&mut self) {
        self.bus.clock(&mut self.cpu);
    }

    /// Run until the PPU finishes the current frame.
    pub fn run_frame(&mut self) {
        while !self.bus.ppu.frame_complete() {
            self.clock();
        }
        self.bus.ppu.clear_frame_complete();
    }

    /// 256x240 ARGB pixels, stable between frame boundaries.
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ppu.framebuffer()
    }

    pub fn set_controller(&mut self, state: u8) {
        self.bus.set_controller(state);
    }

    /// Handle to the 44.1 kHz mono sample queue for the host audio thread.
    pub fn audio_ring(&self) -> AudioRing {
        self.bus.apu.audio_ring()
    }

    pub fn cpu_cycles(&self) -> u64 {
        self.cpu.cycles
    }

    pub fn battery_backed(&self) -> bool {
        self.bus.cartridge.battery()
    }

    /// Battery-backed PRG RAM for sidecar persistence; the host decides
    /// whether and where it lands on disk.
    pub fn sram(&self) -> &[u8] {
        self.bus.cartridge.sram()
    }

    pub fn load_sram(&mut self, data: &[u8]) -> Result<(), Box<dyn Error>> {
        self.bus
            .cartridge
            .load_sram(data)
            .map_err(|err| Box::<dyn Error>::from(err.to_string()))
    }

    pub fn save_state_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let bytes = bincode::encode_to_vec(self, bincode::config::standard())?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load_state_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Box<dyn Error>> {
        let bytes = std::fs::read(path)?;
        let (mut state, _): (Emulator, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())?;
        // The decoded APU carries a fresh detached ring; keep feeding the
        // one the host already holds.
        state.bus.apu.adopt_ring(self.bus.apu.audio_ring());
        *self = state;
        Ok(())
    }
}
