use std::error::Error;

mod mappers;

use mappers::Mapper;

pub(crate) const PRG_BANK_SIZE: usize = 16 * 1024;
pub(crate) const CHR_BANK_SIZE: usize = 8 * 1024;
pub(crate) const PRG_RAM_SIZE: usize = 8 * 1024;
const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;
const INES_MAGIC: [u8; 4] = *b"NES\x1A";

/// Nametable mirroring arrangement. MMC1/MMC3/MMC2 rewrite this at runtime,
/// so the PPU asks the cartridge on every VRAM decode instead of caching it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, bincode::Encode, bincode::Decode)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleLower,
    SingleUpper,
    FourScreen,
}

/// An iNES cartridge: PRG ROM, CHR ROM or RAM, 8 KiB PRG RAM, and the
/// mapper that translates CPU/PPU addresses into those arrays.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Cartridge {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_writable: bool,
    prg_ram: Vec<u8>,
    battery: bool,
    mirroring: Mirroring,
    mapper: Mapper,
    mapper_number: u8,
}

impl Cartridge {
    /// Parse an iNES 1.0 image. NES 2.0 headers are accepted with a warning
    /// and read as iNES 1.0. An unsupported mapper number falls back to
    /// NROM so the machine still boots (the ROM will likely misbehave).
    pub fn from_ines(image: &[u8]) -> Result<Self, Box<dyn Error>> {
        if image.len() < HEADER_SIZE {
            return Err("iNES image shorter than the 16-byte header".into());
        }
        let header = &image[..HEADER_SIZE];
        if header[..4] != INES_MAGIC {
            return Err("iNES header magic mismatch".into());
        }

        let prg_units = header[4] as usize;
        let chr_units = header[5] as usize;
        let flags6 = header[6];
        let flags7 = header[7];
        if prg_units == 0 {
            return Err("iNES header reports no PRG ROM".into());
        }
        if (flags7 & 0x0C) == 0x08 {
            eprintln!("warning: NES 2.0 header detected, reading as iNES 1.0");
        }

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let battery = flags6 & 0x02 != 0;
        let mapper_number = (flags6 >> 4) | (flags7 & 0xF0);

        let mut offset = HEADER_SIZE;
        if flags6 & 0x04 != 0 {
            offset += TRAINER_SIZE; // trainer precedes PRG, never mapped
        }

        let prg_size = prg_units * PRG_BANK_SIZE;
        if image.len() < offset + prg_size {
            return Err("iNES image truncated inside PRG ROM".into());
        }
        let prg_rom = image[offset..offset + prg_size].to_vec();
        offset += prg_size;

        let chr_size = chr_units * CHR_BANK_SIZE;
        let (chr, chr_writable) = if chr_size == 0 {
            (vec![0u8; CHR_BANK_SIZE], true)
        } else {
            if image.len() < offset + chr_size {
                return Err("iNES image truncated inside CHR ROM".into());
            }
            (image[offset..offset + chr_size].to_vec(), false)
        };

        let mapper = match Mapper::from_number(mapper_number) {
            Some(mapper) => mapper,
            None => {
                eprintln!(
                    "warning: unsupported mapper {mapper_number}, falling back to NROM"
                );
                Mapper::nrom()
            }
        };

        Ok(Self {
            prg_rom,
            chr,
            chr_writable,
            prg_ram: vec![0u8; PRG_RAM_SIZE],
            battery,
            mirroring,
            mapper,
            mapper_number,
        })
    }

    /// CPU-space read, $4020-$FFFF. The full CPU address is decoded here;
    /// below $6000 nothing is mapped and open bus reads as 0.
    pub fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                if self.mapper.prg_ram_enabled() {
                    self.prg_ram[(addr - 0x6000) as usize]
                } else {
                    0
                }
            }
            0x8000..=0xFFFF => {
                let offset = self.mapper.prg_rom_offset(addr, self.prg_rom.len());
                self.prg_rom[offset % self.prg_rom.len()]
            }
            _ => 0,
        }
    }

    /// CPU-space write, $4020-$FFFF. $6000-$7FFF hits PRG RAM; $8000-$FFFF
    /// hits the mapper's registers, which may retarget mirroring.
    pub fn write_prg(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.mapper.prg_ram_enabled() && !self.mapper.prg_ram_write_protected() {
                    self.prg_ram[(addr - 0x6000) as usize] = data;
                }
            }
            0x8000..=0xFFFF => {
                if let Some(mirroring) = self.mapper.write_register(addr, data) {
                    self.mirroring = mirroring;
                }
            }
            _ => {}
        }
    }

    /// PPU-space read, $0000-$1FFF. MMC2 flips its CHR latches after the
    /// fetched byte is returned, so this takes `&mut self`.
    pub fn read_chr(&mut self, addr: u16) -> u8 {
        let offset = self.mapper.chr_offset(addr, self.chr.len());
        let data = self.chr[offset % self.chr.len()];
        self.mapper.chr_post_fetch(addr);
        data
    }

    /// PPU-space write, $0000-$1FFF. Only meaningful for CHR RAM carts.
    pub fn write_chr(&mut self, addr: u16, data: u8) {
        if !self.chr_writable {
            return;
        }
        let offset = self.mapper.chr_offset(addr, self.chr.len());
        let len = self.chr.len();
        self.chr[offset % len] = data;
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    /// Scanline notification from the PPU (dot 260 of rendered lines).
    /// Clocks the MMC3 IRQ counter; a no-op for every other mapper.
    pub fn scanline_tick(&mut self) {
        self.mapper.scanline_tick();
    }

    /// Level-style IRQ line: stays asserted until the program acknowledges
    /// it through the mapper ($E000 on MMC3).
    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    pub fn mapper_number(&self) -> u8 {
        self.mapper_number
    }

    pub fn battery(&self) -> bool {
        self.battery
    }

    /// Battery-backed PRG RAM contents, for sidecar persistence.
    pub fn sram(&self) -> &[u8] {
        &self.prg_ram
    }

    pub fn load_sram(&mut self, data: &[u8]) -> Result<(), &'static str> {
        if data.len() != self.prg_ram.len() {
            return Err("SRAM size mismatch");
        }
        self.prg_ram.copy_from_slice(data);
        Ok(())
    }

    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }
}
