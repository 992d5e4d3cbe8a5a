use std::{env, error::Error, fs, path::PathBuf, process};

use nes::Emulator;

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let mut rom_path: Option<PathBuf> = None;
    let mut frame_limit: usize = 60;
    let mut debug = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-d" | "--debug" => debug = true,
            "--frame-limit" => {
                let value = args
                    .next()
                    .ok_or("--frame-limit requires a value")?
                    .parse::<usize>()
                    .map_err(|_| "invalid --frame-limit value")?;
                frame_limit = value;
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ if rom_path.is_none() => rom_path = Some(PathBuf::from(arg)),
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                process::exit(1);
            }
        }
    }

    let rom_path = match rom_path {
        Some(path) => path,
        None => {
            print_usage();
            process::exit(1);
        }
    };

    let rom = fs::read(&rom_path)?;
    let mut emulator = Emulator::load_rom(&rom)?;

    if debug {
        eprintln!("note: headless build; the debugger hotkey needs a windowed frontend");
    }

    // Battery carts keep their SRAM in a .sav sidecar next to the ROM.
    let sidecar = rom_path.with_extension("sav");
    if emulator.battery_backed() && sidecar.exists() {
        match fs::read(&sidecar) {
            Ok(bytes) => {
                if let Err(err) = emulator.load_sram(&bytes) {
                    eprintln!("warning: failed to load SRAM from {}: {err}", sidecar.display());
                }
            }
            Err(err) => eprintln!(
                "warning: could not read SRAM file {}: {err}",
                sidecar.display()
            ),
        }
    }

    let audio = emulator.audio_ring();
    for _ in 0..frame_limit {
        emulator.run_frame();
    }

    println!(
        "ran {} frame(s), {} CPU cycles, {} audio samples, PC={:#06X}",
        frame_limit,
        emulator.cpu_cycles(),
        audio.len(),
        emulator.cpu.pc,
    );

    if emulator.battery_backed() {
        if let Err(err) = fs::write(&sidecar, emulator.sram()) {
            eprintln!("warning: failed to write SRAM to {}: {err}", sidecar.display());
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: nes <rom.nes> [--frame-limit <n>] [--debug]");
    eprintln!("  <rom.nes>           iNES 1.0 ROM image");
    eprintln!("Options:");
    eprintln!("  --frame-limit <n>   Number of frames to run headless (default 60)");
    eprintln!("  -d, --debug         Reserved for the windowed frontend's debugger hotkey");
    eprintln!("  --help              Show this message");
    eprintln!();
    eprintln!(
        "Battery-backed cartridges load and save their 8 KiB SRAM from the \
         ROM path with a .sav extension."
    );
}
