//! Mock ELM327 Wi-Fi adapter for developing the dashboard without a car
//!
//! Usage: cargo run -p obdash-mock-elm327-server
//! Then run `obdash --port 127.0.0.1:35000`

use clap::Parser;
use log::{error, info};
use obdash_elm327_lib::commands::{self, supported_bitmap};
use obdash_elm327_lib::{Emulator, PidSource};
use std::net::{TcpListener, TcpStream};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "obdash-mock-elm327")]
#[command(about = "Simulated ELM327 OBD2 adapter")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:35000")]
    listen: String,

    /// Simulate ignition off: the adapter answers but no vehicle bus is found
    #[arg(long)]
    bus_offline: bool,
}

/// A car idling, revving and slowly warming up
struct SimulatedVehicle {
    start_time: Instant,
    bus_online: bool,
}

impl SimulatedVehicle {
    fn elapsed(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }
}

fn rpm_at(elapsed: f32) -> f32 {
    const MIN_RPM: f32 = 800.0;
    const MAX_RPM: f32 = 3500.0;
    const RAMP_TIME: f32 = 4.0;
    const HOLD_TIME: f32 = 3.0;
    const CYCLE_TIME: f32 = 2.0 * (RAMP_TIME + HOLD_TIME);

    let phase = elapsed % CYCLE_TIME;

    if phase < RAMP_TIME {
        MIN_RPM + (MAX_RPM - MIN_RPM) * (phase / RAMP_TIME)
    } else if phase < RAMP_TIME + HOLD_TIME {
        MAX_RPM
    } else if phase < 2.0 * RAMP_TIME + HOLD_TIME {
        let ramp_phase = phase - RAMP_TIME - HOLD_TIME;
        MAX_RPM - (MAX_RPM - MIN_RPM) * (ramp_phase / RAMP_TIME)
    } else {
        MIN_RPM
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // values are clamped to the byte range
fn byte(value: f32) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn word(value: f32) -> [u8; 2] {
    (value.clamp(0.0, 65535.0) as u16).to_be_bytes()
}

impl PidSource for SimulatedVehicle {
    fn bus_online(&self) -> bool {
        self.bus_online
    }

    fn pid_data(&mut self, pid: u8) -> Option<Vec<u8>> {
        let command = commands::by_pid(pid)?;
        let elapsed = self.elapsed();
        let rpm = rpm_at(elapsed);
        // Coolant climbs from 40 to 90 degrees over the first minutes
        let coolant = (40.0 + elapsed / 4.0).min(90.0);

        let data = match pid {
            0x00 | 0x20 | 0x40 => supported_bitmap(pid).to_be_bytes().to_vec(),
            0x04 => vec![byte(rpm / 3500.0 * 200.0)], // Engine load follows RPM
            0x05 => vec![byte(coolant + 40.0)],
            0x0C => word(rpm * 4.0).to_vec(),
            0x0D => vec![byte(rpm / 3500.0 * 110.0)], // Speed: up to 110 km/h
            0x0E => vec![byte((12.0 + 64.0) * 2.0)],  // Timing: 12 degrees
            0x0F => vec![0x38],                       // Intake air temp: 16°C
            0x10 => word(rpm / 1000.0 * 250.0).to_vec(), // MAF: 2.5 g/s per 1000 rpm
            0x11 => vec![byte(rpm / 3500.0 * 255.0)], // Throttle
            0x1F => word(elapsed).to_vec(),
            0x2F => vec![0x8C],                      // Fuel level: 55%
            0x42 => word(13_800.0).to_vec(),         // Module voltage: 13.8 V
            0x44 => word(32_768.0).to_vec(),         // Lambda 1.0
            0x46 => vec![0x3C],                      // Ambient: 20°C
            0x5C => vec![byte(coolant + 35.0)],
            0x5E => word(rpm / 1000.0 * 40.0).to_vec(), // Fuel rate: 2 L/h per 1000 rpm
            _ => vec![0x40; command.decoder.width()],
        };

        Some(data)
    }
}

fn handle_client(stream: TcpStream, bus_online: bool) {
    let peer = stream.peer_addr().map(|addr| addr.to_string()).unwrap_or_default();
    let mut emulator = Emulator::new(SimulatedVehicle {
        start_time: Instant::now(),
        bus_online,
    });

    if let Err(e) = emulator.serve(stream) {
        error!("Client {peer} failed: {e}");
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Mock ELM327 starting on {}...", args.listen);
    let listener = match TcpListener::bind(&args.listen) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {e}", args.listen);
            std::process::exit(1);
        }
    };
    info!("Mock ELM327 ready - waiting for connections...");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                info!("Client connected: {:?}", stream.peer_addr());
                let bus_online = !args.bus_offline;
                std::thread::spawn(move || handle_client(stream, bus_online));
            }
            Err(e) => error!("Connection error: {e}"),
        }
    }
}
