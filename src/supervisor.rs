// Copyright (C) 2020  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

//! Bus bring-up and teardown

use crate::algorithm::Algorithm;
use crate::bus::Bus;
use crate::config::Config;
use crate::error::{self, ErrorKind};
use crate::gpio;
use crate::transport::serial::SerialTransport;
use crate::transport::Transport;

use failure::ResultExt;

use std::sync::atomic::{AtomicBool, Ordering};

/// A serial chain exists at most once per host
static SERIAL_DETECTED: AtomicBool = AtomicBool::new(false);

/// Probe the chain behind `transport` and bring up every miner it reports.
///
/// Miner 0 has to initialize for detect to succeed; each remaining miner is
/// probed individually and skipped on failure without affecting the rest of
/// the bus.
pub fn detect(
    transport: Box<dyn Transport>,
    config: Config,
    algorithm: Algorithm,
) -> error::Result<Bus> {
    let bus = Bus::new(transport, config, algorithm);

    bus.drain();

    let miner_count = bus.reset()?;
    info!("bus reports {} miners", miner_count);

    init_miner(&bus, 0, algorithm).context(ErrorKind::Miner(0, "bring-up failed".to_string()))?;

    for miner_id in 1..miner_count {
        if let Err(e) = init_miner(&bus, miner_id, algorithm) {
            warn!("skipping miner {}: {}", miner_id, e);
        }
    }

    Ok(bus)
}

/// Probe the serial presence pins and bring the chain up when a board
/// answers. Returns `None` when no board is present or one was already
/// detected earlier.
pub fn detect_serial(config: Config, algorithm: Algorithm) -> error::Result<Option<Bus>> {
    if SERIAL_DETECTED.swap(true, Ordering::SeqCst) {
        return Ok(None);
    }

    let board = match gpio::detect_board() {
        Some(board) => board,
        None => {
            SERIAL_DETECTED.store(false, Ordering::SeqCst);
            return Ok(None);
        }
    };

    let transport = match SerialTransport::open(board) {
        Ok(transport) => transport,
        Err(e) => {
            SERIAL_DETECTED.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };

    match detect(Box::new(transport), config, algorithm) {
        Ok(bus) => Ok(Some(bus)),
        Err(e) => {
            SERIAL_DETECTED.store(false, Ordering::SeqCst);
            Err(e)
        }
    }
}

fn init_miner(bus: &Bus, miner_id: usize, algorithm: Algorithm) -> error::Result<()> {
    bus.get_info(miner_id)?;

    let config = bus.config();
    bus.set_option(
        miner_id,
        config.clock,
        algorithm.device_code(),
        config.cutoff_temp,
        config.fanspeed,
    )?;

    bus.start_miner(miner_id);
    Ok(())
}

/// Make the addressed miner identify itself (blink)
pub fn identify(bus: &Bus, miner_id: usize) {
    if let Err(e) = bus.set_id(miner_id) {
        warn!("identify failed on miner {}: {}", miner_id, e);
    }
}

/// Idle every miner and release whatever work is still in flight
pub fn shutdown(bus: &Bus) {
    for miner_id in 0..bus.miner_count() {
        if let Err(e) = bus.set_idle(miner_id) {
            warn!("SET_IDLE failed on miner {}: {}", miner_id, e);
        }
    }
    bus.tear_down();
}
