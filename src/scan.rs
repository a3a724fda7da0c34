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

//! The per-iteration scan pass driven by the host mining threads

use crate::bus::Bus;
use crate::hal;
use crate::message::{Message, ResultFlags, ResultResponse};
use crate::stats;
use crate::WORK_FIFO_DEPTH;

use packed_struct::PackedStructSlice;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// Pacing between two result polls on the bus
const RESULT_POLL_PACE: Duration = Duration::from_millis(1);
/// Nap of scan passes serving non-primary miners
const SECONDARY_SCAN_NAP: Duration = Duration::from_millis(50);

/// Sentinel hashrate returned once the bus is gone
pub const SCAN_DEAD: i64 = -1;

/// One scan iteration for the thread serving `miner_id`.
///
/// Only the primary miner's thread talks to the bus; the remaining threads
/// pace themselves and report their hashrate share. Returns the hashes
/// attributed to the miner since its previous sample, 0 before the first
/// dispatch and [`SCAN_DEAD`] once the bus is torn down.
pub fn scan(bus: &Bus, miner_id: usize, source: &dyn hal::WorkSource) -> i64 {
    if !bus.is_alive() {
        return SCAN_DEAD;
    }

    if miner_id == 0 {
        if !process_results(bus, source) {
            bus.tear_down();
            return SCAN_DEAD;
        }
    } else {
        thread::sleep(SECONDARY_SCAN_NAP);
    }

    let mut guard = bus.lock();
    let algorithm = guard.algorithm;
    let miner = match guard.miners.get_mut(miner_id) {
        Some(miner) => miner,
        None => return SCAN_DEAD,
    };

    if miner.fifo.cursor() == 0 {
        // nothing dispatched yet
        return 0;
    }

    let elapsed = miner.sample_elapsed_ms();
    let base = miner.clock as i64 * miner.asic_count as i64 * elapsed;
    bus.config().hashrate_scale(algorithm).apply(base)
}

/// Drain pending results of every working miner. Returns false when the
/// pass has to be abandoned and the bus torn down.
fn process_results(bus: &Bus, source: &dyn hal::WorkSource) -> bool {
    let miner_count = bus.miner_count();
    let cutoff = bus.config().cutoff_temp;
    let recover = bus.config().recover_temp;

    for miner_id in 0..miner_count {
        {
            let guard = bus.lock();
            if !guard.miners[miner_id].state.is_working() {
                continue;
            }
        }

        let response = match bus.get_result(miner_id) {
            Ok(response) => response,
            Err(e) => {
                error!("result poll failed on miner {}: {}", miner_id, e);
                return false;
            }
        };

        let result = match ResultResponse::unpack_from_slice(&response.data) {
            Ok(result) => result,
            Err(_) => {
                // wrong payload size, drop the response
                continue;
            }
        };
        let flags = ResultFlags::from_param(response.param);

        {
            let mut guard = bus.lock();
            if let Some(miner) = guard.miners.get_mut(miner_id) {
                miner.update_temp(result.temp, cutoff, recover);
            }
        }

        if flags.nonce_ready {
            check_nonce(bus, &response, &result, source);
        }

        if flags.work_wanted {
            if let Err(e) = bus.send_work(miner_id, source) {
                warn!("work dispatch failed on miner {}: {}", miner_id, e);
            }
        }

        if flags.fault {
            return false;
        }

        thread::sleep(RESULT_POLL_PACE);
    }

    true
}

/// Route one nonce result: verify it, then account it per chip and per
/// miner. Results referencing a dead slot, a foreign algorithm or (with
/// stale checking on) a stale work item are dropped silently.
fn check_nonce(bus: &Bus, response: &Message, result: &ResultResponse, source: &dyn hal::WorkSource) {
    // route by the miner id echoed in the response frame
    let miner_id = response.miner_id as usize;
    let work_idx = result.work_idx as usize;

    if work_idx >= WORK_FIFO_DEPTH {
        return;
    }

    let check_stale = bus.config().check_stale;
    let mut guard = bus.lock();
    let algorithm = guard.algorithm;
    let miner = match guard.miners.get_mut(miner_id) {
        Some(miner) => miner,
        // result for a miner this bus does not carry
        None => return,
    };
    let work = match miner.fifo.get(work_idx) {
        Some(work) => work.clone(),
        None => return,
    };

    if check_stale && work.stale {
        return;
    }

    // the slot predates an algorithm switch on the chain
    if work.algorithm != algorithm {
        return;
    }

    let unit = result.unit_id as usize;
    let chip = result.chip_id as usize;

    if source.submit_nonce(&work, result.nonce) {
        miner.counters.add_valid(unit, chip);
    } else {
        error!(
            "hw error : {}[u:{}, c:{:2}] : [{:3}, {:08x}]",
            miner_id, unit, chip, work_idx, result.nonce
        );
        miner.counters.add_error(unit, chip);
        stats::HW_ERRORS.fetch_add(1, Ordering::Relaxed);
    }
}

/// The host learned of a new block or job. The primary miner's thread
/// pre-fills every FIFO with fresh work; other threads ignore the signal.
pub fn update_work(bus: &Bus, miner_id: usize, source: &dyn hal::WorkSource) {
    if miner_id != 0 || !bus.is_alive() {
        return;
    }

    let (refill, miner_count) = {
        let guard = bus.lock();
        (guard.algorithm.refill_count(), guard.miners.len())
    };

    if bus.config().check_stale {
        let mut guard = bus.lock();
        for miner in guard.miners.iter_mut() {
            miner.fifo.mark_all_stale();
        }
    }

    for id in 0..miner_count {
        for _ in 0..refill {
            if let Err(e) = bus.send_work(id, source) {
                error!("work refill failed on miner {}: {}", id, e);
                bus.tear_down();
                return;
            }
        }
    }
}
