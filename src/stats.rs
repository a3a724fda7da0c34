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

//! Statistics the host API polls

use crate::bus::Bus;
use crate::counters::MinerCounters;

use std::sync::atomic::AtomicUsize;

/// Process-wide count of nonces the verifier rejected
pub static HW_ERRORS: AtomicUsize = AtomicUsize::new(0);

/// Per-miner snapshot for the host stats API
#[derive(Debug, Clone, PartialEq)]
pub struct MinerStats {
    pub chip_count: u8,
    pub clock: u16,
    pub hw_ver: u8,
    pub fw_ver: u8,
    pub algorithm: &'static str,
}

impl Bus {
    /// Stats snapshot of one miner, `None` when the id is not on this bus
    pub fn stats(&self, miner_id: usize) -> Option<MinerStats> {
        let guard = self.lock();
        let algorithm = guard.algorithm.name();
        guard.miners.get(miner_id).map(|miner| MinerStats {
            chip_count: miner.asic_count,
            clock: miner.clock,
            hw_ver: miner.hw_ver,
            fw_ver: miner.fw_ver,
            algorithm,
        })
    }

    /// Counter matrix snapshot of one miner
    pub fn counters(&self, miner_id: usize) -> Option<MinerCounters> {
        self.lock()
            .miners
            .get(miner_id)
            .map(|miner| miner.counters.clone())
    }

    /// Last reported temperature of one miner
    pub fn temperature(&self, miner_id: usize) -> Option<u8> {
        self.lock().miners.get(miner_id).map(|miner| miner.temp)
    }

    /// One-line device status for the UI
    pub fn statline(&self, miner_id: usize) -> String {
        let guard = self.lock();
        match guard.miners.get(miner_id) {
            Some(miner) => format!(
                "{}{}C {:3}MHz [ASICS #{}] | ",
                if miner.temp < 10 { " " } else { "" },
                miner.temp,
                miner.clock,
                miner.asic_count
            ),
            None => String::new(),
        }
    }
}
