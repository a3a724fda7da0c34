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

//! Nonce and error counters backing hashrate accounting
//!
//! Note: `valid` counts accepted nonces, `errors` counts rejection events

use crate::{MAX_ASICS, MAX_UNITS};

/// Per-chip counters for valid nonces/errors
#[derive(Clone, Copy)]
pub struct Asic {
    pub valid: usize,
    pub errors: usize,
}

impl Asic {
    pub fn new() -> Self {
        Self {
            valid: 0,
            errors: 0,
        }
    }

    pub fn reset(&mut self) {
        self.valid = 0;
        self.errors = 0;
    }
}

/// Counter matrix of one logical miner: unit rows, chip columns, plus miner
/// totals
#[derive(Clone)]
pub struct MinerCounters {
    asics: [[Asic; MAX_ASICS]; MAX_UNITS],
    pub valid: usize,
    pub errors: usize,
}

impl MinerCounters {
    pub fn new() -> Self {
        Self {
            asics: [[Asic::new(); MAX_ASICS]; MAX_UNITS],
            valid: 0,
            errors: 0,
        }
    }

    pub fn reset(&mut self) {
        self.valid = 0;
        self.errors = 0;
        for unit in self.asics.iter_mut() {
            for asic in unit.iter_mut() {
                asic.reset();
            }
        }
    }

    pub fn asic(&self, unit: usize, chip: usize) -> Option<&Asic> {
        self.asics.get(unit).and_then(|chips| chips.get(chip))
    }

    pub fn add_valid(&mut self, unit: usize, chip: usize) {
        if unit >= MAX_UNITS || chip >= MAX_ASICS {
            // nonce from a non-existent chip
            return;
        }
        self.valid += 1;
        self.asics[unit][chip].valid += 1;
    }

    pub fn add_error(&mut self, unit: usize, chip: usize) {
        if unit >= MAX_UNITS || chip >= MAX_ASICS {
            // nonce from a non-existent chip
            return;
        }
        self.errors += 1;
        self.asics[unit][chip].errors += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counter_routing() {
        let mut counters = MinerCounters::new();

        counters.add_valid(2, 5);
        assert_eq!(counters.asic(2, 5).unwrap().valid, 1);
        assert_eq!(counters.asic(2, 5).unwrap().errors, 0);
        assert_eq!(counters.valid, 1);
        // neighbours untouched
        assert_eq!(counters.asic(2, 4).unwrap().valid, 0);
        assert_eq!(counters.asic(1, 5).unwrap().valid, 0);

        counters.add_error(2, 5);
        assert_eq!(counters.asic(2, 5).unwrap().errors, 1);
        assert_eq!(counters.errors, 1);
        assert_eq!(counters.valid, 1);
    }

    #[test]
    fn test_out_of_range_dropped() {
        let mut counters = MinerCounters::new();
        counters.add_valid(MAX_UNITS, 0);
        counters.add_valid(0, MAX_ASICS);
        counters.add_error(7, 31);
        assert_eq!(counters.valid, 0);
        assert_eq!(counters.errors, 0);
    }

    #[test]
    fn test_reset() {
        let mut counters = MinerCounters::new();
        counters.add_valid(0, 0);
        counters.add_error(3, 15);
        counters.reset();
        assert_eq!(counters.valid, 0);
        assert_eq!(counters.errors, 0);
        assert_eq!(counters.asic(3, 15).unwrap().errors, 0);
    }
}
