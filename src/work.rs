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

//! Work items and the per-miner ring of in-flight work

use crate::algorithm::Algorithm;
use crate::WORK_FIFO_DEPTH;

use byteorder::{ByteOrder, LittleEndian};

/// Pool difficulty 1 expressed as the classic 256-bit share target
const TRUE_DIFF_ONE: f64 = 26959535291011309493156476344723991336010898738574164086137773096960.0;
/// 2^192
const BITS_192: f64 = 6277101735386680763835789423207666416102355444464034512896.0;

/// One job descriptor handed over by the host work factory
#[derive(Debug, Clone, PartialEq)]
pub struct Work {
    /// Raw header bytes in pool order; 80 to 200 bytes depending on the
    /// algorithm
    pub data: Vec<u8>,
    /// Midstate precomputed by the host for the blake256 families
    pub midstate: Option<[u8; 32]>,
    /// Pool algorithm this work was built for
    pub algorithm: Algorithm,
    /// Difficulty requested by the pool
    pub difficulty: f64,
    /// Diff multiplier of the pool algorithm entering the share target
    pub diff_multiplier: f64,
    /// URL of the originating pool; some chip variants are keyed off it
    pub pool_url: String,
    /// Set once a newer block made this work stale
    pub stale: bool,
}

impl Work {
    /// Top 8 bytes (little-endian) of the share target for this work,
    /// with `working_diff` as the device-side difficulty floor
    pub fn device_target_tail(&self, working_diff: f64) -> [u8; 8] {
        share_target_tail(self.difficulty.max(working_diff), self.diff_multiplier)
    }
}

/// Little-endian tail (bytes 24..32) of the standard share target for the
/// given difficulty and algorithm diff multiplier
pub fn share_target_tail(difficulty: f64, multiplier: f64) -> [u8; 8] {
    let difficulty = if difficulty > 0.0 { difficulty } else { 1.0 };
    let multiplier = if multiplier > 0.0 { multiplier } else { 1.0 };

    let target = TRUE_DIFF_ONE * multiplier / difficulty;
    let mut tail = [0u8; 8];
    LittleEndian::write_u64(&mut tail, (target / BITS_192) as u64);
    tail
}

/// Fixed ring of in-flight work. The slot under the cursor is the next to be
/// dispatched; advancing the cursor retires whatever sits in the slot it
/// lands on, because that work has aged out of the device's echo window.
#[derive(Clone)]
pub struct WorkFifo {
    slots: Vec<Option<Work>>,
    cursor: usize,
}

impl WorkFifo {
    pub fn new() -> Self {
        Self {
            slots: vec![None; WORK_FIFO_DEPTH],
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Slot index of the most recently dispatched work
    pub fn last_dispatched(&self) -> usize {
        (self.cursor + WORK_FIFO_DEPTH - 1) % WORK_FIFO_DEPTH
    }

    pub fn current(&self) -> Option<&Work> {
        self.slots[self.cursor].as_ref()
    }

    pub fn put_current(&mut self, work: Work) {
        self.slots[self.cursor] = Some(work);
    }

    /// Advance the cursor and retire whatever occupies the new slot
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % WORK_FIFO_DEPTH;
        self.slots[self.cursor] = None;
    }

    pub fn get(&self, idx: usize) -> Option<&Work> {
        self.slots.get(idx).and_then(|slot| slot.as_ref())
    }

    pub fn mark_all_stale(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(work) = slot {
                work.stale = true;
            }
        }
    }

    /// Drop every queued work item
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
