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

//! State of one logical miner on the bus

use crate::counters::MinerCounters;
use crate::message::InfoResponse;
use crate::work::WorkFifo;

use std::time::Instant;

/// Default device-side difficulty floor
const DEFAULT_WORKING_DIFF: f64 = 0.1;

/// Life of one logical miner.
///
/// State changes follow `Uninitialized -> Probed -> Working <-> Overheated
/// -> ShutDown`; an overheated miner keeps answering result polls so its
/// temperature can recover, it just takes no new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not probed yet, or probing failed at detect
    Uninitialized,
    /// GET_INFO answered, options not applied yet
    Probed,
    Working,
    /// Above the cutoff temperature, dispatch suppressed until recovery
    Overheated,
    ShutDown,
}

impl State {
    /// Result polling continues in this state
    pub fn is_working(self) -> bool {
        match self {
            State::Working | State::Overheated => true,
            _ => false,
        }
    }
}

/// Record of one logical miner
pub struct Miner {
    pub id: usize,
    pub state: State,
    pub fw_ver: u8,
    pub hw_ver: u8,
    pub asic_ver: u8,
    /// Capability byte of the board generation
    pub bbg: u8,
    pub asic_count: u8,
    /// ASIC count as re-counted by the chain itself
    pub asic_count_r: u8,
    /// Clock in MHz, kept current from SEND_WORK acknowledgments
    pub clock: u16,
    /// Last reported temperature in degrees Celsius
    pub temp: u8,
    /// Floor for device-side target scaling
    pub working_diff: f64,
    pub fifo: WorkFifo,
    pub counters: MinerCounters,
    /// When the hashrate was last sampled
    pub last_sample: Instant,
}

impl Miner {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            state: State::Uninitialized,
            fw_ver: 0,
            hw_ver: 0,
            asic_ver: 0,
            bbg: 0,
            asic_count: 0,
            asic_count_r: 0,
            clock: 0,
            temp: 0,
            working_diff: DEFAULT_WORKING_DIFF,
            fifo: WorkFifo::new(),
            counters: MinerCounters::new(),
            last_sample: Instant::now(),
        }
    }

    /// Take over the identity a GET_INFO response reported
    pub fn apply_info(&mut self, info: &InfoResponse) {
        self.fw_ver = info.fw_ver;
        self.hw_ver = info.hw_ver;
        self.bbg = info.bbg;
        self.clock = info.clock_mhz();
        self.asic_count = info.asic_count;
        self.asic_count_r = info.asic_count_r;
        self.asic_ver = info.asic_ver;
        self.working_diff = DEFAULT_WORKING_DIFF;
        self.temp = 0;
        self.fifo = WorkFifo::new();
        self.state = State::Probed;
    }

    /// Options were accepted, the miner is live
    pub fn start(&mut self) {
        self.state = State::Working;
        self.last_sample = Instant::now();
    }

    /// Take the miner down and release whatever work is still queued
    pub fn shut_down(&mut self) {
        self.state = State::ShutDown;
        self.fifo.clear();
    }

    /// Record a temperature sample and run the cutoff/recover hysteresis.
    /// Both comparisons are strict; between `recover` and `cutoff` the state
    /// keeps whatever side it was on.
    pub fn update_temp(&mut self, temp: u8, cutoff: u8, recover: u8) {
        self.temp = temp;
        match self.state {
            State::Working if temp > cutoff => self.state = State::Overheated,
            State::Overheated if temp < recover => self.state = State::Working,
            _ => {}
        }
    }

    /// Milliseconds since the previous hashrate sample; restarts the window
    pub fn sample_elapsed_ms(&mut self) -> i64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample);
        self.last_sample = now;
        elapsed.as_millis() as i64
    }
}
