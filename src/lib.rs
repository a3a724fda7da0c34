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

//! Driver core for the Baikal family of ASIC mining appliances.
//!
//! One appliance exposes up to five logical miners chained behind a single
//! byte channel - either a USB bulk endpoint pair (Giant family) or the SoC
//! UART of the mini/cube boards. All miners on a channel share one bus with
//! one mutex; every command/response pair is atomic under that mutex.
//!
//! The host mining application supplies work and verifies nonces through
//! [`hal::WorkSource`], spawns one thread per logical miner and drives each
//! of them by calling [`scan::scan`] in a loop.

#[macro_use]
pub mod logging;

pub mod algorithm;
pub mod bus;
pub mod config;
pub mod counters;
pub mod error;
pub mod gpio;
pub mod hal;
pub mod message;
pub mod miner;
pub mod payload;
pub mod scan;
pub mod stats;
pub mod supervisor;
pub mod transport;
pub mod work;

/// Maximum number of logical miners on one bus
pub const MAX_MINERS: usize = 5;
/// Hashing units per logical miner
pub const MAX_UNITS: usize = 4;
/// Chips per hashing unit
pub const MAX_ASICS: usize = 16;
/// Depth of the per-miner ring of in-flight work
pub const WORK_FIFO_DEPTH: usize = 200;

pub use crate::bus::Bus;
pub use crate::error::Error;
pub use crate::work::Work;
