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

//! Byte channels to a chain of miner boards. The two transports differ only
//! here; the codec, bus, work shaping and scan logic above are
//! transport-agnostic.

pub mod serial;
pub mod test_utils;
pub mod usb;

use crate::error;

use std::time::Duration;

/// How many stale frames one drain pass discards at most
pub(crate) const DRAIN_RETRY_LIMIT: usize = 10;
/// Read size used while draining stale bytes
pub(crate) const DRAIN_READ_SIZE: usize = 128;

/// Which appliance family sits behind a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Giant family on a USB bulk pair
    Usb,
    /// Mini board on the SoC UART
    Mini,
    /// Cube board on the SoC UART
    Cube,
}

impl DeviceKind {
    pub fn is_serial(self) -> bool {
        match self {
            DeviceKind::Usb => false,
            DeviceKind::Mini | DeviceKind::Cube => true,
        }
    }
}

/// One channel shared by every logical miner of an appliance
pub trait Transport: Send {
    /// Write one complete frame
    fn write_all(&mut self, frame: &[u8]) -> error::Result<usize>;

    /// Read one response frame. `expected` is the length negotiated for the
    /// command; each transport enforces its own framing strictness (the UART
    /// must deliver exactly `expected` bytes, USB accepts any complete
    /// frame).
    fn read_frame(&mut self, expected: usize) -> error::Result<Vec<u8>>;

    fn device_kind(&self) -> DeviceKind;

    /// Pause the device needs between a RESET or GET_INFO request and its
    /// response
    fn settle_delay(&self) -> Duration {
        Duration::from_millis(0)
    }

    /// Discard whatever stale bytes sit in the channel
    fn drain(&mut self) {
        for _ in 0..DRAIN_RETRY_LIMIT {
            if self.read_frame(DRAIN_READ_SIZE).is_err() {
                break;
            }
        }
    }
}
