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

//! UART transport for the SoC-attached mini/cube boards

use crate::error::{self, ErrorKind};
use crate::gpio;
use crate::transport::{DeviceKind, Transport, DRAIN_READ_SIZE, DRAIN_RETRY_LIMIT};

use failure::ResultExt;

use std::io::{Read, Write};
use std::time::Duration;

/// UART the board chain hangs off
pub const IO_PORT: &str = "/dev/ttyS2";
pub const IO_BAUD_RATE: u32 = 115_200;

/// Read timeout of the port (the former termios VTIME)
const READ_TIMEOUT: Duration = Duration::from_secs(3);
/// Turnaround the chain needs after RESET/GET_INFO on the UART
const SETTLE_DELAY: Duration = Duration::from_millis(200);

pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    kind: DeviceKind,
}

impl SerialTransport {
    /// Open the default UART for `board`, raw 8N1, pulse the board reset
    /// line and wait out the mandated quiescence.
    pub fn open(board: gpio::BoardKind) -> error::Result<Self> {
        Self::open_port(IO_PORT, board)
    }

    pub fn open_port(path: &str, board: gpio::BoardKind) -> error::Result<Self> {
        let port = serialport::new(path, IO_BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|_| ErrorKind::Serial(format!("cannot open {}", path)))?;

        gpio::ControlPinManager::new(board).pulse_reset()?;

        Ok(Self {
            port,
            kind: board.device_kind(),
        })
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, frame: &[u8]) -> error::Result<usize> {
        self.port
            .write_all(frame)
            .context(ErrorKind::Serial("frame write failed".to_string()))?;
        Ok(frame.len())
    }

    /// The UART delivers exactly `expected` bytes or the read times out;
    /// anything short is a failed transaction.
    fn read_frame(&mut self, expected: usize) -> error::Result<Vec<u8>> {
        let mut frame = vec![0u8; expected];
        self.port
            .read_exact(&mut frame)
            .context(ErrorKind::Serial("frame read failed".to_string()))?;
        Ok(frame)
    }

    fn device_kind(&self) -> DeviceKind {
        self.kind
    }

    fn settle_delay(&self) -> Duration {
        SETTLE_DELAY
    }

    fn drain(&mut self) {
        let mut scratch = [0u8; DRAIN_READ_SIZE];
        for _ in 0..DRAIN_RETRY_LIMIT {
            match self.port.read(&mut scratch) {
                // keep going only while the line is still streaming
                Ok(count) if count == scratch.len() => continue,
                _ => break,
            }
        }
    }
}
