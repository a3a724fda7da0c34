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

//! Control pins of the SoC-attached boards. The pins live in the Allwinner
//! `gpio_sw` sysfs class under symbolic names and are driven with plain
//! attribute writes.

use crate::error::{self, ErrorKind};
use crate::transport::DeviceKind;

use embedded_hal::digital::v2::{InputPin, OutputPin};
use failure::ResultExt;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Gap between the falling and rising edge of the reset pulse
const RESET_PULSE_DELAY: Duration = Duration::from_millis(10);
/// Quiescence after releasing reset before the chain accepts frames
const RESET_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Boards reachable over the UART, distinguished by which control pins the
/// carrier exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardKind {
    Mini,
    Cube,
}

impl BoardKind {
    fn reset_pin(self) -> &'static str {
        match self {
            // orange pi one
            BoardKind::Mini => "/sys/class/gpio_sw/PA21/data",
            // orange pi zero
            BoardKind::Cube => "/sys/class/gpio_sw/PA10/data",
        }
    }

    fn presence_pin(self) -> &'static str {
        match self {
            BoardKind::Mini => "/sys/class/gpio_sw/PA8/data",
            BoardKind::Cube => "/sys/class/gpio_sw/PA19/data",
        }
    }

    pub fn device_kind(self) -> DeviceKind {
        match self {
            BoardKind::Mini => DeviceKind::Mini,
            BoardKind::Cube => DeviceKind::Cube,
        }
    }
}

/// Helper struct for altering output pins which implements OutputPin trait
#[derive(Clone)]
pub struct PinOut(PathBuf);

impl OutputPin for PinOut {
    type Error = io::Error;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        fs::write(&self.0, b"0")
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        fs::write(&self.0, b"1")
    }
}

/// Helper struct for reading input pins which implements InputPin trait
#[derive(Clone)]
pub struct PinIn(PathBuf);

impl InputPin for PinIn {
    type Error = io::Error;

    fn is_high(&self) -> Result<bool, Self::Error> {
        let raw = fs::read(&self.0)?;
        Ok(raw.first().map(|value| *value != b'0').unwrap_or(false))
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// All known output pin types on the carrier boards
#[derive(Debug)]
pub enum PinOutName {
    BoardReset,
}

/// All known input pin types on the carrier boards
#[derive(Debug, Copy, Clone)]
pub enum PinInName {
    Presence,
}

/// Provides the control pins of one board family
pub struct ControlPinManager {
    board: BoardKind,
}

impl ControlPinManager {
    pub fn new(board: BoardKind) -> Self {
        ControlPinManager { board }
    }

    pub fn get_pin_out(&self, pin_name: PinOutName) -> PinOut {
        let path = match pin_name {
            PinOutName::BoardReset => self.board.reset_pin(),
        };
        PinOut(PathBuf::from(path))
    }

    pub fn get_pin_in(&self, pin_name: PinInName) -> PinIn {
        let path = match pin_name {
            PinInName::Presence => self.board.presence_pin(),
        };
        PinIn(PathBuf::from(path))
    }

    /// Pulse the chain reset line and wait out the mandated quiescence
    pub fn pulse_reset(&self) -> error::Result<()> {
        let mut reset = self.get_pin_out(PinOutName::BoardReset);

        reset
            .set_low()
            .context(ErrorKind::Gpio("cannot assert board reset".to_string()))?;
        thread::sleep(RESET_PULSE_DELAY);
        reset
            .set_high()
            .context(ErrorKind::Gpio("cannot release board reset".to_string()))?;
        thread::sleep(RESET_SETTLE_DELAY);

        Ok(())
    }
}

/// Probe the presence pins. The mini carrier reads non-zero when a board is
/// plugged, the cube carrier reads zero.
pub fn detect_board() -> Option<BoardKind> {
    let mini = ControlPinManager::new(BoardKind::Mini).get_pin_in(PinInName::Presence);
    if let Ok(true) = mini.is_high() {
        return Some(BoardKind::Mini);
    }

    let cube = ControlPinManager::new(BoardKind::Cube).get_pin_in(PinInName::Presence);
    if let Ok(true) = cube.is_low() {
        return Some(BoardKind::Cube);
    }

    None
}
