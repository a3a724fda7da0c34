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

//! Framed command protocol spoken on the bus.
//!
//! Frames look the same on both transports:
//! `':' | miner_id | cmd | param | dest | payload | '\r' | '\n'`
//! where every payload byte travels as a `(0x00, byte)` stuffing pair. The
//! response length is fixed per command and the bus reads exactly that many
//! bytes before letting go of the channel.

use crate::error::{self, ErrorKind};

use packed_struct::prelude::*;
use packed_struct_codegen::{PackedStruct, PrimitiveEnum_u8};

/// Frame bytes that are not payload: header, four id/command bytes, trailer
pub const FRAME_OVERHEAD: usize = 7;

/// Leading frame sentinel
pub const FRAME_HEAD: u8 = b':';

/// Command codes understood by the chain controller
#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Reset = 0x01,
    GetInfo = 0x02,
    SetOption = 0x03,
    SendWork = 0x04,
    GetResult = 0x05,
    SetId = 0x06,
    SetIdle = 0x07,
}

impl Command {
    /// Exact frame length of the device response, `None` for fire-and-forget
    /// commands
    pub fn response_len(self) -> Option<usize> {
        match self {
            Command::Reset | Command::SetOption | Command::SendWork | Command::SetId => Some(7),
            Command::GetInfo => Some(21),
            Command::GetResult => Some(23),
            Command::SetIdle => None,
        }
    }
}

/// One logical message on the bus; `data` is the unstuffed payload
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub miner_id: u8,
    pub cmd: u8,
    pub param: u8,
    pub dest: u8,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(miner_id: u8, cmd: Command) -> Self {
        Self {
            miner_id,
            cmd: cmd.to_primitive(),
            param: 0,
            dest: 0,
            data: Vec::new(),
        }
    }

    /// RESET is always addressed to miner 0; the response `param` carries the
    /// miner count of the chain
    pub fn reset() -> Self {
        Self::new(0, Command::Reset)
    }

    pub fn get_info(miner_id: u8) -> Self {
        Self::new(miner_id, Command::GetInfo)
    }

    pub fn set_option(miner_id: u8, clock: u16, mode: u8, cutoff_temp: u8, fanspeed: u8) -> Self {
        let mut msg = Self::new(miner_id, Command::SetOption);
        msg.data = vec![clock_code(clock), mode, cutoff_temp, fanspeed];
        msg
    }

    /// `param` is the FIFO index the device will echo back in nonce results
    pub fn send_work(miner_id: u8, work_idx: u8, payload: Vec<u8>) -> Self {
        let mut msg = Self::new(miner_id, Command::SendWork);
        msg.param = work_idx;
        msg.data = payload;
        msg
    }

    pub fn get_result(miner_id: u8) -> Self {
        Self::new(miner_id, Command::GetResult)
    }

    pub fn set_id(miner_id: u8) -> Self {
        Self::new(miner_id, Command::SetId)
    }

    pub fn set_idle(miner_id: u8) -> Self {
        Self::new(miner_id, Command::SetIdle)
    }

    /// Command code of this message, `None` when the device echoed something
    /// unknown
    pub fn command(&self) -> Option<Command> {
        Command::from_primitive(self.cmd)
    }

    /// Serialize into the on-wire frame
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_OVERHEAD + 2 * self.data.len());

        frame.push(FRAME_HEAD);
        frame.push(self.miner_id);
        frame.push(self.cmd);
        frame.push(self.param);
        frame.push(self.dest);
        for &byte in self.data.iter() {
            frame.push(0x00);
            frame.push(byte);
        }
        frame.push(b'\r');
        frame.push(b'\n');

        frame
    }

    /// Parse a received frame. Sentinel and length violations are frame
    /// errors; the caller is expected to fail the transaction and drain.
    pub fn decode(frame: &[u8]) -> error::Result<Self> {
        if frame.len() < FRAME_OVERHEAD {
            Err(ErrorKind::Frame(format!("short frame: {} bytes", frame.len())))?
        }
        if frame[0] != FRAME_HEAD
            || frame[frame.len() - 2] != b'\r'
            || frame[frame.len() - 1] != b'\n'
        {
            Err(ErrorKind::Frame("bad frame sentinels".to_string()))?
        }
        if (frame.len() - FRAME_OVERHEAD) % 2 != 0 {
            Err(ErrorKind::Frame(format!(
                "ragged payload: {} bytes",
                frame.len() - FRAME_OVERHEAD
            )))?
        }

        let data = frame[5..frame.len() - 2]
            .chunks(2)
            .map(|pair| pair[1])
            .collect();

        Ok(Self {
            miner_id: frame[1],
            cmd: frame[2],
            param: frame[3],
            dest: frame[4],
            data,
        })
    }
}

/// SET_OPTION clock byte: 0 keeps the device clock, any other value folds the
/// 150-400 MHz range into a single byte as `((clk / 10) mod 20) + 2`
pub fn clock_code(clock: u16) -> u8 {
    if clock == 0 {
        0
    } else {
        ((clock / 10) % 20 + 2) as u8
    }
}

/// GET_INFO response payload
#[derive(PackedStruct, Debug, Clone, PartialEq)]
#[packed_struct(endian = "lsb")]
pub struct InfoResponse {
    pub fw_ver: u8,
    pub hw_ver: u8,
    /// Capability byte of the board generation
    pub bbg: u8,
    /// Clock in 2 MHz units
    pub clock_half: u8,
    pub asic_count: u8,
    /// ASIC count as re-counted by the chain itself
    pub asic_count_r: u8,
    pub asic_ver: u8,
}

impl InfoResponse {
    pub fn clock_mhz(&self) -> u16 {
        (self.clock_half as u16) << 1
    }
}

/// GET_RESULT response payload
#[derive(PackedStruct, Debug, Clone, PartialEq)]
#[packed_struct(endian = "lsb")]
pub struct ResultResponse {
    pub nonce: u32,
    pub chip_id: u8,
    /// FIFO slot this nonce was found for
    pub work_idx: u8,
    pub temp: u8,
    pub unit_id: u8,
}

/// GET_RESULT `param` bit mask
#[derive(PackedStruct, Debug, Clone, Copy, PartialEq)]
#[packed_struct(size_bytes = "1", bit_numbering = "lsb0")]
pub struct ResultFlags {
    /// A nonce is present in the payload
    #[packed_field(bits = "0")]
    pub nonce_ready: bool,
    /// The device wants more work now
    #[packed_field(bits = "1")]
    pub work_wanted: bool,
    /// Fatal condition, the scan pass must be abandoned
    #[packed_field(bits = "2")]
    pub fault: bool,
}

impl ResultFlags {
    pub fn from_param(param: u8) -> Self {
        Self::unpack(&[param]).expect("BUG: result flags unpack")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        for len in &[0usize, 1, 4, 90, 210, 253] {
            let msg = Message {
                miner_id: 3,
                cmd: Command::SendWork.to_primitive(),
                param: 42,
                dest: 0,
                data: (0..*len).map(|i| i as u8).collect(),
            };
            let frame = msg.encode();
            assert_eq!(frame.len(), FRAME_OVERHEAD + 2 * len);
            assert_eq!(Message::decode(&frame).expect("decode failed"), msg);
        }
    }

    #[test]
    fn test_frame_layout() {
        let frame = Message::get_info(2).encode();
        assert_eq!(frame, vec![b':', 0x02, 0x02, 0x00, 0x00, b'\r', b'\n']);

        let msg = Message::send_work(1, 17, vec![0xab, 0xcd]);
        assert_eq!(
            msg.encode(),
            vec![b':', 0x01, 0x04, 17, 0x00, 0x00, 0xab, 0x00, 0xcd, b'\r', b'\n']
        );
    }

    #[test]
    fn test_decode_rejects_bad_sentinels() {
        let mut frame = Message::get_result(0).encode();
        frame[0] = b';';
        assert!(Message::decode(&frame).is_err());

        let mut frame = Message::get_result(0).encode();
        let trailer = frame.len() - 2;
        frame[trailer] = b'\n';
        assert!(Message::decode(&frame).is_err());

        assert!(Message::decode(&[b':', 0, 0, 0, b'\r', b'\n']).is_err());
    }

    #[test]
    fn test_decode_rejects_ragged_payload() {
        let mut frame = Message::get_result(0).encode();
        frame.insert(5, 0x00);
        assert!(Message::decode(&frame).is_err());
    }

    #[test]
    fn test_clock_code() {
        assert_eq!(clock_code(0), 0);
        assert_eq!(clock_code(150), 17);
        assert_eq!(clock_code(200), 22);
        assert_eq!(clock_code(390), 21);
        assert_eq!(clock_code(400), 2);
        for clock in (150..=400).step_by(10) {
            assert_eq!(clock_code(clock), ((clock / 10) % 20 + 2) as u8);
        }
    }

    #[test]
    fn test_set_option_payload() {
        let msg = Message::set_option(1, 200, 0x14, 55, 100);
        assert_eq!(msg.data, vec![22, 0x14, 55, 100]);
        // clock 0 keeps the device default
        let msg = Message::set_option(1, 0, 0x01, 55, 100);
        assert_eq!(msg.data[0], 0);
    }

    #[test]
    fn test_info_response_unpack() {
        let data = [9u8, 2, 1, 100, 40, 40, 0x51];
        let info = InfoResponse::unpack_from_slice(&data).expect("unpack failed");
        assert_eq!(info.fw_ver, 9);
        assert_eq!(info.hw_ver, 2);
        assert_eq!(info.bbg, 1);
        assert_eq!(info.clock_mhz(), 200);
        assert_eq!(info.asic_count, 40);
        assert_eq!(info.asic_count_r, 40);
        assert_eq!(info.asic_ver, 0x51);
    }

    #[test]
    fn test_result_response_unpack() {
        let data = [0xef, 0xbe, 0xad, 0xde, 5, 17, 49, 2];
        let result = ResultResponse::unpack_from_slice(&data).expect("unpack failed");
        assert_eq!(result.nonce, 0xdeadbeef);
        assert_eq!(result.chip_id, 5);
        assert_eq!(result.work_idx, 17);
        assert_eq!(result.temp, 49);
        assert_eq!(result.unit_id, 2);
    }

    #[test]
    fn test_result_flags() {
        let flags = ResultFlags::from_param(0x01);
        assert!(flags.nonce_ready && !flags.work_wanted && !flags.fault);
        let flags = ResultFlags::from_param(0x03);
        assert!(flags.nonce_ready && flags.work_wanted && !flags.fault);
        let flags = ResultFlags::from_param(0x04);
        assert!(!flags.nonce_ready && !flags.work_wanted && flags.fault);
    }

    #[test]
    fn test_response_lengths() {
        assert_eq!(Command::Reset.response_len(), Some(7));
        assert_eq!(Command::GetInfo.response_len(), Some(21));
        assert_eq!(Command::GetResult.response_len(), Some(23));
        assert_eq!(Command::SetIdle.response_len(), None);
    }
}
