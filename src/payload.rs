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

//! Outbound work payload shaping
//!
//! Each chip family wants the job laid out differently: the blake256
//! families take a precomputed midstate plus padding constants, several
//! algorithms need the header big-endian word swapped, the rest take the
//! raw header. The common prefix is always
//! `algo_code | miner_id | 8-byte target tail`.

use crate::algorithm::Algorithm;
use crate::error::{self, ErrorKind};
use crate::transport::DeviceKind;
use crate::work::Work;

use byteorder::{ByteOrder, LittleEndian};

/// Scratch size the payload is shaped in
const SHAPE_BUF_SIZE: usize = 512;

/// Build the SEND_WORK payload for `work` addressed to `miner_id`.
/// `working_diff` is the miner's device-side difficulty floor.
pub fn build(
    work: &Work,
    miner_id: u8,
    kind: DeviceKind,
    working_diff: f64,
) -> error::Result<Vec<u8>> {
    let mut data = vec![0u8; SHAPE_BUF_SIZE];

    data[0] = work.algorithm.device_code();
    data[1] = miner_id;
    data[2..10].copy_from_slice(&work.device_target_tail(working_diff));
    // the device takes a 6-byte target; anything wider clamps to the widest
    // target it knows
    if data[6..10].iter().any(|&byte| byte != 0) {
        for byte in data[2..6].iter_mut() {
            *byte = 0xff;
        }
    }

    let len = match work.algorithm {
        // blake256r8
        Algorithm::Blakecoin | Algorithm::Vanilla => {
            if let Some(midstate) = work.midstate.as_ref() {
                data[0] += 1;
                data[10..42].copy_from_slice(midstate);
                data[42..58].copy_from_slice(job_bytes(work, 64..80)?);
                swap_be32(&mut data[42..58]);
                LittleEndian::write_u32(&mut data[58..62], 0x0000_0080);
                LittleEndian::write_u32(&mut data[94..98], 0x0100_0000);
                LittleEndian::write_u32(&mut data[102..106], 0x8002_0000);
                106
            } else {
                data[10..90].copy_from_slice(job_bytes(work, 0..80)?);
                swap_be32(&mut data[10..90]);
                90
            }
        }

        // blake256r14
        Algorithm::Decred => {
            if let Some(midstate) = work.midstate.as_ref() {
                data[0] += 1;
                data[10..42].copy_from_slice(midstate);
                data[42..94].copy_from_slice(job_bytes(work, 128..180)?);
                LittleEndian::write_u32(&mut data[94..98], 0x0100_0080);
                LittleEndian::write_u32(&mut data[98..102], 0x0000_0000);
                LittleEndian::write_u32(&mut data[102..106], 0xa005_0000);
                106
            } else {
                data[10..190].copy_from_slice(job_bytes(work, 0..180)?);
                190
            }
        }

        // blake2b
        Algorithm::Sia => {
            data[10..90].copy_from_slice(job_bytes(work, 0..80)?);
            swap_be32(&mut data[10..90]);
            90
        }

        Algorithm::Lbry => {
            data[10..122].copy_from_slice(job_bytes(work, 0..112)?);
            // only the first 27 words are swapped, the nonce tail stays
            swap_be32(&mut data[10..118]);
            122
        }

        Algorithm::Pascal => {
            data[10..210].copy_from_slice(job_bytes(work, 0..200)?);
            210
        }

        Algorithm::Cryptonight => {
            // the USB firmware distinguishes the nicehash blob variant
            if kind == DeviceKind::Usb && work.pool_url.contains("nicehash") {
                data[0] += 1;
            }
            data[10..90].copy_from_slice(job_bytes(work, 0..80)?);
            90
        }

        _ => {
            data[10..90].copy_from_slice(job_bytes(work, 0..80)?);
            90
        }
    };

    data.truncate(len);
    Ok(data)
}

fn job_bytes(work: &Work, range: std::ops::Range<usize>) -> error::Result<&[u8]> {
    work.data.get(range.clone()).ok_or_else(|| {
        ErrorKind::General(format!(
            "{} work carries {} header bytes, needs {}",
            work.algorithm.name(),
            work.data.len(),
            range.end
        ))
        .into()
    })
}

/// Big-endian encode each 32-bit word in place
fn swap_be32(buf: &mut [u8]) {
    for word in buf.chunks_exact_mut(4) {
        word.reverse();
    }
}
