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

//! One shared bus: a transport, the mutex serializing it and the miners
//! behind it.
//!
//! Every transaction sends a request and reads the full framed response
//! under a single lock acquisition; nothing else may interleave on the
//! channel. All miner records live under the same mutex because nonce
//! results of any miner can arrive through any poll.

use crate::algorithm::Algorithm;
use crate::config::Config;
use crate::error::{self, ErrorKind};
use crate::hal;
use crate::message::{Command, InfoResponse, Message};
use crate::miner::{Miner, State};
use crate::payload;
use crate::transport::{DeviceKind, Transport};
use crate::MAX_MINERS;

use packed_struct::PackedStructSlice;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Chips of this ASIC version mirror the primary miner's work stream
/// instead of pulling their own
const SHARED_WORK_ASIC_VER: u8 = 0x51;

/// Everything the bus mutex protects
pub(crate) struct Inner {
    pub transport: Box<dyn Transport>,
    pub miners: Vec<Miner>,
    /// Algorithm currently in effect on the chain
    pub algorithm: Algorithm,
}

pub struct Bus {
    inner: Mutex<Inner>,
    kind: DeviceKind,
    config: Config,
    /// Cleared once the bus is torn down
    alive: AtomicBool,
}

impl Bus {
    pub fn new(transport: Box<dyn Transport>, config: Config, algorithm: Algorithm) -> Self {
        let kind = transport.device_kind();
        Self {
            inner: Mutex::new(Inner {
                transport,
                miners: Vec::new(),
                algorithm,
            }),
            kind,
            config,
            alive: AtomicBool::new(true),
        }
    }

    pub fn device_kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Disable the bus and mark every miner shut down. In-flight work is
    /// released; there is no in-place recovery, the supervisor has to detect
    /// again.
    pub fn tear_down(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let mut inner = self.lock();
        for miner in inner.miners.iter_mut() {
            miner.shut_down();
        }
    }

    pub fn miner_count(&self) -> usize {
        self.lock().miners.len()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.lock().algorithm
    }

    pub fn miner_state(&self, miner_id: usize) -> Option<State> {
        self.lock().miners.get(miner_id).map(|miner| miner.state)
    }

    /// Discard stale bytes sitting in the channel
    pub fn drain(&self) {
        self.lock().transport.drain();
    }

    pub(crate) fn lock(&self) -> MutexGuard<Inner> {
        self.inner.lock().expect("BUG: bus mutex poisoned")
    }

    pub(crate) fn start_miner(&self, miner_id: usize) {
        if let Some(miner) = self.lock().miners.get_mut(miner_id) {
            miner.start();
        }
    }

    /// One request/response pair on the channel; the caller holds the lock
    fn transact(inner: &mut Inner, msg: &Message) -> error::Result<Message> {
        let cmd = msg
            .command()
            .ok_or_else(|| ErrorKind::Protocol(format!("unknown command {:#04x}", msg.cmd)))?;
        let expected = cmd
            .response_len()
            .expect("BUG: transact called for a fire-and-forget command");

        inner.transport.write_all(&msg.encode())?;

        if cmd == Command::Reset || cmd == Command::GetInfo {
            let settle = inner.transport.settle_delay();
            if settle > Duration::from_millis(0) {
                thread::sleep(settle);
            }
        }

        let frame = inner.transport.read_frame(expected)?;
        match Message::decode(&frame) {
            Ok(response) => Ok(response),
            Err(e) => {
                // garbage may follow a broken frame, get rid of it
                inner.transport.drain();
                Err(e)
            }
        }
    }

    /// RESET the chain; the response carries how many logical miners share
    /// it. The count is fixed for the lifetime of the bus.
    pub fn reset(&self) -> error::Result<usize> {
        let mut guard = self.lock();
        let response = Self::transact(&mut guard, &Message::reset())?;

        let mut count = response.param as usize;
        if count > MAX_MINERS {
            warn!("device reports {} miners, clamping to {}", count, MAX_MINERS);
            count = MAX_MINERS;
        }
        guard.miners = (0..count).map(Miner::new).collect();

        Ok(count)
    }

    /// GET_INFO fills in the identity of one miner
    pub fn get_info(&self, miner_id: usize) -> error::Result<()> {
        let mut guard = self.lock();
        let response = Self::transact(&mut guard, &Message::get_info(miner_id as u8))?;

        let info = InfoResponse::unpack_from_slice(&response.data).map_err(|_| {
            ErrorKind::Protocol(format!(
                "GET_INFO payload has {} bytes",
                response.data.len()
            ))
        })?;

        info!(
            "miner {}: fw {} hw {} asic {:#04x}, {} asics @ {} MHz",
            miner_id,
            info.fw_ver,
            info.hw_ver,
            info.asic_ver,
            info.asic_count,
            info.clock_mhz()
        );

        let miner = guard
            .miners
            .get_mut(miner_id)
            .ok_or_else(|| ErrorKind::Miner(miner_id, "not on this bus".to_string()))?;
        miner.apply_info(&info);

        Ok(())
    }

    /// SET_OPTION applies clock, algorithm, thermal cutoff and fan speed
    pub fn set_option(
        &self,
        miner_id: usize,
        clock: u16,
        mode: u8,
        cutoff_temp: u8,
        fanspeed: u8,
    ) -> error::Result<()> {
        let mut guard = self.lock();
        Self::transact(
            &mut guard,
            &Message::set_option(miner_id as u8, clock, mode, cutoff_temp, fanspeed),
        )?;
        Ok(())
    }

    /// SET_ID makes the addressed miner identify itself
    pub fn set_id(&self, miner_id: usize) -> error::Result<()> {
        let mut guard = self.lock();
        Self::transact(&mut guard, &Message::set_id(miner_id as u8))?;
        Ok(())
    }

    /// SET_IDLE is fire-and-forget, the device does not acknowledge it
    pub fn set_idle(&self, miner_id: usize) -> error::Result<()> {
        let mut guard = self.lock();
        let msg = Message::set_idle(miner_id as u8);
        guard.transport.write_all(&msg.encode())?;
        Ok(())
    }

    /// Poll one miner for a result
    pub(crate) fn get_result(&self, miner_id: usize) -> error::Result<Message> {
        let mut guard = self.lock();
        Self::transact(&mut guard, &Message::get_result(miner_id as u8))
    }

    /// Push one work item to `miner_id`.
    ///
    /// Overheated miners are skipped without error. The item is stored in
    /// its FIFO slot before the transaction, so on a failed send the next
    /// attempt resends it instead of consuming a fresh one. On success the
    /// ring advances and the slot that aged out is released.
    pub fn send_work(&self, miner_id: usize, source: &dyn hal::WorkSource) -> error::Result<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner
            .miners
            .get(miner_id)
            .ok_or_else(|| ErrorKind::Miner(miner_id, "not on this bus".to_string()))?
            .state
            == State::Overheated
        {
            return Ok(());
        }

        if inner.miners[miner_id].fifo.current().is_none() {
            // chains of the shared-work chip family mirror miner 0 instead
            // of pulling their own job
            let mirrored = if miner_id != 0
                && inner.miners[miner_id].asic_ver == SHARED_WORK_ASIC_VER
            {
                let primary = &inner.miners[0];
                primary.fifo.get(primary.fifo.last_dispatched()).cloned()
            } else {
                None
            };
            let work = match mirrored {
                Some(work) => work,
                None => source.generate_work(miner_id)?,
            };
            inner.miners[miner_id].fifo.put_current(work);
        }

        // align the chain algorithm with the work's pool algorithm
        let work_algorithm = inner.miners[miner_id]
            .fifo
            .current()
            .expect("BUG: current work slot empty")
            .algorithm;
        if work_algorithm != inner.algorithm {
            inner.algorithm = work_algorithm;
        }

        let (work_idx, shaped) = {
            let miner = &inner.miners[miner_id];
            let work = miner.fifo.current().expect("BUG: current work slot empty");
            (
                miner.fifo.cursor() as u8,
                payload::build(work, miner_id as u8, self.kind, miner.working_diff)?,
            )
        };

        let response = Self::transact(inner, &Message::send_work(miner_id as u8, work_idx, shaped))?;

        let miner = &mut inner.miners[miner_id];
        // the ack reports the clock the chain is actually running at
        miner.clock = (response.param as u16) << 1;
        miner.fifo.advance();

        Ok(())
    }
}
