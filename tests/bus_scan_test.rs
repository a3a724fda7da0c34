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

//! End-to-end scenarios against a scripted transport: detect, nonce
//! routing, device-driven work refills, the thermal cutoff latch and
//! malformed-frame handling.

use bosminer_baikal::algorithm::Algorithm;
use bosminer_baikal::config::Config;
use bosminer_baikal::error;
use bosminer_baikal::hal;
use bosminer_baikal::message::{Command, Message};
use bosminer_baikal::miner::State;
use bosminer_baikal::scan;
use bosminer_baikal::supervisor;
use bosminer_baikal::transport::test_utils::MockTransport;
use bosminer_baikal::work::Work;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Host-side stub: hands out works of a configurable algorithm and answers
/// nonce submissions from a verdict script (defaults to accept).
struct TestSource {
    algorithm: Mutex<Algorithm>,
    verdicts: Mutex<VecDeque<bool>>,
    submitted: Mutex<Vec<u32>>,
    generated: AtomicUsize,
}

impl TestSource {
    fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm: Mutex::new(algorithm),
            verdicts: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            generated: AtomicUsize::new(0),
        }
    }

    fn set_algorithm(&self, algorithm: Algorithm) {
        *self.algorithm.lock().unwrap() = algorithm;
    }

    fn push_verdict(&self, accept: bool) {
        self.verdicts.lock().unwrap().push_back(accept);
    }

    fn submitted(&self) -> Vec<u32> {
        self.submitted.lock().unwrap().clone()
    }

    fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

impl hal::WorkSource for TestSource {
    fn generate_work(&self, _miner_id: usize) -> error::Result<Work> {
        let algorithm = *self.algorithm.lock().unwrap();
        let header_len = match algorithm {
            Algorithm::Decred => 180,
            Algorithm::Pascal => 200,
            Algorithm::Lbry => 112,
            _ => 80,
        };
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(Work {
            data: vec![0u8; header_len],
            midstate: None,
            algorithm,
            difficulty: 1.0,
            diff_multiplier: 1.0,
            pool_url: String::new(),
            stale: false,
        })
    }

    fn submit_nonce(&self, _work: &Work, nonce: u32) -> bool {
        self.submitted.lock().unwrap().push(nonce);
        self.verdicts.lock().unwrap().pop_front().unwrap_or(true)
    }
}

fn reset_reply(miner_count: u8) -> Message {
    let mut msg = Message::new(0, Command::Reset);
    msg.param = miner_count;
    msg
}

fn info_reply(miner_id: u8, asic_ver: u8) -> Message {
    let mut msg = Message::new(miner_id, Command::GetInfo);
    msg.data = vec![9, 2, 1, 100, 40, 40, asic_ver];
    msg
}

fn option_ack(miner_id: u8) -> Message {
    Message::new(miner_id, Command::SetOption)
}

fn send_work_ack(miner_id: u8, clock_half: u8) -> Message {
    let mut msg = Message::new(miner_id, Command::SendWork);
    msg.param = clock_half;
    msg
}

fn result_reply(
    miner_id: u8,
    flags: u8,
    nonce: u32,
    chip_id: u8,
    work_idx: u8,
    temp: u8,
    unit_id: u8,
) -> Message {
    let mut msg = Message::new(miner_id, Command::GetResult);
    msg.param = flags;
    let mut data = nonce.to_le_bytes().to_vec();
    data.extend_from_slice(&[chip_id, work_idx, temp, unit_id]);
    msg.data = data;
    msg
}

/// Script a full bring-up of `miner_count` miners and run detect
fn detect_bus(transport: &MockTransport, miner_count: u8) -> bosminer_baikal::Bus {
    transport.push_message(&reset_reply(miner_count));
    for miner_id in 0..miner_count {
        transport.push_message(&info_reply(miner_id, 0x41));
        transport.push_message(&option_ack(miner_id));
    }
    supervisor::detect(
        Box::new(transport.clone()),
        Config::default(),
        Algorithm::X11,
    )
    .expect("detect failed")
}

#[test]
fn test_detect_brings_up_all_reported_miners() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 3);

    assert_eq!(bus.miner_count(), 3);
    for miner_id in 0..3 {
        assert_eq!(bus.miner_state(miner_id), Some(State::Working));
        let stats = bus.stats(miner_id).unwrap();
        assert_eq!(stats.chip_count, 40);
        assert_eq!(stats.clock, 200);
    }

    // stale bytes were drained before the first transaction
    assert!(transport.drains() >= 1);

    // one RESET, then GET_INFO + SET_OPTION once per miner
    let sent = transport.sent_messages();
    let cmds: Vec<_> = sent.iter().map(|msg| msg.command().unwrap()).collect();
    assert_eq!(
        cmds,
        vec![
            Command::Reset,
            Command::GetInfo,
            Command::SetOption,
            Command::GetInfo,
            Command::SetOption,
            Command::GetInfo,
            Command::SetOption,
        ]
    );
    assert_eq!(sent[1].miner_id, 0);
    assert_eq!(sent[3].miner_id, 1);
    assert_eq!(sent[5].miner_id, 2);
    // SET_OPTION carries clock code, algorithm, cutoff, fan
    assert_eq!(sent[2].data, vec![22, 0x01, 55, 100]);
}

#[test]
fn test_accepted_nonce_routes_to_asic_counters() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    // occupy slots 0..=17 so the result below references live work
    for _ in 0..18 {
        transport.push_message(&send_work_ack(0, 100));
        bus.send_work(0, &source).expect("send failed");
    }

    transport.push_message(&result_reply(0, 0x01, 0xdeadbeef, 5, 17, 30, 2));
    let hashes = scan::scan(&bus, 0, &source);

    assert_eq!(source.submitted(), vec![0xdeadbeef]);
    let counters = bus.counters(0).unwrap();
    assert_eq!(counters.asic(2, 5).unwrap().valid, 1);
    assert_eq!(counters.asic(2, 5).unwrap().errors, 0);
    assert_eq!(counters.valid, 1);
    assert_eq!(counters.errors, 0);
    assert_eq!(bus.temperature(0), Some(30));
    assert!(hashes >= 0);
}

#[test]
fn test_rejected_nonce_counts_hardware_error() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    transport.push_message(&send_work_ack(0, 100));
    bus.send_work(0, &source).expect("send failed");

    source.push_verdict(false);
    transport.push_message(&result_reply(0, 0x01, 0x1234, 3, 0, 30, 1));
    scan::scan(&bus, 0, &source);

    let counters = bus.counters(0).unwrap();
    assert_eq!(counters.asic(1, 3).unwrap().errors, 1);
    assert_eq!(counters.asic(1, 3).unwrap().valid, 0);
    assert_eq!(counters.errors, 1);
    assert_eq!(counters.valid, 0);
}

#[test]
fn test_work_wanted_flag_triggers_dispatch() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    transport.push_message(&result_reply(0, 0x02, 0, 0, 0, 30, 0));
    transport.push_message(&send_work_ack(0, 100));
    scan::scan(&bus, 0, &source);

    assert_eq!(source.generated(), 1);
    let sent = transport.sent_messages();
    let dispatch = sent.last().unwrap();
    assert_eq!(dispatch.command(), Some(Command::SendWork));
    assert_eq!(dispatch.miner_id, 0);
    // first dispatch goes to slot 0
    assert_eq!(dispatch.param, 0);
}

#[test]
fn test_cutoff_latch_suppresses_dispatch() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    // cutoff 55, recover 40; the device asks for work on every poll
    let temps = [54u8, 56, 50, 39, 30];
    let dispatched = [true, false, false, true, true];

    for (temp, expect_send) in temps.iter().zip(dispatched.iter()) {
        transport.push_message(&result_reply(0, 0x02, 0, 0, 0, *temp, 0));
        if *expect_send {
            transport.push_message(&send_work_ack(0, 100));
        }
        let before = transport.written().len();
        scan::scan(&bus, 0, &source);
        let sends = transport.written().len() - before - 1; // minus the poll
        assert_eq!(
            sends == 1,
            *expect_send,
            "wrong dispatch behavior at {} degrees",
            temp
        );
    }

    assert_eq!(bus.miner_state(0), Some(State::Working));
    assert_eq!(transport.pending_replies(), 0);
}

#[test]
fn test_malformed_info_skips_miner_not_bus() {
    let transport = MockTransport::new();
    transport.push_message(&reset_reply(2));
    transport.push_message(&info_reply(0, 0x41));
    transport.push_message(&option_ack(0));
    // miner 1 answers GET_INFO with a frame missing the ':' header
    let mut broken = info_reply(1, 0x41).encode();
    broken[0] = b'x';
    transport.push_frame(broken);

    let bus = supervisor::detect(
        Box::new(transport.clone()),
        Config::default(),
        Algorithm::X11,
    )
    .expect("detect failed");

    assert!(bus.is_alive());
    assert_eq!(bus.miner_count(), 2);
    assert_eq!(bus.miner_state(0), Some(State::Working));
    assert_eq!(bus.miner_state(1), Some(State::Uninitialized));

    // miner 1 never got options applied
    let sent = transport.sent_messages();
    let option_targets: Vec<_> = sent
        .iter()
        .filter(|msg| msg.command() == Some(Command::SetOption))
        .map(|msg| msg.miner_id)
        .collect();
    assert_eq!(option_targets, vec![0]);
}

#[test]
fn test_stale_algorithm_result_is_dropped() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    // slot 0 is x11 work
    transport.push_message(&send_work_ack(0, 100));
    bus.send_work(0, &source).expect("send failed");

    // the pool switched, slot 1 realigns the chain to decred
    source.set_algorithm(Algorithm::Decred);
    transport.push_message(&send_work_ack(0, 100));
    bus.send_work(0, &source).expect("send failed");
    assert_eq!(bus.algorithm(), Algorithm::Decred);

    // a late nonce for the x11 slot must not reach the verifier
    transport.push_message(&result_reply(0, 0x01, 0xcafe, 1, 0, 30, 0));
    scan::scan(&bus, 0, &source);

    assert!(source.submitted().is_empty());
    let counters = bus.counters(0).unwrap();
    assert_eq!(counters.valid, 0);
    assert_eq!(counters.errors, 0);
}

#[test]
fn test_fatal_flag_tears_down_bus() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    transport.push_message(&result_reply(0, 0x04, 0, 0, 0, 30, 0));
    assert_eq!(scan::scan(&bus, 0, &source), scan::SCAN_DEAD);
    assert!(!bus.is_alive());
    assert_eq!(bus.miner_state(0), Some(State::ShutDown));
    // once torn down, scans report the sentinel immediately
    assert_eq!(scan::scan(&bus, 0, &source), scan::SCAN_DEAD);
}

#[test]
fn test_poll_failure_tears_down_bus() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    transport.push_error();
    assert_eq!(scan::scan(&bus, 0, &source), scan::SCAN_DEAD);
    assert!(!bus.is_alive());
}

#[test]
fn test_update_work_prefills_fifo() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 2);
    let source = TestSource::new(Algorithm::X11);

    // x11 pre-loads four works per miner
    for _ in 0..8 {
        transport.push_message(&send_work_ack(0, 100));
    }
    scan::update_work(&bus, 0, &source);

    assert_eq!(source.generated(), 8);
    let sent = transport.sent_messages();
    let dispatches: Vec<_> = sent
        .iter()
        .filter(|msg| msg.command() == Some(Command::SendWork))
        .map(|msg| (msg.miner_id, msg.param))
        .collect();
    assert_eq!(
        dispatches,
        vec![(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (1, 1), (1, 2), (1, 3)]
    );

    // non-primary threads ignore the update signal
    scan::update_work(&bus, 1, &source);
    assert_eq!(source.generated(), 8);
}

#[test]
fn test_update_work_respects_refill_counts() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::Decred);

    // align the chain to decred first
    transport.push_message(&send_work_ack(0, 100));
    bus.send_work(0, &source).expect("send failed");
    assert_eq!(source.generated(), 1);

    // decred refills purely on device demand
    scan::update_work(&bus, 0, &source);
    assert_eq!(source.generated(), 1);
    assert_eq!(transport.pending_replies(), 0);
}

#[test]
fn test_shutdown_idles_miners_and_releases_work() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 2);
    let source = TestSource::new(Algorithm::X11);

    transport.push_message(&send_work_ack(0, 100));
    bus.send_work(0, &source).expect("send failed");

    supervisor::shutdown(&bus);

    assert!(!bus.is_alive());
    for miner_id in 0..2 {
        assert_eq!(bus.miner_state(miner_id), Some(State::ShutDown));
    }

    let sent = transport.sent_messages();
    let idles: Vec<_> = sent
        .iter()
        .filter(|msg| msg.command() == Some(Command::SetIdle))
        .map(|msg| msg.miner_id)
        .collect();
    assert_eq!(idles, vec![0, 1]);
}

#[test]
fn test_secondary_scan_reports_no_hashes_before_dispatch() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 2);
    let source = TestSource::new(Algorithm::X11);

    assert_eq!(scan::scan(&bus, 1, &source), 0);
}

#[test]
fn test_statline_format() {
    let transport = MockTransport::new();
    let bus = detect_bus(&transport, 1);
    let source = TestSource::new(Algorithm::X11);

    transport.push_message(&result_reply(0, 0x00, 0, 0, 0, 42, 0));
    scan::scan(&bus, 0, &source);

    assert_eq!(bus.statline(0), "42C 200MHz [ASICS #40] | ");
}
