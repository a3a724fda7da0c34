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

//! Scripted transport for exercising the bus without hardware

use crate::error::{self, ErrorKind};
use crate::message::Message;
use crate::transport::{DeviceKind, Transport};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One canned reaction of the fake device
enum Reply {
    Frame(Vec<u8>),
    Error,
}

struct Inner {
    written: Vec<Vec<u8>>,
    replies: VecDeque<Reply>,
    drains: usize,
}

/// Transport backed by a reply script. Every frame written to it is kept for
/// inspection; reads pop the next scripted reply. Clones share the script
/// and the write log, so a test keeps one clone while the bus owns the
/// other.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
    kind: DeviceKind,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_kind(DeviceKind::Usb)
    }

    pub fn with_kind(kind: DeviceKind) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                written: Vec::new(),
                replies: VecDeque::new(),
                drains: 0,
            })),
            kind,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<Inner> {
        self.inner.lock().expect("BUG: mock transport mutex poisoned")
    }

    /// Queue a raw reply frame
    pub fn push_frame(&self, frame: Vec<u8>) {
        self.lock().replies.push_back(Reply::Frame(frame));
    }

    /// Queue an encoded message reply
    pub fn push_message(&self, msg: &Message) {
        self.push_frame(msg.encode());
    }

    /// Queue an I/O failure
    pub fn push_error(&self) {
        self.lock().replies.push_back(Reply::Error);
    }

    /// Frames the driver wrote so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Decoded view of all frames written so far
    pub fn sent_messages(&self) -> Vec<Message> {
        self.written()
            .iter()
            .map(|frame| Message::decode(frame).expect("BUG: driver sent a malformed frame"))
            .collect()
    }

    /// How many drain passes the driver requested
    pub fn drains(&self) -> usize {
        self.lock().drains
    }

    /// Replies still waiting to be consumed
    pub fn pending_replies(&self) -> usize {
        self.lock().replies.len()
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, frame: &[u8]) -> error::Result<usize> {
        self.lock().written.push(frame.to_vec());
        Ok(frame.len())
    }

    fn read_frame(&mut self, _expected: usize) -> error::Result<Vec<u8>> {
        match self.lock().replies.pop_front() {
            Some(Reply::Frame(frame)) => Ok(frame),
            Some(Reply::Error) => Err(ErrorKind::Io("scripted read failure".to_string()))?,
            None => Err(ErrorKind::Io("no reply scripted".to_string()))?,
        }
    }

    fn device_kind(&self) -> DeviceKind {
        self.kind
    }

    /// Drains are counted instead of eating scripted replies
    fn drain(&mut self) {
        self.lock().drains += 1;
    }
}
