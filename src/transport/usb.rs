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

//! USB bulk transport for the Giant family

use crate::error::{self, ErrorKind};
use crate::message::FRAME_OVERHEAD;
use crate::transport::{DeviceKind, Transport};

use failure::ResultExt;
use lazy_static::lazy_static;

use std::time::Duration;

/// The appliances enumerate as an STM32 virtual COM port
pub const DEFAULT_VENDOR_ID: u16 = 0x0483;
pub const DEFAULT_PRODUCT_ID: u16 = 0x5740;
pub const DEFAULT_EP_IN: u8 = 0x81;
pub const DEFAULT_EP_OUT: u8 = 0x01;

/// Bulk transfer timeout
const IO_TIMEOUT: Duration = Duration::from_secs(3);

lazy_static! {
    /// One process-wide USB context shared by every bus
    pub static ref USB_CONTEXT: libusb::Context =
        libusb::Context::new().expect("BUG: cannot create USB context");
}

pub struct UsbTransport {
    handle: libusb::DeviceHandle<'static>,
    ep_in: u8,
    ep_out: u8,
    timeout: Duration,
}

impl UsbTransport {
    /// Wrap an already opened and claimed device. Device discovery and
    /// endpoint selection belong to the host USB binding.
    pub fn new(handle: libusb::DeviceHandle<'static>, ep_in: u8, ep_out: u8) -> Self {
        Self {
            handle,
            ep_in,
            ep_out,
            timeout: IO_TIMEOUT,
        }
    }

    /// Open the first device matching `vendor_id:product_id` on the process
    /// context. Returns `None` when no such device is plugged.
    pub fn find(
        vendor_id: u16,
        product_id: u16,
        ep_in: u8,
        ep_out: u8,
    ) -> error::Result<Option<Self>> {
        let context: &'static libusb::Context = &*USB_CONTEXT;
        let devices = context
            .devices()
            .context(ErrorKind::Usb("cannot list USB devices".to_string()))?;

        for device in devices.iter() {
            let descriptor = device
                .device_descriptor()
                .context(ErrorKind::Usb("cannot read device descriptor".to_string()))?;
            if descriptor.vendor_id() != vendor_id || descriptor.product_id() != product_id {
                continue;
            }

            let mut handle = device
                .open()
                .context(ErrorKind::Usb("cannot open device".to_string()))?;
            handle
                .claim_interface(0)
                .context(ErrorKind::Usb("cannot claim interface".to_string()))?;

            return Ok(Some(Self::new(handle, ep_in, ep_out)));
        }

        Ok(None)
    }

    /// Find with the factory identifiers
    pub fn find_default() -> error::Result<Option<Self>> {
        Self::find(
            DEFAULT_VENDOR_ID,
            DEFAULT_PRODUCT_ID,
            DEFAULT_EP_IN,
            DEFAULT_EP_OUT,
        )
    }
}

impl Transport for UsbTransport {
    fn write_all(&mut self, frame: &[u8]) -> error::Result<usize> {
        let written = self
            .handle
            .write_bulk(self.ep_out, frame, self.timeout)
            .context(ErrorKind::Usb("bulk write failed".to_string()))?;
        if written != frame.len() {
            Err(ErrorKind::Usb(format!(
                "short frame write: {} of {} bytes",
                written,
                frame.len()
            )))?
        }
        Ok(written)
    }

    /// A single bulk read; the endpoint delivers whole frames, so anything
    /// that could hold a header and trailer is handed to the codec.
    fn read_frame(&mut self, expected: usize) -> error::Result<Vec<u8>> {
        let mut frame = vec![0u8; expected];
        let count = self
            .handle
            .read_bulk(self.ep_in, &mut frame, self.timeout)
            .context(ErrorKind::Usb("bulk read failed".to_string()))?;
        if count < FRAME_OVERHEAD {
            Err(ErrorKind::Usb(format!("short frame: {} bytes", count)))?
        }
        frame.truncate(count);
        Ok(frame)
    }

    fn device_kind(&self) -> DeviceKind {
        DeviceKind::Usb
    }
}
