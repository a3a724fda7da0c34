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

//! Process-wide structured logger. Level filtering follows the usual `RUST_LOG`
//! environment convention.

use lazy_static::lazy_static;
use slog::Drain;

/// The miner tends to burst messages into the logger, so the async drain
/// channel needs some depth
pub const ASYNC_LOGGER_DRAIN_CHANNEL_SIZE: usize = 128;

lazy_static! {
    /// Logger all driver modules log through
    pub static ref LOGGER: slog::Logger = build_logger();
}

fn build_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain.fuse())
        .chan_size(ASYNC_LOGGER_DRAIN_CHANNEL_SIZE)
        .build()
        .fuse();

    slog::Logger::root(drain, slog::o!())
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { slog::trace!($crate::logging::LOGGER, $($arg)+) };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { slog::debug!($crate::logging::LOGGER, $($arg)+) };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { slog::info!($crate::logging::LOGGER, $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { slog::warn!($crate::logging::LOGGER, $($arg)+) };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { slog::error!($crate::logging::LOGGER, $($arg)+) };
}
