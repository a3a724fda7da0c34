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

//! Interfaces of the host mining application the driver consumes

use crate::error;
use crate::work::Work;

/// Work factory and share verifier of the host application.
///
/// The bus invokes both methods with its lock held: implementations have to
/// be quick and must not call back into the bus.
pub trait WorkSource: Send + Sync {
    /// Produce a fresh work item for the given logical miner
    fn generate_work(&self, miner_id: usize) -> error::Result<Work>;

    /// Verify a nonce found for `work` and account the share on the host
    /// side. `false` means the nonce failed verification (a hardware error).
    fn submit_nonce(&self, work: &Work, nonce: u32) -> bool;
}
