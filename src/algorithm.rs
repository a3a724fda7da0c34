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

//! Proof-of-work algorithms of the Baikal command set

use packed_struct::PrimitiveEnum;
use packed_struct_codegen::PrimitiveEnum_u8;

/// Algorithms the chip families understand. The discriminant is the on-wire
/// algorithm code carried in the first payload byte of SEND_WORK. Codes
/// followed by a gap have an on-wire "+1" variant: blake256 families with a
/// host-computed midstate, cryptonight in its nicehash flavor.
#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    X11 = 0x01,
    X11Gost = 0x02,
    Qubit = 0x03,
    Quark = 0x04,
    Nist5 = 0x05,
    Skein = 0x06,
    Skein2 = 0x07,
    Groestl = 0x08,
    MyriadGroestl = 0x09,
    Blake256 = 0x0a,
    Veltor = 0x0b,
    /// blake256 with 8 rounds
    Blakecoin = 0x10,
    Vanilla = 0x12,
    /// blake256 with 14 rounds
    Decred = 0x14,
    /// blake2b
    Sia = 0x16,
    Lbry = 0x17,
    Pascal = 0x18,
    Cryptonight = 0x20,
    CryptonightLite = 0x22,
}

impl Algorithm {
    /// On-wire algorithm code (the payload variants add 1 to it)
    pub fn device_code(self) -> u8 {
        self.to_primitive()
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::X11 => "x11",
            Algorithm::X11Gost => "x11gost",
            Algorithm::Qubit => "qubit",
            Algorithm::Quark => "quark",
            Algorithm::Nist5 => "nist5",
            Algorithm::Skein => "skeincoin",
            Algorithm::Skein2 => "skein2",
            Algorithm::Groestl => "groestl",
            Algorithm::MyriadGroestl => "myriad-groestl",
            Algorithm::Blake256 => "blake",
            Algorithm::Veltor => "veltor",
            Algorithm::Blakecoin => "blakecoin",
            Algorithm::Vanilla => "vanilla",
            Algorithm::Decred => "decred",
            Algorithm::Sia => "sia",
            Algorithm::Lbry => "lbry",
            Algorithm::Pascal => "pascal",
            Algorithm::Cryptonight => "cryptonight",
            Algorithm::CryptonightLite => "cryptonight-lite",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = match name {
            "x11" => Algorithm::X11,
            "x11gost" | "sib" => Algorithm::X11Gost,
            "qubit" => Algorithm::Qubit,
            "quark" => Algorithm::Quark,
            "nist5" => Algorithm::Nist5,
            "skeincoin" | "skein" => Algorithm::Skein,
            "skein2" => Algorithm::Skein2,
            "groestl" => Algorithm::Groestl,
            "myriad-groestl" | "myr-gr" => Algorithm::MyriadGroestl,
            "blake" => Algorithm::Blake256,
            "veltor" => Algorithm::Veltor,
            "blakecoin" | "blake256r8" => Algorithm::Blakecoin,
            "vanilla" => Algorithm::Vanilla,
            "decred" => Algorithm::Decred,
            "sia" => Algorithm::Sia,
            "lbry" => Algorithm::Lbry,
            "pascal" => Algorithm::Pascal,
            "cryptonight" => Algorithm::Cryptonight,
            "cryptonight-lite" => Algorithm::CryptonightLite,
            _ => return None,
        };
        Some(name)
    }

    /// Empirical scale turning `clock MHz x asic count x elapsed ms` into
    /// hashes done. Kept as data so a deployment can override it per
    /// algorithm (see `config::Config::hashrate_scales`).
    pub fn default_hashrate_scale(self) -> HashrateScale {
        match self {
            Algorithm::Cryptonight => HashrateScale::Div(2000),
            Algorithm::CryptonightLite => HashrateScale::Div(1000),
            Algorithm::X11
            | Algorithm::Quark
            | Algorithm::Qubit
            | Algorithm::Nist5
            | Algorithm::MyriadGroestl
            | Algorithm::Groestl => HashrateScale::Mul(120),
            Algorithm::Skein | Algorithm::Skein2 => HashrateScale::Mul(62),
            Algorithm::X11Gost | Algorithm::Veltor => HashrateScale::Mul(16),
            Algorithm::Blakecoin
            | Algorithm::Decred
            | Algorithm::Vanilla
            | Algorithm::Blake256 => HashrateScale::Mul(2000),
            Algorithm::Sia => HashrateScale::Mul(1000),
            Algorithm::Lbry | Algorithm::Pascal => HashrateScale::Mul(500),
        }
    }

    /// How many fresh works an update pass pre-loads into each miner FIFO.
    /// The cryptonight family keeps a single job in flight, sia/decred jobs
    /// are refreshed purely on device demand.
    pub fn refill_count(self) -> usize {
        match self {
            Algorithm::Cryptonight | Algorithm::CryptonightLite => 1,
            Algorithm::Sia | Algorithm::Decred => 0,
            _ => 4,
        }
    }
}

/// Scaling applied to the raw `clock x asics x elapsed` hashrate base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashrateScale {
    Mul(i64),
    Div(i64),
}

impl HashrateScale {
    pub fn apply(self, base: i64) -> i64 {
        match self {
            HashrateScale::Mul(m) => base * m,
            HashrateScale::Div(d) => base / d,
        }
    }
}
