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

//! Driver configuration: defaults, the host option strings and their clamps

use crate::algorithm::{Algorithm, HashrateScale};
use crate::error::{self, ErrorKind};

/// Factory clock in MHz. Giant N runs at 200, X10 at 300, B at 400.
pub const DEFAULT_CLOCK: u16 = 200;
pub const CLOCK_MIN: u16 = 150;
pub const CLOCK_MAX: u16 = 400;

/// Work dispatch stops above this temperature...
pub const DEFAULT_CUTOFF_TEMP: u8 = 55;
/// ...and resumes below this one
pub const DEFAULT_RECOVER_TEMP: u8 = 40;

/// Fan duty in percent
pub const DEFAULT_FANSPEED: u8 = 100;
pub const FANSPEED_MAX: u8 = 100;

/// Bus-wide options shared by every miner on the chain
#[derive(Debug, Clone)]
pub struct Config {
    pub clock: u16,
    pub cutoff_temp: u8,
    pub recover_temp: u8,
    /// Fan duty in percent
    pub fanspeed: u8,
    /// Track staleness of in-flight work and drop results for stale slots
    pub check_stale: bool,
    /// Deployment overrides of the per-algorithm hashrate scales
    pub hashrate_scales: Vec<(Algorithm, HashrateScale)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock: DEFAULT_CLOCK,
            cutoff_temp: DEFAULT_CUTOFF_TEMP,
            recover_temp: DEFAULT_RECOVER_TEMP,
            fanspeed: DEFAULT_FANSPEED,
            check_stale: false,
            hashrate_scales: Vec::new(),
        }
    }
}

impl Config {
    /// Hashrate scale in effect for `algorithm`
    pub fn hashrate_scale(&self, algorithm: Algorithm) -> HashrateScale {
        self.hashrate_scales
            .iter()
            .find(|(overridden, _)| *overridden == algorithm)
            .map(|(_, scale)| *scale)
            .unwrap_or_else(|| algorithm.default_hashrate_scale())
    }

    /// Parse the `baikal-options` string: `clock:recover:cutoff` when the
    /// deployment allows overriding the clock, `recover:cutoff` otherwise.
    /// The clock clamps to [`CLOCK_MIN`], [`CLOCK_MAX`].
    pub fn apply_options(&mut self, options: &str, allow_clock: bool) -> error::Result<()> {
        let fields: Vec<&str> = options.split(':').collect();

        if allow_clock {
            if fields.len() != 3 {
                Err(ErrorKind::Config(format!(
                    "expected clock:recover:cutoff, got {:?}",
                    options
                )))?
            }
            let clock = parse_field(fields[0])?;
            self.clock = clock.max(CLOCK_MIN as i64).min(CLOCK_MAX as i64) as u16;
            self.recover_temp = parse_field(fields[1])? as u8;
            self.cutoff_temp = parse_field(fields[2])? as u8;
        } else {
            if fields.len() != 2 {
                Err(ErrorKind::Config(format!(
                    "expected recover:cutoff, got {:?}",
                    options
                )))?
            }
            self.recover_temp = parse_field(fields[0])? as u8;
            self.cutoff_temp = parse_field(fields[1])? as u8;
        }

        Ok(())
    }

    /// Parse the `baikal-fan` percentage; out-of-range values reset to the
    /// default
    pub fn apply_fan(&mut self, fan: &str) -> error::Result<()> {
        let value = parse_field(fan)?;
        self.fanspeed = if value < 0 || value > FANSPEED_MAX as i64 {
            DEFAULT_FANSPEED
        } else {
            value as u8
        };
        Ok(())
    }

    /// Register the backend arguments
    pub fn add_args<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
        app.arg(
            clap::Arg::with_name("baikal-options")
                .long("baikal-options")
                .help("Set temperature thresholds (and clock, where enabled) as clock:recover:cutoff or recover:cutoff")
                .required(false)
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("baikal-fan")
                .long("baikal-fan")
                .help("Set fan speed in percent (0-100)")
                .required(false)
                .takes_value(true),
        )
    }

    /// Resolve a configuration from parsed arguments
    pub fn from_matches(matches: &clap::ArgMatches, allow_clock: bool) -> error::Result<Self> {
        let mut config = Self::default();
        if let Some(options) = matches.value_of("baikal-options") {
            config.apply_options(options, allow_clock)?;
        }
        if let Some(fan) = matches.value_of("baikal-fan") {
            config.apply_fan(fan)?;
        }
        Ok(config)
    }
}

fn parse_field(field: &str) -> error::Result<i64> {
    field
        .trim()
        .parse()
        .map_err(|_| ErrorKind::Config(format!("not a number: {:?}", field)).into())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.clock, 200);
        assert_eq!(config.cutoff_temp, 55);
        assert_eq!(config.recover_temp, 40);
        assert_eq!(config.fanspeed, 100);
        assert!(!config.check_stale);
    }

    #[test]
    fn test_options_without_clock() {
        let mut config = Config::default();
        config.apply_options("35:60", false).unwrap();
        assert_eq!(config.recover_temp, 35);
        assert_eq!(config.cutoff_temp, 60);
        assert_eq!(config.clock, DEFAULT_CLOCK);

        assert!(config.apply_options("300:35:60", false).is_err());
        assert!(config.apply_options("35:hot", false).is_err());
    }

    #[test]
    fn test_options_with_clock() {
        let mut config = Config::default();
        config.apply_options("300:35:60", true).unwrap();
        assert_eq!(config.clock, 300);
        assert_eq!(config.recover_temp, 35);
        assert_eq!(config.cutoff_temp, 60);

        // clock clamps into the supported range
        config.apply_options("100:35:60", true).unwrap();
        assert_eq!(config.clock, CLOCK_MIN);
        config.apply_options("900:35:60", true).unwrap();
        assert_eq!(config.clock, CLOCK_MAX);
    }

    #[test]
    fn test_fan_parsing() {
        let mut config = Config::default();
        config.apply_fan("70").unwrap();
        assert_eq!(config.fanspeed, 70);
        config.apply_fan("0").unwrap();
        assert_eq!(config.fanspeed, 0);
        // out of range resets to default
        config.apply_fan("150").unwrap();
        assert_eq!(config.fanspeed, DEFAULT_FANSPEED);
        config.apply_fan("-5").unwrap();
        assert_eq!(config.fanspeed, DEFAULT_FANSPEED);
        assert!(config.apply_fan("fast").is_err());
    }

    #[test]
    fn test_hashrate_scale_override() {
        let mut config = Config::default();
        assert_eq!(
            config.hashrate_scale(Algorithm::X11),
            HashrateScale::Mul(120)
        );
        config
            .hashrate_scales
            .push((Algorithm::X11, HashrateScale::Mul(128)));
        assert_eq!(
            config.hashrate_scale(Algorithm::X11),
            HashrateScale::Mul(128)
        );
        // other algorithms keep their defaults
        assert_eq!(
            config.hashrate_scale(Algorithm::Sia),
            HashrateScale::Mul(1000)
        );
    }

    #[test]
    fn test_from_matches() {
        let app = Config::add_args(clap::App::new("test"));
        let matches = app
            .get_matches_from(vec!["test", "--baikal-options", "35:60", "--baikal-fan", "80"]);
        let config = Config::from_matches(&matches, false).unwrap();
        assert_eq!(config.recover_temp, 35);
        assert_eq!(config.cutoff_temp, 60);
        assert_eq!(config.fanspeed, 80);
    }
}
