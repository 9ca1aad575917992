// Copyright 2012-2016 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Batch timing and the choice of how many calls go into one batch.
//!
//! A single comparison of two short strings takes a few nanoseconds, which is at or below the
//! resolution of `Instant`. So every measurement times a batch of `N` back-to-back calls and
//! divides by `N`. The `Calibrator` picks `N` by growing it geometrically until one batch takes
//! at least a floor duration, by default the probed clock resolution times a safety factor.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// A function that is opaque to the optimizer, to allow benchmarks to pretend to use outputs to
/// assist in avoiding dead-code elimination.
#[cfg(feature = "core-hint-black-box")]
#[inline]
pub fn black_box<T>(dummy: T) -> T {
    ::core::hint::black_box(dummy)
}

// NOTE: This is a workaround for toolchains without `core::hint::black_box`. It may have a too
// big performance overhead, depending on operation, or it may fail to properly avoid having code
// optimized out.
#[cfg(not(feature = "core-hint-black-box"))]
#[inline]
pub fn black_box<T>(dummy: T) -> T {
    unsafe {
        let ret = ::std::ptr::read_volatile(&dummy);
        ::std::mem::forget(dummy);
        ret
    }
}

/// Runs `f` `iterations` times back to back and returns the wall-clock time of the whole batch
pub fn time_batch<T, F>(iterations: u64, mut f: F) -> Duration
where
    F: FnMut() -> T,
{
    let start = Instant::now();
    for _ in 0..iterations {
        black_box(f());
    }
    start.elapsed()
}

/// Estimates the smallest nonzero step `Instant` can measure, as the minimum over a few rounds
/// of the first nonzero difference between consecutive readings.
pub fn clock_resolution() -> Duration {
    const ROUNDS: usize = 100;

    let mut best = Duration::MAX;
    for _ in 0..ROUNDS {
        let start = Instant::now();
        let mut now = Instant::now();
        while now == start {
            now = Instant::now();
        }
        best = best.min(now.duration_since(start));
    }

    best
}

/// Tunables for the calibration search
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationConfig {
    /// Minimum duration of a calibrated batch. Probed from the clock when not set.
    pub floor: Option<Duration>,
    /// Multiplier applied to the probed clock resolution to get the floor
    pub safety_factor: u32,
    /// Factor the iteration count grows by after each batch that was too short
    pub growth_factor: u64,
    pub initial_iterations: u64,
    pub max_iterations: u64,
}

impl Default for CalibrationConfig {
    fn default() -> CalibrationConfig {
        CalibrationConfig {
            floor: None,
            safety_factor: 100,
            growth_factor: 2,
            initial_iterations: 1,
            max_iterations: 1 << 24,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.growth_factor < 2 {
            return Err(Error::InvalidConfig(format!(
                "the calibration growth factor must be at least 2, got {}",
                self.growth_factor
            )));
        }
        if self.safety_factor == 0 {
            return Err(Error::InvalidConfig(
                "the calibration safety factor must be positive".to_string(),
            ));
        }
        if self.initial_iterations == 0 || self.initial_iterations > self.max_iterations {
            return Err(Error::InvalidConfig(format!(
                "calibration must start between 1 and {} iterations, got {}",
                self.max_iterations, self.initial_iterations
            )));
        }
        if self.floor == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "the calibration floor must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// The outcome of a successful calibration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Calibration {
    pub iterations: u64,
    /// Duration of the batch that first reached the floor
    pub batch_time: Duration,
}

/// Chooses per-batch iteration counts against a fixed floor
#[derive(Clone, Debug)]
pub struct Calibrator {
    floor: Duration,
    growth_factor: u64,
    initial_iterations: u64,
    max_iterations: u64,
}

impl Calibrator {
    /// Builds a calibrator from `config`, probing the clock if no floor is configured
    pub fn new(config: &CalibrationConfig) -> Result<Calibrator> {
        config.validate()?;
        let floor = match config.floor {
            Some(floor) => floor,
            None => clock_resolution().saturating_mul(config.safety_factor),
        };

        Ok(Calibrator {
            floor,
            growth_factor: config.growth_factor,
            initial_iterations: config.initial_iterations,
            max_iterations: config.max_iterations,
        })
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Finds the smallest count in the geometric sequence `initial, initial * growth, ...`
    /// (capped at the maximum) whose batch of calls to `f` takes at least the floor.
    pub fn calibrate<T, F>(&self, mut f: F) -> Result<Calibration>
    where
        F: FnMut() -> T,
    {
        let mut iterations = self.initial_iterations;
        loop {
            let batch_time = time_batch(iterations, &mut f);
            if batch_time >= self.floor {
                return Ok(Calibration {
                    iterations,
                    batch_time,
                });
            }
            if iterations >= self.max_iterations {
                return Err(Error::CalibrationUnreachable {
                    floor: self.floor,
                    max_iterations: self.max_iterations,
                    last_batch: batch_time,
                });
            }

            iterations = iterations
                .saturating_mul(self.growth_factor)
                .min(self.max_iterations);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_is_positive() {
        assert!(clock_resolution() > Duration::ZERO);
    }

    #[test]
    fn batch_runs_every_iteration() {
        let mut calls = 0u64;
        time_batch(37, || calls += 1);
        assert_eq!(calls, 37);
    }

    #[test]
    fn calibrated_batch_reaches_floor() {
        let calibrator = Calibrator::new(&CalibrationConfig {
            floor: Some(Duration::from_micros(50)),
            ..CalibrationConfig::default()
        })
        .unwrap();

        let a = b"a fairly ordinary string of bytes".to_vec();
        let b = b"a fairly ordinary string of byteX".to_vec();
        let cal = calibrator
            .calibrate(|| black_box(&a[..]) == black_box(&b[..]))
            .unwrap();

        assert!(cal.batch_time >= calibrator.floor());
        assert!(cal.iterations >= 1);
        assert!(cal.iterations.is_power_of_two());
    }

    #[test]
    fn slow_function_needs_one_iteration() {
        let calibrator = Calibrator::new(&CalibrationConfig {
            floor: Some(Duration::from_micros(10)),
            ..CalibrationConfig::default()
        })
        .unwrap();

        let cal = calibrator
            .calibrate(|| std::thread::sleep(Duration::from_micros(200)))
            .unwrap();
        assert_eq!(cal.iterations, 1);
    }

    #[test]
    fn unreachable_floor_is_reported() {
        let calibrator = Calibrator::new(&CalibrationConfig {
            floor: Some(Duration::from_secs(60)),
            max_iterations: 8,
            ..CalibrationConfig::default()
        })
        .unwrap();

        let mut calls = 0u64;
        match calibrator.calibrate(|| calls += 1) {
            Err(Error::CalibrationUnreachable {
                max_iterations: 8, ..
            }) => (),
            other => panic!("expected CalibrationUnreachable, got {:?}", other),
        }
        // 1 + 2 + 4 + 8
        assert_eq!(calls, 15);
    }

    #[test]
    fn growth_is_capped_at_the_maximum() {
        let calibrator = Calibrator::new(&CalibrationConfig {
            floor: Some(Duration::from_secs(60)),
            growth_factor: 10,
            max_iterations: 50,
            ..CalibrationConfig::default()
        })
        .unwrap();

        let mut calls = 0u64;
        assert!(calibrator.calibrate(|| calls += 1).is_err());
        // 1 + 10 + 50
        assert_eq!(calls, 61);
    }

    #[test]
    fn bad_configs_are_rejected() {
        let bad = [
            CalibrationConfig {
                growth_factor: 1,
                ..CalibrationConfig::default()
            },
            CalibrationConfig {
                safety_factor: 0,
                ..CalibrationConfig::default()
            },
            CalibrationConfig {
                initial_iterations: 0,
                ..CalibrationConfig::default()
            },
            CalibrationConfig {
                initial_iterations: 10,
                max_iterations: 5,
                ..CalibrationConfig::default()
            },
            CalibrationConfig {
                floor: Some(Duration::ZERO),
                ..CalibrationConfig::default()
            },
        ];
        for config in bad.iter() {
            assert!(Calibrator::new(config).is_err(), "{:?}", config);
        }
    }
}
