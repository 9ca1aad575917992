// Copyright 2012-2016 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Warmups and measured batches for one implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::attempt::{generate_attempt, Password};
use crate::calibrate::{black_box, time_batch, Calibrator};
use crate::error::{Error, Result};
use crate::registry::{Compare, Implementation};

/// The RNG that passwords, attempts and schedules are drawn from
pub type BenchRng = ChaChaRng;

/// The RNG the run's password is drawn from
pub fn password_rng(seed: u64) -> BenchRng {
    BenchRng::seed_from_u64(seed)
}

/// The RNG `imp` draws its attempts and schedule from. Every implementation gets its own stream
/// of the run seed, so leaving one out of a run does not change what the others see.
pub fn implementation_rng(seed: u64, imp: Implementation) -> BenchRng {
    let mut rng = BenchRng::seed_from_u64(seed);
    rng.set_stream(imp.id() + 1);
    rng
}

/// Order in which the trials of one implementation are run
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// All trials of one ifd, then the next ifd
    Sequential,
    /// Every ifd is warmed up first, then all measured trials run in a shuffled order
    Interleaved,
}

impl Default for Schedule {
    fn default() -> Schedule {
        Schedule::Sequential
    }
}

/// How many batches to run per (implementation, ifd) pair and how
#[derive(Clone, Debug, PartialEq)]
pub struct SampleOpts {
    pub warmup_count: usize,
    pub sample_count: usize,
    /// Calibrate again before every measured batch instead of reusing the warmup count
    pub recalibrate: bool,
    /// Sleep between measured batches
    pub pause: Option<Duration>,
}

impl Default for SampleOpts {
    fn default() -> SampleOpts {
        SampleOpts {
            warmup_count: 10,
            sample_count: 1000,
            recalibrate: false,
            pause: None,
        }
    }
}

/// One measured batch
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Trial {
    pub ifd: usize,
    pub iterations: u64,
    pub elapsed: Duration,
}

impl Trial {
    /// Estimated seconds per call
    pub fn per_call(&self) -> f64 {
        self.elapsed.as_secs_f64() / self.iterations as f64
    }
}

/// Drives one comparison implementation against a fixed password
pub struct Sampler<'a, C: Compare + ?Sized> {
    subject: &'a C,
    password: &'a Password,
    calibrator: &'a Calibrator,
    opts: &'a SampleOpts,
}

impl<'a, C: Compare + ?Sized> Sampler<'a, C> {
    pub fn new(
        subject: &'a C,
        password: &'a Password,
        calibrator: &'a Calibrator,
        opts: &'a SampleOpts,
    ) -> Sampler<'a, C> {
        Sampler {
            subject,
            password,
            calibrator,
            opts,
        }
    }

    /// Generates an attempt and checks, outside of any timed batch, that the subject tells it
    /// apart from the password correctly.
    fn fresh_attempt(&self, ifd: usize, rng: &mut BenchRng) -> Result<String> {
        let attempt = generate_attempt(self.password, ifd, rng)?;
        let equal = self
            .subject
            .compare(self.password.as_bytes(), attempt.as_bytes())?;
        if equal != (ifd == self.password.len()) {
            return Err(Error::IncorrectComparison {
                implementation: self.subject.name().to_string(),
                ifd,
            });
        }

        Ok(attempt)
    }

    fn time(&self, iterations: u64, attempt: &str) -> Duration {
        let password = self.password.as_bytes();
        let attempt = attempt.as_bytes();
        time_batch(iterations, || {
            self.subject.compare(black_box(password), black_box(attempt))
        })
    }

    fn calibrate(&self, attempt: &str) -> Result<u64> {
        let password = self.password.as_bytes();
        let attempt = attempt.as_bytes();
        let cal = self.calibrator.calibrate(|| {
            self.subject.compare(black_box(password), black_box(attempt))
        })?;

        Ok(cal.iterations)
    }

    /// Calibrates on a fresh attempt and runs the warmup batches, each on its own fresh attempt.
    /// Returns the calibrated iteration count.
    pub fn warm_up(&self, ifd: usize, rng: &mut BenchRng) -> Result<u64> {
        let attempt = self.fresh_attempt(ifd, rng)?;
        let iterations = self.calibrate(&attempt)?;
        for _ in 0..self.opts.warmup_count {
            let attempt = self.fresh_attempt(ifd, rng)?;
            self.time(iterations, &attempt);
        }

        Ok(iterations)
    }

    /// Runs one measured batch on a fresh attempt
    pub fn measure(&self, ifd: usize, iterations: u64, rng: &mut BenchRng) -> Result<Trial> {
        let attempt = self.fresh_attempt(ifd, rng)?;
        let iterations = if self.opts.recalibrate {
            self.calibrate(&attempt)?
        } else {
            iterations
        };
        let elapsed = self.time(iterations, &attempt);
        if let Some(pause) = self.opts.pause {
            thread::sleep(pause);
        }

        Ok(Trial {
            ifd,
            iterations,
            elapsed,
        })
    }

    /// Warms up and then collects `sample_count` per-call times for one ifd
    pub fn sample(&self, ifd: usize, rng: &mut BenchRng) -> Result<Vec<f64>> {
        let iterations = self.warm_up(ifd, rng)?;
        (0..self.opts.sample_count)
            .map(|_| self.measure(ifd, iterations, rng).map(|t| t.per_call()))
            .collect()
    }

    /// Runs every trial for every ifd in `ifds` under `schedule`. Returns `None` if `stop` was
    /// raised before all trials finished.
    pub fn sample_all(
        &self,
        ifds: &[usize],
        schedule: Schedule,
        stop: &AtomicBool,
        rng: &mut BenchRng,
    ) -> Result<Option<Vec<Trial>>> {
        let mut trials = Vec::with_capacity(ifds.len() * self.opts.sample_count);
        match schedule {
            Schedule::Sequential => {
                for &ifd in ifds {
                    if stop.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    let iterations = self.warm_up(ifd, rng)?;
                    for _ in 0..self.opts.sample_count {
                        if stop.load(Ordering::Relaxed) {
                            return Ok(None);
                        }
                        trials.push(self.measure(ifd, iterations, rng)?);
                    }
                }
            }
            Schedule::Interleaved => {
                let mut iterations = Vec::with_capacity(ifds.len());
                for &ifd in ifds {
                    if stop.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    iterations.push(self.warm_up(ifd, rng)?);
                }

                let mut order: Vec<usize> = (0..ifds.len())
                    .flat_map(|i| ::std::iter::repeat(i).take(self.opts.sample_count))
                    .collect();
                order.shuffle(rng);

                for i in order {
                    if stop.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    trials.push(self.measure(ifds[i], iterations[i], rng)?);
                }
            }
        }

        Ok(Some(trials))
    }
}
