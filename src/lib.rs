// Copyright 2012-2016 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This crate measures whether a string comparison leaks how many leading characters of two
//! strings agree. Instead of splitting inputs into two classes, it sweeps the *index of first
//! difference* (IFD) between a secret password and an attempt.
//!
//! For every selected comparison implementation and every IFD in the sweep, the harness
//!
//!  * generates a fresh attempt that agrees with the password on exactly the first IFD
//!    characters,
//!  * calibrates how many back-to-back calls make a batch long enough to time reliably,
//!  * runs a few warmup batches whose timings are thrown away,
//!  * runs `sample_count` measured batches, each on its own fresh attempt, and records the
//!    batch time divided by the number of calls.
//!
//! The raw per-call times end up in a [`Dataset`], which can be written out as CSV with columns
//! `implementation,password_length,ifd,time` and plotted as one box plot per implementation with
//! the IFD on the x-axis. A comparison whose time grows with the IFD is leaking it. Flat boxes do
//! not prove that a function is constant-time; that takes a statistical test on the data.
//!
//! The console output looks like
//!
//! ```text
//! bench equals_operator ... : n == 17000, median at ifd 0 = 3.721ns, median at ifd 16 = 5.114ns, spread = +37.44%
//! ```
//!
//! See `src/main.rs` and the [`ifdbench_main`] macro for the command-line entry point.

extern crate clap;
extern crate ctrlc;
extern crate rand;
extern crate rand_chacha;

pub mod attempt;
pub mod calibrate;
pub mod dataset;
pub mod error;
pub mod registry;
pub mod sampler;
mod stats;
pub mod toplevel;

pub use attempt::{generate_attempt, Password};
pub use calibrate::{CalibrationConfig, Calibrator};
pub use dataset::{Dataset, SampleRow};
pub use error::{Error, Result};
pub use registry::{Compare, Implementation, Registry};
pub use sampler::{BenchRng, SampleOpts, Sampler, Schedule};
pub use stats::IfdSummary;

use std::io;
use std::io::prelude::*;
use std::iter::repeat;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use sampler::{implementation_rng, password_rng};

/// Just a static str representing the name of a comparison implementation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchName(pub &'static str);

impl BenchName {
    fn padded(&self, column_count: usize) -> String {
        let mut name = self.0.to_string();
        let fill = column_count.saturating_sub(name.len());
        let pad = repeat(" ").take(fill).collect::<String>();
        name.push_str(&pad);

        name
    }
}

/// Progress of a run, reported to the callback of [`run_benches`]
#[derive(Debug)]
pub enum BenchEvent {
    /// The run is starting
    Begin {
        names: Vec<BenchName>,
        password_length: usize,
        ifd_count: usize,
        seed: u64,
        floor: Duration,
    },
    /// Measurement of an implementation is starting
    Wait(BenchName),
    /// An implementation finished. Its rows are in the dataset.
    Result(BenchName, IfdSummary),
    /// An implementation was not run because it is unavailable
    Skipped(BenchName, Error),
    /// Calibration failed for an implementation. None of its rows are in the dataset.
    Aborted(BenchName, Error),
    /// The stop flag was raised. The current implementation's rows were dropped.
    Interrupted,
}

/// Benchmarking options.
///
/// `ifds` defaults to every index from 0 to `password_length` inclusive. When `seed` is not set,
/// a random one is drawn and reported in [`BenchEvent::Begin`] so the run can be repeated.
#[derive(Clone, Debug)]
pub struct BenchOpts {
    pub password_length: usize,
    pub sample_count: usize,
    pub warmup_count: usize,
    pub implementations: Vec<Implementation>,
    pub ifds: Option<Vec<usize>>,
    pub seed: Option<u64>,
    pub calibration: CalibrationConfig,
    pub recalibrate: bool,
    pub schedule: Schedule,
    pub pause: Option<Duration>,
    pub file_out: Option<PathBuf>,
}

impl Default for BenchOpts {
    fn default() -> BenchOpts {
        let sample = SampleOpts::default();
        BenchOpts {
            password_length: 16,
            sample_count: sample.sample_count,
            warmup_count: sample.warmup_count,
            implementations: Implementation::ALL.to_vec(),
            ifds: None,
            seed: None,
            calibration: CalibrationConfig::default(),
            recalibrate: sample.recalibrate,
            schedule: Schedule::default(),
            pause: sample.pause,
            file_out: None,
        }
    }
}

impl BenchOpts {
    pub fn validate(&self) -> Result<()> {
        if self.sample_count == 0 {
            return Err(Error::InvalidConfig(
                "the sample count must be positive".to_string(),
            ));
        }
        if self.implementations.is_empty() {
            return Err(Error::InvalidConfig(
                "no implementations were selected".to_string(),
            ));
        }
        if let Some(imp) = first_repeat(&self.implementations) {
            return Err(Error::InvalidConfig(format!(
                "implementation {} is selected more than once",
                imp
            )));
        }
        if let Some(ref ifds) = self.ifds {
            if ifds.is_empty() {
                return Err(Error::InvalidConfig("the ifd sweep is empty".to_string()));
            }
            if let Some(&ifd) = ifds.iter().find(|&&ifd| ifd > self.password_length) {
                return Err(Error::InvalidIfd {
                    ifd,
                    len: self.password_length,
                });
            }
            if let Some(ifd) = first_repeat(ifds) {
                return Err(Error::InvalidConfig(format!(
                    "ifd {} appears more than once in the sweep",
                    ifd
                )));
            }
        }
        self.calibration.validate()
    }

    /// The ifds to measure, in order
    pub fn ifd_sweep(&self) -> Vec<usize> {
        match self.ifds {
            Some(ref ifds) => ifds.clone(),
            None => (0..=self.password_length).collect(),
        }
    }

    pub fn sample_opts(&self) -> SampleOpts {
        SampleOpts {
            warmup_count: self.warmup_count,
            sample_count: self.sample_count,
            recalibrate: self.recalibrate,
            pause: self.pause,
        }
    }
}

// Each (implementation, ifd) pair must be sampled exactly once
fn first_repeat<T: PartialEq>(items: &[T]) -> Option<&T> {
    items
        .iter()
        .enumerate()
        .find(|&(i, item)| items[..i].contains(item))
        .map(|(_, item)| item)
}

#[derive(Default)]
struct ConsoleBenchState {
    max_name_len: usize, // Number of columns to fill when aligning names
}

impl ConsoleBenchState {
    fn write_plain(&mut self, s: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(s.as_bytes())?;
        stdout.flush()
    }

    fn write_warning(&mut self, s: &str) -> io::Result<()> {
        let mut stderr = io::stderr();
        writeln!(stderr, "warning: {}", s)
    }

    fn write_run_start(
        &mut self,
        len: usize,
        password_length: usize,
        ifd_count: usize,
        seed: u64,
        floor: Duration,
    ) -> io::Result<()> {
        let noun = if len != 1 { "benches" } else { "bench" };
        self.write_plain(&format!(
            "\nrunning {} {} (password length {}, {} ifds, seed {:#018x}, batch floor {:?})\n",
            len, noun, password_length, ifd_count, seed, floor
        ))
    }

    fn write_bench_start(&mut self, name: &BenchName) -> io::Result<()> {
        let name = name.padded(self.max_name_len);
        self.write_plain(&format!("bench {} ... ", name))
    }

    fn write_result(&mut self, summ: &IfdSummary) -> io::Result<()> {
        self.write_plain(&format!(": {}\n", summ.fmt()))
    }

    fn write_skipped(&mut self, err: &Error) -> io::Result<()> {
        self.write_plain("skipped\n")?;
        self.write_warning(&format!("{}; skipping it", err))
    }

    fn write_aborted(&mut self, err: &Error) -> io::Result<()> {
        self.write_plain("aborted\n")?;
        self.write_warning(&format!("{}; its samples were discarded", err))
    }

    fn write_interrupted(&mut self) -> io::Result<()> {
        self.write_plain("interrupted\n")
    }

    fn write_run_finish(&mut self, dataset: &Dataset, out: Option<&PathBuf>) -> io::Result<()> {
        match out {
            Some(path) => self.write_plain(&format!(
                "\nifd benches complete, appended {} rows to {}\n\n",
                dataset.len(),
                path.display()
            )),
            None => self.write_plain("\nifd benches complete\n\n"),
        }
    }
}

/// Runs the given benches under the given options, prints the progress to the console and
/// appends the dataset to `opts.file_out` if set. Raising `stop` (see [`stop_on_ctrlc`]) ends the
/// run after the current trial; the rows of implementations that completed are still written out.
pub fn run_benches_console(
    opts: BenchOpts,
    registry: &Registry,
    stop: &AtomicBool,
) -> Result<Dataset> {
    fn callback(event: BenchEvent, st: &mut ConsoleBenchState) -> io::Result<()> {
        match event {
            BenchEvent::Begin {
                names,
                password_length,
                ifd_count,
                seed,
                floor,
            } => st.write_run_start(names.len(), password_length, ifd_count, seed, floor),
            BenchEvent::Wait(ref b) => st.write_bench_start(b),
            BenchEvent::Result(_, ref summ) => st.write_result(summ),
            BenchEvent::Skipped(_, ref err) => st.write_skipped(err),
            BenchEvent::Aborted(_, ref err) => st.write_aborted(err),
            BenchEvent::Interrupted => st.write_interrupted(),
        }
    }

    let mut st = ConsoleBenchState::default();
    st.max_name_len = opts
        .implementations
        .iter()
        .map(|imp| imp.name().len())
        .max()
        .unwrap_or(0);

    let dataset = run_benches(&opts, registry, stop, |ev| callback(ev, &mut st))?;
    if let Some(ref path) = opts.file_out {
        dataset.append_csv_file(path)?;
    }
    st.write_run_finish(&dataset, opts.file_out.as_ref())?;

    Ok(dataset)
}

/// Installs a Ctrl-C handler that raises the returned flag. A process can only install one
/// handler, so this fails with [`Error::Signal`] when called a second time.
pub fn stop_on_ctrlc() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    Ok(stop)
}

/// Measures every implementation in `opts` in order and returns the collected rows.
///
/// A single password is drawn for the whole run and shared by all implementations. An
/// implementation missing from `registry` is skipped, and one whose calibration cannot reach the
/// floor is aborted; both are reported through `callback` and the run goes on. Contract
/// violations (an out-of-range ifd, mismatched lengths, a wrong comparison result) end the run
/// with an error.
pub fn run_benches<F>(
    opts: &BenchOpts,
    registry: &Registry,
    stop: &AtomicBool,
    mut callback: F,
) -> Result<Dataset>
where
    F: FnMut(BenchEvent) -> io::Result<()>,
{
    opts.validate()?;

    let seed = opts.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let password = Password::generate(opts.password_length, &mut password_rng(seed));
    let calibrator = Calibrator::new(&opts.calibration)?;
    let sample_opts = opts.sample_opts();
    let ifds = opts.ifd_sweep();

    callback(BenchEvent::Begin {
        names: opts
            .implementations
            .iter()
            .map(|&imp| BenchName(imp.name()))
            .collect(),
        password_length: password.len(),
        ifd_count: ifds.len(),
        seed,
        floor: calibrator.floor(),
    })?;

    let mut dataset = Dataset::new();
    for &imp in &opts.implementations {
        let name = BenchName(imp.name());
        if stop.load(Ordering::Relaxed) {
            callback(BenchEvent::Interrupted)?;
            break;
        }
        callback(BenchEvent::Wait(name.clone()))?;

        let imp = match registry.get(imp.name()) {
            Ok(imp) => imp,
            Err(e @ Error::ImplementationUnavailable(_)) => {
                callback(BenchEvent::Skipped(name, e))?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let sampler = Sampler::new(&imp, &password, &calibrator, &sample_opts);
        let mut rng = implementation_rng(seed, imp);
        let trials = match sampler.sample_all(&ifds, opts.schedule, stop, &mut rng) {
            Ok(Some(trials)) => trials,
            Ok(None) => {
                callback(BenchEvent::Interrupted)?;
                break;
            }
            Err(e @ Error::CalibrationUnreachable { .. }) => {
                callback(BenchEvent::Aborted(name, e))?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let mut rows: Dataset = trials
            .iter()
            .map(|trial| SampleRow {
                implementation: imp.name().to_string(),
                password_length: password.len(),
                ifd: trial.ifd,
                time: trial.per_call(),
            })
            .collect();
        let summ = IfdSummary::from_rows(&rows);
        dataset.append(&mut rows);
        callback(BenchEvent::Result(name, summ))?;
    }

    Ok(dataset)
}
