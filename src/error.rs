// Copyright 2012-2016 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong while generating inputs, calibrating or sampling.
///
/// `InvalidIfd`, `LengthMismatch` and `IncorrectComparison` are contract violations and abort
/// the whole run. `CalibrationUnreachable` only aborts the implementation being measured, and
/// `ImplementationUnavailable` makes the run skip that implementation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("index of first difference {ifd} is outside of 0..={len}")]
    InvalidIfd { ifd: usize, len: usize },

    #[error("password has length {password} but the attempt has length {attempt}")]
    LengthMismatch { password: usize, attempt: usize },

    #[error(
        "a batch of {max_iterations} calls took {last_batch:?}, which never reached the \
         calibration floor of {floor:?}"
    )]
    CalibrationUnreachable {
        floor: Duration,
        max_iterations: u64,
        last_batch: Duration,
    },

    #[error("implementation `{0}` is not available in this build")]
    ImplementationUnavailable(String),

    #[error("unknown implementation `{0}`")]
    UnknownImplementation(String),

    #[error("`{implementation}` gave the wrong answer for an attempt differing at index {ifd}")]
    IncorrectComparison { implementation: String, ifd: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not install the Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;
