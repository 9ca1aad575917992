// Copyright 2012 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Command-line parsing and the `ifdbench_main!` entry point.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{App, Arg, ArgMatches};

use crate::error::{Error, Result};
use crate::registry::{Implementation, Registry};
use crate::sampler::Schedule;
use crate::BenchOpts;

/// The clap application understood by `ifdbench_main!`
pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("ifd-bencher")
        .about("Times string comparisons against attempts with a chosen index of first difference")
        .arg(
            Arg::from_usage("-l, --length [N] 'Length of the generated password'")
                .default_value("16"),
        )
        .arg(
            Arg::from_usage("-n, --samples [N] 'Measured batches per implementation and ifd'")
                .default_value("1000"),
        )
        .arg(
            Arg::from_usage("-w, --warmups [N] 'Discarded batches before measuring an ifd'")
                .default_value("10"),
        )
        .arg_from_usage("--impls [NAMES] 'Comma-separated implementations to run (default: all)'")
        .arg_from_usage("--ifds [LIST] 'Comma-separated ifds to measure (default: 0 to length)'")
        .arg_from_usage("--seed [SEED] 'Seed for the password and attempts'")
        .arg_from_usage("--floor-ns [NS] 'Minimum batch time, instead of probing the clock'")
        .arg(
            Arg::from_usage("--safety-factor [K] 'Clock resolution multiple used as the floor'")
                .default_value("100"),
        )
        .arg(
            Arg::from_usage("--growth [K] 'Factor the calibrated batch size grows by'")
                .default_value("2"),
        )
        .arg(
            Arg::from_usage("--max-iterations [N] 'Largest batch size calibration may pick'")
                .default_value("16777216"),
        )
        .arg_from_usage("--recalibrate 'Calibrate again before every measured batch'")
        .arg_from_usage("--interleave 'Run the measured batches of all ifds in a shuffled order'")
        .arg_from_usage("--pause-us [US] 'Sleep between measured batches'")
        .arg_from_usage("--out [FILE] 'Appends raw benchmarking data in CSV format to FILE'")
        .arg_from_usage("--list 'Lists the implementations and exits'")
}

fn parse<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>> {
    match matches.value_of(name) {
        Some(v) => v.trim().parse().map(Some).map_err(|_| {
            Error::InvalidConfig(format!("`{}` is not a valid value for --{}", v, name))
        }),
        None => Ok(None),
    }
}

fn parse_list<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<Vec<T>>> {
    match matches.value_of(name) {
        Some(list) => list
            .split(',')
            .map(|v| {
                v.trim().parse().map_err(|_| {
                    Error::InvalidConfig(format!("`{}` is not a valid entry for --{}", v, name))
                })
            })
            .collect::<Result<Vec<T>>>()
            .map(Some),
        None => Ok(None),
    }
}

/// Turns parsed arguments into run options
pub fn opts_from_matches(matches: &ArgMatches) -> Result<BenchOpts> {
    let mut opts = BenchOpts::default();

    if let Some(n) = parse(matches, "length")? {
        opts.password_length = n;
    }
    if let Some(n) = parse(matches, "samples")? {
        opts.sample_count = n;
    }
    if let Some(n) = parse(matches, "warmups")? {
        opts.warmup_count = n;
    }
    if let Some(names) = matches.value_of("impls") {
        opts.implementations = names
            .split(',')
            .map(|name| name.trim().parse::<Implementation>())
            .collect::<Result<Vec<_>>>()?;
    }
    opts.ifds = parse_list(matches, "ifds")?;
    opts.seed = parse(matches, "seed")?;
    opts.calibration.floor = parse(matches, "floor-ns")?.map(Duration::from_nanos);
    if let Some(k) = parse(matches, "safety-factor")? {
        opts.calibration.safety_factor = k;
    }
    if let Some(k) = parse(matches, "growth")? {
        opts.calibration.growth_factor = k;
    }
    if let Some(n) = parse(matches, "max-iterations")? {
        opts.calibration.max_iterations = n;
    }
    opts.recalibrate = matches.is_present("recalibrate");
    if matches.is_present("interleave") {
        opts.schedule = Schedule::Interleaved;
    }
    opts.pause = parse(matches, "pause-us")?.map(Duration::from_micros);
    opts.file_out = matches.value_of("out").map(PathBuf::from);

    opts.validate()?;
    Ok(opts)
}

/// One line per builtin implementation, saying whether `registry` can run it
pub fn list_implementations(registry: &Registry) -> String {
    Implementation::ALL
        .iter()
        .map(|&imp| {
            let status = if registry.contains(imp) {
                "available"
            } else {
                "unavailable"
            };
            format!("{:<16}{}\n", imp.name(), status)
        })
        .collect()
}

/// Defines a `fn main()` that parses the command line and runs the selected comparison
/// implementations from the builtin [`Registry`](registry/struct.Registry.html), printing
/// progress to the console.
///
/// ```ignore
/// #[macro_use]
/// extern crate ifd_bencher;
///
/// ifdbench_main!();
/// ```
///
/// Run it with `--help` for the list of options. For example
///
/// ```text
/// ifd-bencher --length 32 --samples 500 --impls equals_operator,xor_bytes --out times.csv
/// ```
#[macro_export]
macro_rules! ifdbench_main {
    () => {
        use $crate::toplevel::{app, list_implementations, opts_from_matches};
        use $crate::{run_benches_console, stop_on_ctrlc, Registry};
        use std::process;

        fn main() {
            let matches = app().get_matches();
            let registry = Registry::builtin();

            if matches.is_present("list") {
                print!("{}", list_implementations(&registry));
                return;
            }

            let res = opts_from_matches(&matches).and_then(|opts| {
                let stop = stop_on_ctrlc()?;
                run_benches_console(opts, &registry, &stop)
            });
            if let Err(e) = res {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(args: &[&str]) -> Result<BenchOpts> {
        let mut argv = vec!["ifd-bencher"];
        argv.extend_from_slice(args);
        let matches = app().get_matches_from_safe(argv).unwrap();
        opts_from_matches(&matches)
    }

    #[test]
    fn defaults() {
        let opts = opts(&[]).unwrap();
        assert_eq!(opts.password_length, 16);
        assert_eq!(opts.sample_count, 1000);
        assert_eq!(opts.warmup_count, 10);
        assert_eq!(opts.implementations, Implementation::ALL.to_vec());
        assert_eq!(opts.schedule, Schedule::Sequential);
        assert_eq!(opts.calibration.floor, None);
        assert_eq!(opts.calibration.max_iterations, 1 << 24);
        assert!(opts.seed.is_none() && opts.file_out.is_none());
    }

    #[test]
    fn every_option() {
        let opts = opts(&[
            "-l",
            "8",
            "-n",
            "5",
            "-w",
            "2",
            "--impls",
            "equals_operator, hash_compare",
            "--ifds",
            "0,4,8",
            "--seed",
            "99",
            "--floor-ns",
            "5000",
            "--growth",
            "10",
            "--recalibrate",
            "--interleave",
            "--pause-us",
            "3",
            "--out",
            "times.csv",
        ])
        .unwrap();

        assert_eq!(opts.password_length, 8);
        assert_eq!(opts.sample_count, 5);
        assert_eq!(opts.warmup_count, 2);
        assert_eq!(
            opts.implementations,
            vec![Implementation::EqualsOperator, Implementation::HashCompare]
        );
        assert_eq!(opts.ifds, Some(vec![0, 4, 8]));
        assert_eq!(opts.seed, Some(99));
        assert_eq!(opts.calibration.floor, Some(Duration::from_micros(5)));
        assert_eq!(opts.calibration.growth_factor, 10);
        assert!(opts.recalibrate);
        assert_eq!(opts.schedule, Schedule::Interleaved);
        assert_eq!(opts.pause, Some(Duration::from_micros(3)));
        assert_eq!(opts.file_out, Some(PathBuf::from("times.csv")));
    }

    #[test]
    fn bad_values_are_reported() {
        match opts(&["--impls", "memcmp"]) {
            Err(Error::UnknownImplementation(ref name)) if name == "memcmp" => (),
            other => panic!("expected UnknownImplementation, got {:?}", other),
        }
        assert!(opts(&["--length", "many"]).is_err());
        assert!(opts(&["--growth", "1"]).is_err());
        match opts(&["--length", "4", "--ifds", "2,6"]) {
            Err(Error::InvalidIfd { ifd: 6, len: 4 }) => (),
            other => panic!("expected InvalidIfd, got {:?}", other),
        }
    }

    #[test]
    fn repeated_entries_are_reported() {
        match opts(&["--length", "8", "--ifds", "0,0,8"]) {
            Err(Error::InvalidConfig(_)) => (),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
        match opts(&["--impls", "andeq,andeq"]) {
            Err(Error::InvalidConfig(_)) => (),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn listing_marks_missing_implementations() {
        let registry = Registry::builtin().without(Implementation::AndEq);
        let listing = list_implementations(&registry);
        assert_eq!(listing.lines().count(), Implementation::ALL.len());
        assert!(listing.contains("andeq           unavailable"));
        assert!(listing.contains("xor_bytes       available"));
    }
}
