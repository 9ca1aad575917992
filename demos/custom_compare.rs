extern crate ifd_bencher;

use std::sync::atomic::AtomicBool;

use ifd_bencher::sampler::{implementation_rng, password_rng};
use ifd_bencher::{
    CalibrationConfig, Calibrator, Compare, IfdSummary, Password, Result, SampleOpts, SampleRow,
    Sampler, Schedule,
};

// Compares eight bytes at a time and returns at the first differing word. Leaks the ifd in
// steps of eight.
struct WordEq;

impl Compare for WordEq {
    fn name(&self) -> &str {
        "word_eq"
    }

    fn compare(&self, password: &[u8], attempt: &[u8]) -> Result<bool> {
        if password.len() != attempt.len() {
            return Ok(false);
        }
        for (a, b) in password.chunks(8).zip(attempt.chunks(8)) {
            if a != b {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn main() -> Result<()> {
    let seed = 0x6b6c816d;
    let password = Password::generate(64, &mut password_rng(seed));
    let calibrator = Calibrator::new(&CalibrationConfig::default())?;
    let opts = SampleOpts {
        sample_count: 200,
        ..SampleOpts::default()
    };

    // Custom subjects borrow the random stream of a builtin; any fixed stream will do
    let mut rng = implementation_rng(seed, ifd_bencher::Implementation::EqualsOperator);
    let sampler = Sampler::new(&WordEq, &password, &calibrator, &opts);
    let ifds: Vec<usize> = (0..=64).step_by(4).collect();
    let never = AtomicBool::new(false);
    let trials = sampler
        .sample_all(&ifds, Schedule::Interleaved, &never, &mut rng)?
        .unwrap_or_default();

    let rows: Vec<SampleRow> = trials
        .iter()
        .map(|t| SampleRow {
            implementation: WordEq.name().to_string(),
            password_length: password.len(),
            ifd: t.ifd,
            time: t.per_call(),
        })
        .collect();
    let summ = IfdSummary::from_rows(&rows);
    for &(ifd, median) in &summ.medians {
        println!("ifd {:>2}: {:.3}ns", ifd, median * 1e9);
    }

    Ok(())
}
