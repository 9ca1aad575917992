// Copyright 2012-2016 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::slice;

/// Column names of the CSV output, in order
pub const CSV_HEADER: &str = "implementation,password_length,ifd,time";

/// One measured per-call time
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRow {
    pub implementation: String,
    pub password_length: usize,
    pub ifd: usize,
    /// Seconds per call
    pub time: f64,
}

/// Raw sample rows in the order they were measured. No aggregation happens here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<SampleRow>,
}

impl Dataset {
    pub fn new() -> Dataset {
        Dataset::default()
    }

    pub fn push(&mut self, row: SampleRow) {
        self.rows.push(row);
    }

    /// Moves every row of `other` to the end of this dataset
    pub fn append(&mut self, other: &mut Dataset) {
        self.rows.append(&mut other.rows);
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    pub fn iter(&self) -> slice::Iter<SampleRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows belonging to the implementation called `name`
    pub fn rows_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SampleRow> + 'a {
        self.rows.iter().filter(move |row| row.implementation == name)
    }

    /// Writes every row as CSV, preceded by a header line if `header` is set
    pub fn write_csv<W: Write>(&self, mut out: W, header: bool) -> io::Result<()> {
        if header {
            writeln!(out, "{}", CSV_HEADER)?;
        }
        for row in &self.rows {
            writeln!(
                out,
                "{},{},{},{:e}",
                row.implementation, row.password_length, row.ifd, row.time
            )?;
        }
        out.flush()
    }

    /// Appends the rows to the CSV file at `path`, creating it if needed. The header is only
    /// written when the file is empty, so repeated runs accumulate into one table.
    pub fn append_csv_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let header = file.metadata()?.len() == 0;
        self.write_csv(BufWriter::new(file), header)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a SampleRow;
    type IntoIter = slice::Iter<'a, SampleRow>;

    fn into_iter(self) -> slice::Iter<'a, SampleRow> {
        self.rows.iter()
    }
}

impl FromIterator<SampleRow> for Dataset {
    fn from_iter<I: IntoIterator<Item = SampleRow>>(iter: I) -> Dataset {
        Dataset {
            rows: iter.into_iter().collect(),
        }
    }
}

impl Extend<SampleRow> for Dataset {
    fn extend<I: IntoIterator<Item = SampleRow>>(&mut self, iter: I) {
        self.rows.extend(iter);
    }
}
