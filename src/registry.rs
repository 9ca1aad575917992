// Copyright 2012-2016 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The comparison functions whose timing is under test.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// The single capability the sampler needs from a subject: a name, and an equality check of an
/// attempt against the password.
pub trait Compare {
    fn name(&self) -> &str;

    /// Returns whether `password` and `attempt` are equal
    fn compare(&self, password: &[u8], attempt: &[u8]) -> Result<bool>;
}

/// The builtin comparison functions
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Implementation {
    /// Slice equality. Returns at the first differing byte.
    EqualsOperator,
    /// `subtle`'s constant-time equality. Only available with the `compare-digest` feature.
    CompareDigest,
    /// ORs together the XOR of every byte pair
    XorBytes,
    /// ANDs together the equality of every byte pair
    AndEq,
    /// Compares SHA-256 digests of both inputs
    HashCompare,
}

impl Implementation {
    pub const ALL: [Implementation; 5] = [
        Implementation::EqualsOperator,
        Implementation::CompareDigest,
        Implementation::XorBytes,
        Implementation::AndEq,
        Implementation::HashCompare,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Implementation::EqualsOperator => "equals_operator",
            Implementation::CompareDigest => "compare_digest",
            Implementation::XorBytes => "xor_bytes",
            Implementation::AndEq => "andeq",
            Implementation::HashCompare => "hash_compare",
        }
    }

    pub fn from_name(name: &str) -> Option<Implementation> {
        Implementation::ALL.iter().cloned().find(|imp| imp.name() == name)
    }

    /// A stable small number identifying this implementation. Used to pick its random stream.
    pub fn id(self) -> u64 {
        match self {
            Implementation::EqualsOperator => 0,
            Implementation::CompareDigest => 1,
            Implementation::XorBytes => 2,
            Implementation::AndEq => 3,
            Implementation::HashCompare => 4,
        }
    }

    /// Whether this build can run the implementation at all
    pub fn is_available(self) -> bool {
        match self {
            Implementation::CompareDigest => cfg!(feature = "compare-digest"),
            _ => true,
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Implementation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Implementation> {
        Implementation::from_name(s).ok_or_else(|| Error::UnknownImplementation(s.to_string()))
    }
}

impl Compare for Implementation {
    fn name(&self) -> &str {
        Implementation::name(*self)
    }

    fn compare(&self, password: &[u8], attempt: &[u8]) -> Result<bool> {
        match *self {
            Implementation::EqualsOperator => Ok(equals_operator(password, attempt)),
            Implementation::CompareDigest => compare_digest(password, attempt),
            Implementation::XorBytes => xor_bytes(password, attempt),
            Implementation::AndEq => Ok(andeq(password, attempt)),
            Implementation::HashCompare => Ok(hash_compare(password, attempt)),
        }
    }
}

#[inline(never)]
fn equals_operator(a: &[u8], b: &[u8]) -> bool {
    a == b
}

#[cfg(feature = "compare-digest")]
#[inline(never)]
fn compare_digest(a: &[u8], b: &[u8]) -> Result<bool> {
    use subtle::ConstantTimeEq;

    Ok(a.ct_eq(b).into())
}

#[cfg(not(feature = "compare-digest"))]
fn compare_digest(_a: &[u8], _b: &[u8]) -> Result<bool> {
    Err(Error::ImplementationUnavailable(
        Implementation::CompareDigest.name().to_string(),
    ))
}

#[inline(never)]
fn xor_bytes(a: &[u8], b: &[u8]) -> Result<bool> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch {
            password: a.len(),
            attempt: b.len(),
        });
    }

    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }

    Ok(acc == 0)
}

// `&=` on bools never short-circuits, so every position is compared no matter where the first
// difference is
#[inline(never)]
fn andeq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = true;
    for i in 0..a.len() {
        result &= a[i] == b[i];
    }

    result
}

#[inline(never)]
fn hash_compare(a: &[u8], b: &[u8]) -> bool {
    Sha256::digest(a) == Sha256::digest(b)
}

/// An immutable name -> implementation mapping, built once and handed to the sampler by
/// reference. Names that are not in the registry are treated as unavailable.
#[derive(Clone, Debug)]
pub struct Registry {
    entries: BTreeMap<&'static str, Implementation>,
}

impl Registry {
    /// Every builtin implementation this build can run
    pub fn builtin() -> Registry {
        Registry::from_implementations(Implementation::ALL.iter().cloned())
    }

    /// A registry holding only the given implementations. Implementations this build cannot
    /// run are left out.
    pub fn from_implementations<I>(imps: I) -> Registry
    where
        I: IntoIterator<Item = Implementation>,
    {
        let entries = imps
            .into_iter()
            .filter(|imp| imp.is_available())
            .map(|imp| (imp.name(), imp))
            .collect();

        Registry { entries }
    }

    /// Returns this registry minus `imp`
    pub fn without(mut self, imp: Implementation) -> Registry {
        self.entries.remove(imp.name());
        self
    }

    /// Looks up a registered implementation by name
    pub fn get(&self, name: &str) -> Result<Implementation> {
        match self.entries.get(name) {
            Some(&imp) => Ok(imp),
            None if Implementation::from_name(name).is_some() => {
                Err(Error::ImplementationUnavailable(name.to_string()))
            }
            None => Err(Error::UnknownImplementation(name.to_string())),
        }
    }

    pub fn contains(&self, imp: Implementation) -> bool {
        self.entries.contains_key(imp.name())
    }

    /// Registered implementations, ordered by name
    pub fn iter(&self) -> impl Iterator<Item = Implementation> + '_ {
        self.entries.values().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::{generate_attempt, Password};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn available() -> Vec<Implementation> {
        Implementation::ALL.iter().cloned().filter(|imp| imp.is_available()).collect()
    }

    #[test]
    fn names_round_trip() {
        for &imp in Implementation::ALL.iter() {
            assert_eq!(imp.name().parse::<Implementation>().unwrap(), imp);
        }
        assert!("memcmp".parse::<Implementation>().is_err());
    }

    #[test]
    fn ids_are_distinct() {
        let mut ids: Vec<u64> = Implementation::ALL.iter().map(|imp| imp.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), Implementation::ALL.len());
    }

    #[test]
    fn xor_bytes_rejects_length_mismatch() {
        match Implementation::XorBytes.compare(b"abcdefgh", b"abcdefg") {
            Err(Error::LengthMismatch {
                password: 8,
                attempt: 7,
            }) => (),
            other => panic!("expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn andeq_checks_every_position() {
        assert!(andeq(b"abcd", b"abcd"));
        assert!(!andeq(b"abcd", b"xbcd"));
        assert!(!andeq(b"abcd", b"abcx"));
        assert!(!andeq(b"abcd", b"abc"));
    }

    #[test]
    fn unequal_lengths_are_never_equal() {
        for imp in available() {
            if imp == Implementation::XorBytes {
                continue;
            }
            assert!(!imp.compare(b"abc", b"abcd").unwrap(), "{}", imp);
        }
    }

    #[test]
    fn registry_lookup() {
        let registry = Registry::builtin().without(Implementation::HashCompare);
        assert_eq!(registry.get("andeq").unwrap(), Implementation::AndEq);
        match registry.get("hash_compare") {
            Err(Error::ImplementationUnavailable(ref name)) if name == "hash_compare" => (),
            other => panic!("expected ImplementationUnavailable, got {:?}", other),
        }
        match registry.get("strcmp") {
            Err(Error::UnknownImplementation(_)) => (),
            other => panic!("expected UnknownImplementation, got {:?}", other),
        }
        assert!(!registry.contains(Implementation::HashCompare));
    }

    #[cfg(feature = "compare-digest")]
    #[test]
    fn builtin_registry_has_everything() {
        assert_eq!(Registry::builtin().len(), Implementation::ALL.len());
    }

    #[cfg(not(feature = "compare-digest"))]
    #[test]
    fn compare_digest_is_missing_without_feature() {
        assert!(!Registry::builtin().contains(Implementation::CompareDigest));
        assert!(Implementation::CompareDigest.compare(b"a", b"a").is_err());
    }

    proptest! {
        #[test]
        fn results_follow_the_first_difference(
            len in 1usize..40,
            pick in 0usize..41,
            seed in any::<u64>(),
        ) {
            let ifd = pick % (len + 1);
            let mut rng = ChaChaRng::seed_from_u64(seed);
            let password = Password::generate(len, &mut rng);
            let attempt = generate_attempt(&password, ifd, &mut rng).unwrap();

            for imp in available() {
                let equal = imp.compare(password.as_bytes(), attempt.as_bytes()).unwrap();
                prop_assert_eq!(equal, ifd == len, "{} at ifd {}", imp, ifd);
            }
        }
    }
}
