// Copyright 2012-2016 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Generation of the secret password and of attempts with a chosen index of first difference.

use rand::Rng;

use crate::error::{Error, Result};

/// Characters that passwords and attempts are drawn from
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The secret every attempt is compared against. It is ASCII-only, so byte and character
/// positions coincide, and it never changes once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Wraps a user-chosen password. Fails if it contains non-ASCII characters.
    pub fn new<S: Into<String>>(s: S) -> Result<Password> {
        let s = s.into();
        if !s.is_ascii() {
            return Err(Error::InvalidConfig(
                "passwords must consist of ASCII characters".to_string(),
            ));
        }

        Ok(Password(s))
    }

    /// Draws a random password of `len` characters from `ALPHABET`
    pub fn generate<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Password {
        let s = (0..len).map(|_| random_char(rng)).collect();
        Password(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn random_char<R: Rng + ?Sized>(rng: &mut R) -> char {
    ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
}

/// Returns an attempt that agrees with `password` on exactly the first `ifd` characters.
///
/// When `ifd < password.len()` the character at `ifd` is drawn from `ALPHABET` minus the
/// password's character at that position, and every later character is drawn from the whole
/// alphabet. Later characters may coincide with the password again; only the first difference
/// is controlled. `ifd == password.len()` yields a copy of the password.
pub fn generate_attempt<R: Rng + ?Sized>(
    password: &Password,
    ifd: usize,
    rng: &mut R,
) -> Result<String> {
    let len = password.len();
    if ifd > len {
        return Err(Error::InvalidIfd { ifd, len });
    }

    let mut attempt = String::with_capacity(len);
    attempt.push_str(&password.as_str()[..ifd]);
    if ifd == len {
        return Ok(attempt);
    }

    // Pick among the alphabet characters that differ from the password at `ifd`. If the
    // password character is not in the alphabet at all, any alphabet character will do.
    let forbidden = password.as_bytes()[ifd];
    let choices: Vec<u8> = ALPHABET.iter().cloned().filter(|&c| c != forbidden).collect();
    attempt.push(choices[rng.gen_range(0..choices.len())] as char);

    for _ in (ifd + 1)..len {
        attempt.push(random_char(rng));
    }

    Ok(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    #[test]
    fn full_match_is_a_copy() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        let password = Password::generate(12, &mut rng);
        let attempt = generate_attempt(&password, 12, &mut rng).unwrap();
        assert_eq!(attempt, password.as_str());
    }

    #[test]
    fn ifd_past_the_end_is_rejected() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        let password = Password::generate(8, &mut rng);
        match generate_attempt(&password, 9, &mut rng) {
            Err(Error::InvalidIfd { ifd: 9, len: 8 }) => (),
            other => panic!("expected InvalidIfd, got {:?}", other),
        }
    }

    #[test]
    fn empty_password_only_matches_itself() {
        let mut rng = ChaChaRng::seed_from_u64(1);
        let password = Password::new("").unwrap();
        assert_eq!(generate_attempt(&password, 0, &mut rng).unwrap(), "");
        assert!(generate_attempt(&password, 1, &mut rng).is_err());
    }

    #[test]
    fn first_difference_avoids_characters_outside_the_alphabet() {
        let mut rng = ChaChaRng::seed_from_u64(3);
        let password = Password::new("a-b").unwrap();
        let attempt = generate_attempt(&password, 1, &mut rng).unwrap();
        assert!(attempt.starts_with('a'));
        assert_ne!(attempt.as_bytes()[1], b'-');
    }

    #[test]
    fn non_ascii_passwords_are_rejected() {
        assert!(Password::new("pässword").is_err());
    }

    #[test]
    fn generated_passwords_use_the_alphabet() {
        let mut rng = ChaChaRng::seed_from_u64(11);
        let password = Password::generate(64, &mut rng);
        assert_eq!(password.len(), 64);
        assert!(password.as_bytes().iter().all(|c| ALPHABET.contains(c)));
    }

    #[test]
    fn same_seed_same_attempts() {
        let draw = |seed| {
            let mut rng = ChaChaRng::seed_from_u64(seed);
            let password = Password::generate(16, &mut rng);
            (0..=16)
                .map(|ifd| generate_attempt(&password, ifd, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
        assert_ne!(draw(42), draw(43));
    }

    proptest! {
        #[test]
        fn attempt_diverges_exactly_at_ifd(
            len in 0usize..48,
            pick in 0usize..49,
            seed in any::<u64>(),
        ) {
            let ifd = pick % (len + 1);
            let mut rng = ChaChaRng::seed_from_u64(seed);
            let password = Password::generate(len, &mut rng);
            let attempt = generate_attempt(&password, ifd, &mut rng).unwrap();

            prop_assert_eq!(attempt.len(), len);
            prop_assert_eq!(&attempt.as_bytes()[..ifd], &password.as_bytes()[..ifd]);
            if ifd < len {
                prop_assert_ne!(attempt.as_bytes()[ifd], password.as_bytes()[ifd]);
            }
        }
    }
}
