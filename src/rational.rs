// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Exact frequency ratios between notes.

use std::fmt;

/// Underlying integral type for the rational numbers.
type Int = i64;

/// A rational number, always fully normalized.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Rational {
    /// The numerator of the fraction.
    /// If the fraction is negative, the numerator will be made negative.
    num: Int,
    /// The denominator of the fraction, always positive.
    denom: Int,
}

impl Rational {
    /// Create a new rational from a potentially unnormalized fraction.
    ///
    /// # Panic
    ///
    /// Panics if the denominator is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::rational::*;
    ///
    /// assert_eq!(Rational::new(10, 5), Rational::new(2, 1));
    /// assert_eq!(Rational::new(-10, -5), Rational::new(6, 3));
    /// assert_eq!(Rational::new(-6, 8), Rational::new(3, -4));
    /// ```
    pub fn new(num: Int, denom: Int) -> Rational {
        assert_ne!(denom, 0, "Denominator must not be zero");

        let sign = num.signum() * denom.signum();
        let div = gcd(num, denom);
        Rational {
            num: sign * num.abs() / div,
            denom: denom.abs() / div,
        }
    }

    pub fn one() -> Rational {
        Rational { num: 1, denom: 1 }
    }

    pub fn recip(self) -> Rational {
        Rational::new(self.denom, self.num)
    }

    /// Multiply two rationals, returning `None` if the result is not representable.
    ///
    /// Factors are cross-reduced first, so long chains of small harmonic ratios
    /// stay representable as long as the reduced result fits.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::rational::*;
    ///
    /// let fifth = Rational::new(3, 2);
    /// let fourth = Rational::new(4, 3);
    /// assert_eq!(fifth.checked_mul(fourth), Some(Rational::new(2, 1)));
    /// assert_eq!(Rational::new(i64::MAX, 1).checked_mul(fifth), None);
    /// ```
    pub fn checked_mul(self, rhs: Rational) -> Option<Rational> {
        let g1 = gcd(self.num, rhs.denom).max(1);
        let g2 = gcd(rhs.num, self.denom).max(1);
        let num = (self.num / g1).checked_mul(rhs.num / g2)?;
        let denom = (self.denom / g2).checked_mul(rhs.denom / g1)?;
        Some(Rational::new(num, denom))
    }

    /// Divide two rationals, returning `None` on overflow or division by zero.
    pub fn checked_div(self, rhs: Rational) -> Option<Rational> {
        if rhs.num == 0 {
            return None;
        }
        self.checked_mul(rhs.recip())
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}

/// Computes the greates common divisor of two numbers using euclids algorithm.
///
/// # Example
///
/// ```
/// use entune::rational::*;
///
/// assert_eq!(gcd(20, 15), 5);
/// assert_eq!(gcd(20, 19), 1);
/// assert_eq!(gcd(10, 0), 10);
/// assert_eq!(gcd(0, 0), 0);
/// assert_eq!(gcd(10, -10), 10);
/// ```
pub fn gcd(mut a: Int, mut b: Int) -> Int {
    a = a.abs();
    b = b.abs();

    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_chain_products() {
        // a major triad built from stacked thirds closes on the fifth
        let third = Rational::new(5, 4);
        let minor_third = Rational::new(6, 5);
        assert_eq!(third.checked_mul(minor_third), Some(Rational::new(3, 2)));
        assert_eq!(
            Rational::new(3, 2).checked_div(third),
            Some(Rational::new(6, 5))
        );
        assert_eq!(third.checked_div(Rational::new(0, 1)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Rational::new(10, 8).to_string(), "5/4");
        assert_eq!(Rational::new(-3, 6).to_string(), "-1/2");
    }
}
