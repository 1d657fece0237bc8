// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exact fixed-point amounts. Share deltas are decoded into [TokenAmount] and persisted from its
//! raw integer. Snapshot metric values are read back as text and parsed through it.

use ethers::types::{Sign, I256, U256};

use crate::error::{IndexerError, IndexerResult};

/// Scale of wei-denominated values (shares, ETH).
pub const ETH_SCALE: u32 = 18;

/// Signed integer `raw` interpreted as `raw / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    raw: I256,
    scale: u32,
}

impl TokenAmount {
    /// Wrap an unsigned log argument. Fails if it does not fit in a signed 256-bit integer.
    pub fn from_u256(value: U256, scale: u32) -> IndexerResult<Self> {
        let raw = I256::try_from(value).map_err(|_| {
            IndexerError::Validation(format!("value {} does not fit in int256", value))
        })?;
        Ok(Self { raw, scale })
    }

    /// Parse a base-10 string such as `-12.5` into an amount of the given scale. More fractional
    /// digits than `scale` is an error rather than a silent truncation.
    pub fn parse(s: &str, scale: u32) -> IndexerResult<Self> {
        let invalid = || IndexerError::Validation(format!("invalid decimal amount: {:?}", s));
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac_part.len() > scale as usize {
            return Err(IndexerError::Validation(format!(
                "{:?} has more than {} fractional digits",
                s, scale
            )));
        }

        let digits = format!(
            "{}{}{}",
            int_part,
            frac_part,
            "0".repeat(scale as usize - frac_part.len())
        );
        let digits = digits.trim_start_matches('0');
        let magnitude = if digits.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(digits).map_err(|_| invalid())?
        };
        let mut raw = I256::try_from(magnitude).map_err(|_| invalid())?;
        if negative {
            raw = -raw;
        }
        Ok(Self { raw, scale })
    }

    /// Base-10 integer of the raw value, the form persisted for share deltas.
    pub fn raw_string(&self) -> String {
        self.raw.to_string()
    }

    /// Exact decimal rendering with trailing fractional zeros removed.
    pub fn to_decimal_string(&self) -> String {
        let (sign, abs) = self.raw.into_sign_and_abs();
        let digits = abs.to_string();
        let scale = self.scale as usize;
        let mut out = if scale == 0 {
            digits
        } else {
            let padded = format!("{:0>width$}", digits, width = scale + 1);
            let (int_part, frac_part) = padded.split_at(padded.len() - scale);
            let frac_part = frac_part.trim_end_matches('0');
            if frac_part.is_empty() {
                int_part.to_string()
            } else {
                format!("{}.{}", int_part, frac_part)
            }
        };
        if sign == Sign::Negative && !abs.is_zero() {
            out.insert(0, '-');
        }
        out
    }

    /// Only for metric values where float output is expected anyway.
    pub fn to_f64_lossy(&self) -> f64 {
        self.to_decimal_string().parse().unwrap_or(0.0)
    }
}
