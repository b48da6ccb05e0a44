//! Shorthand integers
//!
//! Parses human-friendly integers such as `20B` or `4K` by
//! multiplying the mantissa by a power of a fixed base.

// Imports
use std::num::ParseIntError;

/// Shorthand base
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ShorthandBase {
	/// Powers of 1000, used for counts
	Decimal,

	/// Powers of 1024, used for byte sizes
	Binary,
}

impl ShorthandBase {
	/// Returns the numeric value of this base
	#[must_use]
	pub const fn value(self) -> u64 {
		match self {
			Self::Decimal => 1000,
			Self::Binary => 1024,
		}
	}
}

/// Extension trait to parse shorthand integers from strings
#[extend::ext(name = ParseShorthand)]
pub impl str {
	/// Parses a shorthand integer.
	///
	/// The last character may be one of `K`, `M`, `B` / `G`, `T` or `Q` (case-insensitive),
	/// multiplying the mantissa by `base` to the power of 1, 2, 3, 4 or 5, respectively.
	fn parse_shorthand(&self, base: ShorthandBase) -> Result<u64, ShorthandError> {
		let s = self.trim();
		let last = s.chars().last().ok_or(ShorthandError::Empty)?;

		let exp = match last.to_ascii_uppercase() {
			'K' => 1,
			'M' => 2,
			'B' | 'G' => 3,
			'T' => 4,
			'Q' => 5,
			_ => 0,
		};
		let mantissa = match exp {
			0 => s,
			_ => &s[..s.len() - last.len_utf8()],
		};
		if mantissa.is_empty() {
			return Err(ShorthandError::Empty);
		}

		let mantissa = mantissa.parse::<u64>().map_err(ShorthandError::Mantissa)?;
		base.value()
			.checked_pow(exp)
			.and_then(|multiplier| mantissa.checked_mul(multiplier))
			.ok_or(ShorthandError::Overflow)
	}
}

/// Error for [`ParseShorthand::parse_shorthand`]
#[derive(PartialEq, Eq, Clone, Debug)]
#[derive(thiserror::Error)]
pub enum ShorthandError {
	/// Empty string (or only a suffix)
	#[error("Missing number")]
	Empty,

	/// Mantissa wasn't an unsigned integer
	#[error("Invalid number")]
	Mantissa(#[source] ParseIntError),

	/// Result doesn't fit in a `u64`
	#[error("Number is too large")]
	Overflow,
}
