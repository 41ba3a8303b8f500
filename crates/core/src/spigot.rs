//! Digit-by-digit ("spigot") generation of the decimal expansion of pi.
//!
//! The working state is a single mixed-radix buffer whose cell `j` holds a
//! digit in radix `(2j + 1) / j`. Every cell starts at 2, which makes the
//! buffer represent `2 + 1/3 (2 + 2/5 (2 + 3/7 (2 + ...)))`, i.e. pi.
//! Multiplying the buffer by 10 and normalising it pushes exactly one
//! decimal digit out of cell 0. No big-integer type and no floating point
//! is involved.
//!
//! Each pass depends on the buffer left by the previous one, and within a
//! pass the carry flows strictly from the highest cell down to cell 0, so
//! the computation is sequential and owns its buffer exclusively.

/// Largest fraction reported before the final checkpoint.
pub const CHECKPOINT_CAP: f64 = 0.99;

/// Extra passes (and buffer precision) beyond the requested digits.
///
/// A pass can emit a predigit of 9 that stays held until a later pass
/// resolves it, so a few surplus passes are needed to release the tail.
const GUARD_PASSES: usize = 10;

/// Upper bound on buffer cells; each cell must hold values below `2j + 1`
/// in a `u32`.
const MAX_CELLS: usize = (u32::MAX / 2) as usize;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("digit count must be positive")]
    ZeroDigits,

    #[error("{digits} digits exceed the working buffer limit")]
    TooLarge { digits: u32 },

    #[error("failed to allocate a working buffer of {cells} cells")]
    Allocation { cells: usize },
}

/// A progress report emitted while digits are being generated.
///
/// Intermediate checkpoints never carry partial digits; only the final one
/// (with `fraction == 1.0`) carries the complete result.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub fraction: f64,
    pub result: Option<String>,
}

impl Checkpoint {
    pub fn is_final(&self) -> bool {
        self.result.is_some()
    }
}

/// Number of passes between two progress checkpoints for `digit_count`.
pub fn checkpoint_interval(digit_count: u32) -> u32 {
    (digit_count / 10).max(1)
}

/// Fraction reported at pass `pass` of a `digit_count`-digit computation.
pub fn checkpoint_fraction(pass: u32, digit_count: u32) -> f64 {
    (f64::from(pass) / f64::from(digit_count)).min(CHECKPOINT_CAP)
}

/// Compute pi to `digit_count` decimal places, e.g. `compute(5) == "3.14159"`.
pub fn compute(digit_count: u32) -> Result<String, EngineError> {
    compute_with_checkpoints(digit_count, |_| {})
}

/// Compute pi to `digit_count` decimal places, reporting progress.
///
/// `on_checkpoint` is called roughly every `digit_count / 10` passes with
/// the completed fraction, then exactly once more with `fraction == 1.0`
/// and the full result.
pub fn compute_with_checkpoints<F>(digit_count: u32, mut on_checkpoint: F) -> Result<String, EngineError>
where
    F: FnMut(Checkpoint),
{
    if digit_count == 0 {
        return Err(EngineError::ZeroDigits);
    }

    // The leading 3 comes out of the first pass like any other digit.
    let wanted = digit_count as usize + 1;
    let passes = wanted + GUARD_PASSES;
    let mut spigot = Spigot::with_passes(passes).map_err(|err| match err {
        EngineError::TooLarge { .. } => EngineError::TooLarge {
            digits: digit_count,
        },
        other => other,
    })?;

    let interval = checkpoint_interval(digit_count);
    let mut digits = String::with_capacity(wanted + GUARD_PASSES);

    for pass in 0..passes {
        if digits.len() >= wanted {
            break;
        }

        let predigit = spigot.sweep();
        spigot.release(predigit, &mut digits);

        let pass = pass as u32;
        if pass < digit_count && pass % interval == 0 {
            on_checkpoint(Checkpoint {
                fraction: checkpoint_fraction(pass, digit_count),
                result: None,
            });
        }
    }
    spigot.flush(&mut digits);
    digits.truncate(wanted);

    let result = format!("{}.{}", &digits[..1], &digits[1..]);
    on_checkpoint(Checkpoint {
        fraction: 1.0,
        result: Some(result.clone()),
    });

    Ok(result)
}

/// The mixed-radix working buffer plus the predigits still held back.
struct Spigot {
    buffer: Vec<u32>,
    held: Option<u8>,
    nines: usize,
}

impl Spigot {
    fn with_passes(passes: usize) -> Result<Self, EngineError> {
        let cells = passes
            .checked_mul(10)
            .map(|tenfold| tenfold / 3 + 1)
            .filter(|cells| *cells <= MAX_CELLS)
            .ok_or(EngineError::TooLarge { digits: u32::MAX })?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(cells)
            .map_err(|_| EngineError::Allocation { cells })?;
        buffer.resize(cells, 2);

        Ok(Self {
            buffer,
            held: None,
            nines: 0,
        })
    }

    /// Multiply the buffer by ten, normalise it and return the predigit
    /// pushed out of cell 0 (0..=10).
    fn sweep(&mut self) -> u8 {
        let mut carry: u64 = 0;
        for j in (1..self.buffer.len()).rev() {
            let numerator = j as u64;
            let radix = 2 * numerator + 1;
            let temp = u64::from(self.buffer[j]) * 10 + carry * (numerator + 1);
            self.buffer[j] = (temp % radix) as u32;
            carry = temp / radix;
        }

        let temp = u64::from(self.buffer[0]) * 10 + carry;
        self.buffer[0] = (temp % 10) as u32;
        (temp / 10) as u8
    }

    /// Append every digit that `predigit` makes final.
    ///
    /// A 9 may still become a 0 if a later pass carries into it, so runs of
    /// nines are held together with the digit in front of them.
    fn release(&mut self, predigit: u8, out: &mut String) {
        match predigit {
            9 => self.nines += 1,
            10 => {
                if let Some(held) = self.held {
                    push_digit(out, held + 1);
                }
                push_run(out, b'0', self.nines);
                self.held = Some(0);
                self.nines = 0;
            }
            digit => {
                self.flush(out);
                self.held = Some(digit);
            }
        }
    }

    fn flush(&mut self, out: &mut String) {
        if let Some(held) = self.held.take() {
            push_digit(out, held);
        }
        push_run(out, b'9', self.nines);
        self.nines = 0;
    }
}

fn push_digit(out: &mut String, digit: u8) {
    out.push(char::from(b'0' + digit));
}

fn push_run(out: &mut String, digit: u8, count: usize) {
    out.extend(std::iter::repeat(char::from(digit)).take(count));
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PI_50: &str = "3.14159265358979323846264338327950288419716939937510";

    #[test]
    fn known_short_values() {
        assert_eq!(compute(1).unwrap(), "3.1");
        assert_eq!(compute(5).unwrap(), "3.14159");
        assert_eq!(compute(10).unwrap(), "3.1415926535");
    }

    #[test]
    fn matches_reference_table_of_fifty_digits() {
        assert_eq!(compute(50).unwrap(), PI_50);
    }

    #[test]
    fn every_prefix_has_exact_length_and_agrees() {
        let reference = compute(300).unwrap();
        for n in 1..=300u32 {
            let digits = compute(n).unwrap();
            assert_eq!(digits.len(), n as usize + 2, "n = {n}");
            assert!(digits.starts_with("3."));
            assert!(digits[2..].bytes().all(|b| b.is_ascii_digit()));
            assert!(reference.starts_with(&digits), "n = {n}: {digits}");
        }
    }

    #[test]
    fn resolves_the_run_of_six_nines() {
        // Decimals 762..=767 are all 9; the digits around them stress the
        // held-predigit handling.
        let digits = compute(800).unwrap();
        assert_eq!(digits.len(), 802);
        assert_eq!(&digits[760..780], "13499999983729780499");
        for n in 755..=800u32 {
            assert!(digits.starts_with(&compute(n).unwrap()), "n = {n}");
        }
    }

    #[test]
    fn large_computation_keeps_reference_prefix() {
        let digits = compute(2_000).unwrap();
        assert_eq!(digits.len(), 2_002);
        assert!(digits.starts_with(PI_50));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(compute(137).unwrap(), compute(137).unwrap());
    }

    #[test]
    fn zero_digits_is_rejected() {
        assert_matches!(compute(0), Err(EngineError::ZeroDigits));
    }

    #[test]
    fn checkpoints_are_monotonic_and_end_with_result() {
        let mut seen = Vec::new();
        let result = compute_with_checkpoints(100, |c| seen.push(c)).unwrap();

        // Passes 0, 10, ..., 90 plus the final checkpoint.
        assert_eq!(seen.len(), 11);
        assert!(seen.windows(2).all(|w| w[0].fraction <= w[1].fraction));

        let (last, rest) = seen.split_last().unwrap();
        assert_eq!(last.fraction, 1.0);
        assert_eq!(last.result.as_deref(), Some(result.as_str()));
        assert!(rest.iter().all(|c| c.result.is_none()));
        assert!(rest.iter().all(|c| c.fraction <= CHECKPOINT_CAP));
        assert_eq!(rest[0].fraction, 0.0);
    }

    #[test]
    fn small_jobs_checkpoint_every_pass() {
        let mut count = 0;
        compute_with_checkpoints(5, |_| count += 1).unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn interval_and_fraction_helpers() {
        assert_eq!(checkpoint_interval(1), 1);
        assert_eq!(checkpoint_interval(9), 1);
        assert_eq!(checkpoint_interval(10), 1);
        assert_eq!(checkpoint_interval(250), 25);

        assert_eq!(checkpoint_fraction(0, 10), 0.0);
        assert_eq!(checkpoint_fraction(5, 10), 0.5);
        assert_eq!(checkpoint_fraction(100, 100), CHECKPOINT_CAP);
    }
}
