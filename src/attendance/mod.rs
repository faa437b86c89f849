//! Attendance day-codes
//!
//! One calendar day of attendance is stored as a compact string code: a
//! status letter (`P` present, `A` absent) followed by optional overtime
//! hours. `"P"` is a plain present day, `"P8"` a present day with 8 hours
//! of overtime, `"A3"` an absent day that still carries 3 overtime hours
//! (night work after a day off). Decoding never fails: anything that is
//! not a well-formed code comes back as [`DayStatus::Invalid`] so a single
//! bad cell cannot sink a whole month's payroll run.

use serde::{Deserialize, Serialize};

/// Upper bound on overtime hours a single day-code may carry
pub const MAX_OVERTIME_HOURS: u32 = 24;

/// Attendance status of a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Present,
    Absent,
    Invalid,
}

/// Decoded form of a day-code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedDay {
    pub status: DayStatus,
    pub overtime_hours: u32,
}

impl DecodedDay {
    fn invalid() -> Self {
        Self {
            status: DayStatus::Invalid,
            overtime_hours: 0,
        }
    }
}

/// Encode a day's attendance as a code string
///
/// Zero overtime hours yields the bare status letter.
pub fn encode(present: bool, overtime_hours: u32) -> String {
    let letter = if present { 'P' } else { 'A' };
    if overtime_hours == 0 {
        letter.to_string()
    } else {
        format!("{letter}{overtime_hours}")
    }
}

/// Decode a day-code
///
/// The status letter is case-sensitive and the hour suffix must parse to
/// an integer within `0..=MAX_OVERTIME_HOURS`. Malformed input yields
/// [`DayStatus::Invalid`] with zero overtime rather than an error.
pub fn decode(code: &str) -> DecodedDay {
    let code = code.trim();
    let mut chars = code.chars();
    let status = match chars.next() {
        Some('P') => DayStatus::Present,
        Some('A') => DayStatus::Absent,
        _ => return DecodedDay::invalid(),
    };
    let rest = chars.as_str();
    let overtime_hours = if rest.is_empty() {
        0
    } else {
        match rest.parse::<u32>() {
            Ok(hours) if hours <= MAX_OVERTIME_HOURS => hours,
            _ => return DecodedDay::invalid(),
        }
    };
    DecodedDay {
        status,
        overtime_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain_days() {
        assert_eq!(encode(true, 0), "P");
        assert_eq!(encode(false, 0), "A");
    }

    #[test]
    fn test_encode_with_overtime() {
        assert_eq!(encode(true, 8), "P8");
        assert_eq!(encode(false, 3), "A3");
        assert_eq!(encode(true, 24), "P24");
    }

    #[test]
    fn test_decode_plain_days() {
        assert_eq!(
            decode("P"),
            DecodedDay {
                status: DayStatus::Present,
                overtime_hours: 0
            }
        );
        assert_eq!(
            decode("A"),
            DecodedDay {
                status: DayStatus::Absent,
                overtime_hours: 0
            }
        );
    }

    #[test]
    fn test_decode_absent_with_overtime() {
        let decoded = decode("A3");
        assert_eq!(decoded.status, DayStatus::Absent);
        assert_eq!(decoded.overtime_hours, 3);
    }

    #[test]
    fn test_round_trip_all_hours() {
        for present in [true, false] {
            for hours in 0..=MAX_OVERTIME_HOURS {
                let code = encode(present, hours);
                let decoded = decode(&code);
                let expected = if present {
                    DayStatus::Present
                } else {
                    DayStatus::Absent
                };
                assert_eq!(decoded.status, expected, "code {code}");
                assert_eq!(decoded.overtime_hours, hours, "code {code}");
            }
        }
    }

    #[test]
    fn test_decode_malformed() {
        for code in ["", "X", "8", "p4", "a2", "P25", "P100", "Pabc", "P-1", "P 8"] {
            assert_eq!(decode(code).status, DayStatus::Invalid, "code {code:?}");
            assert_eq!(decode(code).overtime_hours, 0, "code {code:?}");
        }
    }

    #[test]
    fn test_decode_trims_outer_whitespace() {
        let decoded = decode(" P8 ");
        assert_eq!(decoded.status, DayStatus::Present);
        assert_eq!(decoded.overtime_hours, 8);
    }
}
