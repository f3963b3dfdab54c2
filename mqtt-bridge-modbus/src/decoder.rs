//! Register value decoding.
//!
//! [`decode`] is a pure function of the raw words and the register's
//! descriptor. Anything that cannot produce a value yields
//! [`DecodedValue::Absent`] rather than an error.

use std::fmt;

use crate::schema::{RegisterDescriptor, RegisterKind};

/// Text published for a register with no value this cycle.
pub const ABSENT_MARKER: &str = "None";

/// A decoded register value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// No value could be produced (read failed, pseudo-register, short read).
    Absent,
    /// Unsigned integer
    Unsigned(u64),
    /// Signed integer
    Signed(i64),
    /// Scaled numeric value
    Float(f64),
    /// Text value
    Text(String),
    /// Undecoded register words
    Raw(Vec<u16>),
}

impl DecodedValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, DecodedValue::Absent)
    }

    /// Numeric value as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Unsigned(v) => Some(*v as f64),
            DecodedValue::Signed(v) => Some(*v as f64),
            DecodedValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Divide numeric values by `scale`; everything else passes through.
    pub fn scaled(self, scale: f64) -> Self {
        if scale == 1.0 {
            return self;
        }
        match self.as_f64() {
            Some(v) => DecodedValue::Float(v / scale),
            None => self,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Absent => f.write_str(ABSENT_MARKER),
            DecodedValue::Unsigned(v) => write!(f, "{}", v),
            DecodedValue::Signed(v) => write!(f, "{}", v),
            DecodedValue::Float(v) => write_float(f, *v),
            DecodedValue::Text(s) => f.write_str(s),
            DecodedValue::Raw(words) => {
                f.write_str("[")?;
                for (i, word) in words.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", word)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Shortest round-trip form, as consumers of the state topic expect it:
/// `10.0`, `230.5`, `1e-05`, `1.5e+16`, `nan`, `inf`.
fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
    }

    let magnitude = v.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        // Exponent form: signed, at least two digits
        let text = format!("{:e}", v);
        let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return write!(f, "{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    // Integral floats keep a fractional digit: 10.0, not 10
    if v.fract() == 0.0 {
        write!(f, "{:.1}", v)
    } else {
        write!(f, "{}", v)
    }
}

/// Decode raw register words according to a register descriptor.
pub fn decode(raw: &[u16], register: &RegisterDescriptor) -> DecodedValue {
    if raw.is_empty() {
        return DecodedValue::Absent;
    }

    let value = match register.kind {
        RegisterKind::String => DecodedValue::Text(decode_ascii(raw)),
        RegisterKind::U16 | RegisterKind::Byte => match raw {
            [word] => DecodedValue::Unsigned(u64::from(*word)),
            _ => DecodedValue::Raw(raw.to_vec()),
        },
        RegisterKind::I16 => DecodedValue::Signed(i64::from(raw[0] as i16)),
        RegisterKind::U32 => match combine_u32(raw) {
            Some(v) => DecodedValue::Unsigned(u64::from(v)),
            None => DecodedValue::Absent,
        },
        RegisterKind::I32 => match combine_u32(raw) {
            Some(v) => DecodedValue::Signed(i64::from(v as i32)),
            None => DecodedValue::Absent,
        },
        RegisterKind::Raw | RegisterKind::Other(_) => DecodedValue::Raw(raw.to_vec()),
    };

    value.scaled(register.scale)
}

/// Combine the first two words, high word first.
fn combine_u32(raw: &[u16]) -> Option<u32> {
    match raw {
        [high, low, ..] => Some((u32::from(*high) << 16) | u32::from(*low)),
        _ => None,
    }
}

/// Big-endian bytes of every word, non-ASCII bytes dropped, whitespace trimmed.
fn decode_ascii(raw: &[u16]) -> String {
    let text: String = raw
        .iter()
        .flat_map(|word| word.to_be_bytes())
        .filter(u8::is_ascii)
        .map(char::from)
        .collect();

    text.trim_matches(|c: char| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
        .to_string()
}
