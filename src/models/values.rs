use std::fmt;

use num_bigint::BigInt;

use crate::models::errors::DecodeError;

const FIXED_POINT_SCALE: u64 = 100_000_000; // 8 decimal places
const FIXED_POINT_DIGITS: usize = 8;

/// A decoded structured value, produced by the payload wire decoder and
/// consumed by the flattening engine. Instances are read-only and transient.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Nil,
    Optional(Box<TypedValue>),
    Bool(bool),
    Int(BigInt),
    UFix64(UFix64),
    Fix64(Fix64),
    String(String),
    Address(Vec<u8>),
    TypeTag(String),
    Array(Vec<TypedValue>),
    Dictionary(Vec<(TypedValue, TypedValue)>),
    Composite(Composite),
    /// Scalar kinds the decoder does not model explicitly, kept in their raw
    /// wire form.
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Struct,
    Resource,
    Event,
    Contract,
    Enum,
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Struct => "Struct",
            Self::Resource => "Resource",
            Self::Event => "Event",
            Self::Contract => "Contract",
            Self::Enum => "Enum",
        };
        f.write_str(name)
    }
}

/// A composite record: field names and field values are positionally aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub kind: CompositeKind,
    pub type_id: String,
    pub field_names: Vec<String>,
    pub field_values: Vec<TypedValue>,
}

impl Composite {
    /// Name/value count mismatch is a decode defect, not something the
    /// flattening engine recovers from.
    pub fn check_alignment(&self) -> Result<(), DecodeError> {
        if self.field_names.len() == self.field_values.len() {
            Ok(())
        } else {
            Err(DecodeError::FieldCountMismatch {
                names: self.field_names.len(),
                values: self.field_values.len(),
            })
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &TypedValue)> {
        self.field_names.iter().zip(self.field_values.iter())
    }
}

/// Unsigned fixed-point number with 8 decimal places, stored as the raw
/// scaled integer (value x 10^8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UFix64(u64);

impl UFix64 {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let raw = parse_scaled(text)?;
        let raw = u64::try_from(raw).map_err(|_| DecodeError::InvalidFixedPoint {
            text: text.to_owned(),
        })?;
        Ok(Self(raw))
    }

    /// Conversion through the canonical text form, matching how downstream
    /// consumers historically read these values. Loses precision beyond what
    /// an f64 can represent.
    pub fn to_f64(self) -> f64 {
        self.to_string().parse().unwrap_or_default()
    }
}

impl fmt::Display for UFix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / FIXED_POINT_SCALE,
            self.0 % FIXED_POINT_SCALE,
            width = FIXED_POINT_DIGITS
        )
    }
}

/// Signed fixed-point number with 8 decimal places, stored scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fix64(i64);

impl Fix64 {
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let raw = parse_scaled(text)?;
        let raw = i64::try_from(raw).map_err(|_| DecodeError::InvalidFixedPoint {
            text: text.to_owned(),
        })?;
        Ok(Self(raw))
    }

    pub fn to_f64(self) -> f64 {
        self.to_string().parse().unwrap_or_default()
    }
}

impl fmt::Display for Fix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:0width$}",
            if self.0 < 0 { "-" } else { "" },
            magnitude / FIXED_POINT_SCALE,
            magnitude % FIXED_POINT_SCALE,
            width = FIXED_POINT_DIGITS
        )
    }
}

/// Parses a signed decimal literal with up to 8 fractional digits into the
/// scaled-integer representation.
fn parse_scaled(text: &str) -> Result<i128, DecodeError> {
    let invalid = || DecodeError::InvalidFixedPoint {
        text: text.to_owned(),
    };

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };

    if int_part.is_empty() || frac_part.len() > FIXED_POINT_DIGITS {
        return Err(invalid());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let int_value: i128 = int_part.parse().map_err(|_| invalid())?;
    let mut frac_value: i128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| invalid())?
    };
    for _ in frac_part.len()..FIXED_POINT_DIGITS {
        frac_value *= 10;
    }

    let scaled = int_value
        .checked_mul(FIXED_POINT_SCALE as i128)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(invalid)?;

    Ok(if negative { -scaled } else { scaled })
}
