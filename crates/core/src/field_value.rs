use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A value stored in a record, discriminated by the owning field's type.
///
/// Number fields hold `Number`, select fields hold `Option`, text fields hold
/// `Text`. Values written before a field changed type are kept as they are;
/// readers go through [`FieldValue::as_number`] and [`FieldValue::display`]
/// which are total over every variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Option(String),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b).is_eq(),
            (Self::Option(a), Self::Option(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    /// Numeric view of the value. Text that parses as a finite number counts;
    /// NaN and infinities never do.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Number(_) => None,
            FieldValue::Text(s) | FieldValue::Option(s) => parse_finite(s),
        }
    }

    /// Text shown in tables, exports and search. Whole numbers print without
    /// a fractional part.
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) | FieldValue::Option(s) => Cow::Borrowed(s),
            FieldValue::Number(n) => Cow::Owned(format_number(*n)),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) | FieldValue::Option(s) => s.trim().is_empty(),
            FieldValue::Number(_) => false,
        }
    }
}

/// Parse a string as a finite `f64`, ignoring surrounding whitespace.
pub fn parse_finite(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_is_numeric() {
        assert_eq!(FieldValue::Text(" 12.5 ".into()).as_number(), Some(12.5));
        assert_eq!(FieldValue::Option("3".into()).as_number(), Some(3.0));
        assert_eq!(FieldValue::Text("abc".into()).as_number(), None);
        assert_eq!(FieldValue::Text("".into()).as_number(), None);
    }

    #[test]
    fn non_finite_is_not_numeric() {
        assert_eq!(FieldValue::Number(f64::NAN).as_number(), None);
        assert_eq!(FieldValue::Text("inf".into()).as_number(), None);
        assert_eq!(FieldValue::Text("NaN".into()).as_number(), None);
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(FieldValue::Number(10.0).display(), "10");
        assert_eq!(FieldValue::Number(-3.0).display(), "-3");
        assert_eq!(FieldValue::Number(2.5).display(), "2.5");
    }

    #[test]
    fn same_text_in_different_variants_differs() {
        let v = FieldValue::Option("A".into());
        assert_ne!(v, FieldValue::Text("A".into()));
        assert_eq!(v.display(), "A");
    }
}
