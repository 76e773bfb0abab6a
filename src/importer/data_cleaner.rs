// ==========================================
// Product Feed Import - value transforms and coercion
// ==========================================
// Two closed dispatch tables of pure functions:
// - transform_fn(TransformType): per-mapping transform
// - coerce_fn(ValueKind):        target schema type coercion
// Price parsing: "19,99 €", "19.99", "1 299,00", "1.299,00", "1,299.00"
// ==========================================

use crate::domain::record::{FieldErrorKind, FieldValue};
use crate::domain::target_schema::ValueKind;
use crate::domain::types::TransformType;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Value after the mapping transform, before target coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    Text(String),
    Price(Decimal),
}

/// (source value, transform_value) -> transformed value
pub type TransformFn = fn(&str, &str) -> Result<Transformed, FieldErrorKind>;

pub type CoerceFn = fn(Transformed) -> Result<FieldValue, FieldErrorKind>;

/// Words that mean "in stock" for the stock_status flag.
pub const IN_STOCK_WORDS: &[&str] = &[
    "1",
    "true",
    "yes",
    "y",
    "instock",
    "in stock",
    "in_stock",
    "available",
    "skladem",
    "na sklade",
];

pub struct DataCleaner;

impl DataCleaner {
    pub fn transform_fn(transform: TransformType) -> TransformFn {
        match transform {
            TransformType::None => transform_none,
            TransformType::Trim => transform_trim,
            TransformType::Lowercase => transform_lowercase,
            TransformType::Uppercase => transform_uppercase,
            TransformType::Price => transform_price,
            TransformType::Default => transform_default,
        }
    }

    pub fn coerce_fn(kind: ValueKind) -> CoerceFn {
        match kind {
            ValueKind::Text => coerce_text,
            ValueKind::Price => coerce_price,
            ValueKind::Integer => coerce_integer,
            ValueKind::List => coerce_list,
            ValueKind::Flag => coerce_flag,
        }
    }

    /// Runs `transform` and then the coercion for `kind`.
    pub fn convert(
        value: &str,
        transform: TransformType,
        transform_value: &str,
        kind: ValueKind,
    ) -> Result<FieldValue, FieldErrorKind> {
        let transformed = Self::transform_fn(transform)(value, transform_value)?;
        Self::coerce_fn(kind)(transformed)
    }

    /// Blank (empty or whitespace only) values count as missing.
    pub fn normalize_null(value: Option<&str>) -> Option<&str> {
        value.filter(|v| !v.trim().is_empty())
    }
}

// ===== Transforms =====

fn transform_none(value: &str, _: &str) -> Result<Transformed, FieldErrorKind> {
    Ok(Transformed::Text(value.to_string()))
}

fn transform_trim(value: &str, _: &str) -> Result<Transformed, FieldErrorKind> {
    Ok(Transformed::Text(value.trim().to_string()))
}

fn transform_lowercase(value: &str, _: &str) -> Result<Transformed, FieldErrorKind> {
    Ok(Transformed::Text(value.to_lowercase()))
}

fn transform_uppercase(value: &str, _: &str) -> Result<Transformed, FieldErrorKind> {
    Ok(Transformed::Text(value.to_uppercase()))
}

fn transform_price(value: &str, _: &str) -> Result<Transformed, FieldErrorKind> {
    parse_price(value)
        .map(Transformed::Price)
        .ok_or_else(|| FieldErrorKind::InvalidPrice {
            value: value.to_string(),
        })
}

// The mapper substitutes transform_value before calling this.
fn transform_default(_: &str, transform_value: &str) -> Result<Transformed, FieldErrorKind> {
    Ok(Transformed::Text(transform_value.to_string()))
}

// ===== Coercion =====

fn coerce_text(value: Transformed) -> Result<FieldValue, FieldErrorKind> {
    Ok(match value {
        Transformed::Text(s) => FieldValue::Text(s),
        Transformed::Price(d) => FieldValue::Text(d.to_string()),
    })
}

fn coerce_price(value: Transformed) -> Result<FieldValue, FieldErrorKind> {
    match value {
        Transformed::Price(d) => Ok(FieldValue::Price(d)),
        Transformed::Text(s) => parse_price(&s)
            .map(FieldValue::Price)
            .ok_or(FieldErrorKind::InvalidPrice { value: s }),
    }
}

fn coerce_integer(value: Transformed) -> Result<FieldValue, FieldErrorKind> {
    match value {
        Transformed::Price(d) => integral(d)
            .map(FieldValue::Integer)
            .ok_or_else(|| FieldErrorKind::InvalidInteger {
                value: d.to_string(),
            }),
        Transformed::Text(s) => parse_integer(&s)
            .map(FieldValue::Integer)
            .ok_or(FieldErrorKind::InvalidInteger { value: s }),
    }
}

fn coerce_list(value: Transformed) -> Result<FieldValue, FieldErrorKind> {
    let text = match value {
        Transformed::Text(s) => s,
        Transformed::Price(d) => d.to_string(),
    };
    Ok(FieldValue::List(split_list(&text)))
}

fn coerce_flag(value: Transformed) -> Result<FieldValue, FieldErrorKind> {
    let text = match value {
        Transformed::Text(s) => s,
        Transformed::Price(d) => d.to_string(),
    };
    Ok(FieldValue::Flag(is_in_stock(&text)))
}

// ===== Parsers =====

/// Parses a human-written price.
///
/// Whitespace (NBSP included) and currency symbols/codes are dropped.
/// With both `,` and `.` present the last one is the decimal separator;
/// a separator repeated on its own is a thousands separator; a lone
/// separator is the decimal separator. A trailing `,-` means no decimals.
pub fn parse_price(input: &str) -> Option<Decimal> {
    let mut cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if cleaned.ends_with(",-") || cleaned.ends_with(".-") {
        cleaned.truncate(cleaned.len() - 2);
    }

    let negative = cleaned.starts_with('-');
    let digits = cleaned.trim_start_matches('-');
    if digits.is_empty() || digits.contains('-') || !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let commas = digits.matches(',').count();
    let dots = digits.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) => digits.to_string(),
        (_, 0) if commas > 1 => digits.replace(',', ""),
        (0, _) if dots > 1 => digits.replace('.', ""),
        (1, 0) => digits.replace(',', "."),
        (0, 1) => digits.to_string(),
        _ => {
            let last_comma = digits.rfind(',');
            let last_dot = digits.rfind('.');
            if last_comma > last_dot {
                digits.replace('.', "").replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
    };

    // decimal separator may appear only once after normalization
    if normalized.matches('.').count() > 1 {
        return None;
    }

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Parses a whole number; "12", " 12 ", "12.0" and "1 200" are accepted.
pub fn parse_integer(input: &str) -> Option<i64> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if let Ok(v) = compact.parse::<i64>() {
        return Some(v);
    }
    parse_price(&compact).and_then(integral)
}

fn integral(value: Decimal) -> Option<i64> {
    if value.fract().is_zero() {
        value.to_i64()
    } else {
        None
    }
}

/// Splits a list value on `|`, `,` and newlines.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(|c| matches!(c, '|' | ',' | '\n' | '\r'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_in_stock(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    IN_STOCK_WORDS.contains(&normalized.as_str())
}
