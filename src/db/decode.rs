//! Row decoding into driver-independent cell values.
//!
//! The driver's `FromSql` impls are strict (an INT4 only decodes into `i32`),
//! so every column is dispatched on its PostgreSQL type and widened into a
//! `CellValue`. NUMERIC has no stock impl and is decoded from the binary wire
//! format here.

use crate::types::{CellValue, ExecutionFailure, Temporal};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::error::Error;
use std::fmt::Write as _;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;

type BoxError = Box<dyn Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// NUMERIC column widened to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PgNumeric(pub f64);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        numeric_to_f64(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty, &Type::NUMERIC)
    }
}

/// Decode a binary NUMERIC value.
///
/// Layout: `ndigits: i16`, `weight: i16`, `sign: u16`, `dscale: u16`, then
/// `ndigits` base-10000 digit groups. Group `i` is scaled by
/// `10000^(weight - i)`.
///
/// # Errors
///
/// Returns an error if the buffer is truncated, the digit count disagrees with
/// the buffer length, or the sign word is unknown
pub fn numeric_to_f64(raw: &[u8]) -> Result<f64, BoxError> {
    if raw.len() < 8 {
        return Err(format!("numeric header truncated ({} bytes)", raw.len()).into());
    }

    let read_u16 = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]);
    let ndigits = read_u16(0) as i16;
    let weight = read_u16(2) as i16 as i32;
    let sign = read_u16(4);

    if ndigits < 0 || raw.len() != 8 + 2 * ndigits as usize {
        return Err(format!(
            "numeric length mismatch: {} digits in {} bytes",
            ndigits,
            raw.len()
        )
        .into());
    }

    match sign {
        NUMERIC_NAN => return Ok(f64::NAN),
        NUMERIC_PINF => return Ok(f64::INFINITY),
        NUMERIC_NINF => return Ok(f64::NEG_INFINITY),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign 0x{:04X}", other).into()),
    }

    let digits: Vec<u16> = (0..ndigits as usize).map(|i| read_u16(8 + 2 * i)).collect();
    if let Some(bad) = digits.iter().find(|d| **d >= 10_000) {
        return Err(format!("invalid numeric digit group {}", bad).into());
    }

    // Render as decimal text and let the float parser round once.
    let mut text = String::with_capacity(8 + 4 * digits.len());
    if sign == NUMERIC_NEG {
        text.push('-');
    }

    if weight < 0 {
        text.push('0');
    } else {
        for i in 0..=weight {
            let group = digits.get(i as usize).copied().unwrap_or(0);
            if i == 0 {
                let _ = write!(text, "{}", group);
            } else {
                let _ = write!(text, "{:04}", group);
            }
        }
    }

    let ndigits = ndigits as i32;
    if ndigits > weight + 1 {
        text.push('.');
        for i in (weight + 1)..ndigits {
            let group = if i < 0 { 0 } else { digits[i as usize] };
            let _ = write!(text, "{:04}", group);
        }
    }

    text.parse::<f64>()
        .map_err(|e| format!("numeric '{}' did not parse: {}", text, e).into())
}

/// Decode every column of a row.
///
/// # Errors
///
/// Returns `ExecutionFailure::Decode` naming the column for unsupported types
/// or malformed values
pub fn decode_row(row: &Row) -> Result<Vec<CellValue>, ExecutionFailure> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            decode_cell(row, idx, column.type_()).map_err(|e| {
                ExecutionFailure::Decode(format!(
                    "column '{}' ({}): {}",
                    column.name(),
                    column.type_().name(),
                    e
                ))
            })
        })
        .collect()
}

fn decode_cell(row: &Row, idx: usize, ty: &Type) -> Result<CellValue, BoxError> {
    Ok(match ty {
        &Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.into(),
        &Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(i64::from).into(),
        &Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(i64::from).into(),
        &Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.into(),
        &Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(i64::from).into(),
        &Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(f64::from).into(),
        &Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.into(),
        &Type::NUMERIC => row.try_get::<_, Option<PgNumeric>>(idx)?.map(|n| n.0).into(),
        &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR | &Type::NAME | &Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.into()
        }
        &Type::CHAR => row
            .try_get::<_, Option<i8>>(idx)?
            .map(|c| char::from(c as u8).to_string())
            .into(),
        &Type::JSON | &Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| v.to_string())
            .into(),
        &Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(idx)?
            .map(|u| u.to_string())
            .into(),
        &Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(Temporal::Date)
            .into(),
        &Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Temporal::DateTime)
            .into(),
        &Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|ts| Temporal::DateTime(ts.naive_utc()))
            .into(),
        &Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(Temporal::Time)
            .into(),
        other => return Err(format!("unsupported column type {}", other.name()).into()),
    })
}
