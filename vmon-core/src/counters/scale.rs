//! Conversion of raw counter samples into typed values.

use super::catalog::Unit;
use crate::error::CheckError;
use crate::types::MetricValue;

pub const KIBIBYTE: u64 = 1024;
pub const MEBIBYTE: u64 = 1024 * 1024;
pub const TEBIBYTE: u64 = 1024 * 1024 * 1024 * 1024;

/// How a raw sample is turned into a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    /// Multiply by a fixed factor; the catalog unit is not consulted.
    Coefficient(u64),
    /// Scale according to the counter's declared unit.
    ByUnit,
}

impl Scaling {
    /// Apply the scaling to `raw`.
    ///
    /// An explicit coefficient always wins over the catalog unit.
    pub fn apply(self, raw: u64, unit: Unit, counter_id: u64) -> Result<MetricValue, CheckError> {
        let value = match self {
            Scaling::Coefficient(coeff) => MetricValue::Uint(raw.saturating_mul(coeff)),
            Scaling::ByUnit => match unit {
                Unit::Kilobyte | Unit::KilobytesPerSecond => {
                    MetricValue::Uint(raw.saturating_mul(KIBIBYTE))
                }
                Unit::Megabyte | Unit::MegabytesPerSecond => {
                    MetricValue::Uint(raw.saturating_mul(MEBIBYTE))
                }
                Unit::Terabyte => MetricValue::Uint(raw.saturating_mul(TEBIBYTE)),
                // Percent counters are reported in hundredths.
                Unit::Percent => MetricValue::Float(raw as f64 / 100.0),
                Unit::Joule
                | Unit::Megahertz
                | Unit::Microsecond
                | Unit::Millisecond
                | Unit::Number
                | Unit::Second
                | Unit::Watt
                | Unit::Celsius => MetricValue::Uint(raw),
                Unit::Unknown => return Err(CheckError::UnknownUnit(counter_id)),
            },
        };
        Ok(value)
    }
}
