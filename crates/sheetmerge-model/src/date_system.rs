use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Excel workbook date system used to interpret serial date values.
///
/// Excel supports two base date systems:
/// - `Excel1900` (default on Windows; includes the Lotus 1-2-3 leap year bug)
/// - `Excel1904` (default on older Mac versions)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateSystem {
    #[default]
    #[serde(rename = "excel1900")]
    Excel1900,
    #[serde(rename = "excel1904")]
    Excel1904,
}

const SECONDS_PER_DAY: f64 = 86_400.0;

impl DateSystem {
    fn epoch(self) -> NaiveDateTime {
        // 1899-12-30 absorbs the phantom 1900-02-29 for every date after March 1900.
        let date = match self {
            DateSystem::Excel1900 => NaiveDate::from_ymd_opt(1899, 12, 30),
            DateSystem::Excel1904 => NaiveDate::from_ymd_opt(1904, 1, 1),
        };
        date.and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Serial number for `value` (days since the epoch, fractional time of day).
    pub fn to_serial(self, value: NaiveDateTime) -> f64 {
        let delta = value - self.epoch();
        let seconds = delta.num_milliseconds() as f64 / 1000.0;
        // Round to the millisecond so serials are stable across encode cycles.
        (seconds / SECONDS_PER_DAY * 86_400_000.0).round() / 86_400_000.0
    }

    /// Inverse of [`DateSystem::to_serial`]. Returns `None` for non-finite or negative serials.
    pub fn from_serial(self, serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() || serial < 0.0 {
            return None;
        }
        let millis = (serial * SECONDS_PER_DAY * 1000.0).round() as i64;
        self.epoch().checked_add_signed(Duration::milliseconds(millis))
    }
}
