use crate::error::{CipError, Result};
use crate::schema::FiscalYear;
use chrono::{Datelike, NaiveDate};

/// Month in which the District's fiscal year closes (October through September).
pub const FISCAL_YEAR_END_MONTH: u32 = 9;

/// Parses `FY2017`, `FY17`, `fy17` or a bare `2017` into a fiscal year.
pub fn parse_fiscal_year(s: &str) -> Result<FiscalYear> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("FY")
        .or_else(|| trimmed.strip_prefix("fy"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CipError::InvalidFiscalYear(format!(
            "'{}' is not a fiscal year key. Expected FY<yyyy>",
            s
        )));
    }

    let value: i32 = digits
        .parse()
        .map_err(|_| CipError::InvalidFiscalYear(format!("'{}' is out of range", s)))?;

    match digits.len() {
        2 => Ok(expand_two_digit_year(value as u32)),
        4 => FiscalYear::try_new(value),
        _ => Err(CipError::InvalidFiscalYear(format!(
            "'{}' must carry a 2- or 4-digit year",
            s
        ))),
    }
}

/// Budget books label cycles with two digits (`fy17`); all of them are 2000s.
pub fn expand_two_digit_year(yy: u32) -> FiscalYear {
    FiscalYear::new(2000 + (yy % 100) as i32)
}

/// Returns the fiscal year a calendar date falls in.
///
/// # Examples
/// - FY ending September: 2016-10-01 falls in FY2017, 2017-09-30 in FY2017
/// - FY ending December: every date falls in its own calendar year
pub fn fiscal_year_containing(date: NaiveDate, fiscal_year_end_month: u32) -> FiscalYear {
    if date.month() <= fiscal_year_end_month {
        FiscalYear::new(date.year())
    } else {
        FiscalYear::new(date.year() + 1)
    }
}

/// Inclusive range of fiscal years, ascending.
pub fn fiscal_years_between(start: FiscalYear, end: FiscalYear) -> Vec<FiscalYear> {
    (start.year()..=end.year()).map(FiscalYear::new).collect()
}

/// Parses a scraped dollar figure into a whole amount.
///
/// Accepts thousands separators, a leading `$` and surrounding whitespace. A blank
/// cell or a lone dash is zero, the way the budget tables print empty cells.
/// Anything else (letters, decimals, a leading minus or accounting parentheses) is
/// rejected rather than coerced.
pub fn parse_amount(field: &str, raw: &str) -> Result<u64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return Ok(0);
    }

    let malformed = || CipError::MalformedAmount {
        field: field.to_string(),
        value: raw.to_string(),
    };

    let s = s.strip_prefix('$').unwrap_or(s).trim_start();
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }

    // ledgers are signed; anything past i64::MAX cannot be carried
    let amount = cleaned.parse::<u64>().map_err(|_| malformed())?;
    if i64::try_from(amount).is_err() {
        return Err(malformed());
    }
    Ok(amount)
}

/// Like [`parse_amount`], but an absent or blank field stays absent.
pub fn parse_optional_amount(field: &str, raw: Option<&str>) -> Result<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_amount(field, s).map(Some),
    }
}
