use thiserror::Error;

use crate::services::row_parser::parse_decimal;

/// Zero-based whitespace column of `%cpu` in the process table.
pub const CPU_COLUMN: usize = 2;
/// Zero-based whitespace column of `%mem` in the process table.
pub const MEM_COLUMN: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("process table has no data rows")]
    NoRows,

    #[error("row {line}: column {column} is not numeric: {text:?}")]
    NotNumeric {
        line: usize,
        column: usize,
        text: String,
    },
}

/// Sums one numeric column over every data row of the raw table.
///
/// Rows are split on whitespace only; a line whose first field is not a pid
/// (the header, blank lines) is skipped.
pub fn sum_column(raw: &str, column: usize) -> Result<f64, AggregationError> {
    let mut rows = 0;
    let mut total = 0.0;

    for (idx, line) in raw.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let is_data_row = fields
            .first()
            .is_some_and(|pid| pid.bytes().all(|b| b.is_ascii_digit()));
        if !is_data_row {
            continue;
        }

        let text = fields.get(column).copied().unwrap_or_default();
        let value = parse_decimal(text).ok_or_else(|| AggregationError::NotNumeric {
            line: idx + 1,
            column,
            text: text.to_string(),
        })?;
        total += value;
        rows += 1;
    }

    if rows == 0 {
        return Err(AggregationError::NoRows);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "  PID STAT  %CPU %MEM STARTED                      ELAPSED COMMAND
    1 Ss    10.0  1.5 Mon Sep 30 08:00:00 2024   18-01:00:00 launchd
  412 S      5,5  2.0 Mon Oct  7 09:12:33 2024   1-02:03:04 Safari
  500 S      0.0  0.5 Mon Oct  7 09:13:00 2024   1-02:02:37 Dropbox";

    #[test]
    fn test_sum_columns() {
        assert_eq!(sum_column(TABLE, CPU_COLUMN).unwrap(), 15.5);
        assert_eq!(sum_column(TABLE, MEM_COLUMN).unwrap(), 4.0);
    }

    #[test]
    fn test_empty_table_fails() {
        assert_eq!(sum_column("", CPU_COLUMN), Err(AggregationError::NoRows));
        assert_eq!(
            sum_column("  PID STAT %CPU", CPU_COLUMN),
            Err(AggregationError::NoRows)
        );
    }

    #[test]
    fn test_non_numeric_column_fails() {
        let err = sum_column("  12 S abc 1.0", CPU_COLUMN).unwrap_err();
        assert!(matches!(err, AggregationError::NotNumeric { line: 1, .. }));
        assert!(sum_column("  12 S", CPU_COLUMN).is_err());
    }
}
