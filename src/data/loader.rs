use crate::config::FeedConfig;
use crate::data::bar::Bar;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord};

//loads bars from a generic csv file described by the feed config
//rows outside the date window are dropped, rows that fail ohlc validation are skipped
pub fn load_csv(feed: &FeedConfig) -> Result<Vec<Bar>> {
    let path = &feed.path;
    let mut reader = ReaderBuilder::new()
        .has_headers(feed.has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = result.context(format!("Failed to read CSV record in {:?}", path))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let timestamp = parse_timestamp(&record, feed, line)?;

        if let Some(from) = feed.from_date {
            if timestamp.naive_utc() < from {
                continue;
            }
        }
        if let Some(to) = feed.to_date {
            if timestamp.naive_utc() > to {
                continue;
            }
        }

        let columns = &feed.columns;
        let open = numeric_field(&record, columns.open, feed.null_value, line)?;
        let high = numeric_field(&record, columns.high, feed.null_value, line)?;
        let low = numeric_field(&record, columns.low, feed.null_value, line)?;
        let close = numeric_field(&record, columns.close, feed.null_value, line)?;
        let volume = match columns.volume {
            Some(col) => numeric_field(&record, col, feed.null_value, line)?,
            None => 0.0,
        };
        let open_interest = match columns.open_interest {
            Some(col) => Some(numeric_field(&record, col, feed.null_value, line)?),
            None => None,
        };

        match Bar::new(timestamp, open, high, low, close, volume, open_interest) {
            Ok(bar) => bars.push(bar),
            Err(e) => {
                skipped += 1;
                tracing::warn!(line, error = %e, "skipping invalid bar");
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, path = ?path, "some rows failed validation");
    }

    //sort by timestamp to ensure chronological order
    bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    tracing::debug!(count = bars.len(), path = ?path, "loaded bars");

    Ok(bars)
}

fn parse_timestamp(record: &StringRecord, feed: &FeedConfig, line: u64) -> Result<DateTime<Utc>> {
    let raw = record
        .get(feed.columns.datetime)
        .ok_or_else(|| anyhow!("Missing datetime column {} at line {}", feed.columns.datetime, line))?;

    let naive = match NaiveDateTime::parse_from_str(raw, &feed.datetime_format) {
        Ok(dt) => dt,
        //date-only formats carry no time component
        Err(_) => NaiveDate::parse_from_str(raw, &feed.datetime_format)
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
            .context(format!(
                "Failed to parse timestamp '{}' with format '{}' at line {}",
                raw, feed.datetime_format, line
            ))?,
    };

    Ok(Utc.from_utc_datetime(&naive))
}

fn numeric_field(record: &StringRecord, column: usize, null_value: f64, line: u64) -> Result<f64> {
    let raw = record
        .get(column)
        .ok_or_else(|| anyhow!("Missing column {} at line {}", column, line))?;

    if raw.is_empty() {
        return Ok(null_value);
    }

    raw.parse::<f64>()
        .context(format!("Failed to parse '{}' in column {} at line {}", raw, column, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnMap, FeedConfig};
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn feed_for(file: &NamedTempFile) -> FeedConfig {
        FeedConfig {
            path: file.path().to_path_buf(),
            from_date: None,
            to_date: None,
            ..FeedConfig::default()
        }
    }

    #[test]
    fn test_loads_generic_csv() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2007-01-02 01:00,1.3200,1.3210,1.3190,1.3205,100\n\
             2007-01-02 00:00,1.3190,1.3205,1.3185,1.3200,80\n",
        );

        let bars = load_csv(&feed_for(&file)).unwrap();
        assert_eq!(bars.len(), 2);
        //sorted chronologically
        assert_eq!(bars[0].close, 1.3200);
        assert_eq!(bars[1].close, 1.3205);
        assert_eq!(bars[1].volume, 100.0);
        assert!(bars[0].open_interest.is_none());
    }

    #[test]
    fn test_date_window_is_inclusive() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2006-12-31 23:00,1.0,1.0,1.0,1.0,1\n\
             2007-01-01 00:00,1.1,1.1,1.1,1.1,1\n\
             2007-01-05 00:00,1.2,1.2,1.2,1.2,1\n\
             2007-01-05 01:00,1.3,1.3,1.3,1.3,1\n",
        );

        let mut feed = feed_for(&file);
        feed.from_date = NaiveDate::from_ymd_opt(2007, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        feed.to_date = NaiveDate::from_ymd_opt(2007, 1, 5).and_then(|d| d.and_hms_opt(0, 0, 0));

        let closes: Vec<f64> = load_csv(&feed).unwrap().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.1, 1.2]);
    }

    #[test]
    fn test_empty_field_uses_null_value() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2007-01-02 00:00,1.32,1.33,1.31,1.32,\n",
        );

        let bars = load_csv(&feed_for(&file)).unwrap();
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn test_invalid_rows_are_skipped() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2007-01-02 00:00,1.32,1.30,1.31,1.32,5\n\
             2007-01-02 01:00,1.32,1.33,1.31,1.32,5\n",
        );

        let bars = load_csv(&feed_for(&file)).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_custom_columns_and_date_only_format() {
        let file = write_csv("2007-03-01,9,1.5,1.6,1.4,1.55,42\n");

        let mut feed = feed_for(&file);
        feed.has_headers = false;
        feed.datetime_format = "%Y-%m-%d".to_string();
        feed.columns = ColumnMap {
            datetime: 0,
            open: 2,
            high: 3,
            low: 4,
            close: 5,
            volume: None,
            open_interest: Some(6),
        };

        let bars = load_csv(&feed).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 1.55);
        assert_eq!(bars[0].volume, 0.0);
        assert_eq!(bars[0].open_interest, Some(42.0));
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             yesterday,1.32,1.33,1.31,1.32,5\n",
        );

        let err = load_csv(&feed_for(&file)).unwrap_err();
        assert!(format!("{:#}", err).contains("yesterday"));
    }
}
