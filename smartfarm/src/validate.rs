use crate::errors::{Error, Result};
use crate::model::{CropInput, NewCrop};
use chrono::{DateTime, NaiveDate};

pub const MOISTURE_MIN: f64 = 0.0;
pub const MOISTURE_MAX: f64 = 100.0;

/// Parses a telemetry payload (decimal text) into a moisture value
pub fn parse_payload(payload: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::Payload(format!("payload is not UTF-8: {}", e)))?
        .trim();

    let value: f64 = text
        .parse()
        .map_err(|e| Error::Payload(format!("'{}' is not a number: {}", text, e)))?;

    validate_moisture(value)?;
    Ok(value)
}

pub fn validate_moisture(value: f64) -> Result<()> {
    if !value.is_finite() || !(MOISTURE_MIN..=MOISTURE_MAX).contains(&value) {
        return Err(Error::Payload(format!(
            "Moisture {} out of range [{}, {}]",
            value, MOISTURE_MIN, MOISTURE_MAX
        )));
    }
    Ok(())
}

/// Validates crop input coming from the API
pub fn validate_crop(input: CropInput) -> Result<NewCrop> {
    let name = present(input.name)
        .ok_or_else(|| Error::Validation("Crop name is required".to_string()))?;

    let sow_date = match present(input.sow_date) {
        Some(raw) => parse_date("sowDate", &raw)?,
        None => return Err(Error::Validation("sowDate is required".to_string())),
    };

    let harvest_date = present(input.harvest_date)
        .map(|raw| parse_date("harvestDate", &raw))
        .transpose()?;

    Ok(NewCrop {
        name,
        sow_date,
        harvest_date,
    })
}

/// Name check shared with the stores, which may be called without going
/// through `validate_crop`.
pub fn validate_crop_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("Crop name is required".to_string()));
    }
    Ok(())
}

fn present(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| Error::Validation(format!("{} '{}' is not a valid date", field, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: Option<&str>, sow: Option<&str>, harvest: Option<&str>) -> CropInput {
        CropInput {
            name: name.map(String::from),
            sow_date: sow.map(String::from),
            harvest_date: harvest.map(String::from),
        }
    }

    #[test]
    fn test_parse_payload_valid() {
        assert_eq!(parse_payload(b"42.5").unwrap(), 42.5);
        assert_eq!(parse_payload(b" 0 \n").unwrap(), 0.0);
        assert_eq!(parse_payload(b"100").unwrap(), 100.0);
        assert_eq!(parse_payload(b"73.12345678901234").unwrap(), 73.12345678901234);
    }

    #[test]
    fn test_parse_payload_not_a_number() {
        assert!(parse_payload(b"wet").is_err());
        assert!(parse_payload(b"").is_err());
        assert!(parse_payload(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_parse_payload_out_of_range() {
        assert!(parse_payload(b"-0.5").is_err());
        assert!(parse_payload(b"100.01").is_err());
        assert!(parse_payload(b"NaN").is_err());
        assert!(parse_payload(b"inf").is_err());
    }

    #[test]
    fn test_valid_crop() {
        let crop = validate_crop(input(
            Some("Wheat"),
            Some("2024-01-01"),
            Some("2024-06-01"),
        ))
        .unwrap();
        assert_eq!(crop.name, "Wheat");
        assert_eq!(crop.sow_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(crop.harvest_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[test]
    fn test_crop_without_harvest_date() {
        let crop =
            validate_crop(input(Some("Barley"), Some("2024-03-10"), Some(""))).unwrap();
        assert_eq!(crop.harvest_date, None);
    }

    #[test]
    fn test_crop_accepts_rfc3339_dates() {
        let crop =
            validate_crop(input(Some("Rice"), Some("2024-01-01T08:30:00Z"), None)).unwrap();
        assert_eq!(crop.sow_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_missing_name() {
        let err = validate_crop(input(None, Some("2024-01-01"), None)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = validate_crop(input(Some("   "), Some("2024-01-01"), None)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_or_bad_sow_date() {
        assert!(validate_crop(input(Some("Wheat"), None, None)).is_err());
        assert!(validate_crop(input(Some("Wheat"), Some("01/02/2024"), None)).is_err());
    }

    #[test]
    fn test_harvest_date_is_not_ordered_against_sow_date() {
        let crop = validate_crop(input(
            Some("Wheat"),
            Some("2024-06-01"),
            Some("2024-01-01"),
        ))
        .unwrap();
        assert_eq!(crop.harvest_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }
}
