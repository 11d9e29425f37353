use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

use super::{FunctionCatalog, arity, int_arg, text_arg};

pub(super) fn register(catalog: &mut FunctionCatalog) {
    catalog.register("now", |args: &[Value]| {
        arity(args, 0, 0)?;
        Ok(Value::String(
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ))
    });
    catalog.register("format_date", |args: &[Value]| {
        arity(args, 2, 2)?;
        let date = parse_date(&text_arg(args, 0))?;
        let pattern = text_arg(args, 1);
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid date format '{pattern}'"));
        }
        Ok(Value::String(date.format(&pattern).to_string()))
    });
    catalog.register("date_add_days", |args: &[Value]| {
        arity(args, 2, 2)?;
        let date = parse_date(&text_arg(args, 0))?;
        let days = int_arg(args, 1)?;
        let shifted = Duration::try_days(days)
            .and_then(|d| date.checked_add_signed(d))
            .ok_or_else(|| format!("date out of range after adding {days} days"))?;
        Ok(Value::String(
            shifted.to_rfc3339_opts(SecondsFormat::Secs, true),
        ))
    });
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (taken as UTC midnight).
fn parse_date(text: &str) -> Result<DateTime<FixedOffset>, String> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| format!("cannot parse date '{text}'"))
}

#[cfg(test)]
mod tests {
    use crate::functions::FunctionCatalog;
    use serde_json::{Value, json};

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        FunctionCatalog::with_builtins()
            .call(name, args)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn now_is_rfc3339() {
        let now = call("now", &[]).unwrap();
        let text = now.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok());
    }

    #[test]
    fn format_date_uses_strftime() {
        assert_eq!(
            call("format_date", &[json!("2024-03-05T10:20:30Z"), json!("%Y/%m/%d %H:%M")]).unwrap(),
            json!("2024/03/05 10:20")
        );
        assert_eq!(
            call("format_date", &[json!("2024-03-05"), json!("%d.%m.%Y")]).unwrap(),
            json!("05.03.2024")
        );
        assert!(call("format_date", &[json!("2024-03-05"), json!("%Q")]).is_err());
        assert!(call("format_date", &[json!("yesterday"), json!("%Y")]).is_err());
    }

    #[test]
    fn add_days_crosses_months() {
        assert_eq!(
            call("date_add_days", &[json!("2024-02-28"), json!(2)]).unwrap(),
            json!("2024-03-01T00:00:00Z")
        );
        assert_eq!(
            call("date_add_days", &[json!("2024-03-01T12:00:00+09:00"), json!(-1)]).unwrap(),
            json!("2024-02-29T12:00:00+09:00")
        );
    }
}
