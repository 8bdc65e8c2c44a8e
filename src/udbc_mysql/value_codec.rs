use crate::udbc::value::Value;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use mysql_async::Value as MyValue;
use rust_decimal::Decimal;

pub fn from_mysql_value(v: &MyValue) -> Value {
    match v {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::I64(*i),
        MyValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Value::I64(i),
            Err(_) => Value::Decimal(Decimal::from(*u)),
        },
        MyValue::Float(f) => Value::F64(*f as f64),
        MyValue::Double(d) => Value::F64(*d),
        MyValue::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::Str(s.to_string()),
            Err(_) => Value::Bytes(b.clone()),
        },
        MyValue::Date(y, m, d, h, min, s, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(*y as i32, *m as u32, *d as u32) else {
                // zero dates such as 0000-00-00
                return Value::Null;
            };
            if *h == 0 && *min == 0 && *s == 0 && *micro == 0 {
                Value::Date(date)
            } else {
                date.and_hms_micro_opt(*h as u32, *min as u32, *s as u32, *micro)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Date(date))
            }
        }
        MyValue::Time(is_neg, days, h, min, s, micro) => {
            let total_h = *days * 24 + (*h as u32);
            match NaiveTime::from_hms_micro_opt(total_h, *min as u32, *s as u32, *micro) {
                Some(t) if !*is_neg => Value::Time(t),
                // out-of-day or negative intervals have no NaiveTime form
                _ => Value::Str(format!(
                    "{}{}:{:02}:{:02}",
                    if *is_neg { "-" } else { "" },
                    total_h,
                    min,
                    s
                )),
            }
        }
    }
}

pub fn to_mysql_value(v: &Value) -> MyValue {
    match v {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(*b as i64),
        Value::I64(i) => MyValue::Int(*i),
        Value::F64(f) => MyValue::Double(*f),
        Value::Str(s) => MyValue::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Date(d) => MyValue::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        Value::Time(t) => MyValue::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => MyValue::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1000,
        ),
        Value::DateTimeUtc(dt) => to_mysql_value(&Value::DateTime(dt.naive_utc())),
        Value::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
    }
}
