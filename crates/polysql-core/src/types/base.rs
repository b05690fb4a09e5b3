//! Base descriptors shared by every dialect.

use std::net::IpAddr;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;

use super::{
    escape_bindable, DataType, DataTypeId, DecimalOptions, IntegerOptions, TextLength,
    TypeDescriptor,
};
use crate::config::NullJsonStringification;
use crate::dialect::supports::DecimalSupport;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::value::SqlValue;

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid pattern")
});
static MACADDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:[0-9a-f]{2}(?::[0-9a-f]{2}){5}|[0-9a-f]{2}(?:-[0-9a-f]{2}){5}|[0-9a-f]{12})$",
    )
    .expect("valid pattern")
});

/// Returns the base descriptor of an identity.
#[must_use]
pub fn descriptor_for(id: DataTypeId) -> Box<dyn TypeDescriptor> {
    match id {
        DataTypeId::String
        | DataTypeId::Char
        | DataTypeId::Text
        | DataTypeId::Citext
        | DataTypeId::Cidr
        | DataTypeId::Inet
        | DataTypeId::Macaddr
        | DataTypeId::Tsvector => Box::new(Textual { id }),
        DataTypeId::TinyInt
        | DataTypeId::SmallInt
        | DataTypeId::MediumInt
        | DataTypeId::Integer
        | DataTypeId::BigInt => Box::new(Integer { id }),
        DataTypeId::Float | DataTypeId::Real | DataTypeId::Double | DataTypeId::Decimal => {
            Box::new(Decimal { id })
        }
        DataTypeId::Boolean => Box::new(Boolean),
        DataTypeId::Time => Box::new(Time),
        DataTypeId::Date => Box::new(Timestamp),
        DataTypeId::DateOnly => Box::new(DateOnly),
        DataTypeId::Json | DataTypeId::Jsonb => Box::new(Json { id }),
        DataTypeId::Blob => Box::new(Blob),
        DataTypeId::Uuid => Box::new(Uuid),
        DataTypeId::Enum => Box::new(Enum),
        DataTypeId::Array => Box::new(Array),
        DataTypeId::Range => Box::new(Range),
    }
}

fn invalid_value(value: &SqlValue, id: DataTypeId) -> Error {
    Error::validation(value, id.name().to_lowercase())
}

fn require(flag: bool, dialect: &Dialect, id: DataTypeId) -> Result<()> {
    if flag {
        Ok(())
    } else {
        Err(dialect.unsupported(id.name()))
    }
}

// ============================================================================
// Text
// ============================================================================

#[derive(Debug)]
struct Textual {
    id: DataTypeId,
}

impl TypeDescriptor for Textual {
    fn id(&self) -> DataTypeId {
        self.id
    }

    fn validate(&self, ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<()> {
        let ok = match (self.id, value) {
            (DataTypeId::Inet, SqlValue::Text(s)) => s.parse::<IpAddr>().is_ok(),
            (DataTypeId::Cidr, SqlValue::Text(s)) => is_cidr(s),
            (DataTypeId::Macaddr, SqlValue::Text(s)) => MACADDR.is_match(s),
            (_, SqlValue::Text(_)) => true,
            (_, SqlValue::Blob(_)) => matches!(
                ty,
                DataType::String { binary: true, .. } | DataType::Char { binary: true, .. }
            ),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(invalid_value(value, self.id))
        }
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        let types = &dialect.supports().data_types;
        Ok(match ty {
            DataType::String { length, binary } => {
                let mut sql = format!("VARCHAR({})", length.unwrap_or(255));
                if *binary {
                    sql.push_str(" BINARY");
                }
                sql
            }
            DataType::Char { length, binary } => {
                let mut sql = format!("CHAR({})", length.unwrap_or(255));
                if *binary {
                    sql.push_str(" BINARY");
                }
                sql
            }
            DataType::Text { length } => match length {
                None => "TEXT",
                Some(TextLength::Tiny) => "TINYTEXT",
                Some(TextLength::Medium) => "MEDIUMTEXT",
                Some(TextLength::Long) => "LONGTEXT",
            }
            .to_string(),
            DataType::Citext => {
                require(types.citext, dialect, self.id)?;
                "CITEXT".to_string()
            }
            DataType::Tsvector => {
                require(types.tsvector, dialect, self.id)?;
                "TSVECTOR".to_string()
            }
            _ => {
                require(types.network, dialect, self.id)?;
                self.id.name().to_string()
            }
        })
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        match self.id {
            DataTypeId::String => &["varchar", "character varying", "nvarchar"],
            DataTypeId::Char => &["char", "character", "bpchar", "nchar"],
            DataTypeId::Text => &["text", "tinytext", "mediumtext", "longtext", "clob", "ntext"],
            DataTypeId::Citext => &["citext"],
            DataTypeId::Cidr => &["cidr"],
            DataTypeId::Inet => &["inet"],
            DataTypeId::Macaddr => &["macaddr"],
            _ => &["tsvector"],
        }
    }
}

fn is_cidr(s: &str) -> bool {
    let Some((ip, prefix)) = s.split_once('/') else {
        return false;
    };
    let Ok(ip) = ip.parse::<IpAddr>() else {
        return false;
    };
    let max = if ip.is_ipv4() { 32 } else { 128 };
    prefix.parse::<u8>().is_ok_and(|p| p <= max)
}

// ============================================================================
// Integers
// ============================================================================

#[derive(Debug)]
struct Integer {
    id: DataTypeId,
}

pub(crate) fn integer_options(ty: &DataType) -> IntegerOptions {
    match ty {
        DataType::TinyInt(o)
        | DataType::SmallInt(o)
        | DataType::MediumInt(o)
        | DataType::Integer(o)
        | DataType::BigInt(o) => *o,
        _ => IntegerOptions::default(),
    }
}

/// Renders an integer type name with its width, UNSIGNED and ZEROFILL.
pub(crate) fn integer_sql(
    name: &str,
    options: IntegerOptions,
    dialect: &Dialect,
) -> Result<String> {
    let ints = dialect.supports().data_types.ints;
    let mut sql = name.to_string();

    if let Some(length) = options.length {
        if ints.length {
            sql.push_str(&format!("({length})"));
        } else {
            dialect.warn_once(&format!(
                "{} does not support {name} with a display width, the length option is ignored",
                dialect.name()
            ));
        }
    }
    if options.unsigned {
        if ints.unsigned {
            sql.push_str(" UNSIGNED");
        } else {
            dialect.warn_once(&format!(
                "{} does not support unsigned {name}, the unsigned option is ignored",
                dialect.name()
            ));
        }
    }
    if options.zerofill {
        if !ints.zerofill {
            return Err(dialect.unsupported(format!("{name} ZEROFILL")));
        }
        sql.push_str(" ZEROFILL");
    }
    Ok(sql)
}

fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[allow(clippy::float_cmp)]
impl TypeDescriptor for Integer {
    fn id(&self) -> DataTypeId {
        self.id
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<()> {
        let ok = match value {
            SqlValue::Int(_) => true,
            SqlValue::Float(f) => f.is_finite() && f.fract() == 0.0,
            SqlValue::Text(s) => is_integer_text(s),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(invalid_value(value, self.id))
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_bindable(
        &self,
        _ty: &DataType,
        value: &SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match value {
            SqlValue::Float(f) if f.is_finite() && f.fract() == 0.0 => SqlValue::Int(*f as i64),
            SqlValue::Text(s) => s
                .parse::<i64>()
                .map_or_else(|_| value.clone(), SqlValue::Int),
            _ => value.clone(),
        })
    }

    fn escape(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<String> {
        match self.to_bindable(ty, value, dialect)? {
            // integers wider than i64 stay textual but are still numeric
            SqlValue::Text(s) if is_integer_text(&s) => Ok(s),
            other => escape_bindable(self.id, &other, dialect),
        }
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        integer_sql(self.id.name(), integer_options(ty), dialect)
    }

    fn parse_database_value(
        &self,
        ty: &DataType,
        raw: SqlValue,
        dialect: &Dialect,
    ) -> Result<SqlValue> {
        self.to_bindable(ty, &raw, dialect)
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        match self.id {
            DataTypeId::TinyInt => &["tinyint"],
            DataTypeId::SmallInt => &["smallint", "int2"],
            DataTypeId::MediumInt => &["mediumint"],
            DataTypeId::Integer => &["integer", "int", "int4"],
            _ => &["bigint", "int8"],
        }
    }
}

// ============================================================================
// Decimals
// ============================================================================

#[derive(Debug)]
struct Decimal {
    id: DataTypeId,
}

pub(crate) fn decimal_options(ty: &DataType) -> DecimalOptions {
    match ty {
        DataType::Float(o) | DataType::Real(o) | DataType::Double(o) | DataType::Decimal(o) => *o,
        _ => DecimalOptions::default(),
    }
}

fn decimal_support(dialect: &Dialect, id: DataTypeId) -> DecimalSupport {
    let types = &dialect.supports().data_types;
    match id {
        DataTypeId::Float => types.float,
        DataTypeId::Real => types.real,
        DataTypeId::Double => types.double,
        _ => types.decimal,
    }
}

/// Renders a decimal type name with precision, scale, UNSIGNED and ZEROFILL.
pub(crate) fn decimal_sql(
    name: &str,
    id: DataTypeId,
    options: DecimalOptions,
    dialect: &Dialect,
) -> Result<String> {
    let support = decimal_support(dialect, id);
    let mut sql = name.to_string();

    match (options.precision, options.scale) {
        (Some(precision), Some(scale)) => {
            if support.scale_and_precision || id == DataTypeId::Decimal {
                sql.push_str(&format!("({precision}, {scale})"));
            } else {
                dialect.warn_once(&format!(
                    "{} does not support {name} with scale or precision, those options are ignored",
                    dialect.name()
                ));
            }
        }
        (None, None) => {}
        _ => {
            return Err(Error::invalid(format!(
                "{name} requires both precision and scale, or neither"
            )));
        }
    }
    if options.unsigned {
        if support.unsigned {
            sql.push_str(" UNSIGNED");
        } else {
            dialect.warn_once(&format!(
                "{} does not support unsigned {name}, the unsigned option is ignored",
                dialect.name()
            ));
        }
    }
    if options.zerofill {
        if !support.zerofill {
            return Err(dialect.unsupported(format!("{name} ZEROFILL")));
        }
        sql.push_str(" ZEROFILL");
    }
    Ok(sql)
}

/// Parses numeric text, accepting every spelling `f64` knows for NaN and the
/// infinities (`nan`, `inf`, `-Infinity`, `1e999`).
fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

fn special_text(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

impl Decimal {
    fn check_special(&self, f: f64, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        let support = decimal_support(dialect, self.id);
        let allowed = if f.is_nan() {
            support.nan
        } else if f.is_infinite() {
            support.infinity
        } else {
            true
        };
        if allowed {
            Ok(())
        } else {
            Err(invalid_value(value, self.id))
        }
    }
}

impl TypeDescriptor for Decimal {
    fn id(&self) -> DataTypeId {
        self.id
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        match value {
            SqlValue::Int(_) => Ok(()),
            SqlValue::Float(f) => self.check_special(*f, value, dialect),
            SqlValue::Text(s) => match parse_float(s) {
                Some(f) => self.check_special(f, value, dialect),
                None => Err(invalid_value(value, self.id)),
            },
            _ => Err(invalid_value(value, self.id)),
        }
    }

    fn to_bindable(
        &self,
        _ty: &DataType,
        value: &SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match value {
            SqlValue::Float(f) if !f.is_finite() => SqlValue::Text(special_text(*f).to_string()),
            SqlValue::Text(s) => match parse_float(s) {
                Some(f) if !f.is_finite() => SqlValue::Text(special_text(f).to_string()),
                Some(f) if self.id != DataTypeId::Decimal => SqlValue::Float(f),
                _ => value.clone(),
            },
            _ => value.clone(),
        })
    }

    fn escape(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<String> {
        let bindable = self.to_bindable(ty, value, dialect)?;
        if let SqlValue::Text(s) = &bindable {
            match parse_float(s) {
                Some(f) if f.is_finite() => return Ok(s.trim().to_string()),
                // gated here as well, validation may be switched off
                Some(f) => {
                    self.check_special(f, value, dialect)?;
                    return Ok(dialect.escape_string(special_text(f)));
                }
                None => {}
            }
        }
        escape_bindable(self.id, &bindable, dialect)
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        let name = match self.id {
            DataTypeId::Double => "DOUBLE PRECISION",
            other => other.name(),
        };
        decimal_sql(name, self.id, decimal_options(ty), dialect)
    }

    fn parse_database_value(
        &self,
        _ty: &DataType,
        raw: SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match raw {
            SqlValue::Text(s) => match parse_float(&s) {
                Some(f) if !f.is_finite() => SqlValue::Float(f),
                // DECIMAL keeps its exact textual form
                _ if self.id == DataTypeId::Decimal => SqlValue::Text(s),
                Some(f) => SqlValue::Float(f),
                None => SqlValue::Text(s),
            },
            other => other,
        })
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        match self.id {
            DataTypeId::Float => &["float", "float4"],
            DataTypeId::Real => &["real"],
            DataTypeId::Double => &["double", "double precision", "float8"],
            _ => &["decimal", "numeric"],
        }
    }
}

// ============================================================================
// Boolean
// ============================================================================

#[derive(Debug)]
struct Boolean;

impl TypeDescriptor for Boolean {
    fn id(&self) -> DataTypeId {
        DataTypeId::Boolean
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<()> {
        match value {
            SqlValue::Bool(_) => Ok(()),
            _ => Err(invalid_value(value, DataTypeId::Boolean)),
        }
    }

    fn to_bindable(
        &self,
        _ty: &DataType,
        value: &SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        parse_boolean(value).map(SqlValue::Bool)
    }

    fn to_sql(&self, _ty: &DataType, _dialect: &Dialect) -> Result<String> {
        Ok(String::from("BOOLEAN"))
    }

    fn parse_database_value(
        &self,
        _ty: &DataType,
        raw: SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        if raw.is_null() {
            return Ok(raw);
        }
        parse_boolean(&raw).map(SqlValue::Bool)
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &["boolean", "bool", "bit"]
    }
}

/// Reads the boolean spellings engines hand back.
pub(crate) fn parse_boolean(value: &SqlValue) -> Result<bool> {
    match value {
        SqlValue::Bool(b) => Ok(*b),
        SqlValue::Int(1) => Ok(true),
        SqlValue::Int(0) => Ok(false),
        SqlValue::Blob(bytes) if bytes.len() == 1 && bytes[0] <= 1 => Ok(bytes[0] == 1),
        SqlValue::Text(s) => match s.as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(invalid_value(value, DataTypeId::Boolean)),
        },
        _ => Err(invalid_value(value, DataTypeId::Boolean)),
    }
}

// ============================================================================
// Temporal
// ============================================================================

/// Parses the timestamp spellings accepted on input and returned by engines.
/// Strings without an offset are read as UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t);
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f %:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
    ] {
        if let Ok(t) = DateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&t).fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)).fixed_offset())
}

fn is_infinity(s: &str) -> bool {
    matches!(s, "infinity" | "-infinity")
}

/// Converts a temporal value to the configured timezone.
pub(crate) fn to_timestamp(value: &SqlValue, dialect: &Dialect) -> Result<DateTime<FixedOffset>> {
    let tz = dialect.timezone();
    match value {
        SqlValue::Timestamp(t) => Ok(t.with_timezone(&tz)),
        SqlValue::Date(d) => tz
            .from_local_datetime(&d.and_time(NaiveTime::MIN))
            .single()
            .ok_or_else(|| invalid_value(value, DataTypeId::Date)),
        SqlValue::Text(s) => parse_timestamp(s)
            .map(|t| t.with_timezone(&tz))
            .ok_or_else(|| invalid_value(value, DataTypeId::Date)),
        _ => Err(invalid_value(value, DataTypeId::Date)),
    }
}

/// Renders a timestamp as `YYYY-MM-DD HH:MM:SS.sss`, optionally followed by
/// its offset.
pub(crate) fn format_timestamp(
    value: &SqlValue,
    dialect: &Dialect,
    with_offset: bool,
) -> Result<SqlValue> {
    if let SqlValue::Text(s) = value {
        if is_infinity(s) {
            return Ok(value.clone());
        }
    }
    let t = to_timestamp(value, dialect)?;
    let format = if with_offset {
        "%Y-%m-%d %H:%M:%S%.3f %:z"
    } else {
        "%Y-%m-%d %H:%M:%S%.3f"
    };
    Ok(SqlValue::Text(t.format(format).to_string()))
}

#[derive(Debug)]
struct Timestamp;

impl TypeDescriptor for Timestamp {
    fn id(&self) -> DataTypeId {
        DataTypeId::Date
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        match value {
            SqlValue::Text(s) if is_infinity(s) => {
                require(dialect.supports().data_types.datetime_infinity, dialect, DataTypeId::Date)
                    .map_err(|_| invalid_value(value, DataTypeId::Date))
            }
            _ => to_timestamp(value, dialect).map(|_| ()),
        }
    }

    fn to_bindable(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
        format_timestamp(value, dialect, true)
    }

    fn to_sql(&self, ty: &DataType, _dialect: &Dialect) -> Result<String> {
        Ok(match ty {
            DataType::Date {
                precision: Some(p),
            } => format!("DATETIME({p})"),
            _ => String::from("DATETIME"),
        })
    }

    fn parse_database_value(
        &self,
        _ty: &DataType,
        raw: SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match raw {
            SqlValue::Text(s) if !is_infinity(&s) => {
                parse_timestamp(&s).map_or(SqlValue::Text(s), SqlValue::Timestamp)
            }
            other => other,
        })
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &[
            "datetime",
            "timestamp",
            "timestamptz",
            "timestamp with time zone",
            "datetimeoffset",
            "datetime2",
        ]
    }
}

#[derive(Debug)]
struct DateOnly;

fn to_date(value: &SqlValue, dialect: &Dialect) -> Result<NaiveDate> {
    match value {
        SqlValue::Date(d) => Ok(*d),
        SqlValue::Timestamp(t) => Ok(t.with_timezone(&dialect.timezone()).date_naive()),
        SqlValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| invalid_value(value, DataTypeId::DateOnly)),
        _ => Err(invalid_value(value, DataTypeId::DateOnly)),
    }
}

impl TypeDescriptor for DateOnly {
    fn id(&self) -> DataTypeId {
        DataTypeId::DateOnly
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        match value {
            SqlValue::Text(s)
                if is_infinity(s) && dialect.supports().data_types.datetime_infinity =>
            {
                Ok(())
            }
            _ => to_date(value, dialect).map(|_| ()),
        }
    }

    fn to_bindable(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
        match value {
            SqlValue::Text(s) if is_infinity(s) => Ok(value.clone()),
            _ => Ok(SqlValue::Text(to_date(value, dialect)?.format("%Y-%m-%d").to_string())),
        }
    }

    fn to_sql(&self, _ty: &DataType, _dialect: &Dialect) -> Result<String> {
        Ok(String::from("DATE"))
    }

    fn parse_database_value(
        &self,
        _ty: &DataType,
        raw: SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match raw {
            SqlValue::Text(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_or(SqlValue::Text(s), SqlValue::Date),
            other => other,
        })
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &["date"]
    }
}

#[derive(Debug)]
struct Time;

fn to_time(value: &SqlValue, dialect: &Dialect) -> Result<NaiveTime> {
    match value {
        SqlValue::Time(t) => Ok(*t),
        SqlValue::Timestamp(t) => Ok(t.with_timezone(&dialect.timezone()).time()),
        SqlValue::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
            .map_err(|_| invalid_value(value, DataTypeId::Time)),
        _ => Err(invalid_value(value, DataTypeId::Time)),
    }
}

impl TypeDescriptor for Time {
    fn id(&self) -> DataTypeId {
        DataTypeId::Time
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        to_time(value, dialect).map(|_| ())
    }

    fn to_bindable(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
        Ok(SqlValue::Text(to_time(value, dialect)?.format("%H:%M:%S%.f").to_string()))
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        match ty {
            DataType::Time {
                precision: Some(p),
            } => {
                if dialect.supports().data_types.time_precision {
                    Ok(format!("TIME({p})"))
                } else {
                    dialect.warn_once(&format!(
                        "{} does not support TIME with precision, the precision option is ignored",
                        dialect.name()
                    ));
                    Ok(String::from("TIME"))
                }
            }
            _ => Ok(String::from("TIME")),
        }
    }

    fn parse_database_value(
        &self,
        _ty: &DataType,
        raw: SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match raw {
            SqlValue::Text(s) => NaiveTime::parse_from_str(&s, "%H:%M:%S%.f")
                .map_or(SqlValue::Text(s), SqlValue::Time),
            other => other,
        })
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &["time", "time without time zone"]
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Debug)]
struct Json {
    id: DataTypeId,
}

impl TypeDescriptor for Json {
    fn id(&self) -> DataTypeId {
        self.id
    }

    fn accepts_null(&self, dialect: &Dialect) -> bool {
        dialect.options().null_json_stringification != NullJsonStringification::Sql
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        if value.is_null()
            && dialect.options().null_json_stringification == NullJsonStringification::Explicit
        {
            return Err(Error::validation(
                value,
                "json value: with nullJsonStringification set to explicit, use a JSON null or SQL NULL expression",
            ));
        }
        Ok(())
    }

    fn to_bindable(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
        self.validate(ty, value, dialect)?;
        Ok(match value {
            SqlValue::Null if !self.accepts_null(dialect) => SqlValue::Null,
            other => SqlValue::Text(other.to_json().to_string()),
        })
    }

    fn to_sql(&self, _ty: &DataType, dialect: &Dialect) -> Result<String> {
        let types = &dialect.supports().data_types;
        let supported = if self.id == DataTypeId::Jsonb { types.jsonb } else { types.json };
        require(supported, dialect, self.id)?;
        Ok(self.id.name().to_string())
    }

    fn parse_database_value(
        &self,
        _ty: &DataType,
        raw: SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match raw {
            SqlValue::Text(s) => serde_json::from_str(&s).map_or(SqlValue::Text(s), SqlValue::Json),
            other => other,
        })
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        if self.id == DataTypeId::Jsonb {
            &["jsonb"]
        } else {
            &["json"]
        }
    }
}

// ============================================================================
// Binary, UUID, ENUM
// ============================================================================

#[derive(Debug)]
struct Blob;

impl TypeDescriptor for Blob {
    fn id(&self) -> DataTypeId {
        DataTypeId::Blob
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<()> {
        match value {
            SqlValue::Blob(_) | SqlValue::Text(_) => Ok(()),
            _ => Err(invalid_value(value, DataTypeId::Blob)),
        }
    }

    fn to_bindable(
        &self,
        _ty: &DataType,
        value: &SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(match value {
            SqlValue::Text(s) => SqlValue::Blob(s.as_bytes().to_vec()),
            other => other.clone(),
        })
    }

    fn to_sql(&self, ty: &DataType, _dialect: &Dialect) -> Result<String> {
        Ok(match ty {
            DataType::Blob {
                length: Some(TextLength::Tiny),
            } => "TINYBLOB",
            DataType::Blob {
                length: Some(TextLength::Medium),
            } => "MEDIUMBLOB",
            DataType::Blob {
                length: Some(TextLength::Long),
            } => "LONGBLOB",
            _ => "BLOB",
        }
        .to_string())
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &["blob", "bytea", "varbinary", "longblob", "mediumblob", "tinyblob"]
    }
}

#[derive(Debug)]
struct Uuid;

impl TypeDescriptor for Uuid {
    fn id(&self) -> DataTypeId {
        DataTypeId::Uuid
    }

    fn validate(&self, _ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<()> {
        match value {
            SqlValue::Text(s) if UUID.is_match(s) => Ok(()),
            _ => Err(invalid_value(value, DataTypeId::Uuid)),
        }
    }

    fn to_sql(&self, _ty: &DataType, _dialect: &Dialect) -> Result<String> {
        Ok(String::from("UUID"))
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &["uuid", "uniqueidentifier"]
    }
}

#[derive(Debug)]
struct Enum;

fn enum_values(ty: &DataType) -> Result<&[String]> {
    match ty {
        DataType::Enum { values } if !values.is_empty() => Ok(values),
        _ => Err(Error::invalid("ENUM requires at least one value")),
    }
}

impl TypeDescriptor for Enum {
    fn id(&self) -> DataTypeId {
        DataTypeId::Enum
    }

    fn validate(&self, ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<()> {
        let values = enum_values(ty)?;
        match value {
            SqlValue::Text(s) if values.contains(s) => Ok(()),
            _ => Err(Error::validation(
                value,
                format!("choice, expected one of {}", values.join(", ")),
            )),
        }
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        let values = enum_values(ty)?;
        if dialect.supports().data_types.enums {
            let members: Vec<String> = values.iter().map(|v| dialect.escape_string(v)).collect();
            Ok(format!("ENUM({})", members.join(", ")))
        } else {
            Ok(String::from("VARCHAR(255)"))
        }
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &["enum"]
    }
}

// ============================================================================
// ARRAY and RANGE
// ============================================================================

fn inner_type(ty: &DataType) -> Result<&DataType> {
    match ty {
        DataType::Array { of } | DataType::Range { of } => Ok(of),
        _ => Err(Error::invalid(format!("{ty} has no element type"))),
    }
}

#[derive(Debug)]
struct Array;

impl TypeDescriptor for Array {
    fn id(&self) -> DataTypeId {
        DataTypeId::Array
    }

    fn validate(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        let inner = inner_type(ty)?;
        let descriptor = dialect.types().descriptor(inner);
        match value {
            SqlValue::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .try_for_each(|item| descriptor.validate(inner, item, dialect)),
            _ => Err(invalid_value(value, DataTypeId::Array)),
        }
    }

    fn to_bindable(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
        let inner = inner_type(ty)?;
        let descriptor = dialect.types().descriptor(inner);
        match value {
            SqlValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    SqlValue::Null => Ok(SqlValue::Null),
                    _ => descriptor.to_bindable(inner, item, dialect),
                })
                .collect::<Result<Vec<_>>>()
                .map(SqlValue::Array),
            _ => Err(invalid_value(value, DataTypeId::Array)),
        }
    }

    fn escape(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<String> {
        let inner = inner_type(ty)?;
        let descriptor = dialect.types().descriptor(inner);
        let SqlValue::Array(items) = value else {
            return Err(invalid_value(value, DataTypeId::Array));
        };
        let escaped = items
            .iter()
            .map(|item| match item {
                SqlValue::Null => Ok(String::from("NULL")),
                _ => descriptor.escape(inner, item, dialect),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "ARRAY[{}]::{}",
            escaped.join(","),
            self.to_sql(ty, dialect)?
        ))
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        require(dialect.supports().data_types.array, dialect, DataTypeId::Array)?;
        let inner = inner_type(ty)?;
        Ok(format!("{}[]", dialect.type_to_sql(inner)?))
    }

    fn parse_database_value(
        &self,
        ty: &DataType,
        raw: SqlValue,
        dialect: &Dialect,
    ) -> Result<SqlValue> {
        let inner = inner_type(ty)?;
        let descriptor = dialect.types().descriptor(inner);
        let items = match raw {
            SqlValue::Array(items) => items,
            SqlValue::Text(s) if s.starts_with('{') && s.ends_with('}') => {
                let body = &s[1..s.len() - 1];
                if body.is_empty() {
                    Vec::new()
                } else {
                    body.split(',')
                        .map(|part| match part.trim() {
                            "NULL" => SqlValue::Null,
                            text => SqlValue::Text(text.trim_matches('"').to_string()),
                        })
                        .collect()
                }
            }
            other => return Ok(other),
        };
        items
            .into_iter()
            .map(|item| match item {
                SqlValue::Null => Ok(SqlValue::Null),
                _ => descriptor.parse_database_value(inner, item, dialect),
            })
            .collect::<Result<Vec<_>>>()
            .map(SqlValue::Array)
    }
}

#[derive(Debug)]
struct Range;

/// Quotes a range bound when it contains characters with meaning in range
/// literals.
fn range_bound(value: &SqlValue) -> String {
    let text = match value {
        SqlValue::Null => return String::new(),
        SqlValue::Text(s) => s.clone(),
        other => other.to_json().to_string(),
    };
    if text.contains(|c: char| c.is_whitespace() || "\",()[]\\".contains(c)) {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text
    }
}

impl TypeDescriptor for Range {
    fn id(&self) -> DataTypeId {
        DataTypeId::Range
    }

    fn validate(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        let inner = inner_type(ty)?;
        let descriptor = dialect.types().descriptor(inner);
        match value {
            SqlValue::Array(bounds) if bounds.is_empty() || bounds.len() == 2 => bounds
                .iter()
                .filter(|b| !b.is_null())
                .try_for_each(|b| descriptor.validate(inner, b, dialect)),
            _ => Err(invalid_value(value, DataTypeId::Range)),
        }
    }

    fn to_bindable(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
        let inner = inner_type(ty)?;
        let descriptor = dialect.types().descriptor(inner);
        match value {
            SqlValue::Array(bounds) if bounds.is_empty() => Ok(SqlValue::Text("empty".into())),
            SqlValue::Array(bounds) if bounds.len() == 2 => {
                let rendered = bounds
                    .iter()
                    .map(|b| match b {
                        SqlValue::Null => Ok(String::new()),
                        _ => descriptor.to_bindable(inner, b, dialect).map(|v| range_bound(&v)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(SqlValue::Text(format!("[{},{})", rendered[0], rendered[1])))
            }
            _ => Err(invalid_value(value, DataTypeId::Range)),
        }
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        require(dialect.supports().data_types.range, dialect, DataTypeId::Range)?;
        let inner = inner_type(ty)?;
        let name = match inner.id() {
            DataTypeId::Integer => "INT4RANGE",
            DataTypeId::BigInt => "INT8RANGE",
            DataTypeId::Decimal => "NUMRANGE",
            DataTypeId::Date => "TSTZRANGE",
            DataTypeId::DateOnly => "DATERANGE",
            other => return Err(dialect.unsupported(format!("RANGE of {other}"))),
        };
        Ok(name.to_string())
    }

    fn parse_database_value(
        &self,
        ty: &DataType,
        raw: SqlValue,
        dialect: &Dialect,
    ) -> Result<SqlValue> {
        let inner = inner_type(ty)?;
        let descriptor = dialect.types().descriptor(inner);
        let SqlValue::Text(s) = raw else {
            return Ok(raw);
        };
        if s == "empty" {
            return Ok(SqlValue::Array(Vec::new()));
        }
        if s.len() < 2 {
            return Ok(SqlValue::Text(s));
        }
        let body = &s[1..s.len() - 1];
        let Some((lower, upper)) = body.split_once(',') else {
            return Ok(SqlValue::Text(s));
        };
        let parse = |bound: &str| -> Result<SqlValue> {
            let bound = bound.trim().trim_matches('"');
            if bound.is_empty() {
                Ok(SqlValue::Null)
            } else {
                descriptor.parse_database_value(inner, SqlValue::Text(bound.to_string()), dialect)
            }
        };
        Ok(SqlValue::Array(vec![parse(lower)?, parse(upper)?]))
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        &["int4range", "int8range", "numrange", "tstzrange", "daterange"]
    }
}
