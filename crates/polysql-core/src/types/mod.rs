//! Logical data types.
//!
//! A [`DataType`] names a logical column type with its options. How that type
//! validates, escapes, binds and renders is the job of a [`TypeDescriptor`];
//! each dialect's [`TypeRegistry`] holds exactly one descriptor per
//! [`DataTypeId`], starting from the base set and applying the engine's
//! overrides.

pub(crate) mod base;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::bind::ValueBinder;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::value::SqlValue;

pub use base::descriptor_for;

/// Size variants of TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextLength {
    Tiny,
    Medium,
    Long,
}

/// Options shared by the integer types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegerOptions {
    pub length: Option<u32>,
    pub unsigned: bool,
    pub zerofill: bool,
}

/// Options shared by the decimal types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimalOptions {
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub unsigned: bool,
    pub zerofill: bool,
}

/// A logical column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum DataType {
    String {
        #[serde(default)]
        length: Option<u32>,
        #[serde(default)]
        binary: bool,
    },
    Char {
        #[serde(default)]
        length: Option<u32>,
        #[serde(default)]
        binary: bool,
    },
    Text {
        #[serde(default)]
        length: Option<TextLength>,
    },
    Citext,
    TinyInt(IntegerOptions),
    SmallInt(IntegerOptions),
    MediumInt(IntegerOptions),
    Integer(IntegerOptions),
    BigInt(IntegerOptions),
    Float(DecimalOptions),
    Real(DecimalOptions),
    Double(DecimalOptions),
    Decimal(DecimalOptions),
    Boolean,
    Time {
        #[serde(default)]
        precision: Option<u32>,
    },
    Date {
        #[serde(default)]
        precision: Option<u32>,
    },
    DateOnly,
    Json,
    Jsonb,
    Blob {
        #[serde(default)]
        length: Option<TextLength>,
    },
    Uuid,
    Enum {
        values: Vec<String>,
    },
    Array {
        of: Box<DataType>,
    },
    Range {
        of: Box<DataType>,
    },
    Cidr,
    Inet,
    Macaddr,
    Tsvector,
}

impl DataType {
    #[must_use]
    pub const fn string() -> Self {
        Self::String {
            length: None,
            binary: false,
        }
    }

    #[must_use]
    pub const fn string_len(length: u32) -> Self {
        Self::String {
            length: Some(length),
            binary: false,
        }
    }

    #[must_use]
    pub const fn text() -> Self {
        Self::Text { length: None }
    }

    #[must_use]
    pub const fn integer() -> Self {
        Self::Integer(IntegerOptions {
            length: None,
            unsigned: false,
            zerofill: false,
        })
    }

    #[must_use]
    pub const fn bigint() -> Self {
        Self::BigInt(IntegerOptions {
            length: None,
            unsigned: false,
            zerofill: false,
        })
    }

    #[must_use]
    pub const fn real() -> Self {
        Self::Real(DecimalOptions {
            precision: None,
            scale: None,
            unsigned: false,
            zerofill: false,
        })
    }

    #[must_use]
    pub const fn decimal(precision: u32, scale: u32) -> Self {
        Self::Decimal(DecimalOptions {
            precision: Some(precision),
            scale: Some(scale),
            unsigned: false,
            zerofill: false,
        })
    }

    #[must_use]
    pub const fn date() -> Self {
        Self::Date { precision: None }
    }

    #[must_use]
    pub const fn blob() -> Self {
        Self::Blob { length: None }
    }

    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn array(of: Self) -> Self {
        Self::Array { of: Box::new(of) }
    }

    #[must_use]
    pub fn range(of: Self) -> Self {
        Self::Range { of: Box::new(of) }
    }

    /// Returns the identity of this type.
    #[must_use]
    pub const fn id(&self) -> DataTypeId {
        match self {
            Self::String { .. } => DataTypeId::String,
            Self::Char { .. } => DataTypeId::Char,
            Self::Text { .. } => DataTypeId::Text,
            Self::Citext => DataTypeId::Citext,
            Self::TinyInt(_) => DataTypeId::TinyInt,
            Self::SmallInt(_) => DataTypeId::SmallInt,
            Self::MediumInt(_) => DataTypeId::MediumInt,
            Self::Integer(_) => DataTypeId::Integer,
            Self::BigInt(_) => DataTypeId::BigInt,
            Self::Float(_) => DataTypeId::Float,
            Self::Real(_) => DataTypeId::Real,
            Self::Double(_) => DataTypeId::Double,
            Self::Decimal(_) => DataTypeId::Decimal,
            Self::Boolean => DataTypeId::Boolean,
            Self::Time { .. } => DataTypeId::Time,
            Self::Date { .. } => DataTypeId::Date,
            Self::DateOnly => DataTypeId::DateOnly,
            Self::Json => DataTypeId::Json,
            Self::Jsonb => DataTypeId::Jsonb,
            Self::Blob { .. } => DataTypeId::Blob,
            Self::Uuid => DataTypeId::Uuid,
            Self::Enum { .. } => DataTypeId::Enum,
            Self::Array { .. } => DataTypeId::Array,
            Self::Range { .. } => DataTypeId::Range,
            Self::Cidr => DataTypeId::Cidr,
            Self::Inet => DataTypeId::Inet,
            Self::Macaddr => DataTypeId::Macaddr,
            Self::Tsvector => DataTypeId::Tsvector,
        }
    }

    /// Whether values of this type are compared as text, which decides how
    /// LIKE patterns are built around them.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::String { .. } | Self::Char { .. } | Self::Text { .. } | Self::Citext
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id(), f)
    }
}

/// Identity of a logical type, independent of its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataTypeId {
    String,
    Char,
    Text,
    Citext,
    TinyInt,
    SmallInt,
    MediumInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Decimal,
    Boolean,
    Time,
    Date,
    DateOnly,
    Json,
    Jsonb,
    Blob,
    Uuid,
    Enum,
    Array,
    Range,
    Cidr,
    Inet,
    Macaddr,
    Tsvector,
}

impl DataTypeId {
    /// Every identity, in declaration order.
    pub const ALL: [Self; 28] = [
        Self::String,
        Self::Char,
        Self::Text,
        Self::Citext,
        Self::TinyInt,
        Self::SmallInt,
        Self::MediumInt,
        Self::Integer,
        Self::BigInt,
        Self::Float,
        Self::Real,
        Self::Double,
        Self::Decimal,
        Self::Boolean,
        Self::Time,
        Self::Date,
        Self::DateOnly,
        Self::Json,
        Self::Jsonb,
        Self::Blob,
        Self::Uuid,
        Self::Enum,
        Self::Array,
        Self::Range,
        Self::Cidr,
        Self::Inet,
        Self::Macaddr,
        Self::Tsvector,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Char => "CHAR",
            Self::Text => "TEXT",
            Self::Citext => "CITEXT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::MediumInt => "MEDIUMINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Decimal => "DECIMAL",
            Self::Boolean => "BOOLEAN",
            Self::Time => "TIME",
            Self::Date => "DATE",
            Self::DateOnly => "DATEONLY",
            Self::Json => "JSON",
            Self::Jsonb => "JSONB",
            Self::Blob => "BLOB",
            Self::Uuid => "UUID",
            Self::Enum => "ENUM",
            Self::Array => "ARRAY",
            Self::Range => "RANGE",
            Self::Cidr => "CIDR",
            Self::Inet => "INET",
            Self::Macaddr => "MACADDR",
            Self::Tsvector => "TSVECTOR",
        }
    }
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Behaviour of one logical type on one dialect.
pub trait TypeDescriptor: Send + Sync + fmt::Debug {
    fn id(&self) -> DataTypeId;

    /// Whether NULL goes through this descriptor instead of rendering as a
    /// bare `NULL`.
    fn accepts_null(&self, _dialect: &Dialect) -> bool {
        false
    }

    /// Checks that `value` is acceptable for `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for unacceptable values.
    fn validate(&self, _ty: &DataType, _value: &SqlValue, _dialect: &Dialect) -> Result<()> {
        Ok(())
    }

    /// Converts `value` to the form sent to the driver.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be represented.
    fn to_bindable(
        &self,
        _ty: &DataType,
        value: &SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(value.clone())
    }

    /// Renders `value` as an SQL literal.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be represented.
    fn escape(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<String> {
        escape_bindable(self.id(), &self.to_bindable(ty, value, dialect)?, dialect)
    }

    /// Records `value` in `binder` and returns its placeholder.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be represented.
    fn bind_param_sql(
        &self,
        ty: &DataType,
        value: &SqlValue,
        dialect: &Dialect,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        Ok(binder.collect(self.to_bindable(ty, value, dialect)?))
    }

    /// Renders the column type.
    ///
    /// # Errors
    ///
    /// Fails when the dialect lacks the type or one of its options.
    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String>;

    /// Converts a value read from the database.
    ///
    /// # Errors
    ///
    /// Fails when the raw value is not a valid representation.
    fn parse_database_value(
        &self,
        _ty: &DataType,
        raw: SqlValue,
        _dialect: &Dialect,
    ) -> Result<SqlValue> {
        Ok(raw)
    }

    /// Engine type names this descriptor parses, lowercase.
    fn database_type_names(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Shared literal rendering for already bindable values.
pub(crate) fn escape_bindable(
    id: DataTypeId,
    value: &SqlValue,
    dialect: &Dialect,
) -> Result<String> {
    match value {
        SqlValue::Null => Ok(String::from("NULL")),
        SqlValue::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        SqlValue::Int(n) => Ok(n.to_string()),
        SqlValue::Float(f) => Ok(f.to_string()),
        SqlValue::Text(s) => Ok(dialect.escape_string(s)),
        SqlValue::Blob(bytes) => Ok(dialect.escape_buffer(bytes)),
        other => Err(Error::validation(other, id.name().to_lowercase())),
    }
}

type SqlFn = fn(&DataType, &Dialect) -> Result<String>;
type EscapeFn = fn(&DataType, &SqlValue, &Dialect) -> Result<String>;
type BindableFn = fn(&DataType, &SqlValue, &Dialect) -> Result<SqlValue>;
type ParseFn = fn(&DataType, SqlValue, &Dialect) -> Result<SqlValue>;

/// A base descriptor with some behaviour replaced.
///
/// Engines mostly differ in how a type is spelled and occasionally in how a
/// value is rendered, so an override keeps everything from the base and swaps
/// single functions.
#[derive(Debug)]
pub struct TypeOverride {
    base: Box<dyn TypeDescriptor>,
    to_sql: Option<SqlFn>,
    escape: Option<EscapeFn>,
    to_bindable: Option<BindableFn>,
    parse: Option<ParseFn>,
    names: Option<&'static [&'static str]>,
}

impl TypeOverride {
    #[must_use]
    pub fn new(id: DataTypeId) -> Self {
        Self {
            base: descriptor_for(id),
            to_sql: None,
            escape: None,
            to_bindable: None,
            parse: None,
            names: None,
        }
    }

    /// Overrides only the column type spelling.
    #[must_use]
    pub fn sql(id: DataTypeId, f: SqlFn) -> Self {
        Self::new(id).with_sql(f)
    }

    #[must_use]
    pub fn with_sql(mut self, f: SqlFn) -> Self {
        self.to_sql = Some(f);
        self
    }

    #[must_use]
    pub fn with_escape(mut self, f: EscapeFn) -> Self {
        self.escape = Some(f);
        self
    }

    #[must_use]
    pub fn with_bindable(mut self, f: BindableFn) -> Self {
        self.to_bindable = Some(f);
        self
    }

    #[must_use]
    pub fn with_parse(mut self, f: ParseFn) -> Self {
        self.parse = Some(f);
        self
    }

    #[must_use]
    pub const fn with_names(mut self, names: &'static [&'static str]) -> Self {
        self.names = Some(names);
        self
    }

    #[must_use]
    pub fn boxed(self) -> Box<dyn TypeDescriptor> {
        Box::new(self)
    }
}

impl TypeDescriptor for TypeOverride {
    fn id(&self) -> DataTypeId {
        self.base.id()
    }

    fn accepts_null(&self, dialect: &Dialect) -> bool {
        self.base.accepts_null(dialect)
    }

    fn validate(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<()> {
        self.base.validate(ty, value, dialect)
    }

    fn to_bindable(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
        match self.to_bindable {
            Some(f) => f(ty, value, dialect),
            None => self.base.to_bindable(ty, value, dialect),
        }
    }

    fn escape(&self, ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<String> {
        match (self.escape, self.to_bindable) {
            (Some(f), _) => f(ty, value, dialect),
            (None, Some(f)) => escape_bindable(self.id(), &f(ty, value, dialect)?, dialect),
            (None, None) => self.base.escape(ty, value, dialect),
        }
    }

    fn to_sql(&self, ty: &DataType, dialect: &Dialect) -> Result<String> {
        match self.to_sql {
            Some(f) => f(ty, dialect),
            None => self.base.to_sql(ty, dialect),
        }
    }

    fn parse_database_value(
        &self,
        ty: &DataType,
        raw: SqlValue,
        dialect: &Dialect,
    ) -> Result<SqlValue> {
        match self.parse {
            Some(f) => f(ty, raw, dialect),
            None => self.base.parse_database_value(ty, raw, dialect),
        }
    }

    fn database_type_names(&self) -> &'static [&'static str] {
        self.names.unwrap_or_else(|| self.base.database_type_names())
    }
}

/// One descriptor per type identity for a dialect.
pub struct TypeRegistry {
    descriptors: Vec<Box<dyn TypeDescriptor>>,
    parsers: OnceLock<HashMap<String, DataTypeId>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("descriptors", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

impl TypeRegistry {
    /// Builds the registry from the base descriptors and `overrides`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDataType`] when two overrides share an
    /// identity.
    pub fn build(dialect: &str, overrides: Vec<Box<dyn TypeDescriptor>>) -> Result<Self> {
        let mut descriptors: Vec<Box<dyn TypeDescriptor>> =
            DataTypeId::ALL.into_iter().map(descriptor_for).collect();
        let mut seen = HashSet::new();

        for descriptor in overrides {
            let id = descriptor.id();
            if !seen.insert(id) {
                return Err(Error::DuplicateDataType {
                    dialect: dialect.to_string(),
                    id: id.to_string(),
                });
            }
            descriptors[id as usize] = descriptor;
        }

        Ok(Self {
            descriptors,
            parsers: OnceLock::new(),
        })
    }

    /// Returns the descriptor for an identity.
    #[must_use]
    pub fn resolve(&self, id: DataTypeId) -> &dyn TypeDescriptor {
        self.descriptors[id as usize].as_ref()
    }

    /// Returns the descriptor for a type.
    #[must_use]
    pub fn descriptor(&self, ty: &DataType) -> &dyn TypeDescriptor {
        self.resolve(ty.id())
    }

    /// Finds the descriptor parsing values of an engine type such as
    /// `int4` or `character varying`.
    #[must_use]
    pub fn parser_for(&self, db_type: &str) -> Option<&dyn TypeDescriptor> {
        let parsers = self.parsers.get_or_init(|| {
            let mut map = HashMap::new();
            for descriptor in &self.descriptors {
                for name in descriptor.database_type_names() {
                    map.entry((*name).to_string()).or_insert_with(|| descriptor.id());
                }
            }
            map
        });
        parsers
            .get(&db_type.trim().to_lowercase())
            .map(|id| self.resolve(*id))
    }
}

/// Largest integer exactly representable as an `f64`.
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Picks a type for a value that comes without one.
///
/// # Errors
///
/// Fails for an empty array, whose element type cannot be guessed.
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn best_guess_type(value: &SqlValue, dialect: &Dialect) -> Result<DataType> {
    Ok(match value {
        SqlValue::Int(n) if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(n) => {
            DataType::integer()
        }
        SqlValue::Int(_) => DataType::bigint(),
        SqlValue::Float(f)
            if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER as f64 =>
        {
            DataType::integer()
        }
        SqlValue::Float(_) => DataType::real(),
        SqlValue::Bool(_) => DataType::Boolean,
        SqlValue::Blob(_) if dialect.supports().data_types.blob_as_text => DataType::string(),
        SqlValue::Blob(_) => DataType::blob(),
        SqlValue::Array(items) => {
            let first = items.first().ok_or_else(|| {
                Error::invalid("cannot guess the type of an empty array, provide a type explicitly")
            })?;
            DataType::array(best_guess_type(first, dialect)?)
        }
        SqlValue::Timestamp(_) => DataType::Date { precision: Some(3) },
        SqlValue::Date(_) => DataType::DateOnly,
        SqlValue::Time(_) => DataType::Time { precision: None },
        SqlValue::Json(_) => DataType::Json,
        SqlValue::Null | SqlValue::Text(_) => DataType::text(),
    })
}
