//! Capability matrices.
//!
//! Every engine describes what it can do as a plain constant built over
//! [`CapabilityMatrix::BASE`] with struct-update syntax. Nothing here has
//! behaviour; the generator reads the flags and picks a statement shape.

use serde::Serialize;

/// How a dialect reports rows written by INSERT/UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturnValues {
    /// No support.
    None,
    /// Trailing `RETURNING ...` clause.
    Returning,
    /// `OUTPUT INSERTED.*` clause placed before `VALUES`.
    Output,
}

/// Pagination fragment family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Pagination {
    /// ` LIMIT n OFFSET m`.
    LimitOffset,
    /// ` LIMIT m, n`.
    LimitCommaOffset,
    /// ` OFFSET m ROWS FETCH NEXT n ROWS ONLY`, order-sensitive.
    OffsetFetch,
    /// ` OFFSET m ROWS FETCH FIRST n ROWS ONLY`.
    FetchFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoIncrementSupport {
    /// Explicit values require `SET IDENTITY_INSERT`.
    pub identity_insert: bool,
    /// `DEFAULT` may be written into an autoincrement column.
    pub default_value: bool,
    /// Autoincrement columns may appear in UPDATE.
    pub update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionSupport {
    pub use_begin: bool,
    pub read_only: bool,
    pub transaction_type: bool,
}

/// Spellings of the conflict clauses. `None` means unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertSupport {
    pub ignore_duplicates: Option<&'static str>,
    pub update_on_duplicate: Option<&'static str>,
    pub on_conflict_do_nothing: Option<&'static str>,
    pub on_conflict_where: bool,
    pub conflict_fields: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOptionsSupport {
    pub cascade: bool,
    pub if_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSupport {
    pub restrict: bool,
    pub deferrable: bool,
    pub unique: bool,
    pub default: bool,
    pub check: bool,
    pub foreign_key: bool,
    pub primary_key: bool,
    pub on_update: bool,
    pub add: bool,
    pub remove: bool,
    pub remove_options: RemoveOptionsSupport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSupport {
    pub collate: bool,
    pub length: bool,
    pub parser: bool,
    pub concurrently: bool,
    pub index_type: bool,
    pub using: bool,
    pub function_based: bool,
    pub operator: bool,
    pub where_clause: bool,
    pub include: bool,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveIndexSupport {
    pub concurrently: bool,
    pub if_exists: bool,
    pub cascade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntSupport {
    pub zerofill: bool,
    pub unsigned: bool,
    /// Display width, as in `INTEGER(11)`.
    pub length: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecimalSupport {
    pub nan: bool,
    pub infinity: bool,
    pub zerofill: bool,
    pub unsigned: bool,
    pub scale_and_precision: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTypeSupport {
    pub ints: IntSupport,
    pub float: DecimalSupport,
    pub real: DecimalSupport,
    pub double: DecimalSupport,
    pub decimal: DecimalSupport,
    pub json: bool,
    pub jsonb: bool,
    pub array: bool,
    pub range: bool,
    pub citext: bool,
    pub tsvector: bool,
    /// CIDR, INET and MACADDR.
    pub network: bool,
    /// Native `ENUM(...)` column type.
    pub enums: bool,
    pub datetime_infinity: bool,
    pub time_precision: bool,
    /// Binary values must be sent as text.
    pub blob_as_text: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSupport {
    pub cascade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncateSupport {
    pub cascade: bool,
    pub restart_identity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IfNotExistsSupport {
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTableSupport {
    pub change_schema: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchemaSupport {
    pub authorization: bool,
    pub charset: bool,
    pub collate: bool,
    pub comment: bool,
    pub if_not_exists: bool,
    pub replace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableSupport {
    pub collate: bool,
    pub charset: bool,
    pub engine: bool,
    pub row_format: bool,
    pub comment: bool,
    pub initial_auto_increment: bool,
    pub unique_keys: bool,
}

/// Everything a dialect can or cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityMatrix {
    /// The `DEFAULT` keyword in value lists.
    pub default: bool,
    /// `INSERT INTO t DEFAULT VALUES`.
    pub default_values: bool,
    /// `INSERT INTO t VALUES ()`.
    pub values_empty_parens: bool,
    pub returning: ReturnValues,
    pub auto_increment: AutoIncrementSupport,
    /// `DEFAULT` inside multi-row VALUES for serial columns.
    pub bulk_default: bool,
    pub schemas: bool,
    pub transactions: bool,
    pub savepoints: bool,
    pub isolation_levels: bool,
    /// Transactions are driven through the connection, not SQL.
    pub connection_transaction_methods: bool,
    pub start_transaction: StartTransactionSupport,
    pub upserts: bool,
    pub inserts: InsertSupport,
    pub constraints: ConstraintSupport,
    pub index: IndexSupport,
    pub remove_index: RemoveIndexSupport,
    pub data_types: DataTypeSupport,
    pub json_operations: bool,
    pub escape_string_constants: bool,
    pub uuid_v4_generation: bool,
    pub drop_table: CascadeSupport,
    pub truncate: TruncateSupport,
    pub remove_column: RemoveOptionsSupport,
    pub add_column: IfNotExistsSupport,
    pub rename_table: RenameTableSupport,
    pub create_schema: CreateSchemaSupport,
    pub drop_schema: RemoveOptionsSupport,
    pub create_table: CreateTableSupport,
    pub delete_limit: bool,
    pub limit_on_update: bool,
    /// INSERT results are read through `SELECT * FROM FINAL TABLE (...)`.
    pub final_table: bool,
    pub table_hints: bool,
    pub index_hints: bool,
    pub pagination: Pagination,
}

const NO_DECIMAL: DecimalSupport = DecimalSupport {
    nan: false,
    infinity: false,
    zerofill: false,
    unsigned: false,
    scale_and_precision: false,
};

impl CapabilityMatrix {
    /// The conservative defaults every engine starts from.
    pub const BASE: Self = Self {
        default: true,
        default_values: false,
        values_empty_parens: false,
        returning: ReturnValues::None,
        auto_increment: AutoIncrementSupport {
            identity_insert: false,
            default_value: true,
            update: true,
        },
        bulk_default: false,
        schemas: false,
        transactions: true,
        savepoints: true,
        isolation_levels: true,
        connection_transaction_methods: false,
        start_transaction: StartTransactionSupport {
            use_begin: false,
            read_only: false,
            transaction_type: false,
        },
        upserts: true,
        inserts: InsertSupport {
            ignore_duplicates: None,
            update_on_duplicate: None,
            on_conflict_do_nothing: None,
            on_conflict_where: false,
            conflict_fields: false,
        },
        constraints: ConstraintSupport {
            restrict: true,
            deferrable: false,
            unique: true,
            default: false,
            check: true,
            foreign_key: true,
            primary_key: true,
            on_update: true,
            add: true,
            remove: true,
            remove_options: RemoveOptionsSupport {
                cascade: false,
                if_exists: false,
            },
        },
        index: IndexSupport {
            collate: true,
            length: false,
            parser: false,
            concurrently: false,
            index_type: false,
            using: true,
            function_based: false,
            operator: false,
            where_clause: false,
            include: false,
            if_not_exists: false,
        },
        remove_index: RemoveIndexSupport {
            concurrently: false,
            if_exists: false,
            cascade: false,
        },
        data_types: DataTypeSupport {
            ints: IntSupport {
                zerofill: false,
                unsigned: false,
                length: false,
            },
            float: NO_DECIMAL,
            real: NO_DECIMAL,
            double: NO_DECIMAL,
            decimal: NO_DECIMAL,
            json: false,
            jsonb: false,
            array: false,
            range: false,
            citext: false,
            tsvector: false,
            network: false,
            enums: false,
            datetime_infinity: false,
            time_precision: false,
            blob_as_text: false,
        },
        json_operations: false,
        escape_string_constants: false,
        uuid_v4_generation: false,
        drop_table: CascadeSupport { cascade: false },
        truncate: TruncateSupport {
            cascade: false,
            restart_identity: false,
        },
        remove_column: RemoveOptionsSupport {
            cascade: false,
            if_exists: false,
        },
        add_column: IfNotExistsSupport {
            if_not_exists: false,
        },
        rename_table: RenameTableSupport {
            change_schema: false,
        },
        create_schema: CreateSchemaSupport {
            authorization: false,
            charset: false,
            collate: false,
            comment: false,
            if_not_exists: false,
            replace: false,
        },
        drop_schema: RemoveOptionsSupport {
            cascade: false,
            if_exists: false,
        },
        create_table: CreateTableSupport {
            collate: false,
            charset: false,
            engine: false,
            row_format: false,
            comment: false,
            initial_auto_increment: false,
            unique_keys: true,
        },
        delete_limit: true,
        limit_on_update: false,
        final_table: false,
        table_hints: false,
        index_hints: false,
        pagination: Pagination::LimitOffset,
    };
}

/// Names of the enabled flags of an option-support group, in the
/// camelCase spelling option bags use.
pub trait SupportedOptions {
    fn supported(&self) -> Vec<&'static str>;
}

fn enabled(flags: &[(&'static str, bool)]) -> Vec<&'static str> {
    flags
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| *name)
        .collect()
}

impl SupportedOptions for RemoveOptionsSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[("cascade", self.cascade), ("ifExists", self.if_exists)])
    }
}

impl SupportedOptions for RemoveIndexSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[
            ("concurrently", self.concurrently),
            ("ifExists", self.if_exists),
            ("cascade", self.cascade),
        ])
    }
}

impl SupportedOptions for IndexSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[
            ("concurrently", self.concurrently),
            ("ifNotExists", self.if_not_exists),
            ("include", self.include),
            ("operator", self.operator),
            ("parser", self.parser),
            ("type", self.index_type),
            ("using", self.using),
            ("where", self.where_clause),
        ])
    }
}

impl SupportedOptions for CascadeSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[("cascade", self.cascade)])
    }
}

impl SupportedOptions for TruncateSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[
            ("cascade", self.cascade),
            ("restartIdentity", self.restart_identity),
        ])
    }
}

impl SupportedOptions for IfNotExistsSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[("ifNotExists", self.if_not_exists)])
    }
}

impl SupportedOptions for RenameTableSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[("changeSchema", self.change_schema)])
    }
}

impl SupportedOptions for CreateSchemaSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[
            ("authorization", self.authorization),
            ("charset", self.charset),
            ("collate", self.collate),
            ("comment", self.comment),
            ("ifNotExists", self.if_not_exists),
            ("replace", self.replace),
        ])
    }
}

impl SupportedOptions for CreateTableSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[
            ("collate", self.collate),
            ("charset", self.charset),
            ("engine", self.engine),
            ("rowFormat", self.row_format),
            ("comment", self.comment),
            ("initialAutoIncrement", self.initial_auto_increment),
            ("uniqueKeys", self.unique_keys),
        ])
    }
}

impl SupportedOptions for StartTransactionSupport {
    fn supported(&self) -> Vec<&'static str> {
        enabled(&[
            ("readOnly", self.read_only),
            ("transactionType", self.transaction_type),
        ])
    }
}
