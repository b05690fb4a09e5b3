//! INSERT ... ON CONFLICT / ON DUPLICATE KEY / MERGE.

use indexmap::IndexMap;

use super::insert::identity_insert_wrap;
use super::{Query, QueryGenerator, UpsertOptions};
use crate::bind::ValueBinder;
use crate::dialect::options::{validate_options, UPSERT_SUPPORTABLE};
use crate::dialect::supports::ReturnValues;
use crate::error::{Error, Result};
use crate::expr::FormatContext;
use crate::schema::{ModelSchema, TableRef};
use crate::value::SqlValue;

/// Chooses the conflict target of an upsert.
///
/// The choice does not depend on the dialect:
///
/// 1. explicit `conflict_fields`, when given;
/// 2. the primary key, when the update payload touches a primary key column;
/// 3. the first unique key whose columns all appear in the update payload;
/// 4. the primary key.
///
/// Field names may be attribute or column names. The result holds column
/// names.
///
/// # Errors
///
/// Returns [`Error::NoUpsertKey`] when no rule yields a key.
pub fn upsert_keys(
    model: &ModelSchema,
    update_fields: &[String],
    conflict_fields: &[String],
) -> Result<Vec<String>> {
    if !conflict_fields.is_empty() {
        tracing::trace!(table = %model.table.table, "upsert key from conflict fields");
        return Ok(conflict_fields
            .iter()
            .map(|field| model.column_for(field).to_string())
            .collect());
    }

    let updated: Vec<&str> = update_fields.iter().map(|field| model.column_for(field)).collect();
    let primary_keys: Vec<String> = model
        .primary_keys()
        .into_iter()
        .map(|attribute| attribute.field.clone())
        .collect();

    if primary_keys.iter().any(|pk| updated.contains(&pk.as_str())) {
        tracing::trace!(table = %model.table.table, "upsert key forced to primary key");
        return Ok(primary_keys);
    }

    if let Some(key) = model
        .unique_keys()
        .iter()
        .find(|key| key.fields.iter().all(|field| updated.contains(&field.as_str())))
    {
        tracing::trace!(table = %model.table.table, key = %key.name, "upsert key from unique key");
        return Ok(key.fields.clone());
    }

    if primary_keys.is_empty() {
        return Err(Error::NoUpsertKey {
            table: model.table.table.clone(),
        });
    }
    tracing::trace!(table = %model.table.table, "upsert key falls back to primary key");
    Ok(primary_keys)
}

impl QueryGenerator<'_> {
    /// Builds an insert-or-update for one row.
    ///
    /// Engines with a native conflict clause get `ON CONFLICT` or
    /// `ON DUPLICATE KEY UPDATE`; the others get a `MERGE` against a
    /// one-row `VALUES` source joined on the conflict target. Values are
    /// bound.
    ///
    /// # Errors
    ///
    /// Fails when the dialect has no upsert, on unsupported options, when no
    /// conflict target can be found, and on invalid values.
    pub fn upsert_query(
        &self,
        table: &TableRef,
        insert_values: &IndexMap<String, SqlValue>,
        update_values: &IndexMap<String, SqlValue>,
        options: &UpsertOptions,
    ) -> Result<Query> {
        let supports = self.dialect.supports();
        if !supports.upserts {
            return Err(self.dialect.unsupported("upsert"));
        }
        let inserts = &supports.inserts;
        let merge = inserts.update_on_duplicate.is_none();
        let supported: Vec<&str> = [
            ("conflictFields", inserts.conflict_fields || merge),
            ("conflictWhere", inserts.on_conflict_where),
            ("returning", supports.returning != ReturnValues::None),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
        validate_options("upsertQuery", self.dialect, UPSERT_SUPPORTABLE, &supported, options)?;

        let mut binder = ValueBinder::collecting();
        let sql = match inserts.update_on_duplicate {
            Some(_) if !inserts.conflict_fields => {
                self.on_duplicate_key_upsert(
                    table,
                    insert_values,
                    update_values,
                    options,
                    &mut binder,
                )?
            }
            Some(_) => self.on_conflict_upsert(
                table,
                insert_values,
                update_values,
                options,
                &mut binder,
            )?,
            None => self.merge_upsert(table, insert_values, update_values, options, &mut binder)?,
        };
        self.finish("upsertQuery", sql, binder)
    }

    fn conflict_target(
        &self,
        table: &TableRef,
        update_values: &IndexMap<String, SqlValue>,
        options: &UpsertOptions,
    ) -> Result<Vec<String>> {
        let update_fields: Vec<String> = update_values.keys().cloned().collect();
        match table.model() {
            Some(model) => upsert_keys(model, &update_fields, &options.conflict_fields),
            None if !options.conflict_fields.is_empty() => Ok(options.conflict_fields.clone()),
            None => Err(Error::NoUpsertKey {
                table: table.table_name().table,
            }),
        }
    }

    fn update_columns(
        &self,
        table: &TableRef,
        update_values: &IndexMap<String, SqlValue>,
    ) -> Vec<String> {
        let model = table.model();
        let update_serials = self.dialect.supports().auto_increment.update;
        update_values
            .keys()
            .filter_map(|name| {
                let attribute = model.and_then(|m| m.get(name));
                if attribute.is_some_and(|a| a.auto_increment) && !update_serials {
                    return None;
                }
                Some(attribute.map_or_else(|| name.clone(), |a| a.field.clone()))
            })
            .collect()
    }

    fn on_conflict_upsert(
        &self,
        table: &TableRef,
        insert_values: &IndexMap<String, SqlValue>,
        update_values: &IndexMap<String, SqlValue>,
        options: &UpsertOptions,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let keys = self.conflict_target(table, update_values, options)?;
        let row = self.insert_row(table.model(), insert_values, binder)?;
        let quoted_table = self.quote_table(table, None);
        let (_, returning) = self.returning_clauses(&options.returning);

        let mut sql = format!(
            "INSERT INTO {quoted_table} ({}) VALUES ({}) ON CONFLICT ({})",
            self.quote_identifiers(&row.columns),
            row.values.join(", "),
            self.quote_identifiers(&keys)
        );
        if let Some(filter) = &options.conflict_where {
            let ctx = FormatContext::default().with_model(table.model());
            let clause = self.where_query(filter, &ctx, binder)?;
            if !clause.is_empty() {
                sql.push(' ');
                sql.push_str(&clause);
            }
        }

        let columns = self.update_columns(table, update_values);
        if columns.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            let assignments: Vec<String> = columns
                .iter()
                .map(|column| {
                    let quoted = self.quote_identifier(column);
                    format!("{quoted} = EXCLUDED.{quoted}")
                })
                .collect();
            sql.push_str(" DO UPDATE SET ");
            sql.push_str(&assignments.join(", "));
        }
        sql.push_str(&returning);
        sql.push(';');
        Ok(sql)
    }

    /// MySQL infers the conflicting key from every unique index itself, so no
    /// upsert key is chosen and keyless tables never raise `NoUpsertKey`.
    fn on_duplicate_key_upsert(
        &self,
        table: &TableRef,
        insert_values: &IndexMap<String, SqlValue>,
        update_values: &IndexMap<String, SqlValue>,
        options: &UpsertOptions,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let row = self.insert_row(table.model(), insert_values, binder)?;
        let Some(first) = row.columns.first() else {
            return Err(Error::invalid("upsert needs at least one insert value"));
        };
        let quoted_table = self.quote_table(table, None);
        let (_, returning) = self.returning_clauses(&options.returning);

        let mut columns = self.update_columns(table, update_values);
        if columns.is_empty() {
            // Updating a column to itself leaves the row untouched.
            columns.push(first.clone());
        }
        let assignments: Vec<String> = columns
            .iter()
            .map(|column| {
                let quoted = self.quote_identifier(column);
                format!("{quoted} = VALUES({quoted})")
            })
            .collect();

        Ok(format!(
            "INSERT INTO {quoted_table} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}{returning};",
            self.quote_identifiers(&row.columns),
            row.values.join(", "),
            assignments.join(", ")
        ))
    }

    fn merge_upsert(
        &self,
        table: &TableRef,
        insert_values: &IndexMap<String, SqlValue>,
        update_values: &IndexMap<String, SqlValue>,
        options: &UpsertOptions,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let keys = self.conflict_target(table, update_values, options)?;
        let model = table.model();
        let row = self.insert_row(model, insert_values, binder)?;
        if let Some(missing) = keys.iter().find(|key| !row.columns.contains(key)) {
            return Err(Error::invalid(format!(
                "upsert conflict column {missing} has no insert value"
            )));
        }

        let supports = self.dialect.supports();
        let quoted_table = self.quote_table(table, None);
        let target = self.quote_identifier("target");
        let source = self.quote_identifier("source");

        let mut sql = format!("MERGE INTO {quoted_table}");
        if supports.table_hints {
            sql.push_str(" WITH(HOLDLOCK)");
        }
        sql.push_str(&format!(
            " AS {target} USING (VALUES ({})) AS {source} ({}) ON ",
            row.values.join(", "),
            self.quote_identifiers(&row.columns)
        ));
        let join: Vec<String> = keys
            .iter()
            .map(|key| {
                let quoted = self.quote_identifier(key);
                format!("{target}.{quoted} = {source}.{quoted}")
            })
            .collect();
        sql.push_str(&join.join(" AND "));

        let update_serials = supports.auto_increment.update;
        let mut assignments = Vec::new();
        for (name, value) in update_values {
            let attribute = model.and_then(|m| m.get(name));
            if attribute.is_some_and(|a| a.auto_increment) && !update_serials {
                continue;
            }
            let column = attribute.map_or(name.as_str(), |a| a.field.as_str());
            let value = self.escape_or_bind(value, attribute.map(|a| &a.data_type), binder)?;
            assignments.push(format!("{target}.{} = {value}", self.quote_identifier(column)));
        }
        if !assignments.is_empty() {
            sql.push_str(" WHEN MATCHED THEN UPDATE SET ");
            sql.push_str(&assignments.join(", "));
        }

        let source_columns: Vec<String> = row
            .columns
            .iter()
            .map(|column| format!("{source}.{}", self.quote_identifier(column)))
            .collect();
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
            self.quote_identifiers(&row.columns),
            source_columns.join(", ")
        ));
        if supports.returning == ReturnValues::Output {
            sql.push_str(" OUTPUT $action, INSERTED.*");
        }
        sql.push(';');

        if row.identity_insert {
            sql = identity_insert_wrap(&quoted_table, &sql);
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::filter::Where;
    use crate::query::Returning;
    use crate::schema::{AttributeDef, IndexDef};
    use crate::types::DataType;

    fn users_model() -> ModelSchema {
        ModelSchema::new("users")
            .attribute(AttributeDef::new("id", DataType::integer()).primary_key())
            .attribute(AttributeDef::new("email", DataType::string()))
            .attribute(AttributeDef::new("name", DataType::string()))
            .index(IndexDef::new(["email"]).unique())
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn values(pairs: &[(&str, SqlValue)]) -> IndexMap<String, SqlValue> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_unique_key_is_chosen_when_fully_present() {
        let model = users_model();
        assert_eq!(
            upsert_keys(&model, &fields(&["email", "name"]), &[]).unwrap(),
            fields(&["email"])
        );
    }

    #[test]
    fn test_primary_key_is_forced_when_touched() {
        let model = users_model();
        assert_eq!(
            upsert_keys(&model, &fields(&["id", "name"]), &[]).unwrap(),
            fields(&["id"])
        );
        assert_eq!(
            upsert_keys(&model, &fields(&["id", "email"]), &[]).unwrap(),
            fields(&["id"])
        );
    }

    #[test]
    fn test_conflict_fields_win_and_map_to_columns() {
        let model = ModelSchema::new("users")
            .attribute(AttributeDef::new("id", DataType::integer()).primary_key())
            .attribute(AttributeDef::new("tenantId", DataType::integer()).field("tenant_id"));
        assert_eq!(
            upsert_keys(&model, &fields(&["id"]), &fields(&["tenantId"])).unwrap(),
            fields(&["tenant_id"])
        );
    }

    #[test]
    fn test_falls_back_to_primary_key_or_fails() {
        let model = users_model();
        assert_eq!(upsert_keys(&model, &fields(&["name"]), &[]).unwrap(), fields(&["id"]));

        let keyless =
            ModelSchema::new("logs").attribute(AttributeDef::new("line", DataType::text()));
        assert_eq!(
            upsert_keys(&keyless, &fields(&["line"]), &[]).unwrap_err(),
            Error::NoUpsertKey {
                table: "logs".into()
            }
        );
    }

    #[test]
    fn test_key_selection_is_identical_across_dialects() {
        let table = TableRef::Model(Arc::new(users_model()));
        let payload = values(&[
            ("email", SqlValue::Text("a@b.c".into())),
            ("name", SqlValue::Text("Ann".into())),
        ]);
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let sqlite = Dialect::new(DialectKind::Sqlite).unwrap();
        let mssql = Dialect::new(DialectKind::Mssql).unwrap();
        for dialect in [&pg, &sqlite, &mssql] {
            let generator = dialect.query_generator();
            let keys = generator
                .conflict_target(&table, &payload, &UpsertOptions::default())
                .unwrap();
            assert_eq!(keys, fields(&["email"]));
        }
    }

    #[test]
    fn test_on_conflict_upsert() {
        let table = TableRef::Model(Arc::new(users_model()));
        let payload = values(&[
            ("email", SqlValue::Text("a@b.c".into())),
            ("name", SqlValue::Text("Ann".into())),
        ]);
        let dialect = Dialect::new(DialectKind::Postgres).unwrap();
        let query = dialect
            .query_generator()
            .upsert_query(&table, &payload, &payload, &UpsertOptions::default())
            .unwrap();
        assert_eq!(
            query.sql,
            "INSERT INTO \"users\" (\"email\", \"name\") VALUES ($1, $2) ON CONFLICT (\"email\") DO UPDATE SET \"email\" = EXCLUDED.\"email\", \"name\" = EXCLUDED.\"name\";"
        );
        assert_eq!(query.bind.unwrap().values.len(), 2);
    }

    #[test]
    fn test_on_conflict_with_where_and_returning() {
        let table = TableRef::Model(Arc::new(users_model()));
        let insert = values(&[("id", SqlValue::Int(1)), ("name", SqlValue::Text("Ann".into()))]);
        let update = values(&[("name", SqlValue::Text("Ann".into()))]);
        let options = UpsertOptions {
            conflict_where: Some(Where::attr("name").ne("root")),
            returning: Returning::All,
            ..UpsertOptions::default()
        };
        let dialect = Dialect::new(DialectKind::Sqlite).unwrap();
        let query = dialect
            .query_generator()
            .upsert_query(&table, &insert, &update, &options)
            .unwrap();
        assert_eq!(
            query.sql,
            "INSERT INTO `users` (`id`, `name`) VALUES ($sequelize_1, $sequelize_2) ON CONFLICT (`id`) WHERE `name` != $sequelize_3 DO UPDATE SET `name` = EXCLUDED.`name` RETURNING *;"
        );
    }

    #[test]
    fn test_on_duplicate_key_upsert() {
        let table = TableRef::Model(Arc::new(users_model()));
        let payload = values(&[
            ("email", SqlValue::Text("a@b.c".into())),
            ("name", SqlValue::Text("Ann".into())),
        ]);
        let update = values(&[("name", SqlValue::Text("Ann".into()))]);
        let dialect = Dialect::new(DialectKind::Mysql).unwrap();
        let query = dialect
            .query_generator()
            .upsert_query(&table, &payload, &update, &UpsertOptions::default())
            .unwrap();
        assert_eq!(
            query.sql,
            "INSERT INTO `users` (`email`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = VALUES(`name`);"
        );
        assert_eq!(
            query.bind.unwrap().order.unwrap(),
            vec!["sequelize_1".to_string(), "sequelize_2".to_string()]
        );
    }

    #[test]
    fn test_conflict_where_is_rejected_on_mysql() {
        let table = TableRef::Model(Arc::new(users_model()));
        let payload = values(&[("email", SqlValue::Text("a".into()))]);
        let options = UpsertOptions {
            conflict_where: Some(Where::attr("name").is_not_null()),
            ..UpsertOptions::default()
        };
        let dialect = Dialect::new(DialectKind::Mysql).unwrap();
        let err = dialect
            .query_generator()
            .upsert_query(&table, &payload, &payload, &options)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOption { ref options, .. } if options == &["conflictWhere"]
        ));
    }

    #[test]
    fn test_merge_upsert_on_mssql() {
        let table = TableRef::Model(Arc::new(users_model()));
        let insert = values(&[("id", SqlValue::Int(1)), ("name", SqlValue::Text("Ann".into()))]);
        let update = values(&[("name", SqlValue::Text("Bob".into()))]);
        let dialect = Dialect::new(DialectKind::Mssql).unwrap();
        let query = dialect
            .query_generator()
            .upsert_query(&table, &insert, &update, &UpsertOptions::default())
            .unwrap();
        assert_eq!(
            query.sql,
            "MERGE INTO [users] WITH(HOLDLOCK) AS [target] USING (VALUES (@sequelize_1, @sequelize_2)) AS [source] ([id], [name]) ON [target].[id] = [source].[id] WHEN MATCHED THEN UPDATE SET [target].[name] = @sequelize_3 WHEN NOT MATCHED THEN INSERT ([id], [name]) VALUES ([source].[id], [source].[name]) OUTPUT $action, INSERTED.*;"
        );
        let bind = query.bind.unwrap();
        assert_eq!(bind.values.len(), 3);
        assert!(bind.order.is_none());
    }

    #[test]
    fn test_merge_upsert_on_db2_uses_positional_binds() {
        let table = TableRef::Model(Arc::new(users_model()));
        let insert = values(&[
            ("email", SqlValue::Text("a".into())),
            ("name", SqlValue::Text("A".into())),
        ]);
        let dialect = Dialect::new(DialectKind::Db2).unwrap();
        let query = dialect
            .query_generator()
            .upsert_query(&table, &insert, &insert, &UpsertOptions::default())
            .unwrap();
        assert_eq!(
            query.sql,
            "MERGE INTO \"users\" AS \"target\" USING (VALUES (?, ?)) AS \"source\" (\"email\", \"name\") ON \"target\".\"email\" = \"source\".\"email\" WHEN MATCHED THEN UPDATE SET \"target\".\"email\" = ?, \"target\".\"name\" = ? WHEN NOT MATCHED THEN INSERT (\"email\", \"name\") VALUES (\"source\".\"email\", \"source\".\"name\");"
        );
        assert_eq!(query.bind.unwrap().order.unwrap().len(), 4);
    }

    #[test]
    fn test_merge_needs_the_key_in_the_insert_values() {
        let table = TableRef::Model(Arc::new(users_model()));
        let insert = values(&[("name", SqlValue::Text("A".into()))]);
        let update = values(&[("id", SqlValue::Int(3))]);
        let dialect = Dialect::new(DialectKind::Mssql).unwrap();
        assert!(matches!(
            dialect
                .query_generator()
                .upsert_query(&table, &insert, &update, &UpsertOptions::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
