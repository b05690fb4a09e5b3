//! Transaction control statements.
//!
//! Statements that end the current transaction come back with
//! `completes_transaction` set so the caller knows when the connection can
//! be released.

use super::{IsolationLevel, Query, QueryGenerator, StartTransactionOptions};
use crate::dialect::options::{validate_options, START_TRANSACTION_SUPPORTABLE};
use crate::dialect::supports::SupportedOptions;
use crate::error::Result;

impl QueryGenerator<'_> {
    /// Engines whose driver owns BEGIN/COMMIT/ROLLBACK get no SQL for them.
    fn ensure_sql_transactions(&self, statement: &str) -> Result<()> {
        let supports = self.dialect.supports();
        if !supports.transactions || supports.connection_transaction_methods {
            return Err(self.dialect.unsupported(format!("{statement} statements")));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails on engines without SQL transaction control, and on options the
    /// engine does not support.
    pub fn start_transaction_query(&self, options: &StartTransactionOptions) -> Result<Query> {
        let support = self.dialect.supports().start_transaction;
        validate_options(
            "startTransactionQuery",
            self.dialect,
            START_TRANSACTION_SUPPORTABLE,
            &support.supported(),
            options,
        )?;
        self.ensure_sql_transactions("START TRANSACTION")?;

        let mut sql = String::from(if support.use_begin { "BEGIN" } else { "START" });
        if let Some(kind) = options.transaction_type {
            sql.push(' ');
            sql.push_str(kind.as_sql());
        }
        sql.push_str(" TRANSACTION");
        if options.read_only {
            sql.push_str(" READ ONLY");
        }
        Ok(Query::new(sql))
    }

    /// # Errors
    ///
    /// Fails on engines without isolation levels, or without the requested
    /// one.
    pub fn set_isolation_level_query(&self, level: IsolationLevel) -> Result<Query> {
        if !self.dialect.supports().isolation_levels {
            return Err(self.dialect.unsupported("isolation levels"));
        }
        let sql = self.dialect.rules().set_isolation_level(self.dialect, level)?;
        Ok(Query::new(sql))
    }

    /// # Errors
    ///
    /// Fails on engines without SQL transaction control.
    pub fn commit_transaction_query(&self) -> Result<Query> {
        self.ensure_sql_transactions("COMMIT")?;
        Ok(Query::new("COMMIT").completing())
    }

    /// # Errors
    ///
    /// Fails on engines without SQL transaction control.
    pub fn rollback_transaction_query(&self) -> Result<Query> {
        self.ensure_sql_transactions("ROLLBACK")?;
        Ok(Query::new("ROLLBACK").completing())
    }

    /// # Errors
    ///
    /// Fails on engines without savepoints.
    pub fn create_savepoint_query(&self, name: &str) -> Result<Query> {
        if !self.dialect.supports().savepoints {
            return Err(self.dialect.unsupported("savepoints"));
        }
        let quoted = self.quote_identifier(name);
        Ok(Query::new(self.dialect.rules().create_savepoint(&quoted)))
    }

    /// # Errors
    ///
    /// Fails on engines without savepoints.
    pub fn rollback_savepoint_query(&self, name: &str) -> Result<Query> {
        if !self.dialect.supports().savepoints {
            return Err(self.dialect.unsupported("savepoints"));
        }
        let quoted = self.quote_identifier(name);
        Ok(Query::new(self.dialect.rules().rollback_savepoint(&quoted)).completing())
    }

    /// # Errors
    ///
    /// Fails on engines that cannot release a savepoint explicitly.
    pub fn release_savepoint_query(&self, name: &str) -> Result<Query> {
        let quoted = self.quote_identifier(name);
        let sql = self
            .dialect
            .rules()
            .release_savepoint(&quoted)
            .filter(|_| self.dialect.supports().savepoints)
            .ok_or_else(|| self.dialect.unsupported("releasing savepoints"))?;
        Ok(Query::new(sql).completing())
    }
}
