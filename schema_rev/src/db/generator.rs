//! DDL statement generator
//!
//! Renders a [`DdlIntent`] as dialect SQL. SQLite cannot alter columns or
//! constraints in place, so those intents rebuild the table instead.

use crate::db::connection::Dialect;
use crate::db::executor::DdlIntent;
use crate::error::Result;
use crate::schema::ops::ColumnChanges;
use crate::schema::types::{Check, Column, ForeignKey, Index, PrimaryKey, Schema, Table, Unique};
use crate::utils::naming::{
    format_column_list, format_sql_identifier, get_constraint_name, short_hash,
};

/// Prefix of the scratch table used by the SQLite rebuild
const REBUILD_PREFIX: &str = "_schema_rev_rebuild_";

/// DDL SQL generator for one dialect
#[derive(Debug, Clone, Copy)]
pub struct SqlGenerator {
    dialect: Dialect,
}

impl SqlGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Statements carrying out `intent`.
    ///
    /// `schema` is the model after the operation was applied; the SQLite
    /// rebuild reads the new table definition from it.
    pub fn generate(&self, intent: &DdlIntent, schema: &Schema) -> Result<Vec<String>> {
        if self.dialect == Dialect::Sqlite && needs_rebuild(intent) {
            return self.rebuild_table(intent, schema);
        }

        let statements = match intent {
            DdlIntent::CreateTable { table } => self.create_table(table),
            DdlIntent::DropTable { table } => {
                vec![format!("DROP TABLE {}", self.ident(&table.name))]
            }
            DdlIntent::RenameTable { from, to } => {
                let mut statements = vec![match self.dialect {
                    Dialect::MySql => {
                        format!("RENAME TABLE {} TO {}", self.ident(from), self.ident(to))
                    }
                    Dialect::Postgres | Dialect::Sqlite => {
                        let short = to.rsplit('.').next().unwrap_or(to);
                        format!("ALTER TABLE {} RENAME TO {}", self.ident(from), self.ident(short))
                    }
                }];
                let after = schema.table(to)?;
                let before = Table { name: from.clone(), ..after.clone() };
                statements.extend(self.rename_constraints(&before, after));
                statements
            }
            DdlIntent::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.ident(&table.name),
                self.column_definition(column)
            )],
            DdlIntent::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.ident(&table.name),
                self.ident(&column.name)
            )],
            DdlIntent::AlterColumn { table, column, changes } => {
                let mut statements = self.alter_column(table, column, changes);
                if changes.name.is_some() {
                    statements.extend(self.rename_constraints(table, schema.table(&table.name)?));
                }
                statements
            }
            DdlIntent::AddPrimaryKey { table, constraint } => vec![format!(
                "ALTER TABLE {} ADD {}",
                self.ident(&table.name),
                self.primary_key_clause(&table.name, constraint)
            )],
            DdlIntent::DropPrimaryKey { table, constraint } => vec![match self.dialect {
                Dialect::MySql => format!("ALTER TABLE {} DROP PRIMARY KEY", self.ident(&table.name)),
                _ => self.drop_constraint(&table.name, &self.primary_key_name(&table.name, constraint)),
            }],
            DdlIntent::AddForeignKey { table, constraint } => vec![format!(
                "ALTER TABLE {} ADD {}",
                self.ident(&table.name),
                self.foreign_key_clause(&table.name, constraint)
            )],
            DdlIntent::DropForeignKey { table, constraint } => {
                let name = self.foreign_key_name(&table.name, constraint);
                vec![match self.dialect {
                    Dialect::MySql => format!(
                        "ALTER TABLE {} DROP FOREIGN KEY {}",
                        self.ident(&table.name),
                        self.ident(&name)
                    ),
                    _ => self.drop_constraint(&table.name, &name),
                }]
            }
            DdlIntent::AddUnique { table, constraint } => vec![format!(
                "ALTER TABLE {} ADD {}",
                self.ident(&table.name),
                self.unique_clause(&table.name, constraint)
            )],
            DdlIntent::DropUnique { table, constraint } => {
                let name = self.unique_name(&table.name, constraint);
                vec![match self.dialect {
                    Dialect::MySql => format!(
                        "ALTER TABLE {} DROP INDEX {}",
                        self.ident(&table.name),
                        self.ident(&name)
                    ),
                    _ => self.drop_constraint(&table.name, &name),
                }]
            }
            DdlIntent::AddCheck { table, constraint } => vec![format!(
                "ALTER TABLE {} ADD {}",
                self.ident(&table.name),
                self.check_clause(&table.name, constraint)
            )],
            DdlIntent::DropCheck { table, constraint } => {
                let name = self.check_name(&table.name, constraint);
                vec![match self.dialect {
                    Dialect::MySql => format!(
                        "ALTER TABLE {} DROP CHECK {}",
                        self.ident(&table.name),
                        self.ident(&name)
                    ),
                    _ => self.drop_constraint(&table.name, &name),
                }]
            }
            DdlIntent::CreateIndex { table, index } => vec![self.create_index(&table.name, index)],
            DdlIntent::DropIndex { table, index } => vec![match self.dialect {
                Dialect::MySql => format!(
                    "DROP INDEX {} ON {}",
                    self.ident(&index.name),
                    self.ident(&table.name)
                ),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("DROP INDEX {}", self.ident(&index.name))
                }
            }],
        };

        Ok(statements)
    }

    fn ident(&self, name: &str) -> String {
        format_sql_identifier(name, self.dialect)
    }

    fn columns(&self, columns: &[String]) -> String {
        format_column_list(columns, self.dialect)
    }

    /// CREATE TABLE with inline constraints, followed by its indexes
    fn create_table(&self, table: &Table) -> Vec<String> {
        let mut statements = vec![self.create_table_as(table, &table.name)];
        statements.extend(table.indexes.iter().map(|index| self.create_index(&table.name, index)));
        statements
    }

    /// CREATE TABLE for `table`'s definition under the name `name`.
    ///
    /// Constraint names are still derived from the table's own name.
    fn create_table_as(&self, table: &Table, name: &str) -> String {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|column| format!("  {}", self.column_definition(column)))
            .collect();

        if let Some(pk) = &table.primary_key {
            definitions.push(format!("  {}", self.primary_key_clause(&table.name, pk)));
        }
        for unique in &table.uniques {
            definitions.push(format!("  {}", self.unique_clause(&table.name, unique)));
        }
        for fk in &table.foreign_keys {
            definitions.push(format!("  {}", self.foreign_key_clause(&table.name, fk)));
        }
        for check in &table.checks {
            definitions.push(format!("  {}", self.check_clause(&table.name, check)));
        }

        format!("CREATE TABLE {} (\n{}\n)", self.ident(name), definitions.join(",\n"))
    }

    fn column_definition(&self, column: &Column) -> String {
        let mut definition = format!("{} {}", self.ident(&column.name), column.data_type);

        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        if let Some(default) = &column.server_default {
            definition.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(onupdate) = &column.server_onupdate {
            if self.dialect == Dialect::MySql {
                definition.push_str(&format!(" ON UPDATE {}", onupdate));
            } else {
                tracing::warn!(
                    column = %column.name,
                    dialect = %self.dialect,
                    "server_onupdate is only emitted for MySQL"
                );
            }
        }

        definition
    }

    fn alter_column(&self, table: &Table, column: &Column, changes: &ColumnChanges) -> Vec<String> {
        let table_name = self.ident(&table.name);

        if self.dialect == Dialect::MySql {
            let mut altered = column.clone();
            changes.apply(&mut altered);
            return vec![match &changes.name {
                Some(name) => {
                    altered.name = name.clone();
                    format!(
                        "ALTER TABLE {} CHANGE COLUMN {} {}",
                        table_name,
                        self.ident(&column.name),
                        self.column_definition(&altered)
                    )
                }
                None => format!(
                    "ALTER TABLE {} MODIFY COLUMN {}",
                    table_name,
                    self.column_definition(&altered)
                ),
            }];
        }

        let column_name = self.ident(&column.name);
        let mut statements = Vec::new();

        if let Some(data_type) = &changes.data_type {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                table_name, column_name, data_type, column_name, data_type
            ));
        }
        if let Some(nullable) = changes.nullable {
            let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
            statements.push(format!("ALTER TABLE {} ALTER COLUMN {} {}", table_name, column_name, action));
        }
        if let Some(default) = &changes.server_default {
            statements.push(match default {
                Some(default) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                    table_name, column_name, default
                ),
                None => format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", table_name, column_name),
            });
        }
        if changes.server_onupdate.is_some() {
            tracing::warn!(column = %column.name, "ON UPDATE expressions are not supported by PostgreSQL");
        }
        if let Some(name) = &changes.name {
            statements.push(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table_name,
                column_name,
                self.ident(name)
            ));
        }

        statements
    }

    /// Keeps generated constraint names in step with a table or column rename.
    ///
    /// Unnamed constraints are named after their table and columns when
    /// created, so a rename must carry the database names along for later
    /// drops to find them. `before` and `after` list their constraints in the
    /// same order. SQLite recreates constraints on every rebuild and needs
    /// nothing here.
    fn rename_constraints(&self, before: &Table, after: &Table) -> Vec<String> {
        let table = self.ident(&after.name);
        let mut statements = Vec::new();
        let rename = |old: String, new: String, statements: &mut Vec<String>| {
            if old != new {
                statements.push(format!(
                    "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
                    table,
                    self.ident(&old),
                    self.ident(&new)
                ));
            }
        };

        match self.dialect {
            Dialect::Sqlite => {}
            Dialect::Postgres => {
                if let (Some(old), Some(new)) = (&before.primary_key, &after.primary_key) {
                    rename(
                        self.primary_key_name(&before.name, old),
                        self.primary_key_name(&after.name, new),
                        &mut statements,
                    );
                }
                for (old, new) in before.uniques.iter().zip(&after.uniques) {
                    rename(
                        self.unique_name(&before.name, old),
                        self.unique_name(&after.name, new),
                        &mut statements,
                    );
                }
                for (old, new) in before.foreign_keys.iter().zip(&after.foreign_keys) {
                    rename(
                        self.foreign_key_name(&before.name, old),
                        self.foreign_key_name(&after.name, new),
                        &mut statements,
                    );
                }
                for (old, new) in before.checks.iter().zip(&after.checks) {
                    rename(
                        self.check_name(&before.name, old),
                        self.check_name(&after.name, new),
                        &mut statements,
                    );
                }
            }
            // The primary key is always PRIMARY; foreign keys and checks
            // cannot be renamed in place
            Dialect::MySql => {
                for (old, new) in before.uniques.iter().zip(&after.uniques) {
                    let old = self.unique_name(&before.name, old);
                    let new = self.unique_name(&after.name, new);
                    if old != new {
                        statements.push(format!(
                            "ALTER TABLE {} RENAME INDEX {} TO {}",
                            table,
                            self.ident(&old),
                            self.ident(&new)
                        ));
                    }
                }
                for (old, new) in before.foreign_keys.iter().zip(&after.foreign_keys) {
                    let old_name = self.foreign_key_name(&before.name, old);
                    if old_name != self.foreign_key_name(&after.name, new) {
                        statements.push(format!(
                            "ALTER TABLE {} DROP FOREIGN KEY {}",
                            table,
                            self.ident(&old_name)
                        ));
                        statements.push(format!(
                            "ALTER TABLE {} ADD {}",
                            table,
                            self.foreign_key_clause(&after.name, new)
                        ));
                    }
                }
                for (old, new) in before.checks.iter().zip(&after.checks) {
                    let old_name = self.check_name(&before.name, old);
                    if old_name != self.check_name(&after.name, new) {
                        statements.push(format!(
                            "ALTER TABLE {} DROP CHECK {}",
                            table,
                            self.ident(&old_name)
                        ));
                        statements.push(format!(
                            "ALTER TABLE {} ADD {}",
                            table,
                            self.check_clause(&after.name, new)
                        ));
                    }
                }
            }
        }

        statements
    }

    fn drop_constraint(&self, table_name: &str, name: &str) -> String {
        format!("ALTER TABLE {} DROP CONSTRAINT {}", self.ident(table_name), self.ident(name))
    }

    fn primary_key_name(&self, table_name: &str, pk: &PrimaryKey) -> String {
        pk.name
            .clone()
            .unwrap_or_else(|| get_constraint_name("pk", table_name, &pk.columns, self.dialect))
    }

    fn foreign_key_name(&self, table_name: &str, fk: &ForeignKey) -> String {
        fk.name
            .clone()
            .unwrap_or_else(|| get_constraint_name("fk", table_name, &fk.columns, self.dialect))
    }

    fn unique_name(&self, table_name: &str, unique: &Unique) -> String {
        unique
            .name
            .clone()
            .unwrap_or_else(|| get_constraint_name("uq", table_name, &unique.columns, self.dialect))
    }

    fn check_name(&self, table_name: &str, check: &Check) -> String {
        check.name.clone().unwrap_or_else(|| {
            let digest = vec![short_hash(&check.expression.canonical())];
            get_constraint_name("ck", table_name, &digest, self.dialect)
        })
    }

    fn deferral(&self, deferrable: Option<bool>, initially: Option<&String>) -> String {
        // MySQL has no deferred constraints
        if self.dialect == Dialect::MySql {
            return String::new();
        }
        let mut clause = String::new();
        match deferrable {
            Some(true) => clause.push_str(" DEFERRABLE"),
            Some(false) => clause.push_str(" NOT DEFERRABLE"),
            None => {}
        }
        if let Some(initially) = initially {
            clause.push_str(&format!(" INITIALLY {}", initially));
        }
        clause
    }

    fn primary_key_clause(&self, table_name: &str, pk: &PrimaryKey) -> String {
        format!(
            "CONSTRAINT {} PRIMARY KEY ({}){}",
            self.ident(&self.primary_key_name(table_name, pk)),
            self.columns(&pk.columns),
            self.deferral(pk.deferrable, pk.initially.as_ref())
        )
    }

    fn foreign_key_clause(&self, table_name: &str, fk: &ForeignKey) -> String {
        let mut clause = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.ident(&self.foreign_key_name(table_name, fk)),
            self.columns(&fk.columns),
            self.ident(&fk.ref_table),
            self.columns(&fk.ref_columns)
        );
        if let Some(match_type) = &fk.match_type {
            clause.push_str(&format!(" MATCH {}", match_type));
        }
        if let Some(action) = &fk.on_delete {
            clause.push_str(&format!(" ON DELETE {}", action));
        }
        if let Some(action) = &fk.on_update {
            clause.push_str(&format!(" ON UPDATE {}", action));
        }
        clause.push_str(&self.deferral(fk.deferrable, fk.initially.as_ref()));
        clause
    }

    fn unique_clause(&self, table_name: &str, unique: &Unique) -> String {
        format!(
            "CONSTRAINT {} UNIQUE ({}){}",
            self.ident(&self.unique_name(table_name, unique)),
            self.columns(&unique.columns),
            self.deferral(unique.deferrable, unique.initially.as_ref())
        )
    }

    fn check_clause(&self, table_name: &str, check: &Check) -> String {
        format!(
            "CONSTRAINT {} CHECK ({}){}",
            self.ident(&self.check_name(table_name, check)),
            check.expression,
            self.deferral(check.deferrable, check.initially.as_ref())
        )
    }

    fn create_index(&self, table_name: &str, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.ident(&index.name),
            self.ident(table_name),
            self.columns(&index.columns)
        )
    }

    /// Rebuilds a SQLite table into its post-operation shape.
    ///
    /// Creates the new definition under a scratch name, copies the rows of
    /// every surviving column, swaps the tables and recreates the indexes.
    fn rebuild_table(&self, intent: &DdlIntent, schema: &Schema) -> Result<Vec<String>> {
        let Some(before) = intent.table() else {
            return Ok(Vec::new());
        };
        let after = schema.table(&before.name)?;

        let renamed = match intent {
            DdlIntent::AlterColumn { column, changes, .. } => {
                changes.name.as_ref().map(|name| (column.name.as_str(), name.as_str()))
            }
            _ => None,
        };

        let mut targets = Vec::new();
        let mut sources = Vec::new();
        for column in &after.columns {
            let source = match renamed {
                Some((from, to)) if to == column.name => from,
                _ => column.name.as_str(),
            };
            if before.columns.iter().any(|c| c.name == source) {
                targets.push(column.name.clone());
                sources.push(source.to_string());
            }
        }

        let scratch_name = format!("{}{}", REBUILD_PREFIX, after.name);

        let mut statements = vec![self.create_table_as(after, &scratch_name)];
        statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.ident(&scratch_name),
            self.columns(&targets),
            self.columns(&sources),
            self.ident(&before.name)
        ));
        statements.push(format!("DROP TABLE {}", self.ident(&before.name)));
        statements.push(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.ident(&scratch_name),
            self.ident(&after.name)
        ));
        statements.extend(after.indexes.iter().map(|index| self.create_index(&after.name, index)));

        Ok(statements)
    }
}

fn needs_rebuild(intent: &DdlIntent) -> bool {
    matches!(
        intent,
        DdlIntent::DropColumn { .. }
            | DdlIntent::AlterColumn { .. }
            | DdlIntent::AddPrimaryKey { .. }
            | DdlIntent::DropPrimaryKey { .. }
            | DdlIntent::AddForeignKey { .. }
            | DdlIntent::DropForeignKey { .. }
            | DdlIntent::AddUnique { .. }
            | DdlIntent::DropUnique { .. }
            | DdlIntent::AddCheck { .. }
            | DdlIntent::DropCheck { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ops::{
        AddTable, AlterColumn, AlterTable, DropColumn, DropPrimaryKey, DropUnique, Operation,
    };
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("id", "INTEGER").nullable(false))
            .with_column(Column::new("name", "TEXT").nullable(false))
            .with_column(Column::new("email", "TEXT"))
            .with_primary_key(PrimaryKey::new(&["id"]))
            .with_index(Index::new("ix_users_email", &["email"]).unique())
    }

    #[test]
    fn test_create_table_postgres() {
        let generator = SqlGenerator::new(Dialect::Postgres);
        let statements = generator
            .generate(&DdlIntent::CreateTable { table: users() }, &Schema::new())
            .unwrap();

        assert_eq!(
            statements,
            vec![
                "CREATE TABLE \"users\" (\n  \"id\" INTEGER NOT NULL,\n  \"name\" TEXT NOT NULL,\n  \"email\" TEXT,\n  CONSTRAINT \"pk_users_id\" PRIMARY KEY (\"id\")\n)".to_string(),
                "CREATE UNIQUE INDEX \"ix_users_email\" ON \"users\" (\"email\")".to_string(),
            ]
        );
    }

    #[test]
    fn test_alter_column_postgres() {
        let generator = SqlGenerator::new(Dialect::Postgres);
        let table = users();
        let intent = DdlIntent::AlterColumn {
            column: table.column("name").unwrap().clone(),
            changes: ColumnChanges {
                name: Some("full_name".into()),
                nullable: Some(true),
                server_default: Some(Some("''".into())),
                ..Default::default()
            },
            table,
        };
        let mut after = Schema::from_tables([users()]).unwrap();
        after.rename_column("users", "name", "full_name").unwrap();

        let statements = generator.generate(&intent, &after).unwrap();
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"name\" DROP NOT NULL".to_string(),
                "ALTER TABLE \"users\" ALTER COLUMN \"name\" SET DEFAULT ''".to_string(),
                "ALTER TABLE \"users\" RENAME COLUMN \"name\" TO \"full_name\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_mysql_drop_statements() {
        let generator = SqlGenerator::new(Dialect::MySql);
        let table = users();
        let intent = DdlIntent::DropPrimaryKey {
            constraint: table.primary_key().unwrap().clone(),
            table: table.clone(),
        };
        assert_eq!(
            generator.generate(&intent, &Schema::new()).unwrap(),
            vec!["ALTER TABLE `users` DROP PRIMARY KEY".to_string()]
        );

        let intent = DdlIntent::DropIndex { index: table.indexes[0].clone(), table };
        assert_eq!(
            generator.generate(&intent, &Schema::new()).unwrap(),
            vec!["DROP INDEX `ix_users_email` ON `users`".to_string()]
        );
    }

    #[test]
    fn test_sqlite_drop_column_rebuilds_table() {
        let generator = SqlGenerator::new(Dialect::Sqlite);
        let mut schema = Schema::from_tables([users()]).unwrap();
        let before = schema.table("users").unwrap().clone();

        let op: Operation = DropColumn { table_name: "users".into(), column_name: "name".into() }.into();
        op.apply_to(&mut schema).unwrap();

        let intent = DdlIntent::DropColumn {
            column: before.column("name").unwrap().clone(),
            table: before,
        };
        let statements = generator.generate(&intent, &schema).unwrap();

        assert_eq!(statements.len(), 5);
        assert!(statements[0].starts_with("CREATE TABLE \"_schema_rev_rebuild_users\""));
        assert_eq!(
            statements[1],
            "INSERT INTO \"_schema_rev_rebuild_users\" (\"id\", \"email\") SELECT \"id\", \"email\" FROM \"users\""
        );
        assert_eq!(statements[2], "DROP TABLE \"users\"");
        assert_eq!(statements[3], "ALTER TABLE \"_schema_rev_rebuild_users\" RENAME TO \"users\"");
        assert_eq!(statements[4], "CREATE UNIQUE INDEX \"ix_users_email\" ON \"users\" (\"email\")");
    }

    #[test]
    fn test_sqlite_rename_column_copies_from_old_name() {
        let generator = SqlGenerator::new(Dialect::Sqlite);
        let mut schema = Schema::from_tables([users()]).unwrap();
        let before = schema.table("users").unwrap().clone();
        let changes = ColumnChanges { name: Some("full_name".into()), ..Default::default() };

        let op: Operation = AlterColumn {
            table_name: "users".into(),
            column_name: "name".into(),
            changes: changes.clone(),
        }
        .into();
        op.apply_to(&mut schema).unwrap();

        let intent = DdlIntent::AlterColumn {
            column: before.column("name").unwrap().clone(),
            table: before,
            changes,
        };
        let statements = generator.generate(&intent, &schema).unwrap();
        assert_eq!(
            statements[1],
            "INSERT INTO \"_schema_rev_rebuild_users\" (\"id\", \"full_name\", \"email\") SELECT \"id\", \"name\", \"email\" FROM \"users\""
        );
    }

    /// Statements of each operation, replayed in order from an empty model
    fn replay(dialect: Dialect, ops: &[Operation]) -> Vec<Vec<String>> {
        let generator = SqlGenerator::new(dialect);
        let mut schema = Schema::new();
        ops.iter()
            .map(|op| {
                let intent = op.ddl_intent(&schema).unwrap().unwrap();
                op.apply_to(&mut schema).unwrap();
                generator.generate(&intent, &schema).unwrap()
            })
            .collect()
    }

    fn renamed_users() -> Vec<Operation> {
        let users = Table::new("users")
            .with_column(Column::new("id", "INTEGER").nullable(false))
            .with_column(Column::new("email", "TEXT"))
            .with_column(Column::new("parent_id", "INTEGER"))
            .with_primary_key(PrimaryKey::new(&["id"]))
            .with_unique(Unique::new(&["email"]))
            .with_foreign_key(ForeignKey::new(&["parent_id"], "users", &["id"]))
            .with_check(Check::new("id > 0"));

        vec![
            AddTable::from_schema_object(&users).into(),
            AlterTable { table_name: "users".into(), name: Some("accounts".into()) }.into(),
            AlterColumn {
                table_name: "accounts".into(),
                column_name: "email".into(),
                changes: ColumnChanges { name: Some("mail".into()), ..Default::default() },
            }
            .into(),
            DropPrimaryKey { table_name: "accounts".into() }.into(),
            DropUnique { table_name: "accounts".into(), columns: vec!["mail".into()] }.into(),
        ]
    }

    #[test]
    fn test_renames_carry_generated_constraint_names_postgres() {
        let generator = SqlGenerator::new(Dialect::Postgres);
        let check = Check::new("id > 0");
        let (ck_users, ck_accounts) =
            (generator.check_name("users", &check), generator.check_name("accounts", &check));

        let statements = replay(Dialect::Postgres, &renamed_users());

        assert!(statements[0][0].contains("CONSTRAINT \"pk_users_id\" PRIMARY KEY"));
        assert!(statements[0][0].contains("CONSTRAINT \"uq_users_email\" UNIQUE"));
        assert_eq!(
            statements[1],
            vec![
                "ALTER TABLE \"users\" RENAME TO \"accounts\"".to_string(),
                "ALTER TABLE \"accounts\" RENAME CONSTRAINT \"pk_users_id\" TO \"pk_accounts_id\"".to_string(),
                "ALTER TABLE \"accounts\" RENAME CONSTRAINT \"uq_users_email\" TO \"uq_accounts_email\"".to_string(),
                "ALTER TABLE \"accounts\" RENAME CONSTRAINT \"fk_users_parent_id\" TO \"fk_accounts_parent_id\"".to_string(),
                format!("ALTER TABLE \"accounts\" RENAME CONSTRAINT \"{}\" TO \"{}\"", ck_users, ck_accounts),
            ]
        );
        assert_eq!(
            statements[2],
            vec![
                "ALTER TABLE \"accounts\" RENAME COLUMN \"email\" TO \"mail\"".to_string(),
                "ALTER TABLE \"accounts\" RENAME CONSTRAINT \"uq_accounts_email\" TO \"uq_accounts_mail\"".to_string(),
            ]
        );
        assert_eq!(statements[3], vec!["ALTER TABLE \"accounts\" DROP CONSTRAINT \"pk_accounts_id\"".to_string()]);
        assert_eq!(statements[4], vec!["ALTER TABLE \"accounts\" DROP CONSTRAINT \"uq_accounts_mail\"".to_string()]);
    }

    #[test]
    fn test_renames_carry_generated_constraint_names_mysql() {
        let statements = replay(Dialect::MySql, &renamed_users());

        assert_eq!(statements[1][0], "RENAME TABLE `users` TO `accounts`");
        assert!(statements[1].contains(&"ALTER TABLE `accounts` RENAME INDEX `uq_users_email` TO `uq_accounts_email`".to_string()));
        assert!(statements[1].contains(&"ALTER TABLE `accounts` DROP FOREIGN KEY `fk_users_parent_id`".to_string()));
        assert!(statements[1].contains(
            &"ALTER TABLE `accounts` ADD CONSTRAINT `fk_accounts_parent_id` FOREIGN KEY (`parent_id`) REFERENCES `accounts` (`id`)".to_string()
        ));
        assert!(!statements[1].iter().any(|sql| sql.contains("pk_")));

        assert_eq!(
            statements[2][1],
            "ALTER TABLE `accounts` RENAME INDEX `uq_accounts_email` TO `uq_accounts_mail`"
        );
        assert_eq!(statements[4], vec!["ALTER TABLE `accounts` DROP INDEX `uq_accounts_mail`".to_string()]);
    }

    #[test]
    fn test_named_constraints_are_not_renamed() {
        let users = Table::new("users")
            .with_column(Column::new("id", "INTEGER").nullable(false))
            .with_primary_key(PrimaryKey::new(&["id"]).named("users_pkey"));
        let ops: Vec<Operation> = vec![
            AddTable::from_schema_object(&users).into(),
            AlterTable { table_name: "users".into(), name: Some("accounts".into()) }.into(),
            DropPrimaryKey { table_name: "accounts".into() }.into(),
        ];

        let statements = replay(Dialect::Postgres, &ops);
        assert_eq!(statements[1], vec!["ALTER TABLE \"users\" RENAME TO \"accounts\"".to_string()]);
        assert_eq!(statements[2], vec!["ALTER TABLE \"accounts\" DROP CONSTRAINT \"users_pkey\"".to_string()]);
    }

    #[test]
    fn test_unnamed_check_gets_stable_name() {
        let generator = SqlGenerator::new(Dialect::Postgres);
        let a = generator.check_name("users", &Check::new("id > 0"));
        let b = generator.check_name("users", &Check::new("(id  > 0)"));
        assert_eq!(a, b);
        assert!(a.starts_with("ck_users_"));
    }
}
