//! Human-readable rendering of operations
//!
//! Each operation prints as a constructor call with its positional
//! arguments followed by keyword arguments that differ from their default:
//!
//! ```text
//! AddColumn("users", Column("email", "TEXT", nullable=false))
//! ```

use std::fmt;

use crate::schema::ops::{DataAction, Operation};
use crate::schema::types::{Check, Column, ForeignKey, Index, PrimaryKey, Table, Unique};

/// A constructor call under construction
struct Call {
    name: &'static str,
    args: Vec<String>,
}

impl Call {
    fn new(name: &'static str) -> Self {
        Self { name, args: Vec::new() }
    }

    fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    fn text(self, value: &str) -> Self {
        self.arg(format!("{:?}", value))
    }

    fn list(self, values: &[String]) -> Self {
        self.arg(format!("{:?}", values))
    }

    /// Keyword argument whose default is `None`
    fn opt<T: fmt::Debug>(mut self, key: &str, value: &Option<T>) -> Self {
        if let Some(value) = value {
            self.args.push(format!("{}={:?}", key, value));
        }
        self
    }

    /// Keyword argument for a boolean with the given default
    fn flag(mut self, key: &str, value: bool, default: bool) -> Self {
        if value != default {
            self.args.push(format!("{}={}", key, value));
        }
        self
    }

    /// Keyword argument for an unchanged-or-nullable value
    fn change(mut self, key: &str, value: &Option<Option<String>>) -> Self {
        match value {
            Some(Some(value)) => self.args.push(format!("{}={:?}", key, value)),
            Some(None) => self.args.push(format!("{}=None", key)),
            None => {}
        }
        self
    }

    fn objects<T>(mut self, key: &str, values: &[T], render: impl Fn(&T) -> Call) -> Self {
        if !values.is_empty() {
            let rendered: Vec<String> = values.iter().map(|v| render(v).to_string()).collect();
            self.args.push(format!("{}=[{}]", key, rendered.join(", ")));
        }
        self
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(", "))
    }
}

fn column(column: &Column) -> Call {
    Call::new("Column")
        .text(&column.name)
        .text(column.data_type.as_str())
        .flag("nullable", column.nullable, true)
        .opt("server_default", &column.server_default)
        .opt("server_onupdate", &column.server_onupdate)
}

fn primary_key(pk: &PrimaryKey) -> Call {
    Call::new("PrimaryKey")
        .list(&pk.columns)
        .opt("name", &pk.name)
        .opt("deferrable", &pk.deferrable)
        .opt("initially", &pk.initially)
}

fn foreign_key(fk: &ForeignKey) -> Call {
    Call::new("ForeignKey")
        .list(&fk.columns)
        .text(&fk.ref_table)
        .list(&fk.ref_columns)
        .opt("name", &fk.name)
        .opt("on_update", &fk.on_update)
        .opt("on_delete", &fk.on_delete)
        .opt("deferrable", &fk.deferrable)
        .opt("initially", &fk.initially)
        .opt("match_type", &fk.match_type)
}

fn unique(unique: &Unique) -> Call {
    Call::new("Unique")
        .list(&unique.columns)
        .opt("name", &unique.name)
        .opt("deferrable", &unique.deferrable)
        .opt("initially", &unique.initially)
}

fn check(check: &Check) -> Call {
    Call::new("Check")
        .text(check.expression.as_str())
        .opt("name", &check.name)
        .opt("deferrable", &check.deferrable)
        .opt("initially", &check.initially)
}

fn index(index: &Index) -> Call {
    Call::new("Index")
        .text(&index.name)
        .list(&index.columns)
        .flag("unique", index.unique, false)
}

fn table(table: &Table) -> Call {
    let mut call = Call::new("Table").text(&table.name);
    let columns: Vec<String> = table.columns.iter().map(|c| column(c).to_string()).collect();
    call = call.arg(format!("[{}]", columns.join(", ")));
    if let Some(pk) = &table.primary_key {
        call = call.arg(format!("primary_key={}", primary_key(pk)));
    }
    call.objects("foreign_keys", &table.foreign_keys, foreign_key)
        .objects("uniques", &table.uniques, unique)
        .objects("checks", &table.checks, check)
        .objects("indexes", &table.indexes, index)
}

fn data_action(action: &Option<DataAction>) -> String {
    match action {
        None => "None".to_string(),
        Some(DataAction::Sql(sql)) => format!("{:?}", sql),
        Some(DataAction::Callback(_)) => "<callback>".to_string(),
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let call = match self {
            Operation::AddTable(op) => Call::new("AddTable").arg(table(&op.table)),
            Operation::DropTable(op) => Call::new("DropTable").text(&op.table_name),
            Operation::AlterTable(op) => {
                Call::new("AlterTable").text(&op.table_name).opt("name", &op.name)
            }
            Operation::AddColumn(op) => {
                Call::new("AddColumn").text(&op.table_name).arg(column(&op.column))
            }
            Operation::DropColumn(op) => {
                Call::new("DropColumn").text(&op.table_name).text(&op.column_name)
            }
            Operation::AlterColumn(op) => Call::new("AlterColumn")
                .text(&op.table_name)
                .text(&op.column_name)
                .opt("name", &op.changes.name)
                .opt("data_type", &op.changes.data_type.as_ref().map(|t| t.to_string()))
                .opt("nullable", &op.changes.nullable)
                .change("server_default", &op.changes.server_default)
                .change("server_onupdate", &op.changes.server_onupdate),
            Operation::AddPrimaryKey(op) => {
                Call::new("AddPrimaryKey").text(&op.table_name).arg(primary_key(&op.constraint))
            }
            Operation::DropPrimaryKey(op) => Call::new("DropPrimaryKey").text(&op.table_name),
            Operation::AddForeignKey(op) => {
                Call::new("AddForeignKey").text(&op.table_name).arg(foreign_key(&op.constraint))
            }
            Operation::DropForeignKey(op) => Call::new("DropForeignKey")
                .text(&op.table_name)
                .list(&op.columns)
                .text(&op.ref_table)
                .list(&op.ref_columns),
            Operation::AddUnique(op) => {
                Call::new("AddUnique").text(&op.table_name).arg(unique(&op.constraint))
            }
            Operation::DropUnique(op) => {
                Call::new("DropUnique").text(&op.table_name).list(&op.columns)
            }
            Operation::AddCheck(op) => {
                Call::new("AddCheck").text(&op.table_name).arg(check(&op.constraint))
            }
            Operation::DropCheck(op) => {
                Call::new("DropCheck").text(&op.table_name).text(op.expression.as_str())
            }
            Operation::AddIndex(op) => {
                Call::new("AddIndex").text(&op.table_name).arg(index(&op.index))
            }
            Operation::DropIndex(op) => {
                Call::new("DropIndex").text(&op.table_name).text(&op.index_name)
            }
            Operation::Data(op) => {
                let call = Call::new("DataOperation").arg(data_action(&op.forwards));
                match &op.backwards {
                    Some(_) => call.arg(data_action(&op.backwards)),
                    None => call,
                }
            }
        };
        write!(f, "{}", call)
    }
}
