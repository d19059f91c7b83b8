//! Schema difference calculator
//!
//! Matches the objects of two schemas by identity key and emits the
//! operations turning the old schema into the new one, in a fixed order:
//! drops (children first), then adds (parents first), then alters.
//!
//! Children of a table that exists on one side only are implied by the
//! table-level operation, except foreign keys. Those are always emitted on
//! their own so that constraints between tables created or dropped in the
//! same batch are ordered after every table they reference.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::schema::keys::ObjectKey;
use crate::schema::ops::{
    AddCheck, AddColumn, AddForeignKey, AddIndex, AddPrimaryKey, AddTable, AddUnique,
    AlterColumn, ColumnChanges, DropCheck, DropColumn, DropForeignKey, DropIndex, DropPrimaryKey,
    DropTable, DropUnique, Operation,
};
use crate::schema::types::{Schema, Table, TableObject};

/// Ordered operations turning one schema into another
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    operations: Vec<Operation>,
}

impl SchemaDiff {
    /// Generate a schema diff between two schemas
    pub fn generate(old: &Schema, new: &Schema) -> Result<Self> {
        let mut operations = Vec::new();

        diff_tables(old, new, &mut operations);
        diff_children(old, new, |t| t.columns.as_slice(), false, &mut operations, |table, old, new| {
            match (old, new) {
                (Some(old), None) => vec![DropColumn::from_schema_object(table, old).into()],
                (None, Some(new)) => vec![AddColumn::from_schema_object(table, new).into()],
                (Some(old), Some(new)) => {
                    vec![AlterColumn::from_schema_object(table, old, ColumnChanges::between(old, new)).into()]
                }
                (None, None) => Vec::new(),
            }
        })?;
        diff_children(old, new, primary_key, false, &mut operations, |table, old, new| {
            replace(
                old.map(|pk| DropPrimaryKey::from_schema_object(table, pk).into()),
                new.map(|pk| AddPrimaryKey::from_schema_object(table, pk).into()),
            )
        })?;
        diff_children(old, new, |t| t.foreign_keys.as_slice(), true, &mut operations, |table, old, new| {
            replace(
                old.map(|fk| DropForeignKey::from_schema_object(table, fk).into()),
                new.map(|fk| AddForeignKey::from_schema_object(table, fk).into()),
            )
        })?;
        diff_children(old, new, |t| t.uniques.as_slice(), false, &mut operations, |table, old, new| {
            replace(
                old.map(|u| DropUnique::from_schema_object(table, u).into()),
                new.map(|u| AddUnique::from_schema_object(table, u).into()),
            )
        })?;
        diff_children(old, new, |t| t.checks.as_slice(), false, &mut operations, |table, old, new| {
            replace(
                old.map(|c| DropCheck::from_schema_object(table, c).into()),
                new.map(|c| AddCheck::from_schema_object(table, c).into()),
            )
        })?;
        diff_children(old, new, |t| t.indexes.as_slice(), false, &mut operations, |table, old, new| {
            replace(
                old.map(|i| DropIndex::from_schema_object(table, i).into()),
                new.map(|i| AddIndex::from_schema_object(table, i).into()),
            )
        })?;

        sort_operations(&mut operations);

        tracing::debug!(operations = operations.len(), "Computed schema diff");
        Ok(Self { operations })
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }
}

/// Operations turning `old` into `new`
pub fn diff(old: &Schema, new: &Schema) -> Result<Vec<Operation>> {
    Ok(SchemaDiff::generate(old, new)?.into_operations())
}

/// Stable sort by bucket priority, then by the target's identity key
pub fn sort_operations(operations: &mut [Operation]) {
    operations.sort_by(|a, b| {
        a.priority()
            .cmp(&b.priority())
            .then_with(|| a.identity_key().cmp(&b.identity_key()))
    });
}

fn diff_tables(old: &Schema, new: &Schema, operations: &mut Vec<Operation>) {
    let mut names: Vec<&String> = old.tables.keys().chain(new.tables.keys()).collect();
    names.sort();
    names.dedup();

    for name in names {
        match (old.tables.get(name), new.tables.get(name)) {
            (Some(table), None) => operations.push(DropTable::from_schema_object(table).into()),
            (None, Some(table)) => {
                let mut created = table.clone();
                created.foreign_keys.clear();
                operations.push(AddTable::from_schema_object(&created).into());
            }
            // Matching tables are compared member by member
            _ => {}
        }
    }
}

/// Diffs one kind of table member across both schemas.
///
/// `emit` receives every key present on either side and returns the
/// operations for it; unchanged pairs are skipped before `emit` is called.
fn diff_children<'a, T, F, E>(
    old: &'a Schema,
    new: &'a Schema,
    members: F,
    keep_orphans: bool,
    operations: &mut Vec<Operation>,
    emit: E,
) -> Result<()>
where
    T: TableObject + 'a,
    F: Fn(&'a Table) -> &'a [T],
    E: Fn(&str, Option<&T>, Option<&T>) -> Vec<Operation>,
{
    let old_members = index_members(old, &members)?;
    let new_members = index_members(new, &members)?;

    let mut merged: BTreeMap<&ObjectKey, (Option<&T>, Option<&T>)> = BTreeMap::new();
    for (key, member) in &old_members {
        merged.entry(key).or_default().0 = Some(*member);
    }
    for (key, member) in &new_members {
        merged.entry(key).or_default().1 = Some(*member);
    }

    for (key, pair) in merged {
        let table = key.table();
        let on_both_sides = old.contains_table(table) && new.contains_table(table);
        if !on_both_sides && !keep_orphans {
            continue;
        }
        match pair {
            (Some(a), Some(b)) if a == b => {}
            (old_member, new_member) => operations.extend(emit(table, old_member, new_member)),
        }
    }

    Ok(())
}

/// Map of identity key to member for one schema, rejecting duplicates
fn index_members<'a, T, F>(schema: &'a Schema, members: &F) -> Result<BTreeMap<ObjectKey, &'a T>>
where
    T: TableObject + 'a,
    F: Fn(&'a Table) -> &'a [T],
{
    let mut indexed = BTreeMap::new();
    for table in schema.tables.values() {
        for member in members(table) {
            let key = member.key(&table.name);
            if indexed.contains_key(&key) {
                return Err(Error::duplicate(key.kind(), key.to_string()));
            }
            indexed.insert(key, member);
        }
    }
    Ok(indexed)
}

fn primary_key(table: &Table) -> &[crate::schema::types::PrimaryKey] {
    match &table.primary_key {
        Some(pk) => std::slice::from_ref(pk),
        None => &[],
    }
}

/// Drop followed by add, for members without an in-place alter
fn replace(drop: Option<Operation>, add: Option<Operation>) -> Vec<Operation> {
    drop.into_iter().chain(add).collect()
}
