mod common;

use pretty_assertions::assert_eq;
use rstest::*;

use schema_rev::migrations::{MemoryStore, MigrationLog};
use schema_rev::schema::ops::{AddColumn, DropColumn, Operation};
use schema_rev::schema::types::{Check, Column, ForeignKey, Index, PrimaryKey, Table, Unique};
use schema_rev::schema::{diff, Schema};

use common::{posts, users};

fn simple_users() -> Table {
    Table::new("users")
        .with_column(Column::new("id", "INTEGER").nullable(false))
        .with_column(Column::new("name", "TEXT").nullable(false))
        .with_primary_key(PrimaryKey::new(&["id"]))
}

fn replay(schema: &Schema, operations: &[Operation]) -> Schema {
    let mut schema = schema.clone();
    for op in operations {
        op.apply_to(&mut schema).unwrap();
    }
    schema
}

fn blog() -> Schema {
    Schema::from_tables([users(), posts()]).unwrap()
}

fn blog_v2() -> Schema {
    let mut users = users()
        .with_column(Column::new("created_at", "TIMESTAMP").server_default("CURRENT_TIMESTAMP"));
    users.indexes.clear();
    users.checks = vec![Check::new("length(name) > 1")];

    let posts = Table::new("posts")
        .with_column(Column::new("id", "BIGINT").nullable(false))
        .with_column(Column::new("author_id", "INTEGER"))
        .with_column(Column::new("title", "VARCHAR(200)").nullable(false))
        .with_primary_key(PrimaryKey::new(&["id", "author_id"]))
        .with_foreign_key(ForeignKey::new(&["author_id"], "users", &["id"]))
        .with_unique(Unique::new(&["title"]))
        .with_index(Index::new("ix_posts_author", &["author_id"]));

    let tags = Table::new("tags")
        .with_column(Column::new("post_id", "BIGINT"))
        .with_column(Column::new("label", "TEXT"))
        .with_foreign_key(ForeignKey::new(&["post_id"], "posts", &["id"]));

    Schema::from_tables([users, posts, tags]).unwrap()
}

#[test]
fn test_scenario_new_table_then_same_definition_is_empty() {
    let head = Schema::from_tables([simple_users()]).unwrap();

    let operations = diff(&Schema::new(), &head).unwrap();
    let migrated = replay(&Schema::new(), &operations);
    assert_eq!(migrated, head);

    assert_eq!(diff(&migrated, &head).unwrap(), Vec::<Operation>::new());
}

#[test]
fn test_scenario_added_column_and_its_reverse() {
    let old = Schema::from_tables([simple_users()]).unwrap();
    let new = Schema::from_tables([simple_users().with_column(Column::new("email", "TEXT"))]).unwrap();

    let operations = diff(&old, &new).unwrap();
    assert_eq!(
        operations,
        vec![Operation::from(AddColumn::from_schema_object("users", &Column::new("email", "TEXT")))]
    );
    assert_eq!(operations[0].to_string(), r#"AddColumn("users", Column("email", "TEXT"))"#);

    let mut model = old.clone();
    let reverse = operations[0].derive_reverse(&model).unwrap();
    operations[0].apply_to(&mut model).unwrap();
    assert_eq!(model, new);

    assert_eq!(
        reverse,
        Operation::from(DropColumn { table_name: "users".into(), column_name: "email".into() })
    );
    reverse.apply_to(&mut model).unwrap();
    assert_eq!(model, old);
}

#[test]
fn test_scenario_renamed_column_is_a_drop_and_an_add() {
    let old = Schema::from_tables([simple_users()]).unwrap();
    let mut renamed = simple_users();
    renamed.columns[1].name = "full_name".into();
    let new = Schema::from_tables([renamed]).unwrap();

    // Matching is by name only, so renames are never inferred
    assert_eq!(
        diff(&old, &new).unwrap(),
        vec![
            Operation::from(DropColumn { table_name: "users".into(), column_name: "name".into() }),
            Operation::from(AddColumn::from_schema_object(
                "users",
                &Column::new("full_name", "TEXT").nullable(false)
            )),
        ]
    );
}

#[rstest]
#[case::empty(Schema::new())]
#[case::single(Schema::from_tables([simple_users()]).unwrap())]
#[case::blog(blog())]
#[case::blog_v2(blog_v2())]
fn test_diff_of_identical_models_is_empty(#[case] schema: Schema) {
    assert_eq!(diff(&schema, &schema.clone()).unwrap(), Vec::<Operation>::new());
}

#[rstest]
#[case::create_everything(Schema::new(), blog_v2())]
#[case::drop_everything(blog_v2(), Schema::new())]
#[case::evolve(blog(), blog_v2())]
#[case::devolve(blog_v2(), blog())]
#[case::drop_referencing_table(blog(), Schema::from_tables([users()]).unwrap())]
fn test_replaying_diff_reaches_target(#[case] old: Schema, #[case] new: Schema) {
    let operations = diff(&old, &new).unwrap();
    assert_eq!(replay(&old, &operations), new);
}

#[rstest]
#[case::evolve(blog(), blog_v2())]
#[case::devolve(blog_v2(), blog())]
fn test_diff_is_deterministic(#[case] old: Schema, #[case] new: Schema) {
    let first = diff(&old, &new).unwrap();
    let second = diff(&old.clone(), &new.clone()).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_rollback_is_reverse_of_roll_forward() {
    let store = MemoryStore::new();
    let mut log = MigrationLog::default();
    let models = [
        Schema::from_tables([simple_users()]).unwrap(),
        Schema::from_tables([users()]).unwrap(),
        blog(),
        blog_v2(),
        Schema::from_tables([users()]).unwrap(),
    ];

    let mut previous = Schema::new();
    for model in &models {
        log.append(&store, diff(&previous, model).unwrap()).unwrap();
        previous = model.clone();
    }
    assert_eq!(log.len(), 5);

    let mut model = log.replay(2).unwrap();
    let mut reverses = Vec::new();
    for op in log.collect_operations(2, 5).unwrap() {
        reverses.push(op.derive_reverse(&model).unwrap());
        op.apply_to(&mut model).unwrap();
    }
    reverses.reverse();

    assert_eq!(log.collect_operations(5, 2).unwrap(), reverses);
    assert_eq!(replay(&log.replay(5).unwrap(), &reverses), log.replay(2).unwrap());
}
