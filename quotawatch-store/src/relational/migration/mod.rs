//! Schema migrations for the relational backend.

mod m20250901_000001_create_initial_tables;

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250901_000001_create_initial_tables::Migration)]
    }
}
