pub use sea_orm_migration::prelude::*;

mod m20250912_000001_create_users;
mod m20250912_000002_create_movies;
mod m20250912_000003_create_reviews;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250912_000001_create_users::Migration),
            Box::new(m20250912_000002_create_movies::Migration),
            Box::new(m20250912_000003_create_reviews::Migration),
        ]
    }
}
