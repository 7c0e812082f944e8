use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_auto(Movies::Id))
                    .col(big_integer(Movies::ApiId))
                    .col(string(Movies::Title))
                    .col(string_null(Movies::PosterPath))
                    .col(text_null(Movies::Description))
                    .col(string_null(Movies::ReleaseDate))
                    .col(big_integer(Movies::CreatedAt))
                    .col(big_integer(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Upserts conflict on this index.
        manager
            .create_index(
                Index::create()
                    .name("idx_movies_api_id_unique")
                    .table(Movies::Table)
                    .col(Movies::ApiId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_title")
                    .table(Movies::Table)
                    .col(Movies::Title)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Movies {
    Table,
    Id,
    ApiId,
    Title,
    PosterPath,
    Description,
    ReleaseDate,
    CreatedAt,
    UpdatedAt,
}
