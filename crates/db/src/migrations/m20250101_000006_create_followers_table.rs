//! Create followers table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Followers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Followers::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Followers::FollowerId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Followers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // Composite key rejects duplicate follows
                    .primary_key(
                        Index::create()
                            .name("pk_followers")
                            .col(Followers::UserId)
                            .col(Followers::FollowerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_followers_user")
                            .from(Followers::Table, Followers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_followers_follower")
                            .from(Followers::Table, Followers::FollowerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: follower_id (feed lookup of followed users)
        manager
            .create_index(
                Index::create()
                    .name("idx_followers_follower_id")
                    .table(Followers::Table)
                    .col(Followers::FollowerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Followers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Followers {
    Table,
    UserId,
    FollowerId,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
