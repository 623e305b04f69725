//! Create roles table and seed the three built-in roles.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// (name, level, description)
const SEED_ROLES: [(&str, i32, &str); 3] = [
    ("user", 1, "A user can create posts and comments"),
    ("moderator", 2, "A moderator can update other users posts"),
    ("admin", 3, "An admin can update and delete other users posts"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Roles::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Roles::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Roles::Level).integer().not_null().default(0))
                    .col(ColumnDef::new(Roles::Description).text().not_null().default(""))
                    .to_owned(),
            )
            .await?;

        let mut insert = Query::insert();
        insert
            .into_table(Roles::Table)
            .columns([Roles::Name, Roles::Level, Roles::Description])
            .on_conflict(OnConflict::column(Roles::Name).do_nothing().to_owned());
        for (name, level, description) in SEED_ROLES {
            insert.values_panic([name.into(), level.into(), description.into()]);
        }
        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Roles::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Roles {
    Table,
    Id,
    Name,
    Level,
    Description,
}
