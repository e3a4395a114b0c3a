use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // users 表
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(User::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(User::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(User::PasswordHash).string().not_null())
                    .col(ColumnDef::new(User::Role).string().not_null())
                    .col(ColumnDef::new(User::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        // accounts 表
        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Account::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Account::Name).string().not_null())
                    .col(ColumnDef::new(Account::Token).string().null())
                    .col(ColumnDef::new(Account::Ciphertext).string().null())
                    .col(ColumnDef::new(Account::Nonce).string().null())
                    .col(ColumnDef::new(Account::UserId).big_integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_accounts_user")
                            .from(Account::Table, Account::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // config 表（键值对，管理员凭证等）
        manager
            .create_table(
                Table::create()
                    .table(Config::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Config::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Config::Value).string().not_null())
                    .to_owned(),
            )
            .await?;

        // webhooks 表
        manager
            .create_table(
                Table::create()
                    .table(Webhook::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Webhook::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Webhook::UserId).big_integer().null())
                    .col(ColumnDef::new(Webhook::Name).string().not_null())
                    .col(ColumnDef::new(Webhook::Url).string().not_null())
                    .col(ColumnDef::new(Webhook::Secret).string().null())
                    .col(
                        ColumnDef::new(Webhook::Events)
                            .string()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Webhook::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Webhook::CreatedAt).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_webhooks_user")
                            .from(Webhook::Table, Webhook::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // usage_history 表
        manager
            .create_table(
                Table::create()
                    .table(UsageHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageHistory::AccountName).string().not_null())
                    .col(ColumnDef::new(UsageHistory::UsageAmount).double().not_null())
                    .col(ColumnDef::new(UsageHistory::RecordedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_usage_history_account_recorded")
                    .table(UsageHistory::Table)
                    .col(UsageHistory::AccountName)
                    .col(UsageHistory::RecordedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Webhook::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Config::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Account::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum User {
    #[sea_orm(iden = "users")]
    Table,
    Id,
    Username,
    PasswordHash,
    Role,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Account {
    #[sea_orm(iden = "accounts")]
    Table,
    Id,
    Name,
    Token,
    Ciphertext,
    Nonce,
    UserId,
}

#[derive(DeriveIden)]
enum Config {
    #[sea_orm(iden = "config")]
    Table,
    Key,
    Value,
}

#[derive(DeriveIden)]
enum Webhook {
    #[sea_orm(iden = "webhooks")]
    Table,
    Id,
    UserId,
    Name,
    Url,
    Secret,
    Events,
    Enabled,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UsageHistory {
    #[sea_orm(iden = "usage_history")]
    Table,
    Id,
    AccountName,
    UsageAmount,
    RecordedAt,
}
