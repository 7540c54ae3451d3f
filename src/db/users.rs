use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::error::{AppError, Result};
use crate::models::{Role, User};

const COLUMNS: &str = "id, username, firstname, lastname, hashed_password, role";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    firstname: String,
    lastname: String,
    hashed_password: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            username: row.username,
            firstname: row.firstname,
            lastname: row.lastname,
            hashed_password: row.hashed_password,
            role: parse_enum(&row.role)?,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, username, firstname, lastname, hashed_password, role) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(&user.firstname)
    .bind(&user.lastname)
    .bind(&user.hashed_password)
    .bind(user.role.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {COLUMNS} FROM users WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;
    row.map(User::try_from).transpose()
}

/// 指定ロールのユーザーを探す。いない・ロールが違うなら None
pub async fn find_with_role(conn: &mut SqliteConnection, id: Uuid, role: Role) -> Result<Option<User>> {
    Ok(find(conn, id).await?.filter(|user| user.role == role))
}

pub async fn find_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<User>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(conn)
            .await?;
    row.map(User::try_from).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!("SELECT {COLUMNS} FROM users ORDER BY username"))
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(User::try_from).collect()
}

pub async fn list_by_role(conn: &mut SqliteConnection, role: Role) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM users WHERE role = ? ORDER BY username"
    ))
    .bind(role.as_str())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(User::try_from).collect()
}

pub async fn update(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query(
        "UPDATE users SET username = ?, firstname = ?, lastname = ?, hashed_password = ?, role = ? WHERE id = ?",
    )
    .bind(&user.username)
    .bind(&user.firstname)
    .bind(&user.lastname)
    .bind(&user.hashed_password)
    .bind(user.role.as_str())
    .bind(user.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

/// 削除できたら true
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
