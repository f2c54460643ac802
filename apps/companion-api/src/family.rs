//! Vínculos de familiares e cuidadores
//!
//! Um vínculo dá a outro usuário acesso de leitura (ou gestão) sobre os
//! dados de quem o criou; é também a fonte do fan-out das notificações de
//! estoque baixo.

use chrono::Utc;
use common_db::error::DbError;
use common_db::models::{AccessLevel, FamilyMember};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Cria um vínculo com outro usuário
///
/// Vínculo duplicado para o mesmo par de usuários vira [`DbError::Conflict`]
/// pelo índice único da tabela.
pub async fn link_member(
    pool: &SqlitePool,
    user_id: i64,
    member_user_id: i64,
    member_name: &str,
    access_level: AccessLevel,
) -> Result<FamilyMember, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO family_members (id, user_id, member_user_id, member_name, access_level, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(member_user_id)
    .bind(member_name)
    .bind(access_level.to_string())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(FamilyMember {
        id,
        user_id,
        member_user_id,
        member_name: member_name.to_string(),
        access_level,
        created_at: now,
    })
}

/// Vínculos criados pelo usuário
pub async fn list_members(pool: &SqlitePool, user_id: i64) -> Result<Vec<FamilyMember>, DbError> {
    let members = sqlx::query_as::<_, FamilyMember>(
        "SELECT id, user_id, member_user_id, member_name, access_level, created_at
         FROM family_members WHERE user_id = ? ORDER BY member_name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

/// Familiares com acesso de gestão ou visualização, destinatários do fan-out
pub async fn members_with_access(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<FamilyMember>, DbError> {
    let members = sqlx::query_as::<_, FamilyMember>(
        "SELECT id, user_id, member_user_id, member_name, access_level, created_at
         FROM family_members
         WHERE user_id = ? AND access_level IN ('manage', 'view')",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(members)
}
