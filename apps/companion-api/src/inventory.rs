//! Estoque de medicações e notificações de estoque baixo
//!
//! Duas portas de escrita alimentam o estoque: o decremento atômico usado
//! quando uma dose é marcada como tomada e a atualização absoluta usada
//! pelos endpoints de edição, retirada e reposição. As duas passam pela
//! mesma verificação de limite: toda escrita que deixa o estoque igual ou
//! abaixo do limite gera uma nova notificação, sem deduplicação.

use chrono::Utc;
use common_db::error::DbError;
use common_db::models::{InventoryItem, InventoryNotification};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::family;

/// Dados para criação de um item de estoque
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub user_id: i64,
    pub medication_id: Option<Uuid>,
    pub medication_name: String,
    pub current_stock: i64,
    pub low_stock_threshold: Option<i64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

/// Campos alteráveis de um item; `None` mantém o valor atual
#[derive(Debug, Clone, Default)]
pub struct InventoryUpdate {
    pub medication_name: Option<String>,
    pub current_stock: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

/// Cria um item de estoque
///
/// Criação não dispara notificação, mesmo nascendo abaixo do limite: o
/// alerta pertence às escritas de atualização e decremento.
pub async fn create_item(
    pool: &SqlitePool,
    new: NewInventoryItem,
) -> Result<InventoryItem, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let threshold = new.low_stock_threshold.unwrap_or(5);
    let unit = new.unit.unwrap_or_else(|| "pills".to_string());

    sqlx::query(
        "INSERT INTO medication_inventory
            (id, user_id, medication_id, medication_name, current_stock,
             low_stock_threshold, unit, notes, last_updated, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(id)
    .bind(new.user_id)
    .bind(new.medication_id)
    .bind(&new.medication_name)
    .bind(new.current_stock)
    .bind(threshold)
    .bind(&unit)
    .bind(&new.notes)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(InventoryItem {
        id,
        user_id: new.user_id,
        medication_id: new.medication_id,
        medication_name: new.medication_name,
        current_stock: new.current_stock,
        low_stock_threshold: threshold,
        unit,
        notes: new.notes,
        last_updated: now,
        is_active: true,
        created_at: now,
    })
}

const ITEM_COLUMNS: &str = "id, user_id, medication_id, medication_name, current_stock,
     low_stock_threshold, unit, notes, last_updated, is_active, created_at";

/// Busca um item ativo do usuário
pub async fn get_item(
    pool: &SqlitePool,
    inventory_id: Uuid,
    user_id: i64,
) -> Result<Option<InventoryItem>, DbError> {
    let item = sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {} FROM medication_inventory WHERE id = ? AND user_id = ? AND is_active = 1",
        ITEM_COLUMNS
    ))
    .bind(inventory_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}

/// Itens ativos do usuário
pub async fn list_items(pool: &SqlitePool, user_id: i64) -> Result<Vec<InventoryItem>, DbError> {
    let items = sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {} FROM medication_inventory
         WHERE user_id = ? AND is_active = 1 ORDER BY medication_name",
        ITEM_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// Decrementa o estoque após uma dose marcada como tomada
///
/// Decremento condicionado no próprio UPDATE: só desconta onde
/// `current_stock >= quantidade`, então este caminho nunca deixa o estoque
/// negativo. Estoque insuficiente (ou item inexistente) não é erro: a
/// função devolve `false` e nada muda.
pub async fn decrement_after_taken(
    pool: &SqlitePool,
    medication_id: Uuid,
    user_id: i64,
    quantity: i64,
) -> Result<bool, DbError> {
    if quantity <= 0 {
        return Ok(false);
    }

    let result = sqlx::query(
        "UPDATE medication_inventory
         SET current_stock = current_stock - ?1, last_updated = ?2
         WHERE user_id = ?3 AND medication_id = ?4 AND is_active = 1
           AND current_stock >= ?1",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(user_id)
    .bind(medication_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    let item = sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {} FROM medication_inventory
         WHERE user_id = ? AND medication_id = ? AND is_active = 1",
        ITEM_COLUMNS
    ))
    .bind(user_id)
    .bind(medication_id)
    .fetch_optional(pool)
    .await?;

    if let Some(item) = item {
        notify_if_low(pool, &item).await;
    }

    Ok(true)
}

/// Atualização absoluta de um item (edição, retirada, reposição)
///
/// O valor final de `current_stock` vem calculado pelo chamador; valor
/// negativo é recusado aqui antes de qualquer escrita, e o CHECK da coluna
/// segura o que escapar. Devolve `false` quando nada foi atualizado.
pub async fn apply_manual_update(
    pool: &SqlitePool,
    inventory_id: Uuid,
    user_id: i64,
    update: InventoryUpdate,
) -> Result<bool, DbError> {
    if matches!(update.current_stock, Some(stock) if stock < 0) {
        return Ok(false);
    }
    if matches!(update.low_stock_threshold, Some(threshold) if threshold < 0) {
        return Ok(false);
    }

    let result = sqlx::query(
        "UPDATE medication_inventory
         SET medication_name = COALESCE(?, medication_name),
             current_stock = COALESCE(?, current_stock),
             low_stock_threshold = COALESCE(?, low_stock_threshold),
             unit = COALESCE(?, unit),
             notes = COALESCE(?, notes),
             last_updated = ?
         WHERE id = ? AND user_id = ? AND is_active = 1",
    )
    .bind(&update.medication_name)
    .bind(update.current_stock)
    .bind(update.low_stock_threshold)
    .bind(&update.unit)
    .bind(&update.notes)
    .bind(Utc::now())
    .bind(inventory_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    if let Some(item) = get_item(pool, inventory_id, user_id).await? {
        notify_if_low(pool, &item).await;
    }

    Ok(true)
}

/// Desativa um item (soft delete)
///
/// O registro permanece para que notificações antigas continuem resolvendo
/// o item que as originou.
pub async fn deactivate_item(
    pool: &SqlitePool,
    inventory_id: Uuid,
    user_id: i64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE medication_inventory
         SET is_active = 0, last_updated = ?
         WHERE id = ? AND user_id = ? AND is_active = 1",
    )
    .bind(Utc::now())
    .bind(inventory_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn notify_if_low(pool: &SqlitePool, item: &InventoryItem) {
    if item.current_stock > item.low_stock_threshold {
        return;
    }

    // Falha na notificação não desfaz nem falha a escrita de estoque
    if let Err(e) = create_low_stock_notification(
        pool,
        item.id,
        item.user_id,
        &item.medication_name,
        item.current_stock,
        &item.unit,
    )
    .await
    {
        warn!(
            "Falha ao registrar notificação de estoque baixo para {}: {}",
            item.id, e
        );
    }
}

/// Registra a notificação de estoque baixo do dono e as cópias dos
/// familiares com acesso de gestão ou visualização
///
/// Sempre grava quando chamada: travessias repetidas do limite geram
/// notificações repetidas.
pub async fn create_low_stock_notification(
    pool: &SqlitePool,
    inventory_id: Uuid,
    user_id: i64,
    medication_name: &str,
    current_stock: i64,
    unit: &str,
) -> Result<(), DbError> {
    let message = format!(
        "Estoque baixo: {} com {} {} restantes",
        medication_name, current_stock, unit
    );

    insert_notification(pool, inventory_id, user_id, None, &message).await?;

    let members = family::members_with_access(pool, user_id).await?;
    for member in members {
        insert_notification(pool, inventory_id, user_id, Some(member.member_user_id), &message)
            .await?;
    }

    Ok(())
}

async fn insert_notification(
    pool: &SqlitePool,
    inventory_id: Uuid,
    user_id: i64,
    family_member_id: Option<i64>,
    message: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO inventory_notifications
            (id, inventory_id, user_id, family_member_id, notification_type,
             message, is_read, created_at)
         VALUES (?, ?, ?, ?, 'low_stock', ?, 0, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(inventory_id)
    .bind(user_id)
    .bind(family_member_id)
    .bind(message)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Notificações visíveis ao usuário: as próprias e as recebidas como
/// familiar, das mais novas para as mais antigas
///
/// O desempate por id mantém a ordem estável entre leituras consecutivas.
pub async fn get_notifications(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<InventoryNotification>, DbError> {
    let notifications = sqlx::query_as::<_, InventoryNotification>(
        "SELECT id, inventory_id, user_id, family_member_id, notification_type,
                message, is_read, created_at
         FROM inventory_notifications
         WHERE (user_id = ?1 AND family_member_id IS NULL) OR family_member_id = ?1
         ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

/// Marca uma notificação como lida
///
/// Só o dono ou o familiar destinatário daquela cópia consegue marcar.
pub async fn mark_notification_read(
    pool: &SqlitePool,
    notification_id: Uuid,
    user_id: i64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE inventory_notifications
         SET is_read = 1
         WHERE id = ?1 AND ((user_id = ?2 AND family_member_id IS NULL) OR family_member_id = ?2)",
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family;
    use crate::test_support::{seed_medication, setup};
    use anyhow::Result;
    use common_db::models::AccessLevel;

    async fn seed_item(
        pool: &SqlitePool,
        user_id: i64,
        medication_id: Option<Uuid>,
        stock: i64,
        threshold: i64,
    ) -> Result<InventoryItem> {
        let item = create_item(
            pool,
            NewInventoryItem {
                user_id,
                medication_id,
                medication_name: "Losartana 50mg".to_string(),
                current_stock: stock,
                low_stock_threshold: Some(threshold),
                unit: None,
                notes: None,
            },
        )
        .await?;
        Ok(item)
    }

    #[tokio::test]
    async fn test_decrement_below_threshold_notifies_owner() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let medication = seed_medication(&pool, 1, "Losartana").await?;
        seed_item(&pool, 1, Some(medication), 3, 5).await?;

        // 3 - 1 = 2, abaixo do limite 5: uma notificação para o dono
        assert!(decrement_after_taken(&pool, medication, 1, 1).await?);

        let notifications = get_notifications(&pool, 1).await?;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].notification_type, "low_stock");
        assert!(notifications[0].message.contains("Losartana 50mg"));
        assert!(notifications[0].message.contains('2'));
        assert!(!notifications[0].is_read);

        Ok(())
    }

    #[tokio::test]
    async fn test_decrement_above_threshold_stays_silent() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let medication = seed_medication(&pool, 1, "Metformina").await?;
        let item = seed_item(&pool, 1, Some(medication), 10, 5).await?;

        // 10 - 2 = 8, acima do limite: sem notificação
        assert!(decrement_after_taken(&pool, medication, 1, 2).await?);

        let updated = get_item(&pool, item.id, 1).await?.unwrap();
        assert_eq!(updated.current_stock, 8);
        assert!(get_notifications(&pool, 1).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_a_noop() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let medication = seed_medication(&pool, 1, "Enalapril").await?;
        let item = seed_item(&pool, 1, Some(medication), 2, 5).await?;

        // Pedir 5 com 2 em estoque: nenhuma linha afetada, estoque intacto
        assert!(!decrement_after_taken(&pool, medication, 1, 5).await?);

        let unchanged = get_item(&pool, item.id, 1).await?.unwrap();
        assert_eq!(unchanged.current_stock, 2);
        assert!(get_notifications(&pool, 1).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_every_crossing_notifies_again() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let medication = seed_medication(&pool, 1, "Sinvastatina").await?;
        seed_item(&pool, 1, Some(medication), 6, 5).await?;

        // 6 -> 5 entra na faixa baixa; 5 -> 4 continua baixo e alerta de novo
        assert!(decrement_after_taken(&pool, medication, 1, 1).await?);
        assert!(decrement_after_taken(&pool, medication, 1, 1).await?);

        assert_eq!(get_notifications(&pool, 1).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_low_stock_fans_out_to_family() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        family::link_member(&pool, 1, 20, "Ana", AccessLevel::Manage).await?;
        family::link_member(&pool, 1, 21, "Bruno", AccessLevel::View).await?;

        let medication = seed_medication(&pool, 1, "Omeprazol").await?;
        seed_item(&pool, 1, Some(medication), 5, 5).await?;

        assert!(decrement_after_taken(&pool, medication, 1, 1).await?);

        // Dono vê só a própria cópia
        let own = get_notifications(&pool, 1).await?;
        assert_eq!(own.len(), 1);
        assert!(own[0].family_member_id.is_none());

        // Cada familiar vinculado recebe a sua
        let ana = get_notifications(&pool, 20).await?;
        assert_eq!(ana.len(), 1);
        assert_eq!(ana[0].family_member_id, Some(20));

        let bruno = get_notifications(&pool, 21).await?;
        assert_eq!(bruno.len(), 1);

        // Usuário sem vínculo não vê nada
        assert!(get_notifications(&pool, 99).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_update_rejects_negative_stock() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let item = seed_item(&pool, 1, None, 4, 2).await?;

        let rejected = apply_manual_update(
            &pool,
            item.id,
            1,
            InventoryUpdate {
                current_stock: Some(-1),
                ..Default::default()
            },
        )
        .await?;
        assert!(!rejected);

        let unchanged = get_item(&pool, item.id, 1).await?.unwrap();
        assert_eq!(unchanged.current_stock, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_update_crossing_threshold_notifies() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let item = seed_item(&pool, 1, None, 10, 5).await?;

        // Retirada calculada pelo chamador: 10 -> 3
        assert!(
            apply_manual_update(
                &pool,
                item.id,
                1,
                InventoryUpdate {
                    current_stock: Some(3),
                    ..Default::default()
                },
            )
            .await?
        );

        let updated = get_item(&pool, item.id, 1).await?.unwrap();
        assert_eq!(updated.current_stock, 3);
        assert_eq!(get_notifications(&pool, 1).await?.len(), 1);

        // Reposição acima do limite não alerta
        assert!(
            apply_manual_update(
                &pool,
                item.id,
                1,
                InventoryUpdate {
                    current_stock: Some(30),
                    ..Default::default()
                },
            )
            .await?
        );
        assert_eq!(get_notifications(&pool, 1).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_of_foreign_item_does_nothing() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let item = seed_item(&pool, 1, None, 10, 5).await?;

        let touched = apply_manual_update(
            &pool,
            item.id,
            2,
            InventoryUpdate {
                current_stock: Some(0),
                ..Default::default()
            },
        )
        .await?;
        assert!(!touched);

        let unchanged = get_item(&pool, item.id, 1).await?.unwrap();
        assert_eq!(unchanged.current_stock, 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_notifications_read_is_stable_between_calls() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let item = seed_item(&pool, 1, None, 10, 5).await?;

        for stock in [5, 4, 3] {
            apply_manual_update(
                &pool,
                item.id,
                1,
                InventoryUpdate {
                    current_stock: Some(stock),
                    ..Default::default()
                },
            )
            .await?;
        }

        let first = get_notifications(&pool, 1).await?;
        let second = get_notifications(&pool, 1).await?;

        assert_eq!(first.len(), 3);
        let first_ids: Vec<Uuid> = first.iter().map(|n| n.id).collect();
        let second_ids: Vec<Uuid> = second.iter().map(|n| n.id).collect();
        assert_eq!(first_ids, second_ids);

        Ok(())
    }

    #[tokio::test]
    async fn test_mark_read_respects_recipient() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        family::link_member(&pool, 1, 20, "Ana", AccessLevel::View).await?;
        let item = seed_item(&pool, 1, None, 6, 5).await?;

        apply_manual_update(
            &pool,
            item.id,
            1,
            InventoryUpdate {
                current_stock: Some(4),
                ..Default::default()
            },
        )
        .await?;

        let own = get_notifications(&pool, 1).await?;
        let ana = get_notifications(&pool, 20).await?;

        // Um usuário qualquer não marca a notificação alheia
        assert!(!mark_notification_read(&pool, own[0].id, 99).await?);

        // Dono marca a própria, familiar marca a sua cópia
        assert!(mark_notification_read(&pool, own[0].id, 1).await?);
        assert!(mark_notification_read(&pool, ana[0].id, 20).await?);

        let own = get_notifications(&pool, 1).await?;
        assert!(own[0].is_read);

        Ok(())
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_notifications_resolvable() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let item = seed_item(&pool, 1, None, 6, 5).await?;

        apply_manual_update(
            &pool,
            item.id,
            1,
            InventoryUpdate {
                current_stock: Some(2),
                ..Default::default()
            },
        )
        .await?;

        assert!(deactivate_item(&pool, item.id, 1).await?);

        // O item some das listagens, mas a notificação ainda aponta para ele
        assert!(get_item(&pool, item.id, 1).await?.is_none());
        let notifications = get_notifications(&pool, 1).await?;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].inventory_id, item.id);

        // Escritas posteriores no item desativado não acontecem
        let touched = apply_manual_update(
            &pool,
            item.id,
            1,
            InventoryUpdate {
                current_stock: Some(50),
                ..Default::default()
            },
        )
        .await?;
        assert!(!touched);

        Ok(())
    }
}
