//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_initial_schema.sql
    r#"
    -- Tabela de tipos de consulta
    CREATE TABLE IF NOT EXISTS appointment_types (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE
    );

    -- Tabela de médicos (dados de referência, somente leitura para o app)
    CREATE TABLE IF NOT EXISTS doctors (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        specialization TEXT NOT NULL,
        clinic TEXT,
        appointment_type_id TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (appointment_type_id) REFERENCES appointment_types (id) ON DELETE SET NULL
    );

    -- Tabela de agendamentos
    -- O índice único (doctor_id, appointment_date, appointment_time) é a
    -- garantia de última instância contra reserva dupla do mesmo horário.
    CREATE TABLE IF NOT EXISTS appointments (
        id TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL,
        doctor_id TEXT NOT NULL,
        appointment_type_id TEXT,
        appointment_date DATE NOT NULL,
        appointment_time TIME NOT NULL,
        notes_ciphertext BLOB,
        notes_nonce BLOB,
        status TEXT NOT NULL DEFAULT 'scheduled' CHECK (status IN ('scheduled', 'completed', 'canceled')),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (doctor_id) REFERENCES doctors (id),
        FOREIGN KEY (appointment_type_id) REFERENCES appointment_types (id) ON DELETE SET NULL,
        UNIQUE (doctor_id, appointment_date, appointment_time)
    );

    -- Tabela de medicações acompanhadas pelo usuário
    CREATE TABLE IF NOT EXISTS medications (
        id TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        dosage TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Tabela de horários de medicação
    CREATE TABLE IF NOT EXISTS medication_schedules (
        id TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL,
        medication_id TEXT NOT NULL,
        time_of_day TIME NOT NULL,
        dose_quantity INTEGER NOT NULL DEFAULT 1 CHECK (dose_quantity >= 1),
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (medication_id) REFERENCES medications (id) ON DELETE CASCADE
    );

    -- Registro de doses marcadas como tomadas
    CREATE TABLE IF NOT EXISTS schedule_logs (
        id TEXT PRIMARY KEY NOT NULL,
        schedule_id TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        taken_on DATE NOT NULL,
        taken_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (schedule_id) REFERENCES medication_schedules (id) ON DELETE CASCADE
    );

    -- Estoque de medicações
    -- current_stock nunca fica negativo: os caminhos de escrita validam
    -- antes de gravar e o CHECK é a barreira final na camada de armazenamento.
    CREATE TABLE IF NOT EXISTS medication_inventory (
        id TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL,
        medication_id TEXT,
        medication_name TEXT NOT NULL,
        current_stock INTEGER NOT NULL DEFAULT 0 CHECK (current_stock >= 0),
        low_stock_threshold INTEGER NOT NULL DEFAULT 5 CHECK (low_stock_threshold >= 0),
        unit TEXT NOT NULL DEFAULT 'pills',
        notes TEXT,
        last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (medication_id) REFERENCES medications (id) ON DELETE SET NULL
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_appointments_user_id ON appointments (user_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_doctor_date ON appointments (doctor_id, appointment_date);
    CREATE INDEX IF NOT EXISTS idx_medications_user_id ON medications (user_id);
    CREATE INDEX IF NOT EXISTS idx_schedules_user_id ON medication_schedules (user_id);
    CREATE INDEX IF NOT EXISTS idx_schedule_logs_schedule_id ON schedule_logs (schedule_id);
    CREATE INDEX IF NOT EXISTS idx_inventory_user_id ON medication_inventory (user_id);

    -- O decremento de estoque endereça o item por (user_id, medication_id);
    -- no máximo um item ativo pode ocupar esse endereço.
    CREATE UNIQUE INDEX IF NOT EXISTS idx_inventory_active_medication
        ON medication_inventory (user_id, medication_id)
        WHERE medication_id IS NOT NULL AND is_active = 1;
    "#,
    // 002_family_and_notifications.sql
    r#"
    -- Vínculos de familiares/cuidadores
    CREATE TABLE IF NOT EXISTS family_members (
        id TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL,
        member_user_id INTEGER NOT NULL,
        member_name TEXT NOT NULL,
        access_level TEXT NOT NULL CHECK (access_level IN ('manage', 'view')),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (user_id, member_user_id)
    );

    -- Notificações de estoque
    -- family_member_id preenchido indica a cópia enviada a um familiar.
    -- Sem FK com CASCADE para o estoque: o item é desativado (is_active = 0)
    -- e nunca removido, então notificações antigas continuam resolvendo.
    CREATE TABLE IF NOT EXISTS inventory_notifications (
        id TEXT PRIMARY KEY NOT NULL,
        inventory_id TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        family_member_id INTEGER,
        notification_type TEXT NOT NULL DEFAULT 'low_stock',
        message TEXT NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (inventory_id) REFERENCES medication_inventory (id)
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_family_members_user_id ON family_members (user_id);
    CREATE INDEX IF NOT EXISTS idx_family_members_member ON family_members (member_user_id);
    CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON inventory_notifications (user_id);
    CREATE INDEX IF NOT EXISTS idx_notifications_inventory_id ON inventory_notifications (inventory_id);
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    // Obter a versão atual do banco de dados
    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version").fetch_one(pool).await {
        Ok(v) => version = v,
        Err(e) => {
            error!("Erro ao obter versão do banco: {}", e);
            // Continuar mesmo assim, pois pode ser a primeira execução
        }
    }

    info!("Versão atual do banco: {}", version);

    // Aplicar cada migração pendente sequencialmente
    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        // Pular migrações já aplicadas
        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        // Executar em uma transação para garantir atomicidade
        let mut transaction = pool.begin().await.context(format!(
            "Falha ao iniciar transação para migração {}",
            migration_version
        ))?;

        // Executar os comandos SQL
        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .context(format!("Falha ao executar migração {}", migration_version))?;

        // Atualizar versão do banco
        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .context(format!("Falha ao atualizar versão para {}", migration_version))?;

        // Commit da transação
        transaction.commit().await.context(format!(
            "Falha ao confirmar transação para migração {}",
            migration_version
        ))?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}
