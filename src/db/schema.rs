use super::executor::QueryExecutor;
use super::DbError;

const TABLES: &[(&str, &str)] = &[
    (
        "usuarios",
        r#"CREATE TABLE IF NOT EXISTS usuarios (
            id SERIAL PRIMARY KEY,
            nombre TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            rol TEXT NOT NULL DEFAULT 'invitado' CHECK (rol IN ('admin', 'invitado')),
            activo BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"#,
    ),
    (
        "bibliotecas",
        r#"CREATE TABLE IF NOT EXISTS bibliotecas (
            id SERIAL PRIMARY KEY,
            nombre TEXT NOT NULL UNIQUE,
            direccion TEXT NULL,
            telefono TEXT NULL,
            colegio_id INTEGER NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"#,
    ),
    (
        "libros",
        r#"CREATE TABLE IF NOT EXISTS libros (
            id SERIAL PRIMARY KEY,
            titulo TEXT NOT NULL,
            autor TEXT NULL,
            isbn TEXT NULL UNIQUE,
            anio_publicacion INTEGER NULL,
            biblioteca_id INTEGER NOT NULL REFERENCES bibliotecas(id),
            disponible BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"#,
    ),
    (
        "prestamos",
        r#"CREATE TABLE IF NOT EXISTS prestamos (
            id SERIAL PRIMARY KEY,
            libro_id INTEGER NOT NULL REFERENCES libros(id),
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
            fecha_prestamo DATE NOT NULL DEFAULT CURRENT_DATE,
            fecha_devolucion DATE NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            CHECK (fecha_devolucion IS NULL OR fecha_devolucion >= fecha_prestamo)
        )"#,
    ),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_bibliotecas_colegio", "CREATE INDEX IF NOT EXISTS idx_bibliotecas_colegio ON bibliotecas(colegio_id)"),
    ("idx_libros_biblioteca", "CREATE INDEX IF NOT EXISTS idx_libros_biblioteca ON libros(biblioteca_id)"),
    ("idx_prestamos_libro", "CREATE INDEX IF NOT EXISTS idx_prestamos_libro ON prestamos(libro_id)"),
    ("idx_prestamos_usuario", "CREATE INDEX IF NOT EXISTS idx_prestamos_usuario ON prestamos(usuario_id)"),
    ("idx_prestamos_fecha", "CREATE INDEX IF NOT EXISTS idx_prestamos_fecha ON prestamos(fecha_prestamo)"),
    // At most one active loan per book.
    (
        "idx_prestamos_libro_activo",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_prestamos_libro_activo ON prestamos(libro_id) \
         WHERE fecha_devolucion IS NULL",
    ),
];

/// Creates tables and indexes if they do not exist yet.
///
/// Tables are mandatory; index failures are logged and skipped.
pub async fn init_schema(db: &dyn QueryExecutor) -> Result<(), DbError> {
    for (name, ddl) in TABLES {
        db.execute(ddl, &[]).await.map_err(|e| {
            tracing::error!("Failed to create table {}: {}", name, e);
            e
        })?;
    }

    for (name, ddl) in INDEXES {
        if let Err(e) = db.execute(ddl, &[]).await {
            let msg = e.message.to_lowercase();
            if msg.contains("already exists") || msg.contains("duplicate") {
                tracing::debug!("Index {} already exists, skipping", name);
            } else {
                tracing::warn!("Failed to create index {}: {}", name, e);
            }
        }
    }

    tracing::info!("Database schema ready ({} tables)", TABLES.len());
    Ok(())
}
