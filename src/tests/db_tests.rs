#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::auth::verify_password;
    use crate::config::AppConfig;
    use crate::db::{schema::init_schema, DbErrorKind, SqlParam};
    use crate::query::{FilterBuilder, Pagination};
    use crate::routes::auth::bootstrap_admin;
    use crate::routes::listing::{fetch_page, ListQuery};
    use crate::tests::support::MockExecutor;

    #[tokio::test]
    async fn test_init_schema_creates_tables_in_dependency_order() {
        let db = MockExecutor::new();
        init_schema(&db).await.unwrap();

        let tables: Vec<String> = db
            .calls()
            .into_iter()
            .filter_map(|(sql, _)| {
                sql.strip_prefix("CREATE TABLE IF NOT EXISTS ")
                    .and_then(|rest| rest.split_whitespace().next())
                    .map(str::to_string)
            })
            .collect();
        assert_eq!(tables, vec!["usuarios", "bibliotecas", "libros", "prestamos"]);
        assert!(db.calls().iter().any(|(sql, _)| sql.contains("ON prestamos(fecha_prestamo)")));
    }

    #[tokio::test]
    async fn test_init_schema_allows_one_active_loan_per_book() {
        let db = MockExecutor::new();
        init_schema(&db).await.unwrap();
        let calls = db.calls();
        let (sql, _) = calls
            .iter()
            .find(|(sql, _)| sql.contains("idx_prestamos_libro_activo"))
            .expect("active loan index");
        assert!(sql.starts_with("CREATE UNIQUE INDEX"));
        assert!(sql.ends_with("WHERE fecha_devolucion IS NULL"));
    }

    #[tokio::test]
    async fn test_init_schema_stops_on_table_failure() {
        let db = MockExecutor::new().failing(DbErrorKind::Other);
        assert!(init_schema(&db).await.is_err());
        assert_eq!(db.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_page_binds_limit_after_filter_values() {
        let db = MockExecutor::new().with_rows(vec![json!({ "id": 1 }), json!({ "id": 2 })]).with_total(42);
        let query = ListQuery { projection: "to_jsonb(l)", from: "FROM libros l", order_by: "l.id" };
        let mut fb = FilterBuilder::new();
        fb.integer("biblioteca_id", Some("8"), "l.biblioteca_id").unwrap();
        let filter = fb.build();
        let page = Pagination::clamp(Some("2"), Some("4"), &AppConfig::default().pagination);

        let result = fetch_page(&db, &query, &filter, page).await.unwrap();
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.paginacion.total, 42);

        let (sql, params) = db.call_starting_with("SELECT to_jsonb(l)");
        assert!(sql.contains("l.biblioteca_id = $1"));
        assert!(sql.ends_with("LIMIT $2 OFFSET $3"));
        assert_eq!(params, vec![SqlParam::from(8_i64), SqlParam::from(2_i64), SqlParam::from(4_i64)]);
        let (_, count_params) = db.call_starting_with("SELECT COUNT(*)");
        assert_eq!(count_params, vec![SqlParam::from(8_i64)]);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_when_configured() {
        let db = MockExecutor::new();
        let cfg = AppConfig::default().auth;
        assert!(!bootstrap_admin(&db, &cfg).await.unwrap());
        assert!(db.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_on_empty_table() {
        let db = MockExecutor::new().with_total(0).with_affected(1);
        let mut cfg = AppConfig::default().auth;
        cfg.admin_email = Some("Admin@Xonler.test".to_string());
        cfg.admin_password = Some("arranque-seguro".to_string());

        assert!(bootstrap_admin(&db, &cfg).await.unwrap());
        let (sql, params) = db.call_starting_with("INSERT INTO usuarios");
        assert!(sql.contains("password_hash"));
        assert_eq!(params[1], SqlParam::from("admin@xonler.test"));
        assert_eq!(params[3], SqlParam::from("admin"));
        match &params[2] {
            SqlParam::Text(Some(hash)) => assert!(verify_password("arranque-seguro", hash)),
            other => panic!("unexpected hash param {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_admin_skips_populated_table() {
        let db = MockExecutor::new().with_total(3);
        let mut cfg = AppConfig::default().auth;
        cfg.admin_email = Some("admin@xonler.test".to_string());
        cfg.admin_password = Some("arranque-seguro".to_string());

        assert!(!bootstrap_admin(&db, &cfg).await.unwrap());
        assert_eq!(db.calls().len(), 1);
    }
}
