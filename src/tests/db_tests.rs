#[cfg(test)]
mod tests {
    use sqlx::Row;
    use tempfile::TempDir;
    use uuid::Uuid;

    use crate::db;
    use crate::error::AppError;
    use crate::models::now_ts;
    use crate::models::profile::{
        AgentProfile, Availability, FarmerProfile, IrrigationType, UpsertAgentProfileRequest,
        UpsertFarmerProfileRequest,
    };
    use crate::models::report::{
        CompleteReportRequest, CreateReportRequest, Report, ReportStatus, ReportType, UpdateReportRequest,
    };
    use crate::models::user::{RegisterRequest, User, UserRole};
    use crate::tests::{shared_pool, test_pool};

    async fn user(pool: &sqlx::SqlitePool, email: &str, role: UserRole) -> User {
        let req = RegisterRequest {
            name: "Test User".into(),
            email: email.into(),
            password: "unused123".into(),
            role,
            phone: None,
        };
        User::insert(pool, &req, "hash").await.unwrap()
    }

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let pool = test_pool().await;
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        for expected in
            ["agent_profiles", "farmer_profiles", "orders", "products", "reports", "shops", "suppliers", "users"]
        {
            assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
        }

        let indexes: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='index'")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(indexes.contains(&"idx_orders_buyer_created".to_string()));
        assert!(indexes.contains(&"idx_reports_due".to_string()));
    }

    #[tokio::test]
    async fn test_init_db_is_idempotent() {
        let pool = test_pool().await;
        db::init_db(&pool).await.unwrap();
        db::init_db(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = test_pool().await;
        let fk: i64 = sqlx::query("PRAGMA foreign_keys").fetch_one(&pool).await.unwrap().get(0);
        assert_eq!(fk, 1);

        let now = now_ts();
        let err = sqlx::query(
            "INSERT INTO shops (id, name, manager_id, district, region, phone, created_at, updated_at)
             VALUES (?1, 'Ghost', ?2, 'Molo', 'Rift Valley', '+254700000000', ?3, ?3)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(Uuid::new_v4().to_string())
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unique_email_maps_to_conflict() {
        let pool = test_pool().await;
        user(&pool, "dup@farm.test", UserRole::Farmer).await;
        let req = RegisterRequest {
            name: "Again".into(),
            email: "dup@farm.test".into(),
            password: "unused123".into(),
            role: UserRole::Farmer,
            phone: None,
        };
        let err = User::insert(&pool, &req, "hash").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_profile() {
        let pool = test_pool().await;
        let u = user(&pool, "fiona@farm.test", UserRole::Farmer).await;
        let now = now_ts();
        sqlx::query(
            "INSERT INTO farmer_profiles (user_id, farm_name, district, region, farm_size_hectares, created_at, updated_at)
             VALUES (?1, 'Farm', 'Nandi', 'Rift Valley', 1.0, ?2, ?2)",
        )
        .bind(u.id.to_string())
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        assert!(User::delete(&pool, u.id).await.unwrap());
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM farmer_profiles").fetch_one(&pool).await.unwrap();
        assert_eq!(left, 0);
        assert!(!User::delete(&pool, u.id).await.unwrap());
    }

    fn farm(name: &str) -> UpsertFarmerProfileRequest {
        UpsertFarmerProfileRequest {
            farm_name: name.into(),
            village: None,
            district: "Nandi".into(),
            region: "Rift Valley".into(),
            farm_size_hectares: 2.0,
            crops: vec!["maize".into()],
            livestock: Vec::new(),
            irrigation_type: IrrigationType::Rainfed,
            years_experience: 3,
            cooperative: None,
        }
    }

    #[tokio::test]
    async fn test_concurrent_assignments_respect_agent_capacity() {
        let dir = TempDir::new().unwrap();
        let pool = shared_pool(&dir, 8).await;
        let agent = user(&pool, "alice@ext.test", UserRole::Agent).await;
        let req = UpsertAgentProfileRequest {
            employee_id: "EXT-001".into(),
            region: "Rift Valley".into(),
            districts: vec!["Nandi".into()],
            specializations: Vec::new(),
            years_experience: 4,
            max_farmers: Some(1),
            availability: Availability::Available,
        };
        AgentProfile::upsert(&pool, agent.id, &req).await.unwrap();

        let mut farmers = Vec::new();
        for i in 0..8 {
            let f = user(&pool, &format!("farmer{}@farm.test", i), UserRole::Farmer).await;
            FarmerProfile::upsert(&pool, f.id, &farm(&format!("Farm {}", i))).await.unwrap();
            farmers.push(f.id);
        }

        let handles: Vec<_> = farmers
            .into_iter()
            .map(|farmer_id| {
                let pool = pool.clone();
                tokio::spawn(async move { FarmerProfile::assign_agent(&pool, farmer_id, agent.id).await })
            })
            .collect();
        let mut assigned = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => assigned += 1,
                Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(assigned, 1);

        let profile = AgentProfile::find(&pool, agent.id).await.unwrap().unwrap();
        assert_eq!(profile.assigned_farmers, 1);
    }

    #[tokio::test]
    async fn test_racing_report_closures_leave_one_terminal_status() {
        let dir = TempDir::new().unwrap();
        let pool = shared_pool(&dir, 8).await;
        let author = user(&pool, "alice@ext.test", UserRole::Agent).await;

        for round in 0..10 {
            let req = CreateReportRequest {
                title: format!("Visit {}", round),
                report_type: ReportType::FieldVisit,
                description: "Routine check of maize and bean plots.".into(),
                farmer_id: None,
                priority: None,
                due_date: None,
                findings: None,
                recommendations: Vec::new(),
            };
            let report = Report::insert(&pool, author.id, &req).await.unwrap();

            let complete = {
                let pool = pool.clone();
                tokio::spawn(async move { Report::complete(&pool, report.id, CompleteReportRequest::default()).await })
            };
            let cancel = {
                let pool = pool.clone();
                let update = UpdateReportRequest { status: Some(ReportStatus::Cancelled), ..Default::default() };
                tokio::spawn(async move { Report::update(&pool, report.id, update).await })
            };
            let completed = complete.await.unwrap();
            let cancelled = cancel.await.unwrap();

            let winner = match (completed, cancelled) {
                (Ok(r), Err(AppError::Conflict(_))) | (Err(AppError::Conflict(_)), Ok(r)) => r.status,
                (a, b) => panic!("expected exactly one closure to win, got {:?} and {:?}", a, b),
            };
            let stored = Report::find_by_id(&pool, report.id).await.unwrap().unwrap();
            assert_eq!(stored.status, winner);
        }
    }
}
