use sqlx::SqlitePool;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    let tables = [
        r#"CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NULL,
            role TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_login_at TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS farmer_profiles (
            user_id TEXT PRIMARY KEY,
            farm_name TEXT NOT NULL,
            village TEXT NULL,
            district TEXT NOT NULL,
            region TEXT NOT NULL,
            farm_size_hectares REAL NOT NULL,
            crops TEXT NOT NULL DEFAULT '[]',
            livestock TEXT NOT NULL DEFAULT '[]',
            irrigation_type TEXT NOT NULL DEFAULT 'rainfed',
            years_experience INTEGER NOT NULL DEFAULT 0,
            cooperative TEXT NULL,
            assigned_agent_id TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(assigned_agent_id) REFERENCES users(id) ON DELETE SET NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS agent_profiles (
            user_id TEXT PRIMARY KEY,
            employee_id TEXT NOT NULL UNIQUE,
            region TEXT NOT NULL,
            districts TEXT NOT NULL DEFAULT '[]',
            specializations TEXT NOT NULL DEFAULT '[]',
            years_experience INTEGER NOT NULL DEFAULT 0,
            rating REAL NOT NULL DEFAULT 0,
            max_farmers INTEGER NOT NULL DEFAULT 50,
            availability TEXT NOT NULL DEFAULT 'available',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS suppliers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            contact_person TEXT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL,
            street TEXT NULL,
            city TEXT NOT NULL,
            region TEXT NOT NULL,
            country TEXT NOT NULL DEFAULT 'Kenya',
            categories TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'active',
            rating REAL NOT NULL DEFAULT 0,
            rating_count INTEGER NOT NULL DEFAULT 0,
            payment_terms TEXT NOT NULL DEFAULT 'net30',
            notes TEXT NULL,
            created_by TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(created_by) REFERENCES users(id) ON DELETE SET NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS shops (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            manager_id TEXT NOT NULL,
            village TEXT NULL,
            district TEXT NOT NULL,
            region TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NULL,
            opening_hours TEXT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(manager_id) REFERENCES users(id)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NULL,
            category TEXT NOT NULL,
            unit TEXT NOT NULL,
            price REAL NOT NULL,
            stock_quantity INTEGER NOT NULL DEFAULT 0,
            sku TEXT NULL UNIQUE,
            supplier_id TEXT NOT NULL,
            shop_id TEXT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(supplier_id) REFERENCES suppliers(id),
            FOREIGN KEY(shop_id) REFERENCES shops(id) ON DELETE SET NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_number TEXT NOT NULL UNIQUE,
            buyer_id TEXT NOT NULL,
            shop_id TEXT NULL,
            items TEXT NOT NULL,
            total_amount REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            payment_status TEXT NOT NULL DEFAULT 'unpaid',
            delivery_address TEXT NULL,
            notes TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(buyer_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(shop_id) REFERENCES shops(id) ON DELETE SET NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            report_type TEXT NOT NULL,
            description TEXT NOT NULL,
            farmer_id TEXT NULL,
            author_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            priority TEXT NOT NULL DEFAULT 'medium',
            due_date TEXT NULL,
            completed_at TEXT NULL,
            findings TEXT NULL,
            recommendations TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(farmer_id) REFERENCES users(id) ON DELETE SET NULL,
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
    ];
    for ddl in tables {
        sqlx::query(ddl).execute(pool).await?;
    }

    let indexes = [
        ("idx_users_role", "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role, is_active)"),
        ("idx_farmer_profiles_agent", "CREATE INDEX IF NOT EXISTS idx_farmer_profiles_agent ON farmer_profiles(assigned_agent_id)"),
        ("idx_agent_profiles_region", "CREATE INDEX IF NOT EXISTS idx_agent_profiles_region ON agent_profiles(region, availability)"),
        ("idx_suppliers_status_rating", "CREATE INDEX IF NOT EXISTS idx_suppliers_status_rating ON suppliers(status, rating DESC)"),
        ("idx_suppliers_region", "CREATE INDEX IF NOT EXISTS idx_suppliers_region ON suppliers(region, city)"),
        ("idx_products_supplier", "CREATE INDEX IF NOT EXISTS idx_products_supplier ON products(supplier_id)"),
        ("idx_products_shop", "CREATE INDEX IF NOT EXISTS idx_products_shop ON products(shop_id)"),
        ("idx_products_category_price", "CREATE INDEX IF NOT EXISTS idx_products_category_price ON products(category, price)"),
        ("idx_shops_manager", "CREATE INDEX IF NOT EXISTS idx_shops_manager ON shops(manager_id)"),
        ("idx_orders_buyer_created", "CREATE INDEX IF NOT EXISTS idx_orders_buyer_created ON orders(buyer_id, created_at DESC)"),
        ("idx_orders_shop_status", "CREATE INDEX IF NOT EXISTS idx_orders_shop_status ON orders(shop_id, status)"),
        ("idx_reports_author_status", "CREATE INDEX IF NOT EXISTS idx_reports_author_status ON reports(author_id, status)"),
        ("idx_reports_due", "CREATE INDEX IF NOT EXISTS idx_reports_due ON reports(status, due_date)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}
