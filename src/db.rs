//! Database Module
//! SQLite-backed items / item_images / categories tables

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::info;

pub type DbPool = Pool<Sqlite>;

pub async fn init_db(db_path: &str) -> Result<DbPool> {
    let db_url = format!("sqlite:{}?mode=rwc", db_path);

    info!("Initializing database: {}", db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    create_schema(&pool).await?;
    seed_categories(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

async fn create_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS items (
            item_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            price REAL NOT NULL,
            category TEXT NOT NULL,
            subcategory1 TEXT,
            subcategory2 TEXT,
            condition TEXT NOT NULL DEFAULT 'New',
            size TEXT,
            status TEXT NOT NULL DEFAULT 'available'
                CHECK (status IN ('available', 'low_stock', 'out_of_stock')),
            available_in_store INTEGER NOT NULL DEFAULT 1,
            list_on_paperclip INTEGER NOT NULL DEFAULT 1,
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL
        )
    "#)
    .execute(pool)
    .await?;

    // display_order per item is a contiguous 0-based sequence; handlers
    // renumber on every mutation
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS item_images (
            image_id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            image_url TEXT NOT NULL,
            display_order INTEGER NOT NULL,
            created_at_ms INTEGER NOT NULL,
            FOREIGN KEY (item_id) REFERENCES items(item_id)
        )
    "#)
    .execute(pool)
    .await?;

    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS categories (
            level1 TEXT NOT NULL,
            level2 TEXT NOT NULL DEFAULT '',
            level3 TEXT NOT NULL DEFAULT '',
            UNIQUE(level1, level2, level3)
        )
    "#)
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_status ON items(status)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_category ON items(category)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_images_item ON item_images(item_id)")
        .execute(pool).await?;

    Ok(())
}

/// Default 3-level taxonomy. The UI once hardcoded these; they now live
/// as data so stores can extend them without a redeploy.
async fn seed_categories(pool: &DbPool) -> Result<()> {
    const PATHS: &[(&str, &str, &str)] = &[
        ("Clothing", "Tops", "T-Shirts"),
        ("Clothing", "Tops", "Shirts"),
        ("Clothing", "Tops", "Sweaters"),
        ("Clothing", "Bottoms", "Jeans"),
        ("Clothing", "Bottoms", "Trousers"),
        ("Clothing", "Bottoms", "Skirts"),
        ("Clothing", "Outerwear", "Jackets"),
        ("Clothing", "Outerwear", "Coats"),
        ("Shoes", "Sneakers", ""),
        ("Shoes", "Boots", ""),
        ("Shoes", "Formal", ""),
        ("Accessories", "Bags", ""),
        ("Accessories", "Jewelry", ""),
        ("Accessories", "Watches", ""),
        ("Home", "Decor", ""),
        ("Home", "Kitchen", ""),
        ("Electronics", "", ""),
        ("Books", "", ""),
        ("Other", "", ""),
    ];

    for (l1, l2, l3) in PATHS {
        sqlx::query(
            "INSERT OR IGNORE INTO categories (level1, level2, level3) VALUES (?, ?, ?)",
        )
        .bind(l1)
        .bind(l2)
        .bind(l3)
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = init_db(path.to_str().unwrap()).await.unwrap();
        // Second run against the same file must not fail or duplicate seeds.
        create_schema(&pool).await.unwrap();
        seed_categories(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(count > 0);

        let (dupes,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM (SELECT level1, level2, level3 FROM categories
             GROUP BY level1, level2, level3 HAVING COUNT(*) > 1)",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(dupes, 0);
    }
}
