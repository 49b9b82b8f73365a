use anyhow::Context;
use storefront_api::db::{create_pool, run_migrations};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let inserted = seed_products(&pool).await?;
    println!("Seed completed. {inserted} new products");
    Ok(())
}

/// Demo catalog, priced in VND. Re-running skips products that already exist by name.
async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<u64> {
    let products = [
        ("Ao thun Ferris", "Cotton t-shirt with a Ferris print", 199000_i64),
        ("Coc su Rust", "Ceramic mug for the morning coffee", 120000),
        ("Bo sticker", "Laptop stickers, pack of twelve", 50000),
        ("Balo laptop", "Water resistant backpack for 15 inch laptops", 650000),
    ];

    let mut inserted = 0;
    for (name, description, price) in products {
        let result = sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(price)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
