use anyhow::Context;
use sockshop_carts::{
    config::AppConfig,
    db::{create_pool, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    println!("Migrations applied");
    Ok(())
}
