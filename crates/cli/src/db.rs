//! Database initialization, status and service context

use anyhow::{Context, Result};
use cashpoint_business::ServiceContext;
use cashpoint_core::EngineConfig;
use cashpoint_persistence::{
    create_pool, init_database as open_database, CustomerRepo, Database, RateConfigRepo,
    ReconciliationRepo, TransactionRepo, VenueRepo,
};
use std::path::Path;

fn db_url(db_path: &Path) -> String {
    format!("sqlite:{}", db_path.display())
}

/// Initialize the database with schema
pub async fn init_database(db_path: &Path, journal_dir: &Path, force: bool) -> Result<()> {
    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        println!("🗑️  Removed existing database");
    }

    println!("📦 Creating schema...");
    let pool = open_database(&db_url(db_path))
        .await
        .context("Failed to create database")?;
    pool.close().await;

    std::fs::create_dir_all(journal_dir).context("Failed to create journal directory")?;
    println!("📒 Journal directory: {:?}", journal_dir);
    Ok(())
}

/// Show database status
pub async fn show_status(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("❌ Database not found at {:?}", db_path);
        println!("   Run 'cashpoint init' to create the database");
        return Ok(());
    }

    let pool = create_pool(&db_url(db_path)).await?;

    println!("📊 Database Status");
    println!("   Path: {:?}", db_path);
    println!();

    let active_configs = RateConfigRepo::count_active(&pool).await.unwrap_or(0);
    let customers = CustomerRepo::get_all(&pool).await.map(|c| c.len()).unwrap_or(0);
    let venues = VenueRepo::get_all(&pool).await.map(|v| v.len()).unwrap_or(0);
    let transactions = TransactionRepo::count(&pool).await.unwrap_or(0);
    let reconciliations = ReconciliationRepo::count(&pool).await.unwrap_or(0);

    println!("   Active rate configs: {}", active_configs);
    println!("   Customers:           {}", customers);
    println!("   Venues:              {}", venues);
    println!("   Transactions:        {}", transactions);
    println!("   Reconciliations:     {}", reconciliations);

    pool.close().await;
    Ok(())
}

/// Open the database and build the service context
pub async fn connect(
    db_path: &Path,
    journal_dir: &Path,
    config_path: Option<&Path>,
) -> Result<ServiceContext> {
    let config = match config_path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load engine config from {:?}", path))?,
        None => EngineConfig::default(),
    };

    let db = Database::new(&db_url(db_path), journal_dir)
        .await
        .context("Failed to connect to database. Run 'cashpoint init' first.")?;

    Ok(ServiceContext::new(&db, config))
}
