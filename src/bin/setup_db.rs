//! Create the database if needed, migrate `public`, and bring every tenant schema up to date.

use anyhow::Context;
use clap::Parser;
use gymhub::tenant::provision_tenant_schema;
use gymhub::{apply_migrations, catalog, ensure_database_exists, logging, store, Settings};

#[derive(Parser)]
#[command(name = "setup-db")]
#[command(about = "Create and migrate the GymHub database")]
struct Cli {
    /// Only migrate the public schema
    #[arg(long)]
    skip_tenants: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();
    let cli = Cli::parse();

    let settings = Settings::from_env().context("reading settings")?;
    let config = catalog::load().context("loading catalogue")?;
    ensure_database_exists(&settings.database_url())
        .await
        .context("creating database")?;
    let pool = store::connect(&settings).await.context("connecting to database")?;

    apply_migrations(&pool, &config).await.context("migrating public schema")?;
    println!("public schema ready ({} tables)", config.public.tables.len());

    if cli.skip_tenants {
        return Ok(());
    }
    let tenants = store::all_tenants(&pool).await?;
    for tenant in &tenants {
        let mut tx = pool.begin().await?;
        provision_tenant_schema(&mut tx, &config.tenant, &tenant.schema)
            .await
            .with_context(|| format!("provisioning {}", tenant.schema))?;
        tx.commit().await?;
        println!("tenant {} ready ({})", tenant.slug, tenant.schema);
    }
    println!("{} tenant schema(s) migrated", tenants.len());
    Ok(())
}
