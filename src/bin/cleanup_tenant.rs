//! Permanently remove a gym: its schema and its row, in one transaction.

use anyhow::{bail, Context};
use clap::Parser;
use gymhub::tenant::drop_tenant_schema;
use gymhub::{logging, store, Settings};
use std::io::{self, BufRead, Write};

#[derive(Parser)]
#[command(name = "cleanup-tenant")]
#[command(about = "Drop a gym's schema and delete its row")]
struct Cli {
    /// Gym slug
    slug: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();
    let cli = Cli::parse();

    let settings = Settings::from_env().context("reading settings")?;
    let pool = store::connect(&settings).await.context("connecting to database")?;
    let Some(tenant) = store::find_gym_any_state(&pool, &cli.slug).await? else {
        bail!("no gym with slug {}", cli.slug);
    };

    if !cli.yes {
        print!(
            "This drops schema {} and all of its data. Type the slug to confirm: ",
            tenant.schema
        );
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        if line.trim() != tenant.slug {
            bail!("aborted");
        }
    }

    let mut tx = pool.begin().await?;
    drop_tenant_schema(&mut tx, &tenant.schema).await?;
    store::delete_gym_row(&mut tx, tenant.gym_id).await?;
    tx.commit().await?;
    println!("gym {} removed ({} dropped)", tenant.slug, tenant.schema);
    Ok(())
}
