//! Create or reset the platform super-admin. Missing values are prompted for.

use anyhow::{bail, Context};
use clap::Parser;
use gymhub::service::hash_password;
use gymhub::{logging, store, Settings};
use std::io::{self, BufRead, Write};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Parser)]
#[command(name = "setup-superadmin")]
#[command(about = "Create or update the GymHub super-admin account")]
struct Cli {
    /// Admin email
    #[arg(long)]
    email: Option<String>,

    /// Display name
    #[arg(long)]
    name: Option<String>,
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();
    let cli = Cli::parse();

    let email = match cli.email {
        Some(e) => e,
        None => prompt("Email")?,
    };
    if !email.contains('@') {
        bail!("invalid email: {}", email);
    }
    let name = match cli.name {
        Some(n) => n,
        None => prompt("Name")?,
    };
    if name.is_empty() {
        bail!("name is required");
    }
    let password = prompt("Password")?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {} characters", MIN_PASSWORD_LEN);
    }
    if prompt("Confirm password")? != password {
        bail!("passwords do not match");
    }

    let settings = Settings::from_env().context("reading settings")?;
    let pool = store::connect(&settings).await.context("connecting to database")?;
    let hash = hash_password(password).await?;
    let id = store::upsert_admin(&pool, &email, &name, &hash)
        .await
        .context("saving admin (run setup-db first?)")?;
    println!("super-admin {} ready ({})", email, id);
    Ok(())
}
