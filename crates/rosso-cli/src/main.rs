mod catalog;
mod users;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rosso_airtable::{AirtableClient, Catalog, CatalogTables};
use rosso_core::{AppConfig, PriceTier, Role};
use rosso_supabase::SupabaseClient;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rosso-cli")]
#[command(about = "Grupo Rosso storefront operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print an Argon2id hash for a password
    HashPassword { password: String },
    /// Create a user in the users table
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "retail")]
        role: Role,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Create the users listed in a YAML file that do not exist yet
    SeedUsers { file: PathBuf },
    /// Replace a user's password
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Check Airtable and Supabase connectivity and print record counts
    Check,
    /// List catalog products as a table
    Products {
        #[arg(long)]
        search: Option<String>,
        /// Category name or slug
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "retail")]
        tier: PriceTier,
        /// Include products hidden from the storefront
        #[arg(long)]
        all: bool,
    },
}

fn build_catalog(config: &AppConfig) -> anyhow::Result<Catalog> {
    let client = AirtableClient::with_base_url(
        &config.airtable_api_key,
        &config.airtable_base_id,
        config.http_timeout_secs,
        config.http_max_retries,
        config.http_retry_backoff_ms,
        &config.airtable_api_url,
    )?;
    Ok(Catalog::new(
        client,
        CatalogTables {
            products: config.airtable_products_table.clone(),
            categories: config.airtable_categories_table.clone(),
            brands: config.airtable_brands_table.clone(),
        },
    ))
}

fn build_users(config: &AppConfig) -> anyhow::Result<SupabaseClient> {
    Ok(SupabaseClient::new(
        &config.supabase_url,
        &config.supabase_service_key,
        &config.supabase_users_table,
        config.http_timeout_secs,
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::HashPassword { password } = &cli.command {
        println!("{}", rosso_core::hash_password(password)?);
        return Ok(());
    }

    let config = rosso_core::load_app_config()?;
    match cli.command {
        Commands::HashPassword { .. } => {}
        Commands::CreateUser {
            email,
            password,
            role,
            company,
            phone,
        } => {
            let users = build_users(&config)?;
            let seed = users::SeedUser {
                email,
                password,
                role,
                active: true,
                company,
                phone,
            };
            let user = users::create_user(&users, &seed).await?;
            println!("created {} ({}) id={}", user.email, user.role, user.id);
        }
        Commands::SeedUsers { file } => {
            let users = build_users(&config)?;
            let seed = users::load_seed_file(&file)?;
            let report = users::seed_users(&users, &seed.users).await?;
            println!("created {}, already present {}", report.created, report.skipped);
        }
        Commands::ResetPassword { email, password } => {
            let users = build_users(&config)?;
            let user = users::reset_password(&users, &email, &password).await?;
            println!("password updated for {}", user.email);
        }
        Commands::Check => {
            let catalog = build_catalog(&config)?;
            let users = build_users(&config)?;
            catalog::run_check(&catalog, &users).await?;
        }
        Commands::Products {
            search,
            category,
            tier,
            all,
        } => {
            let catalog = build_catalog(&config)?;
            catalog::run_products(&catalog, search, category, tier, all).await?;
        }
    }

    Ok(())
}
