use std::fmt::Write as _;

use rosso_airtable::Catalog;
use rosso_core::{catalog::filter_products, CatalogQuery, PriceTier, Product, SortOrder};
use rosso_supabase::SupabaseClient;

/// Fetches from both upstreams and prints what each returned.
///
/// # Errors
///
/// Returns the first upstream failure.
pub(crate) async fn run_check(catalog: &Catalog, users: &SupabaseClient) -> anyhow::Result<()> {
    let products = catalog.products().await?;
    let active = products.iter().filter(|p| p.active).count();
    println!("airtable: {} products ({active} active)", products.len());

    let categories = catalog.categories().await?;
    let brands = catalog.brands().await?;
    println!(
        "airtable: {} categories, {} brands",
        categories.len(),
        brands.len()
    );

    let users = users.list_users().await?;
    let admins = users.iter().filter(|u| u.role.is_admin()).count();
    println!("supabase: {} users ({admins} admins)", users.len());
    if admins == 0 {
        tracing::warn!("no admin users; create one with `rosso-cli create-user --role admin`");
    }
    Ok(())
}

pub(crate) async fn run_products(
    catalog: &Catalog,
    search: Option<String>,
    category: Option<String>,
    tier: PriceTier,
    include_inactive: bool,
) -> anyhow::Result<()> {
    let query = CatalogQuery {
        search,
        category,
        sort: Some(SortOrder::Name),
        include_inactive,
        ..CatalogQuery::default()
    };
    let products = filter_products(catalog.products().await?, &query, tier)?;

    if products.is_empty() {
        println!("no products match");
        return Ok(());
    }
    print!("{}", render_table(&products, tier));
    println!("{} products", products.len());
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max - 3).collect::<String>())
    } else {
        text.to_owned()
    }
}

pub(crate) fn render_table(products: &[Product], tier: PriceTier) -> String {
    let mut out = format!(
        "{:<19}{:<12}{:<36}{:<20}{:>12}{:>7}  ACTIVE\n",
        "ID", "SKU", "NAME", "CATEGORY", "PRICE", "STOCK"
    );
    for p in products {
        let category = p.category.as_ref().map_or("", |c| c.name.as_str());
        let _ = writeln!(
            out,
            "{:<19}{:<12}{:<36}{:<20}{:>12}{:>7}  {}",
            p.id,
            truncate(p.sku.as_deref().unwrap_or("-"), 11),
            truncate(&p.name, 35),
            truncate(category, 19),
            format!("{:.2}", p.price_for(tier)),
            p.stock,
            if p.active { "yes" } else { "no" }
        );
    }
    out
}
