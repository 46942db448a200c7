//! Catalog commands.

use clap::Args;
use larkspur_core::{Facet, FilterOptions, ProductId, SortBy};
use larkspur_storefront::Storefront;
use larkspur_storefront::stores::SearchOutcome;
use rust_decimal::Decimal;

use super::{CommandError, ProductAction, money, parse_arg, print_products, settle};

/// Listing filters shared by `list`, `search` and `collection`.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long)]
    category: Option<String>,
    /// `newest`, `price_asc`, `price_desc`, `name_asc`, `name_desc` or `rating`
    #[arg(long)]
    sort: Option<String>,
    #[arg(long)]
    min_price: Option<Decimal>,
    #[arg(long)]
    max_price: Option<Decimal>,
    /// Minimum average rating (1-5)
    #[arg(long)]
    rating: Option<u8>,
    #[arg(long)]
    in_stock: bool,
    #[arg(long)]
    on_sale: bool,
    /// Repeatable
    #[arg(long)]
    size: Vec<String>,
    /// Repeatable
    #[arg(long)]
    color: Vec<String>,
    /// Repeatable
    #[arg(long)]
    material: Vec<String>,
}

impl FilterArgs {
    fn into_filters(self) -> Result<FilterOptions, CommandError> {
        let sort_by = self.sort.as_deref().map(parse_arg::<SortBy>).transpose()?;
        Ok(FilterOptions {
            category: self.category,
            sort_by,
            min_price: self.min_price,
            max_price: self.max_price,
            rating: self.rating,
            in_stock: self.in_stock.then_some(true),
            on_sale: self.on_sale.then_some(true),
            ..FilterOptions::default()
        }
        .with_facet(Facet::Size, self.size)
        .with_facet(Facet::Color, self.color)
        .with_facet(Facet::Material, self.material))
    }
}

pub async fn run(storefront: &Storefront, action: ProductAction) -> Result<(), CommandError> {
    let products = storefront.products();
    match action {
        ProductAction::List { filters, force } => {
            let page = settle(products.fetch_products(filters.into_filters()?, force).await)?;
            print_products(&page.products);
            if let Some(pagination) = page.pagination {
                println!(
                    "Page {} of {} ({} products)",
                    pagination.page, pagination.pages, pagination.total
                );
            }
        }
        ProductAction::Featured { limit } => {
            print_products(&settle(products.fetch_featured(limit, false).await)?);
        }
        ProductAction::Show { id } => {
            let product = settle(products.fetch_product_by_id(&ProductId::new(id), false).await)?;
            println!("{} ({})", product.name, product.id);
            match product.compare_price.filter(|_| product.on_sale()) {
                Some(compare) => println!("  price: {} (was {})", money(product.price), money(compare)),
                None => println!("  price: {}", money(product.price)),
            }
            println!("  stock: {}", product.stock);
            if !product.sizes.is_empty() {
                println!("  sizes: {}", product.sizes.join(", "));
            }
            if !product.colors.is_empty() {
                println!("  colors: {}", product.colors.join(", "));
            }
            if product.review_count > 0 {
                println!("  rating: {:.1} ({} reviews)", product.avg_rating, product.review_count);
            }
            if let Some(description) = &product.description {
                println!("\n{description}");
            }
        }
        ProductAction::Search { query, filters } => {
            match products.search_products(&query, &filters.into_filters()?).await {
                SearchOutcome::Completed(outcome) => print_products(&settle(outcome)?),
                SearchOutcome::Superseded => println!("Search superseded"),
            }
        }
        ProductAction::Suggest { query } => {
            for suggestion in products.suggestions(&query).await? {
                println!("{suggestion}");
            }
        }
        ProductAction::Filters { category } => {
            for group in products.filter_options(category.as_deref()).await? {
                let values = group
                    .options
                    .iter()
                    .map(|o| o.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{} ({}): {values}", group.title, group.key);
            }
        }
        ProductAction::Collections => {
            for collection in settle(products.fetch_collections(false).await)? {
                println!("{:<24} {}", collection.id, collection.name);
            }
        }
        ProductAction::Collection { key, filters } => {
            let collection = products.fetch_collection(&key).await?;
            println!("{}", collection.name);
            if let Some(description) = &collection.description {
                println!("{description}");
            }
            let page = settle(
                products
                    .fetch_collection_products(&key, &filters.into_filters()?, false)
                    .await,
            )?;
            print_products(&page.products);
        }
        ProductAction::ClearCache => {
            products.clear_cache().await;
            println!("Product cache cleared");
        }
    }
    Ok(())
}
