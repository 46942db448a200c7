//! Back-office commands.

use clap::Args;
use larkspur_core::{CollectionId, ProductId, Role, UserId};
use larkspur_storefront::Storefront;
use larkspur_storefront::admin::NewProduct;
use rust_decimal::Decimal;

use super::{AdminAction, CommandError, money, parse_arg, print_products};

/// Fields for `admin create-product`.
#[derive(Args, Debug)]
pub struct ProductArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price: Decimal,
    #[arg(long)]
    compare_price: Option<Decimal>,
    /// Repeatable
    #[arg(long)]
    image: Vec<String>,
    #[arg(long, default_value_t = 0)]
    stock: u32,
    #[arg(long)]
    collection: Option<String>,
    /// Repeatable
    #[arg(long)]
    size: Vec<String>,
    /// Repeatable
    #[arg(long)]
    color: Vec<String>,
    /// Repeatable
    #[arg(long)]
    tag: Vec<String>,
    #[arg(long)]
    featured: bool,
}

impl From<ProductArgs> for NewProduct {
    fn from(args: ProductArgs) -> Self {
        Self {
            name: args.name,
            description: args.description,
            price: args.price,
            compare_price: args.compare_price,
            images: args.image,
            stock: args.stock,
            collection_id: args.collection.map(CollectionId::new),
            sizes: args.size,
            colors: args.color,
            tags: args.tag,
            is_featured: args.featured,
        }
    }
}

pub async fn run(storefront: &Storefront, action: AdminAction) -> Result<(), CommandError> {
    let admin = storefront.admin();
    match action {
        AdminAction::Users => {
            for user in admin.list_users().await? {
                println!("{:<24} {:<32} {:<12} {}", user.id, user.email, user.role, user.display_name());
            }
        }
        AdminAction::SetRole { user_id, role } => {
            let role: Role = parse_arg(&role)?;
            let user = admin.update_role(&UserId::new(user_id), role).await?;
            println!("{} is now {}", user.email, user.role);
        }
        AdminAction::DeleteUser { user_id } => {
            admin.delete_user(&UserId::new(user_id)).await?;
            println!("User deleted");
        }
        AdminAction::Products { page, limit } => {
            let listing = admin.list_products(page, limit).await?;
            print_products(&listing.products);
            if let Some(pagination) = listing.pagination {
                println!("Page {} of {}", pagination.page, pagination.pages);
            }
        }
        AdminAction::CreateProduct { product } => {
            let created = admin.create_product(&product.into()).await?;
            println!("Created {} ({}) at {}", created.name, created.id, money(created.price));
        }
        AdminAction::DeleteProduct { id } => {
            admin.delete_product(&ProductId::new(id)).await?;
            println!("Product deleted");
        }
    }
    Ok(())
}
