//! Account commands.

use clap::Args;
use larkspur_core::{Address, AddressId, Order, OrderId, ProductId};
use larkspur_storefront::Storefront;
use larkspur_storefront::account::ReviewDraft;

use super::{AccountAction, CommandError, money};

/// Fields for `account add-address`.
#[derive(Args, Debug)]
pub struct AddressArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    address1: String,
    #[arg(long)]
    address2: Option<String>,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long)]
    postal_code: String,
    #[arg(long, default_value = "US")]
    country: String,
    #[arg(long)]
    phone: Option<String>,
    /// Make this the default shipping address
    #[arg(long)]
    default: bool,
}

impl From<AddressArgs> for Address {
    fn from(args: AddressArgs) -> Self {
        Self {
            id: None,
            first_name: args.first_name,
            last_name: args.last_name,
            company: args.company,
            address1: args.address1,
            address2: args.address2,
            city: args.city,
            state: args.state,
            postal_code: args.postal_code,
            country: args.country,
            phone: args.phone,
            is_default: args.default,
        }
    }
}

pub async fn run(storefront: &Storefront, action: AccountAction) -> Result<(), CommandError> {
    let account = storefront.account();
    match action {
        AccountAction::Orders => {
            let orders = account.orders().await?;
            if orders.is_empty() {
                println!("No orders yet");
            }
            for order in &orders {
                print_order_summary(order);
            }
        }
        AccountAction::Order { id } => {
            let order = account.order(&OrderId::new(id)).await?;
            print_order_summary(&order);
            for item in &order.items {
                let name = item.product.as_ref().map_or("Product", |p| p.name.as_str());
                println!("  {:>3} x {:<40} {:>10}", item.quantity, name, money(item.price));
            }
            println!(
                "  subtotal {}  shipping {}  tax {}",
                money(order.subtotal),
                money(order.shipping),
                money(order.tax)
            );
            if let Some(tracking) = &order.tracking_number {
                println!("  tracking: {tracking}");
            }
        }
        AccountAction::Addresses => {
            for address in account.addresses().await? {
                print_address(&address);
            }
        }
        AccountAction::AddAddress { address } => {
            let created = account.create_address(&address.into()).await?;
            print_address(&created);
        }
        AccountAction::DeleteAddress { id } => {
            account.delete_address(&AddressId::new(id)).await?;
            println!("Address deleted");
        }
        AccountAction::Review {
            product_id,
            rating,
            comment,
        } => {
            let draft = ReviewDraft {
                product_id: ProductId::new(product_id),
                rating,
                comment,
            };
            account.submit_review(&draft).await?;
            println!("Thanks for your review");
        }
        AccountAction::Feedback => {
            for entry in account.featured_feedback().await? {
                let author = entry.user.as_ref().map_or_else(
                    || "Anonymous".to_string(),
                    |u| format!("{} {}", u.first_name, u.last_name),
                );
                println!("\"{}\" - {author}", entry.message);
            }
        }
        AccountAction::SendFeedback { message } => {
            account.submit_feedback(&message).await?;
            println!("Feedback sent");
        }
    }
    Ok(())
}

fn print_order_summary(order: &Order) {
    let number = if order.order_number.is_empty() {
        order.id.as_str()
    } else {
        order.order_number.as_str()
    };
    println!(
        "{:<16} {:<12} {:<10} {:>3} unit(s) {:>10}",
        number,
        format!("{:?}", order.status),
        format!("{:?}", order.payment_status),
        order.unit_count(),
        money(order.total)
    );
}

fn print_address(address: &Address) {
    let id = address.id.as_ref().map_or("-", AddressId::as_str);
    let marker = if address.is_default { " (default)" } else { "" };
    println!(
        "{id:<24} {} {}, {}, {}, {} {}, {}{marker}",
        address.first_name,
        address.last_name,
        address.address1,
        address.city,
        address.state,
        address.postal_code,
        address.country
    );
}
