//! Checkout commands.
//!
//! Payment confirmation happens in the processor's hosted page; the CLI
//! stops after the order and payment intent exist.

use clap::Args;
use larkspur_storefront::Storefront;
use larkspur_storefront::checkout::{OrderQuote, ShippingForm, ShippingMethod};

use super::{CheckoutAction, CommandError, money, parse_arg};

/// Shipping details for `checkout place`.
#[derive(Args, Debug)]
pub struct ShippingArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
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
}

impl From<ShippingArgs> for ShippingForm {
    fn from(args: ShippingArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            phone: args.phone,
            address1: args.address1,
            address2: args.address2,
            city: args.city,
            state: args.state,
            postal_code: args.postal_code,
            country: args.country,
        }
    }
}

pub async fn run(storefront: &Storefront, action: CheckoutAction) -> Result<(), CommandError> {
    let checkout = storefront.checkout();
    match action {
        CheckoutAction::Quote { shipping } => {
            let method: ShippingMethod = parse_arg(&shipping)?;
            print_quote(&checkout.quote(method).await, method);
        }
        CheckoutAction::Place { form, shipping } => {
            let method: ShippingMethod = parse_arg(&shipping)?;
            let pending = checkout.begin(&form.into(), method).await?;
            print_quote(&pending.quote, method);
            println!("Order {} created, awaiting payment", pending.order_id);
        }
    }
    Ok(())
}

fn print_quote(quote: &OrderQuote, method: ShippingMethod) {
    println!("Subtotal:  {:>10}", money(quote.subtotal));
    println!("Shipping:  {:>10}  {}", money(quote.shipping), method.label());
    println!("Tax:       {:>10}", money(quote.tax));
    println!("Total:     {:>10}", quote.total_display());
}
