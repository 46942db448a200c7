//! Cart commands.

use larkspur_core::{CartItemId, LineOptions, ProductId};
use larkspur_storefront::Storefront;
use larkspur_storefront::stores::CartState;

use super::{CartAction, CommandError, money, print_cart_lines, settle};

pub async fn run(storefront: &Storefront, action: CartAction) -> Result<(), CommandError> {
    let cart = storefront.cart();
    let state = match action {
        CartAction::Show => settle(cart.fetch_cart().await)?,
        CartAction::Add {
            product_id,
            quantity,
            size,
            color,
        } => settle(
            cart.add_to_cart(&ProductId::new(product_id), quantity, LineOptions { size, color })
                .await,
        )?,
        CartAction::Update { item_id, quantity } => {
            settle(cart.update_quantity(&CartItemId::new(item_id), quantity).await)?
        }
        CartAction::Remove { item_id } => {
            settle(cart.remove_from_cart(&CartItemId::new(item_id)).await)?
        }
        CartAction::Clear => settle(cart.clear_cart().await)?,
        CartAction::Sync => match cart.sync_with_backend().await {
            Some(sync) => {
                println!("Synced {} line(s), {} rejected", sync.synced, sync.failed);
                settle(sync.cart)?
            }
            None => {
                println!("Nothing to sync");
                cart.state().await
            }
        },
    };
    print_cart(&state);
    Ok(())
}

fn print_cart(state: &CartState) {
    if state.items.is_empty() {
        println!("Your cart is empty");
        return;
    }
    print_cart_lines(&state.items);
    println!(
        "{} item(s), total {}",
        state.totals.total_items,
        money(state.totals.total_amount)
    );
    if state.items.iter().any(|i| i.is_offline()) {
        println!("Some lines are saved locally and will sync when the server is reachable");
    }
}
