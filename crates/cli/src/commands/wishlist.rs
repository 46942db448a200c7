//! Wishlist commands.

use larkspur_core::ProductId;
use larkspur_storefront::Storefront;
use larkspur_storefront::stores::WishlistState;

use super::{CommandError, WishlistAction, money, settle};

pub async fn run(storefront: &Storefront, action: WishlistAction) -> Result<(), CommandError> {
    let wishlist = storefront.wishlist();
    let state = match action {
        WishlistAction::Show => settle(wishlist.fetch_wishlist().await)?,
        WishlistAction::Add { product_id } => {
            settle(wishlist.add_to_wishlist(&ProductId::new(product_id)).await)?
        }
        WishlistAction::Remove { product_id } => {
            settle(wishlist.remove_from_wishlist(&ProductId::new(product_id)).await)?
        }
        WishlistAction::Move { product_id } => {
            wishlist
                .move_to_cart(&ProductId::new(product_id), storefront.cart())
                .await?;
            println!("Moved to cart");
            wishlist.state().await
        }
        WishlistAction::Check { product_id } => {
            let saved = wishlist.check(&ProductId::new(product_id)).await;
            println!("{}", if saved { "In wishlist" } else { "Not in wishlist" });
            return Ok(());
        }
        WishlistAction::Clear => settle(wishlist.clear_wishlist().await)?,
    };
    print_wishlist(&state);
    Ok(())
}

fn print_wishlist(state: &WishlistState) {
    if state.items.is_empty() {
        println!("Your wishlist is empty");
        return;
    }
    for item in &state.items {
        match &item.product {
            Some(product) => println!(
                "{:<24} {:<40} {:>10}",
                item.product_id,
                product.name,
                money(product.price)
            ),
            None => println!("{:<24} (details unavailable offline)", item.product_id),
        }
    }
    println!("{} saved item(s)", state.items.len());
}
