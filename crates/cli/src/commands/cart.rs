//! Cart commands: build, inspect, and submit the in-progress sale.

use tillpoint_core::{CustomerId, PaymentMethod, ProductId};

use crate::{CartAction, Context};

/// Dispatch one cart subcommand.
pub async fn run(ctx: &Context, action: CartAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CartAction::Add {
            product_id,
            quantity,
        } => add(ctx, ProductId::new(product_id), quantity).await?,
        CartAction::Remove { product_id } => {
            ctx.cart.remove_item(ProductId::new(product_id))?;
        }
        CartAction::SetQuantity {
            product_id,
            quantity,
        } => {
            ctx.cart
                .update_item_quantity(ProductId::new(product_id), quantity)?;
        }
        CartAction::Show => show(ctx),
        CartAction::Clear => ctx.cart.clear_cart()?,
        CartAction::SetCustomer { customer_id } => {
            ctx.cart.set_customer(customer_id.map(CustomerId::new))?;
        }
        CartAction::SetPayment { method } => {
            let method: PaymentMethod = method.parse()?;
            ctx.cart.set_payment_method(method)?;
        }
        CartAction::SetNotes { notes } => ctx.cart.set_notes(notes)?,
        CartAction::Submit => submit(ctx).await?,
    }
    Ok(())
}

/// Look the product up so the line records its current price and name.
#[allow(clippy::print_stdout)]
async fn add(
    ctx: &Context,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let product = ctx.api.get_product(product_id).await?;
    ctx.cart.add_item(&product, quantity)?;
    println!("Added {quantity} x {} @ {}", product.name, product.price);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn show(ctx: &Context) {
    let cart = ctx.cart.cart();

    if cart.items.is_empty() {
        println!("Cart is empty");
        return;
    }

    for line in &cart.items {
        println!(
            "{:>4} x {:<30} {:>8}   {:>8}",
            line.quantity, line.name, line.unit_price, line.line_total
        );
    }
    println!("{:>56}", format!("total: {}", ctx.cart.total()));

    if let Some(customer) = cart.customer {
        println!("customer: #{customer}");
    }
    println!("payment:  {}", cart.payment_method);
    if !cart.notes.is_empty() {
        println!("notes:    {}", cart.notes);
    }
}

#[allow(clippy::print_stdout)]
async fn submit(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let summary = ctx.cart.summary();

    if summary.items.is_empty() {
        println!("Cart is empty; nothing to submit");
        return Ok(());
    }

    let sale = ctx.api.submit_sale(&summary).await?;
    ctx.cart.clear_cart()?;

    match sale.reference_no {
        Some(reference) => println!("Sale {reference} recorded, total {}", sale.total_amount),
        None => println!("Sale #{} recorded, total {}", sale.id, sale.total_amount),
    }
    Ok(())
}
