//! Catalog commands: product and customer lookups.

use tillpoint_client::ApiError;

use crate::{CatalogAction, Context};

/// Dispatch one products subcommand.
#[allow(clippy::print_stdout)]
pub async fn products(ctx: &Context, action: CatalogAction) -> Result<(), ApiError> {
    let products = match action {
        CatalogAction::List => ctx.api.list_products().await?,
        CatalogAction::Search { query } => ctx.api.search_products(&query).await?,
    };

    if products.is_empty() {
        println!("No products");
        return Ok(());
    }

    for product in products {
        println!(
            "#{:<6} {:<30} {:>8}   stock {}",
            product.id, product.name, product.price, product.stock
        );
    }
    Ok(())
}

/// Dispatch one customers subcommand.
#[allow(clippy::print_stdout)]
pub async fn customers(ctx: &Context, action: CatalogAction) -> Result<(), ApiError> {
    let customers = match action {
        CatalogAction::List => ctx.api.list_customers().await?,
        CatalogAction::Search { query } => ctx.api.search_customers(&query).await?,
    };

    if customers.is_empty() {
        println!("No customers");
        return Ok(());
    }

    for customer in customers {
        let contact = customer
            .email
            .or(customer.phone)
            .unwrap_or_else(|| "-".to_string());
        println!("#{:<6} {:<30} {}", customer.id, customer.name, contact);
    }
    Ok(())
}
