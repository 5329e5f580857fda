//! Tillpoint CLI - terminal front-end for the point-of-sale engine.
//!
//! # Usage
//!
//! ```bash
//! # Authenticate against the backend
//! tp-cli login -u cashier
//!
//! # Build up a sale
//! tp-cli cart add 3 --quantity 2
//! tp-cli cart set-payment card
//! tp-cli cart show
//!
//! # Submit it
//! tp-cli cart submit
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` / `register` - session lifecycle
//! - `cart` - build, inspect, and submit the in-progress sale
//! - `products` / `customers` - catalog lookups

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};

use tillpoint_client::{
    ApiClient, CartManager, FileStore, PersistentStore, PosConfig, SessionManager,
};

mod commands;

#[derive(Parser)]
#[command(name = "tp-cli")]
#[command(author, version, about = "Tillpoint point-of-sale terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate against the backend
    Login {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Password (prefer TP_PASSWORD in the environment)
        #[arg(short, long, env = "TP_PASSWORD")]
        password: String,
    },
    /// Clear the session and persisted tokens
    Logout,
    /// Show the authenticated user
    Whoami,
    /// Register a new account
    Register {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (prefer TP_PASSWORD in the environment)
        #[arg(short, long, env = "TP_PASSWORD")]
        password: String,

        /// First name
        #[arg(long, default_value = "")]
        first_name: String,

        /// Last name
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Build, inspect, and submit the in-progress sale
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Browse products
    Products {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Browse customers
    Customers {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add a product to the sale
    Add {
        /// Product id
        product_id: i64,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a product from the sale
    Remove {
        /// Product id
        product_id: i64,
    },
    /// Replace the quantity of a line (0 removes it)
    SetQuantity {
        /// Product id
        product_id: i64,

        /// New quantity
        quantity: u32,
    },
    /// Print the current sale
    Show,
    /// Abandon the current sale
    Clear,
    /// Attach a customer to the sale (omit the id to detach)
    SetCustomer {
        /// Customer id
        customer_id: Option<i64>,
    },
    /// Select the payment method (cash, card, transfer, other)
    SetPayment {
        /// Payment method
        method: String,
    },
    /// Attach a note to the sale
    SetNotes {
        /// Note text
        notes: String,
    },
    /// Submit the sale to the backend and clear the cart
    Submit,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List all entries
    List,
    /// Search by name
    Search {
        /// Search query
        query: String,
    },
}

/// Everything a command needs, wired once at startup.
struct Context {
    session: SessionManager,
    api: ApiClient,
    cart: CartManager,
}

#[tokio::main]
async fn main() {
    // .env is optional; ignore a missing file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = PosConfig::from_env()?;
    let store: Arc<dyn PersistentStore> = Arc::new(FileStore::open(&config.data_dir)?);

    let session = SessionManager::new(&config, Arc::clone(&store));
    let api = ApiClient::new(&config, session.clone());
    let cart = CartManager::load(store);

    let ctx = Context { session, api, cart };

    // Login and register establish a session themselves; everything else
    // picks up the persisted one.
    if !matches!(cli.command, Commands::Login { .. } | Commands::Register { .. }) {
        ctx.session.restore_session().await;
    }

    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&ctx, &username, password).await?;
        }
        Commands::Logout => commands::auth::logout(&ctx),
        Commands::Whoami => commands::auth::whoami(&ctx),
        Commands::Register {
            username,
            email,
            password,
            first_name,
            last_name,
        } => {
            commands::auth::register(&ctx, username, email, password, first_name, last_name)
                .await?;
        }
        Commands::Cart { action } => commands::cart::run(&ctx, action).await?,
        Commands::Products { action } => commands::catalog::products(&ctx, action).await?,
        Commands::Customers { action } => commands::catalog::customers(&ctx, action).await?,
    }
    Ok(())
}
