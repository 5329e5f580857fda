//! Session commands: login, logout, whoami, register.

use secrecy::SecretString;
use tillpoint_client::AuthError;
use tillpoint_client::types::Registration;

use crate::Context;

/// Log in and persist the session.
#[allow(clippy::print_stdout)]
pub async fn login(ctx: &Context, username: &str, password: String) -> Result<(), AuthError> {
    let password = SecretString::from(password);
    ctx.session.login(username, &password).await?;

    match ctx.session.current_user() {
        Some(user) => println!("Logged in as {}", user.username),
        None => println!("Logged in"),
    }
    Ok(())
}

/// Clear the session and persisted tokens.
#[allow(clippy::print_stdout)]
pub fn logout(ctx: &Context) {
    ctx.session.logout();
    println!("Logged out");
}

/// Show the authenticated user.
#[allow(clippy::print_stdout)]
pub fn whoami(ctx: &Context) {
    let Some(user) = ctx.session.current_user() else {
        println!("Not logged in");
        return;
    };

    println!("{} (#{})", user.username, user.id);
    if !user.email.is_empty() {
        println!("  email: {}", user.email);
    }
    let full_name = format!("{} {}", user.first_name, user.last_name);
    let full_name = full_name.trim();
    if !full_name.is_empty() {
        println!("  name:  {full_name}");
    }
}

/// Register a new account. Does not log in.
#[allow(clippy::print_stdout)]
pub async fn register(
    ctx: &Context,
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> Result<(), AuthError> {
    let registration = Registration {
        username,
        email,
        password,
        first_name,
        last_name,
    };

    let user = ctx.session.register(&registration).await?;
    println!("Registered {} (#{})", user.username, user.id);
    println!("Run `tp-cli login -u {}` to sign in", user.username);
    Ok(())
}
