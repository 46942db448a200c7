//! Session commands.

use larkspur_core::{Email, User};
use larkspur_storefront::Storefront;
use larkspur_storefront::session::{Registration, SessionState};
use secrecy::SecretString;

use super::{AuthAction, CommandError};

pub async fn run(storefront: &Storefront, action: AuthAction) -> Result<(), CommandError> {
    let session = storefront.session();
    match action {
        AuthAction::Login { email, password } => {
            let email = Email::parse(&email)?;
            let user = session.login(&email, &SecretString::from(password)).await?;
            greet(&user);
            // Lines added while signed out are pushed now that there is a session
            if let Some(sync) = storefront.cart().sync_with_backend().await {
                println!("Synced {} offline cart line(s), {} rejected", sync.synced, sync.failed);
            }
        }
        AuthAction::Signup {
            first_name,
            last_name,
            email,
            password,
            phone,
        } => {
            let registration = Registration {
                first_name,
                last_name,
                email: Email::parse(&email)?,
                password: SecretString::from(password),
                phone,
            };
            let user = session.signup(&registration).await?;
            greet(&user);
        }
        AuthAction::Logout => {
            session.logout().await;
            println!("Signed out");
        }
        AuthAction::Status => match session.state() {
            SessionState::SignedIn(user) => {
                println!("Signed in as {} <{}> ({})", user.display_name(), user.email, user.role);
            }
            SessionState::Expired => println!("Session expired, please log in again"),
            SessionState::ServerUnavailable => println!("Server unavailable"),
            SessionState::SignedOut | SessionState::Loading => println!("Signed out"),
        },
        AuthAction::Profile => {
            let user = session.refresh_profile().await?;
            println!("{} <{}>", user.display_name(), user.email);
            println!("  role:     {}", user.role);
            println!("  verified: {}", user.is_verified);
            if let Some(phone) = &user.phone {
                println!("  phone:    {phone}");
            }
            for address in &user.addresses {
                println!("  {}: {}", address.kind, address.address);
            }
        }
    }
    Ok(())
}

fn greet(user: &User) {
    println!("Welcome, {}", user.display_name());
}
