//! External-facing services: tokens and passwords, the payment gateway,
//! SMTP, and the image host.

pub mod auth;
pub mod checkout;
pub mod email;
pub mod media;

pub use auth::{AuthError, TokenService};
pub use checkout::{CheckoutError, CheckoutService, WebhookEvent};
pub use email::{EmailError, EmailService};
pub use media::{MediaError, MediaService};
