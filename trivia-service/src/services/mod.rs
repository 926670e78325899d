//! Business logic: account workflows, token handling, trivia content and the
//! waitlist, plus the persistence and email seams they depend on.

mod auth;
mod database;
pub mod email;
pub mod error;
pub mod store;
mod token;
mod trivia;
mod waitlist;

pub use auth::{AuthService, NewUser};
pub use database::Database;
pub use email::{EmailProvider, EmailService, EmailTemplates, MockEmailService};
pub use error::ServiceError;
pub use store::{
    MemoryTriviaStore, MemoryUserStore, MemoryWaitlistStore, TriviaStore, UserStore,
    WaitlistStore,
};
pub use token::{TokenClaims, TokenKind, TokenService};
pub use trivia::TriviaService;
pub use waitlist::WaitlistService;
