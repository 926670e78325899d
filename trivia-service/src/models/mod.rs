pub mod trivia;
pub mod user;
pub mod waitlist;

pub use trivia::{Paginated, TriviaQuestion, WrongAnswer};
pub use user::{AuthorizedUser, User, ROLE_ADMIN, ROLE_PLAYER, ROLE_SUPPORT};
pub use waitlist::WaitlistEntry;
