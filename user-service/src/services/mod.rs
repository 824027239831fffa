//! Business logic for the user service: token lifecycle, permission grants
//! and user listing on top of the store and mail boundaries.

mod auth;
pub mod email;
pub mod error;
mod permissions;
pub mod store;
pub mod token_codec;
mod users;

pub use auth::AuthService;
pub use email::{EmailService, MailMessage, Mailer, RecordingMailer};
pub use error::ServiceError;
pub use permissions::PermissionService;
pub use store::{InvitationRedemption, MemoryStore, PgUserStore, StoreError, UserStore};
pub use token_codec::{CodecError, TokenClaims, TokenCodec, TokenLifetimes};
pub use users::UserService;
