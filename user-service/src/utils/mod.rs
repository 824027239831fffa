mod extract;
mod links;
mod password;
mod validation;

pub use extract::{ApiPath, ApiQuery};
pub use links::token_link;
pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking, Password,
    PasswordHashString,
};
pub use validation::{validate_name, validate_password_format, validate_purpose, ValidatedJson};
