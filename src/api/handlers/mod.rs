pub mod health;
pub use self::health::health;

pub mod submit_email;
pub use self::submit_email::submit_email;
