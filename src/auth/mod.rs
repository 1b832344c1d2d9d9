pub mod identity;
pub mod passphrase;
pub mod permissions;
