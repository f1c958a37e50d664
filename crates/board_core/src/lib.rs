pub mod api;
pub mod board;
pub mod credentials;
pub mod transition;

pub use api::{ApiClient, ApiClientOptions};
pub use board::{BoardState, BoardStats};
pub use credentials::{Credential, CredentialPersistence, CredentialStore, FileCredentials};
pub use transition::{
    DropOutcome, PendingTransition, TransitionController, TransitionError, TransitionReport,
};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
