//! Application Layer
//!
//! Use cases and application services.

pub mod authorize;
pub mod config;
pub mod reconcile;
pub mod refresh;
pub mod sign_in;
pub mod sign_up;
pub mod step_up;
pub mod totp_setup;

// Re-exports
pub use authorize::AuthorizeUseCase;
pub use config::{AuthConfig, BootstrapUser};
pub use reconcile::{ReconcileReport, ReconcileUseCase};
pub use refresh::{RefreshOutput, RefreshUseCase};
pub use sign_in::{SignInInput, SignInOutcome, SignInUseCase, TokenPair};
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use step_up::StepUpUseCase;
pub use totp_setup::{TotpSetupOutput, TotpSetupUseCase};
