mod error;
pub use error::*;

mod key;
pub use key::*;

mod bundle;
pub use bundle::*;

mod signature;
pub use signature::*;

mod claims;
pub use claims::*;

mod result;
pub use result::*;

mod config;
pub use config::*;

mod verifier;
pub use verifier::*;
