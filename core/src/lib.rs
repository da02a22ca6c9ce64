pub mod credentials;
pub mod error;
pub mod shape;

pub use credentials::{
    ConsumerKey, CredentialField, CredentialSource, Credentials, EnvSource, FieldNaming, Grant,
    LoginPair, StaticSource, TokenPair, resolve,
};
pub use error::{ApiError, FanfouError};
