//! Typed wrappers over the request pipeline, one per secrets engine.

mod kv;
mod token;
mod transit;

pub use kv::{Kv1, Kv1ReadResponse, Kv2};
pub use token::{CreateTokenRequest, CreateTokenResponse, TokenAuth, TokenLookupResponse};
pub use transit::{
    Transit, TransitCreateOptions, TransitDecryptOptions, TransitDecryptResponse,
    TransitEncryptOptions, TransitEncryptResponse, TransitExportOptions, TransitExportResponse,
    TransitReadResponse, TransitUpdateOptions, decode_ciphertext, encode_ciphertext,
};

const PATH_PREFIX: &str = "v1";
