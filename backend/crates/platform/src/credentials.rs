//! `Authorization` header parsing
//!
//! Common functions for pulling Basic and Bearer credentials out of HTTP
//! request headers.

use std::fmt;

use axum::http::{HeaderMap, HeaderValue, header};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::from_base64;

/// Error when extracting credentials
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("missing Authorization header")]
    Missing,

    #[error("unsupported authorization scheme")]
    WrongScheme,

    #[error("malformed credentials")]
    Malformed,
}

/// Login and password from an HTTP Basic header
///
/// The password half is zeroized on drop; debug output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BasicCredentials {
    login: String,
    password: String,
}

impl BasicCredentials {
    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, CredentialsError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(CredentialsError::Missing)?
        .to_str()
        .map_err(|_| CredentialsError::Malformed)?;

    let (given, rest) = value.split_once(' ').ok_or(CredentialsError::Malformed)?;
    if !given.eq_ignore_ascii_case(scheme) {
        return Err(CredentialsError::WrongScheme);
    }
    Ok(rest.trim())
}

/// Extract `Authorization: Basic <base64(login:password)>`
///
/// The password may itself contain `:`; only the first one separates.
pub fn extract_basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, CredentialsError> {
    let encoded = authorization(headers, "Basic")?;
    let decoded = from_base64(encoded).map_err(|_| CredentialsError::Malformed)?;
    let mut decoded = String::from_utf8(decoded).map_err(|_| CredentialsError::Malformed)?;

    let credentials = decoded
        .split_once(':')
        .map(|(login, password)| BasicCredentials {
            login: login.to_string(),
            password: password.to_string(),
        });
    decoded.zeroize();

    credentials.ok_or(CredentialsError::Malformed)
}

/// Extract `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, CredentialsError> {
    let token = authorization(headers, "Bearer")?;
    if token.is_empty() {
        return Err(CredentialsError::Malformed);
    }
    Ok(token.to_string())
}

/// `WWW-Authenticate` challenge for Basic authentication
pub fn basic_challenge(realm: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"))
}
