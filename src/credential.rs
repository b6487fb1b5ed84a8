use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::model::error::{ConnectorError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Decoded length of a storage account access key.
pub const ACCOUNT_KEY_LEN: usize = 64;

/// Storage account names are 3 to 24 lowercase ASCII letters and digits.
///
/// The name becomes the host of the default endpoint, so anything else is
/// rejected before a URL is built from it.
pub fn check_account_name(account: &str) -> Result<()> {
    if account.is_empty() {
        return Err(ConnectorError::InvalidCredential(
            "account name is empty".to_string(),
        ));
    }

    let valid_chars = account
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !(3..=24).contains(&account.len()) || !valid_chars {
        return Err(ConnectorError::InvalidCredential(format!(
            "account name `{}` must be 3 to 24 lowercase letters or digits",
            account
        )));
    }

    Ok(())
}

/// Account name plus decoded access key, used to sign Shared Key requests.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl SharedKeyCredential {
    pub fn new(account: &str, access_key: &str) -> Result<Self> {
        check_account_name(account)?;

        if access_key.is_empty() {
            return Err(ConnectorError::InvalidCredential(
                "access key is empty".to_string(),
            ));
        }

        let key = BASE64_STANDARD.decode(access_key.trim()).map_err(|err| {
            ConnectorError::InvalidCredential(format!("access key is not valid base64: {}", err))
        })?;

        if key.len() != ACCOUNT_KEY_LEN {
            return Err(ConnectorError::InvalidCredential(format!(
                "access key decodes to {} bytes, expected {}",
                key.len(),
                ACCOUNT_KEY_LEN
            )));
        }

        Ok(Self {
            account: account.to_string(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Base64 HMAC-SHA256 of `string_to_sign` under the account key.
    pub fn sign(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| ConnectorError::InvalidCredential(err.to_string()))?;
        mac.update(string_to_sign.as_bytes());

        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Value of the `Authorization` header for a request.
    pub fn authorization(&self, string_to_sign: &str) -> Result<String> {
        Ok(format!(
            "SharedKey {}:{}",
            self.account,
            self.sign(string_to_sign)?
        ))
    }
}

impl fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}
