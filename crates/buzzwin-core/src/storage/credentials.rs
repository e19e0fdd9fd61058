//! Thin wrapper around the OS keyring for credential storage.

use crate::error::ConfigError;

const SERVICE: &str = "buzzwin";

/// Keyring entry holding the email relay API key.
pub const EMAIL_API_KEY: &str = "email_api_key";

pub fn get(key: &str) -> Result<Option<String>, ConfigError> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    match entry.get_password() {
        Ok(pw) => Ok(Some(pw)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set(key: &str, value: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

pub fn delete(key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// API key for the email relay, if one has been stored.
pub fn email_api_key() -> Result<Option<String>, ConfigError> {
    get(EMAIL_API_KEY)
}

pub fn set_email_api_key(value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: EMAIL_API_KEY.to_string(),
            message: "API key is empty".into(),
        });
    }
    set(EMAIL_API_KEY, value)
}

pub fn clear_email_api_key() -> Result<(), ConfigError> {
    delete(EMAIL_API_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_is_rejected_before_touching_keyring() {
        assert!(matches!(
            set_email_api_key("   "),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
