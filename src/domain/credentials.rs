use std::fmt;

use secrecy::SecretString;
use serde::Deserialize;

/// Login and reporting data for the single monitored account, read from the
/// `[db]` section of the configuration file. Never mutated after loading.
#[derive(Deserialize)]
pub struct CredentialBundle {
    pub branch: String,
    pub account: String,
    pub subaccount: String,
    pub pin: SecretString,
    /// Alert expression over `balance`, e.g. `balance < 100`.
    pub conditions: String,
    pub email_addr: String,
    pub password: SecretString,
    pub email_host: String,
}

impl CredentialBundle {
    /// Account number with everything but the last four digits hidden.
    pub fn masked_account(&self) -> String {
        mask(&self.account)
    }
}

fn mask(value: &str) -> String {
    let visible = 4;
    let len = value.chars().count();
    if len <= visible {
        return "*".repeat(len);
    }

    let tail: String = value.chars().skip(len - visible).collect();
    format!("{}{}", "*".repeat(len - visible), tail)
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("branch", &self.branch)
            .field("account", &self.masked_account())
            .field("subaccount", &self.subaccount)
            .field("pin", &"<redacted>")
            .field("conditions", &self.conditions)
            .field("email_addr", &self.email_addr)
            .field("password", &"<redacted>")
            .field("email_host", &self.email_host)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn sample_credentials(conditions: &str) -> CredentialBundle {
    CredentialBundle {
        branch: "100".to_string(),
        account: "1234567".to_string(),
        subaccount: "00".to_string(),
        pin: SecretString::new("98765".to_string()),
        conditions: conditions.to_string(),
        email_addr: "owner@example.com".to_string(),
        password: SecretString::new("hunter2".to_string()),
        email_host: "smtp.example.com".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_account_keeps_last_four() {
        let credentials = sample_credentials("false");
        assert_eq!(credentials.masked_account(), "***4567");
    }

    #[test]
    fn test_mask_short_value() {
        assert_eq!(mask("12"), "**");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let credentials = sample_credentials("balance < 100");
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("98765"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("1234567"));
        assert!(debug.contains("balance < 100"));
    }
}
