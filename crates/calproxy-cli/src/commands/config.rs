//! `calproxy config`.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret;

const REDACTED: &str = "********";

/// Prints the effective configuration with inline secrets masked.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&redacted(config))
        .map_err(|e| ClientError::config(format!("failed to serialize config: {}", e)))?;
    println!("# {}", ClientConfig::default_path().display());
    println!("{}", toml_str);
    Ok(())
}

/// Checks that the server could start with this configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let google = config.google.to_provider_config()?;
    println!("Google OAuth client: {}", google.credentials.client_id);
    println!("Credential file: {}", google.token_path.display());
    println!("Authorization mode: {}", google.auth_mode);
    println!("Listen address: {}", config.server.bind);
    println!("Configuration is valid.");
    Ok(())
}

pub fn path() -> ClientResult<()> {
    println!("{}", ClientConfig::default_path().display());
    Ok(())
}

/// Masks secrets stored inline. References are kept since they hold no secret.
fn redacted(config: &ClientConfig) -> ClientConfig {
    let mut config = config.clone();
    let google = &mut config.google;
    for value in [&mut google.client_secret, &mut google.client_config] {
        if let Some(v) = value
            && !secret::is_reference(v)
        {
            *v = REDACTED.to_string();
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_masks_inline_secrets_only() {
        let config = ClientConfig::parse(
            r#"
[google]
client_id = "1.apps.googleusercontent.com"
client_secret = "plain-secret"
client_config = "env::GOOGLE_CLIENT_CONFIG"
"#,
        )
        .unwrap();

        let masked = redacted(&config);
        assert_eq!(masked.google.client_secret.as_deref(), Some(REDACTED));
        assert_eq!(
            masked.google.client_config.as_deref(),
            Some("env::GOOGLE_CLIENT_CONFIG")
        );
        assert_eq!(masked.google.client_id, config.google.client_id);

        let rendered = toml::to_string_pretty(&masked).unwrap();
        assert!(!rendered.contains("plain-secret"));
    }

    #[test]
    fn validate_rejects_missing_client() {
        let mut config = ClientConfig::default();
        config.google.client_id = Some("1.apps.googleusercontent.com".to_string());
        assert!(validate(&config).is_err());
    }
}
