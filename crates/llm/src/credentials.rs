//! AWS credential resolution for the Bedrock backend.
//!
//! Fixed precedence: explicit keys from configuration, then the shared
//! profile files (optionally a named `AWS_PROFILE`), then the ECS container
//! role, then EC2 instance metadata.

use aws_config::ecs::EcsCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::Credentials;

use chatbot_core::config::AwsCredentialsConfig;

/// Explicit static credentials, when both halves of the key pair are configured.
fn explicit_credentials(aws: &AwsCredentialsConfig) -> Option<Credentials> {
    match (&aws.access_key_id, &aws.secret_access_key) {
        (Some(key_id), Some(secret)) => Some(Credentials::new(
            key_id.clone(),
            secret.clone(),
            aws.session_token.clone(),
            None,
            "chatbot-config",
        )),
        _ => None,
    }
}

/// Names of the credential sources that will be tried, in order.
pub fn credential_sources(aws: &AwsCredentialsConfig) -> Vec<&'static str> {
    let mut sources = Vec::with_capacity(4);
    if explicit_credentials(aws).is_some() {
        sources.push("explicit");
    }
    sources.extend(["profile", "ecs", "imds"]);
    sources
}

/// Build the provider chain in the order reported by [`credential_sources`].
pub fn credentials_chain(aws: &AwsCredentialsConfig) -> CredentialsProviderChain {
    let mut profile = ProfileFileCredentialsProvider::builder();
    if let Some(name) = &aws.profile {
        profile = profile.profile_name(name);
    }

    let chain = match explicit_credentials(aws) {
        Some(creds) => CredentialsProviderChain::first_try("explicit", creds)
            .or_else("profile", profile.build()),
        None => CredentialsProviderChain::first_try("profile", profile.build()),
    };

    chain
        .or_else("ecs", EcsCredentialsProvider::builder().build())
        .or_else("imds", ImdsCredentialsProvider::builder().build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_keys_come_first() {
        let aws = AwsCredentialsConfig {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            session_token: None,
            profile: None,
        };
        assert_eq!(credential_sources(&aws), vec!["explicit", "profile", "ecs", "imds"]);
    }

    #[test]
    fn test_without_keys_starts_at_profile() {
        let aws = AwsCredentialsConfig {
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            profile: Some("dev".to_string()),
        };
        assert_eq!(credential_sources(&aws), vec!["profile", "ecs", "imds"]);
    }

    #[test]
    fn test_session_token_carried() {
        let aws = AwsCredentialsConfig {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            session_token: Some("token".to_string()),
            profile: None,
        };
        let creds = explicit_credentials(&aws).unwrap();
        assert_eq!(creds.access_key_id(), "AKIAEXAMPLE");
        assert_eq!(creds.session_token(), Some("token"));
    }
}
