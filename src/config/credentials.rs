//! Credential documents (`source.json` / `target.json`).
//!
//! ```json
//! {"provider": "s3", "accessKeyId": "...", "secretAccessKey": "...", "region": "us-east-1"}
//! {"provider": "local", "root": "/data/objects"}
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::args::value_parser::url;
use crate::config::{CLITimeoutConfig, ClientConfig, RetryConfig, StorageConfig};
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials};

const EXAMPLE_CREDENTIAL_FILE: &str = r#"example:
{
  "provider": "s3",
  "accessKeyId": "<ACCESS_KEY_ID>",
  "secretAccessKey": "<SECRET_ACCESS_KEY>",
  "region": "us-east-1"
}
or
{
  "provider": "local",
  "root": "/path/to/containers"
}
"#;

const ACCESS_KEY_WITHOUT_SECRET: &str = "accessKeyId requires secretAccessKey.";
const SECRET_WITHOUT_ACCESS_KEY: &str = "secretAccessKey requires accessKeyId.";
const SESSION_TOKEN_WITHOUT_ACCESS_KEY: &str = "sessionToken requires accessKeyId.";
const PROFILE_WITH_ACCESS_KEY: &str = "profile cannot be used with accessKeyId.";

#[derive(Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
enum CredentialFile {
    #[serde(alias = "amazon", alias = "aws")]
    S3(S3CredentialFile),
    Local(LocalCredentialFile),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S3CredentialFile {
    #[serde(alias = "keyId")]
    access_key_id: Option<String>,
    #[serde(alias = "key")]
    secret_access_key: Option<String>,
    session_token: Option<String>,
    profile: Option<String>,
    region: Option<String>,
    endpoint_url: Option<String>,
    #[serde(default)]
    force_path_style: bool,
}

#[derive(Deserialize)]
struct LocalCredentialFile {
    root: PathBuf,
}

/// Client settings that come from the command line rather than the credential file.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub client_config_location: ClientConfigLocation,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
}

pub fn load_storage_config(path: &Path, settings: &ClientSettings) -> Result<StorageConfig, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        format!(
            "failed to read the credential file {}: {e}\n{EXAMPLE_CREDENTIAL_FILE}",
            path.display()
        )
    })?;

    parse_storage_config(&contents, settings).map_err(|e| {
        format!(
            "invalid credential file {}: {e}\n{EXAMPLE_CREDENTIAL_FILE}",
            path.display()
        )
    })
}

pub fn parse_storage_config(
    contents: &str,
    settings: &ClientSettings,
) -> Result<StorageConfig, String> {
    let credential_file: CredentialFile =
        serde_json::from_str(contents).map_err(|e| e.to_string())?;

    match credential_file {
        CredentialFile::S3(s3) => Ok(StorageConfig::S3(s3.into_client_config(settings)?)),
        CredentialFile::Local(local) => Ok(StorageConfig::Local(local.root)),
    }
}

impl S3CredentialFile {
    fn into_client_config(self, settings: &ClientSettings) -> Result<ClientConfig, String> {
        let credential = match (self.access_key_id, self.secret_access_key) {
            (Some(_), _) if self.profile.is_some() => {
                return Err(PROFILE_WITH_ACCESS_KEY.to_string());
            }
            (Some(access_key), Some(secret_access_key)) => S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key,
                    secret_access_key,
                    session_token: self.session_token,
                },
            },
            (Some(_), None) => return Err(ACCESS_KEY_WITHOUT_SECRET.to_string()),
            (None, Some(_)) => return Err(SECRET_WITHOUT_ACCESS_KEY.to_string()),
            (None, None) if self.session_token.is_some() => {
                return Err(SESSION_TOKEN_WITHOUT_ACCESS_KEY.to_string());
            }
            (None, None) => match self.profile {
                Some(profile) => S3Credentials::Profile(profile),
                None => S3Credentials::FromEnvironment,
            },
        };

        if let Some(endpoint_url) = &self.endpoint_url {
            url::check_scheme(endpoint_url)?;
        }

        Ok(ClientConfig {
            client_config_location: settings.client_config_location.clone(),
            credential,
            region: self.region,
            endpoint_url: self.endpoint_url,
            force_path_style: self.force_path_style,
            retry_config: settings.retry_config,
            cli_timeout_config: settings.cli_timeout_config,
            disable_stalled_stream_protection: settings.disable_stalled_stream_protection,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parse_amazon_credentials() {
        init_dummy_tracing_subscriber();

        let contents = r#"{"provider": "amazon", "keyId": "my_key_id", "key": "my_key", "region": "eu-west-1"}"#;
        let StorageConfig::S3(client_config) =
            parse_storage_config(contents, &client_settings()).unwrap()
        else {
            panic!("s3 storage expected");
        };

        let S3Credentials::Credentials { access_keys } = &client_config.credential else {
            panic!("access keys expected");
        };
        assert_eq!(access_keys.access_key, "my_key_id");
        assert_eq!(access_keys.secret_access_key, "my_key");
        assert_eq!(access_keys.session_token, None);
        assert_eq!(client_config.region, Some("eu-west-1".to_string()));
        assert!(!client_config.force_path_style);
        assert_eq!(client_config.retry_config.aws_max_attempts, 3);
    }

    #[test]
    fn parse_s3_credentials_with_endpoint() {
        init_dummy_tracing_subscriber();

        let contents = r#"{
            "provider": "s3",
            "accessKeyId": "my_access_key",
            "secretAccessKey": "my_secret_access_key",
            "sessionToken": "my_session_token",
            "endpointUrl": "http://localhost:9000",
            "forcePathStyle": true
        }"#;
        let StorageConfig::S3(client_config) =
            parse_storage_config(contents, &client_settings()).unwrap()
        else {
            panic!("s3 storage expected");
        };

        let S3Credentials::Credentials { access_keys } = &client_config.credential else {
            panic!("access keys expected");
        };
        assert_eq!(
            access_keys.session_token,
            Some("my_session_token".to_string())
        );
        assert_eq!(
            client_config.endpoint_url,
            Some("http://localhost:9000".to_string())
        );
        assert!(client_config.force_path_style);
    }

    #[test]
    fn parse_profile_and_environment_credentials() {
        init_dummy_tracing_subscriber();

        let StorageConfig::S3(client_config) = parse_storage_config(
            r#"{"provider": "aws", "profile": "backup"}"#,
            &client_settings(),
        )
        .unwrap() else {
            panic!("s3 storage expected");
        };
        assert!(matches!(
            client_config.credential,
            S3Credentials::Profile(ref profile) if profile == "backup"
        ));

        let StorageConfig::S3(client_config) =
            parse_storage_config(r#"{"provider": "s3"}"#, &client_settings()).unwrap()
        else {
            panic!("s3 storage expected");
        };
        assert!(matches!(
            client_config.credential,
            S3Credentials::FromEnvironment
        ));
    }

    #[test]
    fn parse_local_storage() {
        init_dummy_tracing_subscriber();

        let storage_config =
            parse_storage_config(r#"{"provider": "local", "root": "./data"}"#, &client_settings())
                .unwrap();
        assert!(matches!(
            storage_config,
            StorageConfig::Local(ref root) if root == Path::new("./data")
        ));
    }

    #[test]
    fn parse_invalid_credentials() {
        init_dummy_tracing_subscriber();

        let settings = client_settings();

        assert_eq!(
            parse_storage_config(r#"{"provider": "s3", "accessKeyId": "a"}"#, &settings)
                .unwrap_err(),
            ACCESS_KEY_WITHOUT_SECRET
        );
        assert_eq!(
            parse_storage_config(r#"{"provider": "s3", "secretAccessKey": "a"}"#, &settings)
                .unwrap_err(),
            SECRET_WITHOUT_ACCESS_KEY
        );
        assert_eq!(
            parse_storage_config(r#"{"provider": "s3", "sessionToken": "a"}"#, &settings)
                .unwrap_err(),
            SESSION_TOKEN_WITHOUT_ACCESS_KEY
        );
        assert_eq!(
            parse_storage_config(
                r#"{"provider": "s3", "accessKeyId": "a", "secretAccessKey": "b", "profile": "c"}"#,
                &settings
            )
            .unwrap_err(),
            PROFILE_WITH_ACCESS_KEY
        );
        assert!(
            parse_storage_config(
                r#"{"provider": "s3", "endpointUrl": "ftp://localhost"}"#,
                &settings
            )
            .is_err()
        );
        assert!(parse_storage_config(r#"{"provider": "rackspace"}"#, &settings).is_err());
        assert!(parse_storage_config(r#"{"provider": "local"}"#, &settings).is_err());
        assert!(parse_storage_config("not json", &settings).is_err());
    }

    #[test]
    fn load_from_file() {
        init_dummy_tracing_subscriber();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"provider": "local", "root": "/data"}"#)
            .unwrap();

        let storage_config = load_storage_config(file.path(), &client_settings()).unwrap();
        assert_eq!(storage_config.provider(), "local");
    }

    #[test]
    fn load_from_missing_file() {
        init_dummy_tracing_subscriber();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.json");

        let error = load_storage_config(&path, &client_settings()).unwrap_err();
        assert!(error.contains("source.json"));
        assert!(error.contains("example:"));
    }

    fn client_settings() -> ClientSettings {
        ClientSettings {
            client_config_location: ClientConfigLocation {
                aws_config_file: None,
                aws_shared_credentials_file: None,
            },
            retry_config: RetryConfig {
                aws_max_attempts: 3,
                initial_backoff_milliseconds: 100,
            },
            cli_timeout_config: CLITimeoutConfig::default(),
            disable_stalled_stream_protection: false,
        }
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
