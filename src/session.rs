use aws_sdk_s3::config::{Builder, Credentials, Region};
use std::env;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no region configured, set AWS_REGION or pass one explicitly")]
    MissingRegion,
    #[error("AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together")]
    PartialCredentials,
    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl StaticCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    fn to_provider(&self) -> Credentials {
        Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            self.session_token.clone(),
            None,
            "s3put-static",
        )
    }
}

/// Everything needed to build an S3 client.
///
/// Fields left as `None` are filled in from the `aws-config` default provider
/// chain when the session is loaded, unless credentials are given explicitly,
/// in which case nothing is read from the environment at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub credentials: Option<StaticCredentials>,
    /// Address buckets as `/bucket/key` instead of `bucket.host/key`.
    pub force_path_style: bool,
}

impl Session {
    pub const REGION_VAR: &'static str = "AWS_REGION";
    pub const ENDPOINT_URL_VAR: &'static str = "AWS_ENDPOINT_URL";
    pub const ACCESS_KEY_ID_VAR: &'static str = "AWS_ACCESS_KEY_ID";
    pub const SECRET_ACCESS_KEY_VAR: &'static str = "AWS_SECRET_ACCESS_KEY";
    pub const SESSION_TOKEN_VAR: &'static str = "AWS_SESSION_TOKEN";
    pub const FORCE_PATH_STYLE_VAR: &'static str = "AWS_S3_FORCE_PATH_STYLE";

    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let credentials = match (
            var(Self::ACCESS_KEY_ID_VAR),
            var(Self::SECRET_ACCESS_KEY_VAR),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
                session_token: var(Self::SESSION_TOKEN_VAR),
            }),
            (None, None) => None,
            _ => return Err(SessionError::PartialCredentials),
        };

        let force_path_style = match var(Self::FORCE_PATH_STYLE_VAR) {
            Some(value) => parse_bool(Self::FORCE_PATH_STYLE_VAR, &value)?,
            None => false,
        };

        Ok(Self {
            region: var(Self::REGION_VAR),
            endpoint_url: var(Self::ENDPOINT_URL_VAR),
            credentials,
            force_path_style,
        })
    }

    pub async fn load(&self) -> Result<aws_sdk_s3::Config, SessionError> {
        let mut builder = match &self.credentials {
            Some(credentials) => {
                let region = self.region.clone().ok_or(SessionError::MissingRegion)?;
                aws_sdk_s3::Config::builder()
                    .credentials_provider(credentials.to_provider())
                    .region(Region::new(region))
            }
            None => {
                let mut loader = aws_config::from_env();
                if let Some(region) = &self.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                let sdk_config = loader.load().await;
                if sdk_config.region().is_none() {
                    return Err(SessionError::MissingRegion);
                }
                Builder::from(&sdk_config)
            }
        };

        if let Some(endpoint_url) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        if self.force_path_style {
            builder = builder.force_path_style(true);
        }
        tracing::debug!(
            "loaded session (region: {:?}, endpoint: {:?}, path style: {})",
            self.region,
            self.endpoint_url,
            self.force_path_style
        );
        Ok(builder.build())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, SessionError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(SessionError::InvalidVar {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
