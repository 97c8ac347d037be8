use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Digest used to sign media host requests. SHA-256 is only accepted by
/// accounts configured for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(SignatureAlgorithm::Sha256),
            other => Err(format!("Unknown signature algorithm '{}'", other)),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureAlgorithm::Sha1 => write!(f, "sha1"),
            SignatureAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaStoreConfig {
    pub api_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub signature_algorithm: SignatureAlgorithm,
}

#[derive(Debug, Clone)]
pub struct MetadataStoreConfig {
    pub api_url: String,
    pub api_key: String,
    pub base_id: String,
    pub table_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub max_upload_mb: u64,
    pub http_timeout_secs: u64,
    pub media: MediaStoreConfig,
    pub metadata: MetadataStoreConfig,
}

impl Config {
    /// Reads the process environment once at startup. The resulting value is
    /// handed to the store clients; nothing else reads the environment.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("Missing required environment variable {}", key))
        };
        let optional =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            port: optional("GALLERY_PORT", "18480").parse()?,
            host: optional("GALLERY_HOST", "0.0.0.0"),
            max_upload_mb: optional("GALLERY_MAX_UPLOAD_MB", "20").parse()?,
            http_timeout_secs: optional("GALLERY_HTTP_TIMEOUT_SECS", "30").parse()?,
            media: MediaStoreConfig {
                api_url: optional("CLOUDINARY_API_URL", "https://api.cloudinary.com/v1_1"),
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
                signature_algorithm: optional("CLOUDINARY_SIGNATURE_ALGORITHM", "sha1").parse()?,
            },
            metadata: MetadataStoreConfig {
                api_url: optional("AIRTABLE_API_URL", "https://api.airtable.com/v0"),
                api_key: required("AIRTABLE_API_KEY")?,
                base_id: required("AIRTABLE_BASE_ID")?,
                table_name: optional("AIRTABLE_TABLE_NAME", "gallery"),
            },
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
