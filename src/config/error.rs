use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read client secret file '{0}': {1}")]
    CredentialsFileUnreadable(String, String),

    #[error("Unable to parse client secret file '{0}': {1}")]
    MalformedCredentials(String, String),

    #[error("Client secret file '{0}' has neither an 'installed' nor a 'web' section.")]
    MissingClientSection(String),

    #[error("Unable to expand '{0}': the home directory is unknown.")]
    HomeDirUnavailable(String),

    #[error("Invalid value '{1}' for {0}; {2}.")]
    InvalidValue(String, String, String),
}
