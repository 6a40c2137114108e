use thiserror::Error;

/// Failure taxonomy shared by every layer. Kinds are assigned once at the
/// failure site and propagate unchanged up to the request façade, which maps
/// them to wire status codes.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported runtime environment: {0}")]
    UnsupportedRuntimeEnvironment(String),

    #[error("{0}: {1}")]
    Api(String, #[source] Box<kube::Error>),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Unknown(String),
}

impl Error {
    pub fn api(context: impl Into<String>, source: kube::Error) -> Self {
        Error::Api(context.into(), Box::new(source))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
