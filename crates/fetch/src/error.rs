#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("host not allowed: {host}")]
    HostNotAllowed { host: String },

    #[error("git clone failed: {stderr}")]
    GitClone { stderr: String },

    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("archive fallback only supports GitHub URLs, got: {url}")]
    NotGithub { url: String },

    #[error("archive download failed: HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("archive contains unsafe path component: {path}")]
    UnsafeArchivePath { path: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
