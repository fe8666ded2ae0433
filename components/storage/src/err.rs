use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("blob request to {} failed", url))]
    Http {
        url: String,
        #[snafu(implicit)]
        location: Location,
        source: reqwest::Error,
    },

    #[snafu(display("blob server at {} answered {}", url, status))]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("read {} returned {} bytes, want {}", file_id, got, want))]
    TruncatedRead {
        file_id: String,
        want: u64,
        got: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to lookup volume locations"))]
    Lookup {
        #[snafu(implicit)]
        location: Location,
        source: reef_filer::err::Error,
    },

    #[snafu(display("failed to locate {}", file_id))]
    FailedToLocate {
        file_id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("blob assignment rejected: {}", reason))]
    AssignFailed {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("no blob {}", file_id))]
    BlobNotFound {
        file_id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("blob store unavailable"))]
    Unavailable {
        #[snafu(implicit)]
        location: Location,
    },

    JoinErr {
        #[snafu(implicit)]
        location: Location,
        source: tokio::task::JoinError,
    },

    #[snafu(display("operation cancelled"))]
    Cancelled {
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
