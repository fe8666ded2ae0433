use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("filer request to {} failed", url))]
    Http {
        url: String,
        #[snafu(implicit)]
        location: Location,
        source: reqwest::Error,
    },

    #[snafu(display("filer at {} answered {}", url, status))]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("filer unavailable"))]
    Unavailable {
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
