use snafu::Snafu;
use url::Url;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to parse Gate endpoint {endpoint:?}"))]
    ParseEndpoint {
        source: url::ParseError,
        endpoint: String,
    },

    #[snafu(display("Gate endpoint {endpoint} cannot be used as a base URL"))]
    InvalidEndpoint { endpoint: Url },

    #[snafu(display("bad default-header value, use key=value form: {element}"))]
    MalformedDefaultHeader { element: String },

    #[snafu(display("invalid default header name {name:?}"))]
    InvalidHeaderName {
        source: http::header::InvalidHeaderName,
        name: String,
    },

    #[snafu(display("invalid value for default header {name:?}"))]
    InvalidHeaderValue {
        source: http::header::InvalidHeaderValue,
        name: String,
    },

    #[snafu(display("incorrect x509 auth configuration, must specify a cert/key pair"))]
    IncompleteX509Config,

    #[snafu(display("failed to load the x509 client identity"))]
    LoadIdentity { source: reqwest::Error },

    #[snafu(display("could not initialize the HTTP client"))]
    BuildHttpClient { source: reqwest::Error },

    #[snafu(display("could not reach Gate at {endpoint}, please ensure it is running"))]
    Unreachable {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
        endpoint: Url,
    },

    #[snafu(display("failed to send {operation} request to Gate"))]
    SendRequest {
        source: reqwest::Error,
        operation: &'static str,
    },

    #[snafu(display("failed to read {operation} response from Gate"))]
    ReadResponse {
        source: reqwest::Error,
        operation: &'static str,
    },

    #[snafu(display("failed to decode {operation} response from Gate"))]
    DecodeResponse {
        source: serde_json::Error,
        operation: &'static str,
    },

    #[snafu(display("{kind} {name:?} not found"))]
    NotFound { kind: &'static str, name: String },

    #[snafu(display("encountered an error during {operation}, status code: {status}"))]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[snafu(display("{operation} response does not reference a task"))]
    MissingTaskRef { operation: &'static str },

    #[snafu(display("{operation} task {id} finished with status {status}, task output was: {task}"))]
    TaskFailed {
        operation: &'static str,
        id: String,
        status: String,
        task: serde_json::Value,
    },

    #[snafu(display("{operation} task {id} did not complete after {attempts} attempts"))]
    TaskIncomplete {
        operation: &'static str,
        id: String,
        attempts: u32,
    },
}

impl Error {
    /// Whether Gate reported that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
