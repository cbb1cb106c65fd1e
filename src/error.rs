use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The element handed to a Jingle conversion is not a `jingle` element.
    #[error("not a jingle element: <{0}>")]
    NotJingle(String),
}
