#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid resource name: `{0}`")]
    InvalidResourceName(String),
}
pub type Result<T> = std::result::Result<T, Error>;
