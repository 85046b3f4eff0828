use thiserror::Error;

use crate::model::{DocumentError, ParseIdError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
