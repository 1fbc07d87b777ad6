use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Could not build alert message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("No alert recipients configured")]
    NoRecipients,

    #[error("Error log append failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error log task failed: {0}")]
    LogTask(#[from] tokio::task::JoinError),
}
