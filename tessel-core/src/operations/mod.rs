pub mod apply_change;
pub mod delete_config;
pub mod list_config;
pub mod read_config;
pub mod update_config;

pub use apply_change::{ApplyChangeOperation, ApplyChangeOperationOutcome};
pub use delete_config::{
    DeleteConfigOperation, DeleteConfigOperationRequest, DeleteConfigOperationResult,
};
pub use list_config::{ListConfigOperation, ListConfigOperationRequest};
pub use read_config::{
    ReadConfigOperation, ReadConfigOperationOutcome, ReadConfigOperationRequest,
};
pub use update_config::{
    UpdateConfigOperation, UpdateConfigOperationRequest, UpdateConfigOperationResult,
};

use crate::{Result, TesselError};
use std::future::Future;
use std::time::Duration;

/// Bound a backing store call. Expiry is reported as `Timeout`, a transient
/// failure whose outcome is unknown.
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    action: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(TesselError::Timeout(format!(
            "{} did not complete within {:?}",
            action, deadline
        ))),
    }
}
