use super::csv::request_reader::{RequestKind, RequestRecord};
use crate::application::controller::SwapController;
use crate::domain::swap::Settlement;
use crate::error::Result;

/// Applies one scripted request to the controller.
///
/// Returns the settlement for `swap` rows and `None` for custody operations.
pub async fn apply(controller: &SwapController, record: &RequestRecord) -> Result<Option<Settlement>> {
    match record.op {
        RequestKind::Deposit => {
            controller
                .deposit(&record.caller, &record.from_token, record.amount)
                .await?;
            Ok(None)
        }
        RequestKind::Withdraw => {
            controller
                .withdraw(&record.caller, &record.from_token, record.amount)
                .await?;
            Ok(None)
        }
        RequestKind::Swap => {
            let swap = record.to_token_swap()?;
            let settlement = controller.perform_token_swap(&record.caller, swap).await?;
            Ok(Some(settlement))
        }
    }
}
