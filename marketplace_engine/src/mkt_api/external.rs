use std::{future::Future, time::Duration};

use log::warn;

use crate::traits::MarketplaceError;

/// Runs a call to an external service with a deadline.
///
/// If the deadline passes, the call is abandoned and [`MarketplaceError::Timeout`] is returned. Callers must not have
/// changed any local state before making the call.
pub(crate) async fn call_with_timeout<T, E, F>(
    name: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, MarketplaceError>
where
    F: Future<Output = Result<T, E>>,
    MarketplaceError: From<E>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            warn!("⏱️ {name} did not respond within {limit:?}");
            Err(MarketplaceError::Timeout(name, limit))
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traits::CarrierError;

    #[tokio::test]
    async fn slow_calls_time_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, CarrierError>(1)
        };
        let err = call_with_timeout("carrier.track_shipment", Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, MarketplaceError::Timeout("carrier.track_shipment", _)));

        let fast = async { Ok::<_, CarrierError>(7) };
        assert_eq!(call_with_timeout("carrier.track_shipment", Duration::from_secs(1), fast).await.unwrap(), 7);

        let failed = async { Err::<i32, _>(CarrierError::Unavailable("503".into())) };
        let err = call_with_timeout("carrier.track_shipment", Duration::from_secs(1), failed).await.unwrap_err();
        assert!(matches!(err, MarketplaceError::CarrierError(CarrierError::Unavailable(_))));
    }
}
