use marketstall_core::{OrderId, PaymentOutcome};
use serde::Serialize;
use url::form_urlencoded;

use super::PaymentMarkers;
use crate::storage::{KeyValueStore, StorageError};

/// Query indicator set by the provider after a successful payment.
pub const SUCCESS_PARAM: &str = "success";

/// Query indicator set by the provider after an abandoned payment.
pub const CANCELED_PARAM: &str = "canceled";

/// A payment outcome to show the shopper once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotice {
    pub order_id: OrderId,
    pub outcome: PaymentOutcome,
}

impl PaymentNotice {
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self.outcome {
            PaymentOutcome::Succeeded => "Payment received. Thank you for your order!",
            PaymentOutcome::Canceled => "Payment was canceled. Your order is awaiting payment.",
        }
    }
}

/// The effect of a reconcile call that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub notice: PaymentNotice,
    /// The query with both indicators removed; other parameters keep
    /// their order.
    pub query: Vec<(String, String)>,
}

impl Reconciliation {
    /// `path` with the normalized query appended.
    #[must_use]
    pub fn normalized_url(&self, path: &str) -> String {
        if self.query.is_empty() {
            return path.to_owned();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("{path}?{query}")
    }
}

/// Surfaces a payment redirect outcome at most once per order per session.
///
/// Safe to call on every render: the marker is the only state consulted.
#[derive(Debug, Clone)]
pub struct PaymentCallbackReconciler<S> {
    markers: PaymentMarkers<S>,
}

impl<S: KeyValueStore> PaymentCallbackReconciler<S> {
    pub const fn new(store: S) -> Self {
        Self {
            markers: PaymentMarkers::new(store),
        }
    }

    #[must_use]
    pub const fn markers(&self) -> &PaymentMarkers<S> {
        &self.markers
    }

    /// Reconcile the current query of the order page for `order_id`.
    ///
    /// Returns `None` when exactly one indicator is not present, or when the
    /// outcome for this order was already surfaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker store fails. Nothing is surfaced in
    /// that case.
    #[tracing::instrument(skip(self, query), fields(order_id = %order_id))]
    pub async fn reconcile(
        &self,
        order_id: OrderId,
        query: &[(String, String)],
    ) -> Result<Option<Reconciliation>, StorageError> {
        let outcome = match (
            indicator_set(query, SUCCESS_PARAM),
            indicator_set(query, CANCELED_PARAM),
        ) {
            (true, false) => PaymentOutcome::Succeeded,
            (false, true) => PaymentOutcome::Canceled,
            (true, true) => {
                tracing::debug!("Both payment indicators present, ignoring");
                return Ok(None);
            }
            (false, false) => return Ok(None),
        };

        if !self.markers.insert(order_id).await? {
            tracing::debug!("Payment outcome already surfaced");
            return Ok(None);
        }

        tracing::info!(?outcome, "Surfacing payment outcome");

        Ok(Some(Reconciliation {
            notice: PaymentNotice { order_id, outcome },
            query: strip_indicators(query),
        }))
    }
}

/// Decode a raw query string into ordered pairs.
#[must_use]
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|raw| form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Drop both payment indicators, keeping every other parameter.
#[must_use]
pub fn strip_indicators(query: &[(String, String)]) -> Vec<(String, String)> {
    query
        .iter()
        .filter(|(key, _)| key != SUCCESS_PARAM && key != CANCELED_PARAM)
        .cloned()
        .collect()
}

/// Boolean-like indicator: present with an empty or truthy value.
fn indicator_set(query: &[(String, String)], name: &str) -> bool {
    query.iter().any(|(key, value)| {
        key == name
            && matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "" | "true" | "1" | "yes"
            )
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn reconciler() -> PaymentCallbackReconciler<MemoryStore> {
        PaymentCallbackReconciler::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_success_surfaces_exactly_once() {
        let reconciler = reconciler();
        let query = parse_query(Some("success=true"));
        let order = OrderId::new(42);

        let first = reconciler.reconcile(order, &query).await.unwrap().unwrap();
        assert_eq!(first.notice.outcome, PaymentOutcome::Succeeded);
        assert_eq!(first.notice.order_id, order);
        assert_eq!(first.normalized_url("/en/orders/42"), "/en/orders/42");
        assert!(reconciler.markers().contains(order).await.unwrap());

        assert_eq!(reconciler.reconcile(order, &query).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_surfaces_failure() {
        let reconciler = reconciler();
        let query = parse_query(Some("canceled=1&tab=items"));

        let fired = reconciler
            .reconcile(OrderId::new(5), &query)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.notice.outcome, PaymentOutcome::Canceled);
        assert_eq!(fired.normalized_url("/ar/orders/5"), "/ar/orders/5?tab=items");
    }

    #[tokio::test]
    async fn test_both_or_neither_indicator_is_a_no_op() {
        let reconciler = reconciler();
        let order = OrderId::new(42);

        for raw in [None, Some("tab=items"), Some("success&canceled"), Some("success=no")] {
            let query = parse_query(raw);
            assert_eq!(reconciler.reconcile(order, &query).await.unwrap(), None);
        }
        assert!(!reconciler.markers().contains(order).await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_is_scoped_to_order() {
        let reconciler = reconciler();
        let query = parse_query(Some("success="));

        assert!(
            reconciler
                .reconcile(OrderId::new(1), &query)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            reconciler
                .reconcile(OrderId::new(2), &query)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_existing_marker_suppresses_cancel_after_success() {
        let reconciler = reconciler();
        let order = OrderId::new(9);
        reconciler
            .reconcile(order, &parse_query(Some("success=true")))
            .await
            .unwrap();

        assert_eq!(
            reconciler
                .reconcile(order, &parse_query(Some("canceled=true")))
                .await
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_strip_indicators_preserves_order() {
        let query = parse_query(Some("a=1&success=true&b=2&canceled&c=3"));
        let stripped = strip_indicators(&query);
        let keys: Vec<_> = stripped.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }
}
