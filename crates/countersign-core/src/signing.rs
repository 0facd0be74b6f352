//! Turn-ordered signature collection over a procurement order.
//!
//! Signers act strictly in ascending sequence position. The signer entitled
//! to act is always re-derived from the chain itself (the lowest unsigned
//! position); the running signature count is only a completion check.
//!
//! Mutations go through a bounded compare-and-swap retry loop, so two
//! near-simultaneous signature attempts resolve to exactly one success --
//! the loser revalidates against the fresh order and surfaces
//! `AlreadySigned` / `NotYourTurn`, or `Conflict` when the retry budget
//! runs out.

use chrono::Utc;
use tracing::{debug, info, warn};

use countersign_types::error::{RepositoryError, SigningError};
use countersign_types::identity::EmployeeId;
use countersign_types::order::{
    ApprovalStatus, OrderId, OrderStatus, ProcurementOrder, SignedOrder,
};

use crate::external::blob::BlobStore;
use crate::external::directory::EmployeeDirectory;
use crate::external::notify::{Notification, Notifier};
use crate::repository::order::OrderRepository;

/// How many times a losing CAS writer re-runs read-validate-mutate before
/// giving up with `Conflict`.
const MAX_CAS_RETRIES: u32 = 3;

/// Blob folder hint for signature images.
const SIGNATURE_FOLDER: &str = "signatures";

/// Drives turn-ordered signature collection and order completion.
///
/// Generic over the repository and collaborator traits so the core never
/// depends on countersign-infra.
pub struct SigningWorkflow<R, B, N, D>
where
    R: OrderRepository,
    B: BlobStore,
    N: Notifier,
    D: EmployeeDirectory,
{
    orders: R,
    blobs: B,
    notifier: N,
    directory: D,
}

impl<R, B, N, D> SigningWorkflow<R, B, N, D>
where
    R: OrderRepository,
    B: BlobStore,
    N: Notifier,
    D: EmployeeDirectory,
{
    pub fn new(orders: R, blobs: B, notifier: N, directory: D) -> Self {
        Self {
            orders,
            blobs,
            notifier,
            directory,
        }
    }

    /// Record one signature on an order.
    ///
    /// Validation runs before the signature image is uploaded, and again on
    /// every CAS retry; a failed upload aborts the operation with nothing
    /// persisted. On the final signature the order completes and the
    /// supplier is notified (best-effort) with the summary document.
    pub async fn request_signature(
        &self,
        order_id: &OrderId,
        signer_id: &EmployeeId,
        signature_image: &[u8],
    ) -> Result<SignedOrder, SigningError> {
        // Cheap pre-check so an out-of-turn caller never pays for an upload.
        let stored = self
            .orders
            .get(order_id)
            .await?
            .ok_or(SigningError::OrderNotFound)?;
        validate_turn(&stored.order, signer_id)?;

        let signature_url = self.blobs.store(signature_image, SIGNATURE_FOLDER).await?;

        match self.sign_with_retries(order_id, signer_id, &signature_url).await {
            Ok((order, completed)) => {
                info!(
                    order_id = %order_id,
                    signer = %signer_id,
                    count = order.signature_count,
                    completed,
                    "signature recorded"
                );
                if completed {
                    self.notify_supplier_completed(&order).await;
                }
                Ok(SignedOrder {
                    order,
                    signature_url,
                })
            }
            Err(err) => {
                // The signature was not persisted; drop the orphaned image.
                if let Err(del_err) = self.blobs.delete(&signature_url).await {
                    warn!(url = %signature_url, error = %del_err, "failed to clean up signature image");
                }
                Err(err)
            }
        }
    }

    /// Read-validate-mutate-save loop. Returns the saved order and whether
    /// this signature completed it.
    async fn sign_with_retries(
        &self,
        order_id: &OrderId,
        signer_id: &EmployeeId,
        signature_url: &str,
    ) -> Result<(ProcurementOrder, bool), SigningError> {
        for attempt in 0..MAX_CAS_RETRIES {
            let stored = self
                .orders
                .get(order_id)
                .await?
                .ok_or(SigningError::OrderNotFound)?;
            let mut order = stored.order;

            // A raced competitor may have signed since we last looked.
            validate_turn(&order, signer_id)?;

            let now = Utc::now();
            let signer = order
                .signer_mut(signer_id)
                .ok_or(SigningError::SignerNotFound)?;
            signer.has_signed = true;
            signer.signed_at = Some(now);
            signer.signature_ref = Some(signature_url.to_string());
            order.signature_count += 1;
            order.updated_at = now;

            let completed = order.fully_signed();
            if completed {
                order.status = OrderStatus::Completed;
                order.approval_status = ApprovalStatus::Approved;
            }

            match self.orders.save(&order, stored.version).await {
                Ok(_) => return Ok((order, completed)),
                Err(RepositoryError::Conflict(_)) => {
                    debug!(order_id = %order_id, attempt, "lost signature save race, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SigningError::Conflict)
    }

    /// Best-effort supplier notification once the chain is exhausted.
    /// Failure here is logged; the recorded signature stands.
    async fn notify_supplier_completed(&self, order: &ProcurementOrder) {
        let contact = match self.directory.supplier_contact(&order.supplier_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!(supplier = %order.supplier_id, "no supplier contact for completion notice");
                return;
            }
            Err(err) => {
                warn!(supplier = %order.supplier_id, error = %err, "supplier lookup failed");
                return;
            }
        };

        let document = order
            .summary_document_ref
            .as_deref()
            .unwrap_or("(summary document unavailable)");
        let notification = Notification {
            recipient: contact.email,
            subject: format!("Purchase order {} fully signed", order.po_number),
            body: format!(
                "All {} signatures for purchase order {} have been collected. \
                 Signed summary document: {document}",
                order.signers.len(),
                order.po_number,
            ),
        };

        if let Err(err) = self.notifier.send(&notification).await {
            warn!(order_id = %order.id, error = %err, "completion notification failed");
        }
    }
}

/// Check that this employee is on the chain, has not signed, and holds the
/// lowest unsigned position.
fn validate_turn(order: &ProcurementOrder, signer_id: &EmployeeId) -> Result<(), SigningError> {
    let signer = order
        .signer(signer_id)
        .ok_or(SigningError::SignerNotFound)?;

    if signer.has_signed {
        return Err(SigningError::AlreadySigned);
    }

    let expected = order
        .next_unsigned_position()
        .ok_or(SigningError::AlreadySigned)?;
    if signer.sequence_position != expected {
        return Err(SigningError::NotYourTurn {
            expected_position: expected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        make_order, MemoryBlobs, MemoryOrders, RecordingNotifier, StaticDirectory,
    };

    fn workflow(
        orders: MemoryOrders,
        blobs: MemoryBlobs,
        notifier: RecordingNotifier,
        directory: StaticDirectory,
    ) -> SigningWorkflow<MemoryOrders, MemoryBlobs, RecordingNotifier, StaticDirectory> {
        SigningWorkflow::new(orders, blobs, notifier, directory)
    }

    #[tokio::test]
    async fn test_signatures_accepted_in_order() {
        let order = make_order(3);
        let signer_ids: Vec<EmployeeId> =
            order.signers.iter().map(|s| s.employee_id).collect();
        let orders = MemoryOrders::with(order.clone());
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        let first = wf
            .request_signature(&order.id, &signer_ids[0], b"sig-0")
            .await
            .unwrap();
        assert_eq!(first.order.signature_count, 1);
        assert_eq!(first.order.status, OrderStatus::Pending);
        assert!(first.order.signers[0].has_signed);
        assert!(first.order.signers[0].signature_ref.is_some());

        let second = wf
            .request_signature(&order.id, &signer_ids[1], b"sig-1")
            .await
            .unwrap();
        assert_eq!(second.order.signature_count, 2);
        assert_eq!(second.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_out_of_order_attempt_rejected_and_order_unchanged() {
        let order = make_order(3);
        let late_signer = order.signers[2].employee_id;
        let orders = MemoryOrders::with(order.clone());
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        let err = wf
            .request_signature(&order.id, &late_signer, b"sig")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SigningError::NotYourTurn {
                expected_position: 0
            }
        ));

        // Nothing changed, no blob kept.
        let stored = wf.orders.get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.order, order);
        assert_eq!(stored.version, 0);
        assert!(wf.blobs.stored_urls().is_empty());
    }

    #[tokio::test]
    async fn test_full_chain_completes_with_one_notification() {
        let order = make_order(3);
        let signer_ids: Vec<EmployeeId> =
            order.signers.iter().map(|s| s.employee_id).collect();
        let orders = MemoryOrders::with(order.clone());
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        wf.request_signature(&order.id, &signer_ids[0], b"a")
            .await
            .unwrap();

        // Signer at position 2 is not next.
        let err = wf
            .request_signature(&order.id, &signer_ids[2], b"c")
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::NotYourTurn { .. }));

        wf.request_signature(&order.id, &signer_ids[1], b"b")
            .await
            .unwrap();
        let last = wf
            .request_signature(&order.id, &signer_ids[2], b"c")
            .await
            .unwrap();

        assert_eq!(last.order.signature_count, 3);
        assert_eq!(last.order.status, OrderStatus::Completed);
        assert_eq!(last.order.approval_status, ApprovalStatus::Approved);

        let sent = wf.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains(&order.po_number));
    }

    #[tokio::test]
    async fn test_signing_again_after_completion_fails() {
        let order = make_order(1);
        let only_signer = order.signers[0].employee_id;
        let orders = MemoryOrders::with(order.clone());
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        wf.request_signature(&order.id, &only_signer, b"s")
            .await
            .unwrap();
        let err = wf
            .request_signature(&order.id, &only_signer, b"s")
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::AlreadySigned));
    }

    #[tokio::test]
    async fn test_unknown_signer_rejected() {
        let order = make_order(2);
        let orders = MemoryOrders::with(order.clone());
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        let err = wf
            .request_signature(&order.id, &EmployeeId::new(), b"s")
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::SignerNotFound));
    }

    #[tokio::test]
    async fn test_missing_order_rejected() {
        let wf = workflow(
            MemoryOrders::new(),
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        let err = wf
            .request_signature(&OrderId::new(), &EmployeeId::new(), b"s")
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::OrderNotFound));
    }

    #[tokio::test]
    async fn test_blob_failure_aborts_with_nothing_persisted() {
        let order = make_order(2);
        let first_signer = order.signers[0].employee_id;
        let orders = MemoryOrders::with(order.clone());
        let blobs = MemoryBlobs::new();
        blobs.fail_next_store();
        let wf = workflow(
            orders,
            blobs,
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        let err = wf
            .request_signature(&order.id, &first_signer, b"s")
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::SignatureUpload(_)));

        let stored = wf.orders.get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.order.signature_count, 0);
        assert!(!stored.order.signers[0].has_signed);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_lose_signature() {
        let order = make_order(1);
        let only_signer = order.signers[0].employee_id;
        let orders = MemoryOrders::with(order.clone());
        let notifier = RecordingNotifier::new();
        notifier.fail_all();
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            notifier,
            StaticDirectory::with_supplier(),
        );

        let signed = wf
            .request_signature(&order.id, &only_signer, b"s")
            .await
            .unwrap();
        assert_eq!(signed.order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_attempts_never_double_increment() {
        let order = make_order(2);
        let first_signer = order.signers[0].employee_id;
        let orders = MemoryOrders::with(order.clone());
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        let (a, b) = tokio::join!(
            wf.request_signature(&order.id, &first_signer, b"one"),
            wf.request_signature(&order.id, &first_signer, b"two"),
        );

        // Exactly one wins; the loser revalidates and fails cleanly.
        assert!(a.is_ok() != b.is_ok());
        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(
            loser,
            SigningError::AlreadySigned | SigningError::NotYourTurn { .. } | SigningError::Conflict
        ));

        let stored = wf.orders.get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.order.signature_count, 1);
    }

    #[tokio::test]
    async fn test_signing_continues_while_update_pending() {
        let mut order = make_order(2);
        order.status = OrderStatus::PendingUpdate;
        let first_signer = order.signers[0].employee_id;
        let orders = MemoryOrders::with(order.clone());
        let wf = workflow(
            orders,
            MemoryBlobs::new(),
            RecordingNotifier::new(),
            StaticDirectory::with_supplier(),
        );

        let signed = wf
            .request_signature(&order.id, &first_signer, b"s")
            .await
            .unwrap();
        assert_eq!(signed.order.signature_count, 1);
        // A pending amendment does not block the chain; status stays
        // PendingUpdate until the proposal is resolved.
        assert_eq!(signed.order.status, OrderStatus::PendingUpdate);
    }
}
