use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::amount::{to_planck, Planck};
use crate::chain::{
    BountyCall, ExtrinsicSigner, MockSubmitter, RpcSubmitter, SubmissionReceipt, SubmitError,
};
use crate::config::Config;
use crate::ledger::{
    LedgerChange, Metadata, StatusUpdate, TransactionKind, TransactionLedger, TransactionStatus,
};
use crate::rpc::RpcClient;
use crate::submission::{BountyProposal, BountyService, NoticeLevel};

const DOT_DECIMALS: u8 = 10;

fn setup() -> (Arc<MockSubmitter>, Arc<TransactionLedger>, BountyService<MockSubmitter>) {
    let mock = Arc::new(MockSubmitter::new());
    let ledger = Arc::new(TransactionLedger::new());
    let service =
        BountyService::with_token(Arc::clone(&mock), Arc::clone(&ledger), DOT_DECIMALS, "DOT");
    (mock, ledger, service)
}

#[test]
fn test_manual_flow_converter_then_ledger() {
    let ledger = TransactionLedger::new();

    let value = to_planck("12.5", DOT_DECIMALS).unwrap();
    assert_eq!(value, Planck(125_000_000_000));

    let id = ledger.add(
        TransactionKind::CreateBounty,
        Metadata::from([("value".to_string(), "12.5".to_string())]),
    );
    assert_eq!(id.to_string(), "tx_1");
    assert_eq!(ledger.list_pending().len(), 1);
    assert_eq!(ledger.list_pending()[0].status, TransactionStatus::Pending);

    ledger.update(id, StatusUpdate::success("0xdead"));

    let record = ledger.get(id).unwrap();
    assert_eq!(record.id.to_string(), "tx_1");
    assert_eq!(record.status, TransactionStatus::Success);
    assert_eq!(record.result_hash.as_deref(), Some("0xdead"));
    assert!(ledger.list_pending().is_empty());
}

#[tokio::test]
async fn test_propose_flow_goes_pending_then_success() {
    let (mock, ledger, service) = setup();
    mock.push_response(Ok(SubmissionReceipt {
        tx_hash: "0xdead".to_string(),
        block_hash: None,
    }));

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    ledger.subscribe(move |change| sink.lock().push(change.clone()));

    let submitted = service
        .propose_bounty(
            &(),
            &BountyProposal {
                title: "Docs".to_string(),
                description: "Write the bounty guide".to_string(),
                value: "12.5".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(submitted.tx_id.to_string(), "tx_1");
    assert!(matches!(
        &mock.calls()[0],
        BountyCall::ProposeBounty { value, .. } if *value == Planck(125_000_000_000)
    ));

    let changes = changes.lock();
    assert_eq!(changes.len(), 2);
    match &changes[0] {
        LedgerChange::Added(record) => {
            assert_eq!(record.id, submitted.tx_id);
            assert_eq!(record.status, TransactionStatus::Pending);
        }
        other => panic!("expected Added, got {other:?}"),
    }

    let record = ledger.get(submitted.tx_id).unwrap();
    assert_eq!(record.status, TransactionStatus::Success);
    assert_eq!(record.result_hash.as_deref(), Some("0xdead"));
    assert!(record.failure_reason.is_none());
}

#[tokio::test]
async fn test_retry_after_failure_is_a_new_record() {
    let (mock, ledger, service) = setup();
    mock.push_response(Err(SubmitError::Network("connection reset".to_string())));
    mock.push_response(Ok(SubmissionReceipt {
        tx_hash: "0xbeef".to_string(),
        block_hash: None,
    }));

    let first = service.claim_bounty(&(), 5).await.unwrap();
    let second = service.claim_bounty(&(), 5).await.unwrap();

    assert_ne!(first.tx_id, second.tx_id);
    assert_eq!(ledger.get(first.tx_id).unwrap().status, TransactionStatus::Error);
    assert_eq!(ledger.get(second.tx_id).unwrap().status, TransactionStatus::Success);

    let ids: Vec<_> = ledger.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.tx_id, first.tx_id]);

    ledger.clear();
    assert!(ledger.list_pending().is_empty());
    assert!(ledger.records().is_empty());
}

struct DecliningWallet;

#[async_trait]
impl ExtrinsicSigner for DecliningWallet {
    fn address(&self) -> &str {
        "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty"
    }

    async fn sign(&self, _call: &BountyCall) -> Result<String, SubmitError> {
        Err(SubmitError::Signing("Rejected by user".to_string()))
    }
}

#[tokio::test]
async fn test_declined_signature_settles_rpc_submission_as_error() {
    let config = Config::from_lookup(|key| {
        (key == "RPC_URL").then(|| "http://127.0.0.1:9".to_string())
    })
    .unwrap();
    let rpc = Arc::new(RpcClient::new(reqwest::Client::new(), &config));
    let ledger = Arc::new(TransactionLedger::new());
    let service = BountyService::new(
        Arc::new(RpcSubmitter::new(rpc)),
        Arc::clone(&ledger),
        &config,
    );

    let signer: &dyn ExtrinsicSigner = &DecliningWallet;
    let submitted = service
        .propose_bounty(
            signer,
            &BountyProposal {
                title: "Docs".to_string(),
                description: "Write the bounty guide".to_string(),
                value: "1".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(submitted.status, TransactionStatus::Error);
    assert_eq!(submitted.notice.level, NoticeLevel::Error);
    // A network attempt against the closed port would have reported a network error.
    assert_eq!(submitted.notice.description, "Rejected by user");

    let record = ledger.get(submitted.tx_id).unwrap();
    assert_eq!(record.status, TransactionStatus::Error);
    assert_eq!(record.failure_reason.as_deref(), Some("Rejected by user"));
    assert_eq!(
        record.metadata["signer"],
        "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty"
    );
    assert!(ledger.list_pending().is_empty());
}
