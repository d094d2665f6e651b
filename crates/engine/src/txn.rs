//! Compensating transactions over the request store.
//!
//! The store exposes plain primitives; atomicity comes from recording every
//! forward operation together with its inverse (create → delete,
//! update → restore, append → remove) and, on any mid-commit failure,
//! executing the recorded inverses in reverse order. A committed
//! transaction is fully applied; a failed one leaves the request as it was
//! — never partially updated.
//!
//! One caveat is inherent to OCC: a restore is itself a version-validated
//! update, so the version counter keeps rising through a rollback while
//! the record content returns to its pre-transaction value.

use std::fmt;

use dispatch_storage::{RequestRecord, RequestStore, StorageError, TransitionRecord};

// ──────────────────────────────────────────────
// Operations
// ──────────────────────────────────────────────

/// A forward operation recorded in a transaction.
#[derive(Debug, Clone)]
enum TxnOp {
    Create {
        record: RequestRecord,
    },
    /// `before` is the loaded record (its `version` is the OCC expectation);
    /// `after` is the full replacement.
    Update {
        before: RequestRecord,
        after: RequestRecord,
    },
    Append {
        record: TransitionRecord,
    },
}

/// Inverse of an already-applied forward operation.
#[derive(Debug)]
enum UndoOp {
    Delete {
        request_id: String,
    },
    Restore {
        record: RequestRecord,
        current_version: i64,
    },
    Remove {
        request_id: String,
        seq: u64,
    },
}

/// What a committed transaction produced.
#[derive(Debug, Default)]
pub struct TxnReceipt {
    /// New OCC version, if the transaction contained an update.
    pub new_version: Option<i64>,
    /// Sequence numbers of appended transitions, in order.
    pub transition_seqs: Vec<u64>,
}

/// A failed commit.
#[derive(Debug)]
pub struct TxnFailure {
    /// The error that stopped the commit.
    pub error: StorageError,
    /// Whether every applied operation was successfully reverted.
    pub rolled_back: bool,
    /// Errors hit while reverting, in rollback order.
    pub rollback_errors: Vec<StorageError>,
}

impl fmt::Display for TxnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rolled_back {
            write!(f, "{} (rolled back)", self.error)
        } else {
            write!(
                f,
                "{} (rollback incomplete: {} inverse operations failed)",
                self.error,
                self.rollback_errors.len()
            )
        }
    }
}

impl std::error::Error for TxnFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// ──────────────────────────────────────────────
// Transaction
// ──────────────────────────────────────────────

/// An ordered list of forward operations committed as a unit.
#[derive(Debug, Default)]
pub struct StateTransaction {
    ops: Vec<TxnOp>,
}

impl StateTransaction {
    pub fn new() -> Self {
        StateTransaction::default()
    }

    /// Record a request creation. Inverse: delete.
    pub fn create(&mut self, record: RequestRecord) -> &mut Self {
        self.ops.push(TxnOp::Create { record });
        self
    }

    /// Record a request update. Inverse: restore `before`.
    pub fn update(&mut self, before: RequestRecord, after: RequestRecord) -> &mut Self {
        self.ops.push(TxnOp::Update { before, after });
        self
    }

    /// Record a transition append. Inverse: remove by seq.
    pub fn append(&mut self, record: TransitionRecord) -> &mut Self {
        self.ops.push(TxnOp::Append { record });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all recorded operations in order. On the first failure, apply
    /// the inverses of everything already applied, in reverse order, and
    /// report the failure.
    pub async fn commit<S: RequestStore>(self, store: &S) -> Result<TxnReceipt, TxnFailure> {
        let mut undo: Vec<UndoOp> = Vec::with_capacity(self.ops.len());
        let mut receipt = TxnReceipt::default();

        for op in self.ops {
            let result = match op {
                TxnOp::Create { record } => {
                    let request_id = record.id.clone();
                    match store.create_request(record).await {
                        Ok(()) => {
                            undo.push(UndoOp::Delete { request_id });
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                TxnOp::Update { before, after } => {
                    let expected = before.version;
                    match store.update_request(after, expected).await {
                        Ok(new_version) => {
                            receipt.new_version = Some(new_version);
                            undo.push(UndoOp::Restore {
                                record: before,
                                current_version: new_version,
                            });
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                TxnOp::Append { record } => {
                    let request_id = record.request_id.clone();
                    match store.insert_transition(record).await {
                        Ok(seq) => {
                            receipt.transition_seqs.push(seq);
                            undo.push(UndoOp::Remove { request_id, seq });
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            if let Err(error) = result {
                let mut rollback_errors = Vec::new();
                for inverse in undo.into_iter().rev() {
                    let outcome = match inverse {
                        UndoOp::Delete { request_id } => store.delete_request(&request_id).await,
                        UndoOp::Restore {
                            record,
                            current_version,
                        } => store
                            .update_request(record, current_version)
                            .await
                            .map(|_| ()),
                        UndoOp::Remove { request_id, seq } => {
                            store.remove_transition(&request_id, seq).await
                        }
                    };
                    if let Err(e) = outcome {
                        rollback_errors.push(e);
                    }
                }
                return Err(TxnFailure {
                    error,
                    rolled_back: rollback_errors.is_empty(),
                    rollback_errors,
                });
            }
        }

        Ok(receipt)
    }
}
