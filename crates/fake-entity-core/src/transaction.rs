//! Rollback handling around factory operations.

use std::future::Future;

use crate::error::FactoryResult;
use crate::repository::Transaction;

/// Runs `work` and rolls `txn` back if it fails.
///
/// The rollback is skipped when the transaction is already finished, so a
/// failure that bubbles up through nested factories rolls back exactly once.
/// A failed rollback is logged and the original error is returned.
pub(crate) async fn with_transaction<T, F>(
	txn: Option<&dyn Transaction>,
	entity: &str,
	work: F,
) -> FactoryResult<T>
where
	F: Future<Output = FactoryResult<T>>,
{
	let error = match work.await {
		Ok(value) => return Ok(value),
		Err(error) => error,
	};

	if let Some(txn) = txn {
		if txn.is_finished() {
			tracing::debug!(entity, status = ?txn.status(), "Transaction already finished, skipping rollback");
		} else {
			match txn.rollback().await {
				Ok(()) => tracing::debug!(entity, %error, "Rolled back transaction after failure"),
				Err(rollback_error) => tracing::warn!(
					entity,
					%error,
					%rollback_error,
					"Failed to roll back transaction"
				),
			}
		}
	}

	Err(error)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::FactoryError;
	use crate::repository::{PersistenceError, PersistenceResult, TransactionStatus};
	use async_trait::async_trait;
	use parking_lot::Mutex;
	use rstest::rstest;
	use std::any::Any;

	struct RecordingTransaction {
		status: Mutex<TransactionStatus>,
		rollbacks: Mutex<usize>,
		fail_rollback: bool,
	}

	impl RecordingTransaction {
		fn new(fail_rollback: bool) -> Self {
			Self {
				status: Mutex::new(TransactionStatus::Active),
				rollbacks: Mutex::new(0),
				fail_rollback,
			}
		}
	}

	#[async_trait]
	impl Transaction for RecordingTransaction {
		fn status(&self) -> TransactionStatus {
			*self.status.lock()
		}

		async fn rollback(&self) -> PersistenceResult<()> {
			*self.rollbacks.lock() += 1;
			if self.fail_rollback {
				return Err(PersistenceError::backend("rollback failed"));
			}
			*self.status.lock() = TransactionStatus::RolledBack;
			Ok(())
		}

		fn as_any(&self) -> &dyn Any {
			self
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_success_does_not_roll_back() {
		let txn = RecordingTransaction::new(false);
		let value = with_transaction(Some(&txn), "User", async { Ok(3) })
			.await
			.unwrap();
		assert_eq!(value, 3);
		assert_eq!(*txn.rollbacks.lock(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_nested_failures_roll_back_once() {
		let txn = RecordingTransaction::new(false);
		let result: FactoryResult<()> = with_transaction(Some(&txn), "User", async {
			with_transaction(Some(&txn), "Post", async {
				Err(FactoryError::Configuration("boom".to_string()))
			})
			.await
		})
		.await;
		assert!(matches!(result, Err(FactoryError::Configuration(_))));
		assert_eq!(*txn.rollbacks.lock(), 1);
		assert_eq!(txn.status(), TransactionStatus::RolledBack);
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_rollback_keeps_original_error() {
		let txn = RecordingTransaction::new(true);
		let result: FactoryResult<()> = with_transaction(Some(&txn), "User", async {
			Err(FactoryError::Configuration("original".to_string()))
		})
		.await;
		match result {
			Err(FactoryError::Configuration(message)) => assert_eq!(message, "original"),
			other => panic!("unexpected result: {other:?}"),
		}
	}
}
