use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{DomainEvent, ReturnCondition, UserId};
use crate::ports::{ActivityEntry, ActivityLog};

/// イベントを活動ログの文言に変換する（純粋関数）
pub(super) fn describe(event: &DomainEvent) -> String {
    match event {
        DomainEvent::LoanRequested(e) => format!(
            "Mengajukan peminjaman ID {} ({} alat, {} s/d {})",
            e.loan_id.value(),
            e.line_count,
            e.start_date,
            e.planned_return_date
        ),
        DomainEvent::LoanApproved(e) => {
            format!("Menyetujui peminjaman ID {}", e.loan_id.value())
        }
        DomainEvent::LoanRejected(e) => format!(
            "Menolak peminjaman ID {}: {}",
            e.loan_id.value(),
            e.reason
        ),
        DomainEvent::ReturnRequested(e) => format!(
            "Mengajukan pengembalian peminjaman ID {}",
            e.loan_id.value()
        ),
        DomainEvent::ReturnConfirmed(e) => {
            let condition = match e.final_condition {
                ReturnCondition::Good => "baik",
                ReturnCondition::Damaged => "rusak",
            };
            format!(
                "Mengonfirmasi pengembalian peminjaman ID {} (kondisi {}, terlambat {} hari, denda {})",
                e.loan_id.value(),
                condition,
                e.late_days,
                e.total_late_fee
            )
        }
        DomainEvent::LoanDeleted(e) => {
            format!("Menghapus peminjaman ID {}", e.loan_id.value())
        }
    }
}

/// 活動ログに記録する
///
/// 遷移はすでにコミット済みのため、失敗はwarnログのみで呼び出し元には返さない。
pub(super) async fn record(
    activity_log: &Arc<dyn ActivityLog>,
    user_id: Option<UserId>,
    actor: &str,
    activity: String,
    recorded_at: DateTime<Utc>,
) {
    let entry = ActivityEntry {
        user_id,
        actor: actor.to_string(),
        activity,
        recorded_at,
    };

    if let Err(e) = activity_log.record(entry).await {
        tracing::warn!(error = %e, actor, "Failed to record activity");
    }
}

/// ドメインイベントを活動ログに記録する
///
/// 記録時刻はイベントの発生時刻。
pub(super) async fn record_event(
    activity_log: &Arc<dyn ActivityLog>,
    user_id: Option<UserId>,
    actor: &str,
    event: &DomainEvent,
) {
    tracing::debug!(loan_id = %event.loan_id().value(), actor, "Recording activity");
    record(
        activity_log,
        user_id,
        actor,
        describe(event),
        event.occurred_at(),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LoanDeleted, LoanId, LoanRejected, LoanStatus, ReturnConfirmed};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_describe_rejection_includes_reason() {
        let loan_id = LoanId::new();
        let text = describe(&DomainEvent::LoanRejected(LoanRejected {
            loan_id,
            rejected_by: None,
            reason: "Stok habis".to_string(),
            rejected_at: Utc::now(),
        }));
        assert_eq!(
            text,
            format!("Menolak peminjaman ID {}: Stok habis", loan_id.value())
        );
    }

    #[test]
    fn test_describe_return_includes_late_days_and_fee() {
        let text = describe(&DomainEvent::ReturnConfirmed(ReturnConfirmed {
            loan_id: LoanId::new(),
            received_by: UserId::new(),
            final_condition: ReturnCondition::Damaged,
            status: LoanStatus::ReturnedDamaged,
            returned_on: NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            late_days: 3,
            total_late_fee: Decimal::from(600),
            confirmed_at: Utc::now(),
        }));
        assert!(text.contains("kondisi rusak"));
        assert!(text.contains("terlambat 3 hari"));
        assert!(text.contains("denda 600"));
    }

    #[tokio::test]
    async fn test_record_event_uses_event_time() {
        use crate::adapters::mock::ActivityLog as MockActivityLog;

        let mock = Arc::new(MockActivityLog::new());
        let activity_log: Arc<dyn ActivityLog> = mock.clone();
        let deleted_at = Utc::now() - chrono::Duration::minutes(5);
        let event = DomainEvent::LoanDeleted(LoanDeleted {
            loan_id: LoanId::new(),
            deleted_by: UserId::new(),
            deleted_at,
        });

        record_event(&activity_log, None, "Admin", &event).await;

        let entries = mock.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].recorded_at, deleted_at);
        assert_eq!(entries[0].actor, "Admin");
    }

    #[test]
    fn test_describe_delete() {
        let loan_id = LoanId::new();
        let text = describe(&DomainEvent::LoanDeleted(LoanDeleted {
            loan_id,
            deleted_by: UserId::new(),
            deleted_at: Utc::now(),
        }));
        assert_eq!(text, format!("Menghapus peminjaman ID {}", loan_id.value()));
    }
}
