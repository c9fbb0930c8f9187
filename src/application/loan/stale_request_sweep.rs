use chrono::{DateTime, NaiveDate, Utc};

use crate::domain;

use super::activity;
use super::errors::{LoanApplicationError, Result};
use super::loan_service::ServiceDependencies;

/// システムによる操作の表示名
pub const SYSTEM_ACTOR_NAME: &str = "system";

/// 放置された申請の自動却下バッチ
///
/// 1日1回実行され、開始日が`today`より前の申請中記録をすべて却下する。
///
/// ビジネスルール：
/// - 対象は申請中かつ開始日 < 今日の記録のみ
/// - 却下理由は固定文言
/// - 1件以上却下した場合のみ、集計した活動ログを1件記録する
///
/// 却下済みの記録は対象条件に一致しないため、同じ日に再実行しても0件になる。
///
/// # 戻り値
/// 却下した件数
pub async fn reject_stale_requests(
    deps: &ServiceDependencies,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize> {
    let mut tx = deps
        .lending_store
        .begin()
        .await
        .map_err(LoanApplicationError::StoreError)?;

    // 1. 対象をロックして取得
    let candidates = tx
        .lock_stale_requests(today)
        .await
        .map_err(LoanApplicationError::StoreError)?;

    // 2. 各候補を却下
    let mut rejected_count = 0;
    for loan in &candidates {
        let Some((rejected, _event)) = domain::auto_reject(loan, today, now) else {
            continue;
        };

        tx.update_loan(&rejected)
            .await
            .map_err(LoanApplicationError::StoreError)?;
        rejected_count += 1;
    }

    tx.commit().await.map_err(LoanApplicationError::StoreError)?;

    if rejected_count == 0 {
        tracing::debug!(%today, "No stale loan requests");
        return Ok(0);
    }

    tracing::info!(%today, rejected_count, "Stale loan requests rejected");

    activity::record(
        &deps.activity_log,
        None,
        SYSTEM_ACTOR_NAME,
        format!(
            "Menolak otomatis {} peminjaman yang melewati tanggal pinjam",
            rejected_count
        ),
        now,
    )
    .await;

    Ok(rejected_count)
}
