use crate::domain::{Equipment, EquipmentId, Loan, LoanId};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出ストアポート
///
/// ライフサイクル操作1回につき1つの作業単位（トランザクション）を開始する。
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// トランザクションを開始する
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>>;
}

/// 作業単位
///
/// 取得したロックはコミットまたは破棄まで保持される。
/// `commit`せずに破棄した場合、すべての変更はロールバックされる。
///
/// ロック順序：貸出記録 → 備品（ID昇順）。
#[async_trait]
pub trait LendingTransaction: Send {
    /// 備品行を排他ロックして読み込む
    ///
    /// ID昇順でロックする。存在しないIDは結果に含まれない。
    async fn lock_equipment(&mut self, ids: &[EquipmentId]) -> Result<Vec<Equipment>>;

    /// 申請中の記録がすでに要求している数量の合計（備品ごと）
    ///
    /// 要求のない備品はマップに含まれない。
    async fn pending_quantities(
        &mut self,
        ids: &[EquipmentId],
    ) -> Result<HashMap<EquipmentId, u32>>;

    /// 貸出記録（明細込み）を排他ロックして読み込む
    async fn lock_loan(&mut self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 開始日が`today`より前の申請中記録をすべてロックして読み込む
    ///
    /// 自動却下バッチで使用される。
    async fn lock_stale_requests(&mut self, today: NaiveDate) -> Result<Vec<Loan>>;

    /// 新しい貸出記録と明細を保存する
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()>;

    /// 貸出記録の状態と明細の延滞料金を更新する
    async fn update_loan(&mut self, loan: &Loan) -> Result<()>;

    /// 備品の在庫数を書き戻す
    async fn update_stock(&mut self, equipment: &[Equipment]) -> Result<()>;

    /// 貸出記録と明細を物理削除する
    ///
    /// 削除した場合は`true`、存在しなかった場合は`false`。
    async fn delete_loan(&mut self, loan_id: LoanId) -> Result<bool>;

    /// コミットする
    async fn commit(self: Box<Self>) -> Result<()>;
}
