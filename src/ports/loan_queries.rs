use crate::domain::{EquipmentId, Loan, LoanId, UserId};
use async_trait::async_trait;
use rust_decimal::Decimal;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 明細に表示する備品情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSummary {
    pub equipment_id: EquipmentId,
    pub name: String,
    pub code: String,
    pub unit_price: Decimal,
}

/// 貸出ビュー
///
/// 貸出記録に、明細が参照する備品の表示情報を添えたもの。
#[derive(Debug, Clone)]
pub struct LoanView {
    pub loan: Loan,
    pub equipment: Vec<EquipmentSummary>,
}

impl LoanView {
    pub fn equipment_for(&self, equipment_id: EquipmentId) -> Option<&EquipmentSummary> {
        self.equipment
            .iter()
            .find(|e| e.equipment_id == equipment_id)
    }
}

/// 管理者一覧の検索条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanListFilter {
    /// ステータス文字列の部分一致
    pub status_contains: Option<String>,
    /// 1始まり
    pub page: u32,
    pub per_page: u32,
}

impl LoanListFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// ページ単位の結果
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// 最終ページ番号（0件でも1）
    pub fn last_page(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

/// 貸出照会ポート
///
/// 読み取り専用。ロックは取得しない。
#[async_trait]
pub trait LoanQueries: Send + Sync {
    /// 借用者本人の貸出一覧（新しい順）
    async fn find_by_borrower(&self, borrower_id: UserId) -> Result<Vec<LoanView>>;

    /// 全貸出の一覧（新しい順、ページ単位）
    async fn list(&self, filter: &LoanListFilter) -> Result<Page<LoanView>>;

    /// IDで貸出を取得する
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>>;
}
