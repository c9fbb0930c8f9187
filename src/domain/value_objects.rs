use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 貸出ID - 貸出記録の集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

/// 貸出明細ID - 貸出記録に属する明細行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanLineId(Uuid);

impl LoanLineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanLineId {
    fn default() -> Self {
        Self::new()
    }
}

/// 備品ID - 在庫管理コンテキストへの参照
///
/// 行ロックの取得順序を固定するため`Ord`を実装する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EquipmentId(Uuid);

impl EquipmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for EquipmentId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者ID - 利用者管理コンテキストへの参照（借用者・職員・管理者共通）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// 数量エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// 0個は指定できない
    Zero,
}

/// 貸出数量
///
/// 不変条件：1以上。
/// 型システムでこの制約を強制し、0個の明細を作成できないようにする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            return Err(QuantityError::Zero);
        }
        Ok(Self(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl std::fmt::Display for QuantityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantityError::Zero => write!(f, "quantity must be at least 1"),
        }
    }
}

/// 利用者のロール
///
/// トークンのクレームにそのまま載る値（`admin` / `petugas` / `peminjam`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// 管理者
    #[serde(rename = "admin")]
    Admin,
    /// 職員（承認・返却確認を担当）
    #[serde(rename = "petugas")]
    Staff,
    /// 借用者
    #[serde(rename = "peminjam")]
    Borrower,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "petugas",
            Role::Borrower => "peminjam",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "petugas" => Ok(Role::Staff),
            "peminjam" => Ok(Role::Borrower),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// 操作を行う主体
///
/// 監査ログに名前を残すため、IDと表示名の両方を持つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    // TDD: Quantity のテスト
    #[test]
    fn test_quantity_rejects_zero() {
        let result = Quantity::try_from(0);
        assert_eq!(result.unwrap_err(), QuantityError::Zero);
    }

    #[test]
    fn test_quantity_accepts_positive() {
        let quantity = Quantity::try_from(3).unwrap();
        assert_eq!(quantity.value(), 3);
    }

    #[test]
    fn test_quantity_deserialize_rejects_zero() {
        let result: Result<Quantity, _> = serde_json::from_str("0");
        assert!(result.is_err());

        let quantity: Quantity = serde_json::from_str("2").unwrap();
        assert_eq!(quantity.value(), 2);
    }

    // ID value objects のテスト
    #[test]
    fn test_loan_id_creation() {
        let id1 = LoanId::new();
        let id2 = LoanId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_equipment_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = EquipmentId::from_uuid(uuid);
        assert_eq!(id.value(), uuid);
    }

    // Role のテスト
    #[test]
    fn test_role_round_trips_through_claim_names() {
        for role in [Role::Admin, Role::Staff, Role::Borrower] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_with_claim_names() {
        assert_eq!(serde_json::to_string(&Role::Staff).unwrap(), "\"petugas\"");
        let role: Role = serde_json::from_str("\"peminjam\"").unwrap();
        assert_eq!(role, Role::Borrower);
    }
}
