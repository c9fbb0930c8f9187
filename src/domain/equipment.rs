use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{EquipmentId, Quantity};

/// 備品の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCondition {
    /// 良好
    Good,
    /// 軽微な損傷
    MinorDamage,
    /// 重大な損傷
    MajorDamage,
}

impl EquipmentCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentCondition::Good => "good",
            EquipmentCondition::MinorDamage => "minor_damage",
            EquipmentCondition::MajorDamage => "major_damage",
        }
    }
}

impl std::str::FromStr for EquipmentCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(EquipmentCondition::Good),
            "minor_damage" => Ok(EquipmentCondition::MinorDamage),
            "major_damage" => Ok(EquipmentCondition::MajorDamage),
            _ => Err(format!("Invalid equipment condition: {}", s)),
        }
    }
}

/// 在庫操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    /// 貸出可能数が足りない
    #[error("only {available} unit(s) available, {requested} requested")]
    Insufficient { available: u32, requested: u32 },
    /// 貸出中数より多く返却しようとした（データ不整合）
    #[error("only {loaned} unit(s) on loan, {returned} returned")]
    NotOnLoan { loaned: u32, returned: u32 },
}

/// 在庫数
///
/// 不変条件：
/// - 貸出可能数・貸出中数はともに0以上（u32で保証）
/// - 承認と良好返却では`available + loaned`が保存される
///
/// 損傷返却のみ`loaned`から減った分が流通から外れる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    available: u32,
    loaned: u32,
}

impl Stock {
    pub fn new(available: u32, loaned: u32) -> Self {
        Self { available, loaned }
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn loaned(&self) -> u32 {
        self.loaned
    }

    /// 流通中の総数
    pub fn total(&self) -> u32 {
        self.available + self.loaned
    }

    /// 貸出可能数から貸出中数へ移す
    ///
    /// # エラー
    /// 貸出可能数が不足する場合は`StockError::Insufficient`
    pub fn lend(self, quantity: Quantity) -> Result<Self, StockError> {
        let requested = quantity.value();
        if self.available < requested {
            return Err(StockError::Insufficient {
                available: self.available,
                requested,
            });
        }
        Ok(Self {
            available: self.available - requested,
            loaned: self.loaned + requested,
        })
    }

    /// 貸出中数から戻す
    ///
    /// `restock`が真なら貸出可能数に戻し、偽なら流通から外す（損傷品）。
    pub fn take_back(self, quantity: Quantity, restock: bool) -> Result<Self, StockError> {
        let returned = quantity.value();
        if self.loaned < returned {
            return Err(StockError::NotOnLoan {
                loaned: self.loaned,
                returned,
            });
        }
        Ok(Self {
            available: if restock {
                self.available + returned
            } else {
                self.available
            },
            loaned: self.loaned - returned,
        })
    }
}

/// 備品
///
/// 在庫数（`stock`）を変更するのは貸出ライフサイクルのみ。
/// 作成・削除は在庫管理コンテキストの責務。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub equipment_id: EquipmentId,
    pub name: String,
    pub code: String,
    pub description: String,
    pub photo: Option<String>,
    pub condition: EquipmentCondition,
    pub location: String,
    pub unit_price: Decimal,
    /// 1回の貸出で許される最大日数
    pub max_loan_days: u32,
    pub stock: Stock,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(n: u32) -> Quantity {
        Quantity::try_from(n).unwrap()
    }

    // TDD: Stock::lend のテスト
    #[test]
    fn test_lend_moves_units_to_loaned() {
        let stock = Stock::new(5, 1).lend(qty(2)).unwrap();
        assert_eq!(stock.available(), 3);
        assert_eq!(stock.loaned(), 3);
        assert_eq!(stock.total(), 6);
    }

    #[test]
    fn test_lend_fails_when_insufficient() {
        let result = Stock::new(1, 0).lend(qty(2));
        assert_eq!(
            result.unwrap_err(),
            StockError::Insufficient {
                available: 1,
                requested: 2
            }
        );
    }

    // TDD: Stock::take_back のテスト
    #[test]
    fn test_take_back_restocks_good_units() {
        let stock = Stock::new(3, 2).take_back(qty(2), true).unwrap();
        assert_eq!(stock, Stock::new(5, 0));
    }

    #[test]
    fn test_take_back_retires_damaged_units() {
        let stock = Stock::new(3, 2).take_back(qty(2), false).unwrap();
        assert_eq!(stock, Stock::new(3, 0));
    }

    #[test]
    fn test_take_back_fails_when_more_than_loaned() {
        let result = Stock::new(3, 1).take_back(qty(2), true);
        assert!(matches!(result, Err(StockError::NotOnLoan { .. })));
    }

    #[test]
    fn test_equipment_condition_round_trip() {
        for condition in [
            EquipmentCondition::Good,
            EquipmentCondition::MinorDamage,
            EquipmentCondition::MajorDamage,
        ] {
            assert_eq!(
                condition.as_str().parse::<EquipmentCondition>().unwrap(),
                condition
            );
        }
    }
}
