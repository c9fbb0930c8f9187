use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::Quantity;

/// 延滞料金率：単価の0.1%／日
pub const LATE_FEE_RATE_PER_DAY: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// 純粋関数：延滞日数
///
/// 返却予定日を過ぎた日数（整数日）。予定日当日以前の返却は0日。
pub fn late_days(planned_return_date: NaiveDate, today: NaiveDate) -> u32 {
    let days = (today - planned_return_date).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// 純粋関数：明細1行分の延滞料金
///
/// `延滞日数 × (単価 × 0.001) × 数量`
pub fn late_fee(unit_price: Decimal, quantity: Quantity, late_days: u32) -> Decimal {
    (Decimal::from(late_days) * (unit_price * LATE_FEE_RATE_PER_DAY) * Decimal::from(quantity.value()))
        .normalize()
}
