use crate::domain::{
    Equipment, EquipmentCondition, EquipmentId, Loan, LoanId, LoanLine, LoanLineId, LoanStatus,
    Quantity, ReturnCondition, Stock, UserId,
};
use crate::ports::loan_queries::EquipmentSummary;
use sqlx::{PgConnection, Row, postgres::PgRow};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

pub(super) type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub(super) const LOAN_COLUMNS: &str = r#"
    loan_id,
    borrower_id,
    approver_id,
    receiver_id,
    start_date,
    planned_return_date,
    actual_return_date,
    return_requested_at,
    status,
    condition_before,
    photo_before,
    final_condition,
    photo_after,
    notes,
    rejection_reason,
    created_at,
    updated_at
"#;

pub(super) const EQUIPMENT_COLUMNS: &str = r#"
    equipment_id,
    name,
    code,
    description,
    photo,
    condition,
    location,
    unit_price,
    max_loan_days,
    units_available,
    units_loaned
"#;

pub(super) fn invalid_data(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

fn non_negative(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid_data(format!("{} out of range: {}", column, value)))
}

/// PostgreSQLの行データをEquipmentに変換する
pub(super) fn map_equipment_row(row: &PgRow) -> Result<Equipment> {
    let condition_str: &str = row.get("condition");
    let condition = EquipmentCondition::from_str(condition_str).map_err(invalid_data)?;

    Ok(Equipment {
        equipment_id: EquipmentId::from_uuid(row.get("equipment_id")),
        name: row.get("name"),
        code: row.get("code"),
        description: row.get("description"),
        photo: row.get("photo"),
        condition,
        location: row.get("location"),
        unit_price: row.get("unit_price"),
        max_loan_days: non_negative("max_loan_days", row.get("max_loan_days"))?,
        stock: Stock::new(
            non_negative("units_available", row.get("units_available"))?,
            non_negative("units_loaned", row.get("units_loaned"))?,
        ),
    })
}

/// PostgreSQLの行データをLoanに変換する（明細は空）
///
/// 明細は`fetch_lines`で別途読み込んで設定する。
pub(super) fn map_loan_row(row: &PgRow) -> Result<Loan> {
    let status_str: &str = row.get("status");
    let status = LoanStatus::from_str(status_str).map_err(invalid_data)?;

    let final_condition: Option<String> = row.get("final_condition");
    let final_condition = final_condition
        .as_deref()
        .map(ReturnCondition::from_str)
        .transpose()
        .map_err(invalid_data)?;

    let approver_id: Option<Uuid> = row.get("approver_id");
    let receiver_id: Option<Uuid> = row.get("receiver_id");

    Ok(Loan {
        loan_id: LoanId::from_uuid(row.get("loan_id")),
        borrower_id: UserId::from_uuid(row.get("borrower_id")),
        approver_id: approver_id.map(UserId::from_uuid),
        receiver_id: receiver_id.map(UserId::from_uuid),
        start_date: row.get("start_date"),
        planned_return_date: row.get("planned_return_date"),
        actual_return_date: row.get("actual_return_date"),
        return_requested_at: row.get("return_requested_at"),
        status,
        condition_before: row.get("condition_before"),
        photo_before: row.get("photo_before"),
        final_condition,
        photo_after: row.get("photo_after"),
        notes: row.get("notes"),
        rejection_reason: row.get("rejection_reason"),
        lines: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn map_line_row(row: &PgRow) -> Result<LoanLine> {
    let quantity_i32: i32 = row.get("quantity");
    let quantity = Quantity::try_from(non_negative("quantity", quantity_i32)?)
        .map_err(|e| invalid_data(e.to_string()))?;

    Ok(LoanLine {
        line_id: LoanLineId::from_uuid(row.get("line_id")),
        equipment_id: EquipmentId::from_uuid(row.get("equipment_id")),
        quantity,
        late_fee: row.get("late_fee"),
    })
}

/// 複数の貸出記録の明細をまとめて読み込む（貸出ID → 明細、入力順）
pub(super) async fn fetch_lines(
    conn: &mut PgConnection,
    loan_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<LoanLine>>> {
    if loan_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT loan_id, line_id, equipment_id, quantity, late_fee
        FROM loan_lines
        WHERE loan_id = ANY($1)
        ORDER BY loan_id, position
        "#,
    )
    .bind(loan_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines: HashMap<Uuid, Vec<LoanLine>> = HashMap::new();
    for row in &rows {
        let loan_id: Uuid = row.get("loan_id");
        lines.entry(loan_id).or_default().push(map_line_row(row)?);
    }
    Ok(lines)
}

/// 貸出記録の行から明細込みのLoanを組み立てる
pub(super) async fn load_loans(conn: &mut PgConnection, rows: &[PgRow]) -> Result<Vec<Loan>> {
    let mut loans = rows.iter().map(map_loan_row).collect::<Result<Vec<_>>>()?;
    let ids: Vec<Uuid> = loans.iter().map(|l| l.loan_id.value()).collect();

    let mut lines = fetch_lines(conn, &ids).await?;
    for loan in &mut loans {
        loan.lines = lines.remove(&loan.loan_id.value()).unwrap_or_default();
    }
    Ok(loans)
}

/// 明細が参照する備品の表示情報を読み込む
pub(super) async fn fetch_equipment_summaries(
    conn: &mut PgConnection,
    equipment_ids: &[Uuid],
) -> Result<HashMap<Uuid, EquipmentSummary>> {
    if equipment_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT equipment_id, name, code, unit_price
        FROM equipment
        WHERE equipment_id = ANY($1)
        "#,
    )
    .bind(equipment_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: Uuid = row.get("equipment_id");
            (
                id,
                EquipmentSummary {
                    equipment_id: EquipmentId::from_uuid(id),
                    name: row.get("name"),
                    code: row.get("code"),
                    unit_price: row.get("unit_price"),
                },
            )
        })
        .collect())
}
