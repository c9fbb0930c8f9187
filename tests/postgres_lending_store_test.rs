//! PostgreSQLアダプターの統合テスト
//!
//! 実行にはPostgreSQLが必要：
//! `DATABASE_URL=postgres://... cargo test --test postgres_lending_store_test -- --ignored`

mod common;

use chrono::Utc;
use common::*;
use equipment_lending::adapters::postgres::{
    PostgresActivityLog, PostgresLendingStore, PostgresLoanQueries,
};
use equipment_lending::application::loan::{
    LoanApplicationError, ServiceDependencies, approve_loan, confirm_return, delete_loan,
    list_borrower_loans, list_loans, reject_stale_requests, request_return, submit_loan_request,
};
use equipment_lending::domain::{
    DeleteLoan, Equipment, EquipmentId, LoanStatus, ReturnCondition, Stock,
};
use equipment_lending::ports::LoanListFilter;
use rust_decimal::Decimal;
use serial_test::serial;
use sqlx::{PgPool, Row};
use std::sync::Arc;

async fn setup() -> (PgPool, ServiceDependencies) {
    let pool = create_test_pool().await;

    sqlx::query("TRUNCATE loan_lines, loans, activity_logs, equipment CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean tables");

    let deps = ServiceDependencies {
        lending_store: Arc::new(PostgresLendingStore::new(pool.clone())),
        loan_queries: Arc::new(PostgresLoanQueries::new(pool.clone())),
        activity_log: Arc::new(PostgresActivityLog::new(pool.clone())),
    };

    (pool, deps)
}

async fn insert_equipment(pool: &PgPool, code: &str, available: u32) -> Equipment {
    let item = equipment(code, available);
    sqlx::query(
        r#"
        INSERT INTO equipment (
            equipment_id, name, code, description, condition, location,
            unit_price, max_loan_days, units_available, units_loaned
        )
        VALUES ($1, $2, $3, $4, 'good', $5, $6, $7, $8, 0)
        "#,
    )
    .bind(item.equipment_id.value())
    .bind(&item.name)
    .bind(&item.code)
    .bind(&item.description)
    .bind(&item.location)
    .bind(item.unit_price)
    .bind(item.max_loan_days as i32)
    .bind(available as i32)
    .execute(pool)
    .await
    .expect("Failed to insert equipment");
    item
}

async fn stock_of(pool: &PgPool, equipment_id: EquipmentId) -> Stock {
    let row = sqlx::query(
        "SELECT units_available, units_loaned FROM equipment WHERE equipment_id = $1",
    )
    .bind(equipment_id.value())
    .fetch_one(pool)
    .await
    .unwrap();

    let available: i32 = row.get("units_available");
    let loaned: i32 = row.get("units_loaned");
    Stock::new(available as u32, loaned as u32)
}

async fn activity_count(pool: &PgPool) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM activity_logs")
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_full_lifecycle_persists_state() {
    let (pool, deps) = setup().await;
    let item = insert_equipment(&pool, "PG-01", 5).await;
    let borrower = borrower();
    let staff = staff();

    let loan = submit_loan_request(
        &deps,
        submit_command(&borrower, &[(item.equipment_id, 2)]),
    )
    .await
    .unwrap();
    assert_eq!(stock_of(&pool, item.equipment_id).await, Stock::new(5, 0));

    approve_loan(&deps, approve_command(loan.loan_id, &staff))
        .await
        .unwrap();
    assert_eq!(stock_of(&pool, item.equipment_id).await, Stock::new(3, 2));

    request_return(&deps, request_return_command(loan.loan_id, &borrower))
        .await
        .unwrap();

    let receipt = confirm_return(
        &deps,
        confirm_command(loan.loan_id, &staff, ReturnCondition::Good, date("2026-03-08")),
    )
    .await
    .unwrap();
    assert_eq!(receipt.late_days, 3);
    assert_eq!(receipt.total_late_fee, Decimal::from(600));
    assert_eq!(stock_of(&pool, item.equipment_id).await, Stock::new(5, 0));

    let views = list_borrower_loans(&deps, borrower.user_id).await.unwrap();
    assert_eq!(views.len(), 1);
    let stored = &views[0].loan;
    assert_eq!(stored.status, LoanStatus::Returned);
    assert_eq!(stored.final_condition, Some(ReturnCondition::Good));
    assert_eq!(stored.actual_return_date, Some(date("2026-03-08")));
    assert_eq!(stored.lines[0].late_fee, Some(Decimal::from(600)));
    assert_eq!(stored.notes.as_deref(), Some("Praktikum jaringan"));
    assert_eq!(views[0].equipment[0].code, "PG-01");

    assert_eq!(activity_count(&pool).await, 4);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_pending_demand_blocks_oversubscription() {
    let (pool, deps) = setup().await;
    let item = insert_equipment(&pool, "PG-02", 3).await;

    submit_loan_request(&deps, submit_command(&borrower(), &[(item.equipment_id, 2)]))
        .await
        .unwrap();

    let result =
        submit_loan_request(&deps, submit_command(&borrower(), &[(item.equipment_id, 2)])).await;

    assert!(matches!(
        result,
        Err(LoanApplicationError::InsufficientStock { available: 1, .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
#[serial]
async fn test_concurrent_submits_serialize_on_row_lock() {
    let (pool, deps) = setup().await;
    let item = insert_equipment(&pool, "PG-03", 1).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let deps = deps.clone();
        let cmd = submit_command(&borrower(), &[(item.equipment_id, 1)]);
        handles.push(tokio::spawn(async move {
            submit_loan_request(&deps, cmd).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LoanApplicationError::InsufficientStock { .. }) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(successes, 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_multi_line_approval_rolls_back_on_shortage() {
    let (pool, deps) = setup().await;
    let first = insert_equipment(&pool, "PG-04", 4).await;
    let second = insert_equipment(&pool, "PG-05", 4).await;

    let loan = submit_loan_request(
        &deps,
        submit_command(
            &borrower(),
            &[(first.equipment_id, 2), (second.equipment_id, 3)],
        ),
    )
    .await
    .unwrap();

    sqlx::query("UPDATE equipment SET units_available = 1 WHERE equipment_id = $1")
        .bind(second.equipment_id.value())
        .execute(&pool)
        .await
        .unwrap();

    let result = approve_loan(&deps, approve_command(loan.loan_id, &staff())).await;

    assert!(matches!(
        result,
        Err(LoanApplicationError::InsufficientStock { .. })
    ));
    assert_eq!(stock_of(&pool, first.equipment_id).await, Stock::new(4, 0));
    assert_eq!(stock_of(&pool, second.equipment_id).await, Stock::new(1, 0));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_damaged_return_retires_units() {
    let (pool, deps) = setup().await;
    let item = insert_equipment(&pool, "PG-06", 5).await;
    let borrower = borrower();
    let staff = staff();

    let loan = submit_loan_request(&deps, submit_command(&borrower, &[(item.equipment_id, 2)]))
        .await
        .unwrap();
    approve_loan(&deps, approve_command(loan.loan_id, &staff))
        .await
        .unwrap();
    request_return(&deps, request_return_command(loan.loan_id, &borrower))
        .await
        .unwrap();
    let receipt = confirm_return(
        &deps,
        confirm_command(loan.loan_id, &staff, ReturnCondition::Damaged, date("2026-03-05")),
    )
    .await
    .unwrap();

    assert_eq!(receipt.loan.status, LoanStatus::ReturnedDamaged);
    assert_eq!(stock_of(&pool, item.equipment_id).await, Stock::new(3, 0));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_sweep_and_listing() {
    let (pool, deps) = setup().await;
    let item = insert_equipment(&pool, "PG-07", 10).await;

    for _ in 0..3 {
        submit_loan_request(&deps, submit_command(&borrower(), &[(item.equipment_id, 1)]))
            .await
            .unwrap();
    }

    let today = date("2026-03-02");
    assert_eq!(reject_stale_requests(&deps, today, Utc::now()).await.unwrap(), 3);
    assert_eq!(reject_stale_requests(&deps, today, Utc::now()).await.unwrap(), 0);

    let page = list_loans(
        &deps,
        LoanListFilter {
            status_contains: Some("reject".to_string()),
            page: 2,
            per_page: 2,
        },
    )
    .await
    .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.last_page(), 2);

    // 申請3件 + 集計1件
    assert_eq!(activity_count(&pool).await, 4);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_delete_cascades_lines() {
    let (pool, deps) = setup().await;
    let item = insert_equipment(&pool, "PG-08", 2).await;

    let loan = submit_loan_request(&deps, submit_command(&borrower(), &[(item.equipment_id, 1)]))
        .await
        .unwrap();

    let cmd = DeleteLoan {
        loan_id: loan.loan_id,
        admin: admin(),
        deleted_at: Utc::now(),
    };
    delete_loan(&deps, cmd.clone()).await.unwrap();

    let lines: i64 = sqlx::query("SELECT COUNT(*) AS n FROM loan_lines WHERE loan_id = $1")
        .bind(loan.loan_id.value())
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(lines, 0);

    let again = delete_loan(&deps, cmd).await;
    assert!(matches!(again, Err(LoanApplicationError::LoanNotFound)));
}
