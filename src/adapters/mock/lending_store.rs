use crate::domain::{Equipment, EquipmentId, Loan, LoanId, LoanStatus, UserId, is_stale};
use crate::ports::lending_store::{LendingStore as LendingStoreTrait, LendingTransaction, Result};
use crate::ports::loan_queries::{
    EquipmentSummary, LoanListFilter, LoanQueries, LoanView, Page, Result as QueryResult,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct State {
    equipment: BTreeMap<EquipmentId, Equipment>,
    loans: HashMap<LoanId, Loan>,
}

impl State {
    fn view(&self, loan: &Loan) -> LoanView {
        let equipment = loan
            .equipment_ids()
            .into_iter()
            .filter_map(|id| self.equipment.get(&id))
            .map(|e| EquipmentSummary {
                equipment_id: e.equipment_id,
                name: e.name.clone(),
                code: e.code.clone(),
                unit_price: e.unit_price,
            })
            .collect();

        LoanView {
            loan: loan.clone(),
            equipment,
        }
    }

    /// Loans matching `predicate`, newest first
    fn views_where(&self, predicate: impl Fn(&Loan) -> bool) -> Vec<LoanView> {
        let mut loans: Vec<&Loan> = self.loans.values().filter(|l| predicate(l)).collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        loans.into_iter().map(|l| self.view(l)).collect()
    }
}

/// In-memory implementation of LendingStore and LoanQueries
///
/// A transaction holds the whole store exclusively, works on a copy of the
/// state and writes it back on commit. Dropping a transaction discards its
/// changes, which mirrors rollback.
pub struct LendingStore {
    state: Arc<Mutex<State>>,
    fail_commit: Arc<AtomicBool>,
}

impl LendingStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            fail_commit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register equipment for testing purposes
    pub async fn add_equipment(&self, equipment: Equipment) {
        self.state
            .lock()
            .await
            .equipment
            .insert(equipment.equipment_id, equipment);
    }

    /// Current state of an equipment row
    pub async fn equipment(&self, equipment_id: EquipmentId) -> Option<Equipment> {
        self.state.lock().await.equipment.get(&equipment_id).cloned()
    }

    /// Current state of a loan record
    pub async fn loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.state.lock().await.loans.get(&loan_id).cloned()
    }

    pub async fn loan_count(&self) -> usize {
        self.state.lock().await.loans.len()
    }

    /// Make every following commit fail (the transaction is rolled back)
    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }
}

impl Default for LendingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(Transaction {
            guard,
            working,
            fail_commit: self.fail_commit.clone(),
        }))
    }
}

struct Transaction {
    guard: OwnedMutexGuard<State>,
    working: State,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl LendingTransaction for Transaction {
    async fn lock_equipment(&mut self, ids: &[EquipmentId]) -> Result<Vec<Equipment>> {
        let mut sorted = ids.to_vec();
        sorted.sort();
        sorted.dedup();
        Ok(sorted
            .into_iter()
            .filter_map(|id| self.working.equipment.get(&id).cloned())
            .collect())
    }

    async fn pending_quantities(
        &mut self,
        ids: &[EquipmentId],
    ) -> Result<HashMap<EquipmentId, u32>> {
        let mut pending = HashMap::new();
        for loan in self
            .working
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Requested)
        {
            for line in loan.lines.iter().filter(|l| ids.contains(&l.equipment_id)) {
                *pending.entry(line.equipment_id).or_insert(0) += line.quantity.value();
            }
        }
        Ok(pending)
    }

    async fn lock_loan(&mut self, loan_id: LoanId) -> Result<Option<Loan>> {
        Ok(self.working.loans.get(&loan_id).cloned())
    }

    async fn lock_stale_requests(&mut self, today: NaiveDate) -> Result<Vec<Loan>> {
        let mut stale: Vec<Loan> = self
            .working
            .loans
            .values()
            .filter(|l| is_stale(l, today))
            .cloned()
            .collect();
        stale.sort_by_key(|l| l.loan_id);
        Ok(stale)
    }

    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        if self.working.loans.contains_key(&loan.loan_id) {
            return Err(format!("duplicate loan id {}", loan.loan_id.value()).into());
        }
        self.working.loans.insert(loan.loan_id, loan.clone());
        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        match self.working.loans.get_mut(&loan.loan_id) {
            Some(existing) => {
                *existing = loan.clone();
                Ok(())
            }
            None => Err(format!("loan {} not found", loan.loan_id.value()).into()),
        }
    }

    async fn update_stock(&mut self, equipment: &[Equipment]) -> Result<()> {
        for item in equipment {
            let existing = self
                .working
                .equipment
                .get_mut(&item.equipment_id)
                .ok_or_else(|| format!("equipment {} not found", item.equipment_id.value()))?;
            existing.stock = item.stock;
        }
        Ok(())
    }

    async fn delete_loan(&mut self, loan_id: LoanId) -> Result<bool> {
        Ok(self.working.loans.remove(&loan_id).is_some())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err("commit failed".into());
        }
        let Transaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl LoanQueries for LendingStore {
    async fn find_by_borrower(&self, borrower_id: UserId) -> QueryResult<Vec<LoanView>> {
        let state = self.state.lock().await;
        Ok(state.views_where(|l| l.borrower_id == borrower_id))
    }

    async fn list(&self, filter: &LoanListFilter) -> QueryResult<Page<LoanView>> {
        let state = self.state.lock().await;
        let matching = state.views_where(|l| match &filter.status_contains {
            Some(search) => l.status.as_str().contains(search.as_str()),
            None => true,
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page as usize)
            .collect();

        Ok(Page {
            items,
            current_page: filter.page,
            per_page: filter.per_page,
            total,
        })
    }

    async fn get_by_id(&self, loan_id: LoanId) -> QueryResult<Option<LoanView>> {
        let state = self.state.lock().await;
        Ok(state.loans.get(&loan_id).map(|l| state.view(l)))
    }
}
