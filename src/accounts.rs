use crate::rules::{ClassificationRules, StatusThresholds};
use crate::schema::ExtractedLedger;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Business,
    Personal,
}

impl AccountKind {
    /// Classifies a `category` string by substring containment against the
    /// configured account markers.
    pub fn of(category: &str, rules: &ClassificationRules) -> Option<Self> {
        rules.markers().account_of(category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Down,
    Flat,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinancialStatus {
    Deficit,
    NearBreakEven,
    Surplus,
}

impl FinancialStatus {
    /// Bounds are inclusive on the break-even side: with the default thresholds
    /// both -5000 and 5000 are `NearBreakEven`.
    pub fn classify(balance: f64, thresholds: &StatusThresholds) -> Self {
        if balance < thresholds.deficit_below {
            Self::Deficit
        } else if balance <= thresholds.surplus_above {
            Self::NearBreakEven
        } else {
            Self::Surplus
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Deficit => "入不敷出",
            Self::NearBreakEven => "接近打平",
            Self::Surplus => "收支有餘",
        }
    }

    pub fn trend(&self) -> Trend {
        match self {
            Self::Deficit => Trend::Down,
            Self::NearBreakEven => Trend::Flat,
            Self::Surplus => Trend::Up,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub business_income: f64,
    pub personal_income: f64,
    pub business_expense: f64,
    pub personal_expense: f64,
    pub business_balance: f64,
    pub personal_balance: f64,
    /// (business + personal income) - (business + personal expense). Records in
    /// neither account do not contribute.
    pub total_balance: f64,
    pub business_status: FinancialStatus,
    pub personal_status: FinancialStatus,
    pub total_status: FinancialStatus,
    pub has_business_activity: bool,
    pub unclassified_incomes: usize,
    pub unclassified_expenses: usize,
}

#[derive(Default)]
struct AccountTotals {
    business: f64,
    personal: f64,
    unclassified: usize,
}

impl AccountTotals {
    fn add(&mut self, kind: Option<AccountKind>, amount: f64) {
        match kind {
            Some(AccountKind::Business) => self.business += amount,
            Some(AccountKind::Personal) => self.personal += amount,
            None => self.unclassified += 1,
        }
    }
}

pub fn summarize_accounts(ledger: &ExtractedLedger, rules: &ClassificationRules) -> AccountSummary {
    let mut incomes = AccountTotals::default();
    for income in &ledger.incomes {
        incomes.add(AccountKind::of(&income.category, rules), income.subtotal);
    }

    let mut expenses = AccountTotals::default();
    for expense in &ledger.expenses {
        expenses.add(AccountKind::of(&expense.category, rules), expense.subtotal);
    }

    let business_balance = incomes.business - expenses.business;
    let personal_balance = incomes.personal - expenses.personal;
    let total_balance =
        (incomes.business + incomes.personal) - (expenses.business + expenses.personal);

    let thresholds = &rules.status_thresholds;

    AccountSummary {
        business_income: incomes.business,
        personal_income: incomes.personal,
        business_expense: expenses.business,
        personal_expense: expenses.personal,
        business_balance,
        personal_balance,
        total_balance,
        business_status: FinancialStatus::classify(business_balance, thresholds),
        personal_status: FinancialStatus::classify(personal_balance, thresholds),
        total_status: FinancialStatus::classify(total_balance, thresholds),
        has_business_activity: incomes.business > 0.0 || expenses.business > 0.0,
        unclassified_incomes: incomes.unclassified,
        unclassified_expenses: expenses.unclassified,
    }
}
