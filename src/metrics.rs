use crate::accounts::AccountSummary;
use crate::rules::ClassificationRules;
use crate::schema::ExtractedLedger;
use serde::{Deserialize, Serialize};

/// Months of living expense covered by the low end of the emergency fund band.
pub const EMERGENCY_FUND_MIN_MONTHS: f64 = 3.0;
/// Months of living expense covered by the high end of the emergency fund band.
pub const EMERGENCY_FUND_MAX_MONTHS: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginSummary {
    pub business_cost: f64,
    pub gross_profit: f64,
    /// Zero when there is no business income.
    pub gross_margin_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyFund {
    pub min: f64,
    pub max: f64,
}

/// Totals over every record, including those in neither account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowTotals {
    pub total_income: f64,
    pub total_expense: f64,
    pub net_cash_flow: f64,
}

pub fn gross_margin_percent(business_income: f64, business_cost: f64) -> f64 {
    if business_income > 0.0 {
        (business_income - business_cost) / business_income * 100.0
    } else {
        0.0
    }
}

/// Estimates cost of goods from business expenses. A record tagged as a fixed
/// expense still counts as cost when its type or description names materials.
pub fn compute_margin(
    ledger: &ExtractedLedger,
    accounts: &AccountSummary,
    rules: &ClassificationRules,
) -> MarginSummary {
    let markers = rules.markers();
    let business_cost = ledger
        .expenses
        .iter()
        .filter(|e| rules.cost_rule.matches(*e, markers))
        .fold(0.0, |acc, e| acc + e.subtotal);

    MarginSummary {
        business_cost,
        gross_profit: accounts.business_income - business_cost,
        gross_margin_percent: gross_margin_percent(accounts.business_income, business_cost),
    }
}

pub fn emergency_fund(personal_expense: f64) -> EmergencyFund {
    EmergencyFund {
        min: personal_expense * EMERGENCY_FUND_MIN_MONTHS,
        max: personal_expense * EMERGENCY_FUND_MAX_MONTHS,
    }
}

pub fn cash_flow_totals(ledger: &ExtractedLedger) -> CashFlowTotals {
    let total_income = ledger.incomes.iter().fold(0.0, |acc, i| acc + i.subtotal);
    let total_expense = ledger.expenses.iter().fold(0.0, |acc, e| acc + e.subtotal);

    CashFlowTotals {
        total_income,
        total_expense,
        net_cash_flow: total_income - total_expense,
    }
}
