//! # Cashbook Analyzer
//!
//! Turns income and expense records (extracted from free text by an LLM) into
//! business/personal account summaries, a gross-margin estimate, an emergency
//! fund band and a monthly financial report.
//!
//! ## Core Concepts
//!
//! - **Extracted Ledger**: two ordered sequences of records, [`IncomeRecord`]s and
//!   [`ExpenseRecord`]s, produced once per request and never mutated
//! - **Accounts**: records are split into a Business and a Personal account by a
//!   substring of their `category`; records matching neither only reach global totals
//! - **Buckets**: named sub-classifications, each an independent keyword predicate.
//!   A record can land in several buckets
//! - **Report**: a nested breakdown of the buckets with a deterministic text export
//!
//! The aggregation engine is pure: the same ledger always produces the same
//! [`Analysis`] and the same export text.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cashbook_analyzer::*;
//!
//! let ledger = ExtractedLedger::from_json(&extractor_output)?;
//! let analysis = analyze(&ledger);
//!
//! println!("{}", analysis.report.to_text());
//! println!("{}", analysis.analysis_text());
//! ```

pub mod accounts;
pub mod error;
pub mod export;
pub mod metrics;
pub mod report;
pub mod rules;
pub mod schema;

#[cfg(feature = "gemini")]
pub mod llm;

pub use accounts::{summarize_accounts, AccountKind, AccountSummary, FinancialStatus, Trend};
pub use error::{CashbookError, Result};
pub use export::{analysis_text, format_amount};
pub use metrics::{
    cash_flow_totals, compute_margin, emergency_fund, gross_margin_percent, CashFlowTotals,
    EmergencyFund, MarginSummary,
};
pub use report::{BucketAmount, FinancialReport, ReportSection, ReportSummary, SectionKind};
pub use rules::{
    AccountMarkers, BucketRule, BucketShare, Classifiable, ClassificationRules, Matcher,
    RecordField, StatusThresholds,
};
pub use schema::*;

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything the engine derives from one ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub accounts: AccountSummary,
    pub margin: MarginSummary,
    pub emergency_fund: EmergencyFund,
    pub cash_flow: CashFlowTotals,
    pub report: FinancialReport,
    /// Earliest and latest record date, when any date parses.
    pub period: Option<(NaiveDate, NaiveDate)>,
}

impl Analysis {
    pub fn report_text(&self) -> String {
        self.report.to_text()
    }

    pub fn analysis_text(&self) -> String {
        analysis_text(
            &self.cash_flow,
            &self.accounts,
            &self.margin,
            &self.emergency_fund,
        )
    }
}

pub struct CashFlowAnalyzer {
    rules: ClassificationRules,
    latest: Option<Analysis>,
}

impl Default for CashFlowAnalyzer {
    fn default() -> Self {
        Self {
            rules: ClassificationRules::default(),
            latest: None,
        }
    }
}

impl CashFlowAnalyzer {
    pub fn new(rules: ClassificationRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self {
            rules,
            latest: None,
        })
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// The last analysis produced by [`CashFlowAnalyzer::refresh`].
    pub fn latest(&self) -> Option<&Analysis> {
        self.latest.as_ref()
    }

    pub fn analyze(&self, ledger: &ExtractedLedger) -> Analysis {
        info!(
            "Analyzing {} income and {} expense records",
            ledger.incomes.len(),
            ledger.expenses.len()
        );

        for (kind, idx, gap) in ledger.subtotal_mismatches() {
            debug!(
                "{} #{} subtotal differs from unitPrice x quantity by {}",
                kind, idx, gap
            );
        }

        let accounts = summarize_accounts(ledger, &self.rules);
        if accounts.unclassified_incomes > 0 || accounts.unclassified_expenses > 0 {
            debug!(
                "{} incomes and {} expenses match neither account marker",
                accounts.unclassified_incomes, accounts.unclassified_expenses
            );
        }

        let margin = compute_margin(ledger, &accounts, &self.rules);
        let fund = emergency_fund(accounts.personal_expense);
        let cash_flow = cash_flow_totals(ledger);
        let report = FinancialReport::assemble(ledger, &accounts, &self.rules);

        debug!(
            "Total balance {} ({}), business activity: {}",
            accounts.total_balance,
            accounts.total_status.label(),
            accounts.has_business_activity
        );

        Analysis {
            accounts,
            margin,
            emergency_fund: fund,
            cash_flow,
            report,
            period: ledger.date_range(),
        }
    }

    /// Analyzes a fresh extraction result. When extraction failed, or its output
    /// does not validate, the previous analysis is kept and the error returned.
    pub fn refresh(&mut self, extraction: Result<ExtractedLedger>) -> Result<&Analysis> {
        let ledger = extraction?;
        ledger.validate()?;

        let analysis = self.analyze(&ledger);
        Ok(&*self.latest.insert(analysis))
    }
}

/// Runs the engine with the built-in classification rules.
pub fn analyze(ledger: &ExtractedLedger) -> Analysis {
    CashFlowAnalyzer::default().analyze(ledger)
}
