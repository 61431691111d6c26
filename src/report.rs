//! Monthly report: a nested breakdown of income and expense by bucket.
//!
//! Buckets are evaluated independently, so a record whose text matches two
//! rules contributes to both and section totals are sums of buckets, not of
//! distinct records.

use crate::accounts::AccountSummary;
use crate::rules::{AccountMarkers, BucketRule, Classifiable, ClassificationRules};
use crate::schema::ExtractedLedger;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    Income,
    LivingExpense,
    LoanExpense,
    BusinessIncome,
    BusinessExpense,
}

impl SectionKind {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Income => "家庭收入",
            Self::LivingExpense => "生活支出",
            Self::LoanExpense => "信貸支出",
            Self::BusinessIncome => "營業收入",
            Self::BusinessExpense => "營業支出",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketAmount {
    pub id: String,
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub buckets: Vec<BucketAmount>,
    pub total: f64,
}

impl ReportSection {
    fn evaluate<R: Classifiable>(
        kind: SectionKind,
        rules: &[BucketRule],
        records: &[R],
        markers: AccountMarkers<'_>,
    ) -> Self {
        let buckets: Vec<BucketAmount> = rules
            .iter()
            .map(|rule| BucketAmount {
                id: rule.id.clone(),
                label: rule.label.clone(),
                amount: rule.total(records, markers),
            })
            .collect();
        let total = buckets.iter().fold(0.0, |acc, b| acc + b.amount);

        Self {
            kind,
            buckets,
            total,
        }
    }

    pub fn amount(&self, id: &str) -> Option<f64> {
        self.buckets.iter().find(|b| b.id == id).map(|b| b.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub net: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialReport {
    pub income: ReportSection,
    /// Id of the income bucket that `subsidy_split` divides.
    pub subsidy_bucket: String,
    /// Fixed display shares of the subsidy bucket. These are proportions of the
    /// subsidy total, not a classification of the underlying records.
    pub subsidy_split: Vec<BucketAmount>,
    pub living_expense: ReportSection,
    pub loan_expense: ReportSection,
    /// Absent when there is no business activity.
    pub business_income: Option<ReportSection>,
    /// Absent when there is no business activity.
    pub business_expense: Option<ReportSection>,
    pub summary: ReportSummary,
}

impl FinancialReport {
    pub fn assemble(
        ledger: &ExtractedLedger,
        accounts: &AccountSummary,
        rules: &ClassificationRules,
    ) -> Self {
        let markers = rules.markers();
        let income = ReportSection::evaluate(
            SectionKind::Income,
            &rules.income_buckets,
            &ledger.incomes,
            markers,
        );
        let living_expense = ReportSection::evaluate(
            SectionKind::LivingExpense,
            &rules.living_expense_buckets,
            &ledger.expenses,
            markers,
        );
        let loan_expense = ReportSection::evaluate(
            SectionKind::LoanExpense,
            &rules.loan_expense_buckets,
            &ledger.expenses,
            markers,
        );

        let subsidy_total = income.amount(&rules.subsidy_bucket).unwrap_or(0.0);
        let subsidy_split = rules
            .subsidy_shares
            .iter()
            .enumerate()
            .map(|(idx, share)| BucketAmount {
                id: format!("{}_{}", rules.subsidy_bucket, idx),
                label: share.label.clone(),
                amount: subsidy_total * share.ratio,
            })
            .collect();

        let (business_income, business_expense) = if accounts.has_business_activity {
            let revenue = ReportSection::evaluate(
                SectionKind::BusinessIncome,
                &rules.business_income_buckets,
                &ledger.incomes,
                markers,
            );
            let mut spending = ReportSection::evaluate(
                SectionKind::BusinessExpense,
                &rules.business_expense_buckets,
                &ledger.expenses,
                markers,
            );
            // Only the configured headline buckets (fixed + variable) make up the
            // total; the remaining rows overlap with them.
            spending.total = rules
                .business_expense_total_of
                .iter()
                .filter_map(|id| spending.amount(id))
                .fold(0.0, |acc, amount| acc + amount);
            (Some(revenue), Some(spending))
        } else {
            (None, None)
        };

        let total_income = income.total + business_income.as_ref().map_or(0.0, |s| s.total);
        let total_expense = living_expense.total
            + loan_expense.total
            + business_expense.as_ref().map_or(0.0, |s| s.total);

        Self {
            income,
            subsidy_bucket: rules.subsidy_bucket.clone(),
            subsidy_split,
            living_expense,
            loan_expense,
            business_income,
            business_expense,
            summary: ReportSummary {
                total_income,
                total_expense,
                net: total_income - total_expense,
            },
        }
    }

    pub fn total_personal_income(&self) -> f64 {
        self.income.total
    }

    pub fn total_personal_expense(&self) -> f64 {
        self.living_expense.total
    }

    pub fn total_loan_expense(&self) -> f64 {
        self.loan_expense.total
    }

    /// Sections in display order, skipping the business ones when absent.
    pub fn sections(&self) -> Vec<&ReportSection> {
        let mut sections = vec![&self.income, &self.living_expense, &self.loan_expense];
        sections.extend(self.business_income.iter());
        sections.extend(self.business_expense.iter());
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::summarize_accounts;
    use crate::schema::{ExpenseRecord, IncomeRecord};

    fn income(category: &str, income_type: &str, subtotal: f64) -> IncomeRecord {
        IncomeRecord {
            date: "2024-01-01".to_string(),
            weather: None,
            customer_count: None,
            category: category.to_string(),
            income_type: income_type.to_string(),
            description: String::new(),
            unit_price: subtotal,
            quantity: 1.0,
            payment_status: "已收款".to_string(),
            subtotal,
            customer_note: None,
        }
    }

    fn expense(
        category: &str,
        expense_category: &str,
        description: &str,
        subtotal: f64,
    ) -> ExpenseRecord {
        ExpenseRecord {
            date: "2024-01-01".to_string(),
            category: category.to_string(),
            expense_category: expense_category.to_string(),
            expense_type: String::new(),
            description: description.to_string(),
            unit_price: subtotal,
            quantity: 1.0,
            subtotal,
        }
    }

    fn build(ledger: &ExtractedLedger) -> FinancialReport {
        let rules = ClassificationRules::default();
        let accounts = summarize_accounts(ledger, &rules);
        FinancialReport::assemble(ledger, &accounts, &rules)
    }

    #[test]
    fn test_income_buckets() {
        let ledger = ExtractedLedger::new(
            vec![
                income("生活收入", "薪資收入", 35000.0),
                income("生活收入", "副業收入", 3000.0),
                income("生活收入", "親友贈與", 2000.0),
                income("生活收入", "政府補助", 1000.0),
                income("生活收入", "利息收入", 50.0),
            ],
            vec![],
        );

        let report = build(&ledger);
        assert_eq!(report.income.amount("salary"), Some(35000.0));
        assert_eq!(report.income.amount("non_salary"), Some(3000.0));
        assert_eq!(report.income.amount("family_support"), Some(2000.0));
        assert_eq!(report.income.amount("subsidy"), Some(1000.0));
        assert_eq!(report.income.amount("other"), Some(50.0));
        assert_eq!(report.total_personal_income(), 41050.0);
    }

    #[test]
    fn test_subsidy_split_is_fixed_proportion() {
        let ledger = ExtractedLedger::new(vec![income("生活收入", "身障津貼", 1000.0)], vec![]);
        let report = build(&ledger);

        let amounts: Vec<f64> = report.subsidy_split.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![600.0, 400.0]);
        assert_eq!(report.subsidy_split[0].label, "低收補助");
    }

    #[test]
    fn test_double_counting_is_preserved() {
        let ledger = ExtractedLedger::new(
            vec![],
            vec![expense("生活支出", "食", "餐廳捐款", 100.0)],
        );
        let report = build(&ledger);

        assert_eq!(report.living_expense.amount("food"), Some(100.0));
        assert_eq!(report.living_expense.amount("donation"), Some(100.0));
        assert_eq!(report.total_personal_expense(), 200.0);
    }

    #[test]
    fn test_loan_buckets() {
        let ledger = ExtractedLedger::new(
            vec![],
            vec![
                expense("生活支出", "還款", "信用卡費", 3000.0),
                expense("生活支出", "還款", "房貸", 20000.0),
                expense("生活支出", "還款", "還親友借款", 1000.0),
                expense("生活支出", "還款", "學貸貸款", 2000.0),
                expense("生活支出", "還款", "互助會", 500.0),
                expense("生活支出", "還款", "信貸貸款", 4000.0),
                expense("生活支出", "還款", "車貸", 6000.0),
                expense("生活支出", "還款", "當鋪", 1500.0),
            ],
        );
        let report = build(&ledger);

        assert_eq!(report.loan_expense.amount("credit_card"), Some(3000.0));
        assert_eq!(report.loan_expense.amount("mortgage"), Some(20000.0));
        assert_eq!(report.loan_expense.amount("friend_loan"), Some(1000.0));
        assert_eq!(report.loan_expense.amount("other_loan"), Some(2000.0));
        assert_eq!(report.loan_expense.amount("rotating_credit"), Some(500.0));
        assert_eq!(report.loan_expense.amount("personal_loan"), Some(4000.0));
        assert_eq!(report.loan_expense.amount("car_loan"), Some(6000.0));
        assert_eq!(report.loan_expense.amount("pawnshop"), Some(1500.0));
        assert_eq!(report.total_loan_expense(), 38000.0);
    }

    #[test]
    fn test_specific_loan_is_not_other_loan() {
        let ledger = ExtractedLedger::new(
            vec![],
            vec![expense("生活支出", "還款", "信貸貸款", 4000.0)],
        );
        let report = build(&ledger);

        assert_eq!(report.loan_expense.amount("personal_loan"), Some(4000.0));
        assert_eq!(report.loan_expense.amount("other_loan"), Some(0.0));
        assert_eq!(report.total_loan_expense(), 4000.0);
    }

    #[test]
    fn test_business_sections_omitted_without_activity() {
        let ledger = ExtractedLedger::new(
            vec![income("生活收入", "薪資收入", 35000.0)],
            vec![expense("生活支出", "住", "房租", 12000.0)],
        );
        let report = build(&ledger);

        assert!(report.business_income.is_none());
        assert!(report.business_expense.is_none());
        assert_eq!(report.sections().len(), 3);
        assert_eq!(report.summary.net, 23000.0);
    }

    #[test]
    fn test_business_sections_and_summary() {
        let ledger = ExtractedLedger::new(
            vec![
                income("生意收入", "商品銷售收入", 12850.0),
                income("生活收入", "薪資收入", 35000.0),
            ],
            vec![
                expense("生意支出", "固定支出", "店租", 15000.0),
                expense("生意支出", "固定支出", "水電費", 2500.0),
                expense("生意支出", "變動支出", "咖啡豆進貨", 8000.0),
                expense("生意支出", "變動支出", "廣告宣傳費", 800.0),
                expense("生活支出", "住", "房租", 12000.0),
            ],
        );
        let report = build(&ledger);

        let revenue = report.business_income.as_ref().unwrap();
        assert_eq!(revenue.total, 12850.0);

        let spending = report.business_expense.as_ref().unwrap();
        assert_eq!(spending.amount("fixed"), Some(17500.0));
        assert_eq!(spending.amount("variable"), Some(8800.0));
        assert_eq!(spending.amount("rent"), Some(15000.0));
        assert_eq!(spending.amount("utilities"), Some(2500.0));
        assert_eq!(spending.amount("purchasing"), Some(8000.0));
        assert_eq!(spending.amount("marketing"), Some(800.0));
        assert_eq!(spending.total, 26300.0);

        assert_eq!(report.summary.total_income, 47850.0);
        assert_eq!(report.summary.total_expense, 38300.0);
        assert_eq!(report.summary.net, 9550.0);
    }

    #[test]
    fn test_business_detail_rows() {
        let ledger = ExtractedLedger::new(
            vec![],
            vec![
                expense("生意支出", "變動支出", "原物料採購", 2000.0),
                expense("生意支出", "固定支出", "器材維修", 1200.0),
            ],
        );
        let report = build(&ledger);

        let spending = report.business_expense.as_ref().unwrap();
        assert_eq!(spending.amount("raw_materials"), Some(2000.0));
        assert_eq!(spending.amount("equipment"), Some(1200.0));
        assert_eq!(spending.amount("purchasing"), Some(0.0));
        assert_eq!(spending.total, 3200.0);
        assert_eq!(report.business_income.as_ref().unwrap().total, 0.0);
        assert_eq!(report.summary.net, -3200.0);
    }

    #[test]
    fn test_empty_ledger_has_no_negative_zero() {
        let report = build(&ExtractedLedger::default());

        for section in report.sections() {
            assert!(section.total.is_sign_positive());
            assert!(section.buckets.iter().all(|b| b.amount.is_sign_positive()));
        }
        assert!(report.summary.net.is_sign_positive());

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("-0.0"));
    }

    #[test]
    fn test_negative_amounts_serialize_as_given() {
        let ledger = ExtractedLedger::new(
            vec![income("生活收入", "薪資收入", -500.0)],
            vec![expense("生活支出", "食", "退款", -120.0)],
        );
        let report = build(&ledger);

        assert_eq!(report.income.amount("salary"), Some(-500.0));
        assert_eq!(report.living_expense.amount("food"), Some(-120.0));
        assert_eq!(report.summary.net, -380.0);

        let json = serde_json::to_string(&report.living_expense).unwrap();
        assert!(json.contains(r#""id":"food","label":"食","amount":-120.0"#));
        assert!(json.contains(r#""id":"clothing","label":"衣","amount":0.0"#));
    }
}
