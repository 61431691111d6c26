//! Plain-text serializations used for clipboard export. The output is a pure
//! function of its input; identical input always yields identical text.

use crate::accounts::AccountSummary;
use crate::metrics::{CashFlowTotals, EmergencyFund, MarginSummary};
use crate::report::{BucketAmount, FinancialReport, ReportSection};
use crate::schema::ExtractedLedger;

const INCOME_HEADERS: [&str; 11] = [
    "日期",
    "天氣",
    "來客數",
    "分類",
    "類別",
    "收入內容/說明",
    "單價",
    "數量",
    "收款狀況",
    "小計",
    "客戶記錄/備註",
];

const EXPENSE_HEADERS: [&str; 8] = [
    "日期",
    "分類",
    "支出分類",
    "類別",
    "支出內容",
    "單價",
    "數量",
    "小計",
];

const TOTAL_LABEL: &str = "總計";

/// Formats an amount with thousands separators and at most three fraction
/// digits, trailing zeros trimmed (`1234.5` -> `1,234.5`).
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }

    let fixed = format!("{:.3}", rounded.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

fn money(value: f64) -> String {
    format!("${}", format_amount(value))
}

fn row(bucket: &BucketAmount) -> String {
    format!("{}: {}", bucket.label, format_amount(bucket.amount))
}

/// Lays two columns out as `left\t\tright` lines.
fn push_columns(out: &mut String, left: &[String], right: &[String]) {
    for i in 0..left.len().max(right.len()) {
        match (left.get(i), right.get(i)) {
            (Some(l), Some(r)) => out.push_str(&format!("{}\t\t{}\n", l, r)),
            (Some(l), None) => out.push_str(&format!("{}\n", l)),
            (None, Some(r)) => out.push_str(&format!("\t\t{}\n", r)),
            (None, None) => {}
        }
    }
}

fn rows(section: &ReportSection) -> Vec<String> {
    section.buckets.iter().map(row).collect()
}

impl FinancialReport {
    /// The monthly report as tab/line-delimited text.
    pub fn to_text(&self) -> String {
        let mut out = String::from("財務月報表\n\n");

        out.push_str("家庭收入:\n");
        let income_left: Vec<String> = self
            .income
            .buckets
            .iter()
            .filter(|b| b.id != self.subsidy_bucket)
            .map(row)
            .collect();
        let mut income_right = Vec::with_capacity(self.subsidy_split.len() + 1);
        if let Some(subsidy) = self.income.buckets.iter().find(|b| b.id == self.subsidy_bucket) {
            income_right.push(format!("{}如下", subsidy.label));
        }
        income_right.extend(self.subsidy_split.iter().map(|share| {
            format!("{}: {}", share.label, format_amount(share.amount.floor()))
        }));
        push_columns(&mut out, &income_left, &income_right);
        out.push('\n');

        out.push_str("支出:\n");
        push_columns(&mut out, &rows(&self.living_expense), &rows(&self.loan_expense));
        out.push('\n');

        if let (Some(revenue), Some(spending)) = (&self.business_income, &self.business_expense) {
            out.push_str("營業收入:\n");
            push_columns(&mut out, &rows(revenue), &[]);
            out.push('\n');

            out.push_str("營業支出:\n");
            let (left, right): (Vec<_>, Vec<_>) =
                spending.buckets.iter().enumerate().partition(|(i, _)| i % 2 == 0);
            let left: Vec<String> = left.into_iter().map(|(_, b)| row(b)).collect();
            let right: Vec<String> = right.into_iter().map(|(_, b)| row(b)).collect();
            push_columns(&mut out, &left, &right);
            out.push('\n');
        }

        out.push_str("收支總結:\n");
        out.push_str(&format!("總收入: {}\n", format_amount(self.summary.total_income)));
        out.push_str(&format!("總支出: {}\n", format_amount(self.summary.total_expense)));
        out.push_str(&format!("淨收支: {}\n", format_amount(self.summary.net)));

        out
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# 財務月報表\n\n");

        for section in self.sections() {
            out.push_str(&format!("## {}\n\n", section.kind.title()));
            out.push_str("| 項目 | 金額 |\n|---|---:|\n");
            for bucket in &section.buckets {
                out.push_str(&format!("| {} | {} |\n", bucket.label, format_amount(bucket.amount)));
                if bucket.id == self.subsidy_bucket {
                    for share in &self.subsidy_split {
                        out.push_str(&format!(
                            "| └ {} | {} |\n",
                            share.label,
                            format_amount(share.amount.floor())
                        ));
                    }
                }
            }
            out.push_str(&format!("| **合計** | **{}** |\n\n", format_amount(section.total)));
        }

        out.push_str("## 收支總結\n\n| 項目 | 金額 |\n|---|---:|\n");
        out.push_str(&format!("| 總收入 | {} |\n", format_amount(self.summary.total_income)));
        out.push_str(&format!("| 總支出 | {} |\n", format_amount(self.summary.total_expense)));
        out.push_str(&format!("| **淨收支** | **{}** |\n", format_amount(self.summary.net)));

        out
    }
}

/// Joins a header and rows with tabs and newlines. No trailing newline.
fn tsv(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join("\t"));
    lines.extend(rows.into_iter().map(|row| row.join("\t")));
    lines.join("\n")
}

/// A row that is empty except for the label in the first column and the
/// total in `total_column`.
fn total_row(columns: usize, total_column: usize, total: f64) -> Vec<String> {
    let mut row = vec![String::new(); columns];
    row[0] = TOTAL_LABEL.to_string();
    row[total_column] = total.to_string();
    row
}

impl ExtractedLedger {
    /// Income records as a spreadsheet-pastable table, amounts unformatted.
    /// Absent optional fields are empty cells; the last row holds the total.
    pub fn incomes_tsv(&self) -> String {
        let mut rows: Vec<Vec<String>> = self
            .incomes
            .iter()
            .map(|income| {
                vec![
                    income.date.clone(),
                    income.weather.clone().unwrap_or_default(),
                    income.customer_count.map(|c| c.to_string()).unwrap_or_default(),
                    income.category.clone(),
                    income.income_type.clone(),
                    income.description.clone(),
                    income.unit_price.to_string(),
                    income.quantity.to_string(),
                    income.payment_status.clone(),
                    income.subtotal.to_string(),
                    income.customer_note.clone().unwrap_or_default(),
                ]
            })
            .collect();

        let total = self.incomes.iter().fold(0.0, |acc, i| acc + i.subtotal);
        rows.push(total_row(INCOME_HEADERS.len(), 9, total));
        tsv(&INCOME_HEADERS, rows)
    }

    pub fn expenses_tsv(&self) -> String {
        let mut rows: Vec<Vec<String>> = self
            .expenses
            .iter()
            .map(|expense| {
                vec![
                    expense.date.clone(),
                    expense.category.clone(),
                    expense.expense_category.clone(),
                    expense.expense_type.clone(),
                    expense.description.clone(),
                    expense.unit_price.to_string(),
                    expense.quantity.to_string(),
                    expense.subtotal.to_string(),
                ]
            })
            .collect();

        let total = self.expenses.iter().fold(0.0, |acc, e| acc + e.subtotal);
        rows.push(total_row(EXPENSE_HEADERS.len(), 7, total));
        tsv(&EXPENSE_HEADERS, rows)
    }
}

/// The cash-flow analysis block. The business part is only written when the
/// ledger has business activity.
pub fn analysis_text(
    cash_flow: &CashFlowTotals,
    accounts: &AccountSummary,
    margin: &MarginSummary,
    fund: &EmergencyFund,
) -> String {
    let mut out = String::from("財務分析報告\n\n");

    out.push_str("現金流分析\n");
    out.push_str(&format!("總收入: {}\n", money(cash_flow.total_income)));
    out.push_str(&format!("總支出: {}\n", money(cash_flow.total_expense)));
    out.push_str(&format!("淨現金流: {}\n\n", money(cash_flow.net_cash_flow)));

    if accounts.has_business_activity {
        out.push_str("營業分析\n");
        out.push_str(&format!("營業收入: {}\n", money(accounts.business_income)));
        out.push_str(&format!("營業支出: {}\n", money(accounts.business_expense)));
        out.push_str(&format!("營業淨利: {}\n", money(accounts.business_balance)));
        out.push_str(&format!("營業成本: {}\n", money(margin.business_cost)));
        out.push_str(&format!("毛利: {}\n", money(margin.gross_profit)));
        out.push_str(&format!("毛利率: {:.2}%\n\n", margin.gross_margin_percent));
    }

    out.push_str("生活收支分析\n");
    out.push_str(&format!("生活收入: {}\n", money(accounts.personal_income)));
    out.push_str(&format!("生活支出: {}\n", money(accounts.personal_expense)));
    out.push_str(&format!("生活淨收支: {}\n\n", money(accounts.personal_balance)));

    out.push_str("緊急預備金建議\n");
    out.push_str(&format!("最低建議(3個月): {}\n", money(fund.min)));
    out.push_str(&format!("理想目標(6個月): {}\n", money(fund.max)));

    out
}
