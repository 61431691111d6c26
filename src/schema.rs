use crate::error::{CashbookError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Tolerance used when comparing `unit_price * quantity` against a stored subtotal.
pub const SUBTOTAL_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncomeRecord {
    #[schemars(description = "Date of the income in YYYY-MM-DD format (e.g., '2024-01-15').")]
    pub date: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Weather on that day if mentioned (e.g., '晴朗'). Omit when unknown.")]
    pub weather: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Number of customers served, if mentioned. Omit when unknown.")]
    pub customer_count: Option<u32>,

    #[schemars(
        description = "Top-level income account. Use '生意收入' for business income (sales, services, rentals of business assets, profit sharing) or '生活收入' for personal income (salary, rent, investment returns, pensions, subsidies, side jobs, interest, gifts)."
    )]
    pub category: String,

    #[serde(rename = "type")]
    #[schemars(
        description = "Sub-classification of the income (e.g., '薪資收入', '商品銷售收入', '服務提供收入', '副業收入', '政府補助', '親友贈與')."
    )]
    pub income_type: String,

    #[schemars(description = "Short free-text description of the income item.")]
    pub description: String,

    #[schemars(description = "Price per unit.")]
    pub unit_price: f64,

    #[schemars(description = "Number of units.")]
    pub quantity: f64,

    #[schemars(description = "Collection status (e.g., '已收款' when paid, '未收款' otherwise).")]
    pub payment_status: String,

    #[schemars(description = "Total amount of the line, normally unit_price multiplied by quantity.")]
    pub subtotal: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional note about the customer or payment method.")]
    pub customer_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    #[schemars(description = "Date of the expense in YYYY-MM-DD format.")]
    pub date: String,

    #[schemars(
        description = "Top-level expense account. Use '生意支出' for business expenses or '生活支出' for personal living expenses."
    )]
    pub category: String,

    #[schemars(
        description = "Expense bucket. Business: '固定支出' (fixed) or '變動支出' (variable). Personal: one of '食', '衣', '住', '行', '育', '樂', '電信', '保險', '儲蓄', '醫療', '孝養', '還款'."
    )]
    pub expense_category: String,

    #[serde(rename = "type")]
    #[schemars(
        description = "Sub-classification of the expense (e.g., '原料', '包材', '租金', '水電', '人事', '行銷廣告')."
    )]
    pub expense_type: String,

    #[schemars(description = "Short free-text description of the expense item.")]
    pub description: String,

    #[schemars(description = "Price per unit.")]
    pub unit_price: f64,

    #[schemars(description = "Number of units.")]
    pub quantity: f64,

    #[schemars(description = "Total amount of the line, normally unit_price multiplied by quantity.")]
    pub subtotal: f64,
}

/// The output of the extractor: two ordered sequences of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedLedger {
    #[schemars(description = "Every income item found in the text, in the order it appears.")]
    pub incomes: Vec<IncomeRecord>,

    #[schemars(description = "Every expense item found in the text, in the order it appears.")]
    pub expenses: Vec<ExpenseRecord>,
}

fn parse_record_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()
}

fn subtotal_gap(unit_price: f64, quantity: f64, subtotal: f64) -> Option<f64> {
    let gap = unit_price * quantity - subtotal;
    (gap.abs() > SUBTOTAL_TOLERANCE).then_some(gap)
}

impl IncomeRecord {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_record_date(&self.date)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.contains("已收")
    }

    /// Difference between `unit_price * quantity` and the stored subtotal, when they disagree.
    /// The stored subtotal is never replaced.
    pub fn subtotal_mismatch(&self) -> Option<f64> {
        subtotal_gap(self.unit_price, self.quantity, self.subtotal)
    }
}

impl ExpenseRecord {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_record_date(&self.date)
    }

    pub fn subtotal_mismatch(&self) -> Option<f64> {
        subtotal_gap(self.unit_price, self.quantity, self.subtotal)
    }
}

impl ExtractedLedger {
    pub fn new(incomes: Vec<IncomeRecord>, expenses: Vec<ExpenseRecord>) -> Self {
        Self { incomes, expenses }
    }

    pub fn is_empty(&self) -> bool {
        self.incomes.is_empty() && self.expenses.is_empty()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExtractedLedger)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    /// The schema in the subset Gemini accepts as `responseSchema`: no
    /// `$schema`, `$ref` or `definitions`, and `nullable` instead of
    /// `["T", "null"]` type arrays.
    pub fn gemini_response_schema() -> serde_json::Result<Value> {
        let root = serde_json::to_value(Self::generate_json_schema())?;
        let definitions = root.get("definitions").cloned().unwrap_or(Value::Null);
        Ok(inline_schema(root, &definitions))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let ledger: Self = serde_json::from_str(json)?;
        ledger.validate()?;
        Ok(ledger)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks the invariants serde cannot express. Amounts must be finite and the
    /// date field must not be blank.
    pub fn validate(&self) -> Result<()> {
        for (index, income) in self.incomes.iter().enumerate() {
            check_record(
                "income",
                index,
                &income.date,
                &[
                    ("unitPrice", income.unit_price),
                    ("quantity", income.quantity),
                    ("subtotal", income.subtotal),
                ],
            )?;
        }

        for (index, expense) in self.expenses.iter().enumerate() {
            check_record(
                "expense",
                index,
                &expense.date,
                &[
                    ("unitPrice", expense.unit_price),
                    ("quantity", expense.quantity),
                    ("subtotal", expense.subtotal),
                ],
            )?;
        }

        Ok(())
    }

    /// Records whose subtotal differs from `unit_price * quantity`, as
    /// `(kind, index, gap)`. The stored subtotal stays authoritative.
    pub fn subtotal_mismatches(&self) -> Vec<(&'static str, usize, f64)> {
        let incomes = self
            .incomes
            .iter()
            .enumerate()
            .filter_map(|(idx, income)| {
                income.subtotal_mismatch().map(|gap| ("income", idx, gap))
            });
        let expenses = self
            .expenses
            .iter()
            .enumerate()
            .filter_map(|(idx, expense)| {
                expense.subtotal_mismatch().map(|gap| ("expense", idx, gap))
            });

        incomes.chain(expenses).collect()
    }

    /// Earliest and latest parseable record dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self
            .incomes
            .iter()
            .filter_map(IncomeRecord::parsed_date)
            .chain(self.expenses.iter().filter_map(ExpenseRecord::parsed_date));

        dates.fold(None, |range, date| match range {
            None => Some((date, date)),
            Some((start, end)) => Some((start.min(date), end.max(date))),
        })
    }
}

fn inline_schema(value: Value, definitions: &Value) -> Value {
    let map = match value {
        Value::Object(map) => map,
        Value::Array(items) => {
            return Value::Array(
                items
                    .into_iter()
                    .map(|item| inline_schema(item, definitions))
                    .collect(),
            )
        }
        other => return other,
    };

    if let Some(Value::String(reference)) = map.get("$ref") {
        let name = reference.trim_start_matches("#/definitions/");
        if let Some(definition) = definitions.get(name) {
            return inline_schema(definition.clone(), definitions);
        }
    }

    let mut out = Map::new();
    for (key, inner) in map {
        match key.as_str() {
            "$schema" | "definitions" | "title" | "format" | "default" => {}
            "type" => match inner {
                Value::Array(types) => {
                    let nullable = types.iter().any(|t| t == "null");
                    if let Some(concrete) = types.into_iter().find(|t| t != "null") {
                        out.insert(key, concrete);
                    }
                    if nullable {
                        out.insert("nullable".to_string(), Value::Bool(true));
                    }
                }
                other => {
                    out.insert(key, other);
                }
            },
            // Property names are data, not keywords; only their schemas are rewritten.
            "properties" => {
                let properties = match inner {
                    Value::Object(properties) => properties
                        .into_iter()
                        .map(|(name, schema)| (name, inline_schema(schema, definitions)))
                        .collect(),
                    _ => Map::new(),
                };
                out.insert(key, Value::Object(properties));
            }
            _ => {
                out.insert(key, inline_schema(inner, definitions));
            }
        }
    }
    Value::Object(out)
}

fn check_record(
    kind: &'static str,
    index: usize,
    date: &str,
    amounts: &[(&str, f64)],
) -> Result<()> {
    if date.trim().is_empty() {
        return Err(CashbookError::InvalidRecord {
            kind,
            index,
            details: "date is empty".to_string(),
        });
    }

    for (field, value) in amounts {
        if !value.is_finite() {
            return Err(CashbookError::InvalidRecord {
                kind,
                index,
                details: format!("{} is not a finite number ({})", field, value),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "incomes": [
            {
                "date": "2024-01-15",
                "weather": "晴朗",
                "customerCount": 80,
                "category": "生意收入",
                "type": "商品銷售收入",
                "description": "咖啡銷售",
                "unitPrice": 80,
                "quantity": 120,
                "paymentStatus": "已收款",
                "subtotal": 9600,
                "customerNote": "現金收款"
            }
        ],
        "expenses": [
            {
                "date": "2024-01-01",
                "category": "生意支出",
                "expenseCategory": "固定支出",
                "type": "租金",
                "description": "店租",
                "unitPrice": 15000,
                "quantity": 1,
                "subtotal": 15000
            }
        ]
    }"#;

    #[test]
    fn test_gemini_response_schema_is_self_contained() {
        let schema = ExtractedLedger::gemini_response_schema().unwrap();
        let text = schema.to_string();
        assert!(!text.contains("$ref"));
        assert!(!text.contains("definitions"));
        assert!(!text.contains("$schema"));

        let income = &schema["properties"]["incomes"]["items"];
        assert_eq!(income["properties"]["weather"]["type"], "string");
        assert_eq!(income["properties"]["weather"]["nullable"], true);
        assert_eq!(income["properties"]["type"]["type"], "string");
        assert!(income["properties"]["type"]["description"]
            .as_str()
            .unwrap()
            .contains("薪資收入"));

        let expense = &schema["properties"]["expenses"]["items"];
        assert_eq!(expense["properties"]["subtotal"]["type"], "number");
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let result = ExtractedLedger::from_file("does/not/exist.json");
        assert!(matches!(result, Err(CashbookError::IoError(_))));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = ExtractedLedger::schema_as_json().unwrap();
        assert!(schema_json.contains("incomes"));
        assert!(schema_json.contains("expenses"));
        assert!(schema_json.contains("expenseCategory"));
        assert!(schema_json.contains("paymentStatus"));
    }

    #[test]
    fn test_deserialize_extractor_output() {
        let ledger = ExtractedLedger::from_json(SAMPLE_JSON).unwrap();
        assert_eq!(ledger.incomes.len(), 1);
        assert_eq!(ledger.expenses.len(), 1);

        let income = &ledger.incomes[0];
        assert_eq!(income.income_type, "商品銷售收入");
        assert_eq!(income.customer_count, Some(80));
        assert!(income.is_paid());
        assert_eq!(income.subtotal_mismatch(), None);

        assert_eq!(ledger.expenses[0].expense_category, "固定支出");
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let json = r#"{"incomes":[{"date":"2024-01-01","category":"生活收入","type":"薪資收入",
            "description":"正職薪資","unitPrice":35000,"quantity":1,"paymentStatus":"已收款",
            "subtotal":35000}],"expenses":[]}"#;
        let ledger = ExtractedLedger::from_json(json).unwrap();
        assert_eq!(ledger.incomes[0].weather, None);
        assert_eq!(ledger.incomes[0].customer_note, None);

        let back = serde_json::to_string(&ledger).unwrap();
        assert!(!back.contains("weather"));
        assert!(back.contains("\"type\":\"薪資收入\""));
    }

    #[test]
    fn test_negative_customer_count_rejected() {
        let json = SAMPLE_JSON.replace("\"customerCount\": 80", "\"customerCount\": -3");
        assert!(ExtractedLedger::from_json(&json).is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_amounts() {
        let mut ledger = ExtractedLedger::from_json(SAMPLE_JSON).unwrap();
        ledger.expenses[0].subtotal = f64::NAN;

        match ledger.validate() {
            Err(CashbookError::InvalidRecord { kind, index, .. }) => {
                assert_eq!(kind, "expense");
                assert_eq!(index, 0);
            }
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_subtotal_is_trusted_but_mismatch_reported() {
        let mut ledger = ExtractedLedger::from_json(SAMPLE_JSON).unwrap();
        ledger.incomes[0].subtotal = 9000.0;

        assert_eq!(ledger.incomes[0].subtotal, 9000.0);
        let gap = ledger.incomes[0].subtotal_mismatch().unwrap();
        assert!((gap - 600.0).abs() < 1e-9);

        ledger.expenses[0].quantity = 2.0;
        let mismatches = ledger.subtotal_mismatches();
        assert_eq!(mismatches.len(), 2);
        assert_eq!((mismatches[0].0, mismatches[0].1), ("income", 0));
        assert_eq!((mismatches[1].0, mismatches[1].1), ("expense", 0));
        assert!((mismatches[1].2 - 15000.0).abs() < 1e-9);
    }

    #[test]
    fn test_date_range() {
        let ledger = ExtractedLedger::from_json(SAMPLE_JSON).unwrap();
        let (start, end) = ledger.date_range().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());

        assert_eq!(ExtractedLedger::default().date_range(), None);
    }
}
