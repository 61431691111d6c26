//! Keyword tables that drive every classification in the engine.
//!
//! Each bucket is a [`BucketRule`]: an id, a display label and a [`Matcher`]
//! evaluated independently against every record. Buckets are never
//! first-match: a record whose text satisfies two rules is counted in both.
//! The only disjoint buckets are the ones whose matcher explicitly negates the
//! others (`other` income and `other_loan`).

use crate::accounts::AccountKind;
use crate::error::{CashbookError, Result};
use crate::schema::{ExpenseRecord, IncomeRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const BUSINESS_MARKER: &str = "生意";
pub const PERSONAL_MARKER: &str = "生活";

/// The account markers a [`Matcher::Account`] resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMarkers<'a> {
    pub business: &'a str,
    pub personal: &'a str,
}

impl AccountMarkers<'_> {
    /// The business marker is checked first; valid input never carries both.
    pub fn account_of(&self, category: &str) -> Option<AccountKind> {
        if category.contains(self.business) {
            Some(AccountKind::Business)
        } else if category.contains(self.personal) {
            Some(AccountKind::Personal)
        } else {
            None
        }
    }
}

/// The text fields a [`Matcher`] can look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Category,
    Type,
    Description,
    /// Only expenses carry this field; incomes read it as empty.
    ExpenseCategory,
}

/// Anything the rules can be evaluated against.
pub trait Classifiable {
    fn field(&self, field: RecordField) -> &str;
    fn subtotal(&self) -> f64;
}

impl Classifiable for IncomeRecord {
    fn field(&self, field: RecordField) -> &str {
        match field {
            RecordField::Category => &self.category,
            RecordField::Type => &self.income_type,
            RecordField::Description => &self.description,
            RecordField::ExpenseCategory => "",
        }
    }

    fn subtotal(&self) -> f64 {
        self.subtotal
    }
}

impl Classifiable for ExpenseRecord {
    fn field(&self, field: RecordField) -> &str {
        match field {
            RecordField::Category => &self.category,
            RecordField::Type => &self.expense_type,
            RecordField::Description => &self.description,
            RecordField::ExpenseCategory => &self.expense_category,
        }
    }

    fn subtotal(&self) -> f64 {
        self.subtotal
    }
}

/// A substring predicate over a record, kept as data so the keyword sets can be
/// listed, serialized and overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum Matcher {
    /// The field contains at least one of the keywords.
    Contains {
        field: RecordField,
        keywords: Vec<String>,
    },
    /// The field contains every keyword.
    ContainsAll {
        field: RecordField,
        keywords: Vec<String>,
    },
    /// The field contains none of the keywords.
    Lacks {
        field: RecordField,
        keywords: Vec<String>,
    },
    /// The record's `category` places it in this account, using the markers
    /// configured on [`ClassificationRules`].
    Account { account: AccountKind },
    All { matchers: Vec<Matcher> },
    Any { matchers: Vec<Matcher> },
}

impl Matcher {
    pub fn contains(field: RecordField, keywords: &[&str]) -> Self {
        Self::Contains {
            field,
            keywords: to_owned(keywords),
        }
    }

    pub fn contains_all(field: RecordField, keywords: &[&str]) -> Self {
        Self::ContainsAll {
            field,
            keywords: to_owned(keywords),
        }
    }

    pub fn lacks(field: RecordField, keywords: &[&str]) -> Self {
        Self::Lacks {
            field,
            keywords: to_owned(keywords),
        }
    }

    pub fn account(account: AccountKind) -> Self {
        Self::Account { account }
    }

    pub fn all(matchers: Vec<Matcher>) -> Self {
        Self::All { matchers }
    }

    pub fn any(matchers: Vec<Matcher>) -> Self {
        Self::Any { matchers }
    }

    pub fn matches<R: Classifiable + ?Sized>(
        &self,
        record: &R,
        markers: AccountMarkers<'_>,
    ) -> bool {
        match self {
            Self::Contains { field, keywords } => {
                let text = record.field(*field);
                keywords.iter().any(|k| text.contains(k.as_str()))
            }
            Self::ContainsAll { field, keywords } => {
                let text = record.field(*field);
                keywords.iter().all(|k| text.contains(k.as_str()))
            }
            Self::Lacks { field, keywords } => {
                let text = record.field(*field);
                !keywords.iter().any(|k| text.contains(k.as_str()))
            }
            Self::Account { account } => {
                markers.account_of(record.field(RecordField::Category)) == Some(*account)
            }
            Self::All { matchers } => matchers.iter().all(|m| m.matches(record, markers)),
            Self::Any { matchers } => matchers.iter().any(|m| m.matches(record, markers)),
        }
    }

    /// Every keyword mentioned anywhere in the matcher, in declaration order.
    pub fn keywords(&self) -> Vec<&str> {
        match self {
            Self::Contains { keywords, .. }
            | Self::ContainsAll { keywords, .. }
            | Self::Lacks { keywords, .. } => keywords.iter().map(String::as_str).collect(),
            Self::Account { .. } => Vec::new(),
            Self::All { matchers } | Self::Any { matchers } => {
                matchers.iter().flat_map(Matcher::keywords).collect()
            }
        }
    }

    fn has_empty_keyword(&self) -> bool {
        self.keywords().iter().any(|k| k.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BucketRule {
    pub id: String,
    pub label: String,
    pub matcher: Matcher,
}

impl BucketRule {
    pub fn new(id: &str, label: &str, matcher: Matcher) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            matcher,
        }
    }

    /// Sum of subtotals over matching records, accumulated in input order
    /// starting from `0.0`.
    pub fn total<R: Classifiable>(&self, records: &[R], markers: AccountMarkers<'_>) -> f64 {
        records
            .iter()
            .filter(|r| self.matcher.matches(*r, markers))
            .fold(0.0, |acc, r| acc + r.subtotal())
    }
}

/// A fixed presentation share of another bucket (e.g. 60% of subsidies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BucketShare {
    pub label: String,
    pub ratio: f64,
}

/// Inclusive break-even band for [`crate::accounts::FinancialStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusThresholds {
    /// Balances strictly below this are a deficit.
    pub deficit_below: f64,
    /// Balances strictly above this are a surplus.
    pub surplus_above: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            deficit_below: -5000.0,
            surplus_above: 5000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationRules {
    #[schemars(description = "Substring of `category` marking the business account.")]
    pub business_marker: String,

    #[schemars(description = "Substring of `category` marking the personal account.")]
    pub personal_marker: String,

    pub status_thresholds: StatusThresholds,

    #[schemars(description = "Business expenses counted as cost of goods.")]
    pub cost_rule: Matcher,

    pub income_buckets: Vec<BucketRule>,

    #[schemars(description = "Id of the income bucket split into `subsidy_shares` for display.")]
    pub subsidy_bucket: String,

    pub subsidy_shares: Vec<BucketShare>,

    pub living_expense_buckets: Vec<BucketRule>,

    pub loan_expense_buckets: Vec<BucketRule>,

    pub business_income_buckets: Vec<BucketRule>,

    pub business_expense_buckets: Vec<BucketRule>,

    #[schemars(description = "Ids of the business expense buckets that make up the business expense total.")]
    pub business_expense_total_of: Vec<String>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        use RecordField::*;

        let business = || Matcher::account(AccountKind::Business);

        let income_buckets = vec![
            BucketRule::new("salary", "工資", Matcher::contains(Type, &["薪資"])),
            BucketRule::new(
                "non_salary",
                "非工資",
                Matcher::contains(Type, &["副業", "投資"]),
            ),
            BucketRule::new(
                "family_support",
                "家人提供",
                Matcher::contains(Type, &["家人", "贈與"]),
            ),
            BucketRule::new("loan", "借款", Matcher::contains(Type, &["借款"])),
            BucketRule::new(
                "subsidy",
                "補助或津貼",
                Matcher::contains(Type, &["補助", "津貼"]),
            ),
            BucketRule::new(
                "other",
                "其他",
                Matcher::all(vec![
                    Matcher::lacks(
                        Type,
                        &["薪資", "副業", "投資", "家人", "贈與", "借款", "補助", "津貼"],
                    ),
                    Matcher::account(AccountKind::Personal),
                ]),
            ),
        ];

        let living = |id: &str, label: &str, keyword: &str| {
            BucketRule::new(id, label, Matcher::contains(ExpenseCategory, &[keyword]))
        };

        let living_expense_buckets = vec![
            living("food", "食", "食"),
            living("clothing", "衣", "衣"),
            living("housing", "住", "住"),
            living("transport", "行", "行"),
            living("education", "育", "育"),
            living("entertainment", "樂", "樂"),
            living("telecom", "電信", "電信"),
            living("insurance", "保險", "保險"),
            living("savings", "儲蓄", "儲蓄"),
            living("medical", "醫療", "醫療"),
            living("family_care", "孝養", "孝養"),
            BucketRule::new(
                "donation",
                "捐款",
                Matcher::contains(Description, &["捐款", "奉獻"]),
            ),
            BucketRule::new("tax", "稅金", Matcher::contains(Description, &["稅"])),
        ];

        let loan_expense_buckets = vec![
            BucketRule::new(
                "credit_card",
                "信用卡",
                Matcher::contains(Description, &["信用卡"]),
            ),
            BucketRule::new(
                "personal_loan",
                "信貸",
                Matcher::contains(Description, &["信貸"]),
            ),
            BucketRule::new("mortgage", "房貸", Matcher::contains(Description, &["房貸"])),
            BucketRule::new("car_loan", "車貸", Matcher::contains(Description, &["車貸"])),
            BucketRule::new(
                "friend_loan",
                "親友",
                Matcher::contains_all(Description, &["親友", "借款"]),
            ),
            BucketRule::new("pawnshop", "當鋪", Matcher::contains(Description, &["當鋪"])),
            BucketRule::new(
                "rotating_credit",
                "互助會死會",
                Matcher::contains(Description, &["互助會", "標會"]),
            ),
            BucketRule::new(
                "other_loan",
                "其他",
                Matcher::all(vec![
                    Matcher::contains(Description, &["貸款"]),
                    Matcher::lacks(Description, &["信貸", "房貸", "車貸"]),
                ]),
            ),
        ];

        let business_income_buckets = vec![BucketRule::new("revenue", "營業額", business())];

        // Ordered in display pairs: (fixed, variable), (rent, purchasing), ...
        let business_expense_buckets = vec![
            BucketRule::new(
                "fixed",
                "營業固定支出",
                Matcher::all(vec![business(), Matcher::contains(ExpenseCategory, &["固定"])]),
            ),
            BucketRule::new(
                "variable",
                "營業變動支出",
                Matcher::all(vec![business(), Matcher::contains(ExpenseCategory, &["變動"])]),
            ),
            BucketRule::new(
                "rent",
                "店租",
                Matcher::all(vec![Matcher::contains(Description, &["租"]), business()]),
            ),
            BucketRule::new(
                "purchasing",
                "進貨",
                Matcher::contains(Description, &["進貨", "原料"]),
            ),
            BucketRule::new(
                "utilities",
                "水電",
                Matcher::all(vec![
                    Matcher::contains(Description, &["水電", "瓦斯"]),
                    business(),
                ]),
            ),
            BucketRule::new(
                "raw_materials",
                "原物料",
                Matcher::contains(Description, &["原物料"]),
            ),
            BucketRule::new(
                "payroll",
                "薪資",
                Matcher::all(vec![Matcher::contains(Description, &["薪資"]), business()]),
            ),
            BucketRule::new(
                "marketing",
                "行銷廣告",
                Matcher::contains(Description, &["廣告", "行銷"]),
            ),
            BucketRule::new(
                "equipment",
                "設備",
                Matcher::contains(Description, &["設備", "器材"]),
            ),
        ];

        Self {
            business_marker: BUSINESS_MARKER.to_string(),
            personal_marker: PERSONAL_MARKER.to_string(),
            status_thresholds: StatusThresholds::default(),
            cost_rule: Matcher::all(vec![
                business(),
                Matcher::any(vec![
                    Matcher::contains(ExpenseCategory, &["變動"]),
                    Matcher::contains(Type, &["原料", "包材"]),
                    Matcher::contains(Description, &["原料", "進貨"]),
                ]),
            ]),
            income_buckets,
            subsidy_bucket: "subsidy".to_string(),
            subsidy_shares: vec![
                BucketShare {
                    label: "低收補助".to_string(),
                    ratio: 0.6,
                },
                BucketShare {
                    label: "身障補助".to_string(),
                    ratio: 0.4,
                },
            ],
            living_expense_buckets,
            loan_expense_buckets,
            business_income_buckets,
            business_expense_buckets,
            business_expense_total_of: vec!["fixed".to_string(), "variable".to_string()],
        }
    }
}

impl ClassificationRules {
    /// Loads a rule set from JSON and checks it with [`ClassificationRules::validate`].
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Self = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ClassificationRules)
    }

    pub fn markers(&self) -> AccountMarkers<'_> {
        AccountMarkers {
            business: &self.business_marker,
            personal: &self.personal_marker,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.business_marker.is_empty() || self.personal_marker.is_empty() {
            return Err(CashbookError::InvalidRules(
                "account markers must not be empty".to_string(),
            ));
        }

        if self.business_marker.contains(&self.personal_marker)
            || self.personal_marker.contains(&self.business_marker)
        {
            return Err(CashbookError::InvalidRules(format!(
                "account markers '{}' and '{}' overlap",
                self.business_marker, self.personal_marker
            )));
        }

        let thresholds = &self.status_thresholds;
        if thresholds.deficit_below > thresholds.surplus_above {
            return Err(CashbookError::InvalidRules(format!(
                "deficit threshold {} is above surplus threshold {}",
                thresholds.deficit_below, thresholds.surplus_above
            )));
        }

        if self.cost_rule.has_empty_keyword() {
            return Err(CashbookError::InvalidRules(
                "cost rule contains an empty keyword".to_string(),
            ));
        }

        for bucket in self.all_buckets() {
            if bucket.matcher.has_empty_keyword() {
                return Err(CashbookError::InvalidRules(format!(
                    "bucket '{}' contains an empty keyword, which would match every record",
                    bucket.id
                )));
            }
        }

        if !self
            .income_buckets
            .iter()
            .any(|b| b.id == self.subsidy_bucket)
        {
            return Err(CashbookError::InvalidRules(format!(
                "subsidy bucket '{}' is not an income bucket",
                self.subsidy_bucket
            )));
        }

        for share in &self.subsidy_shares {
            if !(0.0..=1.0).contains(&share.ratio) {
                return Err(CashbookError::InvalidRules(format!(
                    "subsidy share '{}' has ratio {} outside 0.0..=1.0",
                    share.label, share.ratio
                )));
            }
        }

        for id in &self.business_expense_total_of {
            if !self.business_expense_buckets.iter().any(|b| &b.id == id) {
                return Err(CashbookError::InvalidRules(format!(
                    "business expense total refers to unknown bucket '{}'",
                    id
                )));
            }
        }

        Ok(())
    }

    pub fn all_buckets(&self) -> impl Iterator<Item = &BucketRule> {
        self.income_buckets
            .iter()
            .chain(self.living_expense_buckets.iter())
            .chain(self.loan_expense_buckets.iter())
            .chain(self.business_income_buckets.iter())
            .chain(self.business_expense_buckets.iter())
    }
}

fn to_owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}
