// Prompts for turning free text into income and expense records

pub const SYSTEM_PROMPT_EXTRACTION: &str = r#"
You are a bookkeeping assistant. You read free-form notes about a person's or a
small shop's cash activity and list every income and expense item they mention.

## CATEGORIES
Income (`category`):
- 生意收入: 商品銷售收入、服務提供收入、二手設備出售、場地出租、合作分潤等
- 生活收入: 薪資收入、租金收入、定期投資收益、退休金、政府補助、副業收入、臨時工作、利息收入、親友贈與等

Expense (`category`):
- 生意支出: 原料、包材、耗材、運費、租金、人事、水電、瓦斯、通訊、還款、設備添購、器材修繕、行銷廣告等
- 生活支出: 住、電信、還款、保險、儲蓄、食、衣、行、育、樂、醫療等

For business expenses set `expenseCategory` to 固定支出 or 變動支出.
For living expenses set `expenseCategory` to the matching tag (食、衣、住、行、育、樂、電信、保險、儲蓄、醫療、孝養、還款).

## RULES
- One record per item. Never merge two items into one line.
- `subtotal` is the amount actually stated in the text.
- When the text does not give unit price and quantity, use quantity 1 and unitPrice = subtotal.
- Dates use YYYY-MM-DD. If a date cannot be determined, use the most recent date mentioned.
- If information cannot be found in the text, make a reasonable guess or omit optional fields.
- Return ONLY valid JSON matching the schema. No commentary.
"#;

pub fn build_user_prompt(text: &str, schema_json: &str) -> String {
    format!(
        "請分析以下文字，辨識出收入和支出項目，並按照指定格式整理。\n\n\
        ### JSON SCHEMA\n{}\n\n\
        ### 文字內容\n{}",
        schema_json, text
    )
}

pub fn build_patch_prompt(error_msg: &str) -> String {
    format!(
        "The JSON you provided failed validation:\n\nERROR: {}\n\n\
        TASK: Return a JSON Patch (RFC 6902) array to fix this. \
        Do NOT return the full JSON. Return ONLY the patch array.\n\
        Example: [{{ \"op\": \"replace\", \"path\": \"/expenses/0/subtotal\", \"value\": 1200 }}]",
        error_msg
    )
}
