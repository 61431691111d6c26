use cashbook_analyzer::llm::{ExtractionEvent, GeminiClient, TextExtractor, DEFAULT_MODEL};
use cashbook_analyzer::CashFlowAnalyzer;
use dotenv::dotenv;
use std::error::Error;
use tokio::sync::mpsc;

const SAMPLE_TEXT: &str = r#"
今天是2024年1月15日，天氣晴朗，咖啡店來了80位客人。
賣出咖啡120杯，每杯80元，總共9600元，全部現金收款。
賣出蛋糕15個，每個150元，總共2250元，信用卡收款。
支出方面：
店租15000元，已付現金。
咖啡豆進貨8000元，向供應商批購，現金付款。
外帶杯和餐具等包材1200元。
個人生活方面：
薪水收入35000元，本月正職薪資，已入帳。
房租12000元，已轉帳給房東。
買菜費用4500元，一個月的食材。
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let client = GeminiClient::from_env()?;
    let extractor = TextExtractor::new(client, DEFAULT_MODEL);

    let (tx, mut rx) = mpsc::channel::<ExtractionEvent>(16);
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("  … {:?}", event);
        }
    });

    let extraction = extractor.extract(SAMPLE_TEXT, Some(tx)).await;
    progress.await?;

    let mut analyzer = CashFlowAnalyzer::default();
    match analyzer.refresh(extraction) {
        Ok(analysis) => {
            println!("{}", analysis.analysis_text());
            println!("{}", analysis.report_text());
        }
        Err(e) => eprintln!("Extraction failed, nothing to analyze: {}", e),
    }

    Ok(())
}
