use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use pair_screener::{AnalysisReport, HorizonSummary, RankedPair};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct RankRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Horizon")]
    horizon: String,
    #[tabled(rename = "Pair")]
    pair: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Return")]
    total_return: String,
    #[tabled(rename = "Sharpe")]
    sharpe: String,
    #[tabled(rename = "Trades")]
    trades: usize,
}

impl From<&RankedPair> for RankRow {
    fn from(r: &RankedPair) -> Self {
        Self {
            rank: r.rank,
            horizon: r.horizon.clone(),
            pair: r.pair.to_string(),
            score: format!("{:.2}", r.score),
            total_return: format!("{:+.2}%", r.total_return * 100.0),
            sharpe: format!("{:.2}", r.sharpe),
            trades: r.trade_count,
        }
    }
}

#[derive(Tabled)]
struct HorizonRow {
    #[tabled(rename = "Horizon")]
    horizon: String,
    #[tabled(rename = "Candidates")]
    candidates: usize,
    #[tabled(rename = "Cointegrated")]
    cointegrated: usize,
    #[tabled(rename = "Admitted")]
    admitted: usize,
    #[tabled(rename = "Scored")]
    scored: usize,
    #[tabled(rename = "Excluded")]
    excluded: usize,
    #[tabled(rename = "Avg score")]
    average_score: String,
    #[tabled(rename = "Best")]
    best: String,
}

impl From<&HorizonSummary> for HorizonRow {
    fn from(h: &HorizonSummary) -> Self {
        Self {
            horizon: h.horizon.clone(),
            candidates: h.candidates,
            cointegrated: h.cointegrated,
            admitted: h.admitted,
            scored: h.scored,
            excluded: h.excluded,
            average_score: format!("{:.2}", h.average_score),
            best: h
                .best
                .as_ref()
                .map(|b| format!("{} ({:.2})", b.pair, b.score))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn horizon_table(report: &AnalysisReport) -> String {
    let rows: Vec<HorizonRow> = report.summary.horizons.iter().map(HorizonRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn ranking_table(pairs: &[RankedPair]) -> String {
    let rows: Vec<RankRow> = pairs.iter().map(RankRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_report(report: &AnalysisReport) {
    println!(
        "{} symbols analysed ({} missing), method: {}",
        report.symbols_analyzed,
        report.missing_symbols.len(),
        report.method
    );
    println!("{}", horizon_table(report));
    if report.summary.top_pairs.is_empty() {
        println!("No pair passed every filter.");
    } else {
        println!("\nTop pairs across horizons:");
        println!("{}", ranking_table(&report.summary.top_pairs));
    }
}

pub fn write_json(report: &AnalysisReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pair_core::PairKey;

    #[test]
    fn test_ranking_table_formats_rows() {
        let pairs = vec![RankedPair {
            rank: 1,
            horizon: "1Y".into(),
            pair: PairKey::new("PEP", "KO"),
            score: 71.256,
            trade_count: 4,
            total_return: 0.0812,
            sharpe: 1.4,
        }];
        let table = ranking_table(&pairs);
        assert!(table.contains("KO-PEP"));
        assert!(table.contains("71.26"));
        assert!(table.contains("+8.12%"));
    }
}
