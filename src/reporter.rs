use std::fmt::Write;

use chrono::NaiveDate;

use crate::LIST_LIMIT;
use crate::types::{Lot, PriceHistory};

/// Aggregate of one day's observed sale prices.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Summarize each day of `history`, oldest first. Days without prices are skipped.
pub fn daily_summaries(history: &PriceHistory) -> Vec<DailySummary> {
    history
        .iter()
        .filter(|(_, prices)| !prices.is_empty())
        .map(|(date, prices)| {
            let sum: f64 = prices.iter().sum();
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            DailySummary {
                date: *date,
                avg: sum / prices.len() as f64,
                min,
                max,
                count: prices.len(),
            }
        })
        .collect()
}

/// Round to whole rubles and group thousands with commas: `1234567.6` → `1,234,568`.
pub fn format_rub(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn history_message(item_name: &str, summaries: &[DailySummary]) -> String {
    let mut msg = format!("📈 История цен для предмета:\n📦 {item_name}\n\n");
    for s in summaries {
        let _ = write!(
            msg,
            "📅 {}:\n  Средняя: {} ₽\n  Мин: {} ₽ | Макс: {} ₽\n  Лотов: {}\n\n",
            s.date.format("%d.%m.%Y"),
            format_rub(s.avg),
            format_rub(s.min),
            format_rub(s.max),
            s.count,
        );
    }
    msg
}

/// Active lots listing; only the first [`LIST_LIMIT`] lots are itemized.
pub fn lots_message(item_name: &str, lots: &[Lot]) -> String {
    let mut msg = format!(
        "🛒 Активные лоты для предмета:\n📦 {item_name}\n\nВсего лотов: {}\n\n",
        lots.len()
    );
    for (i, lot) in lots.iter().take(LIST_LIMIT).enumerate() {
        let _ = write!(msg, "{}. 💰 Ставка: {} ₽", i + 1, format_rub(lot.price));
        if let Some(buyout) = lot.buyout_price {
            let _ = write!(msg, " | 🏷️ Выкуп: {} ₽", format_rub(buyout));
        }
        let _ = writeln!(msg, " | Кол-во: {}", lot.amount);
    }
    msg
}

/// Split `text` into chunks of at most `max_chars` characters.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
