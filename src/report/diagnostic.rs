use super::layout::{
    Align, Layout, TextMeasure, AMBER, CONTINUE_TOP_MM, GREEN, MUTED, RED, RULE,
    SAFE_BOTTOM_MM, SAFE_TOP_MM, TEXT_DARK,
};
use crate::catalog::{self, CategoryId, Interpretation};
use crate::scoring::{is_warning, CategoryScores};
use crate::session::{format_audit_number, ContactInfo};
use chrono::{Days, NaiveDate};

const PROMO_DAYS: u64 = 10;

const DEEP_AUDIT_TEXT: &str = "Наш эксперт свяжется с вами в течение 24 часов для согласования деталей бесплатного аудита 2-х процессов вашей компании с конкретным планом внедрения ИИ.";
const OFFER_TEXT: &str =
    "Мы предлагаем бесплатный аудит 2-х процессов вашей компании с конкретным планом внедрения ИИ.";
const OFFER_NOTE: &str = "Вы можете обратиться к нам или в другую компанию с этой информацией.";
const OFFER_PRICE: &str = "Углубленная диагностика 2-х процессов обычно стоит 1500 рублей.";
const OFFER_CALL: &str =
    "📞 Свяжитесь с нами по контактам ниже, чтобы воспользоваться бесплатной углубленной диагностикой.";

#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub audit_number: i64,
    pub completed_on: NaiveDate,
    pub generated_on: NaiveDate,
    pub total_score: u8,
    pub category_scores: CategoryScores,
    pub interpretation: Interpretation,
    pub contact: ContactInfo,
}

fn score_color(total: u8) -> super::layout::Rgb {
    match total {
        0..=8 => RED,
        9..=14 => AMBER,
        _ => GREEN,
    }
}

fn ru_date(d: NaiveDate) -> String {
    d.format("%d.%m.%Y").to_string()
}

/// Lays out the full report. Page 1 holds the summary and as many
/// recommendations as fit; the category analysis starts on page 2.
pub fn compose<M: TextMeasure + ?Sized>(layout: &mut Layout<'_, M>, r: &DiagnosticReport) {
    let audit = format_audit_number(r.audit_number);
    let color = score_color(r.total_score);

    layout.text(&format!("№ {}", audit), 30.0, 45.0, 14.0, TEXT_DARK, Align::Left);
    layout.text(&ru_date(r.completed_on), 135.0, 45.0, 11.0, TEXT_DARK, Align::Left);
    layout.text("РЕЗУЛЬТАТЫ ДИАГНОСТИКИ", 30.0, SAFE_TOP_MM + 10.0, 18.0, TEXT_DARK, Align::Left);
    layout.text("из 20 баллов", 155.0, SAFE_TOP_MM + 10.0, 11.0, MUTED, Align::Right);
    layout.text(&r.total_score.to_string(), 105.0, SAFE_TOP_MM + 28.0, 48.0, color, Align::Center);
    layout.text(
        &format!("{} {}", r.interpretation.emoji, r.interpretation.title),
        30.0,
        SAFE_TOP_MM + 42.0,
        16.0,
        color,
        Align::Left,
    );
    layout.paragraph(
        r.interpretation.description,
        30.0,
        SAFE_TOP_MM + 53.0,
        150.0,
        10.0,
        5.0,
        MUTED,
    );

    let rec_title_y = SAFE_TOP_MM + 80.0;
    layout.text("Рекомендации:", 30.0, rec_title_y, 12.0, TEXT_DARK, Align::Left);

    let mut y = rec_title_y + 10.0;
    let mut overflow: Vec<String> = Vec::new();
    for (i, rec) in r.interpretation.recommendations.iter().enumerate() {
        let numbered = format!("{}. {}", i + 1, rec);
        if !overflow.is_empty() {
            overflow.push(numbered);
            continue;
        }
        let lines = layout.wrap(&numbered, 150.0, 9.0);
        let block = lines.len() as f32 * 4.5 + 2.0;
        if y + block > SAFE_BOTTOM_MM {
            overflow.push(numbered);
            continue;
        }
        for (k, line) in lines.iter().enumerate() {
            layout.text(line, 35.0, y + k as f32 * 4.5, 9.0, MUTED, Align::Left);
        }
        y += block;
    }

    layout.new_page();
    layout.text("ДЕТАЛЬНЫЙ АНАЛИЗ ПО КАТЕГОРИЯМ", 105.0, SAFE_TOP_MM, 16.0, TEXT_DARK, Align::Center);
    layout.text(
        &format!("Аудит № {}", audit),
        105.0,
        SAFE_TOP_MM + 10.0,
        10.0,
        MUTED,
        Align::Center,
    );
    let mut y = SAFE_TOP_MM + 20.0;

    if !overflow.is_empty() {
        y = layout.ensure_space(y, 15.0);
        layout.text("Рекомендации (продолжение):", 25.0, y, 12.0, TEXT_DARK, Align::Left);
        y += 8.0;
        for rec in &overflow {
            y = layout.ensure_space(y, 25.0);
            y = layout.paragraph(rec, 30.0, y, 150.0, 9.0, 4.0, MUTED) + 3.0;
        }
        y += 5.0;
    }

    let scores = &r.category_scores;
    y = layout.ensure_space(y, 15.0);
    layout.text(
        &format!("Средний балл по категориям: {} / 5", scores.average()),
        25.0,
        y,
        10.0,
        MUTED,
        Align::Left,
    );
    y += 10.0;

    let (weak_id, weak_score) = scores.weakest();
    if let Some(d) = catalog::category_detail(weak_id) {
        y = layout.ensure_space(y, 20.0);
        let text = format!("Основной риск: {} {} — {} / 5.", d.emoji, d.name, weak_score);
        y = layout.paragraph(&text, 30.0, y, 160.0, 9.0, 4.0, RED) + 4.0;
    }
    let (strong_id, strong_score) = scores.strongest();
    if let Some(d) = catalog::category_detail(strong_id) {
        y = layout.ensure_space(y, 20.0);
        let text = format!("Сильная сторона: {} {} — {} / 5.", d.emoji, d.name, strong_score);
        y = layout.paragraph(&text, 30.0, y, 160.0, 9.0, 4.0, GREEN) + 6.0;
    }

    y = layout.ensure_space(y, 20.0);
    layout.text("ДЕТАЛЬНЫЙ АНАЛИЗ ПО ОБЛАСТЯМ", 25.0, y, 12.0, TEXT_DARK, Align::Left);
    y += 8.0;

    for (i, id) in CategoryId::ALL.iter().enumerate() {
        let Some(d) = catalog::category_detail(*id) else {
            continue;
        };
        let score = scores.get(*id);
        let warn = is_warning(*id, score);

        y = layout.ensure_space(y, 30.0);
        layout.text(&format!("{} {}", d.emoji, d.name), 25.0, y, 14.0, TEXT_DARK, Align::Left);
        layout.text(
            &format!("{} / 5", score),
            180.0,
            y,
            12.0,
            if warn { RED } else { GREEN },
            Align::Right,
        );
        y += 8.0;
        y = layout.paragraph(d.full_description, 25.0, y, 160.0, 9.0, 4.0, TEXT_DARK) + 3.0;

        if warn {
            y = layout.ensure_space(y, 25.0);
            layout.text(&format!("⚠️ {}:", d.warning_text), 25.0, y, 10.0, AMBER, Align::Left);
            y += 5.0;
            y = layout.paragraph(d.detailed_warning, 25.0, y, 160.0, 9.0, 4.0, MUTED) + 5.0;
        } else {
            y += 3.0;
        }

        if i + 1 < CategoryId::ALL.len() {
            y = layout.ensure_space(y, 5.0);
            layout.line(25.0, y, 185.0, y, 0.5, RULE);
            y += 5.0;
        }
    }

    let contact = &r.contact;
    if contact.wants_deep_audit {
        y = layout.ensure_space(y + 10.0, 20.0);
        layout.text("СЛЕДУЮЩИЕ ШАГИ", 25.0, y, 14.0, TEXT_DARK, Align::Left);
        y += 8.0;
        y = layout.ensure_space(y, 25.0);
        layout.text("✅ Запрошена углубленная диагностика", 25.0, y, 11.0, GREEN, Align::Left);
        y += 5.0;
        y = layout.paragraph(DEEP_AUDIT_TEXT, 25.0, y, 160.0, 9.0, 4.0, MUTED) + 10.0;
    }

    y = layout.ensure_space(y + 10.0, 45.0);
    layout.text("Контактная информация:", 25.0, y, 12.0, TEXT_DARK, Align::Left);
    let details = [
        &contact.name,
        &contact.company,
        &contact.phone,
        &contact.email,
        &contact.telegram,
    ];
    for value in details.iter().filter(|v| !v.is_empty()) {
        y += 8.0;
        y = layout.ensure_space(y, 0.0);
        layout.text(value, 30.0, y, 10.0, MUTED, Align::Left);
    }

    if contact.wants_deep_audit {
        y += 8.0;
        y = layout.ensure_space(y, 0.0);
        layout.text("✓ Запрошен углубленный аудит", 30.0, y, 10.0, GREEN, Align::Left);
    } else {
        special_offer(layout, y + 15.0, r.generated_on);
    }
}

fn special_offer<M: TextMeasure + ?Sized>(layout: &mut Layout<'_, M>, y_mm: f32, today: NaiveDate) {
    let mut y = layout.ensure_space(y_mm, 80.0);
    if y == CONTINUE_TOP_MM {
        // Leave room for the frame above the first line.
        y += 5.0;
    }
    let deadline = today.checked_add_days(Days::new(PROMO_DAYS)).unwrap_or(today);

    layout.rect(20.0, y - 5.0, 165.0, 85.0, 2.0, AMBER);
    layout.text("💡 Хотите углубленную диагностику?", 25.0, y, 12.0, AMBER, Align::Left);
    y += 10.0;
    y = layout.paragraph(OFFER_TEXT, 25.0, y, 155.0, 9.0, 4.0, TEXT_DARK) + 5.0;
    y = layout.paragraph(OFFER_NOTE, 25.0, y, 155.0, 9.0, 4.0, MUTED) + 4.0;
    layout.text("⏰ СПЕЦИАЛЬНОЕ ПРЕДЛОЖЕНИЕ", 25.0, y, 11.0, AMBER, Align::Left);
    y += 7.0;
    y = layout.paragraph(OFFER_PRICE, 25.0, y, 155.0, 9.0, 4.0, TEXT_DARK) + 2.0;
    layout.text("Для вас — БЕСПЛАТНО!", 25.0, y, 11.0, GREEN, Align::Left);
    y += 8.0;
    layout.text(
        &format!("Акция действует до: {}", ru_date(deadline)),
        25.0,
        y,
        10.0,
        RED,
        Align::Left,
    );
    y += 10.0;
    layout.paragraph(OFFER_CALL, 25.0, y, 155.0, 9.0, 4.0, MUTED);
}
