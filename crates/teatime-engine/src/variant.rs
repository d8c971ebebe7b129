//! Variant strategies: one per known UI layout of the target site
//!
//! The site renders the same logical task with different markup depending on
//! entry path: a calendar-grid tee sheet (per-slot forms) or a booking list
//! (time cards with book buttons). Each layout gets one [`VariantStrategy`]
//! that knows how to recognize itself, read slots off the page, and act on
//! them. Downstream components never branch on the variant.
//!
//! Structural signals and selectors are implementation details of the live
//! site and are expected to drift; they are kept as constants at the top of
//! each strategy so revalidating against the site touches nothing else.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use teatime_core::{parse_clock_time, PageVariant, Result, Slot, SlotLocator, TeatimeError};
use teatime_browser::page::{js_quote, Page};
use std::time::Duration;
use tracing::{debug, warn};

/// Booking form / modal that appears once a slot is selected
const BOOKING_FORM: &str = "form, [role='dialog'], [class*='modal']";
/// Confirmation banner after a successful submission
const CONFIRMATION: &str = "[class*='success'], [class*='confirmation']";
/// How long to allow the booking form to appear after selecting a slot
const BOOKING_FORM_WAIT: Duration = Duration::from_secs(5);

/// Strategy for one known page variant.
///
/// `extract_slots` and the step operations assume the classifier already
/// matched this strategy; they still re-check their own structural markers
/// (a positive classification does not survive a partial page load).
#[async_trait]
pub trait VariantStrategy: Send + Sync {
    /// The variant this strategy recognizes and drives.
    fn variant(&self) -> PageVariant;

    /// Number of independent structural signals present on the current page.
    /// The classifier requires a quorum of two.
    async fn matched_signals(&self, page: &dyn Page) -> u32;

    /// Read every bookable slot off the current view.
    async fn extract_slots(&self, page: &dyn Page, day: NaiveDate) -> Result<Vec<Slot>>;

    /// Act on a slot so the booking form appears.
    async fn select_slot(&self, page: &dyn Page, slot: &Slot) -> Result<()>;

    /// Verify the selection took: the booking form is on screen.
    async fn selection_visible(&self, page: &dyn Page) -> Result<bool>;

    /// Set the player count on the booking form.
    async fn set_players(&self, page: &dyn Page, players: u8) -> Result<()>;

    /// Verify the player field reads back the requested count.
    async fn players_applied(&self, page: &dyn Page, players: u8) -> Result<bool>;

    /// Submit the reservation (the irreversible step).
    async fn submit(&self, page: &dyn Page) -> Result<()>;

    /// Verify the site acknowledged the reservation.
    async fn confirmation_visible(&self, page: &dyn Page) -> Result<bool>;
}

/// Slot payload as extracted in the page context.
#[derive(Debug, Deserialize)]
struct RawSlot {
    time: String,
    capacity: u8,
    open_seats: u8,
    locator: SlotLocator,
}

/// Convert raw payloads to [`Slot`]s: parse times, drop full slots.
fn into_slots(raw: Vec<RawSlot>, day: NaiveDate) -> Vec<Slot> {
    raw.into_iter()
        .filter_map(|r| {
            let time = match parse_clock_time(&r.time) {
                Some(time) => time,
                None => {
                    warn!("Skipping slot with unparseable time: {:?}", r.time);
                    return None;
                }
            };
            if r.open_seats == 0 {
                return None;
            }
            Some(Slot {
                day,
                time,
                capacity: r.capacity,
                open_seats: r.open_seats,
                locator: r.locator,
            })
        })
        .collect()
}

// Booking-form steps are identical on both variants once a slot is selected:
// the site opens the same form/modal either way.

async fn form_set_players(page: &dyn Page, players: u8) -> Result<()> {
    let script = format!(
        r#"(() => {{
    const scope = document.querySelector("{form}") || document;
    const field = scope.querySelector("select, [class*='player'], input[type='number']");
    if (!field) return false;
    field.value = '{players}';
    field.dispatchEvent(new Event('input', {{ bubbles: true }}));
    field.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
        form = BOOKING_FORM,
        players = players
    );
    let applied = page.evaluate(&script).await?;
    if applied.as_bool() == Some(true) {
        Ok(())
    } else {
        Err(TeatimeError::ElementNotFound(
            "player count field on booking form".to_string(),
        ))
    }
}

async fn form_players_applied(page: &dyn Page, players: u8) -> Result<bool> {
    let script = format!(
        r#"(() => {{
    const scope = document.querySelector("{form}") || document;
    const field = scope.querySelector("select, [class*='player'], input[type='number']");
    return field ? field.value === '{players}' : false;
}})()"#,
        form = BOOKING_FORM,
        players = players
    );
    let value = page.evaluate(&script).await?;
    Ok(value.as_bool() == Some(true))
}

async fn form_submit(page: &dyn Page) -> Result<()> {
    let script = format!(
        r#"(() => {{
    const scope = document.querySelector("{form}") || document;
    let btn = scope.querySelector("button[type='submit'], [type='submit']");
    if (!btn) {{
        btn = Array.from(scope.querySelectorAll('button'))
            .find((b) => /book|reserve|submit/i.test(b.textContent || ''));
    }}
    if (!btn) return false;
    btn.click();
    return true;
}})()"#,
        form = BOOKING_FORM
    );
    let clicked = page.evaluate(&script).await?;
    if clicked.as_bool() == Some(true) {
        Ok(())
    } else {
        Err(TeatimeError::ElementNotFound(
            "submit button on booking form".to_string(),
        ))
    }
}

async fn form_selection_visible(page: &dyn Page) -> Result<bool> {
    // Modal rendering lags the click; give it a moment before judging.
    let _ = page.wait_for(BOOKING_FORM, BOOKING_FORM_WAIT).await;
    Ok(page.element_exists(BOOKING_FORM).await)
}

async fn form_confirmation_visible(page: &dyn Page) -> Result<bool> {
    Ok(page.element_exists(CONFIRMATION).await)
}

/// Calendar-grid tee sheet: one form per slot row, availability readable
/// from the per-seat boxes.
pub struct TeeSheetStrategy;

impl TeeSheetStrategy {
    /// URL fragment of the tee-sheet route
    const URL_SIGNAL: &'static str = "TeeSheet/view";
    /// Per-slot forms
    const FORM_MARKER: &'static str = "form[id*='TeeSheetForm']";
    /// Time cell inside each form
    const TIME_MARKER: &'static str = ".slotTime";

    const EXTRACT_SCRIPT: &'static str = r#"
(() => {
    const out = [];
    document.querySelectorAll("form[id*='TeeSheetForm']").forEach((form) => {
        const timeEl = form.querySelector('.slotTime b') || form.querySelector('.slotTime');
        if (!timeEl || !form.id) return;
        const locator = { kind: 'form', id: form.id };
        const boxes = Array.from(form.querySelectorAll('.slot-box'));
        if (boxes.length === 0) {
            const bookable = !!form.querySelector("button[type='submit'], [type='submit']");
            out.push({
                time: timeEl.textContent.trim(),
                capacity: 4,
                open_seats: bookable ? 4 : 0,
                locator
            });
            return;
        }
        const open = boxes.filter((box) =>
            !box.classList.contains('Green') &&
            !box.classList.contains('Grey') &&
            !box.classList.contains('Event') &&
            !box.textContent.trim()).length;
        out.push({
            time: timeEl.textContent.trim(),
            capacity: boxes.length,
            open_seats: open,
            locator
        });
    });
    return out;
})()
"#;
}

#[async_trait]
impl VariantStrategy for TeeSheetStrategy {
    fn variant(&self) -> PageVariant {
        PageVariant::TeeSheet
    }

    async fn matched_signals(&self, page: &dyn Page) -> u32 {
        let mut signals = 0;
        if let Ok(url) = page.current_url().await {
            if url.contains(Self::URL_SIGNAL) {
                signals += 1;
            }
        }
        if page.element_exists(Self::FORM_MARKER).await {
            signals += 1;
        }
        if page.element_exists(Self::TIME_MARKER).await {
            signals += 1;
        }
        signals
    }

    async fn extract_slots(&self, page: &dyn Page, day: NaiveDate) -> Result<Vec<Slot>> {
        if !page.element_exists(Self::FORM_MARKER).await {
            return Err(TeatimeError::Extraction(
                "tee sheet classified but no slot forms present".to_string(),
            ));
        }

        let value = page.evaluate(Self::EXTRACT_SCRIPT).await?;
        let raw: Vec<RawSlot> = serde_json::from_value(value)
            .map_err(|e| TeatimeError::Extraction(format!("malformed slot payload: {}", e)))?;
        debug!("Tee sheet extraction found {} slot rows", raw.len());
        Ok(into_slots(raw, day))
    }

    async fn select_slot(&self, page: &dyn Page, slot: &Slot) -> Result<()> {
        let SlotLocator::Form { id } = &slot.locator else {
            return Err(TeatimeError::Other(
                "tee sheet slot carries a non-form locator".to_string(),
            ));
        };
        let script = format!(
            r#"(() => {{
    const form = document.getElementById({id});
    if (!form) return false;
    const btn = form.querySelector("button[type='submit'], [type='submit']");
    if (btn) {{ btn.click(); }} else {{ form.submit(); }}
    return true;
}})()"#,
            id = js_quote(id)
        );
        let selected = page.evaluate(&script).await?;
        if selected.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(TeatimeError::ElementNotFound(format!("form#{}", id)))
        }
    }

    async fn selection_visible(&self, page: &dyn Page) -> Result<bool> {
        form_selection_visible(page).await
    }

    async fn set_players(&self, page: &dyn Page, players: u8) -> Result<()> {
        form_set_players(page, players).await
    }

    async fn players_applied(&self, page: &dyn Page, players: u8) -> Result<bool> {
        form_players_applied(page, players).await
    }

    async fn submit(&self, page: &dyn Page) -> Result<()> {
        form_submit(page).await
    }

    async fn confirmation_visible(&self, page: &dyn Page) -> Result<bool> {
        form_confirmation_visible(page).await
    }
}

/// Booking list: time cards with a book/reserve button each. Buttons get
/// tagged during extraction so the driver can address the exact element the
/// extractor saw.
pub struct BookingListStrategy;

impl BookingListStrategy {
    /// URL fragment of the booking routes
    const URL_SIGNAL: &'static str = "TeeTimes/";
    /// Time cards/panels
    const CARD_MARKER: &'static str = ".teetime-card, .time-slot, [class*='tee-time']";

    const BOOK_BUTTON_SIGNAL: &'static str = r#"
(() => Array.from(document.querySelectorAll('button, a'))
    .some((el) => /book|reserve/i.test(el.textContent || '')))()
"#;

    const EXTRACT_SCRIPT: &'static str = r#"
(() => {
    const out = [];
    const timeRe = /\d{1,2}:\d{2}\s*[AP]M/i;
    let tagged = 0;
    document.querySelectorAll(".teetime-card, .time-slot, [class*='tee-time'], [class*='slot']")
        .forEach((card) => {
            const text = card.textContent || '';
            const match = text.match(timeRe);
            if (!match) return;
            const button = Array.from(card.querySelectorAll('button, a'))
                .find((el) => /book|reserve|select/i.test(el.textContent || ''));
            if (!button) return;
            const tag = 'slot-' + tagged++;
            button.setAttribute('data-teatime-slot', tag);
            const seats = (text.match(/(\d+)\s*(?:spots?|players?|golfers?)/i) || [])[1];
            out.push({
                time: match[0],
                capacity: 4,
                open_seats: seats ? Math.min(4, parseInt(seats, 10)) : 4,
                locator: { kind: 'element', selector: "[data-teatime-slot='" + tag + "']" }
            });
        });
    return out;
})()
"#;
}

#[async_trait]
impl VariantStrategy for BookingListStrategy {
    fn variant(&self) -> PageVariant {
        PageVariant::BookingList
    }

    async fn matched_signals(&self, page: &dyn Page) -> u32 {
        let mut signals = 0;
        if let Ok(url) = page.current_url().await {
            if url.contains(Self::URL_SIGNAL) {
                signals += 1;
            }
        }
        if page.element_exists(Self::CARD_MARKER).await {
            signals += 1;
        }
        if let Ok(value) = page.evaluate(Self::BOOK_BUTTON_SIGNAL).await {
            if value.as_bool() == Some(true) {
                signals += 1;
            }
        }
        signals
    }

    async fn extract_slots(&self, page: &dyn Page, day: NaiveDate) -> Result<Vec<Slot>> {
        if !page.element_exists(Self::CARD_MARKER).await {
            return Err(TeatimeError::Extraction(
                "booking list classified but no time cards present".to_string(),
            ));
        }

        let value = page.evaluate(Self::EXTRACT_SCRIPT).await?;
        let raw: Vec<RawSlot> = serde_json::from_value(value)
            .map_err(|e| TeatimeError::Extraction(format!("malformed slot payload: {}", e)))?;
        debug!("Booking list extraction found {} cards", raw.len());
        Ok(into_slots(raw, day))
    }

    async fn select_slot(&self, page: &dyn Page, slot: &Slot) -> Result<()> {
        let SlotLocator::Element { selector } = &slot.locator else {
            return Err(TeatimeError::Other(
                "booking list slot carries a non-element locator".to_string(),
            ));
        };
        page.click(selector).await
    }

    async fn selection_visible(&self, page: &dyn Page) -> Result<bool> {
        form_selection_visible(page).await
    }

    async fn set_players(&self, page: &dyn Page, players: u8) -> Result<()> {
        form_set_players(page, players).await
    }

    async fn players_applied(&self, page: &dyn Page, players: u8) -> Result<bool> {
        form_players_applied(page, players).await
    }

    async fn submit(&self, page: &dyn Page) -> Result<()> {
        form_submit(page).await
    }

    async fn confirmation_visible(&self, page: &dyn Page) -> Result<bool> {
        form_confirmation_visible(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fake page answering evaluate calls by matching on script content.
    struct FakeVariantPage {
        url: String,
        /// selector substrings that should report elements present
        present: Vec<&'static str>,
        extract_payload: serde_json::Value,
        clicked: Mutex<Vec<String>>,
    }

    impl FakeVariantPage {
        fn tee_sheet(payload: serde_json::Value) -> Self {
            Self {
                url: "https://club.example.com/TeeSheet/view/abc/sheet?date=2026-08-16".into(),
                present: vec!["TeeSheetForm", ".slotTime"],
                extract_payload: payload,
                clicked: Mutex::new(Vec::new()),
            }
        }

        fn booking_list(payload: serde_json::Value) -> Self {
            Self {
                url: "https://club.example.com/TeeTimes/view/abc/slots".into(),
                present: vec!["teetime-card"],
                extract_payload: payload,
                clicked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Page for FakeVariantPage {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn reload(&self) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok(self.url.clone())
        }
        async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
            if script.contains("forEach") {
                return Ok(self.extract_payload.clone());
            }
            // book-button signal probe
            Ok(serde_json::json!(true))
        }
        async fn click(&self, selector: &str) -> Result<()> {
            self.clicked.lock().unwrap().push(selector.to_string());
            Ok(())
        }
        async fn fill(&self, _selector: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn count(&self, selector: &str) -> Result<u64> {
            let hit = self.present.iter().any(|p| selector.contains(p));
            Ok(u64::from(hit))
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 16).unwrap()
    }

    #[tokio::test]
    async fn tee_sheet_signals_reach_quorum() {
        let page = FakeVariantPage::tee_sheet(serde_json::json!([]));
        assert!(TeeSheetStrategy.matched_signals(&page).await >= 2);
        // A login page trips neither the URL nor the DOM signals
        let login = FakeVariantPage {
            url: "https://club.example.com/login?clubid=1".into(),
            present: vec![],
            extract_payload: serde_json::json!([]),
            clicked: Mutex::new(Vec::new()),
        };
        assert_eq!(TeeSheetStrategy.matched_signals(&login).await, 0);
    }

    #[tokio::test]
    async fn tee_sheet_extracts_open_slots_only() {
        let payload = serde_json::json!([
            { "time": "7:30 AM", "capacity": 4, "open_seats": 4,
              "locator": { "kind": "form", "id": "TeeSheetForm0" } },
            { "time": "8:00 AM", "capacity": 4, "open_seats": 0,
              "locator": { "kind": "form", "id": "TeeSheetForm1" } },
            { "time": "not a time", "capacity": 4, "open_seats": 4,
              "locator": { "kind": "form", "id": "TeeSheetForm2" } },
        ]);
        let page = FakeVariantPage::tee_sheet(payload);

        let slots = TeeSheetStrategy.extract_slots(&page, day()).await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].time, chrono::NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(
            slots[0].locator,
            SlotLocator::Form { id: "TeeSheetForm0".into() }
        );
    }

    #[tokio::test]
    async fn missing_markers_after_classification_is_extraction_error() {
        // Claims tee-sheet URL but renders none of the grid markers
        let page = FakeVariantPage {
            url: "https://club.example.com/TeeSheet/view/abc/sheet".into(),
            present: vec![],
            extract_payload: serde_json::json!([]),
            clicked: Mutex::new(Vec::new()),
        };

        let err = TeeSheetStrategy.extract_slots(&page, day()).await.unwrap_err();
        assert!(matches!(err, TeatimeError::Extraction(_)));
        // Extraction failures are retried by the caller with a reload
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn booking_list_extracts_tagged_buttons() {
        let payload = serde_json::json!([
            { "time": "2:00 PM", "capacity": 4, "open_seats": 2,
              "locator": { "kind": "element", "selector": "[data-teatime-slot='slot-0']" } },
        ]);
        let page = FakeVariantPage::booking_list(payload);

        let slots = BookingListStrategy.extract_slots(&page, day()).await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].open_seats, 2);

        BookingListStrategy
            .select_slot(&page, &slots[0])
            .await
            .unwrap();
        assert_eq!(
            page.clicked.lock().unwrap().as_slice(),
            ["[data-teatime-slot='slot-0']"]
        );
    }

    #[tokio::test]
    async fn locator_mismatch_is_rejected() {
        let page = FakeVariantPage::tee_sheet(serde_json::json!([]));
        let slot = Slot {
            day: day(),
            time: chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            capacity: 4,
            open_seats: 4,
            locator: SlotLocator::Element { selector: "button".into() },
        };
        assert!(TeeSheetStrategy.select_slot(&page, &slot).await.is_err());
    }
}
