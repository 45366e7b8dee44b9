use chrono::{Duration, NaiveTime};
use serde::Serialize;

/// A half-open wall-clock interval `[start, end)` within one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// Returns `None` unless `start < end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Touching intervals (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Daily opening hours plus the slot policy used for availability reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    pub opening: NaiveTime,
    pub closing: NaiveTime,
    pub slot_minutes: u32,
    /// A trailing remainder shorter than this is merged into the previous slot.
    pub min_slot_minutes: u32,
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            opening: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            closing: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            slot_minutes: 60,
            min_slot_minutes: 30,
        }
    }
}

impl OperatingWindow {
    pub fn new(
        opening: NaiveTime,
        closing: NaiveTime,
        slot_minutes: u32,
        min_slot_minutes: u32,
    ) -> anyhow::Result<Self> {
        if opening >= closing {
            return Err(anyhow::anyhow!(
                "opening time {opening} must be before closing time {closing}"
            ));
        }
        if slot_minutes == 0 {
            return Err(anyhow::anyhow!("slot width must be at least one minute"));
        }
        Ok(Self {
            opening,
            closing,
            slot_minutes,
            min_slot_minutes,
        })
    }

    /// Consecutive slot boundaries tiling `[opening, closing)` exactly.
    pub fn slots(&self) -> Vec<TimeRange> {
        let total = (self.closing - self.opening).num_minutes();
        let width = i64::from(self.slot_minutes);

        let mut bounds: Vec<(i64, i64)> = Vec::new();
        let mut offset = 0;
        while offset < total {
            let end = (offset + width).min(total);
            bounds.push((offset, end));
            offset = end;
        }

        if bounds.len() > 1 {
            if let Some(&(start, end)) = bounds.last() {
                let len = end - start;
                if len < width && len < i64::from(self.min_slot_minutes) {
                    bounds.pop();
                    if let Some(previous) = bounds.last_mut() {
                        previous.1 = end;
                    }
                }
            }
        }

        bounds
            .into_iter()
            .map(|(start, end)| TimeRange {
                start: self.opening + Duration::minutes(start),
                end: self.opening + Duration::minutes(end),
            })
            .collect()
    }

    /// Tags every slot of the window with whether it is free of `busy` intervals.
    pub fn day_slots(&self, busy: &[TimeRange]) -> Vec<Slot> {
        self.slots()
            .into_iter()
            .map(|slot| Slot {
                start_time: slot.start,
                end_time: slot.end,
                is_available: !busy.iter().any(|b| b.overlaps(&slot)),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

/// Serde helpers for minute-resolution wall-clock times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::Serializer;

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(t(start), t(end)).unwrap()
    }

    fn window(open: &str, close: &str, width: u32, min: u32) -> OperatingWindow {
        OperatingWindow::new(t(open), t(close), width, min).unwrap()
    }

    fn assert_tiles(w: &OperatingWindow, slots: &[TimeRange]) {
        assert!(!slots.is_empty());
        assert_eq!(slots[0].start, w.opening);
        assert_eq!(slots[slots.len() - 1].end, w.closing);
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_degenerate_range_rejected() {
        assert!(TimeRange::new(t("10:00"), t("10:00")).is_none());
        assert!(TimeRange::new(t("11:00"), t("10:00")).is_none());
    }

    #[test]
    fn test_touching_ranges_do_not_overlap() {
        assert!(!range("09:00", "10:00").overlaps(&range("10:00", "11:00")));
        assert!(range("09:00", "10:00").overlaps(&range("09:30", "10:30")));
        assert!(range("09:00", "12:00").overlaps(&range("10:00", "11:00")));
    }

    #[test]
    fn test_default_window_has_fourteen_hourly_slots() {
        let w = OperatingWindow::default();
        let slots = w.slots();
        assert_eq!(slots.len(), 14);
        assert_eq!(slots[0], range("08:00", "09:00"));
        assert_eq!(slots[13], range("21:00", "22:00"));
        assert_tiles(&w, &slots);
    }

    #[test]
    fn test_trailing_remainder_kept_when_long_enough() {
        let w = window("08:00", "10:45", 60, 30);
        let slots = w.slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2], range("10:00", "10:45"));
        assert_tiles(&w, &slots);
    }

    #[test]
    fn test_short_trailing_remainder_merged() {
        let w = window("08:00", "10:15", 60, 30);
        let slots = w.slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1], range("09:00", "10:15"));
        assert_tiles(&w, &slots);
    }

    #[test]
    fn test_window_shorter_than_one_slot() {
        let w = window("08:00", "08:20", 60, 30);
        assert_eq!(w.slots(), vec![range("08:00", "08:20")]);
    }

    #[test]
    fn test_invalid_window_rejected() {
        assert!(OperatingWindow::new(t("22:00"), t("08:00"), 60, 30).is_err());
        assert!(OperatingWindow::new(t("08:00"), t("22:00"), 0, 30).is_err());
    }

    #[test]
    fn test_day_slots_marks_every_intersecting_slot() {
        let w = OperatingWindow::default();
        let slots = w.day_slots(&[range("10:30", "12:15")]);

        let busy: Vec<_> = slots
            .iter()
            .filter(|s| !s.is_available)
            .map(|s| s.start_time.format("%H:%M").to_string())
            .collect();
        assert_eq!(busy, vec!["10:00", "11:00", "12:00"]);
    }

    #[test]
    fn test_slot_serializes_as_hh_mm() {
        let slot = Slot {
            start_time: t("08:00"),
            end_time: t("09:00"),
            is_available: true,
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start_time": "08:00", "end_time": "09:00", "is_available": true})
        );
    }

    fn arb_range() -> impl Strategy<Value = TimeRange> {
        (0u32..1439, 1u32..720).prop_map(|(start, len)| {
            let end = (start + len).min(1439);
            TimeRange::new(
                NaiveTime::from_hms_opt(start / 60, start % 60, 0).unwrap(),
                NaiveTime::from_hms_opt(end / 60, end % 60, 0).unwrap(),
            )
            .unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_overlap_is_symmetric(a in arb_range(), b in arb_range()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn prop_overlap_is_reflexive(a in arb_range()) {
            prop_assert!(a.overlaps(&a));
        }

        #[test]
        fn prop_slots_tile_window(
            open in 0u32..1200,
            len in 1u32..239,
            width in 1u32..180,
            min in 0u32..90,
        ) {
            let opening = NaiveTime::from_hms_opt(open / 60, open % 60, 0).unwrap();
            let close = open + len;
            let closing = NaiveTime::from_hms_opt(close / 60, close % 60, 0).unwrap();
            let w = OperatingWindow::new(opening, closing, width, min).unwrap();
            let slots = w.slots();

            prop_assert_eq!(slots[0].start, opening);
            prop_assert_eq!(slots[slots.len() - 1].end, closing);
            let total: i64 = slots.iter().map(TimeRange::minutes).sum();
            prop_assert_eq!(total, i64::from(len));
            for pair in slots.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
                prop_assert!(!pair[0].overlaps(&pair[1]));
            }
        }

        #[test]
        fn prop_slot_available_iff_disjoint(busy in prop::collection::vec(arb_range(), 0..6)) {
            let w = OperatingWindow::default();
            for slot in w.day_slots(&busy) {
                let as_range = TimeRange::new(slot.start_time, slot.end_time).unwrap();
                let blocked = busy.iter().any(|b| b.overlaps(&as_range));
                prop_assert_eq!(slot.is_available, !blocked);
            }
        }
    }
}
