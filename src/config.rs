use chrono::NaiveTime;

/// Fixed slot length for every bookable window, in minutes.
pub const SLOT_MINUTES: i64 = 20;

/// One contiguous bookable window within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    pub opens: NaiveTime,
    pub closes: NaiveTime,
}

/// Daily operating hours: two disjoint windows (morning, afternoon) in the
/// fixed operating timezone. Configuration, not runtime data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    pub morning: OperatingWindow,
    pub afternoon: OperatingWindow,
    pub slot_minutes: i64,
}

impl Default for OperatingHours {
    fn default() -> Self {
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).expect("valid operating time");
        Self {
            morning: OperatingWindow { opens: hm(9, 0), closes: hm(13, 0) },
            afternoon: OperatingWindow { opens: hm(14, 0), closes: hm(19, 0) },
            slot_minutes: SLOT_MINUTES,
        }
    }
}

impl OperatingHours {
    pub fn windows(&self) -> [OperatingWindow; 2] {
        [self.morning, self.afternoon]
    }
}

/// Leave-manager policy knobs. `single_pending` is not a hard invariant of
/// the data model; the administrative collaborator may relax it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeavePolicy {
    /// Reject a new leave application while the doctor has one pending.
    pub single_pending: bool,
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self { single_pending: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hours_cover_both_windows() {
        let hours = OperatingHours::default();
        assert_eq!(hours.morning.opens, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(hours.morning.closes, NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        assert_eq!(hours.afternoon.opens, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(hours.afternoon.closes, NaiveTime::from_hms_opt(19, 0, 0).unwrap());
        assert_eq!(hours.slot_minutes, 20);
    }

    #[test]
    fn windows_are_disjoint() {
        let hours = OperatingHours::default();
        assert!(hours.morning.closes <= hours.afternoon.opens);
    }

    #[test]
    fn default_policy_is_single_pending() {
        assert!(LeavePolicy::default().single_pending);
    }
}
