//! Due判定
//!
//! 現在時刻とチェック間隔から、今回のサイクルでプローブすべきチェックと、
//! 予定時刻を大きく過ぎてしまったチェック（overdue）を選び出す。

use chrono::{DateTime, Duration, Utc};

use crate::types::check::CheckRecord;

/// チェックがdueか
///
/// 無効化されたチェックは常に対象外。未チェックのものは即座にdue。
pub fn is_due(record: &CheckRecord, now: DateTime<Utc>) -> bool {
    if !record.spec.enabled {
        return false;
    }
    match record.last_checked_at {
        None => true,
        Some(last) => now - last >= record.spec.interval.as_chrono(),
    }
}

/// dueなチェックを選択
///
/// 予定時刻の古い順（未チェックが先頭）、同時刻は名前順。
pub fn select_due(now: DateTime<Utc>, checks: &[CheckRecord]) -> Vec<&CheckRecord> {
    let mut due: Vec<&CheckRecord> = checks.iter().filter(|c| is_due(c, now)).collect();
    due.sort_by(|a, b| {
        a.next_due_at()
            .cmp(&b.next_due_at())
            .then_with(|| a.spec.name.cmp(&b.spec.name))
    });
    due
}

/// 予定時刻からの遅延
///
/// 未チェック、または予定時刻前の場合は`None`。
pub fn overdue_by(record: &CheckRecord, now: DateTime<Utc>) -> Option<Duration> {
    let due_at = record.next_due_at()?;
    let lateness = now - due_at;
    (lateness > Duration::zero()).then_some(lateness)
}

/// overdueなチェックを選択
///
/// 予定時刻から`grace`以上遅れている有効なチェック。一度もチェックされて
/// いないものは通常サイクルの担当なので含めない。遅延の大きい順。
pub fn select_overdue(
    now: DateTime<Utc>,
    checks: &[CheckRecord],
    grace: Duration,
) -> Vec<&CheckRecord> {
    let mut overdue: Vec<(&CheckRecord, Duration)> = checks
        .iter()
        .filter(|c| c.spec.enabled)
        .filter_map(|c| overdue_by(c, now).map(|late| (c, late)))
        .filter(|(_, late)| *late >= grace)
        .collect();
    overdue.sort_by(|(a, la), (b, lb)| lb.cmp(la).then_with(|| a.spec.name.cmp(&b.spec.name)));
    overdue.into_iter().map(|(c, _)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::check::{CheckInterval, CheckSpec, CheckStatus};

    fn record(name: &str, interval: CheckInterval, last: Option<DateTime<Utc>>) -> CheckRecord {
        let mut record =
            CheckRecord::new(CheckSpec::new(name, "http://localhost/").with_interval(interval));
        record.last_checked_at = last;
        record.last_status = last.map(|_| CheckStatus::Up);
        record
    }

    #[test]
    fn test_never_checked_is_due() {
        let now = Utc::now();
        assert!(is_due(&record("a", CheckInterval::OneMinute, None), now));
    }

    #[test]
    fn test_due_at_exact_interval_boundary() {
        let now = Utc::now();
        let exact = record(
            "a",
            CheckInterval::OneMinute,
            Some(now - Duration::seconds(60)),
        );
        let early = record(
            "b",
            CheckInterval::OneMinute,
            Some(now - Duration::seconds(59)),
        );
        assert!(is_due(&exact, now));
        assert!(!is_due(&early, now));
    }

    #[test]
    fn test_disabled_check_is_never_due() {
        let now = Utc::now();
        let mut r = record("a", CheckInterval::ThirtySeconds, None);
        r.spec.enabled = false;
        assert!(!is_due(&r, now));
        assert!(select_due(now, &[r]).is_empty());
    }

    #[test]
    fn test_select_due_orders_by_due_time_then_name() {
        let now = Utc::now();
        let checks = vec![
            record("late", CheckInterval::OneMinute, Some(now - Duration::minutes(2))),
            record("fresh", CheckInterval::OneHour, Some(now - Duration::minutes(1))),
            record("b-new", CheckInterval::OneMinute, None),
            record("a-new", CheckInterval::OneMinute, None),
            record("later", CheckInterval::OneMinute, Some(now - Duration::minutes(5))),
        ];
        let names: Vec<&str> = select_due(now, &checks)
            .iter()
            .map(|c| c.spec.name.as_str())
            .collect();
        assert_eq!(names, vec!["a-new", "b-new", "later", "late"]);
    }

    #[test]
    fn test_overdue_requires_grace() {
        let now = Utc::now();
        let grace = Duration::minutes(5);
        let checks = vec![
            // due 2 minutes ago
            record("slightly-late", CheckInterval::OneMinute, Some(now - Duration::minutes(3))),
            // due 9 minutes ago
            record("very-late", CheckInterval::OneMinute, Some(now - Duration::minutes(10))),
            // due exactly 5 minutes ago
            record("at-grace", CheckInterval::FiveMinutes, Some(now - Duration::minutes(10))),
            record("never", CheckInterval::OneMinute, None),
        ];
        let names: Vec<&str> = select_overdue(now, &checks, grace)
            .iter()
            .map(|c| c.spec.name.as_str())
            .collect();
        assert_eq!(names, vec!["very-late", "at-grace"]);
    }

    #[test]
    fn test_overdue_by() {
        let now = Utc::now();
        let r = record("a", CheckInterval::OneMinute, Some(now - Duration::minutes(4)));
        assert_eq!(overdue_by(&r, now), Some(Duration::minutes(3)));

        let on_time = record("b", CheckInterval::OneHour, Some(now));
        assert_eq!(overdue_by(&on_time, now), None);
        assert_eq!(overdue_by(&record("c", CheckInterval::OneMinute, None), now), None);
    }
}
